use super::parser::{DiagnosticParser, ParseOutput};
use super::DiagnosticSource;
use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Runs every registered [`DiagnosticSource`] over a project and parses
/// their combined output.
#[derive(Clone, Default)]
pub struct ScanManager {
    sources: Vec<Arc<dyn DiagnosticSource>>,
    parser: DiagnosticParser,
}

/// Parsed output of one scan plus every file the sources looked at.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<String>,
    pub parsed: ParseOutput,
}

impl ScanManager {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            parser: DiagnosticParser::new(),
        }
    }

    pub fn register_source<S: DiagnosticSource + 'static>(&mut self, source: S) {
        self.sources.push(Arc::new(source));
    }

    /// Scan without a deadline.
    pub async fn scan(&self, project_path: &Path) -> Result<ScanResult> {
        self.scan_with_timeout(project_path, None).await
    }

    pub async fn scan_with_timeout(
        &self,
        project_path: &Path,
        timeout: Option<Duration>,
    ) -> Result<ScanResult> {
        if self.sources.is_empty() {
            return Err(CoreError::Scanner("no diagnostic source registered".to_string()));
        }

        let work = self.run_sources(project_path.to_path_buf());
        match timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                tracing::warn!(path = %project_path.display(), ?limit, "scan timed out");
                CoreError::ScanTimeout {
                    path: project_path.display().to_string(),
                    millis: limit.as_millis(),
                }
            })?,
            None => work.await,
        }
    }

    async fn run_sources(&self, project_path: PathBuf) -> Result<ScanResult> {
        let mut set = tokio::task::JoinSet::new();

        for (idx, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let path = project_path.clone();
            set.spawn(async move { (idx, source.name(), source.run(&path).await) });
        }

        let mut runs = Vec::with_capacity(self.sources.len());
        while let Some(res) = set.join_next().await {
            let (idx, name, run) = res.map_err(|e| CoreError::Worker(e.to_string()))?;
            let run = run.map_err(|e| {
                tracing::warn!(source = %name, error = %e, "diagnostic source failed");
                e
            })?;
            runs.push((idx, run));
        }
        // Registration order, whatever order the tasks finished in.
        runs.sort_by_key(|(idx, _)| *idx);

        let mut result = ScanResult::default();
        for (_, run) in runs {
            for file in run.files {
                if !result.files.contains(&file) {
                    result.files.push(file);
                }
            }
            result.parsed.merge(self.parser.parse(&run.output));
        }
        for file in &result.parsed.files {
            if !result.files.contains(file) {
                result.files.push(file.clone());
            }
        }

        tracing::info!(
            path = %project_path.display(),
            files = result.files.len(),
            diagnostics = result.parsed.diagnostics.len(),
            skipped = result.parsed.stats.skipped,
            "scan finished"
        );
        Ok(result)
    }
}
