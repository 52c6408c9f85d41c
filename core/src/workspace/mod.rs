// Workspace module - 对外操作边界
// scan / list_files / get_file / preview_fix / apply_fix / bulk_fix / restore / export_report

pub mod locks;
pub mod snapshot;
pub mod store;

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::NormConfig;
use crate::diff::{DiffEngine, DiffStats};
use crate::error::{CoreError, Result, StoreError};
use crate::fix::{AppliedEdit, CorrectionEngine, Unresolved};
use crate::report::{self, FileDetail, FileFilter, FileReport, ProjectReport, Summary};
use crate::rules::loader::load_rules_from_dir;
use crate::rules::model::Rule;
use crate::rules::registry::RuleRegistry;
use crate::scanner::manager::ScanManager;
use crate::scanner::parser::ParseStats;
use crate::scanner::DiagnosticSource;

pub use locks::FileLocks;
pub use snapshot::ScanSnapshot;
pub use store::{FsStore, MemoryStore, SourceStore};

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    pub summary: Summary,
    pub recommendations: Vec<String>,
    pub parse_stats: ParseStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixPreview {
    pub filepath: String,
    pub diff_text: String,
    pub stats: DiffStats,
    pub changes_made: usize,
    pub unresolved: Vec<Unresolved>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyFixResult {
    pub filepath: String,
    pub changes_made: usize,
    /// Auto-fixable diagnostics that were left alone.
    pub unresolved: usize,
    pub applied: Vec<AppliedEdit>,
    pub details: Vec<Unresolved>,
    /// The file's report with the resolved diagnostics removed.
    pub remaining: FileReport,
}

#[derive(Debug, Clone)]
pub struct BulkFixRequest {
    /// Empty means every file of the scan.
    pub filepaths: Vec<String>,
    pub auto_fixable_only: bool,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl BulkFixRequest {
    pub fn new<I, S>(filepaths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filepaths: filepaths.into_iter().map(Into::into).collect(),
            auto_fixable_only: true,
            timeout: None,
            cancel: None,
        }
    }

    pub fn auto_fixable_only(mut self, only: bool) -> Self {
        self.auto_fixable_only = only;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub filepath: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub filepath: String,
    pub changes_made: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFixReport {
    pub total_files_processed: usize,
    pub total_changes: usize,
    pub failures: Vec<FileFailure>,
    /// Nothing auto-fixable and `auto_fixable_only` was set.
    pub skipped: Vec<String>,
    /// Not started before the deadline or cancellation.
    pub pending: Vec<String>,
    pub outcomes: Vec<FileOutcome>,
    /// Scan summary with the fixed files' resolved diagnostics removed.
    pub summary: Summary,
}

enum TaskOutcome {
    Done(std::result::Result<FixedFile, StoreError>),
    Pending,
}

struct FixedFile {
    changes_made: usize,
    applied: Vec<AppliedEdit>,
    unresolved: Vec<Unresolved>,
    remaining: FileReport,
}

/// The scan a fix works from.
#[derive(Debug, Clone, Copy)]
struct ScanRef {
    id: Uuid,
    sequence: u64,
}

impl ScanRef {
    fn of(snapshot: &ScanSnapshot) -> Self {
        Self {
            id: snapshot.id(),
            sequence: snapshot.sequence(),
        }
    }
}

/// Last fix written to a path.
#[derive(Debug, Clone)]
struct WriteMark {
    /// Highest scan sequence handed out when the write landed. Scans up to
    /// this one may have read the file before it.
    after_scan: u64,
    scan_id: Uuid,
    remaining: FileReport,
}

/// Read-correct-write for one file, shared by `apply_fix` and bulk tasks.
#[derive(Clone)]
struct Fixer {
    store: Arc<dyn SourceStore>,
    engine: Arc<CorrectionEngine>,
    locks: FileLocks,
    /// Scan sequence counter, bumped when a scan starts.
    scans: Arc<AtomicU64>,
    /// Line numbers of any snapshot that may predate a write no longer match
    /// the file, so fixes from those snapshots are refused.
    written: Arc<Mutex<HashMap<String, WriteMark>>>,
}

impl Fixer {
    async fn fix(&self, scan: ScanRef, report: &FileReport) -> std::result::Result<FixedFile, StoreError> {
        let path = report.filepath();
        let _guard = self.locks.acquire(path).await;

        if let Some(mark) = self.written.lock().await.get(path) {
            if scan.sequence <= mark.after_scan {
                tracing::debug!(
                    file = path,
                    scan_id = %scan.id,
                    written_by = %mark.scan_id,
                    "snapshot predates the last fix of this file, rescan first"
                );
                let remaining = if mark.scan_id == scan.id {
                    mark.remaining.clone()
                } else {
                    report.clone()
                };
                return Ok(FixedFile {
                    changes_made: 0,
                    applied: Vec::new(),
                    unresolved: Vec::new(),
                    remaining,
                });
            }
        }

        let source = self.store.read(path).await?;
        let result = self.engine.correct(path, &source, report.diagnostics());
        if result.changes_made > 0 {
            self.store.write(path, &source, &result.corrected_text).await?;
        }
        let remaining = report.after_fix(&result);
        if result.changes_made > 0 {
            self.written.lock().await.insert(
                path.to_string(),
                WriteMark {
                    after_scan: self.scans.load(Ordering::SeqCst),
                    scan_id: scan.id,
                    remaining: remaining.clone(),
                },
            );
        }

        tracing::info!(
            file = path,
            changes = result.changes_made,
            unresolved = result.unresolved.len(),
            "fixed file"
        );
        Ok(FixedFile {
            changes_made: result.changes_made,
            applied: result.applied,
            unresolved: result.unresolved,
            remaining,
        })
    }

    async fn forget(&self, path: &str) {
        self.written.lock().await.remove(path);
    }
}

/// Entry point for hosts: owns the registry, the scan snapshots and the
/// per-file locks, and runs every operation against a [`SourceStore`].
pub struct Workspace {
    config: NormConfig,
    registry: RwLock<RuleRegistry>,
    scanner: ScanManager,
    diff: DiffEngine,
    snapshots: RwLock<HashMap<Uuid, Arc<ScanSnapshot>>>,
    fixer: Fixer,
}

impl Workspace {
    /// Built-in rules only; `config.rules_dir` is not read. Out-of-range
    /// numbers are clamped here, `from_config` rejects them instead.
    pub fn new(config: NormConfig, store: Arc<dyn SourceStore>) -> Self {
        let config = config.clamped();
        let engine = CorrectionEngine::new(config.fix_options());
        Self {
            registry: RwLock::new(RuleRegistry::builtin()),
            scanner: ScanManager::new(),
            diff: DiffEngine::default(),
            snapshots: RwLock::new(HashMap::new()),
            fixer: Fixer {
                store,
                engine: Arc::new(engine),
                locks: FileLocks::new(),
                scans: Arc::new(AtomicU64::new(0)),
                written: Arc::new(Mutex::new(HashMap::new())),
            },
            config,
        }
    }

    /// Validates `config` and loads the YAML rule packs of `rules_dir`.
    pub fn from_config(config: NormConfig, store: Arc<dyn SourceStore>) -> Result<Self> {
        config.validate()?;
        let mut registry = RuleRegistry::builtin();
        if let Some(dir) = &config.rules_dir {
            let rules = load_rules_from_dir(dir)
                .map_err(|e| CoreError::Config(format!("{:#}", e)))?;
            tracing::info!(dir = %dir.display(), count = rules.len(), "loaded rule packs");
            registry.extend(rules);
        }
        let workspace = Self::new(config, store);
        Ok(Self {
            registry: RwLock::new(registry),
            ..workspace
        })
    }

    /// Files on disk under `project_root`, backed up as `config.backup` says.
    pub fn open(project_root: impl Into<PathBuf>, config: NormConfig) -> Result<Self> {
        let mut store = FsStore::new(project_root);
        if config.backup.enabled {
            store = store.with_backups(&config.backup.dir);
        }
        Self::from_config(config, Arc::new(store))
    }

    pub fn config(&self) -> &NormConfig {
        &self.config
    }

    pub fn register_source<S: DiagnosticSource + 'static>(&mut self, source: S) {
        self.scanner.register_source(source);
    }

    /// Later scans classify with the new rule; existing snapshots keep theirs.
    pub async fn register_rule(&self, rule: Rule) -> u64 {
        let mut registry = self.registry.write().await;
        registry.register(rule);
        registry.version()
    }

    pub async fn registry_version(&self) -> u64 {
        self.registry.read().await.version()
    }

    pub async fn scan(&self, project_path: impl AsRef<Path>) -> Result<ScanOutcome> {
        self.scan_with_timeout(project_path, None).await
    }

    pub async fn scan_with_timeout(
        &self,
        project_path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<ScanOutcome> {
        let project_path = project_path.as_ref();
        // Taken before the sources read anything, so a fix landing mid-scan
        // marks this snapshot as stale.
        let sequence = self.fixer.scans.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.scanner.scan_with_timeout(project_path, timeout).await?;

        let snapshot = {
            let registry = self.registry.read().await;
            let classified = registry.classify_all(result.parsed.diagnostics);
            let reports = report::aggregate(&result.files, &result.parsed.clean_files, classified);
            ScanSnapshot::build(
                project_path.display().to_string(),
                sequence,
                registry.version(),
                reports,
                result.parsed.stats,
                &self.config.thresholds,
            )
        };

        let outcome = ScanOutcome {
            scan_id: snapshot.id(),
            summary: *snapshot.summary(),
            recommendations: snapshot.recommendations().to_vec(),
            parse_stats: snapshot.parse_stats(),
        };
        tracing::info!(
            scan_id = %outcome.scan_id,
            files = outcome.summary.total_files,
            errors = outcome.summary.total_errors,
            success_rate = outcome.summary.success_rate,
            "scan stored"
        );
        self.snapshots
            .write()
            .await
            .insert(outcome.scan_id, Arc::new(snapshot));
        Ok(outcome)
    }

    pub async fn snapshot(&self, scan_id: Uuid) -> Result<Arc<ScanSnapshot>> {
        self.snapshots
            .read()
            .await
            .get(&scan_id)
            .cloned()
            .ok_or(CoreError::UnknownScan(scan_id))
    }

    /// Forget a snapshot. Its id is unknown afterwards.
    pub async fn drop_scan(&self, scan_id: Uuid) -> Result<()> {
        match self.snapshots.write().await.remove(&scan_id) {
            Some(_) => {
                tracing::debug!(%scan_id, "scan dropped");
                Ok(())
            }
            None => Err(CoreError::UnknownScan(scan_id)),
        }
    }

    pub async fn list_files(&self, scan_id: Uuid, filter: &FileFilter) -> Result<Vec<FileReport>> {
        let snapshot = self.snapshot(scan_id).await?;
        Ok(snapshot.list_files(filter).into_iter().cloned().collect())
    }

    pub async fn get_file(&self, scan_id: Uuid, filepath: &str) -> Result<FileDetail> {
        self.snapshot(scan_id).await?.get_file(filepath)
    }

    pub async fn export_report(&self, scan_id: Uuid) -> Result<ProjectReport> {
        Ok(self.snapshot(scan_id).await?.export_report())
    }

    fn report_of<'a>(snapshot: &'a ScanSnapshot, filepath: &str) -> Result<&'a FileReport> {
        snapshot.file(filepath).ok_or_else(|| CoreError::FileNotInScan {
            filepath: filepath.to_string(),
            scan_id: snapshot.id(),
        })
    }

    /// Diff of what `apply_fix` would write. Never writes.
    pub async fn preview_fix(&self, scan_id: Uuid, filepath: &str) -> Result<FixPreview> {
        let snapshot = self.snapshot(scan_id).await?;
        let report = Self::report_of(&snapshot, filepath)?;
        let source = self.fixer.store.read(filepath).await?;
        let result = self.fixer.engine.correct(filepath, &source, report.diagnostics());
        Ok(FixPreview {
            filepath: filepath.to_string(),
            diff_text: self.diff.unified(filepath, &source, &result.corrected_text),
            stats: self.diff.stats(&source, &result.corrected_text),
            changes_made: result.changes_made,
            unresolved: result.unresolved,
        })
    }

    pub async fn apply_fix(&self, scan_id: Uuid, filepath: &str) -> Result<ApplyFixResult> {
        let snapshot = self.snapshot(scan_id).await?;
        let report = Self::report_of(&snapshot, filepath)?;
        let fixed = self.fixer.fix(ScanRef::of(&snapshot), report).await?;
        Ok(ApplyFixResult {
            filepath: filepath.to_string(),
            changes_made: fixed.changes_made,
            unresolved: fixed.unresolved.len(),
            applied: fixed.applied,
            details: fixed.unresolved,
            remaining: fixed.remaining,
        })
    }

    /// Put the newest backup of `filepath` back. Snapshots taken before the
    /// restore apply to the file again.
    pub async fn restore(&self, filepath: &str) -> Result<()> {
        let _guard = self.fixer.locks.acquire(filepath).await;
        self.fixer.store.restore(filepath).await?;
        self.fixer.forget(filepath).await;
        Ok(())
    }

    /// Fix many files concurrently, at most `max_workers` at a time.
    ///
    /// Per-file problems end up in `failures`; only an unknown scan id fails
    /// the whole batch. On timeout or cancellation files already being fixed
    /// finish and the rest are reported as `pending`.
    pub async fn bulk_fix(&self, scan_id: Uuid, request: BulkFixRequest) -> Result<BulkFixReport> {
        let snapshot = self.snapshot(scan_id).await?;
        let token = request
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let deadline = request.timeout.map(|t| tokio::time::Instant::now() + t);

        let requested: Vec<String> = if request.filepaths.is_empty() {
            snapshot.reports().iter().map(|r| r.filepath().to_string()).collect()
        } else {
            let mut seen = HashSet::new();
            request
                .filepaths
                .iter()
                .filter(|p| seen.insert(p.as_str()))
                .cloned()
                .collect()
        };

        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        let mut queue = Vec::new();
        for path in &requested {
            match snapshot.file(path) {
                None => failures.push(FileFailure {
                    filepath: path.clone(),
                    reason: CoreError::FileNotInScan { filepath: path.clone(), scan_id }.to_string(),
                }),
                Some(r) if request.auto_fixable_only && !r.has_auto_fixable() => {
                    skipped.push(path.clone())
                }
                Some(r) => queue.push(r.clone()),
            }
        }

        let scan = ScanRef::of(&snapshot);
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut in_flight: HashSet<String> = HashSet::new();
        let mut set = JoinSet::new();
        for report in queue {
            in_flight.insert(report.filepath().to_string());
            let (fixer, token, semaphore) = (self.fixer.clone(), token.clone(), semaphore.clone());
            set.spawn(async move {
                let path = report.filepath().to_string();
                let permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => return (path, TaskOutcome::Pending),
                    permit = semaphore.acquire_owned() => permit,
                };
                let Ok(_permit) = permit else {
                    return (path, TaskOutcome::Pending);
                };
                if token.is_cancelled() {
                    return (path, TaskOutcome::Pending);
                }
                let outcome = fixer.fix(scan, &report).await;
                (path, TaskOutcome::Done(outcome))
            });
        }

        let mut pending = Vec::new();
        let mut done: HashMap<String, FixedFile> = HashMap::new();
        loop {
            let next = match deadline {
                Some(deadline) => tokio::select! {
                    joined = set.join_next() => joined,
                    _ = tokio::time::sleep_until(deadline), if !token.is_cancelled() => {
                        tracing::warn!(%scan_id, "bulk fix deadline reached, cancelling");
                        token.cancel();
                        continue;
                    }
                },
                None => set.join_next().await,
            };
            let Some(joined) = next else { break };
            let (path, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "bulk fix task failed");
                    continue;
                }
            };
            in_flight.remove(&path);
            match outcome {
                TaskOutcome::Pending => pending.push(path),
                TaskOutcome::Done(Ok(fixed)) => {
                    done.insert(path, fixed);
                }
                TaskOutcome::Done(Err(e)) => {
                    tracing::warn!(file = %path, error = %e, "bulk fix failed for file");
                    failures.push(FileFailure { filepath: path, reason: e.to_string() });
                }
            }
        }
        // Tasks that never reported (panicked or aborted).
        for path in in_flight {
            failures.push(FileFailure {
                filepath: path,
                reason: CoreError::Worker("fix task did not complete".to_string()).to_string(),
            });
        }

        // Request order, whatever order the tasks finished in.
        let position: HashMap<&str, usize> = requested
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();
        let rank = |p: &str| position.get(p).copied().unwrap_or(usize::MAX);
        failures.sort_by_key(|f| rank(&f.filepath));
        pending.sort_by_key(|p| rank(p));

        let outcomes: Vec<FileOutcome> = requested
            .iter()
            .filter_map(|p| {
                done.get(p).map(|fixed| FileOutcome {
                    filepath: p.clone(),
                    changes_made: fixed.changes_made,
                    unresolved: fixed.unresolved.len(),
                })
            })
            .collect();

        let reports: Vec<FileReport> = snapshot
            .reports()
            .iter()
            .map(|r| match done.remove(r.filepath()) {
                Some(fixed) => fixed.remaining,
                None => r.clone(),
            })
            .collect();

        let report = BulkFixReport {
            total_files_processed: outcomes.len(),
            total_changes: outcomes.iter().map(|o| o.changes_made).sum(),
            failures,
            skipped,
            pending,
            outcomes,
            summary: Summary::from_reports(&reports),
        };
        tracing::info!(
            %scan_id,
            processed = report.total_files_processed,
            changes = report.total_changes,
            failures = report.failures.len(),
            pending = report.pending.len(),
            "bulk fix finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FileStatus;
    use crate::scanner::TextSource;

    const A: &str = "int\tmain(void)\n{\n\treturn (0);   \n}\n";
    const B: &str = "int\tlong_one(void)\n{\n\treturn (1);\n}\n";

    fn workspace(store: Arc<MemoryStore>, output: &str) -> Workspace {
        let mut ws = Workspace::new(NormConfig::default(), store);
        ws.register_source(TextSource::new(output).with_files(["a.c", "b.c", "ok.c"]));
        ws
    }

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert("a.c", A);
        store.insert("b.c", B);
        store.insert("ok.c", "int\tx;\n");
        store
    }

    const OUTPUT: &str = "a.c:3:12: SPC_BEFORE_NL: spaces before newline\n\
                          b.c:1:1: TOO_MANY_LINES: too many lines in function\n";

    #[tokio::test]
    async fn scan_then_browse() {
        let ws = workspace(store(), OUTPUT);
        let outcome = ws.scan("proj").await.unwrap();
        assert_eq!(outcome.summary.total_files, 3);
        assert_eq!(outcome.summary.total_errors, 2);
        assert_eq!(outcome.summary.auto_fixable_errors, 1);
        assert_eq!(outcome.parse_stats.parsed, 2);

        let errors = ws
            .list_files(outcome.scan_id, &FileFilter::default().with_status(FileStatus::Error))
            .await
            .unwrap();
        assert_eq!(errors.len(), 2);

        let detail = ws.get_file(outcome.scan_id, "a.c").await.unwrap();
        assert_eq!(detail.error_count, 1);

        let report = ws.export_report(outcome.scan_id).await.unwrap();
        assert_eq!(report.scan_id, outcome.scan_id);

        let other = ws.scan("proj").await.unwrap();
        assert_ne!(other.scan_id, outcome.scan_id);
    }

    #[tokio::test]
    async fn unknown_ids_and_paths() {
        let ws = workspace(store(), OUTPUT);
        assert!(matches!(
            ws.list_files(Uuid::new_v4(), &FileFilter::default()).await,
            Err(CoreError::UnknownScan(_))
        ));
        let scan_id = ws.scan("proj").await.unwrap().scan_id;
        assert!(matches!(
            ws.apply_fix(scan_id, "zzz.c").await,
            Err(CoreError::FileNotInScan { .. })
        ));
    }

    #[tokio::test]
    async fn preview_does_not_write() {
        let store = store();
        let ws = workspace(store.clone(), OUTPUT);
        let scan_id = ws.scan("proj").await.unwrap().scan_id;

        let preview = ws.preview_fix(scan_id, "a.c").await.unwrap();
        assert_eq!(preview.changes_made, 1);
        assert_eq!(preview.stats, DiffStats { insertions: 1, deletions: 1 });
        assert!(preview.diff_text.contains("-\treturn (0);   "));
        assert!(preview.diff_text.contains("+\treturn (0);"));
        assert_eq!(store.writes(), 0);
        assert_eq!(store.get("a.c").unwrap(), A);
    }

    #[tokio::test]
    async fn apply_fix_once_per_scan() {
        let store = store();
        let ws = workspace(store.clone(), OUTPUT);
        let scan_id = ws.scan("proj").await.unwrap().scan_id;

        let first = ws.apply_fix(scan_id, "a.c").await.unwrap();
        assert_eq!(first.changes_made, 1);
        assert_eq!(first.remaining.error_count(), 0);
        assert_eq!(store.get("a.c").unwrap(), "int\tmain(void)\n{\n\treturn (0);\n}\n");

        let second = ws.apply_fix(scan_id, "a.c").await.unwrap();
        assert_eq!(second.changes_made, 0);
        assert_eq!(store.writes(), 1);

        ws.restore("a.c").await.unwrap();
        assert_eq!(store.get("a.c").unwrap(), A);
        assert_eq!(ws.apply_fix(scan_id, "a.c").await.unwrap().changes_made, 1);
    }

    #[tokio::test]
    async fn bulk_fix_collects_failures_and_skips() {
        let store = store();
        store.insert("c.c", A);
        store.set_unwritable("c.c");
        let output = format!("{}c.c:3:12: SPC_BEFORE_NL: spaces before newline\n", OUTPUT);
        let ws = workspace(store.clone(), &output);
        let scan_id = ws.scan("proj").await.unwrap().scan_id;

        let report = ws
            .bulk_fix(scan_id, BulkFixRequest::new(["c.c", "a.c", "b.c", "nope.c"]))
            .await
            .unwrap();
        assert_eq!(report.total_files_processed, 1);
        assert_eq!(report.total_changes, 1);
        assert_eq!(report.skipped, vec!["b.c".to_string()]);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.filepath.as_str()).collect();
        assert_eq!(failed, vec!["c.c", "nope.c"]);
        assert!(report.pending.is_empty());
        // a.c is clean now, b.c and c.c are not.
        assert_eq!(report.summary.error_files, 2);
    }

    #[tokio::test]
    async fn bulk_fix_with_cancelled_token_leaves_everything_pending() {
        let store = store();
        let ws = workspace(store.clone(), OUTPUT);
        let scan_id = ws.scan("proj").await.unwrap().scan_id;

        let token = CancellationToken::new();
        token.cancel();
        let report = ws
            .bulk_fix(scan_id, BulkFixRequest::new(Vec::<String>::new()).with_cancel(token))
            .await
            .unwrap();
        assert_eq!(report.pending, vec!["a.c".to_string()]);
        assert_eq!(report.total_files_processed, 0);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn older_scan_cannot_fix_a_file_rewritten_from_a_newer_one() {
        let store = Arc::new(MemoryStore::new());
        store.insert("a.c", "int\tx;\nint\tf(void)\n{\n}\n");
        let mut ws = Workspace::new(NormConfig::default(), store.clone());
        ws.register_source(TextSource::new("a.c:2:1: NEWLINE_PRECEDES_FUNC: missing blank line\n"));
        let older = ws.scan("proj").await.unwrap().scan_id;
        let newer = ws.scan("proj").await.unwrap().scan_id;

        assert_eq!(ws.apply_fix(newer, "a.c").await.unwrap().changes_made, 1);
        let once = "int\tx;\n\nint\tf(void)\n{\n}\n";
        assert_eq!(store.get("a.c").unwrap(), once);

        let stale = ws.apply_fix(older, "a.c").await.unwrap();
        assert_eq!(stale.changes_made, 0);
        assert_eq!(stale.remaining.error_count(), 1);
        let report = ws
            .bulk_fix(older, BulkFixRequest::new(["a.c"]))
            .await
            .unwrap();
        assert_eq!(report.total_changes, 0);
        assert_eq!(store.get("a.c").unwrap(), once);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn zero_workers_still_finish_a_bulk_fix() {
        let config = NormConfig {
            max_workers: 0,
            ..NormConfig::default()
        };
        let store = store();
        let mut ws = Workspace::new(config, store.clone());
        ws.register_source(TextSource::new(OUTPUT).with_files(["a.c", "b.c", "ok.c"]));
        assert_eq!(ws.config().max_workers, 1);
        let scan_id = ws.scan("proj").await.unwrap().scan_id;

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            ws.bulk_fix(scan_id, BulkFixRequest::new(["a.c"])),
        )
        .await
        .expect("bulk fix must not wait forever")
        .unwrap();
        assert_eq!(report.total_changes, 1);
    }

    #[tokio::test]
    async fn dropped_scans_are_unknown() {
        let ws = workspace(store(), OUTPUT);
        let scan_id = ws.scan("proj").await.unwrap().scan_id;
        ws.drop_scan(scan_id).await.unwrap();
        assert!(matches!(ws.snapshot(scan_id).await, Err(CoreError::UnknownScan(_))));
        assert!(matches!(ws.drop_scan(scan_id).await, Err(CoreError::UnknownScan(_))));
    }
}
