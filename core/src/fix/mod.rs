// Fix module - 修复引擎
// 把可自动修复的诊断转换成互不重叠的行级编辑并应用到源码

pub mod arena;
pub mod lexer;
pub mod transforms;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::HeaderConfig;
use crate::error::FixError;
use crate::rules::model::Category;
use crate::rules::ClassifiedDiagnostic;
use crate::scanner::Diagnostic;

pub use arena::{LineArena, LineEnding, TextEdit};
use lexer::SourceMap;
use transforms::{build_edit, TransformContext};

const HEADER_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOptions {
    pub max_line_width: usize,
    pub tab_width: usize,
    pub header: HeaderConfig,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            max_line_width: 80,
            tab_width: 4,
            header: HeaderConfig::default(),
        }
    }
}

/// An edit that made it into the corrected text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedEdit {
    pub edit: TextEdit,
    pub rule_code: String,
    pub category: Category,
    pub line: usize,
    /// Other diagnostics that asked for exactly the same edit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_resolves: Vec<Diagnostic>,
}

impl AppliedEdit {
    pub fn resolves(&self, diagnostic: &Diagnostic) -> bool {
        (self.line == diagnostic.line && self.rule_code == diagnostic.rule_code)
            || self.also_resolves.iter().any(|d| d.key() == diagnostic.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unresolved {
    pub diagnostic: Diagnostic,
    pub reason: FixError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionResult {
    pub filepath: String,
    pub corrected_text: String,
    pub changes_made: usize,
    pub applied: Vec<AppliedEdit>,
    pub unresolved: Vec<Unresolved>,
}

impl CorrectionResult {
    /// Whether `diagnostic` is among the ones the applied edits fixed.
    pub fn resolved(&self, diagnostic: &Diagnostic) -> bool {
        self.applied.iter().any(|a| a.resolves(diagnostic))
    }
}

struct Candidate<'a> {
    edit: TextEdit,
    priority: u8,
    order: usize,
    source: &'a ClassifiedDiagnostic,
}

/// Applies auto-fixable diagnostics to one file's text.
///
/// Pure: no I/O, and the same input always yields the same output. Edits are
/// ordered bottom-up so splicing one never shifts another.
#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    options: FixOptions,
    timestamp: String,
}

impl Default for CorrectionEngine {
    fn default() -> Self {
        Self::new(FixOptions::default())
    }
}

impl CorrectionEngine {
    pub fn new(options: FixOptions) -> Self {
        let timestamp = options
            .header
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format(HEADER_TIMESTAMP_FORMAT).to_string());
        Self { options, timestamp }
    }

    pub fn correct(
        &self,
        filepath: &str,
        source: &str,
        diagnostics: &[ClassifiedDiagnostic],
    ) -> CorrectionResult {
        let arena = LineArena::parse(source);
        let map = SourceMap::build(arena.texts());
        let filename = Path::new(filepath)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.to_string());
        let ctx = TransformContext {
            arena: &arena,
            map: &map,
            options: &self.options,
            filename: &filename,
            timestamp: &self.timestamp,
        };

        let mut unresolved = Vec::new();
        let mut candidates = Vec::new();
        for (order, classified) in diagnostics.iter().enumerate() {
            if !classified.is_auto_fixable() {
                continue;
            }
            let diagnostic = &classified.diagnostic;
            let reason = match classified.transform() {
                None => FixError::UnsupportedCategory(classified.category()),
                Some(_) if diagnostic.line == 0 || diagnostic.line > arena.len() => {
                    FixError::LineOutOfRange { line: diagnostic.line, len: arena.len() }
                }
                Some(transform) => match build_edit(transform, &ctx, diagnostic.line) {
                    Ok(edit) => {
                        candidates.push(Candidate {
                            edit,
                            priority: classified.category().fix_priority(),
                            order,
                            source: classified,
                        });
                        continue;
                    }
                    Err(reason) => reason,
                },
            };
            tracing::debug!(
                file = filepath,
                line = diagnostic.line,
                rule = %diagnostic.rule_code,
                %reason,
                "diagnostic left unresolved"
            );
            unresolved.push(Unresolved { diagnostic: diagnostic.clone(), reason });
        }

        candidates.sort_by(|a, b| {
            b.edit
                .start_line
                .cmp(&a.edit.start_line)
                .then(a.priority.cmp(&b.priority))
                .then(a.order.cmp(&b.order))
        });

        let mut applied: Vec<AppliedEdit> = Vec::new();
        for candidate in candidates {
            let diagnostic = &candidate.source.diagnostic;
            if let Some(same) = applied.iter_mut().find(|a| a.edit == candidate.edit) {
                same.also_resolves.push(diagnostic.clone());
                continue;
            }
            let (start, end) = (candidate.edit.start_line, candidate.edit.end_line);
            if applied.iter().any(|a| a.edit.overlaps(start, end)) {
                tracing::debug!(
                    file = filepath,
                    line = diagnostic.line,
                    rule = %diagnostic.rule_code,
                    "edit conflicts with an applied edit"
                );
                unresolved.push(Unresolved {
                    diagnostic: diagnostic.clone(),
                    reason: FixError::ConflictingEdit { start_line: start, end_line: end },
                });
                continue;
            }
            applied.push(AppliedEdit {
                edit: candidate.edit,
                rule_code: diagnostic.rule_code.clone(),
                category: candidate.source.category(),
                line: diagnostic.line,
                also_resolves: Vec::new(),
            });
        }

        let corrected_text = if applied.is_empty() {
            source.to_string()
        } else {
            let mut arena = arena.clone();
            // Non-overlapping and sorted by descending start line.
            for a in &applied {
                arena.splice(&a.edit);
            }
            arena.render()
        };

        tracing::debug!(
            file = filepath,
            applied = applied.len(),
            unresolved = unresolved.len(),
            "correction pass finished"
        );

        CorrectionResult {
            filepath: filepath.to_string(),
            corrected_text,
            changes_made: applied.len(),
            applied,
            unresolved,
        }
    }
}
