//! normfix Core - norminette 诊断解析、分类、聚合与安全自动修复
//!
//! Raw linter output goes through the [`DiagnosticParser`], every record is
//! classified by the [`RuleRegistry`], grouped into [`FileReport`]s inside an
//! immutable [`ScanSnapshot`], and the [`CorrectionEngine`] rewrites whatever
//! is safe to rewrite. [`Workspace`] ties these together behind the
//! scan / list / preview / apply / bulk-fix operations.

// 声明 src/ 目录下的模块
pub mod config;
mod diff;
pub mod fix;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod workspace;

// 重新导出常用类型
pub use config::NormConfig;
pub use diff::{DiffEngine, DiffStats};
pub use fix::{AppliedEdit, CorrectionEngine, CorrectionResult, FixOptions, TextEdit, Unresolved};
pub use report::{FileDetail, FileFilter, FileReport, FileStatus, ProjectReport, Summary};
pub use scanner::manager::{ScanManager, ScanResult};
pub use scanner::parser::{DiagnosticParser, ParseOutput, ParseStats};
pub use scanner::{Diagnostic, DiagnosticSource, LintRun, TextSource};
pub use workspace::{
    ApplyFixResult, BulkFixReport, BulkFixRequest, FileFailure, FixPreview, ScanOutcome,
    ScanSnapshot, Workspace,
};
pub use workspace::store::{FsStore, MemoryStore, SourceStore};

// 规则系统
pub use rules::{
    loader::load_rules_from_dir, model::Category, model::Classification, model::Rule,
    model::RuleSet, model::Severity, model::Transform, registry::RuleRegistry,
    ClassifiedDiagnostic,
};

pub mod error {
    use serde::Serialize;
    use thiserror::Error;
    use uuid::Uuid;

    use crate::rules::model::Category;

    #[derive(Error, Debug)]
    pub enum CoreError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Parse error: {0}")]
        Parse(String),

        #[error("Config error: {0}")]
        Config(String),

        #[error("Scanner error: {0}")]
        Scanner(String),

        #[error("scan of {path} timed out after {millis}ms")]
        ScanTimeout { path: String, millis: u128 },

        #[error("unknown scan id {0}")]
        UnknownScan(Uuid),

        #[error("{filepath} is not part of scan {scan_id}")]
        FileNotInScan { filepath: String, scan_id: Uuid },

        #[error(transparent)]
        Store(#[from] StoreError),

        #[error("worker error: {0}")]
        Worker(String),
    }

    /// A diagnostic line the parser could not turn into a record.
    #[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum ParseError {
        #[error("input line {line_no}: does not match the diagnostic grammar")]
        Malformed { line_no: usize },

        #[error("input line {line_no}: {field} must be a positive integer")]
        InvalidPosition { line_no: usize, field: &'static str },

        #[error("input line {line_no}: entry appears before any file header")]
        Orphan { line_no: usize },
    }

    /// Why a single auto-fixable diagnostic was left untouched.
    #[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
    #[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
    pub enum FixError {
        #[error("edit for lines {start_line}-{end_line} overlaps an edit already applied")]
        ConflictingEdit { start_line: usize, end_line: usize },

        #[error("no transformation implemented for category {0}")]
        UnsupportedCategory(Category),

        #[error("line {line} is outside the file ({len} lines)")]
        LineOutOfRange { line: usize, len: usize },

        #[error("no safe rewrite: {0}")]
        NoSafeRewrite(String),
    }

    #[derive(Error, Debug)]
    pub enum StoreError {
        #[error("cannot read {path}: {source}")]
        FileUnreadable {
            path: String,
            #[source]
            source: std::io::Error,
        },

        #[error("cannot write {path}: {source}")]
        WriteFailure {
            path: String,
            #[source]
            source: std::io::Error,
        },

        #[error("no backup found for {0}")]
        BackupMissing(String),
    }

    pub type Result<T> = std::result::Result<T, CoreError>;
}
