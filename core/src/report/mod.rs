// Report module - 文件聚合与统计
// 按文件分组诊断, 计算项目汇总、推荐以及导出报告

pub mod filter;
pub mod recommend;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::fix::CorrectionResult;
use crate::rules::model::{Category, Severity};
use crate::rules::ClassifiedDiagnostic;

pub use filter::FileFilter;
pub use recommend::RecommendationThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Ok,
    Error,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub errors: usize,
    pub warnings: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
    }
}

/// All diagnostics of one file. The status and counters are derived from
/// the diagnostics and cannot be set on their own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    filepath: String,
    filename: String,
    status: FileStatus,
    diagnostics: Vec<ClassifiedDiagnostic>,
    error_count: usize,
    auto_fixable_count: usize,
    error_types: BTreeSet<Category>,
    severity_counts: SeverityCounts,
}

impl FileReport {
    pub fn new(filepath: impl Into<String>, diagnostics: Vec<ClassifiedDiagnostic>) -> Self {
        let filepath = filepath.into();
        let filename = Path::new(&filepath)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.clone());

        let mut error_types = BTreeSet::new();
        let mut severity_counts = SeverityCounts::default();
        let mut auto_fixable_count = 0;
        for d in &diagnostics {
            error_types.insert(d.category());
            severity_counts.add(d.classification.severity);
            if d.is_auto_fixable() {
                auto_fixable_count += 1;
            }
        }

        Self {
            filepath,
            filename,
            status: if diagnostics.is_empty() { FileStatus::Ok } else { FileStatus::Error },
            error_count: diagnostics.len(),
            auto_fixable_count,
            error_types,
            severity_counts,
            diagnostics,
        }
    }

    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn diagnostics(&self) -> &[ClassifiedDiagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn auto_fixable_count(&self) -> usize {
        self.auto_fixable_count
    }

    pub fn error_types(&self) -> &BTreeSet<Category> {
        &self.error_types
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        self.severity_counts
    }

    pub fn has_auto_fixable(&self) -> bool {
        self.auto_fixable_count > 0
    }

    /// ERROR weighs five WARNINGs.
    pub fn problem_score(&self) -> usize {
        self.severity_counts.errors * 5 + self.severity_counts.warnings
    }

    /// Share of diagnostics times their count; higher means an easier win.
    pub fn fix_score(&self) -> f64 {
        if self.error_count == 0 {
            return 0.0;
        }
        let fixable = self.auto_fixable_count as f64;
        fixable * fixable / self.error_count as f64
    }

    /// Report without the diagnostics `result` resolved. Line numbers of the
    /// remaining ones refer to the original text until the next scan.
    pub fn after_fix(&self, result: &CorrectionResult) -> FileReport {
        let remaining = self
            .diagnostics
            .iter()
            .filter(|d| !result.resolved(&d.diagnostic))
            .cloned()
            .collect();
        FileReport::new(self.filepath.clone(), remaining)
    }

    pub fn detail(&self) -> FileDetail {
        let mut by_category: BTreeMap<Category, Vec<DiagnosticDetail>> = BTreeMap::new();
        for d in &self.diagnostics {
            by_category.entry(d.category()).or_default().push(DiagnosticDetail {
                rule: d.diagnostic.rule_code.clone(),
                severity: d.classification.severity,
                line: d.diagnostic.line,
                column: d.diagnostic.column,
                description: d.diagnostic.raw_message.clone(),
                fix_suggestion: d.fix_hint(),
                auto_fixable: d.is_auto_fixable(),
            });
        }
        FileDetail {
            filepath: self.filepath.clone(),
            filename: self.filename.clone(),
            status: self.status,
            error_count: self.error_count,
            auto_fixable_count: self.auto_fixable_count,
            by_category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticDetail {
    pub rule: String,
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub description: String,
    pub fix_suggestion: String,
    pub auto_fixable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetail {
    pub filepath: String,
    pub filename: String,
    pub status: FileStatus,
    pub error_count: usize,
    pub auto_fixable_count: usize,
    pub by_category: BTreeMap<Category, Vec<DiagnosticDetail>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_files: usize,
    pub ok_files: usize,
    pub error_files: usize,
    pub success_rate: f64,
    pub total_errors: usize,
    pub auto_fixable_errors: usize,
}

impl Summary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let total_files = reports.len();
        let ok_files = reports.iter().filter(|r| r.status == FileStatus::Ok).count();
        let success_rate = if total_files == 0 {
            0.0
        } else {
            100.0 * ok_files as f64 / total_files as f64
        };
        Self {
            total_files,
            ok_files,
            error_files: total_files - ok_files,
            success_rate,
            total_errors: reports.iter().map(|r| r.error_count).sum(),
            auto_fixable_errors: reports.iter().map(|r| r.auto_fixable_count).sum(),
        }
    }
}

/// Group classified diagnostics per file, first-seen order: the scanned
/// list, then the clean files, then files that only appear in diagnostics.
pub fn aggregate(
    scanned_files: &[String],
    clean_files: &[String],
    classified: Vec<ClassifiedDiagnostic>,
) -> Vec<FileReport> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ClassifiedDiagnostic>> = HashMap::new();

    for file in scanned_files.iter().chain(clean_files) {
        if !groups.contains_key(file) {
            groups.insert(file.clone(), Vec::new());
            order.push(file.clone());
        }
    }
    for d in classified {
        let key = d.diagnostic.filepath.clone();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(d);
    }

    order
        .into_iter()
        .map(|path| {
            let diagnostics = groups.remove(&path).unwrap_or_default();
            FileReport::new(path, diagnostics)
        })
        .collect()
}

/// Diagnostics per category across every report.
pub fn category_distribution(reports: &[FileReport]) -> BTreeMap<Category, usize> {
    let mut counts = BTreeMap::new();
    for d in reports.iter().flat_map(|r| r.diagnostics()) {
        *counts.entry(d.category()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRank {
    pub filepath: String,
    pub filename: String,
    pub status: FileStatus,
    pub error_count: usize,
    pub auto_fixable_count: usize,
}

impl From<&FileReport> for FileRank {
    fn from(report: &FileReport) -> Self {
        Self {
            filepath: report.filepath.clone(),
            filename: report.filename.clone(),
            status: report.status,
            error_count: report.error_count,
            auto_fixable_count: report.auto_fixable_count,
        }
    }
}

/// Everything a scan knows, ready to be written as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub scan_id: Uuid,
    pub project_path: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub summary: Summary,
    pub recommendations: Vec<String>,
    pub files: Vec<FileReport>,
    pub most_problematic_files: Vec<FileRank>,
    pub easiest_fixes: Vec<FileRank>,
    pub category_distribution: BTreeMap<Category, usize>,
    pub severity_distribution: SeverityCounts,
}

impl ProjectReport {
    pub fn build(
        scan_id: Uuid,
        project_path: impl Into<String>,
        reports: &[FileReport],
        recommendations: Vec<String>,
        thresholds: &RecommendationThresholds,
    ) -> Self {
        let mut severity_distribution = SeverityCounts::default();
        for r in reports {
            severity_distribution.errors += r.severity_counts.errors;
            severity_distribution.warnings += r.severity_counts.warnings;
        }
        Self {
            scan_id,
            project_path: project_path.into(),
            generated_at: chrono::Utc::now(),
            summary: Summary::from_reports(reports),
            recommendations,
            files: reports.to_vec(),
            most_problematic_files: recommend::most_problematic(reports, thresholds.top_files)
                .into_iter()
                .map(FileRank::from)
                .collect(),
            easiest_fixes: recommend::easiest_fixes(reports, thresholds.top_files)
                .into_iter()
                .map(FileRank::from)
                .collect(),
            category_distribution: category_distribution(reports),
            severity_distribution,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
