use serde::{Deserialize, Serialize};

use super::{category_distribution, FileReport, Summary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    /// Success rate (percent) below which compliance is called low.
    pub low_compliance: f64,
    pub needs_improvement: f64,
    /// Files named in ranking lines.
    pub top_files: usize,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            low_compliance: 50.0,
            needs_improvement: 80.0,
            top_files: 3,
        }
    }
}

/// Files with diagnostics, worst first. Ties keep report order.
pub fn most_problematic(reports: &[FileReport], limit: usize) -> Vec<&FileReport> {
    let mut files: Vec<&FileReport> = reports.iter().filter(|r| r.error_count() > 0).collect();
    files.sort_by(|a, b| b.problem_score().cmp(&a.problem_score()));
    files.truncate(limit);
    files
}

/// Files with auto-fixable diagnostics, easiest first.
pub fn easiest_fixes(reports: &[FileReport], limit: usize) -> Vec<&FileReport> {
    let mut files: Vec<&FileReport> = reports.iter().filter(|r| r.has_auto_fixable()).collect();
    files.sort_by(|a, b| b.fix_score().total_cmp(&a.fix_score()));
    files.truncate(limit);
    files
}

pub fn recommendations(
    reports: &[FileReport],
    summary: &Summary,
    thresholds: &RecommendationThresholds,
) -> Vec<String> {
    if summary.total_files == 0 {
        return vec!["No files were scanned.".to_string()];
    }

    let mut out = Vec::new();
    if summary.success_rate < thresholds.low_compliance {
        out.push(format!(
            "Project has low norminette compliance (<{}%). Consider running auto-fix on all files.",
            thresholds.low_compliance
        ));
    } else if summary.success_rate < thresholds.needs_improvement {
        out.push("Project needs improvement. Focus on files with the most errors first.".to_string());
    } else {
        out.push("Good norminette compliance! Focus on the remaining errors.".to_string());
    }

    if summary.auto_fixable_errors > 0 {
        let share = 100.0 * summary.auto_fixable_errors as f64 / summary.total_errors.max(1) as f64;
        out.push(format!(
            "{} errors ({:.1}%) can be auto-fixed.",
            summary.auto_fixable_errors, share
        ));
    }

    let mut top: Option<(_, usize)> = None;
    for (category, count) in category_distribution(reports) {
        if top.map_or(true, |(_, best)| count > best) {
            top = Some((category, count));
        }
    }
    if let Some((category, count)) = top {
        out.push(format!(
            "Most common error: {} ({} occurrences). Consider a project-wide fix.",
            category, count
        ));
    }

    let problematic = most_problematic(reports, thresholds.top_files);
    if !problematic.is_empty() {
        out.push(format!(
            "Focus on these problematic files: {}",
            join_names(&problematic)
        ));
    }

    let quick = easiest_fixes(reports, thresholds.top_files);
    if !quick.is_empty() {
        out.push(format!("Quick wins available in: {}", join_names(&quick)));
    }

    out
}

fn join_names(files: &[&FileReport]) -> String {
    files.iter().map(|f| f.filename()).collect::<Vec<_>>().join(", ")
}
