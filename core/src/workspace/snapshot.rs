use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::report::recommend::{self, RecommendationThresholds};
use crate::report::{FileDetail, FileFilter, FileReport, ProjectReport, Summary};
use crate::scanner::parser::ParseStats;

/// What one scan saw. Never mutated after `build`; fixes produce new
/// summaries instead of editing this one.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSnapshot {
    id: Uuid,
    project_path: String,
    sequence: u64,
    created_at: DateTime<Utc>,
    registry_version: u64,
    reports: Vec<FileReport>,
    summary: Summary,
    recommendations: Vec<String>,
    parse_stats: ParseStats,
    #[serde(skip)]
    thresholds: RecommendationThresholds,
}

impl ScanSnapshot {
    pub fn build(
        project_path: impl Into<String>,
        sequence: u64,
        registry_version: u64,
        reports: Vec<FileReport>,
        parse_stats: ParseStats,
        thresholds: &RecommendationThresholds,
    ) -> Self {
        let summary = Summary::from_reports(&reports);
        let recommendations = recommend::recommendations(&reports, &summary, thresholds);
        Self {
            id: Uuid::new_v4(),
            project_path: project_path.into(),
            sequence,
            created_at: Utc::now(),
            registry_version,
            reports,
            summary,
            recommendations,
            parse_stats,
            thresholds: thresholds.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    /// Order in which scans started within one workspace.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Version of the rule registry the diagnostics were classified with.
    pub fn registry_version(&self) -> u64 {
        self.registry_version
    }

    pub fn reports(&self) -> &[FileReport] {
        &self.reports
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn parse_stats(&self) -> ParseStats {
        self.parse_stats
    }

    pub fn list_files(&self, filter: &FileFilter) -> Vec<&FileReport> {
        filter.apply(&self.reports)
    }

    pub fn file(&self, filepath: &str) -> Option<&FileReport> {
        self.reports.iter().find(|r| r.filepath() == filepath)
    }

    pub fn get_file(&self, filepath: &str) -> Result<FileDetail> {
        self.file(filepath)
            .map(FileReport::detail)
            .ok_or_else(|| CoreError::FileNotInScan {
                filepath: filepath.to_string(),
                scan_id: self.id,
            })
    }

    pub fn export_report(&self) -> ProjectReport {
        ProjectReport::build(
            self.id,
            self.project_path.clone(),
            &self.reports,
            self.recommendations.clone(),
            &self.thresholds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::classified;
    use crate::report::FileStatus;

    fn snapshot() -> ScanSnapshot {
        ScanSnapshot::build(
            "proj",
            1,
            1,
            vec![
                FileReport::new("src/a.c", vec![classified("src/a.c", 1, "TOO_LONG_LINE")]),
                FileReport::new("src/b.c", vec![]),
            ],
            ParseStats::default(),
            &RecommendationThresholds::default(),
        )
    }

    #[test]
    fn snapshots_get_distinct_ids() {
        assert_ne!(snapshot().id(), snapshot().id());
    }

    #[test]
    fn lookups() {
        let snap = snapshot();
        assert_eq!(snap.summary().total_files, 2);
        assert_eq!(snap.summary().success_rate, 50.0);
        assert!(!snap.recommendations().is_empty());

        let ok = snap.list_files(&FileFilter::default().with_status(FileStatus::Ok));
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].filepath(), "src/b.c");

        assert_eq!(snap.get_file("src/a.c").unwrap().error_count, 1);
        assert!(matches!(
            snap.get_file("src/zzz.c"),
            Err(CoreError::FileNotInScan { .. })
        ));
    }

    #[test]
    fn export_carries_the_scan_id() {
        let snap = snapshot();
        let report = snap.export_report();
        assert_eq!(report.scan_id, snap.id());
        assert_eq!(report.recommendations, snap.recommendations());
        assert_eq!(report.files.len(), 2);
    }
}
