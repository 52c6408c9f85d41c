use serde::{Deserialize, Serialize};

use super::{FileReport, FileStatus};
use crate::rules::model::Category;

/// Criteria for `list_files`. Every criterion that is set must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileFilter {
    pub status: Option<FileStatus>,
    pub category: Option<Category>,
    pub auto_fixable_only: bool,
    /// Case-insensitive substring of the path or file name.
    pub search: Option<String>,
}

impl FileFilter {
    pub fn with_status(mut self, status: FileStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn auto_fixable_only(mut self) -> Self {
        self.auto_fixable_only = true;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn matches(&self, report: &FileReport) -> bool {
        if self.status.is_some_and(|s| s != report.status()) {
            return false;
        }
        if self.category.is_some_and(|c| !report.error_types().contains(&c)) {
            return false;
        }
        if self.auto_fixable_only && !report.has_auto_fixable() {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                report.filepath().to_lowercase().contains(&needle)
                    || report.filename().to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }

    /// Order-preserving.
    pub fn apply<'a>(&self, reports: &'a [FileReport]) -> Vec<&'a FileReport> {
        reports.iter().filter(|r| self.matches(r)).collect()
    }
}
