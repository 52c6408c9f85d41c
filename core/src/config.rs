// Config module - 配置
// 所有字段都有默认值, YAML 文件里只需写要覆盖的部分

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::fix::FixOptions;
use crate::report::recommend::RecommendationThresholds;

const MIN_LINE_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormConfig {
    /// Column limit enforced by wrap_line.
    pub max_line_width: usize,
    pub tab_width: usize,
    /// Concurrent files in a bulk fix.
    pub max_workers: usize,
    pub header: HeaderConfig,
    pub backup: BackupConfig,
    pub thresholds: RecommendationThresholds,
    /// Directory of YAML rule packs loaded on top of the built-in table.
    pub rules_dir: Option<PathBuf>,
}

impl Default for NormConfig {
    fn default() -> Self {
        Self {
            max_line_width: 80,
            tab_width: 4,
            max_workers: 4,
            header: HeaderConfig::default(),
            backup: BackupConfig::default(),
            thresholds: RecommendationThresholds::default(),
            rules_dir: None,
        }
    }
}

/// Values written into the 42 header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub author: String,
    pub email: String,
    /// Fixed `YYYY/MM/DD HH:MM:SS` stamp; the engine's creation time if unset.
    pub timestamp: Option<String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            author: "marvin".to_string(),
            email: "marvin@42.fr".to_string(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    /// Relative to the project root unless absolute.
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".norminette_backups"),
        }
    }
}

impl NormConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml_str(&content)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_line_width < MIN_LINE_WIDTH {
            return Err(CoreError::Config(format!(
                "max_line_width must be at least {}, got {}",
                MIN_LINE_WIDTH, self.max_line_width
            )));
        }
        if self.tab_width == 0 {
            return Err(CoreError::Config("tab_width must be positive".to_string()));
        }
        if self.max_workers == 0 {
            return Err(CoreError::Config("max_workers must be positive".to_string()));
        }
        let t = &self.thresholds;
        if !(0.0..=100.0).contains(&t.low_compliance)
            || !(0.0..=100.0).contains(&t.needs_improvement)
            || t.low_compliance > t.needs_improvement
        {
            return Err(CoreError::Config(format!(
                "thresholds must satisfy 0 <= low_compliance ({}) <= needs_improvement ({}) <= 100",
                t.low_compliance, t.needs_improvement
            )));
        }
        Ok(())
    }

    /// Raise the numbers `validate` would reject to their smallest usable
    /// value. A zero worker count would leave bulk fixes waiting forever.
    pub fn clamped(mut self) -> Self {
        let before = (self.max_line_width, self.tab_width, self.max_workers);
        self.max_line_width = self.max_line_width.max(MIN_LINE_WIDTH);
        self.tab_width = self.tab_width.max(1);
        self.max_workers = self.max_workers.max(1);
        if before != (self.max_line_width, self.tab_width, self.max_workers) {
            tracing::warn!(
                max_line_width = self.max_line_width,
                tab_width = self.tab_width,
                max_workers = self.max_workers,
                "configuration values raised to their minimum"
            );
        }
        self
    }

    pub fn fix_options(&self) -> FixOptions {
        FixOptions {
            max_line_width: self.max_line_width,
            tab_width: self.tab_width,
            header: self.header.clone(),
        }
    }
}
