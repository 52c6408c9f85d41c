// Rules module - 规则分类系统
// 规则表、YAML 规则包加载以及诊断分类结果

pub mod loader;
pub mod model;
pub mod registry;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::rules::model::{Category, Classification, Transform};
use crate::scanner::Diagnostic;

static RATIO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\s*/\s*(\d+)\)").unwrap());

/// A diagnostic together with the classification its rule code maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedDiagnostic {
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
    pub classification: Classification,
}

impl ClassifiedDiagnostic {
    pub fn is_auto_fixable(&self) -> bool {
        self.classification.auto_fixable
    }

    pub fn category(&self) -> Category {
        self.classification.category
    }

    /// Transform the correction engine should run, if any is known.
    pub fn transform(&self) -> Option<Transform> {
        self.classification
            .transform
            .or_else(|| self.classification.category.default_transform())
    }

    /// Fix suggestion enriched with the numbers found in the message,
    /// e.g. `line too long (92/80)` asks to reduce by 12 characters.
    pub fn fix_hint(&self) -> String {
        let base = &self.classification.fix_suggestion;
        let unit = match self.classification.category {
            Category::LineLength => "characters",
            Category::FuncLength => "lines",
            Category::ParamCount => "parameters",
            _ => return base.clone(),
        };

        let Some(caps) = RATIO_PATTERN.captures(&self.diagnostic.raw_message) else {
            return base.clone();
        };
        let current: usize = caps[1].parse().unwrap_or(0);
        let limit: usize = caps[2].parse().unwrap_or(0);
        if current > limit {
            format!("{} (reduce by {} {})", base, current - limit, unit)
        } else {
            base.clone()
        }
    }
}
