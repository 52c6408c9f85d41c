use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry entry for one linter rule code.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    #[serde(default)]
    pub auto_fixable: bool,
    #[serde(default = "default_fix_suggestion")]
    pub fix_suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_fix_suggestion() -> String {
    "Manual fix required".to_string()
}

impl Rule {
    pub fn new(id: impl Into<String>, category: Category, severity: Severity) -> Self {
        Self {
            id: id.into(),
            category,
            severity,
            auto_fixable: false,
            fix_suggestion: default_fix_suggestion(),
            transform: None,
            description: None,
        }
    }

    pub fn fixable_with(mut self, transform: Transform) -> Self {
        self.auto_fixable = true;
        self.transform = Some(transform);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.fix_suggestion = suggestion.into();
        self
    }

    pub fn classification(&self) -> Classification {
        Classification {
            category: self.category,
            severity: self.severity,
            auto_fixable: self.auto_fixable,
            fix_suggestion: self.fix_suggestion.clone(),
            transform: self.transform,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[serde(alias = "HIGH", alias = "CRITICAL")]
    Error,
    #[serde(alias = "LOW", alias = "MEDIUM")]
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
        }
    }
}

/// Norm violation families. The declaration order is the report order.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    LineLength,
    FuncLength,
    ParamCount,
    Indentation,
    Spacing,
    Header,
    Comment,
    BracePlacement,
    Declaration,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Self::LineLength,
        Self::FuncLength,
        Self::ParamCount,
        Self::Indentation,
        Self::Spacing,
        Self::Header,
        Self::Comment,
        Self::BracePlacement,
        Self::Declaration,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LineLength => "LINE_LENGTH",
            Self::FuncLength => "FUNC_LENGTH",
            Self::ParamCount => "PARAM_COUNT",
            Self::Indentation => "INDENTATION",
            Self::Spacing => "SPACING",
            Self::Header => "HEADER",
            Self::Comment => "COMMENT",
            Self::BracePlacement => "BRACE_PLACEMENT",
            Self::Declaration => "DECLARATION",
            Self::Other => "OTHER",
        }
    }

    /// Tie-break when two edits start on the same line; lower wins.
    pub fn fix_priority(&self) -> u8 {
        match self {
            Self::Header => 0,
            Self::BracePlacement => 1,
            Self::LineLength => 2,
            Self::Indentation => 3,
            Self::Spacing => 4,
            Self::Comment => 5,
            Self::Declaration => 6,
            Self::ParamCount => 7,
            Self::FuncLength => 8,
            Self::Other => 9,
        }
    }

    /// Rewrite used when a rule is auto-fixable but names no transform.
    pub fn default_transform(&self) -> Option<Transform> {
        match self {
            Self::LineLength => Some(Transform::WrapLine),
            Self::Indentation => Some(Transform::Reindent),
            Self::Spacing => Some(Transform::NormalizeSpacing),
            Self::Header => Some(Transform::InsertHeader),
            Self::Comment => Some(Transform::BlockComment),
            Self::BracePlacement => Some(Transform::BraceOwnLine),
            Self::FuncLength | Self::ParamCount | Self::Declaration | Self::Other => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Named, deterministic source rewrites the correction engine knows.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    WrapLine,
    Reindent,
    TabsForSpaces,
    SpaceAfterKeyword,
    TabBeforeName,
    SpaceForTab,
    NormalizeSpacing,
    TrimTrailing,
    DropBlankLine,
    BlankLineBefore,
    BraceOwnLine,
    BlockComment,
    InsertHeader,
}

/// Metadata attached to a diagnostic; a pure function of the rule code.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub severity: Severity,
    pub auto_fixable: bool,
    pub fix_suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuleSet {
    pub name: String,
    pub version: String,
    pub rules: Vec<Rule>,
}
