//! Rule code -> classification lookup.
//!
//! The built-in table is data: adding a norminette rule means adding a row,
//! or registering a [`Rule`] at runtime (YAML rule packs end up here too).
//! Unknown codes never fail; they fall back to [`RuleRegistry::unknown`].

use std::collections::HashMap;

use crate::rules::model::{Category, Classification, Rule, Severity, Transform};
use crate::rules::ClassifiedDiagnostic;
use crate::scanner::Diagnostic;

pub const UNKNOWN_FIX_SUGGESTION: &str = "manual review required";

type BuiltinRow = (&'static str, Category, Severity, Option<Transform>, &'static str);

const BUILTIN_RULES: &[BuiltinRow] = &[
    ("TOO_LONG_LINE", Category::LineLength, Severity::Warning, Some(Transform::WrapLine),
        "Break line at logical points (operators, commas, function calls)"),
    ("LINE_TOO_LONG", Category::LineLength, Severity::Warning, Some(Transform::WrapLine),
        "Break line at logical points (operators, commas, function calls)"),
    ("TOO_MANY_LINES", Category::FuncLength, Severity::Error, None,
        "Split function into smaller, more focused functions"),
    ("TOO_MANY_FUNCS", Category::FuncLength, Severity::Error, None,
        "Move some functions to separate files or combine related functions"),
    ("TOO_MANY_PARAMS", Category::ParamCount, Severity::Warning, None,
        "Use structures to group related parameters or split function"),
    ("TOO_MANY_ARGS", Category::ParamCount, Severity::Warning, None,
        "Use structures to group related parameters or split function"),
    ("SPACE_BEFORE_FUNC", Category::Spacing, Severity::Warning, Some(Transform::TabBeforeName),
        "Separate return type and function name with a single tab"),
    ("SPACE_AFTER_KW", Category::Spacing, Severity::Warning, Some(Transform::SpaceAfterKeyword),
        "Add space after keyword (if, while, for, etc.)"),
    ("SPACE_REPLACE_TAB", Category::Indentation, Severity::Warning, Some(Transform::TabsForSpaces),
        "Replace spaces with tabs for indentation"),
    ("TAB_REPLACE_SPACE", Category::Spacing, Severity::Warning, Some(Transform::SpaceForTab),
        "Replace tab with space where appropriate"),
    ("TAB_INSTEAD_SPC", Category::Spacing, Severity::Warning, Some(Transform::SpaceForTab),
        "Replace tab with space where appropriate"),
    ("SPC_BEFORE_NL", Category::Spacing, Severity::Warning, Some(Transform::TrimTrailing),
        "Remove trailing whitespace"),
    ("SPACE_EMPTY_LINE", Category::Spacing, Severity::Warning, Some(Transform::TrimTrailing),
        "Remove whitespace on empty line"),
    ("INDENT_BRANCH", Category::Indentation, Severity::Warning, Some(Transform::Reindent),
        "Use tabs for indentation, align with proper scope level"),
    ("INDENT_MULT_BRANCH", Category::Indentation, Severity::Warning, Some(Transform::Reindent),
        "Fix indentation in multiple branch structures"),
    ("TOO_FEW_TAB", Category::Indentation, Severity::Warning, Some(Transform::Reindent),
        "Indent with one tab per scope level"),
    ("TOO_MANY_TAB", Category::Indentation, Severity::Warning, Some(Transform::Reindent),
        "Indent with one tab per scope level"),
    ("BRACE_NEWLINE", Category::BracePlacement, Severity::Warning, Some(Transform::BraceOwnLine),
        "Put the brace on its own line"),
    ("BRACE_SHOULD_EOL", Category::BracePlacement, Severity::Warning, Some(Transform::BraceOwnLine),
        "Nothing may follow a brace on its line"),
    ("BRACE_SHOULD_NEWLINE", Category::BracePlacement, Severity::Warning, Some(Transform::BraceOwnLine),
        "Add newline after opening brace"),
    ("VAR_DECL_START_FUNC", Category::Declaration, Severity::Warning, None,
        "Move all variable declarations to the beginning of function"),
    ("DECL_ASSIGN_LINE", Category::Declaration, Severity::Warning, None,
        "Separate variable declaration and assignment"),
    ("TOO_MANY_VARS_FUNC", Category::Declaration, Severity::Error, None,
        "Reduce the number of local variables"),
    ("HEADER_MISSING", Category::Header, Severity::Error, Some(Transform::InsertHeader),
        "Add standard 42 header at the beginning of file"),
    ("INVALID_HEADER", Category::Header, Severity::Error, None,
        "Fix header format to match 42 standard"),
    ("MISSING_IDENTIFIER", Category::Header, Severity::Error, None,
        "Add the missing identifier"),
    ("WRONG_SCOPE_COMMENT", Category::Comment, Severity::Warning, Some(Transform::BlockComment),
        "Use /* */ for multi-line comments, // for single line"),
    ("COMMENT_STYLE", Category::Comment, Severity::Warning, Some(Transform::BlockComment),
        "Use /* */ comment style"),
    ("EMPTY_LINE_FUNCTION", Category::Spacing, Severity::Warning, Some(Transform::DropBlankLine),
        "Remove empty lines inside functions"),
    ("EMPTY_LINE_EOF", Category::Spacing, Severity::Warning, Some(Transform::DropBlankLine),
        "Remove empty line at end of file"),
    ("EMPTY_LINE_FILE_START", Category::Spacing, Severity::Warning, Some(Transform::DropBlankLine),
        "Remove empty line at start of file"),
    ("CONSECUTIVE_NEWLINES", Category::Spacing, Severity::Warning, Some(Transform::DropBlankLine),
        "Remove consecutive empty lines"),
    ("NEWLINE_PRECEDES_FUNC", Category::Spacing, Severity::Warning, Some(Transform::BlankLineBefore),
        "Add newline before function definition"),
];

#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: HashMap<String, Rule>,
    version: u64,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleRegistry {
    /// Registry without any rule; every code classifies as unknown.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            version: 0,
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (code, category, severity, transform, suggestion) in BUILTIN_RULES {
            let mut rule = Rule::new(*code, *category, *severity).with_suggestion(*suggestion);
            if let Some(transform) = transform {
                rule = rule.fixable_with(*transform);
            }
            registry.rules.insert(rule.id.clone(), rule);
        }
        registry.version = 1;
        registry
    }

    /// Add or replace an entry. Bumps the version so cached
    /// classifications can tell they are stale.
    pub fn register(&mut self, rule: Rule) {
        tracing::debug!(rule = %rule.id, category = %rule.category, "registering rule");
        self.rules.insert(rule.id.clone(), rule);
        self.version += 1;
    }

    pub fn extend<I: IntoIterator<Item = Rule>>(&mut self, rules: I) {
        for rule in rules {
            self.register(rule);
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&Rule> {
        self.rules.get(code)
    }

    pub fn unknown() -> Classification {
        Classification {
            category: Category::Other,
            severity: Severity::Warning,
            auto_fixable: false,
            fix_suggestion: UNKNOWN_FIX_SUGGESTION.to_string(),
            transform: None,
        }
    }

    pub fn classify_code(&self, code: &str) -> Classification {
        match self.rules.get(code) {
            Some(rule) => rule.classification(),
            None => {
                tracing::trace!(code, "unknown rule code, classified as OTHER");
                Self::unknown()
            }
        }
    }

    pub fn classify(&self, diagnostic: Diagnostic) -> ClassifiedDiagnostic {
        let classification = self.classify_code(&diagnostic.rule_code);
        ClassifiedDiagnostic {
            diagnostic,
            classification,
        }
    }

    pub fn classify_all(&self, diagnostics: Vec<Diagnostic>) -> Vec<ClassifiedDiagnostic> {
        diagnostics.into_iter().map(|d| self.classify(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_is_other_and_not_fixable() {
        let registry = RuleRegistry::builtin();
        let c = registry.classify_code("rule_x");
        assert_eq!(c.category, Category::Other);
        assert_eq!(c.severity, Severity::Warning);
        assert!(!c.auto_fixable);
        assert_eq!(c.fix_suggestion, UNKNOWN_FIX_SUGGESTION);
    }

    #[test]
    fn classification_is_stable_across_calls() {
        let registry = RuleRegistry::builtin();
        for code in ["TOO_LONG_LINE", "TOO_MANY_LINES", "no_such_rule", ""] {
            assert_eq!(registry.classify_code(code), registry.classify_code(code));
        }
    }

    #[test]
    fn builtin_rules_cover_known_categories() {
        let registry = RuleRegistry::builtin();
        assert_eq!(
            registry.classify_code("TOO_LONG_LINE").category,
            Category::LineLength
        );
        assert!(registry.classify_code("TOO_LONG_LINE").auto_fixable);
        assert_eq!(
            registry.classify_code("TOO_MANY_LINES").category,
            Category::FuncLength
        );
        assert!(!registry.classify_code("TOO_MANY_LINES").auto_fixable);
        assert_eq!(
            registry.classify_code("BRACE_NEWLINE").category,
            Category::BracePlacement
        );
        assert_eq!(
            registry.classify_code("VAR_DECL_START_FUNC").category,
            Category::Declaration
        );
    }

    #[test]
    fn every_fixable_builtin_names_a_transform() {
        let registry = RuleRegistry::builtin();
        for (code, ..) in BUILTIN_RULES {
            let rule = registry.get(code).unwrap();
            assert_eq!(rule.auto_fixable, rule.transform.is_some(), "{}", code);
        }
    }

    #[test]
    fn register_adds_rules_and_bumps_version() {
        let mut registry = RuleRegistry::builtin();
        let before = registry.version();
        assert_eq!(registry.classify_code("rule_x").category, Category::Other);

        registry.register(
            Rule::new("rule_x", Category::Spacing, Severity::Error)
                .fixable_with(Transform::TrimTrailing),
        );

        assert!(registry.version() > before);
        let c = registry.classify_code("rule_x");
        assert_eq!(c.category, Category::Spacing);
        assert_eq!(c.severity, Severity::Error);
        assert!(c.auto_fixable);
    }

    #[test]
    fn empty_registry_classifies_everything_as_unknown() {
        let registry = RuleRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.classify_code("TOO_LONG_LINE"), RuleRegistry::unknown());
    }
}
