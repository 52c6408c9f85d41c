use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use walkdir::WalkDir;
use crate::rules::model::{Rule, RuleSet};

/// Load every `.yaml`/`.yml` rule pack under `path`.
///
/// A file may hold a whole [`RuleSet`] or a single [`Rule`]. Files that are
/// neither are logged and skipped; only I/O failures abort the walk.
pub fn load_rules_from_dir<P: AsRef<Path>>(path: P) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();

    let mut entries: Vec<_> = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .collect::<std::result::Result<_, _>>()?;
    entries.retain(|entry| entry.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        if let Some(extension) = path.extension() {
            if extension == "yaml" || extension == "yml" {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read rule file: {:?}", path))?;

                // Try to parse as RuleSet first, then as single Rule
                if let Ok(rule_set) = serde_yaml::from_str::<RuleSet>(&content) {
                    tracing::info!(
                        set = %rule_set.name,
                        version = %rule_set.version,
                        count = rule_set.rules.len(),
                        "loaded rule set"
                    );
                    rules.extend(rule_set.rules);
                } else if let Ok(rule) = serde_yaml::from_str::<Rule>(&content) {
                    rules.push(rule);
                } else {
                    tracing::warn!("Failed to parse rule file: {:?}", path);
                }
            }
        }
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Category, Transform};

    #[test]
    fn loads_sets_and_single_rules() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a_set.yaml"),
            r#"
name: local
version: "2"
rules:
  - id: LOCAL_TRAILING
    category: SPACING
    severity: WARNING
    auto_fixable: true
    transform: trim_trailing
  - id: LOCAL_MACRO
    category: OTHER
    severity: ERROR
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b_single.yml"),
            "id: LOCAL_BRACE\ncategory: BRACE_PLACEMENT\nseverity: WARNING\nauto_fixable: true\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("broken.yaml"), "- just\n- a list\n").unwrap();

        let rules = load_rules_from_dir(dir.path()).unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["LOCAL_TRAILING", "LOCAL_MACRO", "LOCAL_BRACE"]);
        assert_eq!(rules[0].transform, Some(Transform::TrimTrailing));
        assert_eq!(rules[2].category, Category::BracePlacement);
        assert!(rules[2].transform.is_none());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_rules_from_dir(dir.path().join("nope")).is_err());
    }
}
