use serde::Serialize;
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub insertions: usize,
    pub deletions: usize,
}

/// Unified diffs between a file and its corrected version.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    context_radius: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self { context_radius: 3 }
    }
}

impl DiffEngine {
    pub fn new(context_radius: usize) -> Self {
        Self { context_radius }
    }

    /// Empty when the texts are equal.
    pub fn unified(&self, path: &str, old: &str, new: &str) -> String {
        if old == new {
            return String::new();
        }
        TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(self.context_radius)
            .header(&format!("a/{}", path), &format!("b/{}", path))
            .to_string()
    }

    pub fn stats(&self, old: &str, new: &str) -> DiffStats {
        let diff = TextDiff::from_lines(old, new);
        let mut stats = DiffStats::default();
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => stats.insertions += 1,
                ChangeTag::Delete => stats.deletions += 1,
                ChangeTag::Equal => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_diff_has_headers_and_hunks() {
        let engine = DiffEngine::default();
        let diff = engine.unified("src/a.c", "int x;  \nint y;\n", "int x;\nint y;\n");
        assert!(diff.starts_with("--- a/src/a.c\n+++ b/src/a.c\n"));
        assert!(diff.contains("-int x;  \n"));
        assert!(diff.contains("+int x;\n"));
        assert!(diff.contains(" int y;\n"));
    }

    #[test]
    fn equal_texts_produce_nothing() {
        let engine = DiffEngine::default();
        assert_eq!(engine.unified("a.c", "x\n", "x\n"), "");
        assert_eq!(engine.stats("x\n", "x\n"), DiffStats::default());
    }

    #[test]
    fn stats_count_lines() {
        let stats = DiffEngine::new(0).stats("a\nb\nc\n", "a\nb1\nb2\nc\n");
        assert_eq!(stats, DiffStats { insertions: 2, deletions: 1 });
    }
}
