use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Last line of a file without a trailing newline.
    None,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub text: String,
    pub ending: LineEnding,
}

/// A bounded, contiguous rewrite of lines `start_line..=end_line` (1-based).
///
/// `replacement_lines` may be empty (removal) or longer than the span.
/// An insertion before line `n` is expressed by rewriting `n - 1` and `n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start_line: usize,
    pub end_line: usize,
    pub replacement_lines: Vec<String>,
}

impl TextEdit {
    pub fn single(line: usize, replacement_lines: Vec<String>) -> Self {
        Self {
            start_line: line,
            end_line: line,
            replacement_lines,
        }
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start_line <= end && start <= self.end_line
    }

    pub fn span_len(&self) -> usize {
        self.end_line + 1 - self.start_line
    }
}

/// Source text split into lines that remember their own terminator, so
/// rendering an untouched arena gives back the input byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineArena {
    lines: Vec<SourceLine>,
}

impl LineArena {
    pub fn parse(text: &str) -> Self {
        let lines = text
            .split_inclusive('\n')
            .map(|chunk| {
                if let Some(body) = chunk.strip_suffix("\r\n") {
                    SourceLine { text: body.to_string(), ending: LineEnding::CrLf }
                } else if let Some(body) = chunk.strip_suffix('\n') {
                    SourceLine { text: body.to_string(), ending: LineEnding::Lf }
                } else {
                    SourceLine { text: chunk.to_string(), ending: LineEnding::None }
                }
            })
            .collect();
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 1-based.
    pub fn line(&self, line_no: usize) -> Option<&str> {
        line_no
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(|l| l.text.as_str())
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.text.as_str())
    }

    /// First terminator of the file, `\n` when there is none.
    pub fn dominant_ending(&self) -> LineEnding {
        self.lines
            .iter()
            .map(|l| l.ending)
            .find(|e| *e != LineEnding::None)
            .unwrap_or(LineEnding::Lf)
    }

    /// Replace the span of `edit`. Inserted lines reuse the span's first
    /// terminator; the last new line keeps the span's last terminator so a
    /// missing final newline stays missing.
    pub fn splice(&mut self, edit: &TextEdit) {
        let start = edit.start_line - 1;
        let end = edit.end_line.min(self.lines.len());
        let last_ending = self.lines[end - 1].ending;
        let inner_ending = match self.lines[start].ending {
            LineEnding::None => self.dominant_ending(),
            ending => ending,
        };

        let count = edit.replacement_lines.len();
        let new_lines: Vec<SourceLine> = edit
            .replacement_lines
            .iter()
            .enumerate()
            .map(|(i, text)| SourceLine {
                text: text.clone(),
                ending: if i + 1 == count { last_ending } else { inner_ending },
            })
            .collect();

        // Lines outside the span keep their terminators, even when the removed
        // tail had none.
        self.lines.splice(start..end, new_lines);
    }

    pub fn render(&self) -> String {
        let size = self.lines.iter().map(|l| l.text.len() + 2).sum();
        let mut out = String::with_capacity(size);
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(line.ending.as_str());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_byte_exact() {
        for text in ["", "a", "a\n", "a\r\nb\n", "a\n\n\nb", "\r\n", "x\ry\n"] {
            assert_eq!(LineArena::parse(text).render(), text);
        }
    }

    #[test]
    fn splice_keeps_neighbours_and_endings() {
        let mut arena = LineArena::parse("one\r\ntwo\r\nthree");
        arena.splice(&TextEdit::single(2, vec!["2a".into(), "2b".into()]));
        assert_eq!(arena.render(), "one\r\n2a\r\n2b\r\nthree");

        arena.splice(&TextEdit::single(4, vec!["3a".into(), "3b".into()]));
        assert_eq!(arena.render(), "one\r\n2a\r\n2b\r\n3a\r\n3b");
    }

    #[test]
    fn removing_lines() {
        let mut arena = LineArena::parse("a\n\nb\n");
        arena.splice(&TextEdit::single(2, vec![]));
        assert_eq!(arena.render(), "a\nb\n");

        let mut arena = LineArena::parse("a\nb");
        arena.splice(&TextEdit::single(2, vec![]));
        assert_eq!(arena.render(), "a\n");
    }

    #[test]
    fn dropping_an_unterminated_tail_keeps_the_line_above() {
        let mut arena = LineArena::parse("a\r\n  ");
        arena.splice(&TextEdit::single(2, vec![]));
        assert_eq!(arena.render(), "a\r\n");
    }

    #[test]
    fn overlap_is_inclusive() {
        let edit = TextEdit { start_line: 3, end_line: 4, replacement_lines: vec![] };
        assert!(edit.overlaps(4, 4));
        assert!(edit.overlaps(1, 3));
        assert!(!edit.overlaps(5, 9));
        assert!(!edit.overlaps(1, 2));
    }
}
