//! Per-line C lexer that only knows what it takes to bound an edit: which
//! bytes are code (not inside a comment, string or char literal), where a
//! `//` comment starts, and how many `{` are still open.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    BlockComment,
    Str,
    Chr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    code: Vec<bool>,
    pub starts_in_comment: bool,
    pub ends_in_comment: bool,
    /// Byte offset of a `//` comment.
    pub line_comment: Option<usize>,
    /// Unclosed `{` in the code of all preceding lines.
    pub depth_before: usize,
}

impl LineInfo {
    pub fn is_code(&self, byte: usize) -> bool {
        self.code.get(byte).copied().unwrap_or(false)
    }

    /// Whether every byte of `range` is code.
    pub fn is_code_range(&self, start: usize, end: usize) -> bool {
        (start..end).all(|i| self.is_code(i))
    }

    /// Byte offsets of code bytes equal to `b`.
    pub fn code_positions<'a>(&'a self, text: &'a str, b: u8) -> impl Iterator<Item = usize> + 'a {
        text.bytes()
            .enumerate()
            .filter(move |(i, c)| *c == b && self.is_code(*i))
            .map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    lines: Vec<LineInfo>,
}

impl SourceMap {
    pub fn build<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut in_block = false;
        let mut depth: usize = 0;
        let mut out = Vec::new();

        for text in lines {
            let info = lex_line(text, in_block, depth);
            in_block = info.ends_in_comment;
            for (i, b) in text.bytes().enumerate() {
                if !info.is_code(i) {
                    continue;
                }
                match b {
                    b'{' => depth += 1,
                    b'}' => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            out.push(info);
        }

        Self { lines: out }
    }

    /// 1-based.
    pub fn info(&self, line_no: usize) -> Option<&LineInfo> {
        line_no.checked_sub(1).and_then(|idx| self.lines.get(idx))
    }
}

/// Code mask of a single line that does not start inside a comment.
pub fn lex_standalone(text: &str) -> LineInfo {
    lex_line(text, false, 0)
}

fn lex_line(text: &str, in_block: bool, depth_before: usize) -> LineInfo {
    let bytes = text.as_bytes();
    let mut code = vec![false; bytes.len()];
    let mut line_comment = None;
    let mut state = if in_block { State::BlockComment } else { State::Code };
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match bytes[i] {
                b'/' if next == Some(b'/') => {
                    line_comment = Some(i);
                    break;
                }
                b'/' if next == Some(b'*') => {
                    state = State::BlockComment;
                    i += 2;
                    continue;
                }
                b'"' => state = State::Str,
                b'\'' => state = State::Chr,
                _ => code[i] = true,
            },
            State::BlockComment => {
                if bytes[i] == b'*' && next == Some(b'/') {
                    state = State::Code;
                    i += 2;
                    continue;
                }
            }
            State::Str | State::Chr => {
                let quote = if state == State::Str { b'"' } else { b'\'' };
                if bytes[i] == b'\\' {
                    i += 2;
                    continue;
                }
                if bytes[i] == quote {
                    state = State::Code;
                }
            }
        }
        i += 1;
    }

    LineInfo {
        code,
        starts_in_comment: in_block,
        // Literals never continue on the next line.
        ends_in_comment: state == State::BlockComment,
        line_comment,
        depth_before,
    }
}
