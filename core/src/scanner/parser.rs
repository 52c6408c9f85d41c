use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::Diagnostic;
use crate::error::ParseError;

/// `<filepath>:<line>:<column>: <rule_code>: <message>`
///
/// The path group is lazy so a path holding `:` (`C:\src\a.c`) is split on
/// the first `:<digits>:<digits>:` that is followed by a rule code.
static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<path>.+?):(?P<line>\d+):(?P<col>\d+):[ \t]*(?P<rule>[^\s:]+):[ \t]?(?P<msg>.*)$",
    )
    .unwrap()
});

/// `<filepath>: OK!` / `<filepath>: Error!`
static FILE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<path>.+?): (?P<status>OK|Error)!\s*$").unwrap());

/// `Error: RULE (line: 3, col: 12):<ws>message`
static BLOCK_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:Error|Notice):\s*(?P<rule>[A-Za-z0-9_]+)\s*\(line:\s*(?P<line>\d+),\s*col:\s*(?P<col>\d+)\):\s*(?P<msg>.*)$",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Lines that were expected to be diagnostics.
    pub considered: usize,
    pub parsed: usize,
    pub skipped: usize,
    /// Indented lines trailing a diagnostic; not considered.
    pub context: usize,
    /// `OK!` / `Error!` file headers; not considered.
    pub headers: usize,
}

impl ParseStats {
    fn merge(&mut self, other: &ParseStats) {
        self.considered += other.considered;
        self.parsed += other.parsed;
        self.skipped += other.skipped;
        self.context += other.context;
        self.headers += other.headers;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOutput {
    /// In order of appearance.
    pub diagnostics: Vec<Diagnostic>,
    /// Every file named by a block header.
    pub files: Vec<String>,
    /// Files reported `OK!`.
    pub clean_files: Vec<String>,
    pub stats: ParseStats,
    #[serde(skip)]
    pub errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn merge(&mut self, other: ParseOutput) {
        self.diagnostics.extend(other.diagnostics);
        for file in other.files {
            if !self.files.contains(&file) {
                self.files.push(file);
            }
        }
        for file in other.clean_files {
            if !self.clean_files.contains(&file) {
                self.clean_files.push(file);
            }
        }
        self.stats.merge(&other.stats);
        self.errors.extend(other.errors);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Previous {
    Nothing,
    Diagnostic,
}

/// Turns raw norminette output into [`Diagnostic`] records.
///
/// Accepts the one-line `path:line:col: RULE: message` grammar and the
/// native block format (`path: Error!` followed by `Error: RULE (line: n,
/// col: m): message` entries). Never fails: unparsable lines are counted in
/// [`ParseStats::skipped`] and kept as [`ParseError`]s.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticParser;

impl DiagnosticParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> ParseOutput {
        let mut out = ParseOutput::default();
        let mut previous = Previous::Nothing;
        // File whose `Error!` block we are in.
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let indented = line.starts_with(|c: char| c.is_whitespace());
            if indented && previous == Previous::Diagnostic {
                // Native entries are sometimes indented; everything else here
                // is context the linter prints under a diagnostic.
                if let (Some(caps), Some(path)) = (BLOCK_ENTRY.captures(line), current.as_ref()) {
                    out.stats.considered += 1;
                    match entry_from_caps(&caps, path, line_no) {
                        Ok(diagnostic) => {
                            out.stats.parsed += 1;
                            out.diagnostics.push(diagnostic);
                        }
                        Err(err) => skip(&mut out, err),
                    }
                } else {
                    out.stats.context += 1;
                }
                continue;
            }

            if let Some(caps) = DIAGNOSTIC_LINE.captures(line) {
                out.stats.considered += 1;
                match diagnostic_from_caps(&caps, line_no) {
                    Ok(diagnostic) => {
                        out.stats.parsed += 1;
                        out.diagnostics.push(diagnostic);
                        previous = Previous::Diagnostic;
                    }
                    Err(err) => {
                        skip(&mut out, err);
                        previous = Previous::Nothing;
                    }
                }
                continue;
            }

            if let Some(caps) = FILE_HEADER.captures(line) {
                out.stats.headers += 1;
                let path = caps["path"].trim().to_string();
                if !out.files.contains(&path) {
                    out.files.push(path.clone());
                }
                if &caps["status"] == "OK" {
                    if !out.clean_files.contains(&path) {
                        out.clean_files.push(path);
                    }
                    current = None;
                } else {
                    current = Some(path);
                }
                previous = Previous::Nothing;
                continue;
            }

            out.stats.considered += 1;
            previous = Previous::Nothing;
            if let Some(caps) = BLOCK_ENTRY.captures(line) {
                let Some(path) = current.as_ref() else {
                    skip(&mut out, ParseError::Orphan { line_no });
                    continue;
                };
                match entry_from_caps(&caps, path, line_no) {
                    Ok(diagnostic) => {
                        out.stats.parsed += 1;
                        out.diagnostics.push(diagnostic);
                        previous = Previous::Diagnostic;
                    }
                    Err(err) => skip(&mut out, err),
                }
                continue;
            }

            skip(&mut out, ParseError::Malformed { line_no });
        }

        debug_assert_eq!(out.stats.parsed + out.stats.skipped, out.stats.considered);
        tracing::debug!(
            parsed = out.stats.parsed,
            skipped = out.stats.skipped,
            context = out.stats.context,
            "parsed diagnostic output"
        );
        out
    }
}

fn skip(out: &mut ParseOutput, err: ParseError) {
    tracing::debug!(error = %err, "skipping diagnostic line");
    out.stats.skipped += 1;
    out.errors.push(err);
}

fn position(value: &str, line_no: usize, field: &'static str) -> Result<usize, ParseError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::InvalidPosition { line_no, field }),
    }
}

fn diagnostic_from_caps(caps: &regex::Captures<'_>, line_no: usize) -> Result<Diagnostic, ParseError> {
    let line = position(&caps["line"], line_no, "line")?;
    let column = position(&caps["col"], line_no, "column")?;
    Ok(Diagnostic::new(
        &caps["path"],
        line,
        column,
        &caps["rule"],
        caps["msg"].trim_end(),
    ))
}

fn entry_from_caps(
    caps: &regex::Captures<'_>,
    path: &str,
    line_no: usize,
) -> Result<Diagnostic, ParseError> {
    let line = position(&caps["line"], line_no, "line")?;
    let column = position(&caps["col"], line_no, "column")?;
    Ok(Diagnostic::new(
        path,
        line,
        column,
        &caps["rule"],
        caps["msg"].trim(),
    ))
}
