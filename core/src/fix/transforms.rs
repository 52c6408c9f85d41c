//! One deterministic rewrite per [`Transform`]. Every function only touches
//! whitespace, braces placement or comment delimiters, and answers with a
//! [`TextEdit`] or the reason it refused.

use regex::Regex;
use std::sync::LazyLock;

use super::arena::{LineArena, TextEdit};
use super::lexer::{lex_standalone, LineInfo, SourceMap};
use super::FixOptions;
use crate::error::FixError;
use crate::rules::model::Transform;

static KEYWORD_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(if|while|for|switch|return|else)\(").unwrap());

static CONTROL_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(if|else|while|for)\b").unwrap());

const C_KEYWORDS: &[&str] = &[
    "if", "while", "for", "switch", "return", "else", "sizeof", "do",
];

/// Break before these, so the operator starts the continuation line.
const BREAK_BEFORE: &[&str] = &[
    " && ", " || ", " == ", " != ", " <= ", " >= ", " + ", " - ", " * ", " / ", " < ", " > ",
    " ? ", " : ",
];

const HEADER_BORDER: &str =
    "/* ************************************************************************** */";
const HEADER_INNER_WIDTH: usize = 73;

pub(crate) struct TransformContext<'a> {
    pub arena: &'a LineArena,
    pub map: &'a SourceMap,
    pub options: &'a FixOptions,
    pub filename: &'a str,
    pub timestamp: &'a str,
}

impl TransformContext<'_> {
    fn line(&self, n: usize) -> Result<(&str, &LineInfo), FixError> {
        match (self.arena.line(n), self.map.info(n)) {
            (Some(text), Some(info)) => Ok((text, info)),
            _ => Err(FixError::LineOutOfRange { line: n, len: self.arena.len() }),
        }
    }

    fn width(&self, text: &str) -> usize {
        display_width(text, self.options.tab_width)
    }
}

pub(crate) fn build_edit(
    transform: Transform,
    ctx: &TransformContext<'_>,
    line: usize,
) -> Result<TextEdit, FixError> {
    let edit = match transform {
        Transform::WrapLine => wrap_line(ctx, line)?,
        Transform::Reindent => reindent(ctx, line)?,
        Transform::TabsForSpaces => tabs_for_spaces(ctx, line)?,
        Transform::SpaceAfterKeyword => rewrite_line(ctx, line, space_after_keyword)?,
        Transform::TabBeforeName => tab_before_name(ctx, line)?,
        Transform::SpaceForTab => rewrite_line(ctx, line, space_for_tab)?,
        Transform::NormalizeSpacing => rewrite_line(ctx, line, |text, info| {
            let spaced = space_after_keyword(text, info);
            trim_trailing(&spaced, info)
        })?,
        Transform::TrimTrailing => rewrite_line(ctx, line, trim_trailing)?,
        Transform::DropBlankLine => drop_blank_line(ctx, line)?,
        Transform::BlankLineBefore => blank_line_before(ctx, line)?,
        Transform::BraceOwnLine => brace_own_line(ctx, line)?,
        Transform::BlockComment => block_comment(ctx, line)?,
        Transform::InsertHeader => insert_header(ctx, line)?,
    };

    if is_noop(ctx.arena, &edit) {
        return Err(FixError::NoSafeRewrite(format!(
            "{:?} leaves line {} unchanged",
            transform, line
        )));
    }
    Ok(edit)
}

fn is_noop(arena: &LineArena, edit: &TextEdit) -> bool {
    edit.replacement_lines.len() == edit.span_len()
        && edit
            .replacement_lines
            .iter()
            .enumerate()
            .all(|(i, text)| arena.line(edit.start_line + i) == Some(text.as_str()))
}

pub fn display_width(text: &str, tab_width: usize) -> usize {
    let mut width = 0;
    for c in text.chars() {
        if c == '\t' {
            width += tab_width - width % tab_width;
        } else {
            width += 1;
        }
    }
    width
}

fn leading_ws(text: &str) -> &str {
    let end = text.len() - text.trim_start_matches([' ', '\t']).len();
    &text[..end]
}

fn tabs(depth: usize) -> String {
    "\t".repeat(depth)
}

fn rewrite_line<F>(ctx: &TransformContext<'_>, n: usize, f: F) -> Result<TextEdit, FixError>
where
    F: Fn(&str, &LineInfo) -> String,
{
    let (text, info) = ctx.line(n)?;
    Ok(TextEdit::single(n, vec![f(text, info)]))
}

fn refuse_unsafe_line(ctx: &TransformContext<'_>, n: usize, what: &str) -> Result<(), FixError> {
    let (text, info) = ctx.line(n)?;
    if info.starts_in_comment {
        return Err(FixError::NoSafeRewrite(format!("{} inside a block comment", what)));
    }
    if text.trim_start().starts_with('#') {
        return Err(FixError::NoSafeRewrite(format!("{} on a preprocessor line", what)));
    }
    if n > 1 && ctx.arena.line(n - 1).is_some_and(|prev| prev.ends_with('\\')) {
        return Err(FixError::NoSafeRewrite(format!("{} in a macro continuation", what)));
    }
    Ok(())
}

fn wrap_line(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    refuse_unsafe_line(ctx, n, "wrapping")?;
    let (text, info) = ctx.line(n)?;
    let max = ctx.options.max_line_width;
    if ctx.width(text) <= max {
        return Err(FixError::NoSafeRewrite(format!(
            "line already fits in {} columns",
            max
        )));
    }

    let squeezed = squeeze_spaces(text, info);
    if ctx.width(&squeezed) <= max {
        return Ok(TextEdit::single(n, vec![squeezed]));
    }

    let mask = lex_standalone(&squeezed);
    let indent = leading_ws(&squeezed);
    let continuation = format!("{}\t", indent);
    let points = break_points(&squeezed, &mask, indent.len());

    let mut out = Vec::new();
    let mut seg_start = indent.len();
    let mut prefix = indent.to_string();
    loop {
        let rest = &squeezed[seg_start..];
        let whole = format!("{}{}", prefix, rest);
        if ctx.width(&whole) <= max {
            out.push(whole);
            break;
        }

        let chosen = points
            .iter()
            .rev()
            .copied()
            .filter(|&b| b > seg_start && !squeezed[b..].trim().is_empty())
            .find(|&b| {
                let head = squeezed[seg_start..b].trim_end();
                !head.trim().is_empty() && ctx.width(&format!("{}{}", prefix, head)) <= max
            });

        let Some(b) = chosen else {
            return Err(FixError::NoSafeRewrite(format!(
                "no break point keeps line {} within {} columns",
                n, max
            )));
        };
        out.push(format!("{}{}", prefix, squeezed[seg_start..b].trim_end()));
        seg_start = b + (squeezed[b..].len() - squeezed[b..].trim_start().len());
        prefix = continuation.clone();
    }

    Ok(TextEdit::single(n, out))
}

/// Runs of spaces inside the code of a line collapse to one space and
/// trailing whitespace goes away.
fn squeeze_spaces(text: &str, info: &LineInfo) -> String {
    let indent = leading_ws(text).len();
    let body_end = text.trim_end_matches([' ', '\t']).len().max(indent);
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..indent]);
    let mut prev_space = false;
    for (i, c) in text[..body_end].char_indices().skip_while(|(i, _)| *i < indent) {
        if c == ' ' && info.is_code(i) {
            if prev_space {
                continue;
            }
            prev_space = true;
        } else {
            prev_space = false;
        }
        out.push(c);
    }
    out
}

fn break_points(text: &str, mask: &LineInfo, from: usize) -> Vec<usize> {
    let mut points = Vec::new();
    for i in mask.code_positions(text, b',') {
        if i >= from {
            points.push(i + 1);
        }
    }
    for op in BREAK_BEFORE {
        for (k, _) in text.match_indices(op) {
            if k >= from && mask.is_code_range(k, k + op.len()) {
                points.push(k + 1);
            }
        }
    }
    for (k, _) in text.match_indices(" = ") {
        if k >= from && mask.is_code_range(k, k + 3) {
            points.push(k + 2);
        }
    }
    points.sort_unstable();
    points.dedup();
    points
}

fn reindent(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    refuse_unsafe_line(ctx, n, "reindenting")?;
    let (text, info) = ctx.line(n)?;
    let body = text.trim_start_matches([' ', '\t']);
    if body.is_empty() {
        return Err(FixError::NoSafeRewrite("nothing to indent on a blank line".to_string()));
    }

    let mut depth = info.depth_before;
    if body.starts_with('}') {
        depth = depth.saturating_sub(1);
    } else if !body.starts_with('{') && follows_braceless_header(ctx, n) {
        depth += 1;
    }

    Ok(TextEdit::single(n, vec![format!("{}{}", tabs(depth), body)]))
}

fn follows_braceless_header(ctx: &TransformContext<'_>, n: usize) -> bool {
    let prev = (1..n)
        .rev()
        .filter_map(|k| ctx.arena.line(k))
        .map(str::trim)
        .find(|l| !l.is_empty());
    match prev {
        Some(prev) => {
            CONTROL_HEADER.is_match(prev)
                && !prev.ends_with('{')
                && !prev.ends_with(';')
                && !prev.ends_with('}')
        }
        None => false,
    }
}

fn tabs_for_spaces(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    let (text, info) = ctx.line(n)?;
    if info.starts_in_comment {
        return Err(FixError::NoSafeRewrite("indentation inside a block comment".to_string()));
    }
    let indent = leading_ws(text);
    let width = ctx.width(indent);
    let tab = ctx.options.tab_width;
    let new_indent = format!("{}{}", tabs(width / tab), " ".repeat(width % tab));
    Ok(TextEdit::single(n, vec![format!("{}{}", new_indent, &text[indent.len()..])]))
}

fn space_after_keyword(text: &str, info: &LineInfo) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut last = 0;
    for caps in KEYWORD_PAREN.captures_iter(text) {
        let Some(kw) = caps.get(1) else { continue };
        if !info.is_code_range(kw.start(), kw.end() + 1) {
            continue;
        }
        out.push_str(&text[last..kw.end()]);
        out.push(' ');
        last = kw.end();
    }
    out.push_str(&text[last..]);
    out
}

fn tab_before_name(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    refuse_unsafe_line(ctx, n, "aligning a declaration")?;
    let (text, info) = ctx.line(n)?;
    let bytes = text.as_bytes();
    let Some(paren) = info.code_positions(text, b'(').next() else {
        return Err(FixError::NoSafeRewrite("line does not open a parameter list".to_string()));
    };

    let mut name_end = paren;
    while name_end > 0 && bytes[name_end - 1] == b' ' {
        name_end -= 1;
    }
    let mut name_start = name_end;
    while name_start > 0 && (bytes[name_start - 1].is_ascii_alphanumeric() || bytes[name_start - 1] == b'_') {
        name_start -= 1;
    }
    let name = &text[name_start..name_end];
    if name.is_empty() || C_KEYWORDS.contains(&name) {
        return Err(FixError::NoSafeRewrite("no declared name before the parameter list".to_string()));
    }

    let mut stars = name_start;
    while stars > 0 && bytes[stars - 1] == b'*' {
        stars -= 1;
    }
    let mut ws_start = stars;
    while ws_start > 0 && matches!(bytes[ws_start - 1], b' ' | b'\t') {
        ws_start -= 1;
    }
    let indent = leading_ws(text).len();
    if ws_start == stars || ws_start <= indent {
        return Err(FixError::NoSafeRewrite("no return type before the name".to_string()));
    }

    let rewritten = format!("{}\t{}", &text[..ws_start], &text[stars..]);
    Ok(TextEdit::single(n, vec![rewritten]))
}

fn space_for_tab(text: &str, info: &LineInfo) -> String {
    let indent = leading_ws(text).len();
    let body_end = text.trim_end_matches([' ', '\t']).len().max(indent);
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..indent]);
    let mut in_run = false;
    for (i, c) in text[..body_end].char_indices().skip_while(|(i, _)| *i < indent) {
        if c == '\t' && info.is_code(i) {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
            continue;
        }
        in_run = false;
        out.push(c);
    }
    out.push_str(&text[body_end..]);
    out
}

fn trim_trailing(text: &str, _info: &LineInfo) -> String {
    text.trim_end_matches([' ', '\t']).to_string()
}

fn drop_blank_line(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    let (text, _) = ctx.line(n)?;
    if !text.trim().is_empty() {
        return Err(FixError::NoSafeRewrite(format!("line {} is not blank", n)));
    }
    Ok(TextEdit::single(n, Vec::new()))
}

fn blank_line_before(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    let (text, _) = ctx.line(n)?;
    if n == 1 {
        return Err(FixError::NoSafeRewrite("first line has nothing above it".to_string()));
    }
    let (prev, _) = ctx.line(n - 1)?;
    if prev.trim().is_empty() {
        return Err(FixError::NoSafeRewrite("previous line is already blank".to_string()));
    }
    Ok(TextEdit {
        start_line: n - 1,
        end_line: n,
        replacement_lines: vec![prev.to_string(), String::new(), text.to_string()],
    })
}

fn brace_own_line(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    refuse_unsafe_line(ctx, n, "moving braces")?;
    let (text, info) = ctx.line(n)?;
    let indent = leading_ws(text);
    let braces: Vec<usize> = text
        .bytes()
        .enumerate()
        .filter(|(i, b)| matches!(b, b'{' | b'}') && info.is_code(*i))
        .map(|(i, _)| i)
        .collect();
    if braces.is_empty() {
        return Err(FixError::NoSafeRewrite("no brace on the line".to_string()));
    }

    let mut out: Vec<String> = Vec::new();
    let mut depth = info.depth_before;
    let mut seg = indent.len();
    for (k, &i) in braces.iter().enumerate() {
        let before = text[seg..i].trim();
        if !before.is_empty() {
            let lead = if out.is_empty() { indent.to_string() } else { tabs(depth) };
            out.push(format!("{}{}", lead, before));
        }
        if text.as_bytes()[i] == b'{' {
            out.push(format!("{}{{", tabs(depth)));
            depth += 1;
            seg = i + 1;
            continue;
        }

        depth = depth.saturating_sub(1);
        let mut closing = format!("{}}}", tabs(depth));
        seg = i + 1;
        // `};`, `} t_list;` and `} while (x);` stay on the brace line.
        let tail_end = braces.get(k + 1).copied().unwrap_or(text.len());
        let tail = text[seg..tail_end].trim();
        if tail.ends_with(';') && info.line_comment.map_or(true, |c| c >= tail_end) {
            if !tail.starts_with([';', ',']) {
                closing.push(' ');
            }
            closing.push_str(tail);
            seg = tail_end;
        }
        out.push(closing);
    }
    let rest = text[seg..].trim();
    if !rest.is_empty() {
        out.push(format!("{}{}", tabs(depth), rest));
    }

    Ok(TextEdit::single(n, out))
}

fn block_comment(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    let (text, info) = ctx.line(n)?;
    let Some(start) = info.line_comment else {
        return Err(FixError::NoSafeRewrite("no // comment on the line".to_string()));
    };
    let body = text[start + 2..].trim();
    if body.contains("*/") {
        return Err(FixError::NoSafeRewrite("comment text contains */".to_string()));
    }
    if body.is_empty() {
        return Err(FixError::NoSafeRewrite("empty // comment".to_string()));
    }
    let code = text[..start].trim_end_matches([' ', '\t']);
    let rewritten = if code.trim().is_empty() {
        format!("{}/* {} */", leading_ws(text), body)
    } else {
        format!("{} /* {} */", code, body)
    };
    Ok(TextEdit::single(n, vec![rewritten]))
}

fn insert_header(ctx: &TransformContext<'_>, n: usize) -> Result<TextEdit, FixError> {
    let (first, _) = ctx.line(1)?;
    if first.starts_with("/* ****") {
        return Err(FixError::NoSafeRewrite("file already starts with a header".to_string()));
    }
    if n != 1 {
        tracing::debug!(line = n, "header diagnostic not on line 1, inserting at the top");
    }
    let mut lines = header_lines(ctx.filename, ctx.options, ctx.timestamp);
    lines.push(String::new());
    lines.push(first.to_string());
    Ok(TextEdit::single(1, lines))
}

/// The 11-line 42 header, each line exactly 80 columns.
pub fn header_lines(filename: &str, options: &FixOptions, timestamp: &str) -> Vec<String> {
    let author = &options.header.author;
    let email = &options.header.email;
    vec![
        HEADER_BORDER.to_string(),
        framed("", ""),
        framed("", ":::      ::::::::   "),
        framed(filename, ":+:      :+:    :+:   "),
        framed("", "+:+ +:+         +:+     "),
        framed(&format!("By: {} <{}>", author, email), "+#+  +:+       +#+        "),
        framed("", "+#+#+#+#+#+   +#+           "),
        framed(&format!("Created: {} by {}", timestamp, author), "#+#    #+#             "),
        framed(&format!("Updated: {} by {}", timestamp, author), "###   ########.fr       "),
        framed("", ""),
        HEADER_BORDER.to_string(),
    ]
}

fn framed(content: &str, art: &str) -> String {
    let width = HEADER_INNER_WIDTH.saturating_sub(art.chars().count());
    let content: String = content.chars().take(width).collect();
    format!("/*   {:<width$}{}*/", content, art, width = width)
}
