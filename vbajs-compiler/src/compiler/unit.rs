//! `TranslationUnit` (spec.md §4.3): owns the whole-file line buffer, the
//! cursor over it, Sub/Function nesting depth, the name of the
//! Sub/Function currently being translated, and the set of user-defined
//! `Type` names collected so far.

use crate::compiler::error::{ParseError, ParseErrorKind};
use crate::compiler::line::Line;
use crate::compiler::scope::Scope;
use std::collections::HashSet;

/// Drives the line buffer: cleanup (trim, continuation-merge, one-line-If
/// expansion), cursor advancement, and the bookkeeping `Converter` needs
/// across statements (nesting depth, enclosing function name, user `Type`
/// names).
pub struct TranslationUnit {
    lines: Vec<String>,
    cursor: usize,
    current: Option<Line>,
    pub scope: Scope,
    pub depth: i32,
    pub function_name: Option<String>,
    pub sub_nesting: i32,
    pub type_names: HashSet<String>,
}

impl TranslationUnit {
    /// Build a unit from raw physical lines: trim trailing whitespace,
    /// merge `_`-continuations into their owning line, expand one-line
    /// `If ... Then ...` into the multi-line form the `Converter`'s
    /// statement dispatch expects, then append the `(EOF)` sentinel line.
    pub fn new(raw_lines: &[&str]) -> Self {
        let merged = merge_continuations(raw_lines);
        let mut lines: Vec<String> = Vec::with_capacity(merged.len());
        for raw in &merged {
            let expanded = expand_one_line_if(raw);
            lines.extend(expanded.split('\n').map(str::to_string));
        }
        lines.push("(EOF)".to_string());

        Self {
            lines,
            cursor: 0,
            current: None,
            scope: Scope::new(),
            depth: 0,
            function_name: None,
            sub_nesting: 0,
            type_names: HashSet::new(),
        }
    }

    /// 1-based line number of the line currently loaded, or the sentinel
    /// `-1` before the first [`TranslationUnit::advance`].
    pub fn line_number(&self) -> i64 {
        self.current.as_ref().map(Line::line_number).unwrap_or(-1)
    }

    /// Load the next physical line into the active [`Line`]. Returns
    /// `false` once the `(EOF)` sentinel has been consumed.
    pub fn advance(&mut self) -> bool {
        if self.cursor >= self.lines.len() {
            return false;
        }
        let text = self.lines[self.cursor].clone();
        let line_number = (self.cursor + 1) as i64;
        self.cursor += 1;
        self.current = Some(Line::new(&text, line_number));
        true
    }

    /// True once the cursor has consumed the `(EOF)` sentinel line.
    pub fn at_eof(&self) -> bool {
        self.cursor >= self.lines.len() && self.current.is_none()
    }

    pub fn is_eof_line(&self) -> bool {
        self.current
            .as_ref()
            .map(|l| l.original().trim() == "(EOF)")
            .unwrap_or(false)
    }

    pub fn line(&self) -> &Line {
        self.current.as_ref().expect("TranslationUnit::advance must be called before use")
    }

    pub fn line_mut(&mut self) -> &mut Line {
        self.current.as_mut().expect("TranslationUnit::advance must be called before use")
    }

    /// Disjoint split borrow: the active `Line` mutably and the `Scope`
    /// immutably, for expression-grammar calls like `line.expr(scope)`
    /// without the caller needing to hold two overlapping borrows of
    /// `self` through method calls.
    pub fn line_and_scope(&mut self) -> (&mut Line, &Scope) {
        (
            self.current
                .as_mut()
                .expect("TranslationUnit::advance must be called before use"),
            &self.scope,
        )
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    pub fn enter_sub(&mut self, name: impl Into<String>) {
        self.function_name = Some(name.into());
        self.sub_nesting += 1;
    }

    pub fn exit_sub(&mut self) {
        self.sub_nesting = (self.sub_nesting - 1).max(0);
        if self.sub_nesting == 0 {
            self.function_name = None;
            self.scope.clear_locals();
        }
    }

    pub fn in_sub(&self) -> bool {
        self.sub_nesting > 0
    }

    /// Checked at end of input (spec.md §7): nesting depth must have
    /// returned to zero.
    pub fn check_balanced(&self) -> Result<(), ParseError> {
        if self.depth != 0 {
            return Err(ParseError::new(
                ParseErrorKind::Nesting,
                self.line_number(),
                self.current
                    .as_ref()
                    .map(|l| l.original().to_string())
                    .unwrap_or_default(),
            ));
        }
        Ok(())
    }
}

/// Join a physical line ending in VBA's line-continuation marker (a `_`
/// preceded by whitespace) onto the next line. A trailing `_` NOT preceded
/// by whitespace is just the last character of an identifier and does not
/// continue the line, the same distinction VBA itself makes. A continuation
/// marker inside a quoted string does not count either; detecting that
/// precisely is out of scope here, the same "textual, not lexical" tradeoff
/// `setBrackets` makes.
fn merge_continuations(raw_lines: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut pending = String::new();
    for &raw in raw_lines {
        let trimmed_end = raw.trim_end();
        if let Some(before_underscore) = trimmed_end.strip_suffix('_') {
            if before_underscore.ends_with(char::is_whitespace) {
                pending.push_str(before_underscore.trim_end());
                pending.push(' ');
                continue;
            }
        }
        pending.push_str(raw);
        out.push(std::mem::take(&mut pending));
    }
    if !pending.is_empty() {
        out.push(pending);
    }
    out
}

/// Find the first case-insensitive occurrence of `needle` in `haystack`
/// that falls outside a double-quoted string literal (a doubled `""`
/// inside a string is the escaped-quote form and does not close it),
/// mirroring the `in_string` scan `Line::preprocess` runs for comments.
fn find_unquoted(haystack: &str, needle: &str) -> Option<usize> {
    let chars: Vec<char> = haystack.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() {
        return None;
    }
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '"' {
                if chars.get(i + 1) == Some(&'"') {
                    i += 2;
                    continue;
                }
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            i += 1;
            continue;
        }
        if i + needle.len() <= chars.len()
            && chars[i..i + needle.len()]
                .iter()
                .zip(needle.iter())
                .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
        {
            let byte_idx: usize = chars[..i].iter().map(|c| c.len_utf8()).sum();
            return Some(byte_idx);
        }
        i += 1;
    }
    None
}

/// Expand `If cond Then stmt [Else stmt]` (no trailing `Then` block, all on
/// one physical line) into the multi-line form:
/// ```text
/// If cond Then
/// stmt
/// Else
/// stmt
/// End If
/// ```
/// so the `Converter`'s statement dispatch never has to special-case the
/// one-line form. Lines that already end with `Then` (the block form) are
/// left untouched. The `Then`/`Else` split points are located with a
/// quote-aware scan (`find_unquoted`) so a quoted literal like
/// `" then "` can never be mistaken for the keyword.
fn expand_one_line_if(line: &str) -> String {
    let trimmed = line.trim_start();
    if !trimmed.to_ascii_lowercase().starts_with("if ") {
        return line.to_string();
    }
    let Some(then_pos) = find_unquoted(trimmed, " then ") else {
        return line.to_string();
    };
    let after_then = &trimmed[then_pos + 6..];
    if after_then.trim().is_empty() {
        return line.to_string();
    }
    let cond = trimmed[3..then_pos].trim();
    let rest = after_then;
    let (body, else_body) = match find_unquoted(rest, " else ") {
        Some(else_pos) => (&rest[..else_pos], Some(&rest[else_pos + 6..])),
        None => (rest, None),
    };
    let mut out = format!("If {cond} Then\n{}\n", body.trim());
    if let Some(else_body) = else_body {
        out.push_str("Else\n");
        out.push_str(else_body.trim());
        out.push('\n');
    }
    out.push_str("End If");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_eof_sentinel() {
        let unit = TranslationUnit::new(&["Dim x As Integer"]);
        assert_eq!(unit.lines.last().unwrap(), "(EOF)");
    }

    #[test]
    fn merges_trailing_underscore_continuation() {
        let lines = merge_continuations(&["x = 1 + _", "2"]);
        assert_eq!(lines, vec!["x = 1 + 2".to_string()]);
    }

    #[test]
    fn expands_one_line_if_with_else() {
        let out = expand_one_line_if("If x > 0 Then y = 1 Else y = 2");
        assert_eq!(out, "If x > 0 Then\ny = 1\nElse\ny = 2\nEnd If");
    }

    #[test]
    fn expands_one_line_if_without_else() {
        let out = expand_one_line_if("If x > 0 Then y = 1");
        assert_eq!(out, "If x > 0 Then\ny = 1\nEnd If");
    }

    #[test]
    fn leaves_block_form_if_untouched() {
        let out = expand_one_line_if("If x > 0 Then");
        assert_eq!(out, "If x > 0 Then");
    }

    #[test]
    fn quoted_then_does_not_false_match_the_split_point() {
        let out = expand_one_line_if(r#"If y = " then " And x Then z = 1"#);
        assert_eq!(out, "If y = \" then \" And x Then\nz = 1\nEnd If");
    }

    #[test]
    fn trailing_underscore_on_an_identifier_is_not_a_continuation() {
        let lines = merge_continuations(&["foo_", "bar"]);
        assert_eq!(lines, vec!["foo_".to_string(), "bar".to_string()]);
    }

    #[test]
    fn one_line_if_expansion_becomes_separate_buffer_entries() {
        let unit = TranslationUnit::new(&["If x > 0 Then y = 1 ' note"]);
        assert_eq!(
            unit.lines,
            vec![
                "If x > 0 Then".to_string(),
                "y = 1 ' note".to_string(),
                "End If".to_string(),
                "(EOF)".to_string(),
            ]
        );
    }

    #[test]
    fn sub_nesting_tracks_enter_and_exit() {
        let mut unit = TranslationUnit::new(&[]);
        unit.enter_sub("DoWork");
        assert!(unit.in_sub());
        assert_eq!(unit.function_name.as_deref(), Some("DoWork"));
        unit.exit_sub();
        assert!(!unit.in_sub());
        assert_eq!(unit.function_name, None);
    }

    #[test]
    fn unbalanced_depth_is_reported_at_checkpoint() {
        let mut unit = TranslationUnit::new(&["If x Then"]);
        unit.advance();
        unit.depth = 1;
        let err = unit.check_balanced().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Nesting);
    }
}
