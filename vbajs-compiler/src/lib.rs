//! Best-effort VBA 6 -> scripting-language source translator (spec.md §1).
//!
//! `convert` (and its line-sequence sibling) are the only public surface:
//! a pure function from input lines to output text, per spec.md §5's "one
//! conversion is a pure function" concurrency model. Each call builds a
//! fresh [`compiler::unit::TranslationUnit`] and is independent of every
//! other call.

pub mod compiler;

pub use compiler::{ParseError, ParseErrorKind};

use compiler::converter;
use compiler::unit::TranslationUnit;

/// Convert a VBA source file already split into lines. Null/empty input
/// (an empty slice) yields an empty string (spec.md §6).
pub fn convert_lines(lines: &[&str]) -> Result<String, ParseError> {
    if lines.is_empty() {
        return Ok(String::new());
    }
    let mut unit = TranslationUnit::new(lines);
    converter::convert(&mut unit)
}

/// Convert a VBA source file given as one string, splitting on the
/// platform line separator first (spec.md §6).
pub fn convert(text: &str) -> Result<String, ParseError> {
    if text.is_empty() {
        return Ok(String::new());
    }
    let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    convert_lines(&lines)
}
