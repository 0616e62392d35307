//! The translator's single failure surface (spec.md §7).
//!
//! Modeled on `lumen-compiler`'s `LexError`/`ParseError`: a `thiserror`
//! enum of structured variants rather than a bare string, but — per spec.md
//! §7, which describes "a single parse-error variant with a message
//! discriminator" — all variants are carried by one public `ParseError`
//! struct so callers match on one type instead of threading several error
//! enums through the pipeline the way the teacher's `CompileError` wraps
//! several stage-specific error types.

use thiserror::Error;

/// The discriminator for a [`ParseError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Indentation depth was non-zero at end of input.
    #[error("unbalanced nesting")]
    Nesting,
    /// Dispatch reached `(EOF)` while an enclosing construct was still open.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// The tokenizer found no pattern matching the residue.
    #[error("unknown token near '{0}'")]
    UnknownToken(String),
    /// More than 1000 consecutive peeks occurred without an intervening
    /// consume.
    #[error("runaway peek (possible infinite loop on malformed input)")]
    RunawayPeek,
    /// `End With` was seen with no matching open `With`.
    #[error("'End With' without a matching 'With'")]
    EmptyWithStack,
}

/// A fatal translation error: its message, the 1-based source line it
/// occurred on (`-1` if unknown), and the offending line's text.
///
/// `Display` renders exactly spec.md §7's textual form: `message at line N
/// (line-text)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line} ({text})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: i64,
    pub text: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, line: i64, text: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            text: text.into(),
        }
    }

    pub fn unknown_line(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            line: -1,
            text: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_spec_textual_form() {
        let e = ParseError::new(ParseErrorKind::EmptyWithStack, 7, "End With");
        assert_eq!(
            e.to_string(),
            "'End With' without a matching 'With' at line 7 (End With)"
        );
    }

    #[test]
    fn unknown_line_uses_sentinel() {
        let e = ParseError::unknown_line(ParseErrorKind::Nesting);
        assert_eq!(e.line, -1);
    }
}
