//! Token categories and the `Token` value produced by [`crate::compiler::line::Line`].

use std::fmt;

/// Byte-offset span of a token within the physical line it was lexed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }
}

/// Tagged token category, per spec: OP, ENDXX, EXIT, TOSS, PUNT, KEY, TYPE,
/// ID, DATE, NUM, HEX, STR, COMMENT, CHR, END, ONERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    /// Arithmetic / relational / logical operator lexeme (`=`, `<>`, `And`, `Mod`, ...).
    Op,
    /// Compound block terminator (`End If`, `End Sub`, `End Function`, ...).
    EndXx,
    /// `Exit Sub` / `Exit Function` / `Exit For` / `Exit Do`.
    Exit,
    /// A modifier silently discarded after canonicalization (`Let`, `Set`,
    /// `Public`, `Private`, `Friend`, `Static`).
    Toss,
    /// A construct the translator declines to rewrite (`Attribute`,
    /// `Option`, `Declare`, file I/O keywords).
    Punt,
    /// A recognized VBA keyword other than the categories above.
    Key,
    /// A recognized built-in type name (used after `As`).
    Type,
    /// A plain identifier.
    Id,
    /// A `#m/d/y#` date literal, already rewritten to a quoted string.
    Date,
    /// A decimal numeric literal (type suffix stripped).
    Num,
    /// A `&H...` hex literal, already rewritten to `0x...`.
    Hex,
    /// A double-quoted string literal.
    Str,
    /// A trailing comment (only ever produced by `Line::comment`, not by
    /// `getToken`, since comments are extracted during pre-parse rewrite).
    Comment,
    /// A single structural character not covered by `Op` (`(`, `)`, `,`,
    /// `:`, `.`, `[`, `]`, `;`).
    Chr,
    /// The bare `End` statement (program termination), distinct from the
    /// compound `End <Block>` forms tagged `EndXx`.
    End,
    /// `On Error ...` in any of its forms.
    OnError,
    /// The end-of-stream sentinel, `(EOF)`.
    Eof,
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenCategory::Op => "OP",
            TokenCategory::EndXx => "ENDXX",
            TokenCategory::Exit => "EXIT",
            TokenCategory::Toss => "TOSS",
            TokenCategory::Punt => "PUNT",
            TokenCategory::Key => "KEY",
            TokenCategory::Type => "TYPE",
            TokenCategory::Id => "ID",
            TokenCategory::Date => "DATE",
            TokenCategory::Num => "NUM",
            TokenCategory::Hex => "HEX",
            TokenCategory::Str => "STR",
            TokenCategory::Comment => "COMMENT",
            TokenCategory::Chr => "CHR",
            TokenCategory::End => "END",
            TokenCategory::OnError => "ONERROR",
            TokenCategory::Eof => "EOF",
        };
        write!(f, "{s}")
    }
}

/// A single lexed token: its category, its canonicalized text, and the span
/// it occupied in the line's converted residue.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub category: TokenCategory,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(category: TokenCategory, text: impl Into<String>, span: Span) -> Self {
        Self {
            category,
            text: text.into(),
            span,
        }
    }

    pub fn eof() -> Self {
        Self {
            category: TokenCategory::Eof,
            text: "(EOF)".to_string(),
            span: Span::dummy(),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.category == TokenCategory::Eof
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
