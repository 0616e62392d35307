//! Operator, keyword, and token-pattern tables (spec.md §4.1).
//!
//! All tables are read-only `once_cell` statics built once per process,
//! the way `lumen-rt` and `lumen-cli` build their own regex-driven lookup
//! tables — no table is rebuilt per call, and nothing here is mutated after
//! first use.

use crate::compiler::tokens::TokenCategory;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static token pattern must compile")
}

/// Compound keyword forms that must be matched before their single-word
/// prefixes (`End If` before a bare `End`, `On Error Resume Next` before a
/// bare `On Error`). Order within this list is itself significant: longer,
/// more specific alternatives precede shorter ones.
pub static COMPOUND_PATTERNS: Lazy<Vec<(Regex, TokenCategory, &'static str)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)^End\s+If\b"), TokenCategory::EndXx, "End If"),
        (re(r"(?i)^End\s+Sub\b"), TokenCategory::EndXx, "End Sub"),
        (
            re(r"(?i)^End\s+Function\b"),
            TokenCategory::EndXx,
            "End Function",
        ),
        (
            re(r"(?i)^End\s+Select\b"),
            TokenCategory::EndXx,
            "End Select",
        ),
        (
            re(r"(?i)^End\s+While\b"),
            TokenCategory::EndXx,
            "End While",
        ),
        (re(r"(?i)^End\s+With\b"), TokenCategory::EndXx, "End With"),
        (re(r"(?i)^End\s+Type\b"), TokenCategory::EndXx, "End Type"),
        (
            re(r"(?i)^On\s+Error\s+Resume\s+Next\b"),
            TokenCategory::OnError,
            "On Error Resume Next",
        ),
        (
            re(r"(?i)^On\s+Error\s+GoTo\s+0\b"),
            TokenCategory::OnError,
            "On Error GoTo 0",
        ),
        (
            re(r"(?i)^On\s+Error\s+GoTo\b"),
            TokenCategory::OnError,
            "On Error GoTo",
        ),
        (
            re(r"(?i)^On\s+Error\b"),
            TokenCategory::OnError,
            "On Error",
        ),
        (
            re(r"(?i)^Exit\s+Sub\b"),
            TokenCategory::Exit,
            "Exit Sub",
        ),
        (
            re(r"(?i)^Exit\s+Function\b"),
            TokenCategory::Exit,
            "Exit Function",
        ),
        (re(r"(?i)^Exit\s+For\b"), TokenCategory::Exit, "Exit For"),
        (re(r"(?i)^Exit\s+Do\b"), TokenCategory::Exit, "Exit Do"),
    ]
});

/// Operator lexemes, multi-character sequences before single-character ones
/// (`<>` before `<`/`>`, `:=` before `:`).
pub static OPERATOR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"^:="),
        re(r"^<>"),
        re(r"^<="),
        re(r"^>="),
        re(r"^="),
        re(r"^<"),
        re(r"^>"),
        re(r"^\+"),
        re(r"^-"),
        re(r"^\*"),
        re(r"^/"),
        re(r"^\\"),
        re(r"^\^"),
        re(r"^&"),
    ]
});

/// Single structural punctuation characters, the `CHR` catch-all category.
pub static CHR_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"^[(),.\[\]:;!]"));

pub static NUM_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"^[0-9]+(\.[0-9]+)?[&#]?"));
pub static HEX_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"(?i)^&H[0-9A-F]+"));
pub static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"^#[^#\n]*#"));
pub static STR_PATTERN: Lazy<Regex> = Lazy::new(|| re(r#"^"(?:[^"]|"")*""#));
pub static IDENT_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"^[A-Za-z_][A-Za-z0-9_]*"));

/// Case-insensitive keyword spelling -> (canonical mixed-case spelling, category).
///
/// Anything not present here, but shaped like an identifier, is an `Id`.
pub static KEYWORD_TABLE: Lazy<HashMap<&'static str, (&'static str, TokenCategory)>> =
    Lazy::new(|| {
        use TokenCategory::*;
        let mut m = HashMap::new();
        let mut add = |lower: &'static str, canon: &'static str, cat: TokenCategory| {
            m.insert(lower, (canon, cat));
        };
        add("if", "If", Key);
        add("then", "Then", Key);
        add("else", "Else", Key);
        add("elseif", "ElseIf", Key);
        add("end", "End", End);
        add("for", "For", Key);
        add("each", "Each", Key);
        add("to", "To", Key);
        add("downto", "Downto", Key);
        add("step", "Step", Key);
        add("next", "Next", Key);
        add("do", "Do", Key);
        add("while", "While", Key);
        add("until", "Until", Key);
        add("loop", "Loop", Key);
        add("wend", "Wend", Key);
        add("sub", "Sub", Key);
        add("function", "Function", Key);
        add("call", "Call", Key);
        add("select", "Select", Key);
        add("case", "Case", Key);
        add("with", "With", Key);
        add("type", "Type", Key);
        add("as", "As", Key);
        add("new", "New", Key);
        add("byval", "ByVal", Key);
        add("byref", "ByRef", Key);
        add("optional", "Optional", Key);
        add("dim", "Dim", Key);
        add("redim", "ReDim", Key);
        add("global", "Global", Key);
        add("const", "Const", Key);
        add("and", "And", Op);
        add("or", "Or", Op);
        add("xor", "Xor", Op);
        add("not", "Not", Op);
        add("is", "Is", Op);
        add("isnot", "IsNot", Op);
        add("mod", "Mod", Op);
        add("like", "Like", Key);
        add("let", "Let", Toss);
        add("set", "Set", Toss);
        add("public", "Public", Toss);
        add("private", "Private", Toss);
        add("friend", "Friend", Toss);
        add("static", "Static", Toss);
        add("get", "Get", Key);
        add("on", "On", Key);
        add("error", "Error", Key);
        add("resume", "Resume", Key);
        add("goto", "GoTo", Key);
        add("attribute", "Attribute", Punt);
        add("option", "Option", Punt);
        add("declare", "Declare", Punt);
        add("open", "Open", Punt);
        add("close", "Close", Punt);
        add("print", "Print", Punt);
        add("input", "Input", Punt);
        add("write", "Write", Punt);
        add("true", "True", Key);
        add("false", "False", Key);
        add("nothing", "Nothing", Key);
        add("me", "Me", Key);
        add("in", "In", Key);
        add("integer", "Integer", Type);
        add("long", "Long", Type);
        add("single", "Single", Type);
        add("double", "Double", Type);
        add("string", "String", Type);
        add("boolean", "Boolean", Type);
        add("variant", "Variant", Type);
        add("byte", "Byte", Type);
        add("date", "Date", Type);
        add("object", "Object", Type);
        add("currency", "Currency", Type);
        add("decimal", "Decimal", Type);
        m
    });

/// Built-in type names recognized after `As`.
pub static TYPE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "integer", "long", "single", "double", "string", "boolean", "variant", "byte", "date",
        "object", "currency", "decimal",
    ]
    .into_iter()
    .collect()
});

/// VBA operator lexeme -> JS operator spelling (spec.md §4.1 table).
/// `^` (exponentiation) has no infix JS spelling; callers must rewrite it to
/// a call to a runtime `exp()` helper instead of splicing this text inline.
pub fn operator_js(op_text: &str) -> &'static str {
    match op_text {
        "=" => " == ",
        "<>" => " != ",
        "<=" => " <= ",
        ">=" => " >= ",
        "<" => " < ",
        ">" => " > ",
        "&" => " + ",
        "+" => " + ",
        "-" => " - ",
        "*" => " * ",
        "/" => " / ",
        "\\" => " / ",
        "Xor" => " ^ ",
        "And" => " && ",
        "Or" => " || ",
        "Is" => " == ",
        "IsNot" => " != ",
        "Mod" => " % ",
        "Not" => "!",
        "New" => "new ",
        other => other,
    }
}

/// Pre-parse line-level canonicalization regexes (spec.md §4.2):
/// `Property Get/Let/Set` -> `Function Get/Let/Set`; `End Property` -> `End
/// Function`; strip a leading visibility modifier before a declaration
/// keyword.
pub static PROPERTY_GET_LET_SET: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bProperty\s+(Get|Let|Set)\b"));
pub static END_PROPERTY: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bEnd\s+Property\b"));
pub static VISIBILITY_MODIFIER: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\b(Public|Private|Friend|Static)\s+(?=(Sub|Function|Dim|Global|Const|Declare)\b)")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_end_matches_before_bare_end() {
        let (_, cat, canon) = COMPOUND_PATTERNS
            .iter()
            .find(|(re, _, _)| re.is_match("End If"))
            .expect("End If should match a compound pattern");
        assert_eq!(*cat, TokenCategory::EndXx);
        assert_eq!(*canon, "End If");
    }

    #[test]
    fn on_error_resume_next_matches_longest_alternative_first() {
        let idx = COMPOUND_PATTERNS
            .iter()
            .position(|(re, _, _)| re.is_match("On Error Resume Next"))
            .unwrap();
        let (re, cat, canon) = &COMPOUND_PATTERNS[idx];
        assert!(re.find("On Error Resume Next").unwrap().as_str().len() > "On Error".len());
        assert_eq!(*cat, TokenCategory::OnError);
        assert_eq!(*canon, "On Error Resume Next");
    }

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        let (canon, cat) = KEYWORD_TABLE.get("iF".to_lowercase().as_str()).unwrap();
        assert_eq!(*canon, "If");
        assert_eq!(*cat, TokenCategory::Key);
    }

    #[test]
    fn operator_table_orders_multichar_before_single_char() {
        // <> must be attempted before < and >
        let lt_gt_pos = OPERATOR_PATTERNS
            .iter()
            .position(|re| re.as_str() == r"^<>")
            .unwrap();
        let lt_pos = OPERATOR_PATTERNS
            .iter()
            .position(|re| re.as_str() == r"^<")
            .unwrap();
        assert!(lt_gt_pos < lt_pos);
    }

    #[test]
    fn operator_js_table_matches_spec() {
        assert_eq!(operator_js("="), " == ");
        assert_eq!(operator_js("<>"), " != ");
        assert_eq!(operator_js("And"), " && ");
        assert_eq!(operator_js("Or"), " || ");
        assert_eq!(operator_js("Mod"), " % ");
        assert_eq!(operator_js("Not"), "!");
        assert_eq!(operator_js("New"), "new ");
    }
}
