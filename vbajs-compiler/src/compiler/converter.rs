//! `Converter` (spec.md §4.4): the statement dispatch driver and the
//! per-statement translators it hands lines off to.
//!
//! Each statement handler owns exactly the physical lines its own
//! construct spans — a one-line statement consumes its line and returns; a
//! block construct (`If`, `For`, `Sub`, ...) advances through its body and
//! consumes its own terminator. The `On Error GoTo label` handler is the
//! one exception: its catch body runs up to, but does not consume, the
//! enclosing `End Sub`/`End Function` (spec.md §4.4), so every block loop
//! here checks `at_eol` before advancing rather than advancing
//! unconditionally — a statement that left its line pre-loaded but
//! un-consumed is picked up again by the next outer iteration instead of
//! being skipped.

use crate::compiler::error::{ParseError, ParseErrorKind};
use crate::compiler::tokens::{Token, TokenCategory};
use crate::compiler::unit::TranslationUnit;

fn indent(depth: i32) -> String {
    "  ".repeat(depth.max(0) as usize)
}

/// Emit a translated line at the current depth, attaching the physical
/// line's trailing comment only once the line's tokens are fully consumed
/// — otherwise a multi-statement `:`-chained line would duplicate its
/// comment onto every sub-statement.
fn emit(unit: &mut TranslationUnit, out: &mut String, text: &str) {
    out.push_str(&indent(unit.depth));
    out.push_str(text);
    if unit.line_mut().at_eol().unwrap_or(true) {
        if let Some(c) = unit.line().comment() {
            if !c.trim().is_empty() {
                out.push_str(" // ");
                out.push_str(c.trim());
            }
        }
    }
    out.push('\n');
}

/// Emit a line with no corresponding source text of its own (a synthetic
/// return-variable declaration, a synthetic `return`, a brace closing a
/// scaffold) — never carries a trailing comment.
fn emit_synthetic(unit: &TranslationUnit, out: &mut String, text: &str) {
    out.push_str(&indent(unit.depth));
    out.push_str(text);
    out.push('\n');
}

fn emit_blank(unit: &mut TranslationUnit, out: &mut String) {
    out.push_str(&indent(unit.depth));
    if let Some(c) = unit.line().comment() {
        if !c.trim().is_empty() {
            out.push_str("// ");
            out.push_str(c.trim());
        }
    }
    out.push('\n');
}

fn emit_untouched(unit: &mut TranslationUnit, out: &mut String, text: &str) {
    out.push_str(&indent(unit.depth));
    out.push_str("// ");
    out.push_str(text);
    out.push_str(" ; // UNTOUCHED\n");
}

fn peek_text(unit: &mut TranslationUnit) -> Result<String, ParseError> {
    unit.line_mut().peek_text()
}

fn peek_cat_text(unit: &mut TranslationUnit) -> Result<(TokenCategory, String), ParseError> {
    let t = unit.line_mut().peek()?;
    Ok((t.category, t.text))
}

fn advance_tok(unit: &mut TranslationUnit) -> Result<Token, ParseError> {
    unit.line_mut().advance()
}

fn eat_tok(unit: &mut TranslationUnit, expected: &str) -> Result<Token, ParseError> {
    unit.line_mut().eat(expected)
}

fn expr(unit: &mut TranslationUnit) -> Result<String, ParseError> {
    let (line, scope) = unit.line_and_scope();
    line.expr(scope)
}

fn name(unit: &mut TranslationUnit) -> Result<String, ParseError> {
    let (line, scope) = unit.line_and_scope();
    line.name(scope)
}

/// Advance past the unexhausted `(EOF)` sentinel only when the current
/// line has genuinely run out of tokens; otherwise the caller is resuming
/// a line a nested handler (On Error's catch body) deliberately left
/// pre-loaded but un-consumed.
fn next_statement_line(unit: &mut TranslationUnit) -> Result<(), ParseError> {
    if unit.line_mut().at_eol()? {
        advance_or_eof(unit)?;
    }
    Ok(())
}

fn advance_or_eof(unit: &mut TranslationUnit) -> Result<(), ParseError> {
    if !unit.advance() || unit.is_eof_line() {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedEof,
            unit.line_number(),
            unit.line().original().to_string(),
        ));
    }
    Ok(())
}

/// The whole-unit driver: dispatch statements until `(EOF)`, then check
/// that block nesting returned to zero.
pub fn convert(unit: &mut TranslationUnit) -> Result<String, ParseError> {
    let mut out = String::new();
    if !unit.advance() {
        return Ok(out);
    }
    loop {
        if unit.is_eof_line() {
            unit.check_balanced()?;
            break;
        }
        dispatch(unit, &mut out)?;
        if !unit.advance() {
            break;
        }
    }
    Ok(out)
}

/// Dispatch one statement from the current line's peek token (spec.md
/// §4.4's table). A leading `:` is consumed and dispatch recurses,
/// handling "multiple statements on one line separated by `:`" for every
/// statement kind uniformly rather than in each handler.
fn dispatch(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    if unit.line_mut().at_eol()? {
        emit_blank(unit, out);
        return Ok(());
    }
    if peek_text(unit)? == ":" {
        advance_tok(unit)?;
        if unit.line_mut().at_eol()? {
            return Ok(());
        }
        return dispatch(unit, out);
    }

    let (cat, text) = peek_cat_text(unit)?;
    match cat {
        TokenCategory::Chr if text == "." => assignment_or_call(unit, out),
        TokenCategory::Id => assignment_or_call(unit, out),
        TokenCategory::Exit => exit_stmt(unit, out),
        TokenCategory::Punt => {
            let original = unit.line().original().trim().to_string();
            emit_untouched(unit, out, &original);
            Ok(())
        }
        TokenCategory::OnError => on_error_stmt(unit, out),
        TokenCategory::EndXx if text == "End With" => {
            advance_tok(unit)?;
            if unit.scope_mut().pop_with().is_none() {
                return Err(ParseError::new(
                    ParseErrorKind::EmptyWithStack,
                    unit.line_number(),
                    unit.line().original().to_string(),
                ));
            }
            Ok(())
        }
        TokenCategory::Key => match text.as_str() {
            "Dim" | "ReDim" | "Global" | "Const" => declare(unit, out),
            "If" => if_stmt(unit, out),
            "For" => for_stmt(unit, out),
            "Do" => do_stmt(unit, out),
            "While" => while_stmt(unit, out),
            "Sub" => sub_or_function(unit, out, false),
            "Function" => sub_or_function(unit, out, true),
            "Call" => call_stmt(unit, out),
            "Select" => select_stmt(unit, out),
            "With" => with_stmt(unit, out),
            "Type" => type_stmt(unit, out),
            _ => {
                let original = unit.line().original().trim().to_string();
                emit_untouched(unit, out, &original);
                Ok(())
            }
        },
        _ => {
            let original = unit.line().original().trim().to_string();
            emit_untouched(unit, out, &original);
            Ok(())
        }
    }
}

// ---- Declaration ----------------------------------------------------------

fn declare(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    let kind = advance_tok(unit)?.text;
    loop {
        let decl_name = advance_tok(unit)?.text;
        let mut dims: Vec<String> = Vec::new();
        let mut dim_comment: Option<String> = None;

        if peek_text(unit)? == "(" {
            advance_tok(unit)?;
            if peek_text(unit)? != ")" {
                loop {
                    let first = expr(unit)?;
                    if peek_text(unit)?.eq_ignore_ascii_case("To") {
                        advance_tok(unit)?;
                        let upper = expr(unit)?;
                        dim_comment = Some(format!("{first} To {upper}"));
                        dims.push(upper);
                    } else {
                        dims.push(first);
                    }
                    if peek_text(unit)? == "," {
                        advance_tok(unit)?;
                        continue;
                    }
                    break;
                }
            }
            eat_tok(unit, ")")?;
        }

        let mut ty: Option<String> = None;
        let mut is_new = false;
        if peek_text(unit)?.eq_ignore_ascii_case("As") {
            advance_tok(unit)?;
            if peek_text(unit)?.eq_ignore_ascii_case("New") {
                advance_tok(unit)?;
                is_new = true;
            }
            ty = Some(advance_tok(unit)?.text);
        }

        let mut init: Option<String> = None;
        if peek_text(unit)? == "=" {
            advance_tok(unit)?;
            init = Some(expr(unit)?);
        }

        if !dims.is_empty() {
            let in_sub = unit.in_sub();
            unit.scope_mut().record_array(&decl_name, in_sub);
        }

        emit_declaration(
            unit,
            out,
            &kind,
            &decl_name,
            &dims,
            dim_comment.as_deref(),
            ty.as_deref(),
            is_new,
            init.as_deref(),
        );

        if peek_text(unit)? == "," {
            advance_tok(unit)?;
            continue;
        }
        break;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_declaration(
    unit: &mut TranslationUnit,
    out: &mut String,
    kind: &str,
    decl_name: &str,
    dims: &[String],
    dim_comment: Option<&str>,
    ty: Option<&str>,
    is_new: bool,
    init: Option<&str>,
) {
    let final_name = if unit.function_name.as_deref() == Some(decl_name) {
        format!("_{decl_name}")
    } else {
        decl_name.to_string()
    };

    let decl_kw = if kind.eq_ignore_ascii_case("const") { "const" } else { "var" };

    if dims.is_empty() {
        if is_new {
            let t = ty.unwrap_or("Object");
            emit(unit, out, &format!("{decl_kw} {final_name} = new {t}();"));
            return;
        }
        let mut text = match init {
            Some(v) => format!("{decl_kw} {final_name} = {v};"),
            None => format!("{decl_kw} {final_name};"),
        };
        if let Some(t) = ty {
            text.push_str(" // ");
            text.push_str(t);
        }
        emit(unit, out, &text);
        return;
    }

    let mut suffix = String::new();
    if let Some(t) = ty {
        suffix.push_str(" // ");
        suffix.push_str(t);
    }
    if kind.eq_ignore_ascii_case("redim") {
        suffix.push_str(" // ReDim decl");
    }
    if dims.len() > 1 {
        suffix.push_str(" // multi-dim");
    }
    if let Some(c) = dim_comment {
        suffix.push_str(" /* ");
        suffix.push_str(c);
        suffix.push_str(" */");
    }

    let head = format!("var {final_name} = new Array({});{suffix}", dims[0]);
    emit(unit, out, &head);

    if dims.len() == 1 {
        return;
    }

    let mut indexed_name = final_name;
    for (level, bound) in dims[1..].iter().enumerate() {
        let idx = format!("_{}", (b'a' + level as u8) as char);
        let header = format!(
            "for (var {idx} = 0; {idx} < {}; ++{idx}) {{",
            dims[level]
        );
        emit_synthetic(unit, out, &header);
        unit.depth += 1;
        indexed_name.push('[');
        indexed_name.push_str(&idx);
        indexed_name.push(']');
        emit_synthetic(unit, out, &format!("{indexed_name} = new Array({bound});"));
    }
    for _ in 1..dims.len() {
        unit.depth -= 1;
        emit_synthetic(unit, out, "}");
    }
}

// ---- If --------------------------------------------------------------------

fn if_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // If
    let cond = expr(unit)?;
    advance_tok(unit)?; // Then
    emit(unit, out, &format!("if ({cond}) {{"));
    unit.depth += 1;
    loop {
        next_statement_line(unit)?;
        let (cat, text) = peek_cat_text(unit)?;
        if cat == TokenCategory::EndXx && text == "End If" {
            advance_tok(unit)?;
            unit.depth -= 1;
            emit(unit, out, "}");
            return Ok(());
        }
        if text.eq_ignore_ascii_case("ElseIf") {
            advance_tok(unit)?;
            let cond2 = expr(unit)?;
            advance_tok(unit)?; // Then
            unit.depth -= 1;
            emit(unit, out, &format!("}} else if ({cond2}) {{"));
            unit.depth += 1;
            continue;
        }
        if text.eq_ignore_ascii_case("Else") {
            advance_tok(unit)?;
            unit.depth -= 1;
            emit(unit, out, "} else {");
            unit.depth += 1;
            continue;
        }
        dispatch(unit, out)?;
    }
}

// ---- For / For Each ---------------------------------------------------------

fn step_expr(var: &str, op: &str, step_text: &str) -> String {
    match (op, step_text.trim()) {
        ("+=", "1") => format!("++{var}"),
        ("-=", "1") => format!("--{var}"),
        ("+=", "-1") => format!("--{var}"),
        ("-=", "-1") => format!("++{var}"),
        (_, t) => format!("{var} {op} {t}"),
    }
}

fn for_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // For

    if peek_text(unit)?.eq_ignore_ascii_case("Each") {
        advance_tok(unit)?;
        let var = advance_tok(unit)?.text;
        advance_tok(unit)?; // In
        let iter = expr(unit)?;
        if peek_text(unit)?.eq_ignore_ascii_case("As") {
            advance_tok(unit)?;
            advance_tok(unit)?; // type name, unused
        }
        emit(unit, out, &format!("for (var {var} in {iter}) {{"));
        unit.depth += 1;
        return run_block_until(unit, out, "Next");
    }

    let var = advance_tok(unit)?.text;
    advance_tok(unit)?; // =
    let start = expr(unit)?;
    let downto = peek_text(unit)?.eq_ignore_ascii_case("Downto");
    advance_tok(unit)?; // To / Downto
    let bound = expr(unit)?;

    let mut step: Option<String> = None;
    if peek_text(unit)?.eq_ignore_ascii_case("Step") {
        advance_tok(unit)?;
        step = Some(expr(unit)?);
    }

    let (mut rel, mut op) = if downto { (">=", "-=") } else { ("<=", "+=") };
    if let Some(s) = &step {
        if s.trim_start().starts_with('-') {
            rel = ">=";
            op = "+=";
        }
    }
    let increment = step_expr(&var, op, step.as_deref().unwrap_or("1"));

    emit(
        unit,
        out,
        &format!("for (var {var} = {start}; {var} {rel} {bound}; {increment}) {{"),
    );
    unit.depth += 1;
    run_block_until(unit, out, "Next")
}

/// Shared tail for block forms whose body is a plain nested-statement
/// sequence closed by a single keyword terminator (`Next`, `End With`):
/// dispatch lines until the terminator, consume it, close the brace.
fn run_block_until(unit: &mut TranslationUnit, out: &mut String, terminator: &str) -> Result<(), ParseError> {
    loop {
        next_statement_line(unit)?;
        let text = peek_text(unit)?;
        if text.eq_ignore_ascii_case(terminator) {
            advance_tok(unit)?;
            if !unit.line_mut().at_eol()? {
                advance_tok(unit)?; // e.g. "Next i" — loop variable, discarded
            }
            unit.depth -= 1;
            emit(unit, out, "}");
            return Ok(());
        }
        dispatch(unit, out)?;
    }
}

// ---- Do / While --------------------------------------------------------------

fn do_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // Do
    let head = if peek_text(unit)?.eq_ignore_ascii_case("While") {
        advance_tok(unit)?;
        let e = expr(unit)?;
        format!("while ({e}) {{")
    } else if peek_text(unit)?.eq_ignore_ascii_case("Until") {
        advance_tok(unit)?;
        let e = expr(unit)?;
        format!("while (!({e})) {{")
    } else {
        "while (1) {".to_string()
    };
    emit(unit, out, &head);
    unit.depth += 1;

    loop {
        next_statement_line(unit)?;
        let text = peek_text(unit)?;
        if text.eq_ignore_ascii_case("Loop") {
            advance_tok(unit)?;
            if peek_text(unit)?.eq_ignore_ascii_case("While") {
                advance_tok(unit)?;
                let e = expr(unit)?;
                emit(unit, out, &format!("if (!({e})) break;"));
            } else if peek_text(unit)?.eq_ignore_ascii_case("Until") {
                advance_tok(unit)?;
                let e = expr(unit)?;
                emit(unit, out, &format!("if ({e}) break;"));
            }
            unit.depth -= 1;
            emit(unit, out, "}");
            return Ok(());
        }
        dispatch(unit, out)?;
    }
}

fn while_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // While
    let cond = expr(unit)?;
    emit(unit, out, &format!("while ({cond}) {{"));
    unit.depth += 1;
    loop {
        next_statement_line(unit)?;
        let (cat, text) = peek_cat_text(unit)?;
        let is_end = (cat == TokenCategory::EndXx && text == "End While") || text.eq_ignore_ascii_case("Wend");
        if is_end {
            advance_tok(unit)?;
            unit.depth -= 1;
            emit(unit, out, "}");
            return Ok(());
        }
        dispatch(unit, out)?;
    }
}

// ---- Select Case --------------------------------------------------------------

fn compare_js(op: &str) -> &'static str {
    match op {
        "=" => "==",
        "<>" => "!=",
        "<" => "<",
        "<=" => "<=",
        ">" => ">",
        ">=" => ">=",
        _ => "==",
    }
}

fn select_case_one_item(unit: &mut TranslationUnit, subject: &str) -> Result<String, ParseError> {
    let t = peek_text(unit)?;
    if matches!(t.as_str(), "=" | "<>" | "<" | "<=" | ">" | ">=") {
        advance_tok(unit)?;
        let rhs = expr(unit)?;
        return Ok(format!("{subject} {} {rhs}", compare_js(&t)));
    }
    if t.eq_ignore_ascii_case("Is") {
        advance_tok(unit)?;
        let op = advance_tok(unit)?.text;
        let rhs = expr(unit)?;
        return Ok(format!("{subject} {} {rhs}", compare_js(&op)));
    }
    let first = expr(unit)?;
    if peek_text(unit)?.eq_ignore_ascii_case("To") {
        advance_tok(unit)?;
        let upper = expr(unit)?;
        return Ok(format!("{subject} >= {first} && {subject} <= {upper}"));
    }
    Ok(format!("{subject} == {first}"))
}

fn select_case_items(unit: &mut TranslationUnit, subject: &str) -> Result<String, ParseError> {
    let mut parts = Vec::new();
    loop {
        parts.push(select_case_one_item(unit, subject)?);
        if peek_text(unit)? == "," {
            advance_tok(unit)?;
            continue;
        }
        break;
    }
    Ok(parts.join(" || "))
}

fn select_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // Select
    advance_tok(unit)?; // Case
    let subject = expr(unit)?;
    let mut first_branch = true;

    loop {
        next_statement_line(unit)?;
        let (cat, text) = peek_cat_text(unit)?;

        if cat == TokenCategory::EndXx && text == "End Select" {
            advance_tok(unit)?;
            if !first_branch {
                unit.depth -= 1;
                emit(unit, out, "}");
            }
            return Ok(());
        }

        if text.eq_ignore_ascii_case("Case") {
            advance_tok(unit)?;
            if peek_text(unit)?.eq_ignore_ascii_case("Else") {
                advance_tok(unit)?;
                if first_branch {
                    emit(unit, out, "if (true) {");
                    first_branch = false;
                } else {
                    unit.depth -= 1;
                    emit(unit, out, "} else {");
                }
                unit.depth += 1;
                continue;
            }
            let cond = select_case_items(unit, &subject)?;
            if first_branch {
                emit(unit, out, &format!("if ({cond}) {{"));
                first_branch = false;
            } else {
                unit.depth -= 1;
                emit(unit, out, &format!("}} else if ({cond}) {{"));
            }
            unit.depth += 1;
            continue;
        }

        dispatch(unit, out)?;
    }
}

// ---- Sub / Function -----------------------------------------------------------

fn parse_param_list(unit: &mut TranslationUnit) -> Result<Vec<String>, ParseError> {
    eat_tok(unit, "(")?;
    let mut params = Vec::new();
    if peek_text(unit)? != ")" {
        loop {
            let mut by_ref = false;
            if peek_text(unit)?.eq_ignore_ascii_case("ByVal") {
                advance_tok(unit)?;
            } else if peek_text(unit)?.eq_ignore_ascii_case("ByRef") {
                advance_tok(unit)?;
                by_ref = true;
            }
            let mut optional = false;
            if peek_text(unit)?.eq_ignore_ascii_case("Optional") {
                advance_tok(unit)?;
                optional = true;
            }
            let pname = advance_tok(unit)?.text;

            let mut is_array_param = false;
            if peek_text(unit)? == "(" {
                advance_tok(unit)?;
                eat_tok(unit, ")")?;
                is_array_param = true;
            }
            if peek_text(unit)?.eq_ignore_ascii_case("As") {
                advance_tok(unit)?;
                advance_tok(unit)?; // type name, not reflected in the JS signature
            }
            let mut default: Option<String> = None;
            if peek_text(unit)? == "=" {
                advance_tok(unit)?;
                default = Some(expr(unit)?);
            }

            if is_array_param {
                unit.scope_mut().record_array(&pname, true);
            }

            let mut notes = Vec::new();
            if by_ref {
                notes.push("ByRef".to_string());
            }
            if optional {
                notes.push("Optional".to_string());
            }
            if let Some(d) = default {
                notes.push(format!("= {d}"));
            }
            let rendered = if notes.is_empty() {
                pname
            } else {
                format!("/*{}*/{pname}", notes.join(" "))
            };
            params.push(rendered);

            if peek_text(unit)? == "," {
                advance_tok(unit)?;
                continue;
            }
            break;
        }
    }
    eat_tok(unit, ")")?;
    Ok(params)
}

fn sub_or_function(unit: &mut TranslationUnit, out: &mut String, is_function: bool) -> Result<(), ParseError> {
    advance_tok(unit)?; // Sub / Function
    let name = advance_tok(unit)?.text;
    let args = parse_param_list(unit)?;
    if peek_text(unit)?.eq_ignore_ascii_case("As") {
        advance_tok(unit)?;
        advance_tok(unit)?; // return type, not reflected in the JS signature
    }

    emit(unit, out, &format!("function {name}({}) {{", args.join(", ")));
    unit.depth += 1;
    unit.enter_sub(name.clone());
    if is_function {
        emit_synthetic(unit, out, &format!("var _{name} = \"\";"));
    }

    let terminator = if is_function { "End Function" } else { "End Sub" };
    loop {
        next_statement_line(unit)?;
        let (cat, text) = peek_cat_text(unit)?;
        if cat == TokenCategory::EndXx && text == terminator {
            advance_tok(unit)?;
            break;
        }
        dispatch(unit, out)?;
    }

    if is_function {
        emit_synthetic(unit, out, &format!("return _{name};"));
    }
    unit.depth -= 1;
    emit(unit, out, "}");
    unit.exit_sub();
    Ok(())
}

fn exit_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    let text = advance_tok(unit)?.text;
    let rendered = match text.as_str() {
        "Exit Function" => match &unit.function_name {
            Some(fname) => format!("return _{fname};"),
            None => "return;".to_string(),
        },
        "Exit Sub" => "return;".to_string(),
        _ => "break;".to_string(), // Exit For / Exit Do
    };
    emit(unit, out, &rendered);
    Ok(())
}

fn call_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // Call
    let callee = name(unit)?;
    if callee.ends_with(')') || peek_text(unit)?.is_empty() {
        emit(unit, out, &format!("{callee};"));
        return Ok(());
    }
    let mut args = vec![expr(unit)?];
    while peek_text(unit)? == "," {
        advance_tok(unit)?;
        args.push(expr(unit)?);
    }
    emit(unit, out, &format!("{callee}({});", args.join(", ")));
    Ok(())
}

// ---- With ----------------------------------------------------------------------

fn with_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // With
    let target = expr(unit)?;
    emit(unit, out, &format!("// With {target}"));
    unit.scope_mut().push_with(target);

    loop {
        next_statement_line(unit)?;
        let (cat, text) = peek_cat_text(unit)?;
        if cat == TokenCategory::EndXx && text == "End With" {
            advance_tok(unit)?;
            if unit.scope_mut().pop_with().is_none() {
                return Err(ParseError::new(
                    ParseErrorKind::EmptyWithStack,
                    unit.line_number(),
                    unit.line().original().to_string(),
                ));
            }
            return Ok(());
        }
        dispatch(unit, out)?;
    }
}

// ---- Type -----------------------------------------------------------------------

fn type_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    advance_tok(unit)?; // Type
    let type_name = advance_tok(unit)?.text;
    emit(unit, out, &format!("{type_name} = function() {{}};"));
    unit.type_names.insert(type_name.to_ascii_lowercase());

    loop {
        next_statement_line(unit)?;
        let (cat, text) = peek_cat_text(unit)?;
        if cat == TokenCategory::EndXx && text == "End Type" {
            advance_tok(unit)?;
            return Ok(());
        }
        if unit.line_mut().at_eol()? {
            emit_blank(unit, out);
            continue;
        }
        let member = advance_tok(unit)?.text;
        if peek_text(unit)?.eq_ignore_ascii_case("As") {
            advance_tok(unit)?;
            let member_type = advance_tok(unit)?.text;
            if unit.type_names.contains(&member_type.to_ascii_lowercase()) {
                emit(unit, out, &format!("{type_name}.prototype.{member} = new {member_type}();"));
            } else {
                emit(unit, out, &format!("{type_name}.prototype.{member}; // {member_type}"));
            }
        } else {
            emit(unit, out, &format!("{type_name}.prototype.{member};"));
        }
    }
}

// ---- On Error -------------------------------------------------------------------

fn on_error_stmt(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    let original = unit.line().original().trim().to_string();
    let compound = advance_tok(unit)?.text;
    if compound != "On Error GoTo" {
        emit_untouched(unit, out, &original);
        return Ok(());
    }
    let label = advance_tok(unit)?.text;

    emit(unit, out, "try {");
    unit.depth += 1;
    loop {
        next_statement_line(unit)?;
        let current_original = unit.line().original().trim().to_string();
        let is_label_line = current_original
            .strip_suffix(':')
            .map(|n| n.trim().eq_ignore_ascii_case(&label))
            .unwrap_or(false);
        if is_label_line {
            while !unit.line_mut().at_eol()? {
                unit.line_mut().advance()?;
            }
            unit.depth -= 1;
            emit_synthetic(unit, out, "} catch (e) {");
            unit.depth += 1;
            break;
        }
        dispatch(unit, out)?;
    }

    loop {
        next_statement_line(unit)?;
        let (cat, text) = peek_cat_text(unit)?;
        if cat == TokenCategory::EndXx && (text == "End Sub" || text == "End Function") {
            unit.depth -= 1;
            emit_synthetic(unit, out, "}");
            return Ok(());
        }
        dispatch(unit, out)?;
    }
}

// ---- Assignment or call ---------------------------------------------------------

fn lift_array(rhs: &str) -> (String, bool) {
    match rhs.strip_prefix("Array(") {
        Some(rest) => (format!("new Array({rest}"), true),
        None => (rhs.to_string(), false),
    }
}

fn assignment_or_call(unit: &mut TranslationUnit, out: &mut String) -> Result<(), ParseError> {
    let lhs = name(unit)?;
    let peeked = peek_text(unit)?;

    if peeked == "=" {
        advance_tok(unit)?;
        let rhs_raw = expr(unit)?;
        let (rhs, is_array) = lift_array(&rhs_raw);
        let target = if unit.function_name.as_deref() == Some(lhs.as_str()) {
            format!("_{lhs}")
        } else {
            lhs.clone()
        };
        if is_array {
            let in_sub = unit.in_sub();
            unit.scope_mut().record_array(&lhs, in_sub);
        }
        emit(unit, out, &format!("{target} = {rhs};"));
        return Ok(());
    }

    if peeked == ":" {
        // A bare label, e.g. "ErrHandler:" (spec.md §4.4).
        emit(unit, out, &format!("// {lhs}: ; // UNTOUCHED"));
        return Ok(());
    }

    if peeked.is_empty() {
        emit(unit, out, &format!("{lhs}();"));
        return Ok(());
    }

    let next_cat = unit.line_and_scope().0.peek()?.category;
    let looks_like_args = matches!(
        next_cat,
        TokenCategory::Id | TokenCategory::Num | TokenCategory::Str | TokenCategory::Hex | TokenCategory::Date
    ) || peeked == "-";

    if looks_like_args {
        let mut args = vec![expr(unit)?];
        while peek_text(unit)? == "," {
            advance_tok(unit)?;
            args.push(expr(unit)?);
        }
        emit(unit, out, &format!("{lhs}({});", args.join(", ")));
        return Ok(());
    }

    let original = unit.line().original().trim().to_string();
    emit_untouched(unit, out, &original);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::unit::TranslationUnit;

    fn run(lines: &[&str]) -> String {
        let mut unit = TranslationUnit::new(lines);
        convert(&mut unit).expect("conversion should succeed")
    }

    #[test]
    fn scalar_declaration_with_type_comment() {
        let out = run(&["Dim x As Integer"]);
        assert_eq!(out.trim(), "var x; // Integer");
    }

    #[test]
    fn multi_dim_array_declaration() {
        let out = run(&["Dim a(3, 2) As Double"]);
        assert!(out.contains("var a = new Array(3); // Double // multi-dim"));
        assert!(out.contains("for (var _a = 0; _a < 3; ++_a) {"));
        assert!(out.contains("a[_a] = new Array(2);"));
    }

    #[test]
    fn if_elseif_else_chain() {
        let out = run(&[
            "If x > 0 Then",
            "y = 1",
            "ElseIf x = 0 Then",
            "y = 0",
            "Else",
            "y = -1",
            "End If",
        ]);
        assert!(out.contains("if (x > 0) {"));
        assert!(out.contains("y = 1;"));
        assert!(out.contains("} else if (x == 0) {"));
        assert!(out.contains("y = 0;"));
        assert!(out.contains("} else {"));
        assert!(out.contains("y = -1;"));
    }

    #[test]
    fn for_numeric_with_negative_step_collapses_to_decrement() {
        let out = run(&["For i = 10 To 1 Step -1", "x = i", "Next"]);
        assert!(out.contains("for (var i = 10; i >= 1; --i) {"));
    }

    #[test]
    fn select_case_becomes_if_else_chain() {
        let out = run(&[
            "Select Case n",
            "Case 1, 2",
            "x = \"a\"",
            "Case 3 To 5",
            "x = \"b\"",
            "Case Else",
            "x = \"c\"",
            "End Select",
        ]);
        assert!(out.contains("if (n == 1 || n == 2) {"));
        assert!(out.contains("} else if (n >= 3 && n <= 5) {"));
        assert!(out.contains("} else {"));
    }

    #[test]
    fn select_case_inline_colon_statement() {
        let out = run(&[
            "Select Case n",
            "Case 1, 2: x = \"a\"",
            "Case Else",
            "x = \"c\"",
            "End Select",
        ]);
        assert!(out.contains("if (n == 1 || n == 2) {"));
        assert!(out.contains("x = \"a\";"));
    }

    #[test]
    fn function_with_byval_byref_and_synthetic_return() {
        let out = run(&["Function Add(ByVal a, ByRef b) As Double", "Add = a + b", "End Function"]);
        assert!(out.contains("function Add(a, /*ByRef*/b) {"));
        assert!(out.contains("var _Add = \"\";"));
        assert!(out.contains("_Add = a + b;"));
        assert!(out.contains("return _Add;"));
    }

    #[test]
    fn with_block_prefixes_bare_members() {
        let out = run(&["With Sheet1", ".Value = 5", "End With"]);
        assert!(out.contains("// With Sheet1"));
        assert!(out.contains("Sheet1.Value = 5;"));
    }

    #[test]
    fn nesting_imbalance_is_reported() {
        let mut unit = TranslationUnit::new(&["If x Then", "y = 1"]);
        let err = convert(&mut unit).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn punt_category_emits_untouched_comment() {
        let out = run(&["Open \"file\" For Input As #1"]);
        assert!(out.contains("// Open \"file\" For Input As #1 ; // UNTOUCHED"));
    }

    #[test]
    fn array_name_is_forgotten_after_sub_ends() {
        let out = run(&[
            "Sub DoWork()",
            "Dim a(3) As Integer",
            "a(0) = 1",
            "End Sub",
            "Sub DoOther()",
            "a(0) = 1",
            "End Sub",
        ]);
        assert!(out.contains("a[0] = 1;"));
        assert!(out.contains("a(0) = 1;"));
    }
}
