//! End-to-end scenarios from spec.md §8, run through the public `convert`
//! entry point rather than through any single internal module.

use vbajs_compiler::{convert, ParseErrorKind};

#[test]
fn scalar_declaration() {
    let out = convert("Dim x As Integer").unwrap();
    assert_eq!(out.trim(), "var x; // Integer");
}

#[test]
fn multi_dim_array_declaration() {
    let out = convert("Dim a(3, 2) As Double").unwrap();
    assert!(out.contains("var a = new Array(3); // Double // multi-dim"));
    assert!(out.contains("for (var _a = 0; _a < 3; ++_a) {"));
    assert!(out.contains("a[_a] = new Array(2);"));
}

#[test]
fn if_elseif_else_chain() {
    let src = "If x > 0 Then\n  y = 1\nElseIf x = 0 Then\n  y = 0\nElse\n  y = -1\nEnd If";
    let out = convert(src).unwrap();
    assert!(out.contains("if (x > 0) {"));
    assert!(out.contains("} else if (x == 0) {"));
    assert!(out.contains("y = 1;"));
    assert!(out.contains("y = 0;"));
    assert!(out.contains("y = -1;"));
    assert!(out.contains("} else {"));
}

#[test]
fn for_loop_negative_step_becomes_decrement() {
    let src = "For i = 10 To 1 Step -1\n  x = i\nNext";
    let out = convert(src).unwrap();
    assert!(out.contains("for (var i = 10; i >= 1; --i) {"));
}

#[test]
fn select_case_becomes_if_else_if_chain() {
    let src = "Select Case n\n  Case 1, 2: x = \"a\"\n  Case 3 To 5\n    x = \"b\"\n  Case Else\n    x = \"c\"\nEnd Select";
    let out = convert(src).unwrap();
    assert!(out.contains("if (n == 1 || n == 2) {"));
    assert!(out.contains("x = \"a\";"));
    assert!(out.contains("} else if (n >= 3 && n <= 5) {"));
    assert!(out.contains("x = \"b\";"));
    assert!(out.contains("} else {"));
    assert!(out.contains("x = \"c\";"));
}

#[test]
fn function_with_byref_comment_and_synthetic_return() {
    let src = "Function Add(ByVal a, ByRef b) As Double\nAdd = a + b\nEnd Function";
    let out = convert(src).unwrap();
    assert!(out.contains("function Add(a, /*ByRef*/b) {"));
    assert!(out.contains("var _Add = \"\";"));
    assert!(out.contains("_Add = a + b;"));
    assert!(out.contains("return _Add;"));
}

#[test]
fn unrecognized_construct_is_untouched() {
    let out = convert("Open \"f.txt\" For Input As #1").unwrap();
    assert!(out.contains("UNTOUCHED"));
}

#[test]
fn with_block_restores_scope_stack() {
    let src = "With Sheet1\n  .Value = 1\nEnd With\nWith Sheet2\n  .Value = 2\nEnd With";
    let out = convert(src).unwrap();
    assert!(out.contains("Sheet1.Value = 1;"));
    assert!(out.contains("Sheet2.Value = 2;"));
}

#[test]
fn mismatched_end_with_is_a_parse_error() {
    let err = convert("End With").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::EmptyWithStack);
}

#[test]
fn array_name_scope_does_not_leak_across_subs() {
    let src = "Sub First()\n  Dim a(3) As Integer\n  a(0) = 1\nEnd Sub\nSub Second()\n  a(0) = 1\nEnd Sub";
    let out = convert(src).unwrap();
    assert!(out.contains("a[0] = 1;"));
    assert!(out.contains("a(0) = 1;"));
}

#[test]
fn continuation_merge_joins_lines() {
    let out = convert("x = 1 + _\n2").unwrap();
    assert!(out.contains("x = 1 + 2;"));
}

#[test]
fn on_error_goto_label_becomes_try_catch() {
    let src = "Sub DoWork()\n  On Error GoTo Handler\n  x = 1\n  Exit Sub\nHandler:\n  y = 2\nEnd Sub";
    let out = convert(src).unwrap();
    assert!(out.contains("try {"));
    assert!(out.contains("x = 1;"));
    assert!(out.contains("} catch (e) {"));
    assert!(out.contains("y = 2;"));
}

#[test]
fn on_error_resume_next_is_untouched() {
    let out = convert("On Error Resume Next").unwrap();
    assert!(out.contains("UNTOUCHED"));
}

#[test]
fn unbalanced_nesting_is_reported_at_eof() {
    let err = convert("If x Then\ny = 1").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
}
