use super::*;
use crate::error::SemanticError;
use crate::parser;
use crate::source::Source;

fn analyze_str(input: &str) -> Result<(), SemanticError> {
    let mut source = Source::from_string(input);
    let program = parser::parse(&mut source).unwrap();
    analyze(&program)
}

fn accepts(input: &str) {
    assert_eq!(analyze_str(input), Ok(()), "expected acceptance of {:?}", input);
}

#[test]
fn accepts_minimal_main() {
    accepts("fn main() -> int { return 0; }");
}

#[test]
fn accepts_direct_recursion() {
    accepts(
        "fn f(n: int) -> int { if n < 1 { return 0; } else { return f(n - 1); } } \
         fn main() -> int { return f(3); }",
    );
}

#[test]
fn calls_resolve_in_declaration_order() {
    accepts("fn g() -> int { return 1; } fn main() -> int { return g(); }");
    assert!(matches!(
        analyze_str("fn main() -> int { return g(); } fn g() -> int { return 1; }"),
        Err(SemanticError::UndefinedFunction { .. })
    ));
}

#[test]
fn address_of_requires_an_int_place() {
    accepts("fn main() -> int { let x : int; let p : int*; p = &x; return 0; }");
    assert!(matches!(
        analyze_str("fn main() -> int { let p : int*; p = &1; return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { let p : int*; let q : int*; q = &p; return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn deref_and_index_rules() {
    accepts("fn main() -> int { let x = 1 : int; let p : int*; p = &x; *p = 2; return p[0]; }");
    accepts("fn main() -> int { let s = \"ab\" : string; return s[0]; }");
    assert!(matches!(
        analyze_str("fn main() -> int { let x : int; return *x; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { let x : int; return x[0]; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { let s = \"a\" : string; let p : int*; p = s[0]; return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn return_coverage() {
    assert!(matches!(
        analyze_str("fn f(n: int) -> int { if n > 0 { return 1; } } fn main() -> int { return 0; }"),
        Err(SemanticError::MissingReturn { .. })
    ));
    // loops may run zero times and never guarantee a return
    assert!(matches!(
        analyze_str("fn f() -> int { while 1 { return 1; } } fn main() -> int { return 0; }"),
        Err(SemanticError::MissingReturn { .. })
    ));
    assert!(matches!(
        analyze_str(
            "fn f() -> int { for i in 0..10 { return 1; } } fn main() -> int { return 0; }"
        ),
        Err(SemanticError::MissingReturn { .. })
    ));
    // a return anywhere in a block covers the block
    accepts("fn f() -> int { return 1; let a : int; } fn main() -> int { return 0; }");
    // an if covers only when every branch and the else cover
    accepts(
        "fn f(n: int) -> int { if n > 0 { return 1; } elif n < 0 { return 2; } else { return 3; } } \
         fn main() -> int { return 0; }",
    );
    assert!(matches!(
        analyze_str(
            "fn f(n: int) -> int { if n > 0 { return 1; } elif n < 0 { return 2; } } \
             fn main() -> int { return 0; }"
        ),
        Err(SemanticError::MissingReturn { .. })
    ));
}

#[test]
fn reserved_words_cannot_name_anything() {
    assert!(matches!(
        analyze_str("fn main() -> int { let int : int; return 0; }"),
        Err(SemanticError::ReservedWord { .. })
    ));
    assert!(matches!(
        analyze_str("fn string() -> int { return 0; } fn main() -> int { return 0; }"),
        Err(SemanticError::ReservedWord { .. })
    ));
    assert!(matches!(
        analyze_str("fn f(int: int) -> int { return 0; } fn main() -> int { return 0; }"),
        Err(SemanticError::ReservedWord { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { for int in 0..1 { } return 0; }"),
        Err(SemanticError::ReservedWord { .. })
    ));
}

#[test]
fn main_signature_is_checked() {
    assert!(matches!(
        analyze_str("fn main(a: int) -> int { return 0; }"),
        Err(SemanticError::MainTakesParameters { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> string { return \"x\"; }"),
        Err(SemanticError::MainMustReturnInt { .. })
    ));
}

#[test]
fn scoping() {
    accepts("fn main() -> int { let a = 1 : int; if a { let a = 2 : int; a; } return a; }");
    assert!(matches!(
        analyze_str("fn main() -> int { let a : int; let a : int; return 0; }"),
        Err(SemanticError::VariableRedeclaration { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { return x; }"),
        Err(SemanticError::UndefinedVariable { .. })
    ));
    // block-local names do not leak
    assert!(matches!(
        analyze_str("fn main() -> int { if 1 { let a : int; } a = 2; return 0; }"),
        Err(SemanticError::UndefinedVariable { .. })
    ));
    // a parameter may be shadowed inside the body
    accepts("fn f(a: int) -> int { let a = 2 : int; return a; } fn main() -> int { return 0; }");
}

#[test]
fn function_tables() {
    assert!(matches!(
        analyze_str(
            "fn f() -> int { return 0; } fn f() -> int { return 1; } \
             fn main() -> int { return 0; }"
        ),
        Err(SemanticError::FunctionRedeclaration { .. })
    ));
    assert!(matches!(
        analyze_str("fn f(a: int, a: int) -> int { return 0; } fn main() -> int { return 0; }"),
        Err(SemanticError::ParameterRedeclaration { .. })
    ));
    assert!(matches!(
        analyze_str(
            "extern fn e() -> int; fn e() -> int { return 0; } fn main() -> int { return 0; }"
        ),
        Err(SemanticError::FunctionRedeclaration { .. })
    ));
}

#[test]
fn call_site_errors_carry_the_call_position() {
    let error = analyze_str("fn f(a: int) -> int { return a; }\nfn main() -> int { return f(1, 2); }")
        .unwrap_err();
    match error {
        SemanticError::ArgumentCountMismatch {
            expected,
            found,
            position,
            ..
        } => {
            assert_eq!(expected, 1);
            assert_eq!(found, 2);
            assert_eq!(position.line, 2);
            assert_eq!(position.column, 27);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(matches!(
        analyze_str("fn f(a: int*) -> int { return 0; } fn main() -> int { return f(1); }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn truthy_conditions_but_strict_boolean_operators() {
    accepts("fn main() -> int { if 1 { return 1; } return 0; }");
    accepts("fn main() -> int { let a = 1 : int; while a { a = a - 1; } return 0; }");
    accepts("fn main() -> int { if 1 < 2 && 3 < 4 { return 1; } return 0; }");
    assert!(matches!(
        analyze_str("fn main() -> int { if 1 && 2 { return 1; } return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { if !1 { return 1; } return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    // strings are not conditions
    assert!(matches!(
        analyze_str("fn main() -> int { if \"s\" { return 1; } return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn assignment_rules() {
    accepts("fn main() -> int { let a : int; let b : int; a = b = 5; return a; }");
    assert!(matches!(
        analyze_str("fn main() -> int { 1 = 2; return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { let a : int; let s : string; a = s; return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    assert!(matches!(
        analyze_str("fn main() -> int { let a : int; a = 1 < 2; return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    // every left part must match the value's type
    assert!(matches!(
        analyze_str(
            "fn main() -> int { let a : int; let s : string; a = s = \"x\"; return 0; }"
        ),
        Err(SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn for_loop_rules() {
    accepts("fn main() -> int { let s = 0 : int; for i in 1..5 { s = s + i; } return s; }");
    accepts("fn main() -> int { for i in 0..10..2 { } return 0; }");
    assert!(matches!(
        analyze_str("fn main() -> int { for i in \"a\"..2 { } return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    // the loop variable is scoped to the loop
    assert!(matches!(
        analyze_str("fn main() -> int { for i in 0..2 { } return i; }"),
        Err(SemanticError::UndefinedVariable { .. })
    ));
    // and is not visible in the range bounds
    assert!(matches!(
        analyze_str("fn main() -> int { for i in 0..i { } return 0; }"),
        Err(SemanticError::UndefinedVariable { .. })
    ));
}

#[test]
fn globals_and_externs() {
    accepts("let g = 10 : int; fn main() -> int { return g + 1; }");
    accepts("extern fn getchar() -> int; fn main() -> int { return getchar(); }");
    accepts("extern fn puts(s: string) -> int; fn main() -> int { puts(\"hi\"); return 0; }");
    assert!(matches!(
        analyze_str("let g = \"s\" : int; fn main() -> int { return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    assert!(matches!(
        analyze_str("let g : int; let g : int; fn main() -> int { return 0; }"),
        Err(SemanticError::VariableRedeclaration { .. })
    ));
}

#[test]
fn return_value_must_match_the_declared_type() {
    assert!(matches!(
        analyze_str("fn main() -> int { return \"s\"; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
    accepts("fn f() -> string { return \"s\"; } fn main() -> int { f(); return 0; }");
    // calls yield the value flavour, so their result is not assignable-to
    assert!(matches!(
        analyze_str("fn f() -> int { return 1; } fn main() -> int { f() = 2; return 0; }"),
        Err(SemanticError::TypeMismatch { .. })
    ));
}
