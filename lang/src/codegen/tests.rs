use super::*;
use crate::parser;
use crate::semantic;
use crate::source::Source;

fn build<'ctx>(context: &'ctx Context, input: &str) -> CodegenContext<'ctx> {
    let mut source = Source::from_string(input);
    let program = parser::parse(&mut source).unwrap();
    semantic::analyze(&program).unwrap();
    compile(context, &program, OptimizationLevel::None).unwrap()
}

fn run(input: &str) -> i32 {
    let context = Context::create();
    let codegen = build(&context, input);
    codegen.verify().unwrap();
    codegen.execute().unwrap()
}

#[test]
fn module_verifies_for_a_representative_program() {
    let context = Context::create();
    let codegen = build(
        &context,
        "let g = 1 : int;\n\
         extern fn putchar(c: int) -> int;\n\
         fn helper(n: int) -> int { let s = 0 : int; for i in 0..n { s = s + i; } return s; }\n\
         fn main() -> int { if g { return helper(5); } else { return 0; } }",
    );
    assert!(codegen.verify().is_ok());
    let ir = codegen.ir_text();
    assert!(ir.contains("define i32 @main"));
    assert!(ir.contains("declare i32 @putchar"));
}

#[test]
fn missing_main_is_a_codegen_error() {
    let context = Context::create();
    let mut source = Source::from_string("fn helper() -> int { return 1; }");
    let program = parser::parse(&mut source).unwrap();
    semantic::analyze(&program).unwrap();
    assert!(matches!(
        compile(&context, &program, OptimizationLevel::None),
        Err(crate::error::CodegenError::MissingMain)
    ));
}

#[test]
fn jit_returns_main_result() {
    assert_eq!(run("fn main() -> int { return 7; }"), 7);
}

#[test]
fn jit_calls_user_functions() {
    assert_eq!(
        run("fn add(a: int, b: int) -> int { return a + b; } \
             fn main() -> int { return add(2, 3); }"),
        5
    );
}

#[test]
fn jit_initialises_globals_before_main() {
    assert_eq!(run("let g = 10 : int; fn main() -> int { return g + 1; }"), 11);
    // uninitialised globals read as zero
    assert_eq!(run("let g : int; fn main() -> int { return g; }"), 0);
    // initialisers run in declaration order
    assert_eq!(
        run("let a = 3 : int;\nlet b = a + 1 : int;\nfn main() -> int { return b; }"),
        4
    );
}

#[test]
fn jit_for_loop_sums_exclusive_range() {
    assert_eq!(
        run("fn main() -> int { let s = 0 : int; for i in 1..5 { s = s + i; } return s; }"),
        10
    );
}

#[test]
fn jit_for_loop_with_step() {
    assert_eq!(
        run("fn main() -> int { let s = 0 : int; for i in 0..10..2 { s = s + i; } return s; }"),
        20
    );
}

#[test]
fn jit_pointer_write_through() {
    assert_eq!(
        run("fn main() -> int { let x = 0 : int; let p : int*; p = &x; *p = 42; return x; }"),
        42
    );
}

#[test]
fn jit_if_else() {
    assert_eq!(
        run("fn main() -> int { if 1 < 2 { return 1; } else { return 0; } }"),
        1
    );
}

#[test]
fn jit_elif_chain() {
    assert_eq!(
        run("fn pick(n: int) -> int { if n == 0 { return 10; } elif n == 1 { return 11; } else { return 12; } } \
             fn main() -> int { return pick(1); }"),
        11
    );
}

#[test]
fn jit_while_loop() {
    assert_eq!(
        run("fn main() -> int { let n = 0 : int; while n < 10 { n = n + 3; } return n; }"),
        12
    );
}

#[test]
fn jit_recursion() {
    assert_eq!(
        run("fn fact(n: int) -> int { if n < 2 { return 1; } else { return n * fact(n - 1); } } \
             fn main() -> int { return fact(5); }"),
        120
    );
}

#[test]
fn jit_truthy_int_condition() {
    assert_eq!(
        run("fn main() -> int { let n = 3 : int; let s = 0 : int; while n { s = s + n; n = n - 1; } return s; }"),
        6
    );
}

#[test]
fn jit_chained_assignment() {
    assert_eq!(
        run("fn main() -> int { let a : int; let b : int; a = b = 5; return a + b; }"),
        10
    );
}

#[test]
fn jit_string_code_units() {
    assert_eq!(
        run("fn main() -> int { let s = \"A\" : string; return s[0]; }"),
        65
    );
    // the terminating code unit is zero
    assert_eq!(
        run("fn main() -> int { let s = \"A\" : string; return s[1]; }"),
        0
    );
}

#[test]
fn jit_arithmetic_and_bitwise_operators() {
    assert_eq!(run("fn main() -> int { return (1 << 4) | (6 & 3) ^ 1; }"), 19);
    assert_eq!(run("fn main() -> int { return -8 >> 1; }"), -4);
    assert_eq!(run("fn main() -> int { return ~0; }"), -1);
    assert_eq!(run("fn main() -> int { return 7 % 3 + 10 / 4; }"), 3);
}

#[test]
fn jit_boolean_operators() {
    assert_eq!(
        run("fn main() -> int { if 1 < 2 && 2 < 3 { return 1; } return 0; }"),
        1
    );
    assert_eq!(
        run("fn main() -> int { if !(1 < 2) || 5 < 4 { return 1; } return 0; }"),
        0
    );
}

#[test]
fn jit_unreachable_code_after_return_is_pruned() {
    assert_eq!(
        run("fn main() -> int { return 1; return 2; }"),
        1
    );
    assert_eq!(
        run("fn f() -> int { if 1 < 2 { return 1; } else { return 2; } } \
             fn main() -> int { return f(); }"),
        1
    );
}

#[test]
fn emits_ir_and_bitcode_files() {
    let context = Context::create();
    let codegen = build(&context, "fn main() -> int { return 0; }");
    let dir = std::env::temp_dir();
    let ir_path = dir.join("ferro_codegen_emit_test.ll");
    let bc_path = dir.join("ferro_codegen_emit_test.bc");
    codegen.save_ir(&ir_path).unwrap();
    codegen.save_bitcode(&bc_path).unwrap();
    assert!(std::fs::read_to_string(&ir_path)
        .unwrap()
        .contains("define i32 @main"));
    assert!(std::fs::metadata(&bc_path).unwrap().len() > 0);
    std::fs::remove_file(&ir_path).ok();
    std::fs::remove_file(&bc_path).ok();
}

#[test]
fn optimised_module_still_verifies_and_runs() {
    let context = Context::create();
    let mut source = Source::from_string("fn main() -> int { return 2 + 3; }");
    let program = parser::parse(&mut source).unwrap();
    semantic::analyze(&program).unwrap();
    let codegen = compile(&context, &program, OptimizationLevel::Default).unwrap();
    codegen.optimize().unwrap();
    assert!(codegen.verify().is_ok());
    assert_eq!(codegen.execute().unwrap(), 5);
}
