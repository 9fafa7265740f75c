//! Runtime and compile error reporting through the interpret API.

mod common;

use common::{capture_vm, run};

use aria_runtime::{InterpretResult, VmConfig};

fn expect_runtime_error(source: &str, message: &str) {
    let run = run(source);
    assert_eq!(run.result, InterpretResult::RuntimeError, "out: {}", run.out);
    let first = run.err.lines().next().unwrap_or_default();
    assert_eq!(first, message, "full stderr:\n{}", run.err);
}

#[test]
fn undefined_global_read() {
    expect_runtime_error("print missing;", "Undefined variable 'missing'.");
}

#[test]
fn undefined_global_assignment() {
    expect_runtime_error("missing = 1;", "Undefined variable 'missing'.");
    // The failed assignment must not have created the global.
    let (mut vm, _out, err) = capture_vm(VmConfig::new());
    assert_eq!(vm.interpret("missing = 1;"), InterpretResult::RuntimeError);
    assert_eq!(vm.interpret("print missing;"), InterpretResult::RuntimeError);
    assert!(err.contents().matches("Undefined variable 'missing'.").count() == 2);
}

#[test]
fn defined_then_read_is_fine() {
    let run = run("var present = 1; print present;");
    assert_eq!(run.result, InterpretResult::Ok);
    assert_eq!(run.out, "1\n");
}

#[test]
fn arithmetic_type_errors() {
    expect_runtime_error("print 1 + nil;", "Operands must be two numbers or two strings.");
    expect_runtime_error("print \"a\" + 1;", "Operands must be two numbers or two strings.");
    expect_runtime_error("print 1 - nil;", "Operands must be numbers.");
    expect_runtime_error("print true * 2;", "Operands must be numbers.");
    expect_runtime_error("print 1 < \"x\";", "Operands must be numbers.");
    expect_runtime_error("print -nil;", "Operand must be a number.");
}

#[test]
fn calling_a_non_callable() {
    expect_runtime_error("var x = 1; x();", "Can only call functions and classes.");
    expect_runtime_error("\"text\"();", "Can only call functions and classes.");
    expect_runtime_error("nil();", "Can only call functions and classes.");
}

#[test]
fn arity_mismatch() {
    expect_runtime_error(
        "fun f(a, b) {} f(1);",
        "Expected 2 arguments but got 1.",
    );
    expect_runtime_error(
        "fun f() {} f(1, 2, 3);",
        "Expected 0 arguments but got 3.",
    );
}

#[test]
fn class_call_arity() {
    // No initializer: constructor arguments are an error.
    expect_runtime_error("class A {} A(1);", "Expected 0 arguments but got 1.");
    // With an initializer, its arity governs.
    expect_runtime_error(
        "class A { init(x) {} } A();",
        "Expected 1 arguments but got 0.",
    );
}

#[test]
fn property_access_on_non_instances() {
    expect_runtime_error("print (1).x;", "Only instances have properties.");
    expect_runtime_error("var s = \"s\"; s.x = 1;", "Only instances have fields.");
    expect_runtime_error("true.m();", "Only instances have methods.");
    expect_runtime_error("class A {} A.m();", "Only instances have methods.");
}

#[test]
fn undefined_property() {
    expect_runtime_error("class A {} print A().missing;", "Undefined property 'missing'.");
    expect_runtime_error("class A {} A().missing();", "Undefined property 'missing'.");
}

#[test]
fn superclass_must_be_a_class() {
    expect_runtime_error("var NotAClass = 1; class B < NotAClass {}", "Superclass must be a class.");
}

#[test]
fn deep_recursion_overflows_the_frame_stack() {
    expect_runtime_error("fun recurse() { recurse(); } recurse();", "Stack overflow.");
}

#[test]
fn runtime_errors_carry_a_stack_trace() {
    let source = "\
fun a() { b(); }
fun b() { nil + 1; }
a();";
    let run = run(source);
    assert_eq!(run.result, InterpretResult::RuntimeError);
    assert_eq!(
        run.err,
        "Operands must be two numbers or two strings.\n\
         [line 2] in b()\n\
         [line 1] in a()\n\
         [line 3] in script\n"
    );
}

#[test]
fn compile_errors_report_and_skip_execution() {
    let run = run("print \"never runs\"; a * b = c;");
    assert_eq!(run.result, InterpretResult::CompileError);
    assert_eq!(run.out, "");
    assert_eq!(
        run.err,
        "[line 1] Error at '=': Invalid assignment target.\n"
    );
}

#[test]
fn session_survives_errors() {
    let (mut vm, out, _err) = capture_vm(VmConfig::new());
    assert_eq!(vm.interpret("var a = 1;"), InterpretResult::Ok);
    assert_eq!(vm.interpret("var = ;"), InterpretResult::CompileError);
    assert_eq!(vm.interpret("nope();"), InterpretResult::RuntimeError);
    // Earlier state is intact and new work proceeds.
    assert_eq!(vm.interpret("print a;"), InterpretResult::Ok);
    assert_eq!(out.contents(), "1\n");
}

#[test]
fn native_argument_errors() {
    expect_runtime_error("clock(1);", "clock() takes no arguments but got 1.");
    expect_runtime_error("readFile();", "readFile() takes 1 argument but got 0.");
    expect_runtime_error("readFile(1);", "readFile() expects a string path.");
    let run = run("readFile(\"/definitely/not/a/real/path.aria\");");
    assert_eq!(run.result, InterpretResult::RuntimeError);
    assert!(run.err.contains("failed to read"), "stderr:\n{}", run.err);
}
