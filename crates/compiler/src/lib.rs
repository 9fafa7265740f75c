//! Aria compiler
//!
//! The single-pass front end: a hand-written scanner feeds a Pratt parser
//! that emits bytecode while parsing. There is no AST; local variable
//! slots, upvalue captures, and forward-jump offsets are all resolved
//! against compile-time state during the one pass.
//!
//! The entry point is [`compile`], which builds a top-level script function
//! (arity 0) on the caller's heap. Nested functions become constants of
//! their enclosing function's chunk, so the returned handle owns the whole
//! compiled program.

pub mod error;
pub mod scanner;

mod compiler;
mod expressions;
mod statements;

pub use compiler::compile;
pub use error::{CompileError, CompileErrors, ErrorLocation};

#[cfg(test)]
mod tests {
    use aria_core::{Heap, OpCode, Value, debug};

    use super::*;

    fn compile_ok(source: &str) -> (Heap, aria_core::Obj) {
        let mut heap = Heap::new();
        let function = compile(source, &mut heap).expect("program should compile");
        (heap, function)
    }

    fn first_error(source: &str) -> String {
        let mut heap = Heap::new();
        let errors = compile(source, &mut heap).expect_err("program should not compile");
        errors.0[0].to_string()
    }

    fn disassemble(source: &str) -> String {
        let (heap, function) = compile_ok(source);
        debug::disassemble_chunk(&heap, &heap.function(function).chunk, "test")
    }

    #[test]
    fn arithmetic_respects_precedence() {
        // 1 + 2 * 3 multiplies before adding.
        let text = disassemble("print 1 + 2 * 3;");
        let add = text.find("OP_ADD").expect("has add");
        let multiply = text.find("OP_MULTIPLY").expect("has multiply");
        assert!(multiply < add);
    }

    #[test]
    fn script_ends_with_implicit_nil_return() {
        let (heap, function) = compile_ok("");
        let chunk = &heap.function(function).chunk;
        assert_eq!(chunk.code, vec![u8::from(OpCode::Nil), u8::from(OpCode::Return)]);
    }

    #[test]
    fn initializer_returns_the_instance() {
        let (heap, function) = compile_ok("class P { init() {} }");
        // The init method function is a constant of the script chunk; its
        // implicit return loads local 0 (the instance) instead of nil.
        let init = heap
            .function(function)
            .chunk
            .constants
            .iter()
            .find_map(|&c| match c {
                Value::Obj(obj) => match heap.payload(obj) {
                    aria_core::ObjPayload::Function(_) => Some(obj),
                    _ => None,
                },
                _ => None,
            })
            .expect("init function constant");
        let code = &heap.function(init).chunk.code;
        assert_eq!(
            code,
            &vec![
                u8::from(OpCode::GetLocal),
                0,
                u8::from(OpCode::Return),
            ]
        );
    }

    #[test]
    fn locals_resolve_to_slots_not_names() {
        let text = disassemble("{ var a = 1; print a; }");
        assert!(text.contains("OP_GET_LOCAL"));
        assert!(!text.contains("OP_GET_GLOBAL"));
    }

    #[test]
    fn globals_resolve_by_name_constant() {
        let text = disassemble("var a = 1; print a;");
        assert!(text.contains("OP_DEFINE_GLOBAL"));
        assert!(text.contains("OP_GET_GLOBAL"));
    }

    #[test]
    fn closure_captures_emit_upvalue_specs() {
        let (heap, function) = compile_ok(
            "fun outer() { var x = 1; fun inner() { print x; } return inner; }",
        );
        let outer = heap
            .function(function)
            .chunk
            .constants
            .iter()
            .find_map(|&c| match c {
                Value::Obj(obj) => match heap.payload(obj) {
                    aria_core::ObjPayload::Function(_) => Some(obj),
                    _ => None,
                },
                _ => None,
            })
            .expect("outer function constant");
        let inner = heap
            .function(outer)
            .chunk
            .constants
            .iter()
            .find_map(|&c| match c {
                Value::Obj(obj) => match heap.payload(obj) {
                    aria_core::ObjPayload::Function(f) if f.name.is_some() => Some(obj),
                    _ => None,
                },
                _ => None,
            })
            .expect("inner function constant");
        assert_eq!(heap.function(inner).upvalue_count, 1);
        // The outer chunk carries the (is_local, index) capture pair after
        // its CLOSURE instruction.
        let text = debug::disassemble_chunk(&heap, &heap.function(outer).chunk, "outer");
        assert!(text.contains("local 1"), "capture spec missing:\n{text}");
    }

    #[test]
    fn invalid_assignment_target() {
        assert_eq!(
            first_error("a * b = c;"),
            "[line 1] Error at '=': Invalid assignment target."
        );
        assert_eq!(
            first_error("a + b = c;"),
            "[line 1] Error at '=': Invalid assignment target."
        );
    }

    #[test]
    fn duplicate_declaration_in_same_scope() {
        assert_eq!(
            first_error("{ var a = 1; var a = 2; }"),
            "[line 1] Error at 'a': A variable with this name already exists in this scope."
        );
    }

    #[test]
    fn shadowing_in_inner_scope_is_fine() {
        compile_ok("{ var a = 1; { var a = 2; print a; } }");
    }

    #[test]
    fn reading_local_in_own_initializer() {
        assert_eq!(
            first_error("{ var a = 1; { var a = a; } }"),
            "[line 1] Error at 'a': Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn return_outside_function() {
        assert_eq!(
            first_error("return 1;"),
            "[line 1] Error at 'return': Can't return from top-level code."
        );
    }

    #[test]
    fn return_value_in_initializer() {
        assert_eq!(
            first_error("class P { init() { return 1; } }"),
            "[line 1] Error at 'return': Can't return a value from an initializer."
        );
        // A bare return is allowed.
        compile_ok("class P { init() { return; } }");
    }

    #[test]
    fn this_and_super_misuse() {
        assert_eq!(
            first_error("print this;"),
            "[line 1] Error at 'this': Can't use 'this' outside of a class."
        );
        assert_eq!(
            first_error("class A { f() { super.f(); } }"),
            "[line 1] Error at 'super': Can't use 'super' in a class with no superclass."
        );
        assert_eq!(
            first_error("fun f() { super.f(); }"),
            "[line 1] Error at 'super': Can't use 'super' outside of a class."
        );
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        assert_eq!(
            first_error("class A < A {}"),
            "[line 1] Error at 'A': A class can't inherit from itself."
        );
    }

    #[test]
    fn parameter_count_boundary() {
        let ok = (0..255).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        compile_ok(&format!("fun f({ok}) {{}}"));

        let too_many = (0..256).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        assert!(
            first_error(&format!("fun f({too_many}) {{}}"))
                .contains("Can't have more than 255 parameters.")
        );
    }

    #[test]
    fn argument_count_boundary() {
        // `nil` arguments keep the constant pool out of the picture.
        let ok = (0..255).map(|_| "nil").collect::<Vec<_>>().join(", ");
        compile_ok(&format!("f({ok});"));

        let too_many = (0..256).map(|_| "nil").collect::<Vec<_>>().join(", ");
        assert!(
            first_error(&format!("f({too_many});"))
                .contains("Can't have more than 255 arguments.")
        );
    }

    #[test]
    fn constant_pool_boundary() {
        // Each distinct number literal takes one constant slot; the 257th
        // overflows the 8-bit index.
        let ok: String = (0..256).map(|i| format!("{i};")).collect();
        compile_ok(&ok);

        let too_many: String = (0..257).map(|i| format!("{i};")).collect();
        assert!(first_error(&too_many).contains("Too many constants in one chunk."));
    }

    #[test]
    fn jump_distance_boundary() {
        // `!nil;` compiles to three bytes and `nil;` to two, with no
        // constants. A then-branch of exactly 65535 bytes is the largest a
        // jump can step over: POP + statements + the else JUMP.
        let just_fits = format!("if (nil) {{ {}{} }}", "!nil;".repeat(21843), "nil;");
        compile_ok(&just_fits);

        let one_too_far = format!("if (nil) {{ {} }}", "!nil;".repeat(21844));
        assert!(first_error(&one_too_far).contains("Too much code to jump over."));
    }

    #[test]
    fn loop_body_size_boundary() {
        let big = format!("while (nil) {{ {} }}", "!nil;".repeat(21900));
        assert!(first_error(&big).contains("Loop body too large."));
    }

    #[test]
    fn local_count_boundary() {
        // Slot 0 is reserved, leaving 255 declarable locals per function.
        let ok: String = (0..255).map(|i| format!("var l{i} = 0;")).collect();
        compile_ok(&format!("fun f() {{ {ok} }}"));

        let too_many: String = (0..256).map(|i| format!("var l{i} = 0;")).collect();
        assert!(
            first_error(&format!("fun f() {{ {too_many} }}"))
                .contains("Too many local variables in function.")
        );
    }

    #[test]
    fn panic_mode_suppresses_cascades_and_resynchronizes() {
        let mut heap = Heap::new();
        let errors = compile("var = 1;\nvar ok = 2;\nvar = 3;", &mut heap)
            .expect_err("should fail");
        // One diagnostic per bad statement; the good one in between parses.
        assert_eq!(errors.0.len(), 2);
        assert_eq!(errors.0[0].line, 1);
        assert_eq!(errors.0[1].line, 3);
    }

    #[test]
    fn missing_expression() {
        assert_eq!(
            first_error("print ;"),
            "[line 1] Error at ';': Expect expression."
        );
    }

    #[test]
    fn scanner_errors_surface_as_diagnostics() {
        assert_eq!(first_error("@"), "[line 1] Error: Unexpected character.");
        assert_eq!(
            first_error("var s = \"oops\nprint s;"),
            "[line 1] Error: Unterminated string."
        );
    }

    #[test]
    fn compile_errors_produce_no_function() {
        let mut heap = Heap::new();
        assert!(compile("var = ;", &mut heap).is_err());
    }
}
