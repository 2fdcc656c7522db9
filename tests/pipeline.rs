//! End-to-end scenarios: source text through parse, compile, the on-disk
//! container, and execution with injected I/O channels.

use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

use indoc::indoc;

use atlas::bytecode::{ByteCode, Op, make_instruction};
use atlas::compiler::Compiler;
use atlas::object::Object;
use atlas::parser::Parser;
use atlas::vm::Vm;

#[derive(Clone, Default)]
struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedOutput {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }
}

fn compile_source(source: &str) -> ByteCode {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    assert!(
        parser.errors().is_empty(),
        "unexpected diagnostics: {:?}",
        parser.errors()
    );
    let mut compiler = Compiler::new();
    compiler.compile_program(&program).expect("compile");
    compiler.bytecode()
}

/// Serializes and deserializes before executing, so every scenario also
/// exercises the container round-trip.
fn run_pipeline(source: &str, input: &str) -> (Vm, SharedOutput) {
    let bytecode = compile_source(source);

    let mut serialized = Vec::new();
    bytecode.write_to(&mut serialized).expect("serialize");
    let decoded = ByteCode::read_from(&mut serialized.as_slice()).expect("deserialize");
    assert_eq!(decoded, bytecode);

    let output = SharedOutput::default();
    let mut vm = Vm::with_io(
        decoded,
        Box::new(Cursor::new(input.as_bytes().to_vec())),
        Box::new(output.clone()),
    );
    vm.run().expect("run");
    (vm, output)
}

#[test]
fn input_bound_loop_counts_to_ten() {
    let source = indoc! {"
        var a = 0;
        in a;
        loop a < 10 {
            a = a + 1;
        }
    "};
    let (vm, _) = run_pipeline(source, "3\n");
    assert_eq!(vm.global(0), Some(Object::UnsignedInteger(10)));
}

#[test]
fn trailing_expression_statement_is_observable() {
    let (vm, _) = run_pipeline("1 + 2 * 3 - 6;", "");
    assert_eq!(vm.stack_top(), Some(Object::UnsignedInteger(1)));
}

#[test]
fn if_else_picks_then_arm() {
    let source = indoc! {"
        var x = 5;
        if x > 3 {
            x = 1;
        } else {
            x = 2;
        }
    "};
    let (vm, _) = run_pipeline(source, "");
    assert_eq!(vm.global(0), Some(Object::UnsignedInteger(1)));
}

#[test]
fn else_if_chain_picks_matching_arm() {
    let source = indoc! {"
        var x = 0;
        if x > 10 {
            x = 1;
        } else if x == 0 {
            x = 42;
        } else {
            x = 7;
        }
    "};
    let (vm, _) = run_pipeline(source, "");
    assert_eq!(vm.global(0), Some(Object::UnsignedInteger(42)));
}

#[test]
fn countdown_loop_terminates_at_zero() {
    let source = indoc! {"
        var a = 3;
        loop a > 0 {
            a = a - 1;
        }
    "};
    let (vm, _) = run_pipeline(source, "");
    assert_eq!(vm.global(0), Some(Object::UnsignedInteger(0)));
}

#[test]
fn negative_literal_coerces_to_signed_integer() {
    let (vm, _) = run_pipeline("var a = -5;", "");
    assert_eq!(vm.global(0), Some(Object::Integer(-5)));
}

#[test]
fn factorial_via_input() {
    let source = indoc! {"
        var a = 0;
        in a;

        var result = 1;
        loop a > 1 {
            result = result * a;
            a = a - 1;
        }
    "};
    let (vm, _) = run_pipeline(source, "5\n");
    assert_eq!(vm.global(1), Some(Object::UnsignedInteger(120)));
}

#[test]
fn comments_do_not_change_behavior() {
    let source = indoc! {"
        var x = 1; @ seed
        @ bump it once
        x = x + 1;
    "};
    let (vm, _) = run_pipeline(source, "");
    assert_eq!(vm.global(0), Some(Object::UnsignedInteger(2)));
}

#[test]
fn round_trip_preserves_every_constant_variant() {
    // Booleans compile to singleton opcodes, so the pool is exercised with
    // both integer variants plus a hand-registered boolean.
    let bytecode = compile_source("var a = -5; var b = 7;");
    assert!(
        bytecode
            .constants
            .iter()
            .all(|constant| matches!(constant, Object::UnsignedInteger(_)))
    );

    let mut with_all_variants = bytecode.clone();
    with_all_variants.constants.push(Object::Integer(-9));
    with_all_variants.constants.push(Object::Boolean(true));

    let mut serialized = Vec::new();
    with_all_variants.write_to(&mut serialized).expect("serialize");
    let decoded = ByteCode::read_from(&mut serialized.as_slice()).expect("deserialize");
    assert_eq!(decoded, with_all_variants);
}

#[test]
fn out_instruction_prints_inspect_form() {
    // The grammar has no print statement; OUT is driven by appending the
    // instruction to a compiled program, as a loaded bytecode file could.
    let mut bytecode = compile_source("var a = -5;");
    bytecode
        .instructions
        .extend(make_instruction(Op::GlobalGet, &[0]));
    bytecode.instructions.extend(make_instruction(Op::Out, &[]));

    let output = SharedOutput::default();
    let mut vm = Vm::with_io(bytecode, Box::new(io::empty()), Box::new(output.clone()));
    vm.run().expect("run");
    assert_eq!(output.contents(), "-5\n");
}

#[test]
fn parser_diagnostics_block_compilation() {
    let mut parser = Parser::new("var x = ;");
    let _ = parser.parse_program();
    assert!(!parser.errors().is_empty());
}

#[test]
fn runtime_keeps_one_residual_per_trailing_expression() {
    let (vm, _) = run_pipeline("var a = 1; 1 + 1; 2 + 2;", "");
    assert_eq!(vm.stack_top(), Some(Object::UnsignedInteger(4)));
}
