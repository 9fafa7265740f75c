//! Textual chunk disassembler.
//!
//! Renders compiled bytecode in the classic one-instruction-per-line form:
//!
//! ```text
//! == <script> ==
//! 0000    1 OP_CONSTANT         0 '1.2'
//! 0002    | OP_RETURN
//! ```
//!
//! Used by the `--print-code` flag, the execution tracer, and compiler
//! tests that assert on emitted code.

use std::fmt::Write;

use crate::chunk::{Chunk, OpCode};
use crate::heap::Heap;
use crate::value::Value;

pub fn disassemble_chunk(heap: &Heap, chunk: &Chunk, name: &str) -> String {
    let mut text = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.code.len() {
        let (line, next) = disassemble_instruction(heap, chunk, offset);
        text.push_str(&line);
        text.push('\n');
        offset = next;
    }
    text
}

/// Renders the instruction at `offset`; returns the text and the offset of
/// the next instruction.
pub fn disassemble_instruction(heap: &Heap, chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut text = format!("{offset:04} ");
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        text.push_str("   | ");
    } else {
        let _ = write!(text, "{:4} ", chunk.lines[offset]);
    }

    let Ok(op) = OpCode::try_from(chunk.code[offset]) else {
        let _ = write!(text, "Unknown opcode {}", chunk.code[offset]);
        return (text, offset + 1);
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetProperty
        | OpCode::SetProperty
        | OpCode::GetSuper
        | OpCode::Class
        | OpCode::Method => constant_instruction(heap, chunk, op, offset, &mut text),
        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call => byte_instruction(chunk, op, offset, &mut text),
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(chunk, op, offset, 1, &mut text),
        OpCode::Loop => jump_instruction(chunk, op, offset, -1, &mut text),
        OpCode::Invoke | OpCode::SuperInvoke => invoke_instruction(heap, chunk, op, offset, &mut text),
        OpCode::Closure => closure_instruction(heap, chunk, offset, &mut text),
        _ => {
            let _ = write!(text, "{op}");
            (text, offset + 1)
        }
    }
}

fn constant_value(heap: &Heap, chunk: &Chunk, index: u8) -> String {
    match chunk.constants.get(index as usize) {
        Some(&value) => heap.format_value(value),
        None => "<bad constant>".to_string(),
    }
}

fn constant_instruction(
    heap: &Heap,
    chunk: &Chunk,
    op: OpCode,
    offset: usize,
    text: &mut String,
) -> (String, usize) {
    let index = chunk.code[offset + 1];
    let _ = write!(
        text,
        "{op:<16} {index:4} '{}'",
        constant_value(heap, chunk, index)
    );
    (std::mem::take(text), offset + 2)
}

fn byte_instruction(chunk: &Chunk, op: OpCode, offset: usize, text: &mut String) -> (String, usize) {
    let slot = chunk.code[offset + 1];
    let _ = write!(text, "{op:<16} {slot:4}");
    (std::mem::take(text), offset + 2)
}

fn jump_instruction(
    chunk: &Chunk,
    op: OpCode,
    offset: usize,
    sign: i64,
    text: &mut String,
) -> (String, usize) {
    let jump = i64::from(u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]));
    let target = offset as i64 + 3 + sign * jump;
    let _ = write!(text, "{op:<16} {offset:4} -> {target}");
    (std::mem::take(text), offset + 3)
}

fn invoke_instruction(
    heap: &Heap,
    chunk: &Chunk,
    op: OpCode,
    offset: usize,
    text: &mut String,
) -> (String, usize) {
    let index = chunk.code[offset + 1];
    let arg_count = chunk.code[offset + 2];
    let _ = write!(
        text,
        "{op:<16} ({arg_count} args) {index:4} '{}'",
        constant_value(heap, chunk, index)
    );
    (std::mem::take(text), offset + 3)
}

fn closure_instruction(
    heap: &Heap,
    chunk: &Chunk,
    offset: usize,
    text: &mut String,
) -> (String, usize) {
    let index = chunk.code[offset + 1];
    let _ = write!(
        text,
        "{:<16} {index:4} {}",
        OpCode::Closure,
        constant_value(heap, chunk, index)
    );
    let mut next = offset + 2;

    // The capture list length comes from the function constant itself.
    let upvalue_count = match chunk.constants.get(index as usize) {
        Some(Value::Obj(obj)) => heap.function(*obj).upvalue_count,
        _ => 0,
    };
    for _ in 0..upvalue_count {
        let is_local = chunk.code[next];
        let capture_index = chunk.code[next + 1];
        let kind = if is_local != 0 { "local" } else { "upvalue" };
        let _ = write!(text, "\n{next:04}      |                     {kind} {capture_index}");
        next += 2;
    }
    (std::mem::take(text), next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_constants_and_simple_ops() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        let constant = chunk.add_constant(Value::Number(1.2)) as u8;
        chunk.write_op(OpCode::Constant, 123);
        chunk.write(constant, 123);
        chunk.write_op(OpCode::Return, 123);

        let text = disassemble_chunk(&heap, &chunk, "test chunk");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "== test chunk ==");
        assert_eq!(lines[1], "0000  123 OP_CONSTANT         0 '1.2'");
        assert_eq!(lines[2], "0002    | OP_RETURN");
    }

    #[test]
    fn renders_jump_targets() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::JumpIfFalse, 1);
        chunk.write(0, 1);
        chunk.write(4, 1);
        let (text, next) = disassemble_instruction(&heap, &chunk, 0);
        assert_eq!(text, "0000    1 OP_JUMP_IF_FALSE    0 -> 7");
        assert_eq!(next, 3);
    }
}
