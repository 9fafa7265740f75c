//! Compiler state and shared machinery.
//!
//! One [`Compiler`] drives a whole compilation: it owns the scanner, the
//! one-token lookahead, the diagnostic list, and a stack of per-function
//! states (the innermost last) mirrored by a stack of per-class states.
//! Parsing and code emission are interleaved; the parse functions in
//! `expressions` and `statements` call back into the emit and resolution
//! helpers here.
//!
//! The heap is threaded through because functions are built directly as
//! heap objects: an in-progress function is registered as a collector root
//! for as long as its state is on the stack, so a collection triggered by
//! an allocation mid-compile can see the chunks being written.

use aria_core::{Chunk, Function, Heap, Obj, ObjPayload, OpCode, Value};

use crate::error::{CompileError, CompileErrors, ErrorLocation};
use crate::scanner::{Scanner, Token, TokenKind};

pub(crate) const MAX_LOCALS: usize = 256;
pub(crate) const MAX_UPVALUES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

/// A local variable slot. `depth` is `None` between declaration and the end
/// of its initializer, which is what makes `var a = a;` detectable.
pub(crate) struct Local<'src> {
    name: &'src str,
    depth: Option<usize>,
    is_captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UpvalueSpec {
    pub index: u8,
    pub is_local: bool,
}

/// Per-function compile state.
pub(crate) struct FunctionState<'src> {
    pub function: Obj,
    pub kind: FunctionKind,
    locals: Vec<Local<'src>>,
    pub upvalues: Vec<UpvalueSpec>,
    scope_depth: usize,
}

/// Per-class compile state, tracking whether `super` is meaningful.
pub(crate) struct ClassState {
    pub has_superclass: bool,
}

pub struct Compiler<'src, 'heap> {
    scanner: Scanner<'src>,
    pub(crate) heap: &'heap mut Heap,
    pub(crate) current: Token<'src>,
    pub(crate) previous: Token<'src>,
    errors: Vec<CompileError>,
    panic_mode: bool,
    functions: Vec<FunctionState<'src>>,
    pub(crate) classes: Vec<ClassState>,
}

/// Compiles `source` into a top-level script function on `heap`.
///
/// On success the returned function has arity 0 and owns every nested
/// function through its constant pool. On failure every recorded diagnostic
/// is returned; no function escapes.
pub fn compile(source: &str, heap: &mut Heap) -> Result<Obj, CompileErrors> {
    let mut compiler = Compiler::new(source, heap);
    compiler.push_function(FunctionKind::Script);
    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    let state = compiler.pop_function();
    if compiler.errors.is_empty() {
        Ok(state.function)
    } else {
        Err(CompileErrors(compiler.errors))
    }
}

impl<'src, 'heap> Compiler<'src, 'heap> {
    fn new(source: &'src str, heap: &'heap mut Heap) -> Compiler<'src, 'heap> {
        let placeholder = Token {
            kind: TokenKind::Eof,
            text: "",
            line: 1,
        };
        Compiler {
            scanner: Scanner::new(source),
            heap,
            current: placeholder,
            previous: placeholder,
            errors: Vec::new(),
            panic_mode: false,
            functions: Vec::new(),
            classes: Vec::new(),
        }
    }

    // =========================================================================
    // Function state stack
    // =========================================================================

    pub(crate) fn fun(&self) -> &FunctionState<'src> {
        self.functions.last().expect("active compiler frame")
    }

    pub(crate) fn fun_mut(&mut self) -> &mut FunctionState<'src> {
        self.functions.last_mut().expect("active compiler frame")
    }

    /// Opens a fresh compilation unit. The new function object is rooted on
    /// the heap's compiler-root stack until [`Self::pop_function`].
    pub(crate) fn push_function(&mut self, kind: FunctionKind) {
        self.heap.collect_if_needed();
        let function = self.heap.alloc(ObjPayload::Function(Function {
            arity: 0,
            upvalue_count: 0,
            name: None,
            chunk: Chunk::new(),
        }));
        self.heap.push_compiler_root(function);
        if kind != FunctionKind::Script {
            // The token text dies with the source, so the name is interned
            // now; the rooted function keeps it alive from here on.
            let name = self.intern(self.previous.text);
            self.heap.function_mut(function).name = Some(name);
        }

        let mut state = FunctionState {
            function,
            kind,
            locals: Vec::new(),
            upvalues: Vec::new(),
            scope_depth: 0,
        };
        // Slot 0 belongs to the callee, or to `this` inside methods.
        let slot_zero = match kind {
            FunctionKind::Method | FunctionKind::Initializer => "this",
            _ => "",
        };
        state.locals.push(Local {
            name: slot_zero,
            depth: Some(0),
            is_captured: false,
        });
        self.functions.push(state);
    }

    /// Closes the current compilation unit: emits the implicit return, pops
    /// its compiler root, and hands back the state (the caller still needs
    /// the upvalue specs to emit the capture list).
    pub(crate) fn pop_function(&mut self) -> FunctionState<'src> {
        self.emit_return();
        let state = match self.functions.pop() {
            Some(state) => state,
            None => unreachable!("compiler frame underflow"),
        };
        self.heap.pop_compiler_root();
        state
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    pub(crate) fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let token = self.current;
            self.error_at(token, token.text);
        }
    }

    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub(crate) fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    pub(crate) fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let location = match token.kind {
            TokenKind::Eof => ErrorLocation::End,
            TokenKind::Error => ErrorLocation::Unlocated,
            _ => ErrorLocation::Token(token.text.to_string()),
        };
        self.errors.push(CompileError {
            line: token.line,
            location,
            message: message.to_string(),
        });
    }

    /// Leaves panic mode by discarding tokens up to a statement boundary.
    pub(crate) fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    pub(crate) fn in_panic_mode(&self) -> bool {
        self.panic_mode
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn chunk_mut(&mut self) -> &mut Chunk {
        let function = self.functions.last().expect("active compiler frame").function;
        &mut self.heap.function_mut(function).chunk
    }

    pub(crate) fn code_len(&self) -> usize {
        self.heap.function(self.fun().function).chunk.code.len()
    }

    pub(crate) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk_mut().write(byte, line);
    }

    pub(crate) fn emit(&mut self, op: OpCode) {
        let line = self.previous.line;
        self.chunk_mut().write_op(op, line);
    }

    pub(crate) fn emit_with(&mut self, op: OpCode, operand: u8) {
        self.emit(op);
        self.emit_byte(operand);
    }

    /// Emits the implicit function return: the instance for initializers,
    /// nil for everything else.
    pub(crate) fn emit_return(&mut self) {
        if self.fun().kind == FunctionKind::Initializer {
            self.emit_with(OpCode::GetLocal, 0);
        } else {
            self.emit(OpCode::Nil);
        }
        self.emit(OpCode::Return);
    }

    /// Emits a jump with a placeholder offset; returns the offset operand's
    /// position for [`Self::patch_jump`].
    pub(crate) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.code_len() - 2
    }

    pub(crate) fn patch_jump(&mut self, offset: usize) {
        // The jump lands after its own two operand bytes.
        let jump = self.code_len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        let chunk = self.chunk_mut();
        chunk.code[offset] = (jump >> 8) as u8;
        chunk.code[offset + 1] = jump as u8;
    }

    pub(crate) fn emit_loop(&mut self, loop_start: usize) {
        self.emit(OpCode::Loop);
        let offset = self.code_len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_byte((offset >> 8) as u8);
        self.emit_byte(offset as u8);
    }

    pub(crate) fn make_constant(&mut self, value: Value) -> u8 {
        let function = self.fun().function;
        let index = self.heap.function_mut(function).chunk.add_constant(value);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    pub(crate) fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_with(OpCode::Constant, index);
    }

    /// Interning gate: gives the collector a chance to run first, using the
    /// compiler-root set registered on the heap.
    pub(crate) fn intern(&mut self, text: &str) -> Obj {
        self.heap.collect_if_needed();
        self.heap.intern(text)
    }

    pub(crate) fn identifier_constant(&mut self, name: &str) -> u8 {
        let name = self.intern(name);
        self.make_constant(Value::Obj(name))
    }

    // =========================================================================
    // Scopes and variables
    // =========================================================================

    pub(crate) fn begin_scope(&mut self) {
        self.fun_mut().scope_depth += 1;
    }

    pub(crate) fn end_scope(&mut self) {
        let depth = {
            let state = self.fun_mut();
            state.scope_depth -= 1;
            state.scope_depth
        };
        loop {
            let captured = match self.fun().locals.last() {
                Some(local) => match local.depth {
                    Some(d) if d > depth => local.is_captured,
                    _ => break,
                },
                None => break,
            };
            self.emit(if captured {
                OpCode::CloseUpvalue
            } else {
                OpCode::Pop
            });
            self.fun_mut().locals.pop();
        }
    }

    pub(crate) fn add_local(&mut self, name: &'src str) {
        if self.fun().locals.len() == MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.fun_mut().locals.push(Local {
            name,
            depth: None,
            is_captured: false,
        });
    }

    /// Records the variable named by the previous token in the current
    /// scope. Globals are late-bound, so at depth zero nothing is recorded.
    pub(crate) fn declare_variable(&mut self) {
        let depth = self.fun().scope_depth;
        if depth == 0 {
            return;
        }
        let name = self.previous.text;
        let mut duplicate = false;
        for local in self.fun().locals.iter().rev() {
            if let Some(d) = local.depth {
                if d < depth {
                    break;
                }
            }
            if local.name == name {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("A variable with this name already exists in this scope.");
        }
        self.add_local(name);
    }

    /// Parses a variable name. Returns the name-constant index for globals,
    /// 0 for locals (which live on the stack, not in the constant pool).
    pub(crate) fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.fun().scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(self.previous.text)
    }

    pub(crate) fn mark_initialized(&mut self) {
        let depth = self.fun().scope_depth;
        if depth == 0 {
            return;
        }
        if let Some(local) = self.fun_mut().locals.last_mut() {
            local.depth = Some(depth);
        }
    }

    /// Makes the just-declared variable usable: promotes the local to the
    /// current depth (no code needed, its value already sits in the right
    /// slot) or defines the global by name.
    pub(crate) fn define_variable(&mut self, global: u8) {
        if self.fun().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_with(OpCode::DefineGlobal, global);
    }

    fn resolve_local(&mut self, frame: usize, name: &str) -> Option<u8> {
        let mut found = None;
        for (slot, local) in self.functions[frame].locals.iter().enumerate().rev() {
            if local.name == name {
                found = Some((slot, local.depth.is_none()));
                break;
            }
        }
        match found {
            Some((slot, uninitialized)) => {
                if uninitialized {
                    self.error("Can't read local variable in its own initializer.");
                }
                Some(slot as u8)
            }
            None => None,
        }
    }

    /// Resolves `name` against enclosing functions, threading a chain of
    /// upvalue records down to `frame`. The directly captured local is
    /// flagged so its scope exit closes instead of popping.
    fn resolve_upvalue(&mut self, frame: usize, name: &str) -> Option<u8> {
        if frame == 0 {
            return None;
        }
        if let Some(local) = self.resolve_local(frame - 1, name) {
            self.functions[frame - 1].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(frame, local, true));
        }
        if let Some(upvalue) = self.resolve_upvalue(frame - 1, name) {
            return Some(self.add_upvalue(frame, upvalue, false));
        }
        None
    }

    fn add_upvalue(&mut self, frame: usize, index: u8, is_local: bool) -> u8 {
        let spec = UpvalueSpec { index, is_local };
        if let Some(existing) = self.functions[frame].upvalues.iter().position(|u| *u == spec) {
            return existing as u8;
        }
        if self.functions[frame].upvalues.len() == MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        self.functions[frame].upvalues.push(spec);
        let count = self.functions[frame].upvalues.len();
        let function = self.functions[frame].function;
        self.heap.function_mut(function).upvalue_count = count;
        (count - 1) as u8
    }

    /// Compiles a read of, or assignment to, `name`: local slot, upvalue
    /// chain, or global by interned name, in that order.
    pub(crate) fn named_variable(&mut self, name: &'src str, can_assign: bool) {
        let frame = self.functions.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(frame, name) {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(index) = self.resolve_upvalue(frame, name) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, index)
        } else {
            let constant = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_with(set_op, arg);
        } else {
            self.emit_with(get_op, arg);
        }
    }
}
