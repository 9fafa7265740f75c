//! The bytecode virtual machine.
//!
//! A stack machine driven by a dispatch loop over the current frame's byte
//! stream. Frames carry a closure handle, an instruction pointer, and the
//! base of their stack window; frame-relative slot zero is the callee (or
//! the receiver, for method calls). Open upvalues form a list sorted by
//! descending stack slot so closing everything at or above a threshold is
//! one walk from the head.
//!
//! Every heap allocation the interpreter performs goes through the gated
//! helpers at the bottom, which give the collector a chance to run first
//! with the full VM root set. Multi-step allocations keep each fresh
//! object reachable (usually by pushing it on the value stack) before the
//! next step can allocate.

use std::io::{self, Write};

use aria_core::{
    BoundMethod, Class, Closure, Heap, Instance, Native, NativeFn, Obj, ObjPayload, OpCode, Table,
    Upvalue, UpvalueState, Value, debug,
};

use crate::config::VmConfig;
use crate::natives;

pub const FRAMES_MAX: usize = 64;
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// Outcome of one `interpret` call. Errors have already been reported
/// through the VM's error sink by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// Signals that the current interpret call is unwinding after a runtime
/// error; the report and stack reset have already happened.
pub(crate) struct Abort;

pub(crate) struct CallFrame {
    pub(crate) closure: Obj,
    /// Offset into the closure's chunk.
    ip: usize,
    /// Stack index of frame-relative slot zero.
    slots: usize,
}

pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    /// Head of the open-upvalue list (descending stack slot order).
    pub(crate) open_upvalues: Option<Obj>,
    config: VmConfig,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl Vm {
    pub fn new() -> Vm {
        Vm::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Vm {
        let mut heap = Heap::new();
        heap.set_stress(config.stress_gc);
        let mut vm = Vm {
            heap,
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            open_upvalues: None,
            config,
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
        };
        vm.define_native("clock", natives::clock);
        vm.define_native("readFile", natives::read_file);
        vm
    }

    /// Redirects program output; used by embedders and tests.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Vm {
        self.out = out;
        self
    }

    /// Redirects error reports; used by embedders and tests.
    pub fn with_error_output(mut self, err: Box<dyn Write>) -> Vm {
        self.err = err;
        self
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Compiles and runs `source` against this VM's persistent state.
    /// Globals survive across calls; the value stack does not.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let function = match aria_compiler::compile(source, &mut self.heap) {
            Ok(function) => function,
            Err(errors) => {
                let _ = writeln!(self.err, "{errors}");
                return InterpretResult::CompileError;
            }
        };

        if self.config.print_code {
            self.dump_code(function);
        }

        // The script function is rooted on the stack while its closure is
        // allocated, then swapped for the closure.
        self.stack.push(Value::Obj(function));
        let closure = self.alloc(ObjPayload::Closure(Closure {
            function,
            upvalues: Vec::new(),
        }));
        self.pop();
        self.stack.push(Value::Obj(closure));

        match self.call(closure, 0).and_then(|()| self.execute()) {
            Ok(()) => InterpretResult::Ok,
            Err(Abort) => InterpretResult::RuntimeError,
        }
    }

    fn define_native(&mut self, name: &str, function: NativeFn) {
        let name = self.intern_string(name);
        self.stack.push(Value::Obj(name));
        let native = self.alloc(ObjPayload::Native(Native { function }));
        self.heap.globals.set(name, Value::Obj(native));
        self.pop();
    }

    // =========================================================================
    // Dispatch loop
    // =========================================================================

    fn execute(&mut self) -> Result<(), Abort> {
        loop {
            if self.config.trace_execution {
                self.trace_instruction();
            }

            let byte = self.read_byte();
            let Ok(op) = OpCode::try_from(byte) else {
                return Err(self.fail(format!("Unknown opcode {byte}.")));
            };

            match op {
                OpCode::Constant => {
                    let constant = self.read_constant();
                    self.stack.push(constant);
                }
                OpCode::Nil => self.stack.push(Value::Nil),
                OpCode::True => self.stack.push(Value::Bool(true)),
                OpCode::False => self.stack.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slots;
                    self.stack.push(self.stack[base + slot]);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slots;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    match self.heap.globals.get(name) {
                        Some(value) => self.stack.push(value),
                        None => {
                            let message =
                                format!("Undefined variable '{}'.", self.heap.string(name));
                            return Err(self.fail(message));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    self.heap.globals.set(name, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    if self.heap.globals.set(name, value) {
                        // Assignment may not create a global; undo the
                        // accidental insert before reporting.
                        self.heap.globals.delete(name);
                        let message = format!("Undefined variable '{}'.", self.heap.string(name));
                        return Err(self.fail(message));
                    }
                }
                OpCode::GetUpvalue => {
                    let index = self.read_byte() as usize;
                    let upvalue = self.heap.closure(self.frame().closure).upvalues[index];
                    let value = match self.heap.upvalue(upvalue).state {
                        UpvalueState::Open(slot) => self.stack[slot],
                        UpvalueState::Closed(value) => value,
                    };
                    self.stack.push(value);
                }
                OpCode::SetUpvalue => {
                    let index = self.read_byte() as usize;
                    let upvalue = self.heap.closure(self.frame().closure).upvalues[index];
                    let value = self.peek(0);
                    match self.heap.upvalue(upvalue).state {
                        UpvalueState::Open(slot) => self.stack[slot] = value,
                        UpvalueState::Closed(_) => {
                            self.heap.upvalue_mut(upvalue).state = UpvalueState::Closed(value);
                        }
                    }
                }
                OpCode::GetProperty => {
                    let name = self.read_string();
                    let receiver = self.peek(0);
                    let Some((class, field)) = self.instance_lookup(receiver, name) else {
                        return Err(self.fail("Only instances have properties."));
                    };
                    match field {
                        Some(value) => {
                            self.pop();
                            self.stack.push(value);
                        }
                        None => self.bind_method(class, name)?,
                    }
                }
                OpCode::SetProperty => {
                    let name = self.read_string();
                    let target = self.peek(1);
                    let Some(instance) = self.instance_handle(target) else {
                        return Err(self.fail("Only instances have fields."));
                    };
                    let value = self.peek(0);
                    self.heap.instance_mut(instance).fields.set(name, value);
                    // Replace both operands with the assigned value.
                    let value = self.pop();
                    self.pop();
                    self.stack.push(value);
                }
                OpCode::GetSuper => {
                    let name = self.read_string();
                    let superclass = match self.pop() {
                        Value::Obj(obj) => obj,
                        other => unreachable!("super lookup on {other:?}"),
                    };
                    self.bind_method(superclass, name)?;
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater => {
                    let (a, b) = self.numeric_operands()?;
                    self.stack.push(Value::Bool(a > b));
                }
                OpCode::Less => {
                    let (a, b) = self.numeric_operands()?;
                    self.stack.push(Value::Bool(a < b));
                }
                OpCode::Add => {
                    let b = self.peek(0);
                    let a = self.peek(1);
                    if let (Some(a), Some(b)) = (self.string_handle(a), self.string_handle(b)) {
                        self.concatenate(a, b);
                    } else if let (Value::Number(a), Value::Number(b)) = (a, b) {
                        self.pop();
                        self.pop();
                        self.stack.push(Value::Number(a + b));
                    } else {
                        return Err(self.fail("Operands must be two numbers or two strings."));
                    }
                }
                OpCode::Subtract => {
                    let (a, b) = self.numeric_operands()?;
                    self.stack.push(Value::Number(a - b));
                }
                OpCode::Multiply => {
                    let (a, b) = self.numeric_operands()?;
                    self.stack.push(Value::Number(a * b));
                }
                OpCode::Divide => {
                    let (a, b) = self.numeric_operands()?;
                    self.stack.push(Value::Number(a / b));
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.stack.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    let Value::Number(value) = self.peek(0) else {
                        return Err(self.fail("Operand must be a number."));
                    };
                    self.pop();
                    self.stack.push(Value::Number(-value));
                }
                OpCode::Print => {
                    let value = self.pop();
                    let text = self.heap.format_value(value);
                    let _ = writeln!(self.out, "{text}");
                }
                OpCode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0).is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip -= offset;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte() as usize;
                    self.call_value(self.peek(arg_count), arg_count)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte() as usize;
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte() as usize;
                    let superclass = match self.pop() {
                        Value::Obj(obj) => obj,
                        other => unreachable!("super invoke on {other:?}"),
                    };
                    self.invoke_from_class(superclass, name, arg_count)?;
                }
                OpCode::Closure => {
                    let function = match self.read_constant() {
                        Value::Obj(obj) => obj,
                        other => unreachable!("closure of {other:?}"),
                    };
                    let upvalue_count = self.heap.function(function).upvalue_count;
                    let closure = self.alloc(ObjPayload::Closure(Closure {
                        function,
                        upvalues: Vec::with_capacity(upvalue_count),
                    }));
                    // On the stack before captures allocate, so a capture's
                    // collection can't reclaim the half-built closure.
                    self.stack.push(Value::Obj(closure));
                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte() != 0;
                        let index = self.read_byte() as usize;
                        let upvalue = if is_local {
                            let slot = self.frame().slots + index;
                            self.capture_upvalue(slot)
                        } else {
                            self.heap.closure(self.frame().closure).upvalues[index]
                        };
                        self.heap.closure_mut(closure).upvalues.push(upvalue);
                    }
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = match self.frames.pop() {
                        Some(frame) => frame,
                        None => unreachable!("return without a frame"),
                    };
                    self.close_upvalues(frame.slots);
                    if self.frames.is_empty() {
                        self.pop(); // the script closure
                        return Ok(());
                    }
                    self.stack.truncate(frame.slots);
                    self.stack.push(result);
                }
                OpCode::Class => {
                    let name = self.read_string();
                    let class = self.alloc(ObjPayload::Class(Class {
                        name,
                        methods: Table::new(),
                    }));
                    self.stack.push(Value::Obj(class));
                }
                OpCode::Inherit => {
                    let superclass = self.peek(1);
                    let Some(superclass) = self.class_handle(superclass) else {
                        return Err(self.fail("Superclass must be a class."));
                    };
                    let subclass = match self.peek(0) {
                        Value::Obj(obj) => obj,
                        other => unreachable!("inherit into {other:?}"),
                    };
                    // Copy-down inheritance: the subclass starts from a full
                    // copy of the parent's methods, so dispatch never walks
                    // a superclass chain.
                    let methods = self.heap.class(superclass).methods.clone();
                    self.heap.class_mut(subclass).methods.add_all(&methods);
                    self.pop();
                }
                OpCode::Method => {
                    let name = self.read_string();
                    let method = self.peek(0);
                    let class = match self.peek(1) {
                        Value::Obj(obj) => obj,
                        other => unreachable!("method on {other:?}"),
                    };
                    self.heap.class_mut(class).methods.set(name, method);
                    self.pop();
                }
            }
        }
    }

    // =========================================================================
    // Calls and method dispatch
    // =========================================================================

    fn call_value(&mut self, callee: Value, arg_count: usize) -> Result<(), Abort> {
        if let Value::Obj(obj) = callee {
            match self.heap.payload(obj) {
                ObjPayload::BoundMethod(bound) => {
                    let bound: BoundMethod = *bound;
                    let receiver_slot = self.stack.len() - arg_count - 1;
                    self.stack[receiver_slot] = bound.receiver;
                    return self.call(bound.method, arg_count);
                }
                ObjPayload::Class(_) => return self.call_class(obj, arg_count),
                ObjPayload::Closure(_) => return self.call(obj, arg_count),
                ObjPayload::Native(native) => {
                    let function = native.function;
                    return self.call_native(function, arg_count);
                }
                _ => {}
            }
        }
        Err(self.fail("Can only call functions and classes."))
    }

    fn call(&mut self, closure: Obj, arg_count: usize) -> Result<(), Abort> {
        let arity = {
            let function = self.heap.closure(closure).function;
            self.heap.function(function).arity as usize
        };
        if arg_count != arity {
            let message = format!("Expected {arity} arguments but got {arg_count}.");
            return Err(self.fail(message));
        }
        if self.frames.len() == FRAMES_MAX {
            return Err(self.fail("Stack overflow."));
        }
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots: self.stack.len() - arg_count - 1,
        });
        Ok(())
    }

    fn call_class(&mut self, class: Obj, arg_count: usize) -> Result<(), Abort> {
        // The callee slot becomes the instance; the class stays rooted
        // through that slot until the overwrite.
        let instance = self.alloc(ObjPayload::Instance(Instance {
            class,
            fields: Table::new(),
        }));
        let callee_slot = self.stack.len() - arg_count - 1;
        self.stack[callee_slot] = Value::Obj(instance);

        match self.heap.class(class).methods.get(self.heap.init_string()) {
            Some(Value::Obj(initializer)) => self.call(initializer, arg_count),
            Some(other) => unreachable!("non-closure initializer {other:?}"),
            None if arg_count != 0 => {
                let message = format!("Expected 0 arguments but got {arg_count}.");
                Err(self.fail(message))
            }
            None => Ok(()),
        }
    }

    fn call_native(&mut self, native: NativeFn, arg_count: usize) -> Result<(), Abort> {
        let arg_start = self.stack.len() - arg_count;
        match native(&mut self.heap, &self.stack[arg_start..]) {
            Ok(value) => {
                self.stack.truncate(arg_start - 1);
                self.stack.push(value);
                Ok(())
            }
            Err(message) => Err(self.fail(message)),
        }
    }

    /// `INVOKE`: a field shadowing a method wins and is called as a plain
    /// value; otherwise the method is called directly, skipping the
    /// bound-method allocation a `GetProperty`/`Call` pair would make.
    fn invoke(&mut self, name: Obj, arg_count: usize) -> Result<(), Abort> {
        let receiver = self.peek(arg_count);
        let Some((class, field)) = self.instance_lookup(receiver, name) else {
            return Err(self.fail("Only instances have methods."));
        };
        if let Some(value) = field {
            let receiver_slot = self.stack.len() - arg_count - 1;
            self.stack[receiver_slot] = value;
            return self.call_value(value, arg_count);
        }
        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(&mut self, class: Obj, name: Obj, arg_count: usize) -> Result<(), Abort> {
        match self.heap.class(class).methods.get(name) {
            Some(Value::Obj(method)) => self.call(method, arg_count),
            Some(other) => unreachable!("non-closure method {other:?}"),
            None => {
                let message = format!("Undefined property '{}'.", self.heap.string(name));
                Err(self.fail(message))
            }
        }
    }

    fn bind_method(&mut self, class: Obj, name: Obj) -> Result<(), Abort> {
        let Some(method) = self.heap.class(class).methods.get(name) else {
            let message = format!("Undefined property '{}'.", self.heap.string(name));
            return Err(self.fail(message));
        };
        let method = match method {
            Value::Obj(obj) => obj,
            other => unreachable!("non-closure method {other:?}"),
        };
        let receiver = self.peek(0);
        let bound = self.alloc(ObjPayload::BoundMethod(BoundMethod { receiver, method }));
        self.pop();
        self.stack.push(Value::Obj(bound));
        Ok(())
    }

    // =========================================================================
    // Upvalues
    // =========================================================================

    /// Returns the open upvalue for `slot`, reusing an existing one so no
    /// stack slot is ever captured twice. The list stays sorted by
    /// descending slot.
    fn capture_upvalue(&mut self, slot: usize) -> Obj {
        let mut prev: Option<Obj> = None;
        let mut current = self.open_upvalues;
        while let Some(obj) = current {
            let upvalue = self.heap.upvalue(obj);
            match upvalue.state {
                UpvalueState::Open(s) if s > slot => {
                    prev = Some(obj);
                    current = upvalue.next;
                }
                UpvalueState::Open(s) if s == slot => return obj,
                _ => break,
            }
        }

        let created = self.alloc(ObjPayload::Upvalue(Upvalue {
            state: UpvalueState::Open(slot),
            next: current,
        }));
        match prev {
            None => self.open_upvalues = Some(created),
            Some(prev) => self.heap.upvalue_mut(prev).next = Some(created),
        }
        created
    }

    /// Closes every open upvalue capturing a slot at or above `threshold`:
    /// the value moves into the upvalue and the cell leaves the open list.
    fn close_upvalues(&mut self, threshold: usize) {
        while let Some(obj) = self.open_upvalues {
            let upvalue = self.heap.upvalue(obj);
            let UpvalueState::Open(slot) = upvalue.state else {
                break;
            };
            if slot < threshold {
                break;
            }
            let next = upvalue.next;
            let value = self.stack[slot];
            let upvalue = self.heap.upvalue_mut(obj);
            upvalue.state = UpvalueState::Closed(value);
            upvalue.next = None;
            self.open_upvalues = next;
        }
    }

    // =========================================================================
    // Operand helpers
    // =========================================================================

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("active call frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("active call frame")
    }

    fn read_byte(&mut self) -> u8 {
        let closure = self.frame().closure;
        let ip = self.frame().ip;
        self.frame_mut().ip += 1;
        let function = self.heap.closure(closure).function;
        self.heap.function(function).chunk.code[ip]
    }

    fn read_u16(&mut self) -> u16 {
        let high = self.read_byte();
        let low = self.read_byte();
        u16::from_be_bytes([high, low])
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let function = self.heap.closure(self.frame().closure).function;
        self.heap.function(function).chunk.constants[index]
    }

    fn read_string(&mut self) -> Obj {
        match self.read_constant() {
            Value::Obj(obj) => obj,
            other => unreachable!("name constant {other:?} is not a string"),
        }
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    fn numeric_operands(&mut self) -> Result<(f64, f64), Abort> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                Ok((a, b))
            }
            _ => Err(self.fail("Operands must be numbers.")),
        }
    }

    fn string_handle(&self, value: Value) -> Option<Obj> {
        match value {
            Value::Obj(obj) if matches!(self.heap.payload(obj), ObjPayload::String(_)) => Some(obj),
            _ => None,
        }
    }

    fn class_handle(&self, value: Value) -> Option<Obj> {
        match value {
            Value::Obj(obj) if matches!(self.heap.payload(obj), ObjPayload::Class(_)) => Some(obj),
            _ => None,
        }
    }

    fn instance_handle(&self, value: Value) -> Option<Obj> {
        match value {
            Value::Obj(obj) if matches!(self.heap.payload(obj), ObjPayload::Instance(_)) => {
                Some(obj)
            }
            _ => None,
        }
    }

    /// For an instance value: its class and the field named `name`, if set.
    fn instance_lookup(&self, value: Value, name: Obj) -> Option<(Obj, Option<Value>)> {
        let obj = value.as_obj()?;
        match self.heap.payload(obj) {
            ObjPayload::Instance(instance) => {
                Some((instance.class, instance.fields.get(name)))
            }
            _ => None,
        }
    }

    /// Concatenates two strings from the stack. The operands stay pushed
    /// until the result exists, keeping them rooted across the allocation.
    fn concatenate(&mut self, a: Obj, b: Obj) {
        let text = format!("{}{}", self.heap.string(a), self.heap.string(b));
        let result = self.intern_string(&text);
        self.pop();
        self.pop();
        self.stack.push(Value::Obj(result));
    }

    // =========================================================================
    // Error reporting
    // =========================================================================

    /// Reports a runtime error with a stack trace and resets the VM for the
    /// next interpret call. Returns the unwind token call sites wrap in
    /// `Err`.
    fn fail(&mut self, message: impl AsRef<str>) -> Abort {
        let _ = writeln!(self.err, "{}", message.as_ref());
        for frame in self.frames.iter().rev() {
            let closure = self.heap.closure(frame.closure);
            let function = self.heap.function(closure.function);
            // ip sits just past the failing instruction's last byte.
            let line = function.chunk.lines[frame.ip - 1];
            match function.name {
                Some(name) => {
                    let _ = writeln!(self.err, "[line {line}] in {}()", self.heap.string(name));
                }
                None => {
                    let _ = writeln!(self.err, "[line {line}] in script");
                }
            }
        }
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
        Abort
    }

    // =========================================================================
    // Allocation gates
    // =========================================================================

    fn alloc(&mut self, payload: ObjPayload) -> Obj {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.alloc(payload)
    }

    fn intern_string(&mut self, text: &str) -> Obj {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.intern(text)
    }

    // =========================================================================
    // Diagnostics output
    // =========================================================================

    fn trace_instruction(&self) {
        let stack_dump: String = self
            .stack
            .iter()
            .map(|&value| format!("[ {} ]", self.heap.format_value(value)))
            .collect();
        let frame = self.frame();
        let function = self.heap.closure(frame.closure).function;
        let chunk = &self.heap.function(function).chunk;
        let (text, _) = debug::disassemble_instruction(&self.heap, chunk, frame.ip);
        tracing::trace!(target: "aria::vm", "          {stack_dump}");
        tracing::trace!(target: "aria::vm", "{text}");
    }

    /// Disassembles `function` and, transitively, every function in its
    /// constant pools.
    fn dump_code(&mut self, function: Obj) {
        let mut pending = vec![function];
        while let Some(function) = pending.pop() {
            let name = match self.heap.function(function).name {
                Some(name) => self.heap.string(name).to_string(),
                None => "<script>".to_string(),
            };
            let text =
                debug::disassemble_chunk(&self.heap, &self.heap.function(function).chunk, &name);
            let _ = write!(self.err, "{text}");
            for &constant in &self.heap.function(function).chunk.constants {
                if let Value::Obj(obj) = constant {
                    if matches!(self.heap.payload(obj), ObjPayload::Function(_)) {
                        pending.push(obj);
                    }
                }
            }
        }
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}
