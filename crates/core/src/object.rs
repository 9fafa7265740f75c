//! Heap object payloads.
//!
//! Every heap-resident thing the language can touch is one of the payload
//! variants below, stored in a slot of the [`Heap`](crate::heap::Heap) arena
//! and addressed by a plain [`Obj`] handle. The heap owns every payload;
//! payloads refer to each other only through handles, which is what lets the
//! collector trace arbitrary (including cyclic) object graphs without
//! ownership headaches.

use crate::chunk::Chunk;
use crate::heap::Heap;
use crate::table::Table;
use crate::value::Value;

/// Handle to a heap object: an index into the heap's slot arena.
///
/// Handles are `Copy` and compare by index, so handle equality is object
/// identity. A handle is only meaningful against the heap that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obj(pub(crate) u32);

impl Obj {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned string: immutable bytes plus the cached FNV-1a hash the
/// intern pool probes with.
#[derive(Debug)]
pub struct AriaString {
    pub text: Box<str>,
    pub hash: u32,
}

/// A compiled function. Immutable once its compilation unit ends; the
/// compiler is the only writer and stops at `end` of that unit.
#[derive(Debug)]
pub struct Function {
    pub arity: u8,
    pub upvalue_count: usize,
    /// Interned name; `None` for the top-level script.
    pub name: Option<Obj>,
    pub chunk: Chunk,
}

/// Signature of a built-in function. Natives validate their own arguments;
/// an `Err` message becomes a runtime error in the calling VM.
pub type NativeFn = fn(&mut Heap, &[Value]) -> Result<Value, String>;

/// A built-in function exposed as a callable value.
#[derive(Debug)]
pub struct Native {
    pub function: NativeFn,
}

/// A function paired with its captured variables. All runtime calls go
/// through closures; a bare function is never directly callable.
#[derive(Debug)]
pub struct Closure {
    pub function: Obj,
    /// One upvalue handle per capture, filled exactly once at creation.
    pub upvalues: Vec<Obj>,
}

/// Where an upvalue's value currently lives.
#[derive(Debug, Clone, Copy)]
pub enum UpvalueState {
    /// Captures a live value-stack slot (absolute index).
    Open(usize),
    /// Owns the value, copied out when the capturing frame returned.
    Closed(Value),
}

/// A captured variable cell.
#[derive(Debug)]
pub struct Upvalue {
    pub state: UpvalueState,
    /// Link in the VM's open-upvalue list, which is sorted by descending
    /// stack slot. `None` once closed or at the list tail.
    pub next: Option<Obj>,
}

/// A class: name plus method table. The method set is closed once the class
/// declaration finishes; inheritance copies the parent's table down before
/// subclass methods are defined, so lookup is a single probe.
#[derive(Debug)]
pub struct Class {
    pub name: Obj,
    pub methods: Table,
}

/// An instance: its class plus a field table populated on first assignment.
#[derive(Debug)]
pub struct Instance {
    pub class: Obj,
    pub fields: Table,
}

/// A method closure paired with the receiver it was read off of.
#[derive(Debug, Clone, Copy)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Obj,
}

/// Payload stored in one heap slot.
#[derive(Debug)]
pub enum ObjPayload {
    String(AriaString),
    Function(Function),
    Native(Native),
    Closure(Closure),
    Upvalue(Upvalue),
    Class(Class),
    Instance(Instance),
    BoundMethod(BoundMethod),
}

impl ObjPayload {
    /// Estimated heap footprint in bytes, fed into the collector's pacing
    /// counter. An estimate is enough: the sweep recomputes the live total
    /// from the same figures, so pacing stays self-consistent.
    pub fn byte_count(&self) -> usize {
        let base = std::mem::size_of::<ObjPayload>();
        base + match self {
            ObjPayload::String(s) => s.text.len(),
            ObjPayload::Function(f) => f.chunk.byte_count(),
            ObjPayload::Native(_) => 0,
            ObjPayload::Closure(c) => c.upvalues.len() * std::mem::size_of::<Obj>(),
            ObjPayload::Upvalue(_) => 0,
            ObjPayload::Class(c) => c.methods.byte_count(),
            ObjPayload::Instance(i) => i.fields.byte_count(),
            ObjPayload::BoundMethod(_) => 0,
        }
    }
}
