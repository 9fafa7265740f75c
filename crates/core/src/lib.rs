//! Aria core runtime model
//!
//! Shared foundation for the Aria compiler and virtual machine:
//!
//! - [`Value`]: the tagged runtime value (nil, boolean, number, object handle)
//! - [`Heap`]: the garbage-collected object arena, including the weak
//!   string-intern pool and the global variable table
//! - [`Table`]: the open-addressed map keyed by interned strings, used for
//!   globals, instance fields, and class methods
//! - [`Chunk`] / [`OpCode`]: compiled bytecode with its constant pool and
//!   per-byte source-line table
//! - [`debug`]: a textual disassembler for chunks
//!
//! The compiler crate builds function objects into a `Heap`; the runtime
//! crate executes them against the same heap. Neither crate allocates heap
//! objects any other way.

pub mod chunk;
pub mod debug;
pub mod heap;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use heap::Heap;
pub use object::{
    AriaString, BoundMethod, Class, Closure, Function, Instance, Native, NativeFn, Obj,
    ObjPayload, Upvalue, UpvalueState,
};
pub use table::Table;
pub use value::Value;
