//! Aria virtual machine
//!
//! The execution half of the interpreter: a [`Vm`] owns a garbage-collected
//! heap, compiles source through `aria-compiler`, and runs the resulting
//! bytecode in a stack-machine dispatch loop with call frames, closures,
//! upvalues, classes, and bound methods.
//!
//! A `Vm` is self-contained and single-threaded; two VMs in one process are
//! fully independent. Globals persist across [`Vm::interpret`] calls, which
//! is what makes a REPL session coherent.
//!
//! ```no_run
//! use aria_runtime::{InterpretResult, Vm};
//!
//! let mut vm = Vm::new();
//! assert_eq!(vm.interpret("print 1 + 2;"), InterpretResult::Ok);
//! ```

pub mod config;
pub mod natives;
pub mod vm;

mod gc;

pub use config::VmConfig;
pub use vm::{FRAMES_MAX, InterpretResult, STACK_MAX, Vm};
