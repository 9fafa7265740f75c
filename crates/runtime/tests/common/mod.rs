//! Shared harness for the runtime integration tests: a cloneable in-memory
//! sink for the VM's output streams plus one-shot run helpers.

// Each integration test binary gets its own copy; not all of them use
// every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::io::Write;
use std::rc::Rc;

use aria_runtime::{InterpretResult, Vm, VmConfig};

#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Run {
    pub result: InterpretResult,
    pub out: String,
    pub err: String,
}

pub fn capture_vm(config: VmConfig) -> (Vm, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::default();
    let err = SharedBuffer::default();
    let vm = Vm::with_config(config)
        .with_output(Box::new(out.clone()))
        .with_error_output(Box::new(err.clone()));
    (vm, out, err)
}

pub fn run_with(config: VmConfig, source: &str) -> Run {
    let (mut vm, out, err) = capture_vm(config);
    let result = vm.interpret(source);
    Run {
        result,
        out: out.contents(),
        err: err.contents(),
    }
}

pub fn run(source: &str) -> Run {
    run_with(VmConfig::new(), source)
}

/// Runs `source`, asserting success, and returns captured stdout.
pub fn run_ok(source: &str) -> String {
    let run = run(source);
    assert_eq!(
        run.result,
        InterpretResult::Ok,
        "program failed; stderr:\n{}",
        run.err
    );
    run.out
}
