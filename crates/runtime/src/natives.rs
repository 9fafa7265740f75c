//! Built-in native functions.
//!
//! Natives receive the heap (for interning result strings) and their
//! argument slice, and validate their own arguments. An `Err` message is
//! reported through the VM's runtime-error path, aborting the current
//! interpret call.

use aria_core::{Heap, ObjPayload, Value};

const CLOCKS_PER_SEC: libc::c_long = 1_000_000;

/// `clock()`: process CPU seconds as a number.
pub fn clock(_heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    if !args.is_empty() {
        return Err(format!("clock() takes no arguments but got {}.", args.len()));
    }
    let ticks = unsafe { self::sys::clock() };
    Ok(Value::Number(ticks as f64 / CLOCKS_PER_SEC as f64))
}

mod sys {
    unsafe extern "C" {
        pub fn clock() -> libc::c_long;
    }
}

/// `readFile(path)`: file contents as an interned string.
pub fn read_file(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    let [path] = args else {
        return Err(format!(
            "readFile() takes 1 argument but got {}.",
            args.len()
        ));
    };
    let path = match *path {
        Value::Obj(obj) => match heap.payload(obj) {
            ObjPayload::String(s) => s.text.to_string(),
            _ => return Err("readFile() expects a string path.".to_string()),
        },
        _ => return Err("readFile() expects a string path.".to_string()),
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(Value::Obj(heap.intern(&contents))),
        Err(error) => Err(format!("readFile() failed to read '{path}': {error}.")),
    }
}
