//! VM-side garbage collection driver.
//!
//! The heap owns the mark/trace/sweep machinery and its persistent roots
//! (globals, the cached `"init"` string, compiler roots). What only the VM
//! can contribute are its transient roots: every live value-stack slot,
//! every call frame's closure, and every open upvalue. This module grays
//! those and then hands the cycle back to the heap.

use crate::vm::Vm;

impl Vm {
    /// Runs a full collection with the complete root set. Called from the
    /// VM's allocation gates; everything allocated but not yet reachable
    /// from a root must already be pinned (stack-pushed) by the caller.
    pub(crate) fn collect_garbage(&mut self) {
        let Vm {
            heap,
            stack,
            frames,
            open_upvalues,
            ..
        } = self;

        for &value in stack.iter() {
            heap.mark_value(value);
        }
        for frame in frames.iter() {
            heap.mark_object(frame.closure);
        }
        let mut upvalue = *open_upvalues;
        while let Some(obj) = upvalue {
            heap.mark_object(obj);
            upvalue = heap.upvalue(obj).next;
        }

        heap.mark_persistent_roots();
        heap.finish_collection();
    }
}
