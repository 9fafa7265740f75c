//! The garbage-collected object heap.
//!
//! A slot arena owns every heap object; [`Obj`] handles are slot indices,
//! and the arena's slot vector doubles as the allocation list the sweep
//! walks. Collection is tri-color mark-and-sweep, stop-the-world relative
//! to the interpreter: roots are grayed, the gray worklist is drained
//! blackening each object's outgoing references, the intern pool drops
//! unmarked strings (it holds its keys weakly), and the sweep frees every
//! unmarked slot while clearing the surviving marks.
//!
//! A collection can fire while the compiler is the only client (REPL lines
//! compile against a heap that already holds live globals), so the
//! persistent root set lives here beside the arena: the globals table, the
//! cached `"init"` string, and the stack of in-progress compiler functions.
//! The VM layers its own transient roots (value stack, frames, open
//! upvalues) on top before finishing a cycle.
//!
//! The heap never collects on its own. [`Heap::alloc`] and [`Heap::intern`]
//! only allocate; clients gate them with [`Heap::should_collect`] plus
//! either [`Heap::collect`] (compiler) or their own root-marking sequence
//! (VM), which keeps every collection point explicit.

use crate::object::{AriaString, Obj, ObjPayload};
use crate::table::{Table, fnv1a};
use crate::value::Value;

/// First collection fires once a megabyte of payload is live.
const FIRST_GC_THRESHOLD: usize = 1024 * 1024;
const HEAP_GROW_FACTOR: usize = 2;

const POOL_MIN_CAPACITY: usize = 8;

/// Intern pool slot. Tombstones keep probe sequences intact after the weak
/// purge removes a dead string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolSlot {
    Empty,
    Tombstone,
    Used(Obj),
}

#[derive(Debug, Default)]
struct InternPool {
    entries: Vec<PoolSlot>,
    /// Used entries plus tombstones.
    count: usize,
}

#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<ObjPayload>>,
    /// Mark bits, parallel to `slots`.
    marks: Vec<bool>,
    free: Vec<u32>,
    /// Gray worklist. Ordinary Rust memory, never subject to collection.
    gray: Vec<Obj>,
    interned: InternPool,
    /// Global variable table; a persistent GC root.
    pub globals: Table,
    /// Cached interned `"init"`, used for constructor lookup.
    init_string: Obj,
    /// Function objects of every in-progress compilation unit, innermost
    /// last. Maintained by the compiler so mid-compile collections see the
    /// chunks being built.
    compiler_roots: Vec<Obj>,
    bytes_allocated: usize,
    next_gc: usize,
    stress: bool,
}

impl Heap {
    pub fn new() -> Heap {
        let mut heap = Heap {
            slots: Vec::new(),
            marks: Vec::new(),
            free: Vec::new(),
            gray: Vec::new(),
            interned: InternPool::default(),
            globals: Table::new(),
            init_string: Obj(0),
            compiler_roots: Vec::new(),
            bytes_allocated: 0,
            next_gc: FIRST_GC_THRESHOLD,
            stress: false,
        };
        // The very first allocation, so the placeholder handle above is
        // immediately made real.
        heap.init_string = heap.intern("init");
        heap
    }

    /// When set, every gated allocation point collects. Slow, but shakes
    /// loose any object that was reachable only from a forgotten root.
    pub fn set_stress(&mut self, stress: bool) {
        self.stress = stress;
    }

    pub fn init_string(&self) -> Obj {
        self.init_string
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    /// Live objects currently in the arena.
    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    pub fn should_collect(&self) -> bool {
        self.stress || self.bytes_allocated > self.next_gc
    }

    /// Places `payload` in a fresh or recycled slot. Never collects; the
    /// caller decides when a collection point is safe.
    pub fn alloc(&mut self, payload: ObjPayload) -> Obj {
        self.bytes_allocated += payload.byte_count();
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(payload);
                self.marks[index as usize] = false;
                Obj(index)
            }
            None => {
                self.slots.push(Some(payload));
                self.marks.push(false);
                Obj(self.slots.len() as u32 - 1)
            }
        }
    }

    /// Returns the canonical handle for `text`, allocating and pooling a new
    /// string object only if these bytes have never been interned (or their
    /// previous object died).
    pub fn intern(&mut self, text: &str) -> Obj {
        let hash = fnv1a(text.as_bytes());
        if let Some(existing) = self.find_interned(hash, text) {
            return existing;
        }
        let obj = self.alloc(ObjPayload::String(AriaString {
            text: text.into(),
            hash,
        }));
        self.pool_insert(hash, obj);
        obj
    }

    /// Compile-time collection gate: collects using the heap-resident root
    /// set when the pacing counter (or stress mode) says to.
    pub fn collect_if_needed(&mut self) {
        if self.should_collect() {
            self.collect();
        }
    }

    // =========================================================================
    // Object access
    // =========================================================================

    pub fn payload(&self, obj: Obj) -> &ObjPayload {
        match &self.slots[obj.index()] {
            Some(payload) => payload,
            None => unreachable!("stale object handle {obj:?}"),
        }
    }

    pub fn payload_mut(&mut self, obj: Obj) -> &mut ObjPayload {
        match &mut self.slots[obj.index()] {
            Some(payload) => payload,
            None => unreachable!("stale object handle {obj:?}"),
        }
    }

    pub fn string(&self, obj: Obj) -> &str {
        match self.payload(obj) {
            ObjPayload::String(s) => &s.text,
            other => unreachable!("expected string, found {other:?}"),
        }
    }

    pub fn function(&self, obj: Obj) -> &crate::object::Function {
        match self.payload(obj) {
            ObjPayload::Function(f) => f,
            other => unreachable!("expected function, found {other:?}"),
        }
    }

    pub fn function_mut(&mut self, obj: Obj) -> &mut crate::object::Function {
        match self.payload_mut(obj) {
            ObjPayload::Function(f) => f,
            other => unreachable!("expected function, found {other:?}"),
        }
    }

    pub fn closure(&self, obj: Obj) -> &crate::object::Closure {
        match self.payload(obj) {
            ObjPayload::Closure(c) => c,
            other => unreachable!("expected closure, found {other:?}"),
        }
    }

    pub fn closure_mut(&mut self, obj: Obj) -> &mut crate::object::Closure {
        match self.payload_mut(obj) {
            ObjPayload::Closure(c) => c,
            other => unreachable!("expected closure, found {other:?}"),
        }
    }

    pub fn upvalue(&self, obj: Obj) -> &crate::object::Upvalue {
        match self.payload(obj) {
            ObjPayload::Upvalue(u) => u,
            other => unreachable!("expected upvalue, found {other:?}"),
        }
    }

    pub fn upvalue_mut(&mut self, obj: Obj) -> &mut crate::object::Upvalue {
        match self.payload_mut(obj) {
            ObjPayload::Upvalue(u) => u,
            other => unreachable!("expected upvalue, found {other:?}"),
        }
    }

    pub fn class(&self, obj: Obj) -> &crate::object::Class {
        match self.payload(obj) {
            ObjPayload::Class(c) => c,
            other => unreachable!("expected class, found {other:?}"),
        }
    }

    pub fn class_mut(&mut self, obj: Obj) -> &mut crate::object::Class {
        match self.payload_mut(obj) {
            ObjPayload::Class(c) => c,
            other => unreachable!("expected class, found {other:?}"),
        }
    }

    pub fn instance_mut(&mut self, obj: Obj) -> &mut crate::object::Instance {
        match self.payload_mut(obj) {
            ObjPayload::Instance(i) => i,
            other => unreachable!("expected instance, found {other:?}"),
        }
    }

    // =========================================================================
    // Display
    // =========================================================================

    pub fn format_value(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Obj(obj) => self.format_object(obj),
        }
    }

    fn format_object(&self, obj: Obj) -> String {
        match self.payload(obj) {
            ObjPayload::String(s) => s.text.to_string(),
            ObjPayload::Function(f) => self.format_function(f),
            ObjPayload::Native(_) => "<native fn>".to_string(),
            ObjPayload::Closure(c) => self.format_function(self.function(c.function)),
            ObjPayload::Upvalue(_) => "upvalue".to_string(),
            ObjPayload::Class(c) => self.string(c.name).to_string(),
            ObjPayload::Instance(i) => {
                format!("{} instance", self.string(self.class(i.class).name))
            }
            ObjPayload::BoundMethod(b) => {
                self.format_function(self.function(self.closure(b.method).function))
            }
        }
    }

    fn format_function(&self, function: &crate::object::Function) -> String {
        match function.name {
            Some(name) => format!("<fn {}>", self.string(name)),
            None => "<script>".to_string(),
        }
    }

    // =========================================================================
    // Compiler roots
    // =========================================================================

    pub fn push_compiler_root(&mut self, function: Obj) {
        self.compiler_roots.push(function);
    }

    pub fn pop_compiler_root(&mut self) {
        self.compiler_roots.pop();
    }

    // =========================================================================
    // Collection
    // =========================================================================

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(obj) = value {
            self.mark_object(obj);
        }
    }

    pub fn mark_object(&mut self, obj: Obj) {
        gray_obj(&mut self.marks, &mut self.gray, obj);
    }

    /// Grays the roots the heap itself owns: globals, the cached `"init"`
    /// string, and every in-progress compiler function.
    pub fn mark_persistent_roots(&mut self) {
        let globals = std::mem::take(&mut self.globals);
        for (key, value) in globals.iter() {
            self.mark_object(key);
            self.mark_value(value);
        }
        self.globals = globals;
        self.mark_object(self.init_string);
        for i in 0..self.compiler_roots.len() {
            let function = self.compiler_roots[i];
            self.mark_object(function);
        }
    }

    /// Runs mark-to-fixpoint, the weak intern purge, and the sweep, then
    /// repaces the next collection. Callers have already grayed every root.
    pub fn finish_collection(&mut self) {
        let before = self.bytes_allocated;
        self.trace_references();
        self.remove_white_strings();
        self.sweep();
        self.next_gc = self.bytes_allocated * HEAP_GROW_FACTOR;
        tracing::debug!(
            target: "aria::gc",
            before,
            after = self.bytes_allocated,
            next = self.next_gc,
            "collection finished"
        );
    }

    /// Full collection using only the heap-resident roots. Correct whenever
    /// no VM stack is live, which is exactly the compile-time case.
    pub fn collect(&mut self) {
        self.mark_persistent_roots();
        self.finish_collection();
    }

    fn trace_references(&mut self) {
        while let Some(obj) = self.gray.pop() {
            self.blacken(obj);
        }
    }

    /// Grays everything `obj` refers to. Split borrows: the payload is read
    /// from `slots` while children are pushed through `marks`/`gray`.
    fn blacken(&mut self, obj: Obj) {
        let Heap {
            slots, marks, gray, ..
        } = self;
        let Some(payload) = &slots[obj.index()] else {
            return;
        };
        match payload {
            ObjPayload::String(_) | ObjPayload::Native(_) => {}
            ObjPayload::Function(f) => {
                if let Some(name) = f.name {
                    gray_obj(marks, gray, name);
                }
                for &constant in &f.chunk.constants {
                    gray_value(marks, gray, constant);
                }
            }
            ObjPayload::Closure(c) => {
                gray_obj(marks, gray, c.function);
                for &upvalue in &c.upvalues {
                    gray_obj(marks, gray, upvalue);
                }
            }
            ObjPayload::Upvalue(u) => {
                if let crate::object::UpvalueState::Closed(value) = u.state {
                    gray_value(marks, gray, value);
                }
            }
            ObjPayload::Class(c) => {
                gray_obj(marks, gray, c.name);
                for (key, value) in c.methods.iter() {
                    gray_obj(marks, gray, key);
                    gray_value(marks, gray, value);
                }
            }
            ObjPayload::Instance(i) => {
                gray_obj(marks, gray, i.class);
                for (key, value) in i.fields.iter() {
                    gray_obj(marks, gray, key);
                    gray_value(marks, gray, value);
                }
            }
            ObjPayload::BoundMethod(b) => {
                gray_value(marks, gray, b.receiver);
                gray_obj(marks, gray, b.method);
            }
        }
    }

    /// The intern pool references its strings weakly: any entry left
    /// unmarked after the mark phase is dead and must go before the sweep
    /// frees its slot.
    fn remove_white_strings(&mut self) {
        for entry in &mut self.interned.entries {
            if let PoolSlot::Used(obj) = *entry {
                if !self.marks[obj.index()] {
                    *entry = PoolSlot::Tombstone;
                }
            }
        }
    }

    /// Frees every unmarked slot, clears surviving marks, and recomputes the
    /// live byte total exactly.
    fn sweep(&mut self) {
        let mut live_bytes = 0;
        for index in 0..self.slots.len() {
            if self.marks[index] {
                self.marks[index] = false;
                if let Some(payload) = &self.slots[index] {
                    live_bytes += payload.byte_count();
                }
            } else if self.slots[index].is_some() {
                self.slots[index] = None;
                self.free.push(index as u32);
            }
        }
        self.bytes_allocated = live_bytes;
    }

    // =========================================================================
    // Intern pool internals
    // =========================================================================

    fn find_interned(&self, hash: u32, text: &str) -> Option<Obj> {
        if self.interned.entries.is_empty() {
            return None;
        }
        let mask = self.interned.entries.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            match self.interned.entries[index] {
                PoolSlot::Empty => return None,
                PoolSlot::Tombstone => {}
                PoolSlot::Used(obj) => {
                    if let ObjPayload::String(s) = self.payload(obj) {
                        if s.hash == hash && &*s.text == text {
                            return Some(obj);
                        }
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    fn pool_insert(&mut self, hash: u32, obj: Obj) {
        if (self.interned.count + 1) * 4 > self.interned.entries.len() * 3 {
            self.grow_pool();
        }
        let mask = self.interned.entries.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            match self.interned.entries[index] {
                PoolSlot::Used(_) => index = (index + 1) & mask,
                slot => {
                    if slot == PoolSlot::Empty {
                        self.interned.count += 1;
                    }
                    self.interned.entries[index] = PoolSlot::Used(obj);
                    return;
                }
            }
        }
    }

    fn grow_pool(&mut self) {
        let capacity = (self.interned.entries.len() * 2).max(POOL_MIN_CAPACITY);
        let old = std::mem::replace(&mut self.interned.entries, vec![PoolSlot::Empty; capacity]);
        self.interned.count = 0;
        for slot in old {
            if let PoolSlot::Used(obj) = slot {
                let hash = match self.payload(obj) {
                    ObjPayload::String(s) => s.hash,
                    other => unreachable!("interned non-string {other:?}"),
                };
                let mask = capacity - 1;
                let mut index = hash as usize & mask;
                while matches!(self.interned.entries[index], PoolSlot::Used(_)) {
                    index = (index + 1) & mask;
                }
                self.interned.entries[index] = PoolSlot::Used(obj);
                self.interned.count += 1;
            }
        }
    }
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new()
    }
}

fn gray_obj(marks: &mut [bool], gray: &mut Vec<Obj>, obj: Obj) {
    if !marks[obj.index()] {
        marks[obj.index()] = true;
        gray.push(obj);
    }
}

fn gray_value(marks: &mut [bool], gray: &mut Vec<Obj>, value: Value) {
    if let Value::Obj(obj) = value {
        gray_obj(marks, gray, obj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Class, Closure, Function, Instance, Upvalue, UpvalueState};
    use crate::chunk::Chunk;

    #[test]
    fn interning_is_canonical() {
        let mut heap = Heap::new();
        let a = heap.intern("foo");
        let b = heap.intern("foo");
        let c = heap.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.string(a), "foo");
    }

    #[test]
    fn init_string_is_cached() {
        let mut heap = Heap::new();
        assert_eq!(heap.intern("init"), heap.init_string());
    }

    #[test]
    fn collect_frees_unreachable_objects() {
        let mut heap = Heap::new();
        let baseline = heap.object_count();
        heap.intern("short-lived");
        assert_eq!(heap.object_count(), baseline + 1);
        heap.collect();
        // The garbage string is gone; "init" survives as a persistent root.
        assert_eq!(heap.object_count(), baseline);
    }

    #[test]
    fn globals_keep_values_alive() {
        let mut heap = Heap::new();
        let name = heap.intern("answer");
        heap.globals.set(name, Value::Number(42.0));
        let kept = heap.intern("kept");
        heap.globals.set(name, Value::Obj(kept));
        heap.collect();
        assert_eq!(heap.string(kept), "kept");
        assert_eq!(heap.globals.get(name), Some(Value::Obj(kept)));
    }

    #[test]
    fn dead_interned_string_can_be_reinterned() {
        let mut heap = Heap::new();
        heap.intern("ephemeral");
        assert_eq!(heap.object_count(), 2);
        heap.collect();
        // The unreferenced string died and its weak pool entry with it.
        assert_eq!(heap.object_count(), 1);
        let again = heap.intern("ephemeral");
        assert_eq!(heap.object_count(), 2);
        assert_eq!(heap.string(again), "ephemeral");
    }

    #[test]
    fn compiler_roots_keep_functions_and_constants_alive() {
        let mut heap = Heap::new();
        let function = heap.alloc(ObjPayload::Function(Function {
            arity: 0,
            upvalue_count: 0,
            name: None,
            chunk: Chunk::new(),
        }));
        heap.push_compiler_root(function);
        let constant = heap.intern("in-progress");
        heap.function_mut(function)
            .chunk
            .add_constant(Value::Obj(constant));
        heap.collect();
        assert_eq!(heap.string(constant), "in-progress");
        heap.pop_compiler_root();
        heap.collect();
        assert_eq!(heap.object_count(), 1); // only "init" remains
    }

    #[test]
    fn cycles_are_collected() {
        let mut heap = Heap::new();
        let name = heap.intern("Cycle");
        let class = heap.alloc(ObjPayload::Class(Class {
            name,
            methods: Table::new(),
        }));
        let instance = heap.alloc(ObjPayload::Instance(Instance {
            class,
            fields: Table::new(),
        }));
        // instance -> class and class.methods -> instance form a cycle.
        heap.class_mut(class).methods.set(name, Value::Obj(instance));
        heap.collect();
        assert_eq!(heap.object_count(), 1);
    }

    #[test]
    fn bytes_allocated_matches_live_set_after_collection() {
        let mut heap = Heap::new();
        let keep = heap.intern("keep-me-around");
        let name = heap.intern("g");
        heap.globals.set(name, Value::Obj(keep));
        for i in 0..100 {
            heap.intern(&format!("garbage-{i}"));
        }
        heap.collect();
        let live_total: usize = ["init", "keep-me-around", "g"]
            .iter()
            .map(|s| std::mem::size_of::<ObjPayload>() + s.len())
            .sum();
        assert_eq!(heap.bytes_allocated(), live_total);
        assert_eq!(heap.next_gc(), heap.bytes_allocated() * 2);
    }

    #[test]
    fn closed_upvalue_roots_its_value() {
        let mut heap = Heap::new();
        let text = heap.intern("captured");
        let upvalue = heap.alloc(ObjPayload::Upvalue(Upvalue {
            state: UpvalueState::Closed(Value::Obj(text)),
            next: None,
        }));
        let function = heap.alloc(ObjPayload::Function(Function {
            arity: 0,
            upvalue_count: 1,
            name: None,
            chunk: Chunk::new(),
        }));
        let closure = heap.alloc(ObjPayload::Closure(Closure {
            function,
            upvalues: vec![upvalue],
        }));
        let name = heap.intern("f");
        heap.globals.set(name, Value::Obj(closure));
        heap.collect();
        assert_eq!(heap.string(text), "captured");
    }

    #[test]
    fn freed_slots_are_recycled() {
        let mut heap = Heap::new();
        heap.intern("throwaway");
        let before = heap.object_count();
        heap.collect();
        assert_eq!(heap.object_count(), before - 1);
        let replacement = heap.intern("replacement");
        // The new string reuses the freed slot rather than growing the arena.
        assert_eq!(heap.object_count(), before);
        assert_eq!(heap.string(replacement), "replacement");
    }
}
