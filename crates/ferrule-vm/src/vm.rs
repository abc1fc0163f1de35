//! Runtime instance
//!
//! A `Vm` owns its heap, globals, and collector state. Roots are:
//! - the globals table
//! - arguments and temporaries of every in-flight native call
//! - values pinned by the host
//! - host references, which scripts cannot reach

use std::rc::Rc;
use std::time::Instant;

use ferrule_sdk::{
    Descriptor, NativeFunction, NativePtr, ObjRef, ScriptError, ScriptResult, ScriptRuntime,
    UserdataView, Value,
};
use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use crate::collector::{self, GcStats, PendingFinalizer};
use crate::heap::{Heap, Object, Table, Userdata};
use crate::options::VmOptions;

/// Upper bound on finalization rounds at close; finalizers may create new
/// finalizable objects.
const MAX_CLOSE_ROUNDS: usize = 64;

/// Identifier of a host-pinned value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinId(u64);

/// Values kept alive by one in-flight native call
#[derive(Debug, Default)]
struct Frame {
    values: Vec<Value>,
}

/// A scripting runtime instance
pub struct Vm {
    heap: Heap,
    globals: Table,
    frames: Vec<Frame>,
    pinned: FxHashMap<PinId, Value>,
    next_pin: u64,
    host_refs: FxHashMap<String, Value>,
    options: VmOptions,
    stats: GcStats,
    collecting: bool,
    closed: bool,
}

impl Vm {
    /// Create a new runtime instance
    pub fn new(options: VmOptions) -> Self {
        let mut vm = Self {
            heap: Heap::new(options.limits.max_objects),
            globals: Table::default(),
            frames: Vec::new(),
            pinned: FxHashMap::default(),
            next_pin: 1,
            host_refs: FxHashMap::default(),
            options,
            stats: GcStats::default(),
            collecting: false,
            closed: false,
        };
        vm.install_builtins();
        vm
    }

    fn install_builtins(&mut self) {
        let collect = NativeFunction::new("collectgarbage", |rt, _args| {
            let freed = rt.collect_garbage();
            Ok(vec![Value::from(freed)])
        });
        self.set_global("collectgarbage", collect.into());
    }

    /// Runtime options
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Collector statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Number of live heap objects
    pub fn object_count(&self) -> usize {
        self.heap.len()
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ========================================================================
    // Host references
    // ========================================================================

    /// Keep a value reachable until it is unpinned
    pub fn pin(&mut self, value: Value) -> PinId {
        let id = PinId(self.next_pin);
        self.next_pin += 1;
        self.pinned.insert(id, value);
        id
    }

    /// Release a pinned value
    pub fn unpin(&mut self, id: PinId) -> Option<Value> {
        self.pinned.remove(&id)
    }

    // ========================================================================
    // Script operations
    // ========================================================================

    /// Index a value: raw lookup on tables, the `index` hook on userdata
    pub fn index(&mut self, object: &Value, key: &Value) -> ScriptResult<Value> {
        match object {
            Value::Table(_) => self.raw_get(object, key),
            Value::Userdata(r) => {
                let view = self
                    .userdata(object)
                    .ok_or(ScriptError::StaleReference("userdata"))?;
                let hook = view.descriptor.index().cloned().ok_or(ScriptError::TypeError {
                    op: "index",
                    type_name: "userdata",
                })?;
                trace!("[vm] index userdata {}:{} via hook", r.index(), r.generation());
                let results = self.call(&Value::Function(hook), &[object.clone(), key.clone()])?;
                Ok(results.into_iter().next().unwrap_or_default())
            }
            other => Err(ScriptError::TypeError {
                op: "index",
                type_name: other.type_name(),
            }),
        }
    }

    /// Method call sugar: `object:name(args...)`
    pub fn call_method(
        &mut self,
        object: &Value,
        name: &str,
        args: &[Value],
    ) -> ScriptResult<Vec<Value>> {
        let method = self.index(object, &Value::from(name))?;
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(object.clone());
        full.extend_from_slice(args);
        self.call(&method, &full)
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Run a full collection cycle. Returns the number of objects freed.
    ///
    /// Reentrant calls (from inside a finalize hook) do nothing.
    pub fn collect(&mut self) -> usize {
        if self.collecting || self.closed {
            return 0;
        }
        self.collecting = true;
        let start = Instant::now();

        self.heap.clear_marks();
        let roots = self.roots();
        collector::mark(&mut self.heap, roots);
        let cleared = collector::clear_weak_values(&mut self.heap);
        let pending = collector::separate_finalizable(&mut self.heap);
        let freed = collector::sweep(&mut self.heap);

        let finalizing = pending.len();
        for pending in pending {
            self.run_finalizer(pending);
        }

        let duration = start.elapsed();
        self.stats.collections += 1;
        self.stats.objects_freed += freed;
        self.stats.weak_entries_cleared += cleared;
        self.stats.last_pause_time = duration;
        self.stats.total_pause_time += duration;
        self.collecting = false;

        debug!(
            "[gc] cycle {}: freed {}, finalized {}, weak entries cleared {}, live {}",
            self.stats.collections,
            freed,
            finalizing,
            cleared,
            self.heap.len()
        );
        freed
    }

    fn roots(&self) -> Vec<Value> {
        let mut roots = Vec::new();
        for (key, value) in &self.globals.entries {
            if let Some(r) = key.obj_ref() {
                roots.push(Value::Table(r));
            }
            roots.push(value.clone());
        }
        for frame in &self.frames {
            roots.extend(frame.values.iter().cloned());
        }
        roots.extend(self.pinned.values().cloned());
        roots.extend(self.host_refs.values().cloned());
        roots
    }

    /// Run one finalize hook. Returns `false` if it failed.
    ///
    /// Hooks run outside the call-depth limit so a collection started deep in
    /// the call stack can still finalize. A hook that fails while the native
    /// pointer is still in place is rearmed and runs again on a later cycle
    /// or at close.
    fn run_finalizer(&mut self, pending: PendingFinalizer) -> bool {
        let PendingFinalizer { object, hook } = pending;
        trace!(
            "[gc] finalizing userdata {}:{} via '{}'",
            object.index(),
            object.generation(),
            hook.name()
        );
        self.stats.finalized += 1;
        let target = Value::Userdata(object);
        self.frames.push(Frame {
            values: vec![target.clone()],
        });
        let result = hook.invoke(self, std::slice::from_ref(&target));
        self.frames.pop();

        let Err(e) = result else {
            return true;
        };
        self.stats.finalizer_errors += 1;
        let rearmed = match self.userdata_mut(&target) {
            Some(ud) if ud.ptr.is_some() => {
                ud.finalized = false;
                true
            }
            _ => false,
        };
        warn!(
            "[gc] finalizer for userdata {}:{} failed{}: {}",
            object.index(),
            object.generation(),
            if rearmed { " (will retry)" } else { "" },
            e
        );
        false
    }

    /// Close the runtime.
    ///
    /// Runs the finalize hook of every userdata that has not been finalized
    /// yet (when `finalize_on_close` is set), then drops the heap. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.options.finalize_on_close {
            for _ in 0..MAX_CLOSE_ROUNDS {
                let pending = collector::take_all_finalizable(&mut self.heap);
                if pending.is_empty() {
                    break;
                }
                let mut progressed = false;
                for pending in pending {
                    progressed |= self.run_finalizer(pending);
                }
                // Only failing hooks are left
                if !progressed {
                    break;
                }
            }
        }
        self.closed = true;
        self.frames.clear();
        self.pinned.clear();
        self.host_refs.clear();
        self.globals.entries.clear();
        self.heap.clear();
        debug!(
            "[vm] closed after {} collections, {} finalizers run",
            self.stats.collections, self.stats.finalized
        );
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn root_temporary(&mut self, value: &Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.values.push(value.clone());
        }
    }

    fn alloc(&mut self, object: Object) -> ScriptResult<ObjRef> {
        if self.closed {
            return Err(ScriptError::Closed);
        }
        self.heap.alloc(object)
    }

    fn table(&self, value: &Value) -> ScriptResult<&Table> {
        match value {
            Value::Table(r) => match self.heap.get(*r) {
                Some(Object::Table(t)) => Ok(t),
                Some(other) => Err(ScriptError::TypeError {
                    op: "index",
                    type_name: other.kind(),
                }),
                None => Err(ScriptError::StaleReference("table")),
            },
            other => Err(ScriptError::TypeError {
                op: "index",
                type_name: other.type_name(),
            }),
        }
    }

    fn table_mut(&mut self, value: &Value) -> ScriptResult<&mut Table> {
        match value {
            Value::Table(r) => match self.heap.get_mut(*r) {
                Some(Object::Table(t)) => Ok(t),
                Some(other) => Err(ScriptError::TypeError {
                    op: "index",
                    type_name: other.kind(),
                }),
                None => Err(ScriptError::StaleReference("table")),
            },
            other => Err(ScriptError::TypeError {
                op: "index",
                type_name: other.type_name(),
            }),
        }
    }

    fn userdata_mut(&mut self, value: &Value) -> Option<&mut Userdata> {
        match value {
            Value::Userdata(r) => match self.heap.get_mut(*r) {
                Some(Object::Userdata(ud)) => Some(ud),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmOptions::default())
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        self.close();
    }
}

impl ScriptRuntime for Vm {
    fn new_userdata(&mut self, ptr: NativePtr, descriptor: Rc<Descriptor>) -> ScriptResult<Value> {
        let r = self.alloc(Object::Userdata(Userdata {
            ptr: Some(ptr),
            descriptor,
            finalized: false,
        }))?;
        let value = Value::Userdata(r);
        self.root_temporary(&value);
        Ok(value)
    }

    fn userdata(&self, value: &Value) -> Option<UserdataView> {
        match value {
            Value::Userdata(r) => match self.heap.get(*r) {
                Some(Object::Userdata(ud)) => Some(UserdataView {
                    ptr: ud.ptr,
                    descriptor: ud.descriptor.clone(),
                }),
                _ => None,
            },
            _ => None,
        }
    }

    fn take_userdata_ptr(&mut self, value: &Value) -> Option<NativePtr> {
        self.userdata_mut(value).and_then(|ud| ud.ptr.take())
    }

    fn new_table(&mut self) -> ScriptResult<Value> {
        let r = self.alloc(Object::Table(Table::default()))?;
        let value = Value::Table(r);
        self.root_temporary(&value);
        Ok(value)
    }

    fn set_weak_values(&mut self, table: &Value, weak: bool) -> ScriptResult<()> {
        self.table_mut(table)?.weak_values = weak;
        Ok(())
    }

    fn raw_get(&self, table: &Value, key: &Value) -> ScriptResult<Value> {
        Ok(self.table(table)?.get(key))
    }

    fn raw_set(&mut self, table: &Value, key: Value, value: Value) -> ScriptResult<()> {
        self.table_mut(table)?.set(key, value)
    }

    fn get_global(&self, name: &str) -> Value {
        self.globals.get(&Value::from(name))
    }

    fn set_global(&mut self, name: &str, value: Value) {
        // String keys are always valid
        let _ = self.globals.set(Value::from(name), value);
    }

    fn host_ref(&self, key: &str) -> Value {
        self.host_refs.get(key).cloned().unwrap_or_default()
    }

    fn set_host_ref(&mut self, key: &str, value: Value) {
        if value.is_nil() {
            self.host_refs.remove(key);
        } else {
            self.host_refs.insert(key.to_string(), value);
        }
    }

    fn call(&mut self, func: &Value, args: &[Value]) -> ScriptResult<Vec<Value>> {
        if self.closed {
            return Err(ScriptError::Closed);
        }
        let Value::Function(function) = func else {
            return Err(ScriptError::TypeError {
                op: "call",
                type_name: func.type_name(),
            });
        };
        let max_depth = self.options.limits.max_call_depth;
        if self.frames.len() >= max_depth {
            return Err(ScriptError::StackOverflow(max_depth));
        }

        let function = function.clone();
        self.frames.push(Frame {
            values: args.to_vec(),
        });
        let result = function.invoke(self, args);
        self.frames.pop();

        // Results stay reachable from the caller's frame
        if let (Ok(values), Some(parent)) = (&result, self.frames.last_mut()) {
            parent
                .values
                .extend(values.iter().filter(|v| v.as_obj_ref().is_some()).cloned());
        }
        result
    }

    fn tostring(&mut self, value: &Value) -> ScriptResult<String> {
        if let Some(hook) = self
            .userdata(value)
            .and_then(|view| view.descriptor.tostring().cloned())
        {
            let results = self.call(&Value::Function(hook), &[value.clone()])?;
            return match results.into_iter().next() {
                Some(Value::Str(s)) => Ok(s.to_string()),
                _ => Err(ScriptError::Raised(
                    "'tostring' hook must return a string".to_string(),
                )),
            };
        }
        Ok(match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{:.1}", n),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Table(r) => format!("table: {}:{}", r.index(), r.generation()),
            Value::Userdata(r) => format!("userdata: {}:{}", r.index(), r.generation()),
            Value::Function(f) => format!("function: {} at {:#x}", f.name(), f.addr()),
        })
    }

    fn collect_garbage(&mut self) -> usize {
        self.collect()
    }
}
