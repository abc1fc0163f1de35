//! ScriptRuntime trait: the embedding API a host runtime supplies
//!
//! Defines the primitives the bridge consumes. A runtime implements this
//! trait once; bridge code and bound classes program against it without
//! depending on interpreter internals.

use std::rc::Rc;

use crate::error::ScriptResult;
use crate::function::Descriptor;
use crate::value::{NativePtr, Value};

/// Contents of an opaque userdata value.
#[derive(Debug, Clone)]
pub struct UserdataView {
    /// Stored native pointer; `None` once it has been taken
    pub ptr: Option<NativePtr>,
    /// Descriptor attached at creation
    pub descriptor: Rc<Descriptor>,
}

/// Abstract scripting runtime.
///
/// One instance is confined to one thread; only one native call is in flight
/// at a time. Values created during a native call stay reachable until that
/// call returns.
pub trait ScriptRuntime {
    // ========================================================================
    // Opaque Values
    // ========================================================================

    /// Allocate an opaque userdata value holding one native pointer.
    fn new_userdata(&mut self, ptr: NativePtr, descriptor: Rc<Descriptor>) -> ScriptResult<Value>;

    /// Inspect a userdata value. Returns `None` if `value` is not a live userdata.
    fn userdata(&self, value: &Value) -> Option<UserdataView>;

    /// Take the native pointer out of a userdata, leaving it empty.
    ///
    /// Returns `None` if the value is not a userdata or was already emptied.
    fn take_userdata_ptr(&mut self, value: &Value) -> Option<NativePtr>;

    // ========================================================================
    // Tables
    // ========================================================================

    /// Allocate a new empty table
    fn new_table(&mut self) -> ScriptResult<Value>;

    /// Switch weak-value mode of a table.
    ///
    /// Entries of a weak-valued table do not keep their values reachable; the
    /// collector removes entries whose value it reclaims.
    fn set_weak_values(&mut self, table: &Value, weak: bool) -> ScriptResult<()>;

    /// Read a table entry without invoking hooks. Missing keys read as nil.
    fn raw_get(&self, table: &Value, key: &Value) -> ScriptResult<Value>;

    /// Write a table entry without invoking hooks. Writing nil removes the key.
    fn raw_set(&mut self, table: &Value, key: Value, value: Value) -> ScriptResult<()>;

    // ========================================================================
    // Globals
    // ========================================================================

    /// Read a global variable (nil if unset)
    fn get_global(&self, name: &str) -> Value;

    /// Write a global variable
    fn set_global(&mut self, name: &str, value: Value);

    // ========================================================================
    // Host References
    // ========================================================================

    /// Read a host reference (nil if unset)
    fn host_ref(&self, key: &str) -> Value;

    /// Keep `value` reachable under `key` in a table scripts cannot see.
    /// Writing nil removes the entry.
    fn set_host_ref(&mut self, key: &str, value: Value);

    // ========================================================================
    // Execution
    // ========================================================================

    /// Call a function value (synchronous)
    fn call(&mut self, func: &Value, args: &[Value]) -> ScriptResult<Vec<Value>>;

    /// Convert any value to a string, honoring userdata string hooks
    fn tostring(&mut self, value: &Value) -> ScriptResult<String>;

    /// Run a full collection cycle. Returns the number of objects reclaimed.
    fn collect_garbage(&mut self) -> usize;

    // ========================================================================
    // Provided
    // ========================================================================

    /// Read a string-keyed table entry
    fn get_field(&self, table: &Value, name: &str) -> ScriptResult<Value> {
        self.raw_get(table, &Value::from(name))
    }

    /// Write a string-keyed table entry
    fn set_field(&mut self, table: &Value, name: &str, value: Value) -> ScriptResult<()> {
        self.raw_set(table, Value::from(name), value)
    }
}
