//! Weak handle registry
//!
//! Maps integer handles to wrapper values through a weak-valued table owned
//! by the runtime, so the registry never keeps a wrapper alive. Native code
//! uses a handle to get back the exact wrapper it handed out while the script
//! still references it.

use std::cell::Cell;
use std::fmt;

use ferrule_sdk::{ScriptRuntime, Value};
use log::{trace, warn};

use crate::error::BridgeResult;

/// Key of a wrapped object in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(i64);

impl Handle {
    /// Sentinel for "no handle"; never assigned
    pub const NONE: Handle = Handle(-1);

    /// Create a handle from its raw value
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Check for the sentinel
    pub const fn is_none(self) -> bool {
        self.0 < 0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::NONE
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Value::Int(handle.0)
    }
}

/// Handle table scoped to one runtime instance
#[derive(Debug)]
pub struct Registry {
    table: Value,
    key: String,
    next: Cell<i64>,
}

impl Registry {
    /// Create the weak table and publish it as the global `key`.
    ///
    /// The table is also held as a host reference under `key`, so it lives as
    /// long as the runtime even if a script overwrites the global.
    /// Initializing twice on the same runtime replaces the previous table;
    /// wrappers issued through it keep working but can no longer be looked up.
    pub fn init(rt: &mut dyn ScriptRuntime, key: &str) -> BridgeResult<Self> {
        if !rt.host_ref(key).is_nil() || !rt.get_global(key).is_nil() {
            warn!("[registry] '{}' is already initialized; replacing it", key);
        }
        let table = rt.new_table()?;
        rt.set_weak_values(&table, true)?;
        rt.set_host_ref(key, table.clone());
        rt.set_global(key, table.clone());
        Ok(Self {
            table,
            key: key.to_string(),
            next: Cell::new(0),
        })
    }

    /// Global name of the table
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Insert a wrapper and return its fresh handle
    pub fn allocate(&self, rt: &mut dyn ScriptRuntime, value: Value) -> BridgeResult<Handle> {
        let handle = Handle(self.next.get());
        rt.raw_set(&self.table, handle.into(), value)?;
        self.next.set(handle.0 + 1);
        trace!("[registry] allocated handle {}", handle);
        Ok(handle)
    }

    /// Remove an entry. Releasing an absent handle does nothing.
    pub fn release(&self, rt: &mut dyn ScriptRuntime, handle: Handle) -> BridgeResult<()> {
        if handle.is_none() {
            return Ok(());
        }
        rt.raw_set(&self.table, handle.into(), Value::Nil)?;
        trace!("[registry] released handle {}", handle);
        Ok(())
    }

    /// Wrapper registered under `handle`, if it is still alive
    pub fn lookup(&self, rt: &dyn ScriptRuntime, handle: Handle) -> BridgeResult<Option<Value>> {
        if handle.is_none() {
            return Ok(None);
        }
        let value = rt.raw_get(&self.table, &handle.into())?;
        Ok((!value.is_nil()).then_some(value))
    }

    /// Handle the next allocation will receive
    pub fn next_handle(&self) -> Handle {
        Handle(self.next.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_vm::Vm;

    #[test]
    fn test_handles_start_at_zero() {
        let mut vm = Vm::default();
        let registry = Registry::init(&mut vm, "objs").unwrap();
        let a = vm.new_table().unwrap();
        let b = vm.new_table().unwrap();
        vm.set_global("a", a.clone());
        vm.set_global("b", b.clone());

        assert_eq!(registry.allocate(&mut vm, a.clone()).unwrap(), Handle::new(0));
        assert_eq!(registry.allocate(&mut vm, b).unwrap(), Handle::new(1));
        assert_eq!(registry.lookup(&vm, Handle::new(0)).unwrap(), Some(a));
        assert_eq!(registry.next_handle(), Handle::new(2));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut vm = Vm::default();
        let registry = Registry::init(&mut vm, "objs").unwrap();
        let a = vm.new_table().unwrap();
        vm.set_global("a", a.clone());
        let handle = registry.allocate(&mut vm, a).unwrap();

        registry.release(&mut vm, handle).unwrap();
        registry.release(&mut vm, handle).unwrap();
        registry.release(&mut vm, Handle::NONE).unwrap();
        assert_eq!(registry.lookup(&vm, handle).unwrap(), None);
    }

    #[test]
    fn test_entries_do_not_keep_values_alive() {
        let mut vm = Vm::default();
        let registry = Registry::init(&mut vm, "objs").unwrap();
        let a = vm.new_table().unwrap();
        let handle = registry.allocate(&mut vm, a).unwrap();

        vm.collect();
        assert_eq!(registry.lookup(&vm, handle).unwrap(), None);
        // Released handles are never handed out again
        let b = vm.new_table().unwrap();
        assert_eq!(registry.allocate(&mut vm, b).unwrap(), Handle::new(1));
    }

    #[test]
    fn test_table_survives_global_overwrite() {
        let mut vm = Vm::default();
        let registry = Registry::init(&mut vm, "objs").unwrap();
        vm.set_global("objs", Value::Nil);
        vm.collect();

        let a = vm.new_table().unwrap();
        vm.set_global("a", a.clone());
        let handle = registry.allocate(&mut vm, a.clone()).unwrap();
        assert_eq!(registry.lookup(&vm, handle).unwrap(), Some(a));
        registry.release(&mut vm, handle).unwrap();
    }

    #[test]
    fn test_sentinel() {
        assert!(Handle::NONE.is_none());
        assert!(!Handle::new(0).is_none());
        assert_eq!(Handle::default(), Handle::NONE);
        assert_eq!(Value::from(Handle::new(3)), Value::Int(3));
    }
}
