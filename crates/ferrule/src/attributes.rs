//! Name-based method resolution
//!
//! Scripts address methods by name. Each class keeps an [`AttributeMap`] of
//! the methods it introduces or overrides and falls back to its base class
//! for everything else, so the most derived definition wins. The chain ends
//! at [`root_getattr`], which knows `get_refid` and `get_type`.

use rustc_hash::FxHashMap;

use ferrule_sdk::Value;

use crate::context::{CallContext, RECEIVER};
use crate::error::BridgeResult;

/// A bound method: reads its receiver and arguments from the call context
/// and returns its results
pub type Method = fn(&mut CallContext<'_>) -> BridgeResult<Vec<Value>>;

/// Method table of one class
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    methods: FxHashMap<&'static str, Method>,
}

impl AttributeMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &'static str, method: Method) -> Self {
        self.methods.insert(name, method);
        self
    }

    /// Insert or replace a method
    pub fn insert(&mut self, name: &'static str, method: Method) -> Option<Method> {
        self.methods.insert(name, method)
    }

    /// Remove a method
    pub fn remove(&mut self, name: &str) -> Option<Method> {
        self.methods.remove(name)
    }

    /// Local lookup only
    pub fn get(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }

    /// Check for a local definition
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Names defined locally, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    /// Number of local definitions
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if no method is defined locally
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Local lookup, falling back to `base` on a miss
    pub fn resolve(&self, name: &str, base: impl FnOnce(&str) -> Option<Method>) -> Option<Method> {
        self.get(name).or_else(|| base(name))
    }
}

/// Attributes every wrapped object has
pub fn root_getattr(name: &str) -> Option<Method> {
    match name {
        "get_refid" => Some(get_refid as Method),
        "get_type" => Some(get_type as Method),
        _ => None,
    }
}

fn get_refid(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let cell = ctx.check_object(RECEIVER)?;
    Ok(vec![cell.handle().into()])
}

fn get_type(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let cell = ctx.check_object(RECEIVER)?;
    Ok(vec![cell.object().type_name().into()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(_ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
        Ok(vec![Value::Int(1)])
    }

    fn two(_ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
        Ok(vec![Value::Int(2)])
    }

    fn same(a: Option<Method>, b: Method) -> bool {
        a.is_some_and(|a| a as usize == b as usize)
    }

    #[test]
    fn test_local_definition_shadows_base() {
        let base = AttributeMap::new().with("f", one).with("g", one);
        let derived = AttributeMap::new().with("f", two);

        let resolve = |name: &str| derived.resolve(name, |name| base.resolve(name, root_getattr));
        assert!(same(resolve("f"), two));
        assert!(same(resolve("g"), one));
        assert!(resolve("get_refid").is_some());
        assert!(resolve("h").is_none());
    }

    #[test]
    fn test_removing_override_restores_base() {
        let base = AttributeMap::new().with("f", one);
        let mut derived = AttributeMap::new().with("f", two);

        assert!(same(derived.resolve("f", |n| base.get(n)), two));
        assert!(same(derived.remove("f"), two));
        assert!(same(derived.resolve("f", |n| base.get(n)), one));
        assert!(derived.is_empty());
    }

    #[test]
    fn test_root_attributes() {
        assert!(root_getattr("get_refid").is_some());
        assert!(root_getattr("get_type").is_some());
        assert!(root_getattr("tostring").is_none());
    }
}
