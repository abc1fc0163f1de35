//! Native functions and userdata descriptors
//!
//! A `NativeFunction` is the script-callable unit implemented in Rust. A
//! `Descriptor` is the fixed set of hooks a runtime consults when script code
//! indexes, prints, or collects an opaque userdata value.

use std::fmt;
use std::rc::Rc;

use crate::error::ScriptResult;
use crate::runtime::ScriptRuntime;
use crate::value::Value;

/// Body of a native function.
///
/// Receives the calling runtime and the raw arguments; returns the values
/// to hand back to the script, or an error that aborts the call.
pub type NativeFnBody = dyn Fn(&mut dyn ScriptRuntime, &[Value]) -> ScriptResult<Vec<Value>>;

/// A named, reference-counted native function.
#[derive(Clone)]
pub struct NativeFunction {
    name: Rc<str>,
    body: Rc<NativeFnBody>,
}

impl NativeFunction {
    /// Create a native function.
    ///
    /// # Arguments
    /// * `name` - Name used in diagnostics and default string conversion
    /// * `body` - Function body
    pub fn new(
        name: impl Into<Rc<str>>,
        body: impl Fn(&mut dyn ScriptRuntime, &[Value]) -> ScriptResult<Vec<Value>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Rc::new(body),
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the body directly.
    ///
    /// Runtimes use this from their own `call`, after rooting the arguments.
    /// Native code should go through [`ScriptRuntime::call`] instead.
    pub fn invoke(&self, rt: &mut dyn ScriptRuntime, args: &[Value]) -> ScriptResult<Vec<Value>> {
        (self.body)(rt, args)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &NativeFunction) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }

    /// Address of the body, used as identity in string conversion
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.body) as *const () as usize
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish()
    }
}

/// Shared hook set attached to opaque userdata values.
///
/// Every hook is called with the userdata as its first argument:
/// - `index(userdata, key)` returns the attribute value
/// - `tostring(userdata)` returns a string
/// - `finalize(userdata)` runs once when the collector reclaims the value
#[derive(Debug, Default)]
pub struct Descriptor {
    name: String,
    index: Option<NativeFunction>,
    tostring: Option<NativeFunction>,
    finalize: Option<NativeFunction>,
}

impl Descriptor {
    /// Create an empty descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the attribute lookup hook
    pub fn with_index(mut self, hook: NativeFunction) -> Self {
        self.index = Some(hook);
        self
    }

    /// Set the string conversion hook
    pub fn with_tostring(mut self, hook: NativeFunction) -> Self {
        self.tostring = Some(hook);
        self
    }

    /// Set the finalize hook
    pub fn with_finalize(mut self, hook: NativeFunction) -> Self {
        self.finalize = Some(hook);
        self
    }

    /// Descriptor name (diagnostics only)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute lookup hook
    pub fn index(&self) -> Option<&NativeFunction> {
        self.index.as_ref()
    }

    /// String conversion hook
    pub fn tostring(&self) -> Option<&NativeFunction> {
        self.tostring.as_ref()
    }

    /// Finalize hook
    pub fn finalize(&self) -> Option<&NativeFunction> {
        self.finalize.as_ref()
    }
}
