//! Call context handed to bound methods and constructors
//!
//! `CallContext` is the trust boundary between untyped script arguments and
//! typed native code: [`CallContext::checkarg`] validates that an argument is
//! a wrapper produced by this bridge and downcasts it to the requested class.

use std::cell::RefCell;
use std::ptr::NonNull;

use ferrule_sdk::{ScriptRuntime, Value};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::names::short_type_name;
use crate::object::{downcast, NativeClass, NativeObject, ObjectCell};

/// Argument position of the receiver in method calls
pub const RECEIVER: usize = 0;

/// Arguments and runtime access for one native call.
///
/// Every object handed out by [`check_object`](Self::check_object) stays
/// marked in use until the context is dropped at the end of the call.
pub struct CallContext<'a> {
    runtime: &'a mut dyn ScriptRuntime,
    bridge: &'a Bridge,
    args: &'a [Value],
    held: RefCell<Vec<NonNull<ObjectCell>>>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        runtime: &'a mut dyn ScriptRuntime,
        bridge: &'a Bridge,
        args: &'a [Value],
    ) -> Self {
        Self {
            runtime,
            bridge,
            args,
            held: RefCell::new(Vec::new()),
        }
    }

    /// The calling runtime
    pub fn runtime(&mut self) -> &mut dyn ScriptRuntime {
        &mut *self.runtime
    }

    /// The bridge dispatching this call
    pub fn bridge(&self) -> &'a Bridge {
        self.bridge
    }

    /// Raw arguments
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Check if there are no arguments
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Argument at `position`; nil when absent
    pub fn arg(&self, position: usize) -> Value {
        self.args.get(position).cloned().unwrap_or_default()
    }

    /// Validate that the argument at `position` is a live wrapper from this
    /// bridge
    pub fn check_object(&self, position: usize) -> BridgeResult<&'a ObjectCell> {
        let args: &'a [Value] = self.args;
        let value = args.get(position).ok_or(BridgeError::InvalidReceiver)?;
        let ptr = self.bridge.cell_ptr(&*self.runtime, value)?;
        // SAFETY: the cell is live because the wrapper still holds its
        // pointer. Once acquired it is not freed before `drop` releases it,
        // since finalize refuses cells in use.
        let cell: &'a ObjectCell = unsafe { ptr.as_ref() };
        cell.acquire();
        self.held.borrow_mut().push(ptr);
        Ok(cell)
    }

    /// Validate the argument at `position` and downcast it to `T`.
    ///
    /// Succeeds when the wrapped object is a `T` or embeds one through its
    /// upcast chain.
    pub fn checkarg<T: NativeClass>(&self, position: usize) -> BridgeResult<&'a T> {
        let cell = self.check_object(position)?;
        downcast::<T>(cell.object()).ok_or_else(|| BridgeError::TypeMismatch {
            actual: cell.object().type_name(),
            expected: T::class_name(),
        })
    }

    /// Like [`checkarg`](Self::checkarg) for types without a constructor
    pub fn checkarg_object<T: NativeObject>(&self, position: usize) -> BridgeResult<&'a T> {
        let cell = self.check_object(position)?;
        downcast::<T>(cell.object()).ok_or_else(|| BridgeError::TypeMismatch {
            actual: cell.object().type_name(),
            expected: short_type_name::<T>(),
        })
    }

    /// String argument
    pub fn arg_str(&self, position: usize) -> BridgeResult<&'a str> {
        let args: &'a [Value] = self.args;
        match args.get(position) {
            Some(Value::Str(s)) => Ok(&**s),
            other => Err(expected(position, "string", other)),
        }
    }

    /// Optional string argument; nil or absent gives `None`
    pub fn opt_str(&self, position: usize) -> BridgeResult<Option<&'a str>> {
        match self.args.get(position) {
            None | Some(Value::Nil) => Ok(None),
            Some(_) => self.arg_str(position).map(Some),
        }
    }

    /// Integer argument; integral numbers are accepted
    pub fn arg_int(&self, position: usize) -> BridgeResult<i64> {
        let value = self.args.get(position);
        value
            .and_then(Value::as_int)
            .ok_or_else(|| expected(position, "integer", value))
    }

    /// Optional integer argument
    pub fn opt_int(&self, position: usize) -> BridgeResult<Option<i64>> {
        match self.args.get(position) {
            None | Some(Value::Nil) => Ok(None),
            Some(_) => self.arg_int(position).map(Some),
        }
    }

    /// Wrap a new native object, e.g. to return it from a method
    pub fn wrap<T: NativeObject>(&mut self, object: T) -> BridgeResult<Value> {
        self.bridge.wrap(&mut *self.runtime, object)
    }
}

impl Drop for CallContext<'_> {
    fn drop(&mut self) {
        for ptr in self.held.get_mut().drain(..) {
            // SAFETY: acquired in `check_object`, so still live
            unsafe { ptr.as_ref() }.release();
        }
    }
}

fn expected(position: usize, what: &str, got: Option<&Value>) -> BridgeError {
    let got = got.map_or("no value", Value::type_name);
    BridgeError::argument(position, format!("{} expected, got {}", what, got))
}
