//! The object bridge
//!
//! A [`Bridge`] owns the registry and the shared descriptor for one runtime
//! instance. It is passed by context (cloned into every native function it
//! installs) rather than kept in global state.

use std::fmt::{self, Write as _};
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use ferrule_sdk::{Descriptor, NativeFunction, NativePtr, ScriptError, ScriptRuntime, Value};
use log::{debug, log_enabled, trace, Level};

use crate::attributes::Method;
use crate::context::{CallContext, RECEIVER};
use crate::error::{guard, BridgeError, BridgeResult};
use crate::lifecycle;
use crate::names::short_type_name;
use crate::object::{downcast, NativeClass, NativeObject, ObjectCell};
use crate::options::BridgeOptions;
use crate::registry::{Handle, Registry};

pub(crate) struct BridgeInner {
    registry: Registry,
    descriptor: Rc<Descriptor>,
    options: BridgeOptions,
}

/// Bridge between native objects and one runtime instance
#[derive(Clone)]
pub struct Bridge {
    inner: Rc<BridgeInner>,
}

impl Bridge {
    /// Set up the registry on `rt`. Must run once before any wrap or
    /// registration on that runtime.
    pub fn init(rt: &mut dyn ScriptRuntime, options: BridgeOptions) -> BridgeResult<Self> {
        let registry = Registry::init(rt, &options.registry_key)?;
        // Hooks hold a weak link back; the descriptor lives inside the bridge
        let inner = Rc::new_cyclic(|weak| BridgeInner {
            registry,
            descriptor: Rc::new_cyclic(|owner| descriptor(weak, owner)),
            options,
        });
        debug!("[bridge] initialized registry '{}'", inner.registry.key());
        Ok(Self { inner })
    }

    pub(crate) fn upgrade(weak: &Weak<BridgeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Bridge options
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// The handle registry
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Descriptor attached to every wrapper
    pub fn descriptor(&self) -> &Rc<Descriptor> {
        &self.inner.descriptor
    }

    pub(crate) fn catch_panics(&self) -> bool {
        self.inner.options.catch_panics
    }

    // ========================================================================
    // Wrapping
    // ========================================================================

    /// Hand a native object to the runtime.
    ///
    /// The returned wrapper owns the object from now on; it is destroyed by
    /// the finalize hook once the script drops every reference.
    pub fn wrap<T: NativeObject>(&self, rt: &mut dyn ScriptRuntime, object: T) -> BridgeResult<Value> {
        self.wrap_boxed(rt, Box::new(object))
    }

    /// [`wrap`](Self::wrap) for an already boxed object
    pub fn wrap_boxed(
        &self,
        rt: &mut dyn ScriptRuntime,
        object: Box<dyn NativeObject>,
    ) -> BridgeResult<Value> {
        let type_name = object.type_name();
        let cell = NonNull::from(Box::leak(Box::new(ObjectCell::new(object))));
        let value = match rt.new_userdata(NativePtr::new(cell), self.inner.descriptor.clone()) {
            Ok(value) => value,
            Err(err) => {
                // SAFETY: the runtime refused the pointer, so the cell is still ours
                drop(unsafe { Box::from_raw(cell.as_ptr()) });
                return Err(err.into());
            }
        };
        let handle = self.inner.registry.allocate(rt, value.clone())?;
        // SAFETY: `value` owns the cell and was created just above
        unsafe { cell.as_ref() }.set_handle(handle);
        debug!("[bridge] wrapped {} as handle {}", type_name, handle);
        Ok(value)
    }

    /// The live wrapper registered under `handle`, if any
    pub fn push_object(&self, rt: &dyn ScriptRuntime, handle: Handle) -> BridgeResult<Option<Value>> {
        self.inner.registry.lookup(rt, handle)
    }

    /// Handle of a wrapper
    pub fn handle_of(&self, rt: &dyn ScriptRuntime, value: &Value) -> BridgeResult<Handle> {
        Ok(self.cell(rt, value)?.handle())
    }

    /// Check whether `value` is a wrapper produced by this bridge
    pub fn owns(&self, rt: &dyn ScriptRuntime, value: &Value) -> bool {
        rt.userdata(value)
            .is_some_and(|view| Rc::ptr_eq(&view.descriptor, &self.inner.descriptor))
    }

    /// Run `f` on the object behind a wrapper, downcast to `T`
    pub fn with_object<T: NativeObject, R>(
        &self,
        rt: &dyn ScriptRuntime,
        value: &Value,
        f: impl FnOnce(&T) -> R,
    ) -> BridgeResult<R> {
        let cell = self.cell(rt, value)?;
        let object = downcast::<T>(cell.object()).ok_or_else(|| BridgeError::TypeMismatch {
            actual: cell.object().type_name(),
            expected: short_type_name::<T>(),
        })?;
        Ok(f(object))
    }

    pub(crate) fn cell_ptr(
        &self,
        rt: &dyn ScriptRuntime,
        value: &Value,
    ) -> BridgeResult<NonNull<ObjectCell>> {
        let view = rt.userdata(value).ok_or(BridgeError::InvalidReceiver)?;
        if !Rc::ptr_eq(&view.descriptor, &self.inner.descriptor) {
            return Err(BridgeError::InvalidReceiver);
        }
        let ptr = view.ptr.ok_or(BridgeError::Finalized)?;
        Ok(ptr.cast())
    }

    fn cell<'r>(&self, rt: &'r dyn ScriptRuntime, value: &Value) -> BridgeResult<&'r ObjectCell> {
        let ptr = self.cell_ptr(rt, value)?;
        // SAFETY: the cell is only freed by the finalize hook, which needs
        // exclusive access to the runtime
        Ok(unsafe { ptr.as_ref() })
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Install the constructor of `T` into `namespace` under its class name
    pub fn register<T: NativeClass>(
        &self,
        rt: &mut dyn ScriptRuntime,
        namespace: &Value,
    ) -> BridgeResult<()> {
        self.register_constructor(rt, namespace, &T::class_name(), T::construct)
    }

    /// Install `constructor` into `namespace` under `name`.
    ///
    /// Calling the installed function builds an object from the call
    /// arguments and returns its wrapper.
    pub fn register_constructor<T, F>(
        &self,
        rt: &mut dyn ScriptRuntime,
        namespace: &Value,
        name: &str,
        constructor: F,
    ) -> BridgeResult<()>
    where
        T: NativeObject,
        F: Fn(&mut CallContext<'_>) -> BridgeResult<T> + 'static,
    {
        let bridge = self.clone();
        let label: Rc<str> = name.into();
        let function = NativeFunction::new(label.clone(), move |rt, args| {
            bridge
                .construct(rt, &label, &constructor, args)
                .map_err(ScriptError::from)
        });
        rt.set_field(namespace, name, function.into())?;
        debug!("[bridge] registered constructor {}", name);
        Ok(())
    }

    fn construct<T, F>(
        &self,
        rt: &mut dyn ScriptRuntime,
        name: &str,
        constructor: &F,
        args: &[Value],
    ) -> BridgeResult<Vec<Value>>
    where
        T: NativeObject,
        F: Fn(&mut CallContext<'_>) -> BridgeResult<T>,
    {
        if log_enabled!(Level::Trace) {
            Self::dump_args(name, args);
        }
        let object = guard(self.catch_panics(), || {
            constructor(&mut CallContext::new(rt, self, args))
        })?;
        Ok(vec![self.wrap(rt, object)?])
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn invoke(
        &self,
        rt: &mut dyn ScriptRuntime,
        name: &str,
        method: Method,
        args: &[Value],
    ) -> BridgeResult<Vec<Value>> {
        if log_enabled!(Level::Trace) {
            Self::dump_args(name, args);
        }
        guard(self.catch_panics(), || {
            method(&mut CallContext::new(rt, self, args))
        })
    }

    fn method_value(&self, name: &str, method: Method) -> Value {
        let bridge = self.clone();
        let label: Rc<str> = name.into();
        NativeFunction::new(label.clone(), move |rt, args| {
            bridge
                .invoke(rt, &label, method, args)
                .map_err(ScriptError::from)
        })
        .into()
    }

    /// `index(wrapper, name)`: resolve a method through the object's chain
    fn index(&self, rt: &mut dyn ScriptRuntime, args: &[Value]) -> BridgeResult<Vec<Value>> {
        let receiver = args.get(RECEIVER).ok_or(BridgeError::InvalidReceiver)?;
        let cell = self.cell(&*rt, receiver)?;
        let key = args.get(RECEIVER + 1).cloned().unwrap_or_default();
        let name = key.as_str().ok_or_else(|| {
            BridgeError::argument(
                RECEIVER + 1,
                format!("attribute name expected, got {}", key.type_name()),
            )
        })?;

        let object = cell.object();
        let method = object
            .getattr(name)
            .ok_or_else(|| BridgeError::UnknownAttribute {
                type_name: object.type_name(),
                name: name.to_string(),
            })?;
        trace!("[resolver] {}.{}", object.type_name(), name);
        Ok(vec![self.method_value(name, method)])
    }

    /// `tostring(wrapper)`
    fn tostring(&self, rt: &mut dyn ScriptRuntime, args: &[Value]) -> BridgeResult<Vec<Value>> {
        let receiver = args.get(RECEIVER).ok_or(BridgeError::InvalidReceiver)?;
        let cell = self.cell(&*rt, receiver)?;
        let addr = cell as *const ObjectCell as usize;
        Ok(vec![cell.object().tostring(addr).into()])
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Render the arguments of a native call, one per line, and log them at
    /// trace level
    pub fn dump_args(label: &str, args: &[Value]) -> String {
        let mut out = format!("{} ({} args)", label, args.len());
        for (i, arg) in args.iter().enumerate() {
            let _ = write!(out, "\n  #{} {:?}", i, arg);
        }
        trace!("[bridge] {}", out);
        out
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.inner.registry)
            .field("options", &self.inner.options)
            .finish()
    }
}

fn descriptor(weak: &Weak<BridgeInner>, owner: &Weak<Descriptor>) -> Descriptor {
    Descriptor::new("NativeObject")
        .with_index(hook("__index", weak.clone(), Bridge::index))
        .with_tostring(hook("__tostring", weak.clone(), Bridge::tostring))
        .with_finalize(lifecycle::finalize_hook(weak.clone(), owner.clone()))
}

fn hook(
    name: &str,
    weak: Weak<BridgeInner>,
    body: fn(&Bridge, &mut dyn ScriptRuntime, &[Value]) -> BridgeResult<Vec<Value>>,
) -> NativeFunction {
    NativeFunction::new(name, move |rt, args| {
        let bridge = Bridge::upgrade(&weak).ok_or(BridgeError::Detached)?;
        guard(bridge.catch_panics(), || body(&bridge, rt, args)).map_err(ScriptError::from)
    })
}
