//! Ferrule - native objects for embedded scripting runtimes
//!
//! This crate lets host code hand polymorphic Rust objects to a scripting
//! runtime that implements [`ferrule_sdk::ScriptRuntime`]:
//! - [`Bridge`]: per-runtime registry, wrapping, and class registration
//! - [`NativeObject`] / [`NativeClass`]: what a bound type implements
//! - [`AttributeMap`]: per-class method tables with base-class fallback
//! - [`CallContext`]: argument access and the `checkarg` downcast
//!
//! The runtime's collector drives object lifetime: a wrapper owns its object
//! and destroys it from the finalize hook, exactly once.
//!
//! # Example
//!
//! ```ignore
//! use ferrule::{AttributeMap, Bridge, BridgeOptions, BridgeResult, CallContext, NativeClass,
//!               NativeObject, Method, RECEIVER};
//! use ferrule_sdk::Value;
//!
//! struct Counter { hits: std::cell::Cell<i64> }
//!
//! impl NativeObject for Counter {
//!     fn getattr(&self, name: &str) -> Option<Method> {
//!         AttributeMap::new().with("hit", hit).resolve(name, ferrule::root_getattr)
//!     }
//! }
//!
//! impl NativeClass for Counter {
//!     fn construct(_ctx: &mut CallContext<'_>) -> BridgeResult<Self> {
//!         Ok(Counter { hits: Default::default() })
//!     }
//! }
//!
//! fn hit(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
//!     let counter = ctx.checkarg::<Counter>(RECEIVER)?;
//!     counter.hits.set(counter.hits.get() + 1);
//!     Ok(vec![Value::Int(counter.hits.get())])
//! }
//!
//! let bridge = Bridge::init(&mut vm, BridgeOptions::default())?;
//! let namespace = vm.new_table()?;
//! bridge.register::<Counter>(&mut vm, &namespace)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod attributes;
pub mod bridge;
pub mod context;
pub mod error;
mod lifecycle;
pub mod names;
pub mod object;
pub mod options;
pub mod registry;

pub use attributes::{root_getattr, AttributeMap, Method};
pub use bridge::Bridge;
pub use context::{CallContext, RECEIVER};
pub use error::{BridgeError, BridgeResult};
pub use names::{demangle, short_type_name};
pub use object::{default_tostring, upcast_self, AsAny, NativeClass, NativeObject, ObjectCell};
pub use options::{BridgeOptions, DEFAULT_REGISTRY_KEY};
pub use registry::{Handle, Registry};

pub use ferrule_sdk as sdk;
