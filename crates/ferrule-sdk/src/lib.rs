//! Ferrule SDK - the embedding contract
//!
//! This crate provides the minimal types and traits shared by the Ferrule
//! bridge and a host scripting runtime, without depending on either:
//!
//! - [`Value`]: script values, with opaque references into the runtime heap
//! - [`ScriptRuntime`]: the embedding API a runtime implements
//! - [`NativeFunction`] and [`Descriptor`]: native callables and userdata hooks
//! - [`ScriptError`]: errors surfaced to script code
//!
//! # Example
//!
//! ```ignore
//! use ferrule_sdk::{NativeFunction, ScriptRuntime, Value};
//!
//! fn install(rt: &mut dyn ScriptRuntime) {
//!     let add = NativeFunction::new("add", |_rt, args| {
//!         let a = args.first().and_then(Value::as_int).unwrap_or(0);
//!         let b = args.get(1).and_then(Value::as_int).unwrap_or(0);
//!         Ok(vec![Value::Int(a + b)])
//!     });
//!     rt.set_global("add", add.into());
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod function;
pub mod runtime;
pub mod value;

pub use error::{ScriptError, ScriptResult};
pub use function::{Descriptor, NativeFnBody, NativeFunction};
pub use runtime::{ScriptRuntime, UserdataView};
pub use value::{NativePtr, ObjRef, Value};
