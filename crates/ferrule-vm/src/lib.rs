//! Ferrule VM - reference scripting runtime
//!
//! A small single-threaded runtime implementing [`ferrule_sdk::ScriptRuntime`]:
//! - Value space of nil, booleans, numbers, strings, tables, userdata, and
//!   native functions
//! - Generation-checked heap slots for tables and userdata
//! - Mark-sweep collector with weak-valued tables and finalize hooks
//! - Resource limits on live objects and call depth

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod collector;
mod heap;
pub mod options;
pub mod vm;

pub use collector::GcStats;
pub use options::{ResourceLimits, VmOptions};
pub use vm::{PinId, Vm};
