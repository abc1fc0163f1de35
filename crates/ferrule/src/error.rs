//! Error types for the bridge

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use ferrule_sdk::ScriptError;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the bridge.
///
/// Every variant reaches script code as a runtime error with the displayed
/// message; none is turned into a silent nil.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// The value is not a wrapper produced by this bridge
    #[error("invalid type")]
    InvalidReceiver,

    /// Downcast to the requested class failed
    #[error("object of type '{actual}' is not a subtype of '{expected}'")]
    TypeMismatch {
        /// Type name of the wrapped object
        actual: String,
        /// Requested class name
        expected: String,
    },

    /// No class in the resolver chain defines the attribute
    #[error("{type_name} has no attribute '{name}'")]
    UnknownAttribute {
        /// Type name of the wrapped object
        type_name: String,
        /// Requested attribute
        name: String,
    },

    /// The wrapper outlived its native object
    #[error("native object has been finalized")]
    Finalized,

    /// Finalization was requested while a native call still uses the object
    #[error("native object is in use by an active call")]
    InUse,

    /// The bridge that produced a wrapper was dropped
    #[error("object bridge is no longer available")]
    Detached,

    /// Invalid argument to a bound method or constructor
    #[error("bad argument #{position} ({message})")]
    ArgumentError {
        /// Argument position
        position: usize,
        /// What was wrong with it
        message: String,
    },

    /// A bound method panicked
    #[error("native method panicked: {0}")]
    Panic(String),

    /// Error raised by the scripting runtime
    #[error(transparent)]
    Runtime(#[from] ScriptError),
}

impl BridgeError {
    /// Shorthand for [`BridgeError::ArgumentError`]
    pub fn argument(position: usize, message: impl Into<String>) -> Self {
        BridgeError::ArgumentError {
            position,
            message: message.into(),
        }
    }
}

impl From<BridgeError> for ScriptError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Runtime(inner) => inner,
            other => ScriptError::Raised(other.to_string()),
        }
    }
}

/// Run `f`, turning a panic into [`BridgeError::Panic`] when `catch` is set
pub(crate) fn guard<R>(catch: bool, f: impl FnOnce() -> BridgeResult<R>) -> BridgeResult<R> {
    if !catch {
        return f();
    }
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(BridgeError::Panic(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
