//! Error types for the embedding contract

/// Result type for runtime operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors surfaced to script code by the runtime.
///
/// A native function aborts the current call by returning `Err`; the runtime
/// propagates the error to the script call site with its message intact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// Error raised by native code, carrying a user-visible message
    #[error("{0}")]
    Raised(String),

    /// Operation applied to a value of the wrong kind
    #[error("attempt to {op} a {type_name} value")]
    TypeError {
        /// Operation that was attempted ("call", "index", ...)
        op: &'static str,
        /// Script type name of the offending value
        type_name: &'static str,
    },

    /// Value cannot be used as a table key
    #[error("invalid table key ({0})")]
    InvalidKey(&'static str),

    /// Reference to an object the collector already reclaimed
    #[error("stale reference to a collected {0}")]
    StaleReference(&'static str),

    /// Object limit of the runtime instance reached
    #[error("object limit of {0} exceeded")]
    OutOfMemory(usize),

    /// Nested native calls exceeded the configured depth
    #[error("call depth limit of {0} exceeded")]
    StackOverflow(usize),

    /// Runtime instance was already closed
    #[error("runtime is closed")]
    Closed,
}

impl From<String> for ScriptError {
    fn from(s: String) -> Self {
        ScriptError::Raised(s)
    }
}

impl From<&str> for ScriptError {
    fn from(s: &str) -> Self {
        ScriptError::Raised(s.to_string())
    }
}
