//! Runtime configuration

/// Resource limits for a runtime instance
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum number of live heap objects (None = unlimited)
    pub max_objects: Option<usize>,

    /// Maximum nesting of native calls
    pub max_call_depth: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_objects: None,
            max_call_depth: 200,
        }
    }
}

impl ResourceLimits {
    /// Create unlimited resource limits
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Create resource limits with a specific object limit
    pub fn with_object_limit(max_objects: usize) -> Self {
        Self {
            max_objects: Some(max_objects),
            ..Default::default()
        }
    }
}

/// Options for creating a runtime instance
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Resource limits
    pub limits: ResourceLimits,

    /// Run pending finalize hooks when the runtime is closed
    pub finalize_on_close: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            finalize_on_close: true,
        }
    }
}

impl VmOptions {
    /// Replace the resource limits
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable finalization at close
    pub fn with_finalize_on_close(mut self, enabled: bool) -> Self {
        self.finalize_on_close = enabled;
        self
    }
}
