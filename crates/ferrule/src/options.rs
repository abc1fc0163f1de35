//! Bridge configuration

/// Global name the registry table is published under by default
pub const DEFAULT_REGISTRY_KEY: &str = "NativeObjects";

/// Options for [`crate::Bridge::init`]
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Global name of the weak handle table
    pub registry_key: String,

    /// Translate panics in bound code into script errors
    pub catch_panics: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            registry_key: DEFAULT_REGISTRY_KEY.to_string(),
            catch_panics: true,
        }
    }
}

impl BridgeOptions {
    /// Publish the registry under a different global name
    pub fn with_registry_key(mut self, key: impl Into<String>) -> Self {
        self.registry_key = key.into();
        self
    }

    /// Enable or disable panic translation
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }
}
