//! Store module configuration

use once_cell::sync::Lazy;

/// Environment variable naming the default store
pub const STORE_URI_ENV: &str = "FERRULE_STORE_URI";

/// Priority of a binary cache when the constructor does not give one
pub const DEFAULT_CACHE_PRIORITY: i64 = 50;

static ENV_STORE_URI: Lazy<Option<String>> = Lazy::new(|| {
    std::env::var(STORE_URI_ENV)
        .ok()
        .filter(|uri| !uri.trim().is_empty())
});

/// Default store URI from the environment, read once per process
pub fn env_store_uri() -> Option<&'static str> {
    ENV_STORE_URI.as_deref()
}

/// Options for [`crate::open`]
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// URI used when a script opens a store without one
    pub default_uri: Option<String>,

    /// Priority given to binary caches opened without one
    pub cache_priority: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_uri: env_store_uri().map(str::to_string),
            cache_priority: DEFAULT_CACHE_PRIORITY,
        }
    }
}

impl StoreConfig {
    /// Replace the default store URI
    pub fn with_default_uri(mut self, uri: impl Into<String>) -> Self {
        self.default_uri = Some(uri.into());
        self
    }

    /// Open stores without a URI unless a script passes one
    pub fn without_default_uri(mut self) -> Self {
        self.default_uri = None;
        self
    }

    /// Replace the default binary cache priority
    pub fn with_cache_priority(mut self, priority: i64) -> Self {
        self.cache_priority = priority;
        self
    }
}
