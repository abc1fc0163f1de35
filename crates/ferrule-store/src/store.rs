//! Store classes
//!
//! `Store` is a handle on a path store, optionally identified by a URI.
//! `BinaryCacheStore` is a store served from a binary cache: it embeds a
//! `Store`, overrides `get_uri`, and adds `get_priority`.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::BTreeSet;

use ferrule::{
    root_getattr, upcast_self, AsAny, AttributeMap, BridgeError, BridgeResult, CallContext,
    Method, NativeClass, NativeObject, RECEIVER,
};
use ferrule_sdk::Value;
use once_cell::sync::Lazy;

use crate::config::StoreConfig;

const CACHE_SCHEME: &str = "https://";

// ============================================================================
// Store
// ============================================================================

static STORE_METHODS: Lazy<AttributeMap> = Lazy::new(|| {
    AttributeMap::new()
        .with("get_uri", store_get_uri)
        .with("add_path", store_add_path)
        .with("has_path", store_has_path)
        .with("paths", store_paths)
});

/// A path store
#[derive(Debug, Default)]
pub struct Store {
    uri: Option<String>,
    paths: RefCell<BTreeSet<String>>,
}

impl Store {
    /// Open a store
    pub fn open(uri: Option<&str>) -> Self {
        Self {
            uri: uri.map(str::to_string),
            paths: RefCell::default(),
        }
    }

    /// Build from constructor arguments: `Store([uri])`
    pub fn from_args(ctx: &mut CallContext<'_>, config: &StoreConfig) -> BridgeResult<Self> {
        let uri = ctx.opt_str(0)?.or(config.default_uri.as_deref());
        Ok(Self::open(uri))
    }

    /// Store URI, if one was given
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Record a path. Returns `false` if it was already present.
    pub fn add_path(&self, path: &str) -> bool {
        self.paths.borrow_mut().insert(path.to_string())
    }

    /// Check if a path is recorded
    pub fn has_path(&self, path: &str) -> bool {
        self.paths.borrow().contains(path)
    }

    /// Number of recorded paths
    pub fn path_count(&self) -> usize {
        self.paths.borrow().len()
    }
}

fn store_get_uri(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let store = ctx.checkarg::<Store>(RECEIVER)?;
    Ok(vec![store.uri().into()])
}

fn store_add_path(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let store = ctx.checkarg::<Store>(RECEIVER)?;
    let path = ctx.arg_str(1)?;
    if !path.starts_with('/') {
        return Err(BridgeError::argument(1, format!("absolute path expected, got '{}'", path)));
    }
    Ok(vec![store.add_path(path).into()])
}

fn store_has_path(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let store = ctx.checkarg::<Store>(RECEIVER)?;
    let path = ctx.arg_str(1)?;
    Ok(vec![store.has_path(path).into()])
}

fn store_paths(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let store = ctx.checkarg::<Store>(RECEIVER)?;
    Ok(vec![store.path_count().into()])
}

impl NativeObject for Store {
    fn getattr(&self, name: &str) -> Option<Method> {
        STORE_METHODS.resolve(name, root_getattr)
    }
}

impl NativeClass for Store {
    fn construct(ctx: &mut CallContext<'_>) -> BridgeResult<Self> {
        Self::from_args(ctx, &StoreConfig::default())
    }
}

// ============================================================================
// BinaryCacheStore
// ============================================================================

static CACHE_METHODS: Lazy<AttributeMap> = Lazy::new(|| {
    AttributeMap::new()
        .with("get_uri", cache_get_uri)
        .with("get_priority", cache_get_priority)
});

/// A store backed by a binary cache
#[derive(Debug)]
pub struct BinaryCacheStore {
    base: Store,
    priority: i64,
}

impl BinaryCacheStore {
    /// Open a binary cache at `location`
    pub fn open(location: &str, priority: i64) -> Self {
        Self {
            base: Store::open(Some(location)),
            priority,
        }
    }

    /// Build from constructor arguments: `BinaryCache(location, [priority])`
    pub fn from_args(ctx: &mut CallContext<'_>, config: &StoreConfig) -> BridgeResult<Self> {
        let location = ctx.arg_str(0)?;
        if location.is_empty() {
            return Err(BridgeError::argument(0, "cache location must not be empty"));
        }
        let priority = ctx.opt_int(1)?.unwrap_or(config.cache_priority);
        Ok(Self::open(location, priority))
    }

    /// The embedded store
    pub fn store(&self) -> &Store {
        &self.base
    }

    /// Cache URI; the location gets the cache scheme unless it has one
    pub fn uri(&self) -> Option<String> {
        self.base.uri().map(|location| {
            if location.contains("://") {
                location.to_string()
            } else {
                format!("{}{}", CACHE_SCHEME, location)
            }
        })
    }

    /// Substitution priority; lower is preferred
    pub fn priority(&self) -> i64 {
        self.priority
    }
}

fn cache_get_uri(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let cache = ctx.checkarg::<BinaryCacheStore>(RECEIVER)?;
    Ok(vec![cache.uri().into()])
}

fn cache_get_priority(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let cache = ctx.checkarg::<BinaryCacheStore>(RECEIVER)?;
    Ok(vec![cache.priority().into()])
}

impl NativeObject for BinaryCacheStore {
    fn type_name(&self) -> String {
        Self::class_name()
    }

    fn tostring(&self, _addr: usize) -> String {
        format!(
            "<{} {} priority={}>",
            self.type_name(),
            self.uri().unwrap_or_default(),
            self.priority
        )
    }

    fn getattr(&self, name: &str) -> Option<Method> {
        CACHE_METHODS.resolve(name, |name| self.base.getattr(name))
    }

    fn upcast(&self, target: TypeId) -> Option<&dyn Any> {
        upcast_self(self.as_any(), target).or_else(|| self.base.upcast(target))
    }
}

impl NativeClass for BinaryCacheStore {
    fn class_name() -> String {
        "BinaryCache".to_string()
    }

    fn construct(ctx: &mut CallContext<'_>) -> BridgeResult<Self> {
        Self::from_args(ctx, &StoreConfig::default())
    }
}
