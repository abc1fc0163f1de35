//! Ferrule store module
//!
//! An illustrative consumer of the bridge: a `store` namespace exposing two
//! bound classes to scripts.
//!
//! ```ignore
//! let mut vm = ferrule_vm::Vm::default();
//! let (bridge, namespace) = ferrule_store::open(&mut vm, StoreConfig::default())?;
//! // script: local s = store.Store("daemon"); s:get_uri()
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod store;

use ferrule::{Bridge, BridgeOptions, BridgeResult, NativeClass};
use ferrule_sdk::{ScriptRuntime, Value};
use log::debug;
use once_cell::sync::OnceCell;

pub use config::{StoreConfig, DEFAULT_CACHE_PRIORITY, STORE_URI_ENV};
pub use store::{BinaryCacheStore, Store};

/// Global name the namespace table is published under
pub const MODULE_NAME: &str = "store";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// One-time process setup. Returns `true` for the call that performed it.
pub fn init() -> bool {
    let mut first = false;
    INITIALIZED.get_or_init(|| {
        first = true;
        match config::env_store_uri() {
            Some(uri) => debug!("[store] process init, default store '{}'", uri),
            None => debug!("[store] process init, no default store"),
        }
    });
    first
}

/// Open the module on a runtime.
///
/// Initializes the bridge, registers `Store` and `BinaryCache` in a new
/// namespace table, and publishes that table as the global `store`.
pub fn open(rt: &mut dyn ScriptRuntime, config: StoreConfig) -> BridgeResult<(Bridge, Value)> {
    init();
    let bridge = Bridge::init(rt, BridgeOptions::default())?;
    let namespace = rt.new_table()?;
    rt.set_global(MODULE_NAME, namespace.clone());
    rt.set_field(&namespace, "version", env!("CARGO_PKG_VERSION").into())?;

    let store_config = config.clone();
    bridge.register_constructor(rt, &namespace, &Store::class_name(), move |ctx| {
        Store::from_args(ctx, &store_config)
    })?;
    bridge.register_constructor(rt, &namespace, &BinaryCacheStore::class_name(), move |ctx| {
        BinaryCacheStore::from_args(ctx, &config)
    })?;

    debug!("[store] module '{}' opened", MODULE_NAME);
    Ok((bridge, namespace))
}
