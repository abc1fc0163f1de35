//! Finalization of wrapped objects
//!
//! The runtime calls the finalize hook once when a wrapper becomes
//! unreachable. The hook takes the native pointer out of the wrapper, so the
//! object is destroyed at most once and later calls through a stale wrapper
//! see [`BridgeError::Finalized`] instead of freed memory. An object that a
//! running method still uses is never destroyed; the hook fails with
//! [`BridgeError::InUse`] and the pointer stays in place for a later attempt.

use std::rc::{Rc, Weak};

use ferrule_sdk::{Descriptor, NativeFunction, ScriptError, ScriptRuntime, Value};
use log::{debug, warn};

use crate::bridge::{Bridge, BridgeInner};
use crate::error::{guard, BridgeError, BridgeResult};
use crate::object::ObjectCell;

/// `owner` is the descriptor the hook is installed in; only wrappers carrying
/// it are finalized, even after the bridge is gone.
pub(crate) fn finalize_hook(weak: Weak<BridgeInner>, owner: Weak<Descriptor>) -> NativeFunction {
    NativeFunction::new("__gc", move |rt, args| {
        let bridge = Bridge::upgrade(&weak);
        let catch = bridge.as_ref().map_or(true, Bridge::catch_panics);
        guard(catch, || finalize(rt, bridge.as_ref(), &owner, args.first()))
            .map_err(ScriptError::from)?;
        Ok(vec![])
    })
}

/// Release the handle of `target` and destroy its native object.
///
/// When the bridge itself is gone the registry went with it, so only the
/// object is destroyed.
pub(crate) fn finalize(
    rt: &mut dyn ScriptRuntime,
    bridge: Option<&Bridge>,
    owner: &Weak<Descriptor>,
    target: Option<&Value>,
) -> BridgeResult<()> {
    let target = target.ok_or(BridgeError::InvalidReceiver)?;
    let view = rt.userdata(target).ok_or(BridgeError::InvalidReceiver)?;
    if !std::ptr::eq(Rc::as_ptr(&view.descriptor), owner.as_ptr()) {
        return Err(BridgeError::InvalidReceiver);
    }

    let Some(ptr) = view.ptr else {
        warn!("[lifecycle] finalize called on an emptied wrapper");
        return Ok(());
    };
    // SAFETY: the wrapper still holds the pointer, so the cell is live
    if unsafe { ptr.cast::<ObjectCell>().as_ref() }.in_use() {
        debug!("[lifecycle] finalize deferred: object in use");
        return Err(BridgeError::InUse);
    }
    let Some(ptr) = rt.take_userdata_ptr(target) else {
        return Ok(());
    };
    // SAFETY: the pointer was leaked from a Box in `wrap_boxed` and has just
    // been taken out of the only wrapper holding it
    let cell = unsafe { Box::from_raw(ptr.cast::<ObjectCell>().as_ptr()) };
    let handle = cell.handle();
    let type_name = cell.object().type_name();

    drop(cell);
    debug!("[lifecycle] finalized {} (handle {})", type_name, handle);
    if let Some(bridge) = bridge {
        bridge.registry().release(rt, handle)?;
    }
    Ok(())
}
