//! Native object model
//!
//! Every bindable host type implements [`NativeObject`]. The trait carries
//! the three pieces of polymorphic behavior the bridge needs:
//! - a type name for diagnostics
//! - attribute resolution by name ([`NativeObject::getattr`])
//! - a checked upcast chain used by `checkarg` to downcast safely
//!
//! Inheritance is expressed by composition: a derived class embeds its base
//! and delegates `getattr` and `upcast` to it.

use std::any::{Any, TypeId};
use std::cell::Cell;

use crate::attributes::{root_getattr, Method};
use crate::context::CallContext;
use crate::error::BridgeResult;
use crate::names::short_type_name;
use crate::registry::Handle;

/// Access to `self` as `&dyn Any`
pub trait AsAny: Any {
    /// Upcast to `&dyn Any`
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A host object that can be handed to scripts
pub trait NativeObject: AsAny {
    /// Name reported in errors, `get_type` and default string conversion
    fn type_name(&self) -> String {
        short_type_name::<Self>()
    }

    /// String conversion. `addr` is the identity of the wrapper's native pointer.
    fn tostring(&self, addr: usize) -> String {
        default_tostring(&self.type_name(), addr)
    }

    /// Resolve a method by name.
    ///
    /// Classes look in their own [`AttributeMap`](crate::AttributeMap) and
    /// fall back to their base class; the default is the root resolver.
    fn getattr(&self, name: &str) -> Option<Method> {
        root_getattr(name)
    }

    /// View `self`, or the embedded base of type `target`, as `&dyn Any`.
    ///
    /// Derived classes chain to their base:
    ///
    /// ```ignore
    /// fn upcast(&self, target: TypeId) -> Option<&dyn Any> {
    ///     upcast_self(self.as_any(), target).or_else(|| self.base.upcast(target))
    /// }
    /// ```
    fn upcast(&self, target: TypeId) -> Option<&dyn Any> {
        upcast_self(self.as_any(), target)
    }
}

/// A concrete class scripts can instantiate
pub trait NativeClass: NativeObject + Sized {
    /// Name the constructor is registered under; also the requested type in
    /// downcast errors. Must agree with [`NativeObject::type_name`].
    fn class_name() -> String {
        short_type_name::<Self>()
    }

    /// Build an instance from constructor arguments (position 0 is the first
    /// argument)
    fn construct(ctx: &mut CallContext<'_>) -> BridgeResult<Self>;
}

/// Match `object` against `target` without consulting any base
pub fn upcast_self(object: &dyn Any, target: TypeId) -> Option<&dyn Any> {
    (object.type_id() == target).then_some(object)
}

/// `"<TypeName instance at 0x...>"`
pub fn default_tostring(type_name: &str, addr: usize) -> String {
    format!("<{} instance at {:#x}>", type_name, addr)
}

/// Safe downcast through the upcast chain
pub(crate) fn downcast<T: NativeObject>(object: &dyn NativeObject) -> Option<&T> {
    object
        .upcast(TypeId::of::<T>())
        .and_then(|any| any.downcast_ref::<T>())
}

/// Heap cell a wrapper's native pointer points to
pub struct ObjectCell {
    handle: Cell<Handle>,
    borrows: Cell<usize>,
    object: Box<dyn NativeObject>,
}

impl ObjectCell {
    pub(crate) fn new(object: Box<dyn NativeObject>) -> Self {
        Self {
            handle: Cell::new(Handle::NONE),
            borrows: Cell::new(0),
            object,
        }
    }

    /// Whether a native call currently holds a reference into this cell.
    /// The finalizer refuses to destroy a cell in use.
    pub fn in_use(&self) -> bool {
        self.borrows.get() > 0
    }

    pub(crate) fn acquire(&self) {
        self.borrows.set(self.borrows.get() + 1);
    }

    pub(crate) fn release(&self) {
        self.borrows.set(self.borrows.get().saturating_sub(1));
    }

    /// Registry handle, [`Handle::NONE`] until registration completes
    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    pub(crate) fn set_handle(&self, handle: Handle) {
        self.handle.set(handle);
    }

    /// The wrapped object
    pub fn object(&self) -> &dyn NativeObject {
        self.object.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base;
    impl NativeObject for Base {}

    struct Derived {
        base: Base,
    }

    impl NativeObject for Derived {
        fn type_name(&self) -> String {
            "Special".to_string()
        }

        fn upcast(&self, target: TypeId) -> Option<&dyn Any> {
            upcast_self(self.as_any(), target).or_else(|| self.base.upcast(target))
        }
    }

    struct Unrelated;
    impl NativeObject for Unrelated {}

    #[test]
    fn test_type_names() {
        assert_eq!(Base.type_name(), "Base");
        assert_eq!(Derived { base: Base }.type_name(), "Special");
    }

    #[test]
    fn test_downcast_follows_upcast_chain() {
        let derived = Derived { base: Base };
        let object: &dyn NativeObject = &derived;

        assert!(downcast::<Derived>(object).is_some());
        let base = downcast::<Base>(object).unwrap();
        assert!(std::ptr::eq(base, &derived.base));
        assert!(downcast::<Unrelated>(object).is_none());

        let object: &dyn NativeObject = &Base;
        assert!(downcast::<Derived>(object).is_none());
    }

    #[test]
    fn test_default_tostring() {
        assert_eq!(
            default_tostring("Store", 0x1f40),
            "<Store instance at 0x1f40>"
        );
        assert_eq!(Base.tostring(255), "<Base instance at 0xff>");
    }

    #[test]
    fn test_cell_handle() {
        let cell = ObjectCell::new(Box::new(Base));
        assert_eq!(cell.handle(), Handle::NONE);
        cell.set_handle(Handle::new(4));
        assert_eq!(cell.handle(), Handle::new(4));
        assert_eq!(cell.object().type_name(), "Base");
    }

    #[test]
    fn test_cell_borrows_nest() {
        let cell = ObjectCell::new(Box::new(Base));
        assert!(!cell.in_use());

        cell.acquire();
        cell.acquire();
        cell.release();
        assert!(cell.in_use());

        cell.release();
        assert!(!cell.in_use());
    }
}
