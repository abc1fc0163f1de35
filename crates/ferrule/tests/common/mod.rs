//! Bound classes shared by the integration tests
//!
//! - `Animal`: a base class with `name` and `speak`
//! - `Dog`: derives from `Animal`, overrides `speak`, adds `learn`
//! - `Rock`: unrelated to both
//! - `Bomb`: a method that panics

#![allow(dead_code)]

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};

use ferrule::{
    root_getattr, upcast_self, AsAny, AttributeMap, Bridge, BridgeOptions, BridgeResult,
    CallContext, Method, NativeClass, NativeObject, RECEIVER,
};
use ferrule_sdk::{NativeFunction, ScriptRuntime, Value};
use ferrule_vm::{Vm, VmOptions};

thread_local! {
    static DROPPED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Names of the animals destroyed on this thread, in order
pub fn dropped() -> Vec<String> {
    DROPPED.with(|d| d.borrow().clone())
}

pub fn reset_dropped() {
    DROPPED.with(|d| d.borrow_mut().clear());
}

pub fn setup() -> (Vm, Bridge) {
    setup_with(VmOptions::default())
}

pub fn setup_with(options: VmOptions) -> (Vm, Bridge) {
    reset_dropped();
    let mut vm = Vm::new(options);
    let bridge = Bridge::init(&mut vm, BridgeOptions::default()).unwrap();
    (vm, bridge)
}

/// Install `outer`, which calls `inner`, which calls `collectgarbage`, so a
/// collection starts two native calls deep
pub fn install_nested_collect(vm: &mut Vm) {
    let inner = NativeFunction::new("inner", |rt, _args| {
        let collect = rt.get_global("collectgarbage");
        rt.call(&collect, &[])
    });
    let outer = NativeFunction::new("outer", |rt, _args| {
        let inner = rt.get_global("inner");
        rt.call(&inner, &[])
    });
    vm.set_global("inner", inner.into());
    vm.set_global("outer", outer.into());
}

// ============================================================================
// Animal
// ============================================================================

pub struct Animal {
    pub name: String,
}

impl Animal {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Drop for Animal {
    fn drop(&mut self) {
        let name = self.name.clone();
        DROPPED.with(|d| d.borrow_mut().push(name));
    }
}

fn animal_name(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let animal = ctx.checkarg::<Animal>(RECEIVER)?;
    Ok(vec![animal.name.as_str().into()])
}

fn animal_speak(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    ctx.checkarg::<Animal>(RECEIVER)?;
    Ok(vec!["...".into()])
}

impl NativeObject for Animal {
    fn getattr(&self, name: &str) -> Option<Method> {
        AttributeMap::new()
            .with("name", animal_name)
            .with("speak", animal_speak)
            .resolve(name, root_getattr)
    }
}

impl NativeClass for Animal {
    fn construct(ctx: &mut CallContext<'_>) -> BridgeResult<Self> {
        Ok(Animal::new(ctx.arg_str(0)?))
    }
}

// ============================================================================
// Dog
// ============================================================================

pub struct Dog {
    pub base: Animal,
    pub tricks: Cell<i64>,
}

impl Dog {
    pub fn new(name: &str) -> Self {
        Self {
            base: Animal::new(name),
            tricks: Cell::new(0),
        }
    }
}

fn dog_speak(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    ctx.checkarg::<Dog>(RECEIVER)?;
    Ok(vec!["woof".into()])
}

fn dog_learn(ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    let dog = ctx.checkarg::<Dog>(RECEIVER)?;
    dog.tricks.set(dog.tricks.get() + 1);
    Ok(vec![Value::Int(dog.tricks.get())])
}

impl NativeObject for Dog {
    fn getattr(&self, name: &str) -> Option<Method> {
        AttributeMap::new()
            .with("speak", dog_speak)
            .with("learn", dog_learn)
            .resolve(name, |name| self.base.getattr(name))
    }

    fn upcast(&self, target: TypeId) -> Option<&dyn Any> {
        upcast_self(self.as_any(), target).or_else(|| self.base.upcast(target))
    }
}

impl NativeClass for Dog {
    fn construct(ctx: &mut CallContext<'_>) -> BridgeResult<Self> {
        Ok(Dog::new(ctx.arg_str(0)?))
    }
}

// ============================================================================
// Rock
// ============================================================================

pub struct Rock;

impl NativeObject for Rock {}

impl NativeClass for Rock {
    fn construct(_ctx: &mut CallContext<'_>) -> BridgeResult<Self> {
        Ok(Rock)
    }
}

// ============================================================================
// Bomb
// ============================================================================

pub struct Bomb;

fn bomb_explode(_ctx: &mut CallContext<'_>) -> BridgeResult<Vec<Value>> {
    panic!("boom");
}

impl NativeObject for Bomb {
    fn tostring(&self, _addr: usize) -> String {
        "<ticking>".to_string()
    }

    fn getattr(&self, name: &str) -> Option<Method> {
        AttributeMap::new()
            .with("explode", bomb_explode)
            .resolve(name, root_getattr)
    }
}
