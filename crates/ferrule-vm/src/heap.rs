//! Heap for collectable objects
//!
//! Tables and userdata live in generation-checked slots. A reference whose
//! generation no longer matches its slot is stale and resolves to nothing.

use std::rc::Rc;

use ferrule_sdk::{Descriptor, NativePtr, ObjRef, ScriptError, ScriptResult, Value};
use rustc_hash::FxHashMap;

/// Hashable form of a table key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Table(ObjRef),
    Userdata(ObjRef),
}

impl Key {
    pub(crate) fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Nil => Err(ScriptError::InvalidKey("nil")),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Int(i) => Ok(Key::Int(*i)),
            Value::Number(n) if n.is_nan() => Err(ScriptError::InvalidKey("NaN")),
            // Integral floats share the integer key
            Value::Number(n) => match value.as_int() {
                Some(i) => Ok(Key::Int(i)),
                None => Ok(Key::Float(n.to_bits())),
            },
            Value::Str(s) => Ok(Key::Str(s.clone())),
            Value::Table(r) => Ok(Key::Table(*r)),
            Value::Userdata(r) => Ok(Key::Userdata(*r)),
            Value::Function(_) => Err(ScriptError::InvalidKey("function")),
        }
    }

    pub(crate) fn obj_ref(&self) -> Option<ObjRef> {
        match self {
            Key::Table(r) | Key::Userdata(r) => Some(*r),
            _ => None,
        }
    }
}

/// A script table
#[derive(Debug, Default)]
pub(crate) struct Table {
    pub(crate) entries: FxHashMap<Key, Value>,
    pub(crate) weak_values: bool,
}

impl Table {
    pub(crate) fn get(&self, key: &Value) -> Value {
        match Key::from_value(key) {
            Ok(key) => self.entries.get(&key).cloned().unwrap_or_default(),
            Err(_) => Value::Nil,
        }
    }

    pub(crate) fn set(&mut self, key: Value, value: Value) -> ScriptResult<()> {
        let key = Key::from_value(&key)?;
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    /// Heap references reachable through this table, honoring weak mode
    pub(crate) fn children(&self, out: &mut Vec<ObjRef>) {
        for (key, value) in &self.entries {
            if let Some(r) = key.obj_ref() {
                out.push(r);
            }
            if !self.weak_values {
                if let Some(r) = value.as_obj_ref() {
                    out.push(r);
                }
            }
        }
    }
}

/// An opaque userdata value
#[derive(Debug)]
pub(crate) struct Userdata {
    pub(crate) ptr: Option<NativePtr>,
    pub(crate) descriptor: Rc<Descriptor>,
    pub(crate) finalized: bool,
}

#[derive(Debug)]
pub(crate) enum Object {
    Table(Table),
    Userdata(Userdata),
}

impl Object {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Object::Table(_) => "table",
            Object::Userdata(_) => "userdata",
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    marked: bool,
    object: Option<Object>,
}

/// Slot allocator for collectable objects
#[derive(Debug, Default)]
pub(crate) struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    max_objects: Option<usize>,
}

impl Heap {
    pub(crate) fn new(max_objects: Option<usize>) -> Self {
        Self {
            max_objects,
            ..Default::default()
        }
    }

    pub(crate) fn alloc(&mut self, object: Object) -> ScriptResult<ObjRef> {
        if let Some(max) = self.max_objects {
            if self.live >= max {
                return Err(ScriptError::OutOfMemory(max));
            }
        }
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.marked = false;
            slot.object = Some(object);
            return Ok(ObjRef::new(index, slot.generation));
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            marked: false,
            object: Some(object),
        });
        Ok(ObjRef::new(index, 1))
    }

    fn slot(&self, r: ObjRef) -> Option<&Slot> {
        self.slots
            .get(r.index() as usize)
            .filter(|slot| slot.generation == r.generation() && slot.object.is_some())
    }

    fn slot_mut(&mut self, r: ObjRef) -> Option<&mut Slot> {
        self.slots
            .get_mut(r.index() as usize)
            .filter(|slot| slot.generation == r.generation() && slot.object.is_some())
    }

    pub(crate) fn get(&self, r: ObjRef) -> Option<&Object> {
        self.slot(r).and_then(|slot| slot.object.as_ref())
    }

    pub(crate) fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        self.slot_mut(r).and_then(|slot| slot.object.as_mut())
    }

    /// Free a slot. The generation bump invalidates every outstanding reference.
    pub(crate) fn free(&mut self, index: u32) -> Option<Object> {
        let slot = self.slots.get_mut(index as usize)?;
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        slot.marked = false;
        self.free.push(index);
        self.live -= 1;
        Some(object)
    }

    /// References to every live object
    pub(crate) fn live_refs(&self) -> Vec<ObjRef> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.object.is_some())
            .map(|(index, slot)| ObjRef::new(index as u32, slot.generation))
            .collect()
    }

    pub(crate) fn is_marked(&self, r: ObjRef) -> bool {
        self.slot(r).is_some_and(|slot| slot.marked)
    }

    /// Mark a live object. Returns `true` if it was not marked before.
    pub(crate) fn mark(&mut self, r: ObjRef) -> bool {
        match self.slot_mut(r) {
            Some(slot) if !slot.marked => {
                slot.marked = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear_marks(&mut self) {
        for slot in &mut self.slots {
            slot.marked = false;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Drop every object without running any hook
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
