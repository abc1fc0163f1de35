//! Mark-sweep collector
//!
//! A cycle runs in five steps:
//!
//! 1. mark everything reachable from the roots (weak-valued tables do not
//!    mark their values)
//! 2. clear weak-table entries whose value was not marked
//! 3. separate unmarked userdata that still owe a finalize call, flag them
//!    finalized, and mark them again so they survive this cycle
//! 4. sweep every unmarked object
//! 5. the runtime runs the separated finalize hooks
//!
//! A userdata resurrected in step 3 is reclaimed by a later cycle once it is
//! unreachable again; its hook never runs twice.

use std::time::Duration;

use ferrule_sdk::{NativeFunction, ObjRef, Value};

use crate::heap::{Heap, Object};

/// Collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total objects freed
    pub objects_freed: usize,

    /// Total finalize hooks run
    pub finalized: usize,

    /// Finalize hooks that returned an error
    pub finalizer_errors: usize,

    /// Weak-table entries removed because their value died
    pub weak_entries_cleared: usize,

    /// Total pause time
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,
}

/// Userdata whose finalize hook is due
pub(crate) struct PendingFinalizer {
    pub(crate) object: ObjRef,
    pub(crate) hook: NativeFunction,
}

/// Mark phase: mark every object reachable from `roots`
pub(crate) fn mark(heap: &mut Heap, roots: impl IntoIterator<Item = Value>) {
    let gray: Vec<ObjRef> = roots.into_iter().filter_map(|v| v.as_obj_ref()).collect();
    propagate(heap, gray);
}

fn propagate(heap: &mut Heap, mut gray: Vec<ObjRef>) {
    let mut children = Vec::new();
    while let Some(r) = gray.pop() {
        if !heap.mark(r) {
            continue;
        }
        if let Some(Object::Table(table)) = heap.get(r) {
            table.children(&mut children);
            gray.append(&mut children);
        }
    }
}

/// Remove weak-table entries pointing at unmarked objects.
///
/// Returns the number of entries removed.
pub(crate) fn clear_weak_values(heap: &mut Heap) -> usize {
    let mut dead = Vec::new();
    for table_ref in heap.live_refs() {
        if !heap.is_marked(table_ref) {
            continue;
        }
        let Some(Object::Table(table)) = heap.get(table_ref) else {
            continue;
        };
        if !table.weak_values {
            continue;
        }
        for (key, value) in &table.entries {
            if let Some(r) = value.as_obj_ref() {
                if !heap.is_marked(r) {
                    dead.push((table_ref, key.clone()));
                }
            }
        }
    }

    let cleared = dead.len();
    for (table_ref, key) in dead {
        if let Some(Object::Table(table)) = heap.get_mut(table_ref) {
            table.entries.remove(&key);
        }
    }
    cleared
}

/// Flag unmarked userdata with an outstanding finalize hook and keep them
/// alive for this cycle.
pub(crate) fn separate_finalizable(heap: &mut Heap) -> Vec<PendingFinalizer> {
    let pending = take_finalizable(heap, |heap, r| !heap.is_marked(r));
    let resurrected = pending.iter().map(|p| p.object).collect();
    propagate(heap, resurrected);
    pending
}

/// Flag every userdata with an outstanding finalize hook, reachable or not
pub(crate) fn take_all_finalizable(heap: &mut Heap) -> Vec<PendingFinalizer> {
    take_finalizable(heap, |_, _| true)
}

fn take_finalizable(
    heap: &mut Heap,
    select: impl Fn(&Heap, ObjRef) -> bool,
) -> Vec<PendingFinalizer> {
    let mut pending = Vec::new();
    for r in heap.live_refs() {
        if !select(heap, r) {
            continue;
        }
        if let Some(Object::Userdata(ud)) = heap.get_mut(r) {
            if ud.finalized {
                continue;
            }
            if let Some(hook) = ud.descriptor.finalize().cloned() {
                ud.finalized = true;
                pending.push(PendingFinalizer { object: r, hook });
            }
        }
    }
    pending
}

/// Sweep phase: free unmarked objects. Returns the number freed.
pub(crate) fn sweep(heap: &mut Heap) -> usize {
    let mut freed = 0;
    for r in heap.live_refs() {
        if !heap.is_marked(r) && heap.free(r.index()).is_some() {
            freed += 1;
        }
    }
    freed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{Table, Userdata};
    use ferrule_sdk::{Descriptor, NativePtr};
    use std::ptr::NonNull;
    use std::rc::Rc;

    fn userdata(heap: &mut Heap, descriptor: &Rc<Descriptor>) -> ObjRef {
        heap.alloc(Object::Userdata(Userdata {
            ptr: Some(NativePtr::new(NonNull::<u8>::dangling())),
            descriptor: descriptor.clone(),
            finalized: false,
        }))
        .unwrap()
    }

    fn finalizing_descriptor() -> Rc<Descriptor> {
        Rc::new(
            Descriptor::new("test")
                .with_finalize(NativeFunction::new("gc", |_rt, _args| Ok(vec![]))),
        )
    }

    #[test]
    fn test_unreachable_objects_are_swept() {
        let mut heap = Heap::new(None);
        let kept = heap.alloc(Object::Table(Table::default())).unwrap();
        let _lost = heap.alloc(Object::Table(Table::default())).unwrap();

        mark(&mut heap, [Value::Table(kept)]);
        assert_eq!(sweep(&mut heap), 1);
        assert_eq!(heap.len(), 1);
        assert!(heap.get(kept).is_some());
    }

    #[test]
    fn test_weak_entries_cleared_for_dead_values() {
        let mut heap = Heap::new(None);
        let descriptor = Rc::new(Descriptor::new("plain"));
        let ud = userdata(&mut heap, &descriptor);

        let mut weak = Table {
            weak_values: true,
            ..Default::default()
        };
        weak.set(Value::Int(0), Value::Userdata(ud)).unwrap();
        let weak_ref = heap.alloc(Object::Table(weak)).unwrap();

        mark(&mut heap, [Value::Table(weak_ref)]);
        assert!(!heap.is_marked(ud));
        assert_eq!(clear_weak_values(&mut heap), 1);
        assert_eq!(sweep(&mut heap), 1);

        let Some(Object::Table(weak)) = heap.get(weak_ref) else {
            panic!("weak table was collected");
        };
        assert!(weak.entries.is_empty());
    }

    #[test]
    fn test_finalizable_userdata_survive_one_cycle() {
        let mut heap = Heap::new(None);
        let descriptor = finalizing_descriptor();
        let ud = userdata(&mut heap, &descriptor);

        mark(&mut heap, Vec::<Value>::new());
        let pending = separate_finalizable(&mut heap);
        assert_eq!(pending.len(), 1);
        assert_eq!(sweep(&mut heap), 0);

        // Second cycle: already finalized, so it is simply freed
        heap.clear_marks();
        mark(&mut heap, Vec::<Value>::new());
        assert!(separate_finalizable(&mut heap).is_empty());
        assert_eq!(sweep(&mut heap), 1);
        assert!(heap.get(ud).is_none());
    }

    #[test]
    fn test_take_all_finalizable_runs_once() {
        let mut heap = Heap::new(None);
        let descriptor = finalizing_descriptor();
        userdata(&mut heap, &descriptor);
        userdata(&mut heap, &descriptor);

        assert_eq!(take_all_finalizable(&mut heap).len(), 2);
        assert!(take_all_finalizable(&mut heap).is_empty());
    }
}
