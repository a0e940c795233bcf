//! Object arena with generation-checked handles
//!
//! Objects live in a slot vector. Releasing an object empties its slot,
//! bumps the slot generation and puts the index on a free list, so any
//! handle still pointing at the old object fails validation instead of
//! silently aliasing the next occupant.
//!
//! A slot whose generation reaches `u16::MAX` is retired on release rather
//! than recycled. Generations never wrap, so a stale handle can never
//! validate again.

use basis_sdk::{AbiResult, NativeError, ObjHandle, TypeId, ValueSlot};

/// Payload of a heap object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// Instance of a user type with positional fields
    Instance(Vec<ValueSlot>),
    /// Managed string
    Str(String),
    /// Managed list
    List(Vec<ValueSlot>),
    /// Reflective type object
    TypeObject(TypeId),
}

impl ObjectData {
    /// Short name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectData::Instance(_) => "instance",
            ObjectData::Str(_) => "Str",
            ObjectData::List(_) => "List",
            ObjectData::TypeObject(_) => "Type",
        }
    }
}

/// Object instance (arena-allocated)
#[derive(Debug, Clone)]
pub struct HeapObject {
    /// Unique object ID (assigned on allocation, never reused)
    pub object_id: u64,
    /// Runtime type
    pub type_id: TypeId,
    /// Set by `toImmutable` on freezable types
    pub frozen: bool,
    /// Object payload
    pub data: ObjectData,
}

#[derive(Debug)]
struct Slot {
    generation: u16,
    object: Option<HeapObject>,
}

/// Arena of managed objects
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_object_id: u64,
    live: usize,
    retired: usize,
    max_objects: Option<usize>,
}

impl Heap {
    /// Create an arena with reserved capacity and an optional live-object limit
    pub fn new(initial_capacity: usize, max_objects: Option<usize>) -> Self {
        Self {
            slots: Vec::with_capacity(initial_capacity),
            free: Vec::new(),
            next_object_id: 1,
            live: 0,
            retired: 0,
            max_objects,
        }
    }

    /// Allocate an object and return its handle
    pub fn allocate(&mut self, type_id: TypeId, data: ObjectData) -> AbiResult<ObjHandle> {
        if let Some(limit) = self.max_objects {
            if self.live >= limit {
                return Err(NativeError::HeapExhausted { limit });
            }
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| NativeError::AbiError("object arena index overflow".to_string()))?;
                self.slots.push(Slot {
                    generation: 0,
                    object: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.object = Some(HeapObject {
            object_id: self.next_object_id,
            type_id,
            frozen: false,
            data,
        });
        self.next_object_id += 1;
        self.live += 1;
        Ok(ObjHandle::new(index, slot.generation))
    }

    /// Get a live object
    pub fn get(&self, handle: ObjHandle) -> AbiResult<&HeapObject> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.object.as_ref())
            .ok_or(NativeError::InvalidHandle(handle))
    }

    /// Get a live object mutably
    pub fn get_mut(&mut self, handle: ObjHandle) -> AbiResult<&mut HeapObject> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.object.as_mut())
            .ok_or(NativeError::InvalidHandle(handle))
    }

    /// Check whether a handle denotes a live object
    pub fn contains(&self, handle: ObjHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Remove an object from the arena, invalidating every handle to it
    pub fn release(&mut self, handle: ObjHandle) -> AbiResult<HeapObject> {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .ok_or(NativeError::InvalidHandle(handle))?;
        let object = slot.object.take().ok_or(NativeError::InvalidHandle(handle))?;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free.push(handle.index());
            }
            // generation space exhausted: the slot stays empty for good
            None => self.retired += 1,
        }
        self.live -= 1;
        Ok(object)
    }

    /// Number of live objects
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Slots permanently retired after exhausting their generations
    pub fn retired_slots(&self) -> usize {
        self.retired
    }

    /// Total allocations so far
    pub fn allocated_total(&self) -> u64 {
        self.next_object_id - 1
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(0, None)
    }
}
