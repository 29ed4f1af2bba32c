use std::fmt;

use tracing::{debug, warn};

use crate::bitset::MAX_ENTITIES;
use crate::error::{EcsError, Result};

/// Raw slot number shared by every part store. Only meaningful for the
/// duration of one operation: the slot may be recycled after a free.
pub type EntityIndex = u16;

/// A generational entity handle. Safe to hold across turns; goes stale the
/// moment its slot is freed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntityHandle {
    pub(crate) generation: u16,
    pub(crate) index: EntityIndex,
}

impl EntityHandle {
    /// Create a handle from raw parts (mainly for testing).
    pub fn from_raw(index: EntityIndex, generation: u16) -> Self {
        Self { index, generation }
    }

    /// The slot index of this entity.
    pub fn index(&self) -> EntityIndex {
        self.index
    }

    /// The generation of this entity (incremented on every free of the slot).
    pub fn generation(&self) -> u16 {
        self.generation
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Allocates and recycles entity slots with generational tracking.
///
/// Slots are handed out from a LIFO free list first, then from the
/// high-water mark. A slot whose generation reaches `u16::MAX` is retired
/// for good, so a generation value is never reused within a slot.
pub struct EntityAllocator {
    generations: Vec<u16>,
    alive: Vec<bool>,
    free_list: Vec<EntityIndex>,
    capacity: usize,
    len: usize,
    retired: usize,
}

impl EntityAllocator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_ENTITIES);
        Self {
            generations: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity),
            capacity,
            len: 0,
            retired: 0,
        }
    }

    /// Allocate a slot, reusing the most recently freed one if available.
    pub fn allocate(&mut self) -> Result<EntityIndex> {
        if let Some(index) = self.free_list.pop() {
            self.alive[usize::from(index)] = true;
            self.len += 1;
            debug!(index, generation = self.generations[usize::from(index)], "reused entity slot");
            return Ok(index);
        }
        if self.generations.len() >= self.capacity {
            return Err(EcsError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let index = self.generations.len() as EntityIndex;
        self.generations.push(0);
        self.alive.push(true);
        self.len += 1;
        Ok(index)
    }

    /// Release a slot: bump its generation and return it to the free list,
    /// or retire it if the generation is exhausted. Returns `false` if the
    /// slot was not allocated.
    pub fn release(&mut self, index: EntityIndex) -> bool {
        let idx = usize::from(index);
        if idx >= self.alive.len() || !self.alive[idx] {
            return false;
        }
        self.alive[idx] = false;
        self.len -= 1;
        self.generations[idx] += 1;
        if self.generations[idx] == u16::MAX {
            self.retired += 1;
            warn!(index, "entity slot retired at maximum generation");
        } else {
            self.free_list.push(index);
        }
        true
    }

    /// Handle for a slot at its current generation.
    pub fn handle(&self, index: EntityIndex) -> EntityHandle {
        debug_assert!(usize::from(index) < self.generations.len());
        EntityHandle {
            index,
            generation: self.generations[usize::from(index)],
        }
    }

    /// Current generation of a slot, if it was ever allocated.
    pub fn generation(&self, index: EntityIndex) -> Option<u16> {
        self.generations.get(usize::from(index)).copied()
    }

    /// Whether `handle` still refers to the slot's current occupant.
    pub fn is_valid(&self, handle: EntityHandle) -> bool {
        self.generations
            .get(usize::from(handle.index))
            .is_some_and(|&generation| generation == handle.generation)
    }

    /// The slot of a handle, or `StaleHandle` if its generation is out of date.
    pub fn resolve(&self, handle: EntityHandle) -> Result<EntityIndex> {
        if self.is_valid(handle) {
            Ok(handle.index)
        } else {
            Err(EcsError::StaleHandle(handle))
        }
    }

    /// Whether a slot is currently allocated.
    pub fn is_alive(&self, index: EntityIndex) -> bool {
        self.alive.get(usize::from(index)).copied().unwrap_or(false)
    }

    /// High-water mark: every allocated slot is below this.
    pub fn count(&self) -> usize {
        self.generations.len()
    }

    /// Number of currently allocated slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots waiting on the free list.
    pub fn free_len(&self) -> usize {
        self.free_list.len()
    }

    /// Slots permanently removed from circulation.
    pub fn retired(&self) -> usize {
        self.retired
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new(MAX_ENTITIES)
    }
}
