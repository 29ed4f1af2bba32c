use std::collections::HashMap;

use tracing::debug;

use crate::codec::{self, ByteReader, PartCodec};
use crate::config::EcsConfig;
use crate::entity::{EntityAllocator, EntityHandle, EntityIndex};
use crate::entity_set::EntitySet;
use crate::error::{EcsError, Result};
use crate::parts::{PartType, PartsState};
use crate::query::{Filter, Query};
use crate::turn_queue::TurnQueue;

/// The central container. Owns the entity allocator, every part store and
/// the turn queue. All operations take it explicitly; there is no ambient
/// "active world".
pub struct World {
    entities: EntityAllocator,
    parts: PartsState,
    turn_queue: TurnQueue,
    config: EcsConfig,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(EcsConfig::default())
    }

    /// Create a world. Slot 0 is allocated immediately and never handed
    /// out, so `0` can mean "no entity".
    pub fn with_config(config: EcsConfig) -> Self {
        let capacity = config.capacity().max(1);
        let mut entities = EntityAllocator::new(capacity);
        let reserved = entities.allocate();
        debug_assert_eq!(reserved, Ok(0));
        Self {
            entities,
            parts: PartsState::new(),
            turn_queue: TurnQueue::new(capacity),
            config,
        }
    }

    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    // ---- Entity management ----

    /// Allocate a bare entity slot.
    pub fn alloc(&mut self) -> Result<EntityIndex> {
        let index = self.entities.allocate()?;
        debug!(index, "allocated entity");
        Ok(index)
    }

    /// Allocate a bare entity and return a handle to it.
    pub fn spawn(&mut self) -> Result<EntityHandle> {
        let index = self.alloc()?;
        self.handle(index)
    }

    /// Handle for the slot's current occupant. A free slot (or the reserved
    /// slot 0) has no occupant and yields `StaleHandle`.
    pub fn handle(&self, index: EntityIndex) -> Result<EntityHandle> {
        if index != 0 && self.entities.is_alive(index) {
            return Ok(self.entities.handle(index));
        }
        let generation = self.entities.generation(index).unwrap_or(0);
        Err(EcsError::StaleHandle(EntityHandle::from_raw(index, generation)))
    }

    pub fn resolve(&self, handle: EntityHandle) -> Result<EntityIndex> {
        self.entities.resolve(handle)
    }

    /// Whether the handle still refers to the same entity.
    pub fn is_valid(&self, handle: EntityHandle) -> bool {
        self.entities.is_valid(handle)
    }

    /// A valid handle whose entity has not been marked `IsDead`. Death is a
    /// gameplay state; a dead entity still exists until it is freed.
    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.is_valid(handle) && !self.parts.is_dead.test(handle.index())
    }

    /// High-water mark of allocated slots, including the reserved slot 0.
    pub fn entity_count(&self) -> usize {
        self.entities.count()
    }

    /// Currently allocated entities, excluding the reserved slot 0.
    pub fn live_count(&self) -> usize {
        self.entities.len() - 1
    }

    pub fn allocator(&self) -> &EntityAllocator {
        &self.entities
    }

    // ---- Parts ----

    pub fn parts(&self) -> &PartsState {
        &self.parts
    }

    /// Direct part access. `TurnSchedule` must only change through the
    /// turn queue methods, and entities must only be cleared by freeing.
    pub fn parts_mut(&mut self) -> &mut PartsState {
        &mut self.parts
    }

    // ---- Queries ----

    /// Iterate slots matching a word-level expression over part bitsets.
    ///
    /// # Example
    /// ```ignore
    /// for i in world.query(|p, w| p.position.word(w) & !p.is_dead.word(w)) {
    ///     // ...
    /// }
    /// ```
    pub fn query<F>(&self, expr: F) -> Query<'_, F>
    where
        F: FnMut(&PartsState, usize) -> u64,
    {
        Query::new(&self.parts, self.entities.count(), expr)
    }

    pub fn query_filter<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = EntityIndex> + 'a {
        Query::new(&self.parts, self.entities.count(), move |p, w| filter.word(p, w))
    }

    // ---- Entity sets ----

    /// Add everything parented (transitively) to a member of `set`.
    pub fn expand_descendants(&self, set: &mut EntitySet) {
        set.expand_descendants(&self.parts, self.entities.count(), self.config.max_parent_depth);
    }

    /// Free every entity in `set` together with all of its descendants.
    ///
    /// This is the only path that clears an entity: each member is taken
    /// out of the turn queue, stripped of every part and mark, and its slot
    /// released (generation bumped). Returns how many entities were freed.
    pub fn free_set(&mut self, set: &mut EntitySet) -> Result<usize> {
        self.expand_descendants(set);

        let mut freed = 0;
        for &index in set.as_slice() {
            if index == 0 || !self.entities.is_alive(index) {
                continue;
            }
            self.release_entity(index)?;
            freed += 1;
        }
        debug!(freed, "freed entity set");
        Ok(freed)
    }

    /// Unschedule, strip and release one slot, ignoring its descendants.
    fn release_entity(&mut self, index: EntityIndex) -> Result<()> {
        if self.parts.turn_schedule.has(index) {
            self.turn_queue.remove(&mut self.parts, index)?;
        }
        self.parts.clear_entity(index);
        self.entities.release(index);
        Ok(())
    }

    /// Free one entity and everything it contains.
    pub fn free(&mut self, index: EntityIndex) -> Result<usize> {
        let mut set = EntitySet::new();
        set.add(index);
        self.free_set(&mut set)
    }

    /// Free the entity behind `handle`, if it is still valid.
    pub fn despawn(&mut self, handle: EntityHandle) -> Result<usize> {
        let index = self.resolve(handle)?;
        self.free(index)
    }

    // ---- Ancestry ----

    /// The nearest of `index` and its ancestors that has a `Position`.
    pub fn position_ancestor(&self, index: EntityIndex) -> Option<EntityIndex> {
        self.ancestor_with(index, PartType::Position)
    }

    /// The nearest of `index` and its ancestors that has `Attributes`.
    pub fn attributes_ancestor(&self, index: EntityIndex) -> Option<EntityIndex> {
        self.ancestor_with(index, PartType::Attributes)
    }

    fn ancestor_with(&self, mut index: EntityIndex, part: PartType) -> Option<EntityIndex> {
        for _ in 0..=self.config.max_parent_depth {
            if index == 0 || usize::from(index) >= self.entities.count() {
                return None;
            }
            if self.parts.has(part, index) {
                return Some(index);
            }
            if !self.parts.parent.has(index) {
                return None;
            }
            index = self.parts.parent.get(index);
        }
        None
    }

    // ---- Turn queue ----

    pub fn turn_queue(&self) -> &TurnQueue {
        &self.turn_queue
    }

    /// Put an entity in the turn queue.
    pub fn schedule(&mut self, index: EntityIndex, delay: i16) -> Result<()> {
        let handle = self.handle(index)?;
        self.turn_queue.insert(&mut self.parts, handle, delay)
    }

    pub fn unschedule(&mut self, index: EntityIndex) -> Result<()> {
        self.turn_queue.remove(&mut self.parts, index)
    }

    pub fn add_delay(&mut self, index: EntityIndex, delta: i16) -> Result<()> {
        self.handle(index)?;
        self.turn_queue.add_delay(&mut self.parts, index, delta)
    }

    /// Shift every scheduled delay by `delta`, keeping relative order.
    pub fn shift_delays(&mut self, delta: i16) {
        self.turn_queue.shift_delays(&mut self.parts, delta);
    }

    pub fn peek_turn(&self) -> Result<EntityHandle> {
        self.turn_queue.peek()
    }

    pub fn pop_turn(&mut self) -> Result<EntityHandle> {
        self.turn_queue.pop(&mut self.parts)
    }

    // ---- Records ----

    /// Append the binary record of one entity to `out`.
    pub fn pack_entity(&self, index: EntityIndex, out: &mut Vec<u8>) {
        codec::encode_entity(&self.parts, index, out);
    }

    /// Append every member of `set` as `[source slot: u16 LE][record]`, the
    /// format `unpack_set` reads back.
    pub fn pack_set(&self, set: &EntitySet, out: &mut Vec<u8>) {
        for index in set.iter() {
            index.encode(out);
            self.pack_entity(index, out);
        }
    }

    /// Allocate a new entity and replay a record onto it. Returns the new
    /// slot and the number of bytes consumed.
    ///
    /// Slot references inside the record (`Parent`) are copied as they
    /// were in the source world; they only stay meaningful when the slots
    /// line up. Use `unpack_set` to move whole trees.
    ///
    /// A stored `TurnSchedule` only carries the delay; the entity is
    /// re-inserted into this world's queue rather than trusting the stored
    /// heap slot.
    pub fn unpack_entity(&mut self, bytes: &[u8]) -> Result<(EntityIndex, usize)> {
        let index = self.alloc()?;
        let consumed = match codec::decode_entity(&mut self.parts, index, bytes) {
            Ok(consumed) => consumed,
            Err(err) => {
                self.entities.release(index);
                return Err(err);
            }
        };

        if self.parts.turn_schedule.has(index) {
            let delay = self.parts.turn_schedule.get(index).delay;
            self.parts.turn_schedule.remove(index);
            if let Err(err) = self.schedule(index, delay) {
                self.parts.clear_entity(index);
                self.entities.release(index);
                return Err(err);
            }
        }
        debug!(index, consumed, "unpacked entity");
        Ok((index, consumed))
    }

    /// Unpack everything written by `pack_set` into fresh slots, returned
    /// in record order.
    ///
    /// `Parent` links between unpacked entities are rewritten to their new
    /// slots. Links to entities that were not packed are dropped, so the
    /// roots arrive unparented. On error every entity unpacked so far is
    /// released again.
    pub fn unpack_set(&mut self, bytes: &[u8]) -> Result<Vec<EntityIndex>> {
        let mut unpacked: Vec<(EntityIndex, EntityIndex)> = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            match self.unpack_member(&bytes[offset..]) {
                Ok((source, index, consumed)) => {
                    unpacked.push((source, index));
                    offset += consumed;
                }
                Err(err) => {
                    for &(_, index) in &unpacked {
                        self.release_entity(index)?;
                    }
                    return Err(err);
                }
            }
        }

        let remap: HashMap<EntityIndex, EntityIndex> = unpacked.iter().copied().collect();
        for &(_, index) in &unpacked {
            if !self.parts.parent.has(index) {
                continue;
            }
            match remap.get(&self.parts.parent.get(index)) {
                Some(&parent) => *self.parts.parent.get_mut(index) = parent,
                None => self.parts.parent.remove(index),
            }
        }
        debug!(count = unpacked.len(), "unpacked entity set");
        Ok(unpacked.into_iter().map(|(_, index)| index).collect())
    }

    /// One `[source slot][record]` frame: source slot, new slot, bytes used.
    fn unpack_member(&mut self, bytes: &[u8]) -> Result<(EntityIndex, EntityIndex, usize)> {
        let mut reader = ByteReader::new(bytes);
        let source = EntityIndex::decode(reader.take(EntityIndex::SIZE)?)?;
        let header = reader.position();
        let (index, consumed) = self.unpack_entity(&bytes[header..])?;
        Ok((source, index, header + consumed))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EcsError;
    use delve_core::{Attributes, Position, HEALTH_FULL};

    #[test]
    fn slot_zero_is_reserved() {
        let mut world = World::new();
        assert_eq!(world.alloc().unwrap(), 1);
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.live_count(), 1);
        assert_eq!(world.free(0).unwrap(), 0);
    }

    #[test]
    fn spawn_and_despawn() {
        let mut world = World::new();
        let e = world.spawn().unwrap();
        assert!(world.is_valid(e));
        assert_eq!(world.despawn(e).unwrap(), 1);
        assert!(!world.is_valid(e));
        assert_eq!(world.despawn(e), Err(EcsError::StaleHandle(e)));
    }

    #[test]
    fn generation_reuse_isolation() {
        let mut world = World::new();
        let e1 = world.spawn().unwrap();
        world.parts_mut().position.add(e1.index(), Position::new(1, 0));
        world.despawn(e1).unwrap();

        let e2 = world.spawn().unwrap();
        assert_eq!(e1.index(), e2.index());
        assert_ne!(e1.generation(), e2.generation());
        assert!(!world.is_valid(e1));
        assert!(world.is_valid(e2));
        assert!(!world.parts().position.has(e2.index()));
    }

    #[test]
    fn dead_is_not_freed() {
        let mut world = World::new();
        let e = world.spawn().unwrap();
        world.parts_mut().is_dead.set(e.index());
        assert!(world.is_valid(e));
        assert!(!world.is_alive(e));
    }

    #[test]
    fn capacity_exceeded_is_an_error() {
        let mut world = World::with_config(EcsConfig {
            capacity: 3,
            ..Default::default()
        });
        world.alloc().unwrap();
        world.alloc().unwrap();
        assert_eq!(world.alloc(), Err(EcsError::CapacityExceeded { capacity: 3 }));
    }

    #[test]
    fn free_cascades_to_descendants() {
        let mut world = World::new();
        let bag = world.alloc().unwrap();
        let item = world.alloc().unwrap();
        let gem = world.alloc().unwrap();
        let other = world.alloc().unwrap();
        world.parts_mut().is_inventory.set(bag);
        world.parts_mut().parent.add(item, bag);
        world.parts_mut().parent.add(gem, item);
        world.schedule(gem, 5).unwrap();
        world.schedule(other, 7).unwrap();

        assert_eq!(world.free(bag).unwrap(), 3);
        for e in [bag, item, gem] {
            assert!(world.parts().typeset(e).is_empty());
        }
        assert_eq!(world.turn_queue().len(), 1);
        assert_eq!(world.peek_turn().unwrap().index(), other);
        assert!(world.turn_queue().is_consistent(world.parts()));
        assert_eq!(world.allocator().free_len(), 3);
    }

    #[test]
    fn ancestors() {
        let mut world = World::new();
        let hero = world.alloc().unwrap();
        let bag = world.alloc().unwrap();
        let sword = world.alloc().unwrap();
        world.parts_mut().position.add(hero, Position::new(3, 4));
        world.parts_mut().attributes.add(hero, Attributes::new(5, 5, 5, 5));
        world.parts_mut().parent.add(bag, hero);
        world.parts_mut().parent.add(sword, bag);

        assert_eq!(world.position_ancestor(sword), Some(hero));
        assert_eq!(world.attributes_ancestor(bag), Some(hero));

        let loose = world.alloc().unwrap();
        assert_eq!(world.position_ancestor(loose), None);
    }

    #[test]
    fn ancestor_walk_survives_cycles() {
        let mut world = World::new();
        let a = world.alloc().unwrap();
        let b = world.alloc().unwrap();
        world.parts_mut().parent.add(a, b);
        world.parts_mut().parent.add(b, a);
        assert_eq!(world.position_ancestor(a), None);
    }

    #[test]
    fn query_filter_uses_entity_count() {
        let mut world = World::new();
        let a = world.alloc().unwrap();
        let b = world.alloc().unwrap();
        world.parts_mut().health.add(a, HEALTH_FULL);
        world.parts_mut().health.add(b, 0);
        world.parts_mut().is_dead.set(b);

        let filter = Filter::new()
            .with(PartType::Health)
            .without(PartType::IsDead);
        assert_eq!(world.query_filter(&filter).collect::<Vec<_>>(), vec![a]);
        assert_eq!(
            world.query(|p, w| p.is_dead.word(w)).collect::<Vec<_>>(),
            vec![b]
        );
    }

    #[test]
    fn unpack_reschedules() {
        let mut source = World::new();
        let e = source.alloc().unwrap();
        source.parts_mut().position.add(e, Position::new(2, 2));
        source.schedule(e, 42).unwrap();
        let mut record = Vec::new();
        source.pack_entity(e, &mut record);

        let mut target = World::new();
        let other = target.alloc().unwrap();
        target.schedule(other, 0).unwrap();

        let (unpacked, consumed) = target.unpack_entity(&record).unwrap();
        assert_eq!(consumed, record.len());
        assert_eq!(target.parts().position.get(unpacked), Position::new(2, 2));
        assert_eq!(target.parts().turn_schedule.get(unpacked).delay, 42);
        assert_eq!(target.turn_queue().len(), 2);
        assert!(target.turn_queue().is_consistent(target.parts()));
    }

    #[test]
    fn failed_unpack_releases_slot() {
        let mut world = World::new();
        let before = world.live_count();
        assert!(world.unpack_entity(&[1, 2, 3]).is_err());
        assert_eq!(world.live_count(), before);
    }

    #[test]
    fn freed_slot_cannot_be_scheduled() {
        let mut world = World::new();
        let e = world.alloc().unwrap();
        world.free(e).unwrap();

        assert!(matches!(world.schedule(e, 0), Err(EcsError::StaleHandle(_))));
        assert!(matches!(world.add_delay(e, 5), Err(EcsError::StaleHandle(_))));
        assert!(world.turn_queue().is_empty());
        assert!(!world.parts().turn_schedule.has(e));

        let reused = world.alloc().unwrap();
        assert_eq!(reused, e);
        world.schedule(reused, 5).unwrap();
        assert_eq!(world.parts().turn_schedule.get(reused).delay, 5);
    }

    #[test]
    fn free_slot_has_no_handle() {
        let mut world = World::new();
        let e = world.alloc().unwrap();
        let before = world.handle(e).unwrap();
        world.free(e).unwrap();

        assert_eq!(
            world.handle(e),
            Err(EcsError::StaleHandle(EntityHandle::from_raw(e, 1)))
        );
        assert!(world.handle(0).is_err());
        assert!(world.handle(999).is_err());

        let after = world.spawn().unwrap();
        assert_ne!(before, after);
        assert!(!world.is_valid(before));
    }

    #[test]
    fn failed_set_unpack_releases_everything() {
        let mut source = World::new();
        let a = source.alloc().unwrap();
        let b = source.alloc().unwrap();
        source.parts_mut().position.add(a, Position::new(1, 1));
        source.parts_mut().parent.add(b, a);
        source.schedule(a, 3).unwrap();
        let set: EntitySet = [a, b].into_iter().collect();
        let mut bytes = Vec::new();
        source.pack_set(&set, &mut bytes);
        bytes.pop();

        let mut target = World::new();
        assert!(matches!(
            target.unpack_set(&bytes),
            Err(EcsError::Truncated { .. })
        ));
        assert_eq!(target.live_count(), 0);
        assert!(target.turn_queue().is_empty());
        assert!(target.parts().typeset(1).is_empty());
    }
}
