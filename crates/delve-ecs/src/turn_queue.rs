//! Turn queue: a binary min-heap of entities ordered by their
//! `TurnSchedule::delay`, ties broken by slot index.
//!
//! Each queued entity stores its own heap slot in
//! `TurnSchedule::queue_index`, kept in sync on every swap, so any entity
//! can be removed or re-prioritized in O(log n) rather than only the
//! minimum.

use std::cmp::Ordering;

use delve_core::TurnSchedule;
use tracing::debug;

use crate::bitset::MAX_ENTITIES;
use crate::entity::{EntityHandle, EntityIndex};
use crate::error::{EcsError, Result};
use crate::parts::PartsState;

pub struct TurnQueue {
    entities: Vec<EntityHandle>,
    capacity: usize,
}

impl TurnQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_ENTITIES);
        Self {
            entities: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Heap slots in storage order (not pop order).
    pub fn handles(&self) -> &[EntityHandle] {
        &self.entities
    }

    /// Schedule `handle` to act after `delay`. Adds its `TurnSchedule`.
    pub fn insert(&mut self, parts: &mut PartsState, handle: EntityHandle, delay: i16) -> Result<()> {
        let entity = handle.index();
        if parts.turn_schedule.has(entity) {
            return Err(EcsError::AlreadyScheduled(entity));
        }
        if self.entities.len() >= self.capacity {
            return Err(EcsError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let slot = self.entities.len();
        parts.turn_schedule.add(
            entity,
            TurnSchedule {
                delay,
                queue_index: slot as u16,
            },
        );
        self.entities.push(handle);
        self.sift_up(parts, slot);
        debug!(entity, delay, "scheduled entity");
        Ok(())
    }

    /// Take `entity` out of the queue and drop its `TurnSchedule`.
    pub fn remove(&mut self, parts: &mut PartsState, entity: EntityIndex) -> Result<()> {
        if !parts.turn_schedule.has(entity) {
            return Err(EcsError::NotScheduled(entity));
        }
        let slot = usize::from(parts.turn_schedule.get(entity).queue_index);
        debug_assert!(slot < self.entities.len());
        debug_assert_eq!(self.entities[slot].index(), entity);

        parts.turn_schedule.remove(entity);

        let last = self.entities.len() - 1;
        self.entities.swap_remove(slot);
        if slot < last {
            let moved = self.entities[slot].index();
            parts.turn_schedule.get_mut(moved).queue_index = slot as u16;
            self.reprioritize(parts, slot);
        }
        debug!(entity, "unscheduled entity");
        Ok(())
    }

    /// Add `delta` to the entity's delay and restore heap order.
    pub fn add_delay(&mut self, parts: &mut PartsState, entity: EntityIndex, delta: i16) -> Result<()> {
        if !parts.turn_schedule.has(entity) {
            return Err(EcsError::NotScheduled(entity));
        }
        let schedule = parts.turn_schedule.get_mut(entity);
        schedule.delay = schedule.delay.saturating_add(delta);
        let slot = usize::from(schedule.queue_index);
        self.reprioritize(parts, slot);
        Ok(())
    }

    /// Add `delta` to every queued delay. A uniform shift keeps heap order
    /// unless some delay saturates, in which case the heap is rebuilt.
    pub fn shift_delays(&mut self, parts: &mut PartsState, delta: i16) {
        let mut saturated = false;
        for handle in &self.entities {
            let schedule = parts.turn_schedule.get_mut(handle.index());
            let shifted = schedule.delay.checked_add(delta);
            saturated |= shifted.is_none();
            schedule.delay = shifted.unwrap_or(if delta < 0 { i16::MIN } else { i16::MAX });
        }
        if saturated {
            for slot in (0..self.entities.len() / 2).rev() {
                self.sift_down(parts, slot);
            }
        }
    }

    /// The next entity to act, without removing it.
    pub fn peek(&self) -> Result<EntityHandle> {
        self.entities.first().copied().ok_or(EcsError::QueueEmpty)
    }

    /// Remove and return the next entity to act.
    pub fn pop(&mut self, parts: &mut PartsState) -> Result<EntityHandle> {
        let next = self.peek()?;
        self.remove(parts, next.index())?;
        Ok(next)
    }

    /// Handles in the order they would be popped. Does not mutate the queue.
    pub fn ordered(&self, parts: &PartsState) -> Vec<EntityHandle> {
        let mut sorted = self.entities.clone();
        sorted.sort_by(|a, b| Self::order(parts, a.index(), b.index()));
        sorted
    }

    /// Check the heap order and every back-reference.
    pub fn is_consistent(&self, parts: &PartsState) -> bool {
        self.entities.iter().enumerate().all(|(slot, handle)| {
            let entity = handle.index();
            if !parts.turn_schedule.has(entity)
                || usize::from(parts.turn_schedule.get(entity).queue_index) != slot
            {
                return false;
            }
            slot == 0 || self.compare(parts, slot, (slot - 1) / 2) != Ordering::Less
        })
    }

    /// An entity whose key changed can only violate order in one direction:
    /// try up first, and only go down if it did not move.
    fn reprioritize(&mut self, parts: &mut PartsState, slot: usize) {
        if self.sift_up(parts, slot) == slot {
            self.sift_down(parts, slot);
        }
    }

    fn order(parts: &PartsState, a: EntityIndex, b: EntityIndex) -> Ordering {
        let delay_a = parts.turn_schedule.get(a).delay;
        let delay_b = parts.turn_schedule.get(b).delay;
        delay_a.cmp(&delay_b).then(a.cmp(&b))
    }

    fn compare(&self, parts: &PartsState, a: usize, b: usize) -> Ordering {
        Self::order(parts, self.entities[a].index(), self.entities[b].index())
    }

    fn swap(&mut self, parts: &mut PartsState, a: usize, b: usize) {
        self.entities.swap(a, b);
        parts.turn_schedule.get_mut(self.entities[a].index()).queue_index = a as u16;
        parts.turn_schedule.get_mut(self.entities[b].index()).queue_index = b as u16;
    }

    /// Returns the slot the entity ended up in.
    fn sift_up(&mut self, parts: &mut PartsState, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.compare(parts, slot, parent) != Ordering::Less {
                break;
            }
            self.swap(parts, slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, parts: &mut PartsState, mut slot: usize) {
        let len = self.entities.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;

            if left < len && self.compare(parts, left, smallest) == Ordering::Less {
                smallest = left;
            }
            if right < len && self.compare(parts, right, smallest) == Ordering::Less {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(parts, slot, smallest);
            slot = smallest;
        }
    }
}

impl Default for TurnQueue {
    fn default() -> Self {
        Self::new(MAX_ENTITIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn handle(index: EntityIndex) -> EntityHandle {
        EntityHandle::from_raw(index, 0)
    }

    fn min_entity(parts: &PartsState, queued: &[EntityIndex]) -> EntityIndex {
        *queued
            .iter()
            .min_by_key(|&&e| (parts.turn_schedule.get(e).delay, e))
            .unwrap()
    }

    #[test]
    fn pops_in_delay_order() {
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::default();
        queue.insert(&mut parts, handle(1), 30).unwrap();
        queue.insert(&mut parts, handle(2), 10).unwrap();
        queue.insert(&mut parts, handle(3), 20).unwrap();

        let order: Vec<_> = (0..3).map(|_| queue.pop(&mut parts).unwrap().index()).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(queue.is_empty());
        assert!(!parts.turn_schedule.has(1));
    }

    #[test]
    fn ties_break_on_index() {
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::default();
        for e in [7, 3, 5] {
            queue.insert(&mut parts, handle(e), 0).unwrap();
        }
        assert_eq!(queue.peek().unwrap().index(), 3);
        let order: Vec<_> = queue.ordered(&parts).iter().map(|h| h.index()).collect();
        assert_eq!(order, vec![3, 5, 7]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn add_delay_reorders() {
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::default();
        queue.insert(&mut parts, handle(1), 0).unwrap();
        queue.insert(&mut parts, handle(2), 50).unwrap();
        queue.add_delay(&mut parts, 1, 100).unwrap();
        assert_eq!(queue.peek().unwrap().index(), 2);
        queue.add_delay(&mut parts, 1, -200).unwrap();
        assert_eq!(queue.peek().unwrap().index(), 1);
        assert!(queue.is_consistent(&parts));
    }

    #[test]
    fn remove_from_middle() {
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::default();
        for e in 1..=6 {
            queue.insert(&mut parts, handle(e), i16::from(e as u8) * 10).unwrap();
        }
        queue.remove(&mut parts, 2).unwrap();
        assert!(queue.is_consistent(&parts));
        assert!(!parts.turn_schedule.has(2));
        let order: Vec<_> = queue.ordered(&parts).iter().map(|h| h.index()).collect();
        assert_eq!(order, vec![1, 3, 4, 5, 6]);
    }

    #[test]
    fn shift_keeps_order() {
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::default();
        queue.insert(&mut parts, handle(1), 100).unwrap();
        queue.insert(&mut parts, handle(2), 40).unwrap();
        queue.shift_delays(&mut parts, -100);
        assert_eq!(parts.turn_schedule.get(1).delay, 0);
        assert_eq!(parts.turn_schedule.get(2).delay, -60);
        assert_eq!(queue.peek().unwrap().index(), 2);

        // both saturate to the same delay, so the index tiebreak decides
        queue.shift_delays(&mut parts, i16::MIN);
        assert!(queue.is_consistent(&parts));
        assert_eq!(queue.peek().unwrap().index(), 1);
    }

    #[test]
    fn precondition_errors() {
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::default();
        assert_eq!(queue.peek(), Err(EcsError::QueueEmpty));
        assert_eq!(queue.pop(&mut parts), Err(EcsError::QueueEmpty));
        assert_eq!(queue.remove(&mut parts, 4), Err(EcsError::NotScheduled(4)));
        assert_eq!(queue.add_delay(&mut parts, 4, 1), Err(EcsError::NotScheduled(4)));

        queue.insert(&mut parts, handle(4), 0).unwrap();
        assert_eq!(
            queue.insert(&mut parts, handle(4), 5),
            Err(EcsError::AlreadyScheduled(4))
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::new(1);
        queue.insert(&mut parts, handle(1), 0).unwrap();
        assert_eq!(
            queue.insert(&mut parts, handle(2), 0),
            Err(EcsError::CapacityExceeded { capacity: 1 })
        );
        assert!(!parts.turn_schedule.has(2));
    }

    #[test]
    fn random_interleaving_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut parts = PartsState::new();
        let mut queue = TurnQueue::default();
        let mut queued: Vec<EntityIndex> = Vec::new();

        for _ in 0..2000 {
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let e = rng.gen_range(1..200);
                    if !queued.contains(&e) {
                        queue.insert(&mut parts, handle(e), rng.gen_range(-100..100)).unwrap();
                        queued.push(e);
                    }
                }
                2 if !queued.is_empty() => {
                    let e = queued.swap_remove(rng.gen_range(0..queued.len()));
                    queue.remove(&mut parts, e).unwrap();
                }
                _ if !queued.is_empty() => {
                    let e = queued[rng.gen_range(0..queued.len())];
                    queue.add_delay(&mut parts, e, rng.gen_range(-50..50)).unwrap();
                }
                _ => {}
            }

            assert!(queue.is_consistent(&parts));
            assert_eq!(queue.len(), queued.len());
            if !queued.is_empty() {
                assert_eq!(queue.peek().unwrap().index(), min_entity(&parts, &queued));
            }
        }
    }
}
