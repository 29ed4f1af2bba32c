use crate::bitset::EntityBitset;
use crate::entity::EntityIndex;
use crate::parts::PartsState;
use crate::query::{Filter, Query};

/// Default bound on parent-chain walks. Longer chains are treated as
/// unreachable, which also stops walks that run into a parent cycle.
pub const MAX_PARENT_DEPTH: usize = 100;

/// A transient set of entities: a bitset for membership tests plus a dense
/// list that iterates in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    bitset: EntityBitset,
    entities: Vec<EntityIndex>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity unless it is already a member.
    pub fn add(&mut self, index: EntityIndex) {
        if self.bitset.test(index) {
            return;
        }
        self.bitset.set(index);
        self.entities.push(index);
    }

    pub fn contains(&self, index: EntityIndex) -> bool {
        self.bitset.test(index)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn as_slice(&self) -> &[EntityIndex] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityIndex> + '_ {
        self.entities.iter().copied()
    }

    pub fn bitset(&self) -> &EntityBitset {
        &self.bitset
    }

    /// Members, in insertion order, for which `pred` holds. Use this over a
    /// global [`Query`] when the candidates are already known to be few.
    pub fn query<'a, P>(&'a self, mut pred: P) -> impl Iterator<Item = EntityIndex> + 'a
    where
        P: FnMut(EntityIndex) -> bool + 'a,
    {
        self.iter().filter(move |&index| pred(index))
    }

    /// Members matching `filter`, in insertion order.
    pub fn query_filter<'a>(
        &'a self,
        parts: &'a PartsState,
        filter: &'a Filter,
    ) -> impl Iterator<Item = EntityIndex> + 'a {
        self.iter().filter(move |&index| filter.matches(parts, index))
    }

    /// Add every entity whose parent chain leads into the set.
    ///
    /// Each slot's chain is resolved at most once: every hop is recorded as
    /// visited, and a later walk that reaches a visited slot outside the set
    /// stops there. Walks longer than `max_depth` hops are abandoned.
    pub fn expand_descendants(&mut self, parts: &PartsState, entity_count: usize, max_depth: usize) {
        let mut visited = EntityBitset::new();
        visited.copy_from(&self.bitset);

        let mut path: Vec<EntityIndex> = Vec::with_capacity(max_depth + 1);
        for index in Query::new(parts, entity_count, |p, w| p.parent.word(w)) {
            if visited.test(index) {
                continue;
            }

            path.clear();
            path.push(index);
            visited.set(index);

            let mut current = parts.parent.get(index);
            let mut found = false;
            for _ in 0..max_depth {
                if usize::from(current) >= entity_count {
                    break;
                }
                if self.contains(current) {
                    found = true;
                    break;
                }
                if visited.test(current) {
                    break;
                }
                path.push(current);
                visited.set(current);

                if !parts.parent.has(current) {
                    break;
                }
                current = parts.parent.get(current);
            }

            if found {
                for &member in &path {
                    self.add(member);
                }
            }
        }
    }
}

impl FromIterator<EntityIndex> for EntitySet {
    fn from_iter<I: IntoIterator<Item = EntityIndex>>(iter: I) -> Self {
        let mut set = Self::new();
        for index in iter {
            set.add(index);
        }
        set
    }
}

impl Extend<EntityIndex> for EntitySet {
    fn extend<I: IntoIterator<Item = EntityIndex>>(&mut self, iter: I) {
        for index in iter {
            self.add(index);
        }
    }
}
