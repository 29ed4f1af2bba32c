use std::fmt;

use crate::entity::EntityIndex;

/// Hard ceiling on live entity slots. Every part store is sized to this.
pub const MAX_ENTITIES: usize = 4096;

/// Number of 64-bit words in a per-entity bitset.
pub const ENTITY_BITSET_WORDS: usize = MAX_ENTITIES / 64;

/// One bit per entity slot. Used for part membership, entity sets and
/// scratch "visited" marks.
#[derive(Clone, PartialEq, Eq)]
pub struct EntityBitset {
    words: [u64; ENTITY_BITSET_WORDS],
}

impl EntityBitset {
    pub const fn new() -> Self {
        Self {
            words: [0; ENTITY_BITSET_WORDS],
        }
    }

    #[inline]
    pub fn set(&mut self, index: EntityIndex) {
        let i = usize::from(index);
        self.words[i / 64] |= 1 << (i % 64);
    }

    #[inline]
    pub fn clear(&mut self, index: EntityIndex) {
        let i = usize::from(index);
        self.words[i / 64] &= !(1 << (i % 64));
    }

    #[inline]
    pub fn test(&self, index: EntityIndex) -> bool {
        let i = usize::from(index);
        self.words[i / 64] & (1 << (i % 64)) != 0
    }

    /// Overwrite this bitset with the contents of `src`.
    pub fn copy_from(&mut self, src: &EntityBitset) {
        self.words.copy_from_slice(&src.words);
    }

    /// The word holding bits `64 * word_idx ..`. Out-of-range words read as empty.
    #[inline]
    pub fn word(&self, word_idx: usize) -> u64 {
        self.words.get(word_idx).copied().unwrap_or(0)
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = EntityIndex> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut word = word;
            std::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let bit = word.trailing_zeros() as usize;
                word &= word - 1;
                Some((word_idx * 64 + bit) as EntityIndex)
            })
        })
    }
}

impl Default for EntityBitset {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityBitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_test_clear() {
        let mut bits = EntityBitset::new();
        bits.set(0);
        bits.set(63);
        bits.set(64);
        bits.set(4095);
        assert!(bits.test(0));
        assert!(bits.test(63));
        assert!(bits.test(64));
        assert!(bits.test(4095));
        assert!(!bits.test(1));
        assert_eq!(bits.count(), 4);

        bits.clear(63);
        assert!(!bits.test(63));
        assert!(bits.test(64));
    }

    #[test]
    fn copy_is_a_snapshot() {
        let mut src = EntityBitset::new();
        src.set(7);
        let mut dst = EntityBitset::new();
        dst.set(9);
        dst.copy_from(&src);
        src.set(8);
        assert!(dst.test(7));
        assert!(!dst.test(8));
        assert!(!dst.test(9));
    }

    #[test]
    fn iter_ascending() {
        let mut bits = EntityBitset::new();
        for i in [200, 3, 64, 65, 1000] {
            bits.set(i);
        }
        let order: Vec<_> = bits.iter().collect();
        assert_eq!(order, vec![3, 64, 65, 200, 1000]);
    }

    #[test]
    fn word_past_end_is_empty() {
        let mut bits = EntityBitset::new();
        bits.set(4095);
        assert_eq!(bits.word(ENTITY_BITSET_WORDS - 1), 1 << 63);
        assert_eq!(bits.word(ENTITY_BITSET_WORDS), 0);
    }
}
