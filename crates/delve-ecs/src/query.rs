use std::iter::FusedIterator;

use crate::bitset::ENTITY_BITSET_WORDS;
use crate::entity::EntityIndex;
use crate::parts::{PartBitset, PartType, PartsState};

/// Lazy, ascending scan over every entity slot whose bits satisfy a
/// word-level boolean expression.
///
/// `expr` is evaluated once per 64-slot word and must combine the part
/// bitsets' words for that index, e.g.
/// `|p, w| p.position.word(w) & !p.is_dead.word(w)`. Set bits are then
/// enumerated lowest first.
///
/// Words already scanned are not revisited, but the expression reads
/// later words lazily: do not change part bits of slots that have not been
/// yielded yet while iterating. Collect first if that is needed.
pub struct Query<'w, F> {
    parts: &'w PartsState,
    expr: F,
    word: u64,
    word_idx: usize,
    next_word: usize,
    last_word: usize,
}

impl<'w, F> Query<'w, F>
where
    F: FnMut(&PartsState, usize) -> u64,
{
    /// Scan slots `0..entity_count`.
    pub fn new(parts: &'w PartsState, entity_count: usize, expr: F) -> Self {
        Self {
            parts,
            expr,
            word: 0,
            word_idx: 0,
            next_word: 0,
            last_word: (entity_count / 64).min(ENTITY_BITSET_WORDS - 1),
        }
    }
}

impl<'w, F> Iterator for Query<'w, F>
where
    F: FnMut(&PartsState, usize) -> u64,
{
    type Item = EntityIndex;

    fn next(&mut self) -> Option<EntityIndex> {
        loop {
            if self.word != 0 {
                let bit = self.word.trailing_zeros() as usize;
                self.word &= self.word - 1;
                return Some((self.word_idx * 64 + bit) as EntityIndex);
            }
            if self.next_word > self.last_word {
                return None;
            }
            self.word_idx = self.next_word;
            self.next_word += 1;
            self.word = (self.expr)(self.parts, self.word_idx);
        }
    }
}

impl<'w, F> FusedIterator for Query<'w, F> where F: FnMut(&PartsState, usize) -> u64 {}

/// Declarative form of a query expression: all of `with`, none of
/// `without`, and at least one of `any` when that group is non-empty.
///
/// A filter with an empty `with` group matches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    with: PartBitset,
    without: PartBitset,
    any: PartBitset,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, part: PartType) -> Self {
        self.with.add(part);
        self
    }

    pub fn without(mut self, part: PartType) -> Self {
        self.without.add(part);
        self
    }

    pub fn any(mut self, part: PartType) -> Self {
        self.any.add(part);
        self
    }

    /// Evaluate the filter over one 64-slot word.
    pub fn word(&self, parts: &PartsState, word_idx: usize) -> u64 {
        if self.with.is_empty() {
            return 0;
        }
        let mut word = !0u64;
        for part in self.with.iter() {
            word &= parts.bitset(part).word(word_idx);
        }
        for part in self.without.iter() {
            word &= !parts.bitset(part).word(word_idx);
        }
        if !self.any.is_empty() {
            let mut any = 0u64;
            for part in self.any.iter() {
                any |= parts.bitset(part).word(word_idx);
            }
            word &= any;
        }
        word
    }

    /// Evaluate the filter for a single slot.
    pub fn matches(&self, parts: &PartsState, index: EntityIndex) -> bool {
        let bit = usize::from(index) % 64;
        self.word(parts, usize::from(index) / 64) & (1 << bit) != 0
    }
}
