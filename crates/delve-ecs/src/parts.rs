//! Part storage: one dense array plus one membership bitset per part type.
//!
//! The set of part types is declared once, in the `declare_parts!`
//! invocation at the bottom of this file. Storage fields, the `PartType`
//! enum, whole-entity clearing and the record codec are all expanded from
//! that single list.

use delve_core::{
    Attributes, AttributesModifier, BodyPart, Identity, Material, ParticleEmitter, Position,
    TurnSchedule,
};

use crate::bitset::{EntityBitset, MAX_ENTITIES};
use crate::codec::{ByteReader, PartCodec};
use crate::entity::EntityIndex;
use crate::error::{EcsError, Result};

/// Dense storage for one part type, indexed directly by entity slot.
///
/// The value at a slot is only meaningful while that slot's bit is set.
/// `remove` zeroes the value so a later occupant never inherits it.
pub struct PartStore<T> {
    bitset: EntityBitset,
    data: Vec<T>,
}

impl<T: Copy + Default> PartStore<T> {
    pub fn new() -> Self {
        Self {
            bitset: EntityBitset::new(),
            data: vec![T::default(); MAX_ENTITIES],
        }
    }

    #[inline]
    pub fn has(&self, index: EntityIndex) -> bool {
        self.bitset.test(index)
    }

    /// Unchecked read; callers check `has` first.
    #[inline]
    pub fn get(&self, index: EntityIndex) -> T {
        debug_assert!(self.has(index), "read of absent part at {index}");
        self.data[usize::from(index)]
    }

    /// Unchecked mutable access; callers check `has` first.
    #[inline]
    pub fn get_mut(&mut self, index: EntityIndex) -> &mut T {
        debug_assert!(self.has(index), "write to absent part at {index}");
        &mut self.data[usize::from(index)]
    }

    /// Checked read.
    pub fn try_get(&self, index: EntityIndex) -> Option<T> {
        self.has(index).then(|| self.data[usize::from(index)])
    }

    /// Attach the part, overwriting any existing value.
    pub fn add(&mut self, index: EntityIndex, value: T) {
        self.bitset.set(index);
        self.data[usize::from(index)] = value;
    }

    /// Detach the part and zero its slot. Absent parts are left alone.
    pub fn remove(&mut self, index: EntityIndex) {
        self.bitset.clear(index);
        self.data[usize::from(index)] = T::default();
    }

    /// Set the membership bit only; the payload is written separately.
    pub fn enable(&mut self, index: EntityIndex) {
        self.bitset.set(index);
    }

    /// Clear the membership bit only, leaving the payload in place.
    pub fn disable(&mut self, index: EntityIndex) {
        self.bitset.clear(index);
    }

    pub fn bitset(&self) -> &EntityBitset {
        &self.bitset
    }

    #[inline]
    pub fn word(&self, word_idx: usize) -> u64 {
        self.bitset.word(word_idx)
    }
}

impl<T: Copy + Default> Default for PartStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Typeset: one bit per declared part type (not per entity).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartBitset {
    words: [u64; PART_BITSET_WORDS],
}

impl PartBitset {
    pub const fn new() -> Self {
        Self {
            words: [0; PART_BITSET_WORDS],
        }
    }

    pub fn add(&mut self, part: PartType) {
        let i = part as usize;
        self.words[i / 64] |= 1 << (i % 64);
    }

    pub fn remove(&mut self, part: PartType) {
        let i = part as usize;
        self.words[i / 64] &= !(1 << (i % 64));
    }

    pub fn test(&self, part: PartType) -> bool {
        let i = part as usize;
        self.words[i / 64] & (1 << (i % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Part types in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = PartType> + '_ {
        PartType::ALL.into_iter().filter(move |&part| self.test(part))
    }

    /// Encoded size in bytes.
    pub const ENCODED_LEN: usize = PART_BITSET_WORDS * 8;

    pub fn encode(&self, out: &mut Vec<u8>) {
        for word in self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }

    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let mut words = [0u64; PART_BITSET_WORDS];
        for word in &mut words {
            *word = u64::decode(reader.take(8)?)?;
        }
        let bits = Self { words };
        if bits != bits.masked() {
            return Err(EcsError::UnknownPartBits);
        }
        Ok(bits)
    }

    /// Drop any bits past the last declared part type.
    fn masked(&self) -> Self {
        let mut out = Self::new();
        for part in self.iter() {
            out.add(part);
        }
        out
    }
}

impl FromIterator<PartType> for PartBitset {
    fn from_iter<I: IntoIterator<Item = PartType>>(iter: I) -> Self {
        let mut bits = Self::new();
        for part in iter {
            bits.add(part);
        }
        bits
    }
}

macro_rules! declare_parts {
    (
        marks { $($Mark:ident($mark:ident)),* $(,)? }
        parts { $($Part:ident($part:ident): $ty:ty),* $(,)? }
    ) => {
        /// Every declared part type: marks first, then payload parts.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum PartType {
            $($Mark,)*
            $($Part,)*
        }

        impl PartType {
            pub const COUNT: usize = [$(stringify!($Mark),)* $(stringify!($Part),)*].len();

            pub const ALL: [PartType; Self::COUNT] = [$(PartType::$Mark,)* $(PartType::$Part,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(PartType::$Mark => stringify!($Mark),)*
                    $(PartType::$Part => stringify!($Part),)*
                }
            }

            /// Marks carry a bit but no payload.
            pub fn is_mark(&self) -> bool {
                match self {
                    $(PartType::$Mark => true,)*
                    $(PartType::$Part => false,)*
                }
            }

            /// Payload bytes this part contributes to an entity record.
            pub fn encoded_len(&self) -> usize {
                match self {
                    $(PartType::$Mark => 0,)*
                    $(PartType::$Part => <$ty as PartCodec>::SIZE,)*
                }
            }
        }

        /// Storage for every part and mark, indexed by entity slot.
        pub struct PartsState {
            $(pub $mark: EntityBitset,)*
            $(pub $part: PartStore<$ty>,)*
        }

        impl PartsState {
            pub fn new() -> Self {
                Self {
                    $($mark: EntityBitset::new(),)*
                    $($part: PartStore::new(),)*
                }
            }

            /// Membership bitset of any part type.
            pub fn bitset(&self, part: PartType) -> &EntityBitset {
                match part {
                    $(PartType::$Mark => &self.$mark,)*
                    $(PartType::$Part => self.$part.bitset(),)*
                }
            }

            pub fn has(&self, part: PartType, index: EntityIndex) -> bool {
                self.bitset(part).test(index)
            }

            /// Which part types the entity currently carries.
            pub fn typeset(&self, index: EntityIndex) -> PartBitset {
                let mut bits = PartBitset::new();
                $(if self.$mark.test(index) { bits.add(PartType::$Mark); })*
                $(if self.$part.has(index) { bits.add(PartType::$Part); })*
                bits
            }

            /// Remove every part and mark from the entity, zeroing payloads.
            pub(crate) fn clear_entity(&mut self, index: EntityIndex) {
                $(self.$mark.clear(index);)*
                $(self.$part.remove(index);)*
            }

            /// Append the payloads named by `typeset`, in declaration order.
            pub(crate) fn encode_payloads(
                &self,
                index: EntityIndex,
                typeset: &PartBitset,
                out: &mut Vec<u8>,
            ) {
                $(
                    if typeset.test(PartType::$Part) {
                        self.$part.get(index).encode(out);
                    }
                )*
            }

            /// Decode the payloads named by `typeset` and attach them. Nothing
            /// is written unless every payload decodes.
            pub(crate) fn decode_payloads(
                &mut self,
                index: EntityIndex,
                typeset: &PartBitset,
                reader: &mut ByteReader<'_>,
            ) -> Result<()> {
                $(
                    let $part = if typeset.test(PartType::$Part) {
                        Some(<$ty as PartCodec>::decode(reader.take(<$ty as PartCodec>::SIZE)?)?)
                    } else {
                        None
                    };
                )*
                $(
                    if typeset.test(PartType::$Mark) {
                        self.$mark.set(index);
                    }
                )*
                $(
                    if let Some(value) = $part {
                        self.$part.add(index, value);
                    }
                )*
                Ok(())
            }
        }

        impl Default for PartsState {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Words needed for one bit per part type.
pub const PART_BITSET_WORDS: usize = (PartType::COUNT + 63) / 64;

declare_parts! {
    marks {
        IsEquipped(is_equipped),
        IsInventory(is_inventory),
        IsDead(is_dead),
    }
    parts {
        Identity(identity): Identity,
        Parent(parent): EntityIndex,
        TurnSchedule(turn_schedule): TurnSchedule,
        Position(position): Position,
        Material(material): Material,
        Attributes(attributes): Attributes,
        AttributesModifier(attributes_modifier): AttributesModifier,
        Health(health): u8,
        BodyPart(body_part): BodyPart,
        ParticleEmitter(particle_emitter): ParticleEmitter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_remove() {
        let mut parts = PartsState::new();
        parts.position.add(3, Position::new(4, 5));
        assert!(parts.position.has(3));
        assert_eq!(parts.position.get(3), Position::new(4, 5));

        parts.position.get_mut(3).x = 9;
        assert_eq!(parts.position.try_get(3), Some(Position::new(9, 5)));

        parts.position.remove(3);
        assert!(!parts.position.has(3));
        assert_eq!(parts.position.try_get(3), None);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut parts = PartsState::new();
        parts.health.add(1, 50);
        parts.health.remove(2);
        assert!(!parts.health.has(2));
        assert_eq!(parts.health.get(1), 50);
    }

    #[test]
    fn remove_zeroes_payload() {
        let mut parts = PartsState::new();
        parts.turn_schedule.add(
            4,
            TurnSchedule {
                delay: 10,
                queue_index: 7,
            },
        );
        parts.turn_schedule.remove(4);
        parts.turn_schedule.enable(4);
        assert_eq!(parts.turn_schedule.get(4), TurnSchedule::default());
    }

    #[test]
    fn disable_keeps_payload() {
        let mut parts = PartsState::new();
        parts.health.add(2, 30);
        parts.health.disable(2);
        assert!(!parts.health.has(2));
        parts.health.enable(2);
        assert_eq!(parts.health.get(2), 30);
    }

    #[test]
    fn typeset_tracks_marks_and_parts() {
        let mut parts = PartsState::new();
        parts.is_dead.set(6);
        parts.health.add(6, 0);
        let typeset = parts.typeset(6);
        assert!(typeset.test(PartType::IsDead));
        assert!(typeset.test(PartType::Health));
        assert!(!typeset.test(PartType::Position));
        assert_eq!(
            typeset.iter().collect::<Vec<_>>(),
            vec![PartType::IsDead, PartType::Health]
        );
    }

    #[test]
    fn clear_entity_removes_everything() {
        let mut parts = PartsState::new();
        parts.is_inventory.set(8);
        parts.parent.add(8, 2);
        parts.material.add(8, Material::Iron);
        parts.material.add(9, Material::Steel);
        parts.clear_entity(8);
        assert!(parts.typeset(8).is_empty());
        assert!(parts.material.has(9));
    }

    #[test]
    fn part_type_order() {
        assert_eq!(PartType::ALL[0], PartType::IsEquipped);
        assert!(PartType::IsDead.is_mark());
        assert!(!PartType::Parent.is_mark());
        assert_eq!(PartType::ALL.len(), PartType::COUNT);
        assert_eq!(PartType::Position.encoded_len(), 4);
        assert_eq!(PartType::IsDead.encoded_len(), 0);
    }
}
