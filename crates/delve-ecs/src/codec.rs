//! Per-entity binary records.
//!
//! A record is the entity's typeset followed by the payload of every
//! present part in declaration order:
//!
//! ```text
//! [typeset: PART_BITSET_WORDS x u64 LE][part_0 bytes]...[part_N bytes]
//! ```
//!
//! Payloads are fixed-size little-endian. Marks contribute a typeset bit
//! only. Framing and compression of whole chunks happen outside this crate.

use delve_core::{
    Attributes, AttributesModifier, BodyPart, Identity, Material, ParticleEmitter, Position,
    TurnSchedule,
};

use crate::entity::EntityIndex;
use crate::error::{EcsError, Result};
use crate::parts::{PartBitset, PartsState};

/// Fixed-size little-endian encoding of a part payload.
pub trait PartCodec: Sized {
    const SIZE: usize;

    fn encode(&self, out: &mut Vec<u8>);

    /// Decode from exactly `SIZE` bytes.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Cursor over a record being decoded.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(EcsError::Truncated {
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }
}

/// Reader over a composite payload, which must be exactly `size` bytes.
fn payload(bytes: &[u8], size: usize) -> Result<ByteReader<'_>> {
    if bytes.len() != size {
        return Err(EcsError::Truncated {
            needed: size,
            available: bytes.len(),
        });
    }
    Ok(ByteReader::new(bytes))
}

macro_rules! impl_codec_int {
    ($($int:ty),*) => {
        $(
            impl PartCodec for $int {
                const SIZE: usize = std::mem::size_of::<$int>();

                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn decode(bytes: &[u8]) -> Result<Self> {
                    let array = bytes.try_into().map_err(|_| EcsError::Truncated {
                        needed: Self::SIZE,
                        available: bytes.len(),
                    })?;
                    Ok(<$int>::from_le_bytes(array))
                }
            }
        )*
    };
}

impl_codec_int!(u8, u16, i16, u64);

impl PartCodec for Position {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut Vec<u8>) {
        self.x.encode(out);
        self.y.encode(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = payload(bytes, Self::SIZE)?;
        let x = u16::decode(reader.take(2)?)?;
        let y = u16::decode(reader.take(2)?)?;
        Ok(Position::new(x, y))
    }
}

impl PartCodec for TurnSchedule {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut Vec<u8>) {
        self.delay.encode(out);
        self.queue_index.encode(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = payload(bytes, Self::SIZE)?;
        Ok(TurnSchedule {
            delay: i16::decode(reader.take(2)?)?,
            queue_index: u16::decode(reader.take(2)?)?,
        })
    }
}

impl PartCodec for Identity {
    const SIZE: usize = 2;

    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        u16::decode(bytes).map(Identity)
    }
}

impl PartCodec for Material {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Material::from_u8(u8::decode(bytes)?).ok_or(EcsError::InvalidPartValue("Material"))
    }
}

impl PartCodec for Attributes {
    const SIZE: usize = 2;

    fn encode(&self, out: &mut Vec<u8>) {
        self.to_bits().encode(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        u16::decode(bytes).map(Attributes::from_bits)
    }
}

impl PartCodec for AttributesModifier {
    const SIZE: usize = 2;

    fn encode(&self, out: &mut Vec<u8>) {
        self.to_bits().encode(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        u16::decode(bytes).map(AttributesModifier::from_bits)
    }
}

impl PartCodec for BodyPart {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.to_bits());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        BodyPart::from_bits(u8::decode(bytes)?).ok_or(EcsError::InvalidPartValue("BodyPart"))
    }
}

impl PartCodec for ParticleEmitter {
    const SIZE: usize = 2;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.particle_type);
        out.push(self.countdown_ticks);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = payload(bytes, Self::SIZE)?;
        Ok(ParticleEmitter {
            particle_type: u8::decode(reader.take(1)?)?,
            countdown_ticks: u8::decode(reader.take(1)?)?,
        })
    }
}

/// Append the record for `index` to `out`.
pub fn encode_entity(parts: &PartsState, index: EntityIndex, out: &mut Vec<u8>) {
    let typeset = parts.typeset(index);
    typeset.encode(out);
    parts.encode_payloads(index, &typeset, out);
}

/// Replay a record onto the (empty) slot `index`, returning the bytes
/// consumed. On error nothing has been attached.
pub fn decode_entity(parts: &mut PartsState, index: EntityIndex, bytes: &[u8]) -> Result<usize> {
    let mut reader = ByteReader::new(bytes);
    let typeset = PartBitset::decode(&mut reader)?;
    parts.decode_payloads(index, &typeset, &mut reader)?;
    Ok(reader.position())
}

/// Encoded length of a record with the given typeset.
pub fn encoded_len(typeset: &PartBitset) -> usize {
    PartBitset::ENCODED_LEN + typeset.iter().map(|part| part.encoded_len()).sum::<usize>()
}
