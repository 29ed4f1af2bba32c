//! Core types carried as entity parts

use serde::{Deserialize, Serialize};

/// Health value of a freshly spawned creature
pub const HEALTH_FULL: u8 = 100;

/// Starting value for each base attribute
pub const ATTRIBUTE_DEFAULT: u8 = 2;

/// Attributes are stored in four bits each
pub const ATTRIBUTE_MAX: u8 = 15;

/// Tile coordinate on the map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

impl Position {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Step one tile in `dir`, returning `None` when that leaves a
    /// `width` x `height` map.
    pub fn step(&self, dir: Direction, width: u16, height: u16) -> Option<Position> {
        let x = i32::from(self.x) + dir.dx();
        let y = i32::from(self.y) + dir.dy();
        if x < 0 || y < 0 || x >= i32::from(width) || y >= i32::from(height) {
            return None;
        }
        Some(Position::new(x as u16, y as u16))
    }

    /// Chebyshev distance (diagonal moves cost the same as orthogonal ones)
    pub fn distance(&self, other: &Position) -> u16 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// One of the eight compass directions, clockwise from north
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Direction from a value in `0..8`; larger values wrap.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn dx(&self) -> i32 {
        match self {
            Direction::North | Direction::South => 0,
            Direction::NorthEast | Direction::East | Direction::SouthEast => 1,
            Direction::SouthWest | Direction::West | Direction::NorthWest => -1,
        }
    }

    pub fn dy(&self) -> i32 {
        match self {
            Direction::East | Direction::West => 0,
            Direction::SouthEast | Direction::South | Direction::SouthWest => 1,
            Direction::NorthWest | Direction::North | Direction::NorthEast => -1,
        }
    }

    pub fn opposite(&self) -> Direction {
        Self::from_index(*self as usize + 4)
    }
}

/// Base attributes of a character, each in `0..=ATTRIBUTE_MAX`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub str: u8,
    pub dex: u8,
    pub wil: u8,
    pub con: u8,
}

impl Attributes {
    pub fn new(str: u8, dex: u8, wil: u8, con: u8) -> Self {
        Self {
            str: str.min(ATTRIBUTE_MAX),
            dex: dex.min(ATTRIBUTE_MAX),
            wil: wil.min(ATTRIBUTE_MAX),
            con: con.min(ATTRIBUTE_MAX),
        }
    }

    /// Pack into four nibbles: str, dex, wil, con from the low end.
    pub fn to_bits(&self) -> u16 {
        u16::from(self.str & 0xF)
            | u16::from(self.dex & 0xF) << 4
            | u16::from(self.wil & 0xF) << 8
            | u16::from(self.con & 0xF) << 12
    }

    pub fn from_bits(bits: u16) -> Self {
        Self {
            str: (bits & 0xF) as u8,
            dex: (bits >> 4 & 0xF) as u8,
            wil: (bits >> 8 & 0xF) as u8,
            con: (bits >> 12 & 0xF) as u8,
        }
    }

    /// Apply an equipment/buff modifier, saturating at the attribute range.
    pub fn apply(&self, modifier: &AttributesModifier) -> Self {
        let add = |base: u8, delta: i8| -> u8 {
            (i16::from(base) + i16::from(delta)).clamp(0, i16::from(ATTRIBUTE_MAX)) as u8
        };
        Self {
            str: add(self.str, modifier.str),
            dex: add(self.dex, modifier.dex),
            wil: add(self.wil, modifier.wil),
            con: add(self.con, modifier.con),
        }
    }
}

/// Signed attribute modifier carried by equipment or buffs, each in `-8..=7`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesModifier {
    pub str: i8,
    pub dex: i8,
    pub wil: i8,
    pub con: i8,
}

impl AttributesModifier {
    pub fn new(str: i8, dex: i8, wil: i8, con: i8) -> Self {
        Self {
            str: str.clamp(-8, 7),
            dex: dex.clamp(-8, 7),
            wil: wil.clamp(-8, 7),
            con: con.clamp(-8, 7),
        }
    }

    pub fn to_bits(&self) -> u16 {
        let nibble = |v: i8| u16::from(v as u8 & 0xF);
        nibble(self.str) | nibble(self.dex) << 4 | nibble(self.wil) << 8 | nibble(self.con) << 12
    }

    pub fn from_bits(bits: u16) -> Self {
        // sign-extend each nibble
        let signed = |shift: u16| (((bits >> shift & 0xF) as u8) << 4) as i8 >> 4;
        Self {
            str: signed(0),
            dex: signed(4),
            wil: signed(8),
            con: signed(12),
        }
    }
}

/// What an item is made of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Material {
    #[default]
    Wood,
    Leather,
    Bronze,
    Iron,
    Steel,
    Mithril,
    Adamantine,
}

impl Material {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Material::Wood,
            1 => Material::Leather,
            2 => Material::Bronze,
            3 => Material::Iron,
            4 => Material::Steel,
            5 => Material::Mithril,
            6 => Material::Adamantine,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BodyPartKind {
    #[default]
    Head,
    Torso,
    Arm,
    Leg,
    Wing,
    Tentacle,
    Tail,
}

impl BodyPartKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => BodyPartKind::Head,
            1 => BodyPartKind::Torso,
            2 => BodyPartKind::Arm,
            3 => BodyPartKind::Leg,
            4 => BodyPartKind::Wing,
            5 => BodyPartKind::Tentacle,
            6 => BodyPartKind::Tail,
            _ => return None,
        })
    }
}

/// A body part entity. `index` tells apart parts of the same kind (left/right arm).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPart {
    pub kind: BodyPartKind,
    /// Stored in four bits, so `0..=BODY_PART_INDEX_MAX`
    pub index: u8,
}

/// Largest body part `index` that survives packing
pub const BODY_PART_INDEX_MAX: u8 = 15;

impl BodyPart {
    pub fn new(kind: BodyPartKind, index: u8) -> Self {
        Self {
            kind,
            index: index.min(BODY_PART_INDEX_MAX),
        }
    }

    pub fn to_bits(&self) -> u8 {
        (self.kind as u8 & 0xF) | (self.index & 0xF) << 4
    }

    /// `None` if the low nibble is not a known kind.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(Self {
            kind: BodyPartKind::from_u8(bits & 0xF)?,
            index: bits >> 4,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleEmitter {
    pub particle_type: u8,
    /// Ticks until the next spawn; 0 disables the emitter
    pub countdown_ticks: u8,
}

/// Reference into the table of named, unique entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub u16);

impl Identity {
    pub const NONE: Identity = Identity(0);
    pub const EXCALIBUR: Identity = Identity(1);
    pub const GROG: Identity = Identity(2);

    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Identity::EXCALIBUR => Some("Excalibur"),
            Identity::GROG => Some("Grog"),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&'static str> {
        match *self {
            Identity::EXCALIBUR => Some("King Arthur's legendary sword"),
            Identity::GROG => Some("A burly barbarian"),
            _ => None,
        }
    }
}

/// Turn queue bookkeeping for a scheduled entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSchedule {
    /// Time until the entity acts; lower acts first
    pub delay: i16,
    /// The entity's own slot in the turn queue heap
    pub queue_index: u16,
}
