//! Delve Core - Value types shared across the Delve crates
//!
//! This crate provides the plain data carried by entities:
//! - Tile positions and directions
//! - Character attributes and equipment modifiers
//! - Item/body descriptors (material, body parts, identities)
//! - Turn scheduling state

pub mod types;

pub use types::{
    Attributes, AttributesModifier, BodyPart, BodyPartKind, Direction, Identity, Material,
    ParticleEmitter, Position, TurnSchedule, ATTRIBUTE_DEFAULT, ATTRIBUTE_MAX,
    BODY_PART_INDEX_MAX, HEALTH_FULL,
};
