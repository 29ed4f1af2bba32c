//! Delve ECS - Entity-component substrate
//!
//! A fixed-capacity ECS without archetypes. Every part type is a dense
//! array indexed by a small entity slot plus a membership bitset, queries
//! are bitwise expressions evaluated 64 slots at a time, and external
//! references go through generation-checked handles.
//!
//! Alongside storage it provides entity sets with descendant expansion
//! (inventory and equipment trees), the free pipeline built on them, and
//! the turn queue that orders entities by their scheduled delay.

mod bitset;
pub mod codec;
mod config;
mod entity;
mod entity_set;
mod error;
mod parts;
mod query;
mod turn_queue;
mod world;

pub use bitset::{EntityBitset, ENTITY_BITSET_WORDS, MAX_ENTITIES};
pub use config::EcsConfig;
pub use entity::{EntityAllocator, EntityHandle, EntityIndex};
pub use entity_set::{EntitySet, MAX_PARENT_DEPTH};
pub use error::{EcsError, Result};
pub use parts::{PartBitset, PartStore, PartType, PartsState, PART_BITSET_WORDS};
pub use query::{Filter, Query};
pub use turn_queue::TurnQueue;
pub use world::World;
