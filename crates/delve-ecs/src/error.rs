use crate::entity::{EntityHandle, EntityIndex};

/// Errors surfaced at the substrate's public boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    #[error("entity capacity exceeded ({capacity} slots)")]
    CapacityExceeded { capacity: usize },

    #[error("stale entity handle {0}")]
    StaleHandle(EntityHandle),

    #[error("entity {0} is already in the turn queue")]
    AlreadyScheduled(EntityIndex),

    #[error("entity {0} is not in the turn queue")]
    NotScheduled(EntityIndex),

    #[error("turn queue is empty")]
    QueueEmpty,

    #[error("entity record truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("entity record names part types that are not declared")]
    UnknownPartBits,

    #[error("invalid {0} value in entity record")]
    InvalidPartValue(&'static str),
}

pub type Result<T> = std::result::Result<T, EcsError>;
