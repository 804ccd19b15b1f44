//! Errors raised by [`super::ObjectBus`] operations.

use thiserror::Error;

use crate::entity::EntityId;

/// Errors returned by the object bus.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// No entity with this id is published.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    /// An entity with this id is already published.
    #[error("entity {0} already exists")]
    AlreadyExists(EntityId),
}
