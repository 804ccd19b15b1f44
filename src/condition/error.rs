//! Errors raised while parsing or evaluating conditions.

use thiserror::Error;

use crate::entity::{EntityId, EntityKind};

/// Errors produced by the condition evaluator.
///
/// Both variants are caller errors and are never retried.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// The condition references a field the entity does not carry.
    #[error("{kind} {entity} has no field `{field}`")]
    UnknownField {
        /// Entity the condition was evaluated against.
        entity: EntityId,
        /// Interface of that entity.
        kind: EntityKind,
        /// Missing field.
        field: String,
    },
    /// The textual condition is malformed.
    #[error("invalid condition at offset {offset}: {message}")]
    Parse {
        /// Byte offset of the offending token.
        offset: usize,
        /// What went wrong.
        message: String,
    },
}
