//! Playfield error types.

use gridsim_core::{EntityId, Position};
use thiserror::Error;

use crate::bounds::Bounds;

/// Errors from playfield mutations and replay.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlayfieldError {
    /// A solid entity would share a cell with another solid entity.
    #[error("{entity} cannot be placed at {at}: occupied by solid entity {occupant}")]
    OccupiedByIncompatibleEntity {
        /// The entity being placed.
        entity: EntityId,
        /// Target cell.
        at: Position,
        /// The solid entity already there.
        occupant: EntityId,
    },
    /// The entity is already registered (on the field or carried).
    #[error("entity {entity} is already on the playfield")]
    EntityAlreadyOnField {
        /// The duplicate entity.
        entity: EntityId,
    },
    /// The entity already lives on a different playfield.
    #[error("entity {entity} can only be on a single playfield")]
    EntityOnAnotherField {
        /// The entity.
        entity: EntityId,
    },
    /// The entity is not on the field.
    #[error("entity {entity} is not on the playfield")]
    EntityNotOnField {
        /// The missing entity.
        entity: EntityId,
    },
    /// The entity is not in the given collector's inventory.
    #[error("entity {entity} is not carried by {collector}")]
    NotCarried {
        /// The item.
        entity: EntityId,
        /// The collector that was expected to hold it.
        collector: EntityId,
    },
    /// The position lies outside the configured bounds.
    #[error("{at} is outside the {bounds} playfield")]
    OutOfBounds {
        /// Offending position.
        at: Position,
        /// Configured bounds.
        bounds: Bounds,
    },
    /// Recorded history disagrees with the store, or the store's own
    /// bookkeeping is inconsistent.
    #[error("playfield invariant violated: {reason}")]
    InvariantViolation {
        /// What went wrong.
        reason: String,
    },
}

impl PlayfieldError {
    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}
