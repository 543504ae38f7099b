//! Inspection errors.

use gridsim_core::{EntityId, MemberError};
use thiserror::Error;

/// Why an inspection request failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InspectionFailure {
    /// No entity with this id is registered.
    UnknownEntity,
    /// The type declares no member with this name.
    UnknownMember,
    /// The attribute has no setter.
    ReadOnly,
    /// Arguments or value did not match the declaration.
    BadArguments,
    /// The member returned an error.
    MemberFailed,
    /// The member panicked.
    Panicked,
}

/// Failure at an inspection point.
#[derive(Debug, Error)]
pub enum InspectionError {
    /// The named member of `entity` could not be read, written or called.
    #[error("inspection of {entity}.{member} failed: {reason}")]
    InspectionPoint {
        /// Target entity.
        entity: EntityId,
        /// Member name, empty when the entity itself was not found.
        member: String,
        /// Failure category.
        failure: InspectionFailure,
        /// Human-readable detail.
        reason: String,
        /// Error raised by member code, if any.
        #[source]
        source: Option<MemberError>,
    },
}

impl InspectionError {
    pub(crate) fn point(
        entity: EntityId,
        member: &str,
        failure: InspectionFailure,
        reason: impl Into<String>,
    ) -> Self {
        Self::InspectionPoint {
            entity,
            member: member.to_owned(),
            failure,
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn from_member(entity: EntityId, member: &str, err: MemberError) -> Self {
        let failure = match err {
            MemberError::Arity { .. } | MemberError::ArgumentType { .. } => {
                InspectionFailure::BadArguments
            }
            MemberError::Rejected(_) | MemberError::Other(_) => InspectionFailure::MemberFailed,
        };
        Self::InspectionPoint {
            entity,
            member: member.to_owned(),
            failure,
            reason: err.to_string(),
            source: Some(err),
        }
    }

    /// The failure category.
    pub fn failure(&self) -> InspectionFailure {
        match self {
            Self::InspectionPoint { failure, .. } => *failure,
        }
    }
}
