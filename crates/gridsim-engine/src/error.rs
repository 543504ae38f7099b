//! Error types for entity operations, the clock, programs and the
//! type registry.

use gridsim_core::{EntityId, Position};
use gridsim_inspect::InspectionError;
use gridsim_playfield::PlayfieldError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::program::ProgramId;

/// Why an entity operation was refused.
///
/// A refused operation leaves the playfield and the log untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The movement rules forbid this move, turn or teleport.
    #[error("{entity} cannot move: {reason}")]
    IllegalMove {
        /// The mover.
        entity: EntityId,
        /// Human-readable cause.
        reason: String,
    },
    /// The collect preconditions do not hold.
    #[error("{entity} cannot collect {target}: {reason}")]
    CannotCollect {
        /// The collector.
        entity: EntityId,
        /// The item it tried to pick up.
        target: EntityId,
        /// Human-readable cause.
        reason: String,
    },
    /// The drop preconditions do not hold.
    #[error("{entity} cannot drop {target} at {at}: {reason}")]
    CannotDrop {
        /// The collector.
        entity: EntityId,
        /// The item it tried to put down.
        target: EntityId,
        /// The requested cell.
        at: Position,
        /// Human-readable cause.
        reason: String,
    },
    /// The acting entity is not on the playfield (despawned or carried).
    #[error("{entity} is not on the playfield")]
    EntityNotOnField {
        /// The entity.
        entity: EntityId,
    },
    /// The clock stopped while the operation waited for its turn.
    #[error("{entity} was interrupted while waiting for its turn")]
    Interrupted {
        /// The entity.
        entity: EntityId,
    },
    /// The store reported a broken invariant; the simulation was stopped.
    #[error("playfield fault while {entity} acted: {source}")]
    Fault {
        /// The entity.
        entity: EntityId,
        /// The store error.
        #[source]
        source: PlayfieldError,
    },
}

/// Errors from clock control.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClockError {
    /// `start()` or `step()` while already running.
    #[error("the simulation clock is already running")]
    TimerAlreadyRunning,
    /// A single step did not finish within the configured timeout.
    #[error("tick {tick} did not finish within the step timeout")]
    StepTimedOut {
        /// The tick that was still busy.
        tick: u64,
    },
    /// The clock driver has shut down.
    #[error("the simulation clock has shut down")]
    ShutDown,
}

/// Errors from registering or running programs.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The program declined the entity, or the entity already has one.
    #[error("cannot run program on {entity}: {reason}")]
    CannotRunProgram {
        /// The target entity.
        entity: EntityId,
        /// Human-readable cause.
        reason: String,
    },
    /// The program gave up because the clock stopped.
    #[error("program interrupted")]
    Interrupted,
    /// An entity operation failed and the program propagated it.
    #[error(transparent)]
    Action(#[from] ActionError),
    /// Program-defined failure.
    #[error("program failed: {0}")]
    Failed(String),
}

impl ProgramError {
    /// Whether this error means "the clock stopped", not a real failure.
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            ProgramError::Interrupted | ProgramError::Action(ActionError::Interrupted { .. })
        )
    }
}

/// Errors from the entity type and program registries.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A factory with this name is already registered.
    #[error("an element named '{name}' already exists")]
    ElementExists {
        /// The duplicate name.
        name: String,
    },
    /// Type names must not be empty.
    #[error("element type names must not be empty")]
    EmptyName,
    /// No factory with this name.
    #[error("no element type named '{name}'")]
    UnknownType {
        /// The requested name.
        name: String,
    },
    /// No program registered under this name.
    #[error("no program named '{name}'")]
    UnknownProgram {
        /// The requested name.
        name: String,
    },
}

/// Top-level error returned by [`Simulation`](crate::Simulation) methods.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// See [`ActionError`].
    #[error(transparent)]
    Action(#[from] ActionError),
    /// See [`ClockError`].
    #[error(transparent)]
    Clock(#[from] ClockError),
    /// See [`ProgramError`].
    #[error(transparent)]
    Program(#[from] ProgramError),
    /// See [`RegistryError`].
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Spawning or despawning failed in the store.
    #[error(transparent)]
    Playfield(#[from] PlayfieldError),
    /// See [`InspectionError`].
    #[error(transparent)]
    Inspection(#[from] InspectionError),
    /// Replaying the log did not reproduce the live playfield.
    #[error("replay diverged: {detail}")]
    ReplayDiverged {
        /// First difference found.
        detail: String,
    },
    /// No program with this id.
    #[error("no program {0}")]
    UnknownProgram(ProgramId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_entity() {
        let e = ActionError::IllegalMove {
            entity: EntityId::from_raw(3),
            reason: "blocked".into(),
        };
        assert!(e.to_string().contains("blocked"));

        let p: ProgramError = ActionError::Interrupted {
            entity: EntityId::from_raw(3),
        }
        .into();
        assert!(p.is_interrupt());
        assert!(!ProgramError::Failed("x".into()).is_interrupt());
    }
}
