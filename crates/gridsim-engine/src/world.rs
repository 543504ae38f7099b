//! Shared world state behind every [`Actor`](crate::Actor) and the
//! [`Simulation`](crate::Simulation) facade.

use std::sync::{Arc, Mutex, PoisonError};

use gridsim_core::{ActionDraft, ActionKind, Direction, EntityId, Position, SharedEntity};
use gridsim_log::ActionLog;
use gridsim_playfield::{FieldState, FieldWriter, PlayfieldError};

use crate::clock::SimulationClock;
use crate::error::ActionError;
use crate::gate::GatePass;
use crate::simulation::Fault;

pub(crate) struct World {
    /// Only the world writes; everyone else gets the read side.
    pub(crate) playfield: FieldWriter,
    pub(crate) log: Arc<ActionLog>,
    pub(crate) clock: SimulationClock,
    fault: Mutex<Option<Fault>>,
}

impl World {
    pub(crate) fn new(playfield: FieldWriter, log: Arc<ActionLog>, clock: SimulationClock) -> Self {
        Self {
            playfield,
            log,
            clock,
            fault: Mutex::new(None),
        }
    }

    /// Pass the gate (when gated), then validate, mutate and log under
    /// one write lock. `op` returns the action to log, or `None` when it
    /// found nothing to do.
    pub(crate) fn commit<T>(
        &self,
        id: EntityId,
        pass: Option<&GatePass>,
        op: impl FnOnce(&mut FieldState, &SharedEntity) -> Result<(Option<ActionKind>, T), ActionError>,
    ) -> Result<T, ActionError> {
        if let Some(pass) = pass {
            self.clock
                .gate()
                .wait_turn(pass)
                .map_err(|_| ActionError::Interrupted { entity: id })?;
        }
        let result = self.commit_locked(id, op);
        if let Err(ActionError::Fault { source, .. }) = &result {
            self.raise_fault(source.clone(), Some(id));
        }
        result
    }

    fn commit_locked<T>(
        &self,
        id: EntityId,
        op: impl FnOnce(&mut FieldState, &SharedEntity) -> Result<(Option<ActionKind>, T), ActionError>,
    ) -> Result<T, ActionError> {
        let mut field = self.playfield.write();
        let entity = field
            .get(id)
            .ok_or(ActionError::EntityNotOnField { entity: id })?;
        let (kind, value) = op(&mut field, &entity)?;
        if let Some(kind) = kind {
            self.log.append(ActionDraft::new(entity.as_ref(), kind));
        }
        Ok(value)
    }

    /// Register `entity` and log its spawn in one critical section.
    pub(crate) fn spawn(
        &self,
        entity: SharedEntity,
        at: Position,
        facing: Direction,
    ) -> Result<EntityId, PlayfieldError> {
        let id = entity.id();
        let mut field = self.playfield.write();
        field.place(Arc::clone(&entity), at, facing)?;
        let draft = ActionDraft::new(
            entity.as_ref(),
            ActionKind::Spawn {
                entity: Arc::clone(&entity),
                at,
                facing,
            },
        );
        self.log.append(draft);
        Ok(id)
    }

    /// Unregister an on-field entity and log its despawn.
    pub(crate) fn despawn(&self, id: EntityId) -> Result<SharedEntity, PlayfieldError> {
        let mut field = self.playfield.write();
        let (entity, from) = field.remove(id)?;
        self.log
            .append(ActionDraft::new(entity.as_ref(), ActionKind::Despawn { from }));
        Ok(entity)
    }

    /// Record the first fault and stop the clock.
    pub(crate) fn raise_fault(&self, error: PlayfieldError, entity: Option<EntityId>) {
        let tick = self.log.current_tick();
        tracing::error!(%error, ?entity, tick = tick.0, "playfield invariant violated, stopping simulation");
        {
            let mut slot = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(Fault {
                    error,
                    entity,
                    tick,
                });
            }
        }
        self.clock.stop();
    }

    pub(crate) fn last_fault(&self) -> Option<Fault> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Map a store error raised after validation passed.
///
/// Only a vanished actor is an ordinary refusal; anything else means the
/// store and the validation disagree.
pub(crate) fn store_error(entity: EntityId, err: PlayfieldError) -> ActionError {
    match err {
        PlayfieldError::EntityNotOnField { entity: gone } if gone == entity => {
            ActionError::EntityNotOnField { entity }
        }
        source => ActionError::Fault { entity, source },
    }
}
