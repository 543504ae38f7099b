//! Re-applying recorded actions.
//!
//! Every action carries its before-state (`from` cell, previous heading,
//! pickup cell). Application checks that before-state against the store
//! and reports any mismatch as [`PlayfieldError::InvariantViolation`]:
//! a log that does not fit the world it is replayed onto is a bug, not a
//! user error.

use gridsim_core::{Action, ActionKind, EntityId, Position};

use crate::bounds::Bounds;
use crate::error::PlayfieldError;
use crate::field::{FieldState, FieldWriter, Playfield};

impl FieldState {
    /// Re-apply one recorded action.
    pub fn apply(&mut self, action: &Action) -> Result<(), PlayfieldError> {
        let who = action.entity;
        let violation =
            |detail: String| PlayfieldError::invariant(format!("action {}: {detail}", action.seq));
        let wrap = |err: PlayfieldError| violation(err.to_string());

        match &action.kind {
            ActionKind::Spawn { entity, at, facing } => {
                if entity.id() != who {
                    return Err(violation(format!(
                        "spawn record names {who} but carries {}",
                        entity.id()
                    )));
                }
                self.place(entity.clone(), *at, *facing).map_err(wrap)
            }
            ActionKind::Despawn { from } => {
                self.expect_at(who, *from).map_err(&violation)?;
                self.remove(who).map(|_| ()).map_err(wrap)
            }
            ActionKind::Move { from, to } | ActionKind::Teleport { from, to } => {
                self.expect_at(who, *from).map_err(&violation)?;
                self.relocate(who, *to).map(|_| ()).map_err(wrap)
            }
            ActionKind::Turn { from, to } => {
                let facing = self.facing_of(who);
                if facing != Some(*from) {
                    return Err(violation(format!(
                        "{who} should face {from} but faces {facing:?}"
                    )));
                }
                self.set_facing(who, *to).map(|_| ()).map_err(wrap)
            }
            ActionKind::Collect { target, at, .. } => {
                self.expect_at(who, *at).map_err(&violation)?;
                self.expect_at(*target, *at).map_err(&violation)?;
                self.carry(who, *target).map(|_| ()).map_err(wrap)
            }
            ActionKind::Drop { target, at, .. } => {
                self.release(who, *target, *at).map_err(wrap)
            }
        }
    }

    fn expect_at(&self, id: EntityId, at: Position) -> Result<(), String> {
        match self.position_of(id) {
            Some(pos) if pos == at => Ok(()),
            other => Err(format!("{id} should be at {at} but is at {other:?}")),
        }
    }
}

impl FieldWriter {
    /// Re-apply one recorded action under the write lock.
    pub fn apply(&self, action: &Action) -> Result<(), PlayfieldError> {
        self.write().apply(action)
    }
}

impl Playfield {
    /// Build a fresh playfield by replaying `actions` in order.
    ///
    /// The result claims none of its entities, so a history can be
    /// rebuilt while its entities still live on the original field. It
    /// is read-only: there is no writer for it.
    pub fn rebuild<'a>(
        bounds: Option<Bounds>,
        actions: impl IntoIterator<Item = &'a Action>,
    ) -> Result<Self, PlayfieldError> {
        let field = Self::unclaimed(bounds);
        {
            let mut state = field.write();
            for action in actions {
                state.apply(action)?;
            }
        }
        Ok(field)
    }
}
