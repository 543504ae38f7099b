//! Entity operations.
//!
//! An [`Actor`] is the handle an entity acts through: a reference to the
//! world plus the entity's id. Handles given to programs are *gated*:
//! every mutating operation first waits for the program's turn at the
//! [`TickGate`](crate::TickGate), so a program performs at most one
//! operation per tick. Handles from [`Simulation::actor`] and
//! [`Simulation::spawn`] are ungated and act immediately, which is what
//! setup code and tests want.
//!
//! After the gate, each operation validates and commits under the
//! playfield write lock and appends its action inside the same critical
//! section. A refused operation returns an [`ActionError`] and logs
//! nothing.
//!
//! [`Simulation::actor`]: crate::Simulation::actor
//! [`Simulation::spawn`]: crate::Simulation::spawn

use std::fmt;
use std::sync::Arc;

use gridsim_core::{ActionKind, Direction, EntityId, Position, SharedEntity};
use gridsim_playfield::FieldState;

use crate::error::ActionError;
use crate::gate::GatePass;
use crate::world::{store_error, World};

/// Handle through which one entity acts on the world.
pub struct Actor {
    world: Arc<World>,
    id: EntityId,
    pass: Option<GatePass>,
}

fn illegal(entity: EntityId, reason: impl Into<String>) -> ActionError {
    ActionError::IllegalMove {
        entity,
        reason: reason.into(),
    }
}

fn cannot_collect(entity: EntityId, target: EntityId, reason: impl Into<String>) -> ActionError {
    ActionError::CannotCollect {
        entity,
        target,
        reason: reason.into(),
    }
}

fn cannot_drop(
    entity: EntityId,
    target: EntityId,
    at: Position,
    reason: impl Into<String>,
) -> ActionError {
    ActionError::CannotDrop {
        entity,
        target,
        at,
        reason: reason.into(),
    }
}

/// The first currently-solid entity in `at` other than `mover`.
fn blocker(field: &FieldState, mover: EntityId, at: Position) -> Option<SharedEntity> {
    field
        .entities_at(at)
        .into_iter()
        .find(|e| e.id() != mover && e.is_solid_now())
}

/// Movement preconditions: movable, on the field, destination in bounds
/// and not blocked. Returns the current cell and the destination.
fn check_move(
    field: &FieldState,
    entity: &SharedEntity,
    to: impl FnOnce(Position) -> Option<Position>,
) -> Result<(Position, Position), ActionError> {
    let id = entity.id();
    if entity.as_movable().is_none() {
        return Err(illegal(id, format!("{} is not movable", entity.label())));
    }
    let from = field
        .position_of(id)
        .ok_or(ActionError::EntityNotOnField { entity: id })?;
    let Some(to) = to(from) else {
        return Err(illegal(id, format!("{from} is at the edge of the coordinate space")));
    };
    if !field.in_bounds(to) {
        return Err(illegal(id, format!("{to} is outside the playfield")));
    }
    if let Some(solid) = blocker(field, id, to) {
        return Err(illegal(id, format!("{} blocks {to}", solid.label())));
    }
    Ok((from, to))
}

/// Validate and carry out a pickup of `target`.
fn collect_in(
    field: &mut FieldState,
    entity: &SharedEntity,
    target: EntityId,
) -> Result<ActionKind, ActionError> {
    let id = entity.id();
    let Some(collector) = entity.as_collector() else {
        return Err(cannot_collect(id, target, "not a collector"));
    };
    if target == id {
        return Err(cannot_collect(id, target, "cannot collect itself"));
    }
    let here = field
        .position_of(id)
        .ok_or(ActionError::EntityNotOnField { entity: id })?;
    let Some(item) = field.get(target) else {
        return Err(cannot_collect(id, target, "no such entity"));
    };
    if !item.is_collectable_now() {
        return Err(cannot_collect(id, target, format!("{} is not collectable", item.label())));
    }
    match field.position_of(target) {
        Some(at) if at == here => {}
        Some(at) => {
            return Err(cannot_collect(id, target, format!("{} is at {at}, not {here}", item.label())))
        }
        None => return Err(cannot_collect(id, target, format!("{} is not on the playfield", item.label()))),
    }
    if !collector.can_carry(item.as_ref()) {
        return Err(cannot_collect(id, target, format!("cannot carry {}", item.label())));
    }
    let at = field.carry(id, target).map_err(|e| store_error(id, e))?;
    Ok(ActionKind::Collect {
        target,
        target_type: item.type_name(),
        at,
    })
}

/// Validate and carry out a drop of `target` at `at`, or in the
/// carrier's own cell when `at` is `None`.
fn drop_in(
    field: &mut FieldState,
    entity: &SharedEntity,
    target: EntityId,
    at: Option<Position>,
) -> Result<ActionKind, ActionError> {
    let id = entity.id();
    let here = field
        .position_of(id)
        .ok_or(ActionError::EntityNotOnField { entity: id })?;
    let at = at.unwrap_or(here);
    if entity.as_collector().is_none() {
        return Err(cannot_drop(id, target, at, "not a collector"));
    }
    if at != here && !here.is_adjacent_to(at) {
        return Err(cannot_drop(id, target, at, format!("{at} is not next to {here}")));
    }
    if field.carrier_of(target) != Some(id) {
        return Err(cannot_drop(id, target, at, "not carried"));
    }
    if !field.in_bounds(at) {
        return Err(cannot_drop(id, target, at, "outside the playfield"));
    }
    let Some(item) = field.get(target) else {
        return Err(cannot_drop(id, target, at, "no such entity"));
    };
    if item.is_solid_now() {
        if let Some(solid) = blocker(field, target, at) {
            return Err(cannot_drop(id, target, at, format!("{} blocks the cell", solid.label())));
        }
    }
    field
        .release(id, target, at)
        .map_err(|e| store_error(id, e))?;
    Ok(ActionKind::Drop {
        target,
        target_type: item.type_name(),
        at,
    })
}

impl Actor {
    pub(crate) fn new(world: Arc<World>, id: EntityId, pass: Option<GatePass>) -> Self {
        Self { world, id, pass }
    }

    fn commit<T>(
        &self,
        op: impl FnOnce(&mut FieldState, &SharedEntity) -> Result<(ActionKind, T), ActionError>,
    ) -> Result<T, ActionError> {
        self.world.commit(self.id, self.pass.as_ref(), |field, entity| {
            op(field, entity).map(|(kind, value)| (Some(kind), value))
        })
    }

    /// Like `commit`, but `op` may decide under the lock that there is
    /// nothing to do.
    fn commit_if<T>(
        &self,
        op: impl FnOnce(&mut FieldState, &SharedEntity) -> Result<(Option<ActionKind>, T), ActionError>,
    ) -> Result<T, ActionError> {
        self.world.commit(self.id, self.pass.as_ref(), op)
    }

    // ── Queries ─────────────────────────────────────────────────

    /// The entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether operations wait for a tick.
    pub fn is_gated(&self) -> bool {
        self.pass.is_some()
    }

    /// The entity, while registered.
    pub fn entity(&self) -> Option<SharedEntity> {
        self.world.playfield.get(self.id)
    }

    /// Current cell; `None` when despawned or carried.
    pub fn position(&self) -> Option<Position> {
        self.world.playfield.position_of(self.id)
    }

    /// Current heading.
    pub fn facing(&self) -> Option<Direction> {
        self.world.playfield.facing_of(self.id)
    }

    /// Whether a step forward would currently succeed.
    pub fn can_move(&self) -> bool {
        match self.facing() {
            Some(facing) => self.can_move_in(facing),
            None => false,
        }
    }

    /// Whether a step in `direction` would currently succeed.
    pub fn can_move_in(&self, direction: Direction) -> bool {
        let field = self.world.playfield.read();
        field
            .get(self.id)
            .is_some_and(|e| check_move(&field, &e, |p| p.adjacent(direction)).is_ok())
    }

    /// Items this entity carries, in pickup order.
    pub fn inventory(&self) -> Vec<SharedEntity> {
        self.world.playfield.inventory_of(self.id)
    }

    /// Collectable entities sharing this entity's cell.
    pub fn collectable_here(&self) -> Vec<SharedEntity> {
        let field = self.world.playfield.read();
        let Some(here) = field.position_of(self.id) else {
            return Vec::new();
        };
        field
            .entities_at(here)
            .into_iter()
            .filter(|e| e.id() != self.id && e.is_collectable_now())
            .collect()
    }

    // ── Movement ────────────────────────────────────────────────

    /// Step one cell in `direction` without turning.
    pub fn move_in(&self, direction: Direction) -> Result<(), ActionError> {
        self.commit(|field, entity| {
            let id = entity.id();
            let (from, to) = check_move(field, entity, |p| p.adjacent(direction))?;
            field.relocate(id, to).map_err(|e| store_error(id, e))?;
            Ok((ActionKind::Move { from, to }, ()))
        })
    }

    /// Step one cell in the facing direction.
    pub fn move_forward(&self) -> Result<(), ActionError> {
        self.commit(|field, entity| {
            let id = entity.id();
            let facing = field
                .facing_of(id)
                .ok_or(ActionError::EntityNotOnField { entity: id })?;
            let (from, to) = check_move(field, entity, |p| p.adjacent(facing))?;
            field.relocate(id, to).map_err(|e| store_error(id, e))?;
            Ok((ActionKind::Move { from, to }, ()))
        })
    }

    /// Step forward if nothing is in the way. Returns whether it moved.
    ///
    /// Still takes a turn when it does not move.
    pub fn move_if_possible(&self) -> Result<bool, ActionError> {
        match self.move_forward() {
            Ok(()) => Ok(true),
            Err(ActionError::IllegalMove { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Face `direction`.
    pub fn turn(&self, direction: Direction) -> Result<(), ActionError> {
        self.turn_with(|_| direction)
    }

    /// Turn right.
    pub fn turn_clockwise(&self) -> Result<(), ActionError> {
        self.turn_with(Direction::clockwise)
    }

    /// Turn left.
    pub fn turn_counter_clockwise(&self) -> Result<(), ActionError> {
        self.turn_with(Direction::counter_clockwise)
    }

    fn turn_with(&self, next: impl FnOnce(Direction) -> Direction) -> Result<(), ActionError> {
        self.commit(|field, entity| {
            let id = entity.id();
            if entity.as_movable().is_none() {
                return Err(illegal(id, format!("{} is not movable", entity.label())));
            }
            let from = match (field.position_of(id), field.facing_of(id)) {
                (Some(_), Some(facing)) => facing,
                _ => return Err(ActionError::EntityNotOnField { entity: id }),
            };
            let to = next(from);
            field.set_facing(id, to).map_err(|e| store_error(id, e))?;
            Ok((ActionKind::Turn { from, to }, ()))
        })
    }

    /// Jump to any unblocked in-bounds cell.
    pub fn teleport(&self, to: Position) -> Result<(), ActionError> {
        self.commit(|field, entity| {
            let id = entity.id();
            let (from, to) = check_move(field, entity, |_| Some(to))?;
            field.relocate(id, to).map_err(|e| store_error(id, e))?;
            Ok((ActionKind::Teleport { from, to }, ()))
        })
    }

    // ── Collecting ──────────────────────────────────────────────

    /// Pick up `target` from this entity's cell into its inventory.
    pub fn collect(&self, target: EntityId) -> Result<(), ActionError> {
        self.commit(|field, entity| Ok((collect_in(field, entity, target)?, ())))
    }

    /// Pick up the first collectable entity in this cell, if any.
    /// Returns its id.
    ///
    /// The item is chosen after the gate, under the write lock, so an
    /// item taken by another program in the meantime is never reported
    /// as a failure. Returns `Ok(None)` without logging when nothing is
    /// left to pick up.
    pub fn collect_any(&self) -> Result<Option<EntityId>, ActionError> {
        if self.collectable_here().is_empty() {
            return Ok(None);
        }
        self.commit_if(|field, entity| {
            let id = entity.id();
            let here = field
                .position_of(id)
                .ok_or(ActionError::EntityNotOnField { entity: id })?;
            let first = field
                .entities_at(here)
                .into_iter()
                .find(|e| e.id() != id && e.is_collectable_now());
            match first {
                Some(item) => {
                    let target = item.id();
                    Ok((Some(collect_in(field, entity, target)?), Some(target)))
                }
                None => Ok((None, None)),
            }
        })
    }

    /// Put `target` down in this entity's cell.
    pub fn drop(&self, target: EntityId) -> Result<(), ActionError> {
        self.commit(|field, entity| Ok((drop_in(field, entity, target, None)?, ())))
    }

    /// Put `target` down in this entity's cell or a 4-neighbour.
    pub fn drop_at(&self, target: EntityId, at: Position) -> Result<(), ActionError> {
        self.commit(|field, entity| Ok((drop_in(field, entity, target, Some(at))?, ())))
    }

    // ── Waiting ─────────────────────────────────────────────────

    /// Let `ticks` ticks pass without acting. Immediate when ungated.
    pub fn sleep(&self, ticks: u32) -> Result<(), ActionError> {
        let Some(pass) = &self.pass else {
            return Ok(());
        };
        let gate = self.world.clock.gate();
        for _ in 0..ticks {
            gate.wait_turn(pass)
                .map_err(|_| ActionError::Interrupted { entity: self.id })?;
        }
        Ok(())
    }

    pub(crate) fn leave_gate(&self) {
        if let Some(pass) = &self.pass {
            self.world.clock.gate().leave(pass);
        }
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("gated", &self.is_gated())
            .finish()
    }
}
