//! The cell store and its lock.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gridsim_core::{Capabilities, Direction, EntityId, Position, SharedEntity};
use indexmap::IndexSet;

use crate::bounds::Bounds;
use crate::claims::{self, FieldId};
use crate::error::PlayfieldError;

/// Where a registered entity currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placement {
    /// In a cell.
    OnField(Position),
    /// In a collector's inventory.
    Carried {
        /// The collector holding it.
        by: EntityId,
    },
}

#[derive(Clone)]
struct Record {
    entity: SharedEntity,
    placement: Placement,
    facing: Direction,
}

/// The data behind the playfield lock.
///
/// Obtained through [`Playfield::read`] or [`FieldWriter::write`]. Queries
/// return owned values so callers can release the lock early.
pub struct FieldState {
    bounds: Option<Bounds>,
    cells: HashMap<Position, IndexSet<EntityId>>,
    records: HashMap<EntityId, Record>,
    inventories: HashMap<EntityId, IndexSet<EntityId>>,
    /// Set for live fields; `None` for replay targets.
    owner: Option<FieldId>,
}

impl FieldState {
    fn new(bounds: Option<Bounds>, owner: Option<FieldId>) -> Self {
        Self {
            bounds,
            cells: HashMap::new(),
            records: HashMap::new(),
            inventories: HashMap::new(),
            owner,
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Configured bounds, if any.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Whether `pos` is inside the bounds (always true when unbounded).
    pub fn in_bounds(&self, pos: Position) -> bool {
        self.bounds.is_none_or(|b| b.contains(pos))
    }

    /// Ids of the entities in `pos`, in insertion order.
    pub fn entity_ids_at(&self, pos: Position) -> Vec<EntityId> {
        self.cells
            .get(&pos)
            .map(|cell| cell.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Entities in `pos`, in insertion order.
    pub fn entities_at(&self, pos: Position) -> Vec<SharedEntity> {
        self.cells
            .get(&pos)
            .map(|cell| {
                cell.iter()
                    .filter_map(|id| self.records.get(id))
                    .map(|r| r.entity.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recently inserted entity in `pos`.
    pub fn top_entity_at(&self, pos: Position) -> Option<SharedEntity> {
        let id = self.cells.get(&pos)?.last()?;
        self.records.get(id).map(|r| r.entity.clone())
    }

    /// Entities in `pos` exposing every capability in `caps`.
    pub fn entities_of_capability_at(&self, pos: Position, caps: Capabilities) -> Vec<SharedEntity> {
        self.entities_at(pos)
            .into_iter()
            .filter(|e| e.capabilities().contains(caps))
            .collect()
    }

    /// Every registered entity, on the field or carried, ordered by id.
    pub fn all_entities(&self) -> Vec<SharedEntity> {
        let mut all: Vec<_> = self.records.values().map(|r| r.entity.clone()).collect();
        all.sort_by_key(|e| e.id());
        all
    }

    /// Every registered entity exposing every capability in `caps`.
    pub fn all_entities_with(&self, caps: Capabilities) -> Vec<SharedEntity> {
        self.all_entities()
            .into_iter()
            .filter(|e| e.capabilities().contains(caps))
            .collect()
    }

    /// The first currently-solid entity in `pos`.
    pub fn solid_occupant(&self, pos: Position) -> Option<EntityId> {
        self.cells.get(&pos)?.iter().copied().find(|id| {
            self.records
                .get(id)
                .is_some_and(|r| r.entity.is_solid_now())
        })
    }

    /// Whether a currently-solid entity occupies `pos`.
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.solid_occupant(pos).is_some()
    }

    /// The registered entity with this id.
    pub fn get(&self, id: EntityId) -> Option<SharedEntity> {
        self.records.get(&id).map(|r| r.entity.clone())
    }

    /// Whether the entity is registered (on the field or carried).
    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Where the entity is, if registered.
    pub fn placement_of(&self, id: EntityId) -> Option<Placement> {
        self.records.get(&id).map(|r| r.placement)
    }

    /// The entity's cell. `None` when unregistered or carried.
    pub fn position_of(&self, id: EntityId) -> Option<Position> {
        match self.placement_of(id)? {
            Placement::OnField(pos) => Some(pos),
            Placement::Carried { .. } => None,
        }
    }

    /// The entity's heading.
    pub fn facing_of(&self, id: EntityId) -> Option<Direction> {
        self.records.get(&id).map(|r| r.facing)
    }

    /// The collector carrying `id`, if any.
    pub fn carrier_of(&self, id: EntityId) -> Option<EntityId> {
        match self.placement_of(id)? {
            Placement::Carried { by } => Some(by),
            Placement::OnField(_) => None,
        }
    }

    /// Items carried by `collector`, in pickup order.
    pub fn inventory_of(&self, collector: EntityId) -> Vec<SharedEntity> {
        self.inventories
            .get(&collector)
            .map(|inv| {
                inv.iter()
                    .filter_map(|id| self.records.get(id))
                    .map(|r| r.entity.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Placement and heading of every registered entity, keyed by id.
    /// Two stores with equal layouts hold the same world.
    pub fn layout(&self) -> BTreeMap<EntityId, (Placement, Direction)> {
        self.records
            .iter()
            .map(|(id, r)| (*id, (r.placement, r.facing)))
            .collect()
    }

    /// Verify the cross-references between cells, records and
    /// inventories, and that every carried entity hangs off a chain of
    /// registered carriers ending on the field.
    pub fn check_invariants(&self) -> Result<(), PlayfieldError> {
        let mut seen_on_field = 0;
        for (pos, cell) in &self.cells {
            if cell.is_empty() {
                return Err(PlayfieldError::invariant(format!("empty cell kept at {pos}")));
            }
            for id in cell {
                match self.placement_of(*id) {
                    Some(Placement::OnField(at)) if at == *pos => seen_on_field += 1,
                    other => {
                        return Err(PlayfieldError::invariant(format!(
                            "{id} listed at {pos} but placed {other:?}"
                        )))
                    }
                }
            }
        }
        let mut seen_carried = 0;
        for (collector, inv) in &self.inventories {
            for id in inv {
                if self.carrier_of(*id) != Some(*collector) {
                    return Err(PlayfieldError::invariant(format!(
                        "{id} in inventory of {collector} but not carried by it"
                    )));
                }
                seen_carried += 1;
            }
        }
        if seen_on_field + seen_carried != self.records.len() {
            return Err(PlayfieldError::invariant(format!(
                "{} records but {seen_on_field} placed and {seen_carried} carried",
                self.records.len()
            )));
        }
        for (id, record) in &self.records {
            let Placement::Carried { by } = record.placement else {
                continue;
            };
            if !self.inventories.get(&by).is_some_and(|inv| inv.contains(id)) {
                return Err(PlayfieldError::invariant(format!(
                    "{id} carried by {by} but missing from its inventory"
                )));
            }
            let mut carrier = by;
            let mut hops = 0;
            loop {
                match self.placement_of(carrier) {
                    Some(Placement::OnField(_)) => break,
                    Some(Placement::Carried { by }) if hops < self.records.len() => {
                        carrier = by;
                        hops += 1;
                    }
                    _ => {
                        return Err(PlayfieldError::invariant(format!(
                            "{id} is carried but {carrier} does not lead back to the field"
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    // ── Mutations ───────────────────────────────────────────────

    fn require_in_bounds(&self, at: Position) -> Result<(), PlayfieldError> {
        match self.bounds {
            Some(bounds) if !bounds.contains(at) => Err(PlayfieldError::OutOfBounds { at, bounds }),
            _ => Ok(()),
        }
    }

    fn record_mut(&mut self, id: EntityId) -> Result<&mut Record, PlayfieldError> {
        self.records
            .get_mut(&id)
            .ok_or(PlayfieldError::EntityNotOnField { entity: id })
    }

    fn on_field(&self, id: EntityId) -> Result<Position, PlayfieldError> {
        self.position_of(id)
            .ok_or(PlayfieldError::EntityNotOnField { entity: id })
    }

    fn detach_from_cell(&mut self, id: EntityId, pos: Position) {
        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.shift_remove(&id);
            if cell.is_empty() {
                self.cells.remove(&pos);
            }
        }
    }

    fn attach_to_cell(&mut self, id: EntityId, pos: Position) {
        self.cells.entry(pos).or_default().insert(id);
    }

    /// Register `entity` in `at` facing `facing`.
    ///
    /// Fails when the id is already registered, `at` is out of bounds, a
    /// currently-solid entity would join a cell that already holds one, or
    /// the entity already lives on another playfield.
    pub fn place(
        &mut self,
        entity: SharedEntity,
        at: Position,
        facing: Direction,
    ) -> Result<(), PlayfieldError> {
        let id = entity.id();
        if self.records.contains_key(&id) {
            return Err(PlayfieldError::EntityAlreadyOnField { entity: id });
        }
        self.require_in_bounds(at)?;
        if entity.is_solid_now() {
            if let Some(occupant) = self.solid_occupant(at) {
                return Err(PlayfieldError::OccupiedByIncompatibleEntity {
                    entity: id,
                    at,
                    occupant,
                });
            }
        }
        if let Some(owner) = self.owner {
            claims::claim(id, owner)?;
        }
        self.attach_to_cell(id, at);
        self.records.insert(
            id,
            Record {
                entity,
                placement: Placement::OnField(at),
                facing,
            },
        );
        Ok(())
    }

    /// Unregister an entity that is on the field, returning it with the
    /// cell it left. Everything it carries, at any depth, is unregistered
    /// with it.
    pub fn remove(&mut self, id: EntityId) -> Result<(SharedEntity, Position), PlayfieldError> {
        let pos = self.on_field(id)?;
        let record = self
            .records
            .remove(&id)
            .ok_or(PlayfieldError::EntityNotOnField { entity: id })?;
        self.detach_from_cell(id, pos);
        let mut gone = vec![id];
        let mut next = 0;
        while let Some(&holder) = gone.get(next) {
            if let Some(items) = self.inventories.remove(&holder) {
                for item in items {
                    self.records.remove(&item);
                    gone.push(item);
                }
            }
            next += 1;
        }
        if let Some(owner) = self.owner {
            claims::release(gone, owner);
        }
        Ok((record.entity, pos))
    }

    /// Move an on-field entity to `to`, returning the cell it left.
    ///
    /// Only bounds are checked; movement rules belong to the caller.
    pub fn relocate(&mut self, id: EntityId, to: Position) -> Result<Position, PlayfieldError> {
        let from = self.on_field(id)?;
        self.require_in_bounds(to)?;
        if from != to {
            self.detach_from_cell(id, from);
            self.attach_to_cell(id, to);
            self.record_mut(id)?.placement = Placement::OnField(to);
        }
        Ok(from)
    }

    /// Set the heading, returning the previous one.
    pub fn set_facing(&mut self, id: EntityId, facing: Direction) -> Result<Direction, PlayfieldError> {
        let record = self.record_mut(id)?;
        Ok(std::mem::replace(&mut record.facing, facing))
    }

    /// Move `item` from its cell into `collector`'s inventory, returning
    /// the cell it was taken from. Both must be on the field.
    pub fn carry(&mut self, collector: EntityId, item: EntityId) -> Result<Position, PlayfieldError> {
        if collector == item {
            return Err(PlayfieldError::invariant(format!("{item} cannot carry itself")));
        }
        self.on_field(collector)?;
        let at = self.on_field(item)?;
        self.detach_from_cell(item, at);
        self.record_mut(item)?.placement = Placement::Carried { by: collector };
        self.inventories.entry(collector).or_default().insert(item);
        Ok(at)
    }

    /// Put `item` from `collector`'s inventory into cell `at`.
    pub fn release(
        &mut self,
        collector: EntityId,
        item: EntityId,
        at: Position,
    ) -> Result<(), PlayfieldError> {
        if self.carrier_of(item) != Some(collector) {
            return Err(PlayfieldError::NotCarried {
                entity: item,
                collector,
            });
        }
        self.require_in_bounds(at)?;
        if let Some(inv) = self.inventories.get_mut(&collector) {
            inv.shift_remove(&item);
            if inv.is_empty() {
                self.inventories.remove(&collector);
            }
        }
        self.attach_to_cell(item, at);
        self.record_mut(item)?.placement = Placement::OnField(at);
        Ok(())
    }
}

/// The authoritative world store, read side.
///
/// Every query takes the read lock for its own duration. There is no way
/// to mutate a `Playfield` through a shared reference: mutations go
/// through the [`FieldWriter`] that created it.
pub struct Playfield {
    state: RwLock<FieldState>,
}

impl Playfield {
    fn claiming(bounds: Option<Bounds>) -> Self {
        Self {
            state: RwLock::new(FieldState::new(bounds, Some(FieldId::next()))),
        }
    }

    /// A field that claims nothing, for rebuilding a history whose
    /// entities already live elsewhere.
    pub(crate) fn unclaimed(bounds: Option<Bounds>) -> Self {
        Self {
            state: RwLock::new(FieldState::new(bounds, None)),
        }
    }

    /// Take the read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, FieldState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, FieldState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured bounds, if any.
    pub fn bounds(&self) -> Option<Bounds> {
        self.read().bounds()
    }

    /// See [`FieldState::entities_at`].
    pub fn entities_at(&self, pos: Position) -> Vec<SharedEntity> {
        self.read().entities_at(pos)
    }

    /// See [`FieldState::entity_ids_at`].
    pub fn entity_ids_at(&self, pos: Position) -> Vec<EntityId> {
        self.read().entity_ids_at(pos)
    }

    /// See [`FieldState::top_entity_at`].
    pub fn top_entity_at(&self, pos: Position) -> Option<SharedEntity> {
        self.read().top_entity_at(pos)
    }

    /// See [`FieldState::entities_of_capability_at`].
    pub fn entities_of_capability_at(&self, pos: Position, caps: Capabilities) -> Vec<SharedEntity> {
        self.read().entities_of_capability_at(pos, caps)
    }

    /// See [`FieldState::all_entities`].
    pub fn all_entities(&self) -> Vec<SharedEntity> {
        self.read().all_entities()
    }

    /// See [`FieldState::all_entities_with`].
    pub fn all_entities_with(&self, caps: Capabilities) -> Vec<SharedEntity> {
        self.read().all_entities_with(caps)
    }

    /// See [`FieldState::is_blocked`].
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.read().is_blocked(pos)
    }

    /// See [`FieldState::get`].
    pub fn get(&self, id: EntityId) -> Option<SharedEntity> {
        self.read().get(id)
    }

    /// See [`FieldState::contains`].
    pub fn contains(&self, id: EntityId) -> bool {
        self.read().contains(id)
    }

    /// See [`FieldState::position_of`].
    pub fn position_of(&self, id: EntityId) -> Option<Position> {
        self.read().position_of(id)
    }

    /// See [`FieldState::facing_of`].
    pub fn facing_of(&self, id: EntityId) -> Option<Direction> {
        self.read().facing_of(id)
    }

    /// See [`FieldState::carrier_of`].
    pub fn carrier_of(&self, id: EntityId) -> Option<EntityId> {
        self.read().carrier_of(id)
    }

    /// See [`FieldState::inventory_of`].
    pub fn inventory_of(&self, collector: EntityId) -> Vec<SharedEntity> {
        self.read().inventory_of(collector)
    }

    /// See [`FieldState::len`].
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// See [`FieldState::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// See [`FieldState::cell_count`].
    pub fn cell_count(&self) -> usize {
        self.read().cell_count()
    }

    /// See [`FieldState::layout`].
    pub fn layout(&self) -> BTreeMap<EntityId, (Placement, Direction)> {
        self.read().layout()
    }
}

/// Sole write access to a [`Playfield`].
///
/// Not `Clone`: whoever holds the writer decides what reaches the store.
/// Share the read side with [`FieldWriter::field`]; the writer also
/// dereferences to it for queries.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gridsim_core::{Direction, Entity, Position};
/// use gridsim_playfield::FieldWriter;
/// use gridsim_test_utils::Wall;
///
/// let writer = FieldWriter::new();
/// let wall = Arc::new(Wall::new());
/// let id = wall.id();
/// writer.place(wall, Position::new(1, 1), Direction::East).unwrap();
///
/// let field = Arc::clone(writer.field());
/// assert!(field.is_blocked(Position::new(1, 1)));
/// assert_eq!(field.position_of(id), Some(Position::new(1, 1)));
/// ```
pub struct FieldWriter {
    field: Arc<Playfield>,
}

impl FieldWriter {
    /// A writer over an empty, unbounded playfield.
    pub fn new() -> Self {
        Self::with_bounds(None)
    }

    /// A writer over an empty playfield with optional bounds.
    pub fn with_bounds(bounds: Option<Bounds>) -> Self {
        Self {
            field: Arc::new(Playfield::claiming(bounds)),
        }
    }

    /// The read side.
    pub fn field(&self) -> &Arc<Playfield> {
        &self.field
    }

    /// Take the write lock. Hold it across validate, mutate and log.
    pub fn write(&self) -> RwLockWriteGuard<'_, FieldState> {
        self.field.write()
    }

    /// Place an entity (spawn path). See [`FieldState::place`].
    pub fn place(
        &self,
        entity: SharedEntity,
        at: Position,
        facing: Direction,
    ) -> Result<(), PlayfieldError> {
        self.write().place(entity, at, facing)
    }

    /// Remove an entity. See [`FieldState::remove`].
    pub fn remove(&self, id: EntityId) -> Result<SharedEntity, PlayfieldError> {
        self.write().remove(id).map(|(entity, _)| entity)
    }
}

impl Deref for FieldWriter {
    type Target = Playfield;

    fn deref(&self) -> &Playfield {
        &self.field
    }
}

impl Default for FieldWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FieldWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldWriter").field(&*self.field).finish()
    }
}

impl fmt::Debug for Playfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Playfield")
            .field("bounds", &state.bounds)
            .field("entities", &state.len())
            .field("cells", &state.cell_count())
            .finish()
    }
}

impl Drop for FieldState {
    fn drop(&mut self) {
        if let Some(owner) = self.owner {
            claims::release(self.records.keys().copied(), owner);
        }
    }
}

// Compile-time assertion: the playfield is shared across program threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Playfield>();
    assert::<FieldWriter>();
};
