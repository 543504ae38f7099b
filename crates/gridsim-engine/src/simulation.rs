//! The simulation facade.
//!
//! [`Simulation`] owns the playfield, the action log, the clock, the
//! inspection manager, the entity type registry and the program threads.
//! Spawning, despawning and program registration go through it; every
//! other mutation flows through [`Actor`] operations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gridsim_core::{Direction, EntityId, Position, SharedEntity, TickId, Value};
use gridsim_inspect::{InspectionData, InspectionError, InspectionManager};
use gridsim_log::{ActionLog, TickFrame};
use gridsim_playfield::{Bounds, FieldWriter, Placement, Playfield, PlayfieldError};

use crate::actor::Actor;
use crate::clock::SimulationClock;
use crate::config::{ConfigError, SimulationConfig};
use crate::error::{ProgramError, SimulationError};
use crate::program::{Program, ProgramId, ProgramRunner, ProgramState};
use crate::registry::{EntityTypeRegistry, NamedProgram, ProgramRegistry};
use crate::world::World;

/// A playfield invariant violation that stopped the simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    /// What the store reported.
    pub error: PlayfieldError,
    /// The entity whose operation hit it, if any.
    pub entity: Option<EntityId>,
    /// The log's open tick at the time.
    pub tick: TickId,
}

/// One entity whose replayed state differs from the live one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDivergence {
    /// The entity.
    pub entity: EntityId,
    /// Live placement and heading; `None` if not registered live.
    pub live: Option<(Placement, Direction)>,
    /// Replayed placement and heading; `None` if absent after replay.
    pub replayed: Option<(Placement, Direction)>,
}

type Layout = BTreeMap<EntityId, (Placement, Direction)>;

/// Every entity whose entry differs between two layouts, ordered by id.
pub fn compare_layouts(live: &Layout, replayed: &Layout) -> Vec<EntityDivergence> {
    let mut ids: Vec<EntityId> = live.keys().chain(replayed.keys()).copied().collect();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter()
        .filter_map(|entity| {
            let (l, r) = (live.get(&entity).copied(), replayed.get(&entity).copied());
            (l != r).then_some(EntityDivergence {
                entity,
                live: l,
                replayed: r,
            })
        })
        .collect()
}

/// Outcome of [`Simulation::shutdown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Total time spent, in milliseconds.
    pub total_ms: u64,
    /// Whether the clock driver thread was joined.
    pub driver_joined: bool,
    /// Whether every program thread ended within the grace period.
    pub programs_ended: bool,
}

/// Grace period for program threads to observe the stop.
const PROGRAM_GRACE: Duration = Duration::from_millis(500);

/// The simulation: one world plus its clock and program threads.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gridsim_core::{Direction, Position};
/// use gridsim_engine::{Simulation, SimulationConfig};
/// use gridsim_test_utils::{Rover, Wall};
///
/// let sim = Simulation::new(SimulationConfig::default()).unwrap();
/// let a = sim.spawn(Arc::new(Rover::new()), Position::new(0, 0), Direction::East).unwrap();
/// sim.spawn(Arc::new(Wall::new()), Position::new(1, 0), Direction::East).unwrap();
///
/// let before = sim.action_log().len();
/// assert!(a.move_forward().is_err());
/// assert_eq!(sim.action_log().len(), before);
/// sim.verify_replay().unwrap();
/// ```
pub struct Simulation {
    world: Arc<World>,
    bounds: Option<Bounds>,
    inspection: InspectionManager,
    registry: EntityTypeRegistry,
    program_registry: ProgramRegistry,
    programs: ProgramRunner,
}

impl Simulation {
    /// Validate `config` and start the (stopped) clock driver.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let log = Arc::new(ActionLog::new());
        log.set_echo(config.echo_actions);
        let playfield = FieldWriter::with_bounds(config.bounds);
        let clock = SimulationClock::new(config.clock, Arc::clone(&log))?;
        tracing::debug!(bounds = ?config.bounds, period = ?clock.period(), "simulation created");
        Ok(Self {
            world: Arc::new(World::new(playfield, log, clock)),
            bounds: config.bounds,
            inspection: InspectionManager::new(),
            registry: EntityTypeRegistry::new(),
            program_registry: ProgramRegistry::new(),
            programs: ProgramRunner::new(),
        })
    }

    // ── Accessors ───────────────────────────────────────────────

    /// The clock.
    pub fn clock(&self) -> &SimulationClock {
        &self.world.clock
    }

    /// The playfield, read side. Mutation goes through [`spawn`],
    /// [`despawn`] and [`Actor`] operations, which log what they do.
    ///
    /// ```compile_fail
    /// use std::sync::Arc;
    /// use gridsim_core::{Direction, Position};
    /// use gridsim_engine::{Simulation, SimulationConfig};
    /// use gridsim_test_utils::Coin;
    ///
    /// let sim = Simulation::new(SimulationConfig::default()).unwrap();
    /// sim.playfield()
    ///     .place(Arc::new(Coin::new()), Position::new(1, 1), Direction::East)
    ///     .unwrap();
    /// ```
    ///
    /// ```compile_fail
    /// use gridsim_core::Position;
    /// use gridsim_engine::{Simulation, SimulationConfig};
    ///
    /// let sim = Simulation::new(SimulationConfig::default()).unwrap();
    /// let mut state = sim.playfield().write();
    /// ```
    ///
    /// [`spawn`]: Simulation::spawn
    /// [`despawn`]: Simulation::despawn
    pub fn playfield(&self) -> &Arc<Playfield> {
        self.world.playfield.field()
    }

    /// The action log.
    pub fn action_log(&self) -> &Arc<ActionLog> {
        &self.world.log
    }

    /// The inspection manager.
    pub fn inspection(&self) -> &InspectionManager {
        &self.inspection
    }

    /// The entity type registry.
    pub fn registry(&self) -> &EntityTypeRegistry {
        &self.registry
    }

    /// Programs registered by name, for [`attach_program`].
    ///
    /// [`attach_program`]: Self::attach_program
    pub fn program_registry(&self) -> &ProgramRegistry {
        &self.program_registry
    }

    /// The first invariant violation, if one stopped the simulation.
    pub fn last_fault(&self) -> Option<Fault> {
        self.world.last_fault()
    }

    // ── Spawning ────────────────────────────────────────────────

    /// Place `entity` and log the spawn. Returns an ungated handle.
    pub fn spawn(
        &self,
        entity: SharedEntity,
        at: Position,
        facing: Direction,
    ) -> Result<Actor, SimulationError> {
        let id = self.world.spawn(entity, at, facing)?;
        Ok(self.ungated(id))
    }

    /// Create an entity from the registry and spawn it.
    pub fn spawn_type(
        &self,
        name: &str,
        at: Position,
        facing: Direction,
    ) -> Result<Actor, SimulationError> {
        let entity = self.registry.create(name)?;
        self.spawn(entity, at, facing)
    }

    /// Spawn one fresh entity per position. Stops at the first failure;
    /// entities spawned before it stay.
    pub fn spawn_each<F>(
        &self,
        mut factory: F,
        positions: impl IntoIterator<Item = Position>,
        facing: Direction,
    ) -> Result<Vec<Actor>, SimulationError>
    where
        F: FnMut() -> SharedEntity,
    {
        positions
            .into_iter()
            .map(|at| self.spawn(factory(), at, facing))
            .collect()
    }

    /// Spawn `count` fresh entities into one cell.
    pub fn spawn_many<F>(
        &self,
        factory: F,
        count: usize,
        at: Position,
        facing: Direction,
    ) -> Result<Vec<Actor>, SimulationError>
    where
        F: FnMut() -> SharedEntity,
    {
        self.spawn_each(factory, std::iter::repeat_n(at, count), facing)
    }

    /// Remove an on-field entity and log the despawn. Items it carried
    /// are removed with it.
    pub fn despawn(&self, id: EntityId) -> Result<SharedEntity, SimulationError> {
        Ok(self.world.despawn(id)?)
    }

    /// An ungated handle for a registered entity.
    pub fn actor(&self, id: EntityId) -> Option<Actor> {
        self.world.playfield.contains(id).then(|| self.ungated(id))
    }

    fn ungated(&self, id: EntityId) -> Actor {
        Actor::new(Arc::clone(&self.world), id, None)
    }

    // ── Programs ────────────────────────────────────────────────

    /// Run `program` on its own thread, driving `entity`.
    pub fn register_program<P: Program>(
        &self,
        entity: EntityId,
        program: P,
    ) -> Result<ProgramId, ProgramError> {
        let id = self.programs.register(&self.world, entity, program)?;
        tracing::debug!(program = %id, %entity, "program registered");
        Ok(id)
    }

    /// Names of the registered programs that accept `entity`. Empty when
    /// the entity is not in this simulation.
    pub fn programs_for(&self, entity: EntityId) -> Vec<String> {
        match self.world.playfield.get(entity) {
            Some(target) => self.program_registry.programs_for(target.as_ref()),
            None => Vec::new(),
        }
    }

    /// Create the program registered as `name` and run it on `entity`.
    pub fn attach_program(&self, entity: EntityId, name: &str) -> Result<ProgramId, SimulationError> {
        let program = NamedProgram {
            name: name.to_owned(),
            program: self.program_registry.create(name)?,
        };
        let id = self.programs.register(&self.world, entity, program)?;
        tracing::debug!(program = %id, %entity, %name, "named program attached");
        Ok(id)
    }

    /// State of a registered program.
    pub fn program_state(&self, id: ProgramId) -> Result<ProgramState, SimulationError> {
        self.programs
            .state(id)
            .ok_or(SimulationError::UnknownProgram(id))
    }

    /// Every registered program with its entity and state.
    pub fn programs(&self) -> Vec<(ProgramId, EntityId, ProgramState)> {
        self.programs.programs()
    }

    /// Wait up to `timeout` for every program thread to end.
    pub fn join_programs(&self, timeout: Duration) -> bool {
        self.programs.join(timeout)
    }

    // ── Inspection ──────────────────────────────────────────────

    /// Snapshot one entity's inspectable members.
    pub fn inspect(&self, id: EntityId) -> Result<InspectionData, InspectionError> {
        self.inspection.inspect(&self.world.playfield, id)
    }

    /// Call a declared method on an entity.
    pub fn invoke(
        &self,
        id: EntityId,
        method: &str,
        args: &[Value],
    ) -> Result<Option<Value>, InspectionError> {
        self.inspection
            .invoke(&self.world.playfield, id, method, args)
    }

    /// Write an editable attribute.
    pub fn set_attribute(
        &self,
        id: EntityId,
        name: &str,
        value: Value,
    ) -> Result<(), InspectionError> {
        self.inspection
            .set_attribute(&self.world.playfield, id, name, value)
    }

    // ── Rendering ───────────────────────────────────────────────

    /// Called once per closed tick with that tick's actions.
    pub fn set_render_callback<F>(&self, render: F)
    where
        F: FnMut(&TickFrame) + Send + 'static,
    {
        self.world.clock.set_render_callback(render);
    }

    // ── Verification ────────────────────────────────────────────

    /// Replay the whole log onto an empty playfield and compare the
    /// result with the live one.
    pub fn verify_replay(&self) -> Result<(), SimulationError> {
        // Appends happen under the playfield write lock, so holding the
        // read lock pins log and layout to the same moment.
        let (live, history) = {
            let field = self.world.playfield.read();
            (field.layout(), self.world.log.snapshot())
        };
        let replayed = Playfield::rebuild(self.bounds, &history).map_err(|e| {
            SimulationError::ReplayDiverged {
                detail: e.to_string(),
            }
        })?;
        let divergences = compare_layouts(&live, &replayed.layout());
        match divergences.first() {
            None => Ok(()),
            Some(first) => Err(SimulationError::ReplayDiverged {
                detail: format!(
                    "{} entities differ; first {}: live {:?}, replayed {:?}",
                    divergences.len(),
                    first.entity,
                    first.live,
                    first.replayed
                ),
            }),
        }
    }

    // ── Shutdown ────────────────────────────────────────────────

    /// Stop the clock, interrupt every program, join the driver and wait
    /// briefly for program threads. Idempotent.
    pub fn shutdown(&self) -> ShutdownReport {
        let start = Instant::now();
        self.world.clock.stop();
        let driver_joined = self.world.clock.shutdown();
        let programs_ended = self.programs.join(PROGRAM_GRACE);
        if !programs_ended {
            tracing::warn!("some program threads did not stop and were detached");
        }
        ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            driver_joined,
            programs_ended,
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("playfield", &self.world.playfield)
            .field("log", &self.world.log)
            .field("clock", &self.world.clock)
            .finish()
    }
}
