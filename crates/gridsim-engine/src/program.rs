//! User programs and the threads that run them.
//!
//! A [`Program`] drives one entity from its own thread through a gated
//! [`Actor`]. Programs start parked: the first operation waits for the
//! first tick after registration, so programs run in lockstep with the
//! clock. Stopping the clock interrupts every program at its next
//! blocking point; the resulting [`ActionError::Interrupted`] ends the
//! program as [`ProgramState::Killed`].
//!
//! [`ActionError::Interrupted`]: crate::ActionError::Interrupted

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use gridsim_core::{Entity, EntityId};
use indexmap::IndexMap;

use crate::actor::Actor;
use crate::error::ProgramError;
use crate::world::World;

/// Code that drives one entity.
///
/// Closures `FnMut(&Actor) -> Result<(), ProgramError>` are programs.
///
/// # Examples
///
/// ```no_run
/// use gridsim_engine::{Actor, ProgramError};
///
/// let walk_east = |actor: &Actor| -> Result<(), ProgramError> {
///     while actor.can_move() {
///         actor.move_forward()?;
///     }
///     Ok(())
/// };
/// # let _ = walk_east;
/// ```
pub trait Program: Send + 'static {
    /// Run to completion. Every entity operation on `actor` takes a turn.
    fn run(&mut self, actor: &Actor) -> Result<(), ProgramError>;

    /// Whether this program can drive `entity`. Default: any entity.
    fn can_run_on(&self, _entity: &dyn Entity) -> bool {
        true
    }
}

impl<F> Program for F
where
    F: FnMut(&Actor) -> Result<(), ProgramError> + Send + 'static,
{
    fn run(&mut self, actor: &Actor) -> Result<(), ProgramError> {
        self(actor)
    }
}

/// Identifier of a registered program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u64);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program-{}", self.0)
    }
}

/// Lifecycle of a program thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramState {
    /// Registered, thread not started yet.
    New,
    /// Thread running (possibly parked at the gate).
    Running,
    /// `run` returned `Ok`.
    Finished,
    /// Interrupted by a clock stop.
    Killed,
    /// `run` returned an error or panicked.
    Failed,
}

impl ProgramState {
    /// Whether the program thread has ended.
    pub fn is_done(self) -> bool {
        matches!(
            self,
            ProgramState::Finished | ProgramState::Killed | ProgramState::Failed
        )
    }
}

struct ProgramEntry {
    entity: EntityId,
    state: Arc<Mutex<ProgramState>>,
    handle: Option<JoinHandle<()>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// Owns program threads and their states.
pub(crate) struct ProgramRunner {
    next_id: AtomicU64,
    entries: Mutex<IndexMap<ProgramId, ProgramEntry>>,
    done_tx: Sender<ProgramId>,
    done_rx: Receiver<ProgramId>,
}

impl ProgramRunner {
    pub(crate) fn new() -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(IndexMap::new()),
            done_tx,
            done_rx,
        }
    }

    /// Start `program` on its own thread, bound to `entity`.
    pub(crate) fn register<P: Program>(
        &self,
        world: &Arc<World>,
        entity: EntityId,
        mut program: P,
    ) -> Result<ProgramId, ProgramError> {
        let refuse = |reason: &str| ProgramError::CannotRunProgram {
            entity,
            reason: reason.to_owned(),
        };
        let target = world
            .playfield
            .get(entity)
            .ok_or_else(|| refuse("entity is not on the playfield"))?;
        if !program.can_run_on(target.as_ref()) {
            return Err(refuse("program declined the entity"));
        }

        let mut entries = lock(&self.entries);
        let busy = entries
            .values()
            .any(|e| e.entity == entity && !lock(&e.state).is_done());
        if busy {
            return Err(refuse("entity already runs a program"));
        }

        let id = ProgramId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(Mutex::new(ProgramState::New));
        // The pass is issued now so a stop between registration and thread
        // start still interrupts this program.
        let actor = Actor::new(Arc::clone(world), entity, Some(world.clock.gate().pass()));
        let thread_state = Arc::clone(&state);
        let done = self.done_tx.clone();
        let span = tracing::debug_span!("program", id = id.0, %entity);

        let handle = thread::Builder::new()
            .name(format!("gridsim-program-{}", id.0))
            .spawn(move || {
                let _guard = span.enter();
                *lock(&thread_state) = ProgramState::Running;
                tracing::debug!("program started");
                let outcome = catch_unwind(AssertUnwindSafe(|| program.run(&actor)));
                actor.leave_gate();
                let end = match outcome {
                    Ok(Ok(())) => {
                        tracing::debug!("program finished");
                        ProgramState::Finished
                    }
                    Ok(Err(err)) if err.is_interrupt() => {
                        tracing::warn!("program interrupted");
                        ProgramState::Killed
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "program failed");
                        ProgramState::Failed
                    }
                    Err(payload) => {
                        tracing::warn!(panic = %panic_message(payload.as_ref()), "program panicked");
                        ProgramState::Failed
                    }
                };
                *lock(&thread_state) = end;
                let _ = done.send(id);
            })
            .map_err(|e| ProgramError::CannotRunProgram {
                entity,
                reason: format!("failed to spawn thread: {e}"),
            })?;

        entries.insert(
            id,
            ProgramEntry {
                entity,
                state,
                handle: Some(handle),
            },
        );
        Ok(id)
    }

    pub(crate) fn state(&self, id: ProgramId) -> Option<ProgramState> {
        lock(&self.entries).get(&id).map(|e| *lock(&e.state))
    }

    /// Programs in registration order with their entity and state.
    pub(crate) fn programs(&self) -> Vec<(ProgramId, EntityId, ProgramState)> {
        lock(&self.entries)
            .iter()
            .map(|(id, e)| (*id, e.entity, *lock(&e.state)))
            .collect()
    }

    fn all_done(&self) -> bool {
        lock(&self.entries)
            .values()
            .all(|e| lock(&e.state).is_done())
    }

    /// Wait until every program thread has ended, up to `timeout`.
    /// Finished threads are joined. Returns whether all ended.
    pub(crate) fn join(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.all_done() {
            if self.done_rx.recv_deadline(deadline).is_err() {
                break;
            }
        }
        let handles: Vec<JoinHandle<()>> = lock(&self.entries)
            .values_mut()
            .filter(|e| lock(&e.state).is_done())
            .filter_map(|e| e.handle.take())
            .collect();
        for handle in handles {
            let _ = handle.join();
        }
        self.all_done()
    }
}
