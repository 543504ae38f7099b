//! The tick handshake between the clock driver and program threads.
//!
//! A program thread calls [`TickGate::wait_turn`] before every operation.
//! The call finishes the program's unit of work for the current tick (if
//! it had one), parks the thread, and returns once the driver begins the
//! next tick. The driver tracks two counters under one mutex:
//!
//! - `parked`: threads waiting for the next tick,
//! - `busy`: threads released into the current tick that have not parked
//!   again yet.
//!
//! A tick is over when `busy` reaches zero; the gate reports that on the
//! idle channel returned by [`TickGate::new`].
//!
//! Cancellation is a generation counter. [`TickGate::cancel`] bumps it,
//! wakes every parked thread, and resets both counters; passes issued for
//! an older generation fail at every later suspension point.

use std::cell::Cell;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use gridsim_core::TickId;
use thiserror::Error;

/// The pass's generation was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("tick gate cancelled")]
pub struct Cancelled;

struct GateState {
    tick: u64,
    in_tick: bool,
    busy: usize,
    parked: usize,
    generation: u64,
}

/// Per-program ticket for the gate.
///
/// Issued by [`TickGate::pass`] for the current generation. `Send` so it
/// can move into a program thread, but not `Sync`: one thread owns it.
#[derive(Debug)]
pub struct GatePass {
    generation: u64,
    released: Cell<bool>,
}

impl GatePass {
    /// Whether the holder is inside a tick it was released into.
    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

/// Condition-variable handshake coordinating tick begin / end with
/// program threads.
pub struct TickGate {
    state: Mutex<GateState>,
    turn: Condvar,
    idle: Sender<u64>,
}

impl TickGate {
    /// A gate at tick 0, plus the receiver of idle notifications (the
    /// number of each tick whose busy count dropped to zero).
    pub fn new() -> (Self, Receiver<u64>) {
        let (idle, idle_rx) = crossbeam_channel::unbounded();
        let gate = Self {
            state: Mutex::new(GateState {
                tick: 0,
                in_tick: false,
                busy: 0,
                parked: 0,
                generation: 0,
            }),
            turn: Condvar::new(),
            idle,
        };
        (gate, idle_rx)
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_unit(&self, st: &mut GateState, pass: &GatePass) {
        if pass.released.replace(false) {
            st.busy = st.busy.saturating_sub(1);
            if st.busy == 0 && st.in_tick {
                // The driver may have shut down; nobody to tell then.
                let _ = self.idle.send(st.tick);
            }
        }
    }

    // ── Program side ────────────────────────────────────────────

    /// A pass for the current generation.
    pub fn pass(&self) -> GatePass {
        GatePass {
            generation: self.lock().generation,
            released: Cell::new(false),
        }
    }

    /// Finish the current unit of work and block until the next tick.
    ///
    /// Returns the tick the caller was released into, or [`Cancelled`]
    /// if the gate was cancelled before or while waiting.
    pub fn wait_turn(&self, pass: &GatePass) -> Result<TickId, Cancelled> {
        let mut st = self.lock();
        if st.generation != pass.generation {
            return Err(Cancelled);
        }
        self.finish_unit(&mut st, pass);
        st.parked += 1;
        let parked_at = st.tick;
        let st = self
            .turn
            .wait_while(st, |s| {
                s.generation == pass.generation && s.tick == parked_at
            })
            .unwrap_or_else(PoisonError::into_inner);
        if st.generation != pass.generation {
            return Err(Cancelled);
        }
        pass.released.set(true);
        Ok(TickId(st.tick))
    }

    /// The pass holder is exiting. Finishes its unit of work, if any.
    pub fn leave(&self, pass: &GatePass) {
        let mut st = self.lock();
        if st.generation == pass.generation {
            self.finish_unit(&mut st, pass);
        }
    }

    // ── Driver side ─────────────────────────────────────────────

    /// Open the next tick and release every parked thread into it.
    ///
    /// Returns the new tick number and how many threads were released.
    pub fn begin_tick(&self) -> (TickId, usize) {
        let mut st = self.lock();
        st.tick += 1;
        st.in_tick = true;
        st.busy += st.parked;
        st.parked = 0;
        let released = st.busy;
        let tick = TickId(st.tick);
        drop(st);
        self.turn.notify_all();
        (tick, released)
    }

    /// Close `tick` if it is the open tick and nobody is busy in it.
    pub fn try_end_tick(&self, tick: TickId) -> bool {
        let mut st = self.lock();
        if st.in_tick && st.tick == tick.0 && st.busy == 0 {
            st.in_tick = false;
            true
        } else {
            false
        }
    }

    /// Close the open tick regardless of busy threads. Returns the tick
    /// if one was open.
    pub fn force_end_tick(&self) -> Option<TickId> {
        let mut st = self.lock();
        if st.in_tick {
            st.in_tick = false;
            Some(TickId(st.tick))
        } else {
            None
        }
    }

    /// Invalidate every issued pass and wake all parked threads.
    ///
    /// An open tick becomes idle and is reported on the idle channel.
    pub fn cancel(&self) {
        let mut st = self.lock();
        st.generation += 1;
        st.busy = 0;
        st.parked = 0;
        if st.in_tick {
            let _ = self.idle.send(st.tick);
        }
        drop(st);
        self.turn.notify_all();
    }

    // ── Introspection ───────────────────────────────────────────

    /// Number of the most recently begun tick (0 before the first).
    pub fn tick(&self) -> TickId {
        TickId(self.lock().tick)
    }

    /// Whether a tick is open.
    pub fn in_tick(&self) -> bool {
        self.lock().in_tick
    }

    /// Threads released into the open tick that have not parked again.
    pub fn busy(&self) -> usize {
        self.lock().busy
    }

    /// Threads waiting for the next tick.
    pub fn parked(&self) -> usize {
        self.lock().parked
    }

    /// Current cancellation generation.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

impl std::fmt::Debug for TickGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("TickGate")
            .field("tick", &st.tick)
            .field("in_tick", &st.in_tick)
            .field("busy", &st.busy)
            .field("parked", &st.parked)
            .field("generation", &st.generation)
            .finish()
    }
}

// Compile-time assertions: the gate is shared; passes move into threads.
const _: fn() = || {
    fn assert_shared<T: Send + Sync>() {}
    fn assert_send<T: Send>() {}
    assert_shared::<TickGate>();
    assert_send::<GatePass>();
};
