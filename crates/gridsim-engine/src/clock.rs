//! The simulation clock: a state machine handle over the driver thread.
//!
//! [`SimulationClock`] changes its [`ClockState`] synchronously and then
//! tells the driver thread over a control channel. The driver (see
//! `driver.rs`) owns tick timing: it begins ticks, ends them once every
//! released program has parked again, closes the log segment, and calls
//! listeners.
//!
//! # Listener rules
//!
//! Tick listeners run on the driver thread. They may call
//! [`start`](SimulationClock::start), [`pause`](SimulationClock::pause)
//! and [`stop`](SimulationClock::stop), which never wait for the driver,
//! but must not call [`step`](SimulationClock::step). A listener that
//! panics is removed.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use gridsim_core::TickId;
use gridsim_log::{ActionLog, TickFrame};

use crate::config::{ClockConfig, ConfigError};
use crate::driver::{Control, Driver};
use crate::error::ClockError;
use crate::gate::TickGate;
use crate::metrics::{ClockMetrics, MetricsCell};

/// Clock states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClockState {
    /// No ticks; programs parked at the gate were cancelled on entry.
    #[default]
    Stopped,
    /// Ticks fire every period.
    Running,
    /// No new ticks; the open tick, if any, finishes.
    Paused,
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClockState::Stopped => "stopped",
            ClockState::Running => "running",
            ClockState::Paused => "paused",
        })
    }
}

/// Returned by tick listeners to stay registered or unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerControl {
    /// Keep receiving events.
    Keep,
    /// Unregister after this call.
    Remove,
}

type BeginListener = Box<dyn FnMut(TickId) -> ListenerControl + Send>;
type EndListener = Box<dyn FnMut(&TickFrame) -> ListenerControl + Send>;
type StateListener = Box<dyn FnMut(ClockState) + Send>;
type RenderCallback = Box<dyn FnMut(&TickFrame) + Send>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Call every listener in `slot` without holding its lock, then merge
/// back the survivors ahead of any registered meanwhile.
fn fire<L>(slot: &Mutex<Vec<L>>, mut call: impl FnMut(&mut L) -> ListenerControl) {
    let mut current = std::mem::take(&mut *lock(slot));
    current.retain_mut(|listener| {
        match catch_unwind(AssertUnwindSafe(|| call(listener))) {
            Ok(control) => control == ListenerControl::Keep,
            Err(_) => {
                tracing::warn!("clock listener panicked and was removed");
                false
            }
        }
    });
    let mut slot = lock(slot);
    current.append(&mut slot);
    *slot = current;
}

// ── Shared state ──────────────────────────────────────────────────

#[derive(Default)]
struct Listeners {
    begin: Mutex<Vec<BeginListener>>,
    end: Mutex<Vec<EndListener>>,
    state: Mutex<Vec<StateListener>>,
    render: Mutex<Option<RenderCallback>>,
}

/// State shared between the clock handle and the driver thread.
pub(crate) struct ClockShared {
    state: Mutex<ClockState>,
    shut_down: AtomicBool,
    config: Mutex<ClockConfig>,
    /// Last completed tick; 0 means none yet.
    last_tick: AtomicU64,
    pub(crate) metrics: MetricsCell,
    listeners: Listeners,
    pub(crate) gate: Arc<TickGate>,
    pub(crate) log: Arc<ActionLog>,
}

impl ClockShared {
    pub(crate) fn config(&self) -> ClockConfig {
        lock(&self.config).clone()
    }

    pub(crate) fn tick_period(&self) -> Duration {
        lock(&self.config).tick_period()
    }

    pub(crate) fn set_last_tick(&self, tick: TickId) {
        self.last_tick.store(tick.0, Ordering::Release);
    }

    pub(crate) fn fire_tick_begin(&self, tick: TickId) {
        fire(&self.listeners.begin, |l| l(tick));
    }

    /// Tick-end listeners, then the render callback.
    pub(crate) fn deliver(&self, frame: &TickFrame) {
        fire(&self.listeners.end, |l| l(frame));
        let taken = lock(&self.listeners.render).take();
        if let Some(mut render) = taken {
            if catch_unwind(AssertUnwindSafe(|| render(frame))).is_err() {
                tracing::warn!(tick = frame.tick().0, "render callback panicked and was removed");
                return;
            }
            let mut slot = lock(&self.listeners.render);
            if slot.is_none() {
                *slot = Some(render);
            }
        }
    }

    fn fire_state(&self, state: ClockState) {
        fire(&self.listeners.state, |l| {
            l(state);
            ListenerControl::Keep
        });
    }
}

// ── SimulationClock ───────────────────────────────────────────────

/// Handle to the clock driver.
///
/// Dropping the handle shuts the driver down.
pub struct SimulationClock {
    shared: Arc<ClockShared>,
    control: Sender<Control>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SimulationClock {
    /// Validate `config` and spawn the driver thread (`gridsim-clock`).
    ///
    /// The clock starts [`Stopped`](ClockState::Stopped).
    pub fn new(config: ClockConfig, log: Arc<ActionLog>) -> Result<Self, ConfigError> {
        config.validate()?;
        let (gate, idle_rx) = TickGate::new();
        let shared = Arc::new(ClockShared {
            state: Mutex::new(ClockState::Stopped),
            shut_down: AtomicBool::new(false),
            config: Mutex::new(config),
            last_tick: AtomicU64::new(0),
            metrics: MetricsCell::default(),
            listeners: Listeners::default(),
            gate: Arc::new(gate),
            log,
        });
        let (control, control_rx) = crossbeam_channel::unbounded();
        let driver = Driver::new(Arc::clone(&shared), control_rx, idle_rx);
        let handle = thread::Builder::new()
            .name("gridsim-clock".into())
            .spawn(move || driver.run())
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;
        Ok(Self {
            shared,
            control,
            driver: Mutex::new(Some(handle)),
        })
    }

    /// The gate program threads pass before each operation.
    pub fn gate(&self) -> &Arc<TickGate> {
        &self.shared.gate
    }

    // ── State machine ───────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> ClockState {
        *lock(&self.shared.state)
    }

    /// Whether the clock is [`Running`](ClockState::Running).
    pub fn is_running(&self) -> bool {
        self.state() == ClockState::Running
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::Acquire)
    }

    /// Stopped/Paused → Running. The first tick begins immediately.
    pub fn start(&self) -> Result<(), ClockError> {
        if self.is_shut_down() {
            return Err(ClockError::ShutDown);
        }
        {
            let mut state = lock(&self.shared.state);
            if *state == ClockState::Running {
                return Err(ClockError::TimerAlreadyRunning);
            }
            *state = ClockState::Running;
            self.control
                .send(Control::Start)
                .map_err(|_| ClockError::ShutDown)?;
        }
        tracing::info!(period = ?self.period(), "simulation clock running");
        self.shared.fire_state(ClockState::Running);
        Ok(())
    }

    /// Running → Paused; no-op in any other state.
    ///
    /// Programs stay parked and resume on the next start or step.
    pub fn pause(&self) {
        {
            let mut state = lock(&self.shared.state);
            if *state != ClockState::Running {
                return;
            }
            *state = ClockState::Paused;
            let _ = self.control.send(Control::Pause);
        }
        tracing::info!("simulation clock paused");
        self.shared.fire_state(ClockState::Paused);
    }

    /// Any → Stopped.
    ///
    /// Every program observes an interruption at its next blocking
    /// point. An operation already past the gate completes first. The
    /// open tick, if any, is closed.
    pub fn stop(&self) {
        let previous = {
            let mut state = lock(&self.shared.state);
            let previous = std::mem::replace(&mut *state, ClockState::Stopped);
            self.shared.gate.cancel();
            let _ = self.control.send(Control::Stop);
            previous
        };
        if previous != ClockState::Stopped {
            tracing::info!(from = %previous, "simulation clock stopped");
            self.shared.fire_state(ClockState::Stopped);
        }
    }

    /// Run exactly one tick while not running and return its frame.
    ///
    /// Blocks until every released program has parked again, up to
    /// [`ClockConfig::step_timeout`].
    pub fn step(&self) -> Result<TickFrame, ClockError> {
        if self.is_shut_down() {
            return Err(ClockError::ShutDown);
        }
        if self.is_running() {
            return Err(ClockError::TimerAlreadyRunning);
        }
        let (reply, reply_rx) = crossbeam_channel::bounded(1);
        self.control
            .send(Control::Step(reply))
            .map_err(|_| ClockError::ShutDown)?;
        reply_rx.recv().map_err(|_| ClockError::ShutDown)?
    }

    // ── Timing ──────────────────────────────────────────────────

    /// Wall-clock length of one simulation tick.
    pub fn period(&self) -> Duration {
        self.shared.tick_period()
    }

    /// A copy of the current timing configuration.
    pub fn config(&self) -> ClockConfig {
        self.shared.config()
    }

    /// Set the simulation tick period, keeping the render ratio.
    pub fn set_period(&self, period: Duration) -> Result<(), ConfigError> {
        {
            let mut config = lock(&self.shared.config);
            let updated = config.clone().with_tick_period(period);
            updated.validate()?;
            *config = updated;
        }
        let _ = self.control.send(Control::Reschedule);
        Ok(())
    }

    /// Set the number of simulation ticks per second.
    ///
    /// Rates whose period does not fit a [`Duration`], rounds to zero, or
    /// exceeds [`ClockConfig::MAX_PERIOD`] are rejected.
    pub fn set_tick_rate(&self, hz: f64) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidTickRate { value: hz };
        if !(hz.is_finite() && hz > 0.0) {
            return Err(invalid());
        }
        let period = Duration::try_from_secs_f64(1.0 / hz).map_err(|_| invalid())?;
        if period.is_zero() || period > ClockConfig::MAX_PERIOD {
            return Err(invalid());
        }
        self.set_period(period)
    }

    /// The most recently completed tick.
    pub fn last_tick(&self) -> Option<TickId> {
        match self.shared.last_tick.load(Ordering::Acquire) {
            0 => None,
            n => Some(TickId(n)),
        }
    }

    /// Snapshot of the driver counters.
    pub fn metrics(&self) -> ClockMetrics {
        self.shared.metrics.snapshot()
    }

    // ── Listeners ───────────────────────────────────────────────

    /// Called on the driver thread as each tick begins, before programs
    /// are released.
    pub fn on_tick_begin<F>(&self, listener: F)
    where
        F: FnMut(TickId) -> ListenerControl + Send + 'static,
    {
        lock(&self.shared.listeners.begin).push(Box::new(listener));
    }

    /// Called on the driver thread once per closed tick with its actions.
    pub fn on_tick_end<F>(&self, listener: F)
    where
        F: FnMut(&TickFrame) -> ListenerControl + Send + 'static,
    {
        lock(&self.shared.listeners.end).push(Box::new(listener));
    }

    /// Called on the caller's thread after every state transition.
    pub fn on_state_change<F>(&self, listener: F)
    where
        F: FnMut(ClockState) + Send + 'static,
    {
        lock(&self.shared.listeners.state).push(Box::new(listener));
    }

    /// Replace the render callback, called after the tick-end listeners.
    pub fn set_render_callback<F>(&self, render: F)
    where
        F: FnMut(&TickFrame) + Send + 'static,
    {
        *lock(&self.shared.listeners.render) = Some(Box::new(render));
    }

    // ── Shutdown ────────────────────────────────────────────────

    /// Stop, cancel the gate and join the driver thread.
    ///
    /// Returns whether the driver was joined cleanly. Idempotent.
    pub fn shutdown(&self) -> bool {
        if self.shared.shut_down.swap(true, Ordering::AcqRel) {
            return true;
        }
        {
            let mut state = lock(&self.shared.state);
            *state = ClockState::Stopped;
            self.shared.gate.cancel();
            let _ = self.control.send(Control::Shutdown);
        }
        let Some(handle) = lock(&self.driver).take() else {
            return true;
        };
        if handle.thread().id() == thread::current().id() {
            // Called from a listener; the loop exits after this message.
            return false;
        }
        let joined = handle.join().is_ok();
        tracing::debug!(joined, "clock driver joined");
        joined
    }
}

impl Drop for SimulationClock {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SimulationClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationClock")
            .field("state", &self.state())
            .field("period", &self.period())
            .field("last_tick", &self.last_tick())
            .finish()
    }
}

// Compile-time assertion: the clock handle is shared with program threads
// (fault escalation stops it).
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SimulationClock>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn quiet_log() -> Arc<ActionLog> {
        let log = ActionLog::new();
        log.set_echo(false);
        Arc::new(log)
    }

    fn fast() -> ClockConfig {
        ClockConfig::default().with_tick_period(Duration::from_millis(8))
    }

    #[test]
    fn start_twice_is_rejected() {
        let clock = SimulationClock::new(fast(), quiet_log()).unwrap();
        clock.start().unwrap();
        assert_eq!(clock.start(), Err(ClockError::TimerAlreadyRunning));
        assert_eq!(clock.step().unwrap_err(), ClockError::TimerAlreadyRunning);
        clock.pause();
        assert_eq!(clock.state(), ClockState::Paused);
        clock.start().unwrap();
        clock.stop();
        assert_eq!(clock.state(), ClockState::Stopped);
    }

    #[test]
    fn pause_is_a_noop_unless_running() {
        let clock = SimulationClock::new(fast(), quiet_log()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        clock.on_state_change(move |s| sink.lock().unwrap().push(s));
        clock.pause();
        assert_eq!(clock.state(), ClockState::Stopped);
        clock.start().unwrap();
        clock.pause();
        clock.stop();
        clock.stop();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ClockState::Running, ClockState::Paused, ClockState::Stopped]
        );
    }

    #[test]
    fn step_closes_setup_tick_then_one_tick() {
        let log = quiet_log();
        let clock = SimulationClock::new(fast(), Arc::clone(&log)).unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        clock.on_tick_end(move |frame| {
            sink.lock().unwrap().push(frame.tick());
            ListenerControl::Keep
        });

        let frame = clock.step().unwrap();
        assert_eq!(frame.tick(), TickId(1));
        assert_eq!(clock.last_tick(), Some(TickId(1)));
        assert_eq!(*frames.lock().unwrap(), vec![TickId(0), TickId(1)]);
        assert_eq!(log.current_tick(), TickId(2));

        clock.step().unwrap();
        assert_eq!(clock.metrics().ticks_completed, 2);
    }

    #[test]
    fn running_clock_ticks_and_listeners_can_unregister() {
        let clock = SimulationClock::new(fast(), quiet_log()).unwrap();
        let begun = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&begun);
        clock.on_tick_begin(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            ListenerControl::Remove
        });
        clock.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while clock.metrics().ticks_completed < 3 {
            assert!(Instant::now() < deadline, "clock did not tick");
            thread::sleep(Duration::from_millis(2));
        }
        clock.stop();
        assert_eq!(begun.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn tick_rate_must_be_positive() {
        let clock = SimulationClock::new(fast(), quiet_log()).unwrap();
        assert!(matches!(
            clock.set_tick_rate(0.0),
            Err(ConfigError::InvalidTickRate { .. })
        ));
        assert!(clock.set_tick_rate(f64::NAN).is_err());
        clock.set_tick_rate(4.0).unwrap();
        assert_eq!(clock.period(), Duration::from_millis(250));
    }

    #[test]
    fn extreme_tick_rates_are_errors_not_panics() {
        let clock = SimulationClock::new(fast(), quiet_log()).unwrap();
        let before = clock.period();
        for hz in [1e-30, f64::MIN_POSITIVE, 1e-6, 1e300, f64::INFINITY, -1.0, f64::NAN] {
            assert!(
                matches!(clock.set_tick_rate(hz), Err(ConfigError::InvalidTickRate { .. })),
                "{hz}"
            );
        }
        assert_eq!(clock.period(), before);
        assert!(matches!(
            clock.set_period(Duration::from_secs(u64::MAX)),
            Err(ConfigError::PeriodTooLong { .. })
        ));
        assert_eq!(clock.period(), before);
    }

    #[test]
    fn shutdown_is_final() {
        let clock = SimulationClock::new(fast(), quiet_log()).unwrap();
        assert!(clock.shutdown());
        assert!(clock.shutdown());
        assert_eq!(clock.start(), Err(ClockError::ShutDown));
        assert_eq!(clock.step().unwrap_err(), ClockError::ShutDown);
    }
}
