//! The clock driver loop.
//!
//! The driver thread owns tick timing. It waits on three sources at once:
//! control messages from the [`SimulationClock`](crate::SimulationClock)
//! handle, idle notifications from the [`TickGate`](crate::TickGate), and
//! the next tick slot while running. A slot that arrives while the
//! previous tick is still busy is skipped, never queued.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{select, Receiver, Sender};
use gridsim_core::TickId;
use gridsim_log::TickFrame;

use crate::clock::ClockShared;
use crate::error::ClockError;

/// Messages from the clock handle.
pub(crate) enum Control {
    Start,
    Pause,
    Stop,
    Step(Sender<Result<TickFrame, ClockError>>),
    Reschedule,
    Shutdown,
}

pub(crate) struct Driver {
    shared: Arc<ClockShared>,
    control: Receiver<Control>,
    idle: Receiver<u64>,
    running: bool,
    next_slot: Instant,
    began_at: Option<Instant>,
}

impl Driver {
    pub(crate) fn new(
        shared: Arc<ClockShared>,
        control: Receiver<Control>,
        idle: Receiver<u64>,
    ) -> Self {
        Self {
            shared,
            control,
            idle,
            running: false,
            next_slot: Instant::now(),
            began_at: None,
        }
    }

    /// Main loop. Runs until `Shutdown` or the handle is dropped.
    pub(crate) fn run(mut self) {
        tracing::debug!("clock driver started");
        let control = self.control.clone();
        let idle = self.idle.clone();
        loop {
            let slot = if self.running {
                crossbeam_channel::at(self.next_slot)
            } else {
                crossbeam_channel::never()
            };
            select! {
                recv(control) -> msg => match msg {
                    Ok(Control::Shutdown) | Err(_) => break,
                    Ok(msg) => self.handle(msg),
                },
                recv(idle) -> tick => {
                    if let Ok(tick) = tick {
                        self.on_idle(TickId(tick));
                    }
                },
                recv(slot) -> _ => self.on_slot(),
            }
        }
        if let Some(tick) = self.shared.gate.force_end_tick() {
            self.end_tick(tick);
        }
        tracing::debug!("clock driver stopped");
    }

    fn handle(&mut self, msg: Control) {
        match msg {
            Control::Start => {
                self.running = true;
                self.next_slot = Instant::now();
            }
            Control::Pause => self.running = false,
            Control::Stop => {
                self.running = false;
                if let Some(tick) = self.shared.gate.force_end_tick() {
                    self.end_tick(tick);
                }
            }
            Control::Step(reply) => {
                let _ = reply.send(self.step());
            }
            Control::Reschedule => {
                if self.running {
                    let candidate = Instant::now() + self.shared.tick_period();
                    self.next_slot = self.next_slot.min(candidate);
                }
            }
            // Handled by the loop.
            Control::Shutdown => {}
        }
    }

    fn on_idle(&mut self, tick: TickId) {
        if self.shared.gate.try_end_tick(tick) {
            self.end_tick(tick);
        }
    }

    fn on_slot(&mut self) {
        let now = Instant::now();
        self.next_slot += self.shared.tick_period();
        if self.next_slot < now {
            self.next_slot = now + self.shared.tick_period();
        }

        let gate = &self.shared.gate;
        if gate.in_tick() {
            let skipped = self.shared.metrics.record_skip();
            tracing::warn!(
                tick = gate.tick().0,
                busy = gate.busy(),
                skipped,
                "previous tick still busy, slot skipped"
            );
            return;
        }
        self.begin_tick();
    }

    /// Begin the next tick. Returns its frame if nobody was released and
    /// the tick ended on the spot.
    fn begin_tick(&mut self) -> (TickId, Option<TickFrame>) {
        let next = self.shared.gate.tick().next();
        // Close everything logged since the last tick (the setup tick
        // before the first one) so the log's open tick matches.
        while self.shared.log.current_tick() < next {
            let frame = self.shared.log.close_tick();
            self.shared.deliver(&frame);
        }

        self.shared.fire_tick_begin(next);
        let (tick, released) = self.shared.gate.begin_tick();
        self.shared.metrics.record_begin(released);
        self.began_at = Some(Instant::now());
        tracing::debug!(tick = tick.0, released, "tick began");

        if self.shared.gate.try_end_tick(tick) {
            let frame = self.end_tick(tick);
            (tick, Some(frame))
        } else {
            (tick, None)
        }
    }

    fn end_tick(&mut self, tick: TickId) -> TickFrame {
        let frame = self.shared.log.close_tick();
        let elapsed_us = self
            .began_at
            .take()
            .map(|t| t.elapsed().as_micros() as u64)
            .unwrap_or(0);
        self.shared.metrics.record_end(elapsed_us);
        self.shared.set_last_tick(tick);
        tracing::debug!(
            tick = tick.0,
            actions = frame.actions.len(),
            elapsed_us,
            "tick ended"
        );
        self.shared.deliver(&frame);
        frame
    }

    fn step(&mut self) -> Result<TickFrame, ClockError> {
        if self.running {
            return Err(ClockError::TimerAlreadyRunning);
        }
        let timeout = self.shared.config().step_timeout;

        // A tick left open by pause finishes before the stepped one.
        if self.shared.gate.in_tick() {
            let open = self.shared.gate.tick();
            if self.shared.gate.try_end_tick(open) {
                self.end_tick(open);
            } else {
                self.await_idle(open, Instant::now() + timeout)?;
            }
        }

        match self.begin_tick() {
            (_, Some(frame)) => Ok(frame),
            (tick, None) => self.await_idle(tick, Instant::now() + timeout),
        }
    }

    fn await_idle(&mut self, tick: TickId, deadline: Instant) -> Result<TickFrame, ClockError> {
        loop {
            match self.idle.recv_deadline(deadline) {
                Ok(t) if t == tick.0 && self.shared.gate.try_end_tick(tick) => {
                    return Ok(self.end_tick(tick));
                }
                Ok(_) => continue,
                Err(_) => {
                    tracing::warn!(tick = tick.0, "stepped tick did not finish in time");
                    return Err(ClockError::StepTimedOut { tick: tick.0 });
                }
            }
        }
    }
}
