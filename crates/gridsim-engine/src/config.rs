//! Simulation configuration, validation, and error types.
//!
//! [`SimulationConfig`] is the input to
//! [`Simulation::new`](crate::Simulation::new), which calls
//! [`validate()`](SimulationConfig::validate) before spawning any thread.

use std::time::Duration;

use gridsim_playfield::Bounds;
use thiserror::Error;

// ── ClockConfig ───────────────────────────────────────────────────

/// Timing of the clock driver.
///
/// The driver wakes every `render_period`; every `render_ticks_per_tick`
/// wake-ups it attempts one simulation tick. The defaults give one
/// simulation tick per second.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    /// Driver wake-up interval. Default: 125 ms.
    pub render_period: Duration,
    /// Wake-ups per simulation tick. Default: 8.
    pub render_ticks_per_tick: u32,
    /// How long [`SimulationClock::step`](crate::SimulationClock::step)
    /// waits for programs to finish their unit of work. Default: 5 s.
    pub step_timeout: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            render_period: Duration::from_millis(125),
            render_ticks_per_tick: 8,
            step_timeout: Duration::from_secs(5),
        }
    }
}

impl ClockConfig {
    /// Longest accepted tick period or step timeout.
    pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

    /// Wall-clock length of one simulation tick.
    pub fn tick_period(&self) -> Duration {
        self.render_period * self.render_ticks_per_tick
    }

    /// A config with the given simulation tick period, keeping the
    /// render ratio.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.render_period = period / self.render_ticks_per_tick.max(1);
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_period.is_zero() {
            return Err(ConfigError::InvalidPeriod {
                period: self.render_period,
            });
        }
        if self.render_ticks_per_tick == 0 {
            return Err(ConfigError::InvalidRenderRatio {
                value: self.render_ticks_per_tick,
            });
        }
        if self.step_timeout.is_zero() {
            return Err(ConfigError::InvalidPeriod {
                period: self.step_timeout,
            });
        }
        let tick = self.render_period.checked_mul(self.render_ticks_per_tick);
        for period in [tick.unwrap_or(Duration::MAX), self.step_timeout] {
            if period > Self::MAX_PERIOD {
                return Err(ConfigError::PeriodTooLong {
                    period,
                    max: Self::MAX_PERIOD,
                });
            }
        }
        Ok(())
    }
}

// ── SimulationConfig ──────────────────────────────────────────────

/// Everything needed to build a [`Simulation`](crate::Simulation).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Clock timing.
    pub clock: ClockConfig,
    /// Playfield limits; `None` for an unbounded field.
    pub bounds: Option<Bounds>,
    /// Echo every logged action as a `tracing` info event. Default: true.
    pub echo_actions: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            bounds: None,
            echo_actions: true,
        }
    }
}

impl SimulationConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;
        if let Some(bounds) = self.bounds {
            if bounds.width == 0 || bounds.height == 0 {
                return Err(ConfigError::InvalidBounds { bounds });
            }
        }
        Ok(())
    }
}

// ── ConfigError ───────────────────────────────────────────────────

/// Errors detected while validating or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration that must be positive is zero.
    #[error("period must be positive, got {period:?}")]
    InvalidPeriod {
        /// The rejected value.
        period: Duration,
    },
    /// A period or timeout beyond [`ClockConfig::MAX_PERIOD`].
    #[error("period {period:?} exceeds the maximum of {max:?}")]
    PeriodTooLong {
        /// The rejected value.
        period: Duration,
        /// The limit.
        max: Duration,
    },
    /// The render ratio is zero.
    #[error("render ticks per simulation tick must be at least 1, got {value}")]
    InvalidRenderRatio {
        /// The rejected value.
        value: u32,
    },
    /// A tick rate that is not a positive finite number.
    #[error("tick rate must be positive and finite, got {value}")]
    InvalidTickRate {
        /// The rejected value.
        value: f64,
    },
    /// Bounds with no cells.
    #[error("bounds {bounds} contain no cells")]
    InvalidBounds {
        /// The rejected bounds.
        bounds: Bounds,
    },
    /// The clock driver thread could not be spawned.
    #[error("failed to spawn thread: {reason}")]
    ThreadSpawnFailed {
        /// OS error text.
        reason: String,
    },
}
