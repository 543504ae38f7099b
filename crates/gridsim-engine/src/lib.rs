//! Clock, program threads and the simulation facade.
//!
//! # Architecture
//!
//! ```text
//! Program threads (N)          Clock driver ("gridsim-clock")     Render side
//!     |                               |                               |
//!     | actor.move_forward()          |                               |
//!     |   gate.wait_turn() --parks--> | begin_tick: release parked    |
//!     | <-------released------------- |                               |
//!     |   playfield.write()           |                               |
//!     |   validate + mutate           |                               |
//!     |   log.append()                |                               |
//!     | next op: wait_turn() -------> | all parked -> end_tick        |
//!     |                               |   log.close_tick()            |
//!     |                               |   listeners / render -------> |
//!     |                               | select! { control, idle,      |
//!     |                               |   at(next_slot) }             |
//! ```
//!
//! The driver never sleeps on a fixed budget: each loop iteration
//! `select!`s over control messages, gate idle notifications and a
//! `crossbeam_channel::at(next_slot)` timer that is armed only while the
//! clock runs.
//!
//! [`Simulation`] ties the pieces together and is the only outside entry
//! point for spawning, despawning and registering programs.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod actor;
pub mod clock;
pub mod config;
mod driver;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod program;
pub mod registry;
pub mod simulation;
mod world;

pub use actor::Actor;
pub use clock::{ClockState, ListenerControl, SimulationClock};
pub use config::{ClockConfig, ConfigError, SimulationConfig};
pub use error::{ActionError, ClockError, ProgramError, RegistryError, SimulationError};
pub use gate::{Cancelled, GatePass, TickGate};
pub use metrics::ClockMetrics;
pub use program::{Program, ProgramId, ProgramState};
pub use registry::{EntityTypeRegistry, ProgramRegistry};
pub use simulation::{compare_layouts, EntityDivergence, Fault, ShutdownReport, Simulation};
