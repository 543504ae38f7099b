//! Gridsim: an educational grid-world simulation engine.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all gridsim sub-crates. For most users, adding `gridsim` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use gridsim::prelude::*;
//! use gridsim_test_utils::{Rover, Wall};
//!
//! let sim = Simulation::new(SimulationConfig::default()).unwrap();
//! let rover = sim
//!     .spawn(Arc::new(Rover::new()), Position::new(0, 0), Direction::East)
//!     .unwrap();
//! sim.spawn(Arc::new(Wall::new()), Position::new(2, 0), Direction::East)
//!     .unwrap();
//!
//! rover.move_forward().unwrap();
//! assert!(matches!(
//!     rover.move_forward(),
//!     Err(ActionError::IllegalMove { .. })
//! ));
//! assert_eq!(rover.position(), Some(Position::new(1, 0)));
//! assert_eq!(sim.action_log().actions_of_kind("step").len(), 1);
//! sim.verify_replay().unwrap();
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `gridsim-core` | Geometry, ids, the entity model, inspection primitives, actions |
//! | [`playfield`] | `gridsim-playfield` | The cell store and replay application |
//! | [`log`] | `gridsim-log` | The action log, tick frames and replay cursors |
//! | [`inspect`] | `gridsim-inspect` | Runtime inspection of entity members |
//! | [`engine`] | `gridsim-engine` | Clock, program threads and the simulation facade |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`gridsim-core`).
///
/// Contains [`types::Position`], [`types::Direction`], the
/// [`types::Entity`] trait with its capability mix-ins and the
/// [`types::Action`] records.
pub use gridsim_core as types;

/// The authoritative cell store (`gridsim-playfield`).
pub use gridsim_playfield as playfield;

/// The action log (`gridsim-log`).
///
/// [`log::ActionLog`] records history; [`log::TickFrame`] is what render
/// callbacks and subscribers receive once per tick.
pub use gridsim_log as log;

/// Runtime inspection (`gridsim-inspect`).
pub use gridsim_inspect as inspect;

/// Clock, programs and the simulation facade (`gridsim-engine`).
pub use gridsim_engine as engine;

/// Common imports for typical gridsim usage.
///
/// ```rust
/// use gridsim::prelude::*;
/// ```
pub mod prelude {
    // Geometry and ids
    pub use gridsim_core::{Direction, EntityId, Position, TickId};

    // Entity model
    pub use gridsim_core::{
        Collectable, Collector, Describe, Entity, Inspect, Movable, SharedEntity, Solid, Value,
    };

    // History
    pub use gridsim_core::{Action, ActionKind};
    pub use gridsim_log::{ActionLog, TickFrame};

    // Store
    pub use gridsim_playfield::{Bounds, Placement, Playfield};

    // Inspection
    pub use gridsim_inspect::{InspectionData, InspectionManager};

    // Engine
    pub use gridsim_engine::{
        ActionError, Actor, ClockConfig, ClockState, EntityTypeRegistry, Program, ProgramError,
        ProgramId, ProgramRegistry, ProgramState, Simulation, SimulationClock, SimulationConfig,
        SimulationError,
    };
}
