//! Benchmark fixtures for the gridsim grid-world engine.
//!
//! - [`crowded_field`]: a square field with a wall border and a grid of walkers
//! - [`quiet_simulation`]: a bounded simulation with action echo turned off

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use gridsim_core::{Direction, Entity, EntityId, Position};
use gridsim_engine::{Simulation, SimulationConfig};
use gridsim_playfield::{Bounds, FieldWriter};
use gridsim_test_utils::{Walker, Wall};

/// A `size` x `size` field walled in on every edge, with a walker on
/// every `spacing`-th interior cell. Returns the field and the walker ids.
pub fn crowded_field(size: u32, spacing: u32) -> (FieldWriter, Vec<EntityId>) {
    let field = FieldWriter::with_bounds(Some(Bounds::new(size, size)));
    let mut walkers = Vec::new();
    {
        let mut state = field.write();
        let last = size as i32 - 1;
        for x in 0..=last {
            for y in 0..=last {
                let at = Position::new(x, y);
                if x == 0 || y == 0 || x == last || y == last {
                    state
                        .place(Arc::new(Wall::new()), at, Direction::North)
                        .unwrap();
                } else if (x as u32 % spacing.max(1)) == 0 && (y as u32 % spacing.max(1)) == 0 {
                    let walker = Arc::new(Walker::new());
                    walkers.push(walker.id());
                    state.place(walker, at, Direction::East).unwrap();
                }
            }
        }
    }
    (field, walkers)
}

/// A bounded simulation that does not echo actions to the tracing output.
pub fn quiet_simulation(size: u32) -> Simulation {
    Simulation::new(SimulationConfig {
        bounds: Some(Bounds::new(size, size)),
        echo_actions: false,
        ..SimulationConfig::default()
    })
    .unwrap()
}
