//! Gridsim Quickstart: a tiny platformer level driven by one program.
//!
//! Demonstrates:
//!   1. Defining entity types with capabilities and inspectable members
//!   2. Building a bounded playfield and spawning entities
//!   3. Registering a program that runs in lockstep with the clock
//!   4. Watching closed ticks through the render callback
//!   5. Inspecting entities and verifying the log by replay
//!
//! Run with:
//!   RUST_LOG=info cargo run --example quickstart

use std::sync::Arc;
use std::time::Duration;

use gridsim_core::{
    Collectable, Collector, Describe, Direction, Entity, EntityId, Inspect, Movable, Position,
    SharedEntity, Solid,
};
use gridsim_engine::{Actor, ClockConfig, ProgramError, Simulation, SimulationConfig};
use gridsim_playfield::Bounds;
use tracing_subscriber::EnvFilter;

// ─── Level ──────────────────────────────────────────────────────

const WIDTH: u32 = 12;
const HEIGHT: u32 = 3;
const GROUND: i32 = 2;

// ─── Entity types ───────────────────────────────────────────────

struct Hero {
    id: EntityId,
    name: &'static str,
}

impl Inspect for Hero {
    fn describe(d: &mut Describe<Self>) {
        d.attribute("name", |h: &Hero| h.name.to_owned());
    }
}

impl Movable for Hero {}
impl Collector for Hero {}

impl Entity for Hero {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Hero"
    }
    fn as_movable(&self) -> Option<&dyn Movable> {
        Some(self)
    }
    fn as_collector(&self) -> Option<&dyn Collector> {
        Some(self)
    }
}

struct Brick {
    id: EntityId,
}

impl Inspect for Brick {}
impl Solid for Brick {}

impl Entity for Brick {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Brick"
    }
    fn as_solid(&self) -> Option<&dyn Solid> {
        Some(self)
    }
}

struct Coin {
    id: EntityId,
    value: i64,
}

impl Inspect for Coin {
    fn describe(d: &mut Describe<Self>) {
        d.attribute("value", |c: &Coin| c.value);
    }
}

impl Collectable for Coin {}

impl Entity for Coin {
    fn id(&self) -> EntityId {
        self.id
    }
    fn type_name(&self) -> &'static str {
        "Coin"
    }
    fn as_collectable(&self) -> Option<&dyn Collectable> {
        Some(self)
    }
}

// ─── Program: run right, hop over bricks, grab coins ────────────

fn run_right(actor: &Actor) -> Result<(), ProgramError> {
    loop {
        actor.collect_any()?;
        if actor.move_if_possible()? {
            continue;
        }
        // Blocked: hop over the obstacle if there is headroom.
        let Some(here) = actor.position() else {
            return Ok(());
        };
        if here.x + 1 >= WIDTH as i32 || here.y == 0 {
            return Ok(());
        }
        actor.turn(Direction::North)?;
        actor.move_forward()?;
        actor.turn(Direction::East)?;
        actor.move_forward()?;
        actor.collect_any()?;
        actor.move_forward()?;
        actor.turn(Direction::South)?;
        actor.move_forward()?;
        actor.turn(Direction::East)?;
    }
}

// ─── Main ───────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SimulationConfig {
        clock: ClockConfig::default().with_tick_period(Duration::from_millis(20)),
        bounds: Some(Bounds::new(WIDTH, HEIGHT)),
        echo_actions: false,
    };
    let sim = Simulation::new(config)?;

    let hero = sim.spawn(
        Arc::new(Hero {
            id: EntityId::next(),
            name: "Mario",
        }),
        Position::new(0, GROUND),
        Direction::East,
    )?;
    for x in [4, 8] {
        sim.spawn(
            Arc::new(Brick { id: EntityId::next() }),
            Position::new(x, GROUND),
            Direction::North,
        )?;
    }
    let mut value = 0;
    sim.spawn_each(
        || {
            value += 10;
            Arc::new(Coin {
                id: EntityId::next(),
                value,
            }) as SharedEntity
        },
        [Position::new(2, GROUND), Position::new(4, GROUND - 1), Position::new(10, GROUND)],
        Direction::North,
    )?;

    sim.set_render_callback(|frame| {
        for action in frame.actions.iter() {
            println!("  {action}");
        }
    });

    let program = sim.register_program(hero.id(), run_right)?;
    sim.clock().start()?;
    sim.join_programs(Duration::from_secs(10));
    sim.clock().stop();
    println!("{program}: {:?}", sim.program_state(program)?);

    let hero_info = sim.inspect(hero.id())?;
    println!(
        "{} ended at {:?} carrying {} coin(s)",
        hero_info.value("name").unwrap_or("?"),
        hero.position(),
        hero.inventory().len()
    );
    for coin in hero.inventory() {
        let info = sim.inspect(coin.id())?;
        println!("  coin {} worth {}", coin.id(), info.value("value").unwrap_or("?"));
    }

    let metrics = sim.clock().metrics();
    println!(
        "ticks: {} completed, {} skipped",
        metrics.ticks_completed, metrics.ticks_skipped
    );
    sim.verify_replay()?;
    println!("replay matches the live playfield");
    Ok(())
}
