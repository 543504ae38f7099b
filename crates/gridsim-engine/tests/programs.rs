//! Program threads driven by the clock.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use gridsim_core::{ActionKind, Direction, Entity, Position, TickId};
use gridsim_engine::{
    Actor, ClockConfig, Program, ProgramError, ProgramState, RegistryError, Simulation,
    SimulationConfig, SimulationError,
};
use gridsim_playfield::Bounds;
use gridsim_test_utils::{init_tracing, Coin, Walker, Wall};

fn p(x: i32, y: i32) -> Position {
    Position::new(x, y)
}

fn sim_with_period(period: Duration) -> Simulation {
    init_tracing();
    Simulation::new(SimulationConfig {
        clock: ClockConfig::default().with_tick_period(period),
        bounds: Some(Bounds::new(8, 8)),
        echo_actions: false,
    })
    .unwrap()
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn wait_parked(sim: &Simulation, n: usize) {
    wait_until("programs to park", || sim.clock().gate().parked() == n);
}

#[test]
fn one_operation_per_tick() {
    let sim = sim_with_period(Duration::from_millis(50));
    let walker = sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    let id = walker.id();
    let program = sim
        .register_program(id, |actor: &Actor| -> Result<(), ProgramError> {
            for _ in 0..3 {
                actor.move_forward()?;
            }
            Ok(())
        })
        .unwrap();

    for expected in 1..=3 {
        wait_parked(&sim, 1);
        let frame = sim.clock().step().unwrap();
        assert_eq!(frame.tick(), TickId(expected));
        assert_eq!(frame.actions.len(), 1, "tick {expected}");
        assert!(matches!(frame.actions[0].kind, ActionKind::Move { .. }));
    }
    assert!(sim.join_programs(Duration::from_secs(5)));
    assert_eq!(sim.program_state(program).unwrap(), ProgramState::Finished);
    assert_eq!(walker.position(), Some(p(3, 0)));
    // The setup tick holds the spawn.
    assert_eq!(sim.action_log().actions_in_tick(TickId(0)).len(), 1);
}

#[test]
fn sleep_skips_whole_ticks() {
    let sim = sim_with_period(Duration::from_millis(50));
    let walker = sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    sim.register_program(walker.id(), |actor: &Actor| -> Result<(), ProgramError> {
        actor.sleep(2)?;
        actor.move_forward()?;
        Ok(())
    })
    .unwrap();

    let mut sizes = Vec::new();
    for _ in 0..3 {
        wait_parked(&sim, 1);
        sizes.push(sim.clock().step().unwrap().actions.len());
    }
    assert_eq!(sizes, vec![0, 0, 1]);
}

#[test]
fn render_callback_sees_every_tick_once() {
    let sim = sim_with_period(Duration::from_millis(50));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    sim.set_render_callback(move |frame| sink.lock().unwrap().push(frame.tick()));
    sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    for _ in 0..3 {
        sim.clock().step().unwrap();
    }
    assert_eq!(
        *seen.lock().unwrap(),
        vec![TickId(0), TickId(1), TickId(2), TickId(3)]
    );
}

#[test]
fn stop_mid_run_leaves_positions_consistent_with_the_log() {
    let sim = sim_with_period(Duration::from_millis(2));
    let patrol = |actor: &Actor| -> Result<(), ProgramError> {
        loop {
            if !actor.move_if_possible()? {
                actor.turn_clockwise()?;
            }
        }
    };
    let mut ids = Vec::new();
    // A cross of walls splits the 8x8 field into four pens.
    for i in 0..8 {
        for at in [p(4, i), p(i, 4)] {
            if sim.playfield().entities_at(at).is_empty() {
                sim.spawn(Arc::new(Wall::new()), at, Direction::East).unwrap();
            }
        }
    }
    for start in [p(0, 0), p(5, 0), p(0, 5), p(5, 5)] {
        let walker = sim.spawn(Arc::new(Walker::new()), start, Direction::East).unwrap();
        sim.register_program(walker.id(), patrol).unwrap();
        ids.push(walker.id());
    }
    sim.clock().start().unwrap();
    wait_until("some movement", || sim.action_log().actions_of_kind("step").len() >= 20);
    sim.clock().stop();

    assert!(sim.join_programs(Duration::from_secs(5)));
    for (_, _, state) in sim.programs() {
        assert_eq!(state, ProgramState::Killed);
    }
    for id in ids {
        let last_to = sim
            .action_log()
            .actions_of_entity(id)
            .iter()
            .rev()
            .find_map(|a| match a.kind {
                ActionKind::Move { to, .. } | ActionKind::Teleport { to, .. } => Some(to),
                ActionKind::Spawn { at, .. } => Some(at),
                _ => None,
            });
        assert_eq!(sim.playfield().position_of(id), last_to);
    }
    sim.verify_replay().unwrap();

    // Nothing acts after the stop.
    let len = sim.action_log().len();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(sim.action_log().len(), len);
}

#[test]
fn busy_ticks_skip_slots() {
    let sim = sim_with_period(Duration::from_millis(5));
    let walker = sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    sim.register_program(walker.id(), |actor: &Actor| -> Result<(), ProgramError> {
        actor.turn_clockwise()?;
        // Hold the tick open for several periods.
        thread::sleep(Duration::from_millis(60));
        actor.turn_clockwise()?;
        Ok(())
    })
    .unwrap();
    wait_parked(&sim, 1);
    sim.clock().start().unwrap();
    assert!(sim.join_programs(Duration::from_secs(5)));
    sim.clock().stop();

    let metrics = sim.clock().metrics();
    assert!(metrics.ticks_skipped > 0, "{metrics:?}");
    // Two turns, two different ticks.
    let turns = sim.action_log().actions_of_kind("turn");
    assert_eq!(turns.len(), 2);
    assert!(turns[0].tick < turns[1].tick);
}

#[test]
fn one_program_per_entity() {
    let sim = sim_with_period(Duration::from_millis(50));
    let walker = sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    let idle = |actor: &Actor| -> Result<(), ProgramError> { actor.sleep(u32::MAX).map_err(Into::into) };
    sim.register_program(walker.id(), idle).unwrap();
    assert!(matches!(
        sim.register_program(walker.id(), idle),
        Err(ProgramError::CannotRunProgram { .. })
    ));
    sim.clock().stop();
    assert!(sim.join_programs(Duration::from_secs(5)));
    // Free again once the first program ended.
    sim.register_program(walker.id(), idle).unwrap();
}

struct WalkersOnly;

impl Program for WalkersOnly {
    fn run(&mut self, _actor: &Actor) -> Result<(), ProgramError> {
        Ok(())
    }

    fn can_run_on(&self, entity: &dyn Entity) -> bool {
        entity.type_name() == "Walker"
    }
}

#[test]
fn programs_may_decline_entities() {
    let sim = sim_with_period(Duration::from_millis(50));
    let wall = sim.spawn(Arc::new(Wall::new()), p(0, 0), Direction::East).unwrap();
    let walker = sim.spawn(Arc::new(Walker::new()), p(1, 0), Direction::East).unwrap();
    assert!(matches!(
        sim.register_program(wall.id(), WalkersOnly),
        Err(ProgramError::CannotRunProgram { .. })
    ));
    let id = sim.register_program(walker.id(), WalkersOnly).unwrap();
    assert!(sim.join_programs(Duration::from_secs(5)));
    assert_eq!(sim.program_state(id).unwrap(), ProgramState::Finished);
}

#[test]
fn named_programs_attach_to_entities_that_accept_them() {
    let sim = sim_with_period(Duration::from_millis(50));
    sim.program_registry().register("walkers only", || WalkersOnly).unwrap();
    sim.program_registry()
        .register("east", || {
            |actor: &Actor| -> Result<(), ProgramError> { actor.move_in(Direction::East).map_err(Into::into) }
        })
        .unwrap();
    let wall = sim.spawn(Arc::new(Wall::new()), p(0, 0), Direction::East).unwrap();
    let walker = sim.spawn(Arc::new(Walker::new()), p(1, 0), Direction::East).unwrap();

    assert_eq!(sim.programs_for(walker.id()), vec!["walkers only", "east"]);
    assert_eq!(sim.programs_for(wall.id()), vec!["east"]);
    assert!(sim.programs_for(Coin::new().id()).is_empty());

    assert!(matches!(
        sim.attach_program(wall.id(), "walkers only"),
        Err(SimulationError::Program(ProgramError::CannotRunProgram { .. }))
    ));
    assert!(matches!(
        sim.attach_program(walker.id(), "dance"),
        Err(SimulationError::Registry(RegistryError::UnknownProgram { .. }))
    ));

    let id = sim.attach_program(walker.id(), "east").unwrap();
    wait_parked(&sim, 1);
    sim.clock().step().unwrap();
    assert!(sim.join_programs(Duration::from_secs(5)));
    assert_eq!(sim.program_state(id).unwrap(), ProgramState::Finished);
    assert_eq!(walker.position(), Some(p(2, 0)));
    sim.verify_replay().unwrap();
}

#[test]
fn failing_and_panicking_programs_are_contained() {
    let sim = sim_with_period(Duration::from_millis(50));
    let a = sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    let b = sim.spawn(Arc::new(Walker::new()), p(0, 1), Direction::East).unwrap();
    let failing = sim
        .register_program(a.id(), |_: &Actor| -> Result<(), ProgramError> {
            Err(ProgramError::Failed("gave up".into()))
        })
        .unwrap();
    let panicking = sim
        .register_program(b.id(), |_: &Actor| -> Result<(), ProgramError> {
            panic!("program bug")
        })
        .unwrap();
    assert!(sim.join_programs(Duration::from_secs(5)));
    assert_eq!(sim.program_state(failing).unwrap(), ProgramState::Failed);
    assert_eq!(sim.program_state(panicking).unwrap(), ProgramState::Failed);
    // The clock is unaffected.
    sim.clock().step().unwrap();
}

#[test]
fn contested_pickup_goes_to_one_program_and_nobody_fails() {
    let sim = sim_with_period(Duration::from_millis(50));
    let coin = sim.spawn(Arc::new(Coin::new()), p(2, 2), Direction::North).unwrap();
    let results = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let walker = sim.spawn(Arc::new(Walker::new()), p(2, 2), Direction::East).unwrap();
        let sink = Arc::clone(&results);
        sim.register_program(walker.id(), move |actor: &Actor| -> Result<(), ProgramError> {
            let picked = actor.collect_any();
            sink.lock().unwrap().push(picked.clone());
            picked.map(|_| ()).map_err(Into::into)
        })
        .unwrap();
    }
    // Both programs saw the coin before the tick opened.
    wait_parked(&sim, 2);
    let frame = sim.clock().step().unwrap();
    assert!(sim.join_programs(Duration::from_secs(5)));

    let mut results = results.lock().unwrap().clone();
    results.sort_by_key(|r| r.as_ref().ok().copied().flatten().is_some());
    assert_eq!(results, vec![Ok(None), Ok(Some(coin.id()))]);
    assert_eq!(frame.actions.len(), 1);
    assert!(matches!(frame.actions[0].kind, ActionKind::Collect { target, .. } if target == coin.id()));
    for (_, _, state) in sim.programs() {
        assert_eq!(state, ProgramState::Finished);
    }
}
