//! Entity operations through the facade, checked against the log.

use std::sync::Arc;

use gridsim_core::{ActionKind, Direction, Entity, Position, SharedEntity};
use gridsim_engine::{
    ActionError, ClockError, RegistryError, Simulation, SimulationConfig, SimulationError,
};
use gridsim_playfield::{Bounds, PlayfieldError};
use gridsim_test_utils::{init_tracing, Bag, Coin, Rover, Walker, Wall};
use proptest::prelude::*;

fn p(x: i32, y: i32) -> Position {
    Position::new(x, y)
}

fn quiet(bounds: Option<Bounds>) -> Simulation {
    init_tracing();
    Simulation::new(SimulationConfig {
        bounds,
        echo_actions: false,
        ..SimulationConfig::default()
    })
    .unwrap()
}

#[test]
fn blocked_rover_stays_put_and_logs_nothing() {
    let sim = quiet(None);
    let a = sim.spawn(Arc::new(Rover::new()), p(0, 0), Direction::East).unwrap();
    let b = sim.spawn(Arc::new(Rover::new()), p(1, 0), Direction::East).unwrap();
    let before = sim.action_log().len();

    let err = a.move_forward().unwrap_err();
    assert!(matches!(err, ActionError::IllegalMove { entity, .. } if entity == a.id()));
    assert_eq!(sim.action_log().len(), before);
    assert_eq!(a.position(), Some(p(0, 0)));
    assert!(sim.playfield().entity_ids_at(p(0, 0)).contains(&a.id()));

    // Once B leaves, A may follow.
    b.move_forward().unwrap();
    a.move_forward().unwrap();
    assert_eq!(a.position(), Some(p(1, 0)));
    assert_eq!(b.position(), Some(p(2, 0)));
    sim.verify_replay().unwrap();
}

#[test]
fn coin_collection_walkthrough() {
    let sim = quiet(Some(Bounds::new(5, 1)));
    let walker = sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    let coins = sim
        .spawn_each(|| Arc::new(Coin::worth(5)) as SharedEntity, [p(1, 0), p(3, 0)], Direction::North)
        .unwrap();

    let mut picked = Vec::new();
    while walker.move_if_possible().unwrap() {
        if let Some(id) = walker.collect_any().unwrap() {
            picked.push(id);
        }
    }
    assert_eq!(walker.position(), Some(p(4, 0)));
    assert_eq!(picked, vec![coins[0].id(), coins[1].id()]);
    assert_eq!(walker.inventory().len(), 2);
    assert_eq!(coins[0].position(), None);

    walker.drop_at(coins[1].id(), p(3, 0)).unwrap();
    assert_eq!(sim.playfield().position_of(coins[1].id()), Some(p(3, 0)));
    let drops = sim.action_log().actions_of_kind("drop");
    assert!(matches!(
        drops[0].kind,
        ActionKind::Drop { target, target_type: "Coin", at } if target == coins[1].id() && at == p(3, 0)
    ));
    sim.verify_replay().unwrap();
}

#[test]
fn registry_names_are_unique() {
    let sim = quiet(None);
    sim.registry()
        .register("Wall", || Arc::new(Wall::new()) as SharedEntity)
        .unwrap();
    assert_eq!(
        sim.registry()
            .register("Wall", || Arc::new(Wall::new()) as SharedEntity)
            .unwrap_err(),
        RegistryError::ElementExists {
            name: "Wall".into()
        }
    );
    let wall = sim.spawn_type("Wall", p(2, 2), Direction::South).unwrap();
    assert_eq!(wall.entity().unwrap().type_name(), "Wall");
    assert!(matches!(
        sim.spawn_type("Lava", p(0, 0), Direction::South),
        Err(SimulationError::Registry(RegistryError::UnknownType { .. }))
    ));
}

#[test]
fn clock_cannot_be_stepped_or_started_while_running() {
    let sim = quiet(None);
    sim.clock().start().unwrap();
    assert_eq!(sim.clock().start(), Err(ClockError::TimerAlreadyRunning));
    assert_eq!(
        sim.clock().step().unwrap_err(),
        ClockError::TimerAlreadyRunning
    );
    sim.clock().pause();
    sim.clock().step().unwrap();
    let report = sim.shutdown();
    assert!(report.driver_joined);
    assert_eq!(sim.clock().start(), Err(ClockError::ShutDown));
}

#[test]
fn an_entity_cannot_join_a_second_simulation() {
    let a = quiet(None);
    let b = quiet(None);
    let walker: SharedEntity = Arc::new(Walker::new());
    let id = walker.id();

    a.spawn(Arc::clone(&walker), p(0, 0), Direction::East).unwrap();
    assert!(matches!(
        b.spawn(Arc::clone(&walker), p(0, 0), Direction::East),
        Err(SimulationError::Playfield(PlayfieldError::EntityOnAnotherField { entity })) if entity == id
    ));
    assert!(b.playfield().is_empty());
    assert!(b.action_log().is_empty());
    a.verify_replay().unwrap();

    a.despawn(id).unwrap();
    b.spawn(Arc::clone(&walker), p(3, 3), Direction::East).unwrap();
    assert_eq!(b.playfield().position_of(id), Some(p(3, 3)));

    // Dropping a simulation frees everything it held.
    drop(b);
    a.spawn(walker, p(1, 1), Direction::East).unwrap();
    a.verify_replay().unwrap();
}

#[test]
fn despawning_a_carrier_takes_nested_items_along() {
    let sim = quiet(None);
    let walker = sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap();
    let bag = sim.spawn(Arc::new(Bag::new()), p(0, 0), Direction::East).unwrap();
    let coin: SharedEntity = Arc::new(Coin::new());
    let coin_id = coin.id();
    sim.spawn(Arc::clone(&coin), p(0, 0), Direction::East).unwrap();

    bag.collect(coin_id).unwrap();
    walker.collect(bag.id()).unwrap();
    assert_eq!(sim.playfield().carrier_of(coin_id), Some(bag.id()));
    assert_eq!(sim.playfield().carrier_of(bag.id()), Some(walker.id()));

    sim.despawn(walker.id()).unwrap();
    assert!(sim.playfield().is_empty());
    assert!(sim.playfield().read().check_invariants().is_ok());
    sim.verify_replay().unwrap();

    // The coin went with the walker and is free to be spawned again.
    sim.spawn(coin, p(2, 2), Direction::North).unwrap();
    sim.verify_replay().unwrap();
}

// ── Random operation sequences ──────────────────────────────────

#[derive(Clone, Debug)]
enum Op {
    Move(usize, Direction),
    Forward(usize),
    Turn(usize, Direction),
    Teleport(usize, i32, i32),
    CollectAny(usize),
    DropFirst(usize, Direction),
    Despawn(usize),
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::North),
        Just(Direction::East),
        Just(Direction::South),
        Just(Direction::West),
    ]
}

fn op(actors: usize) -> impl Strategy<Value = Op> {
    let who = 0..actors;
    prop_oneof![
        4 => (who.clone(), direction()).prop_map(|(a, d)| Op::Move(a, d)),
        3 => who.clone().prop_map(Op::Forward),
        2 => (who.clone(), direction()).prop_map(|(a, d)| Op::Turn(a, d)),
        1 => (who.clone(), -1..7, -1..7).prop_map(|(a, x, y)| Op::Teleport(a, x, y)),
        2 => who.clone().prop_map(Op::CollectAny),
        2 => (who.clone(), direction()).prop_map(|(a, d)| Op::DropFirst(a, d)),
        1 => who.prop_map(Op::Despawn),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn replay_reproduces_any_history(ops in prop::collection::vec(op(4), 1..80)) {
        let sim = quiet(Some(Bounds::new(6, 6)));
        let actors = vec![
            sim.spawn(Arc::new(Walker::new()), p(0, 0), Direction::East).unwrap(),
            sim.spawn(Arc::new(Walker::new()), p(5, 5), Direction::West).unwrap(),
            sim.spawn(Arc::new(Rover::new()), p(2, 2), Direction::North).unwrap(),
            sim.spawn(Arc::new(Rover::new()), p(3, 3), Direction::South).unwrap(),
        ];
        sim.spawn(Arc::new(Wall::new()), p(1, 1), Direction::North).unwrap();
        sim.spawn_many(|| Arc::new(Coin::new()) as SharedEntity, 3, p(1, 0), Direction::North).unwrap();
        sim.spawn_many(|| Arc::new(Coin::new()) as SharedEntity, 2, p(4, 4), Direction::North).unwrap();

        for op in ops {
            let before = sim.action_log().len();
            let result = match op {
                Op::Move(a, d) => actors[a].move_in(d),
                Op::Forward(a) => actors[a].move_forward(),
                Op::Turn(a, d) => actors[a].turn(d),
                Op::Teleport(a, x, y) => actors[a].teleport(p(x, y)),
                Op::CollectAny(a) => actors[a].collect_any().map(|_| ()),
                Op::DropFirst(a, d) => match (actors[a].inventory().first(), actors[a].position()) {
                    (Some(item), Some(here)) => actors[a].drop_at(item.id(), here.adjacent(d).unwrap()),
                    _ => Ok(()),
                },
                Op::Despawn(a) => sim.despawn(actors[a].id()).map(|_| ()).map_err(|_| {
                    ActionError::EntityNotOnField { entity: actors[a].id() }
                }),
            };
            let after = sim.action_log().len();
            match result {
                // Queries-only paths (empty inventory, nothing to collect) log nothing either.
                Ok(()) => prop_assert!(after == before || after == before + 1),
                Err(ref e) => {
                    prop_assert!(!matches!(e, ActionError::Fault { .. }), "{e}");
                    prop_assert_eq!(after, before);
                }
            }
            prop_assert!(sim.playfield().read().check_invariants().is_ok());
        }
        prop_assert!(sim.last_fault().is_none());
        sim.verify_replay().unwrap();
    }
}
