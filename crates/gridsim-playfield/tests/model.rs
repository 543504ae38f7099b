//! The store against a plain map model: no ghosts, no duplicates.

use std::collections::BTreeMap;
use std::sync::Arc;

use gridsim_core::{Direction, Entity, EntityId, Position};
use gridsim_playfield::{Bounds, FieldState, FieldWriter, Placement};
use gridsim_test_utils::{Coin, Walker, Wall};
use proptest::prelude::*;

const SIZE: u32 = 5;

#[derive(Clone, Debug)]
enum Op {
    Relocate(usize, i32, i32),
    Face(usize, Direction),
    Carry(usize, usize),
    Release(usize, usize, i32, i32),
    Remove(usize),
}

fn coord() -> impl Strategy<Value = i32> {
    -1..(SIZE as i32 + 1)
}

fn op() -> impl Strategy<Value = Op> {
    let direction = prop_oneof![
        Just(Direction::North),
        Just(Direction::East),
        Just(Direction::South),
        Just(Direction::West),
    ];
    prop_oneof![
        4 => (0..3usize, coord(), coord()).prop_map(|(w, x, y)| Op::Relocate(w, x, y)),
        1 => (0..3usize, direction).prop_map(|(w, d)| Op::Face(w, d)),
        3 => (0..3usize, 0..4usize).prop_map(|(w, c)| Op::Carry(w, c)),
        3 => (0..3usize, 0..4usize, coord(), coord()).prop_map(|(w, c, x, y)| Op::Release(w, c, x, y)),
        1 => (0..3usize).prop_map(Op::Remove),
    ]
}

type Model = BTreeMap<EntityId, (Placement, Direction)>;

fn in_bounds(pos: Position) -> bool {
    Bounds::new(SIZE, SIZE).contains(pos)
}

fn on_field(model: &Model, id: EntityId) -> Option<Position> {
    match model.get(&id)?.0 {
        Placement::OnField(at) => Some(at),
        Placement::Carried { .. } => None,
    }
}

/// Apply `op` to both sides; the store must succeed exactly when the
/// model says the operation is structurally valid.
fn apply(state: &mut FieldState, model: &mut Model, walkers: &[EntityId], coins: &[EntityId], op: Op) {
    match op {
        Op::Relocate(w, x, y) => {
            let (id, to) = (walkers[w], Position::new(x, y));
            let valid = on_field(model, id).is_some() && in_bounds(to);
            assert_eq!(state.relocate(id, to).is_ok(), valid, "relocate {id} to {to}");
            if valid {
                model.get_mut(&id).unwrap().0 = Placement::OnField(to);
            }
        }
        Op::Face(w, facing) => {
            let id = walkers[w];
            let valid = model.contains_key(&id);
            assert_eq!(state.set_facing(id, facing).is_ok(), valid);
            if valid {
                model.get_mut(&id).unwrap().1 = facing;
            }
        }
        Op::Carry(w, c) => {
            let (by, item) = (walkers[w], coins[c]);
            let valid = on_field(model, by).is_some() && on_field(model, item).is_some();
            assert_eq!(state.carry(by, item).is_ok(), valid, "{by} carries {item}");
            if valid {
                model.get_mut(&item).unwrap().0 = Placement::Carried { by };
            }
        }
        Op::Release(w, c, x, y) => {
            let (by, item, at) = (walkers[w], coins[c], Position::new(x, y));
            let carried = matches!(model.get(&item), Some((Placement::Carried { by: b }, _)) if *b == by);
            let valid = carried && in_bounds(at);
            assert_eq!(state.release(by, item, at).is_ok(), valid, "{by} releases {item} at {at}");
            if valid {
                model.get_mut(&item).unwrap().0 = Placement::OnField(at);
            }
        }
        Op::Remove(w) => {
            let id = walkers[w];
            let valid = on_field(model, id).is_some();
            assert_eq!(state.remove(id).is_ok(), valid);
            if valid {
                model.remove(&id);
                model.retain(|_, (placement, _)| *placement != Placement::Carried { by: id });
            }
        }
    }
}

proptest! {
    #[test]
    fn store_tracks_the_model(ops in prop::collection::vec(op(), 1..120)) {
        let field = FieldWriter::with_bounds(Some(Bounds::new(SIZE, SIZE)));
        let mut model = Model::new();
        let mut walkers = Vec::new();
        let mut coins = Vec::new();
        {
            let mut state = field.write();
            for i in 0..3 {
                let w = Arc::new(Walker::new());
                let at = Position::new(i, 0);
                walkers.push(w.id());
                model.insert(w.id(), (Placement::OnField(at), Direction::East));
                state.place(w, at, Direction::East).unwrap();
            }
            for i in 0..4 {
                let c = Arc::new(Coin::new());
                let at = Position::new(i, 2);
                coins.push(c.id());
                model.insert(c.id(), (Placement::OnField(at), Direction::North));
                state.place(c, at, Direction::North).unwrap();
            }
            let wall = Arc::new(Wall::new());
            model.insert(wall.id(), (Placement::OnField(Position::new(4, 4)), Direction::South));
            state.place(wall, Position::new(4, 4), Direction::South).unwrap();
        }

        for op in ops {
            let mut state = field.write();
            apply(&mut state, &mut model, &walkers, &coins, op);
            prop_assert!(state.check_invariants().is_ok(), "{:?}", state.check_invariants());
            prop_assert_eq!(&state.layout(), &model);
        }

        // Every on-field entity is listed in exactly its own cell.
        let state = field.read();
        let mut listed = 0;
        for x in -1..=SIZE as i32 {
            for y in -1..=SIZE as i32 {
                for id in state.entity_ids_at(Position::new(x, y)) {
                    prop_assert_eq!(on_field(&model, id), Some(Position::new(x, y)));
                    listed += 1;
                }
            }
        }
        let expected = model.keys().filter(|id| on_field(&model, **id).is_some()).count();
        prop_assert_eq!(listed, expected);
    }
}

#[test]
fn solids_cannot_share_a_cell_on_placement() {
    let field = FieldWriter::new();
    let mut state = field.write();
    state.place(Arc::new(Wall::new()), Position::new(0, 0), Direction::North).unwrap();
    assert!(state
        .place(Arc::new(Wall::new()), Position::new(0, 0), Direction::North)
        .is_err());
    state.place(Arc::new(Coin::new()), Position::new(0, 0), Direction::North).unwrap();
    assert_eq!(state.entity_ids_at(Position::new(0, 0)).len(), 2);
}
