//! Criterion micro-benchmarks for the playfield and entity operations.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use gridsim_bench::{crowded_field, quiet_simulation};
use gridsim_core::{Direction, Position};
use gridsim_playfield::Playfield;
use gridsim_test_utils::Walker;

/// Benchmark: blocked-cell queries over every cell of a 100x100 field.
fn bench_is_blocked_10k(c: &mut Criterion) {
    let (field, _) = crowded_field(100, 3);

    c.bench_function("is_blocked_100x100", |b| {
        b.iter(|| {
            let state = field.read();
            let mut blocked = 0;
            for x in 0..100 {
                for y in 0..100 {
                    blocked += usize::from(state.is_blocked(Position::new(x, y)));
                }
            }
            black_box(blocked);
        });
    });
}

/// Benchmark: shuffle ~1000 walkers one cell east and back under one
/// write lock.
fn bench_relocate_walkers(c: &mut Criterion) {
    let (field, walkers) = crowded_field(100, 3);

    c.bench_function("relocate_1k_walkers", |b| {
        b.iter(|| {
            let mut state = field.write();
            for id in &walkers {
                let from = state.relocate(*id, Position::new(1, 1)).unwrap();
                state.relocate(*id, from).unwrap();
            }
        });
    });
}

/// Benchmark: ungated actor steps through the facade, logging each one.
fn bench_actor_moves(c: &mut Criterion) {
    c.bench_function("actor_move_1k", |b| {
        b.iter(|| {
            let sim = quiet_simulation(64);
            let actor = sim
                .spawn(Arc::new(Walker::new()), Position::new(0, 0), Direction::East)
                .unwrap();
            for _ in 0..1000 {
                if !actor.move_if_possible().unwrap() {
                    actor.turn_clockwise().unwrap();
                }
            }
            black_box(sim.action_log().len());
        });
    });
}

/// Benchmark: rebuild a playfield from a 2K-action log.
fn bench_rebuild_from_log(c: &mut Criterion) {
    let sim = quiet_simulation(32);
    let actors: Vec<_> = (0..8)
        .map(|i| {
            sim.spawn(Arc::new(Walker::new()), Position::new(0, i * 4), Direction::East)
                .unwrap()
        })
        .collect();
    for _ in 0..250 {
        for actor in &actors {
            if !actor.move_if_possible().unwrap() {
                actor.turn_clockwise().unwrap();
            }
        }
    }
    let actions = sim.action_log().snapshot();
    let bounds = sim.playfield().bounds();

    c.bench_function("rebuild_from_2k_actions", |b| {
        b.iter(|| black_box(Playfield::rebuild(bounds, &actions).unwrap().len()));
    });
}

criterion_group!(
    benches,
    bench_is_blocked_10k,
    bench_relocate_walkers,
    bench_actor_moves,
    bench_rebuild_from_log
);
criterion_main!(benches);
