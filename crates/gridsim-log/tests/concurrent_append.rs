//! Sequence numbers under concurrent appenders.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use gridsim_core::{ActionDraft, ActionKind, ActionSeq, Direction, EntityId};
use gridsim_log::ActionLog;
use proptest::prelude::*;

fn turn(entity: EntityId) -> ActionDraft {
    ActionDraft {
        entity,
        entity_type: "Walker",
        kind: ActionKind::Turn {
            from: Direction::North,
            to: Direction::East,
        },
    }
}

#[test]
fn fifty_threads_yield_contiguous_sequence_numbers() {
    let log = Arc::new(ActionLog::new());
    log.set_echo(false);

    let handles: Vec<_> = (0..50)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let id = EntityId::from_raw(1000 + t);
                (0..100).map(|_| log.append(turn(id))).collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let seqs = handle.join().unwrap();
        // Each thread observes its own appends in increasing order.
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        all.extend(seqs);
    }

    assert_eq!(log.len(), 5000);
    assert_eq!(all.len(), 5000);
    assert!((0..5000).all(|n| all.contains(&ActionSeq(n))));

    let snapshot = log.snapshot();
    assert!(snapshot
        .iter()
        .enumerate()
        .all(|(i, a)| a.seq == ActionSeq(i as u64)));
    for t in 0..50 {
        assert_eq!(log.actions_of_entity(EntityId::from_raw(1000 + t)).len(), 100);
    }
}

#[test]
fn replay_runs_alongside_writers() {
    let log = Arc::new(ActionLog::new());
    log.set_echo(false);

    let writer = {
        let log = Arc::clone(&log);
        thread::spawn(move || {
            for _ in 0..2000 {
                log.append(turn(EntityId::from_raw(1)));
            }
        })
    };

    let mut replay = log.replay_from(ActionSeq::START);
    let mut expected = 0;
    while expected < 2000 {
        match replay.next() {
            Some(action) => {
                assert_eq!(action.seq, ActionSeq(expected));
                expected += 1;
            }
            None => thread::yield_now(),
        }
    }
    writer.join().unwrap();
    assert!(replay.next().is_none());
}

proptest! {
    #[test]
    fn segments_cover_every_action_exactly_once(
        ticks in prop::collection::vec(0usize..6, 1..20),
    ) {
        let log = ActionLog::new();
        log.set_echo(false);
        for (n, &count) in ticks.iter().enumerate() {
            for _ in 0..count {
                log.append(turn(EntityId::from_raw(n as u64)));
            }
            log.tick_boundary();
        }

        let segments = log.segments();
        prop_assert_eq!(segments.len(), ticks.len());
        let mut cursor = ActionSeq::START;
        for (segment, &count) in segments.iter().zip(&ticks) {
            prop_assert_eq!(segment.start, cursor);
            prop_assert_eq!(segment.len(), count);
            for action in log.actions_in_tick(segment.tick) {
                prop_assert!(segment.contains(action.seq));
                prop_assert_eq!(action.tick, segment.tick);
            }
            cursor = segment.end;
        }
        prop_assert_eq!(cursor.index(), log.len());
    }
}
