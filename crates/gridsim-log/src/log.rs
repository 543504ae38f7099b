//! The append-only log.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use gridsim_core::{Action, ActionDraft, ActionSeq, EntityId, TickId};
use indexmap::IndexMap;

use crate::frame::{TickFrame, TickSegment};
use crate::replay::Replay;

struct LogInner {
    actions: Vec<Action>,
    segments: Vec<TickSegment>,
    by_entity: IndexMap<EntityId, Vec<ActionSeq>>,
    open_tick: TickId,
    open_start: ActionSeq,
}

/// Append-only, tick-segmented history of actions.
///
/// Shared between entity operations (writers), the clock (tick
/// boundaries) and any number of readers.
///
/// # Examples
///
/// ```
/// use gridsim_core::{ActionDraft, ActionKind, ActionSeq, EntityId, Position};
/// use gridsim_log::ActionLog;
///
/// let log = ActionLog::new();
/// let seq = log.append(ActionDraft {
///     entity: EntityId::from_raw(1),
///     entity_type: "Walker",
///     kind: ActionKind::Move { from: Position::new(0, 0), to: Position::new(1, 0) },
/// });
/// assert_eq!(seq, ActionSeq(0));
///
/// let segment = log.tick_boundary();
/// assert_eq!(segment.len(), 1);
/// assert_eq!(log.replay_from(ActionSeq(0)).count(), 1);
/// ```
pub struct ActionLog {
    inner: Mutex<LogInner>,
    published: AtomicU64,
    echo: AtomicBool,
    subscribers: Mutex<Vec<Sender<TickFrame>>>,
}

impl ActionLog {
    /// An empty log positioned at tick 0, echo on.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                actions: Vec::new(),
                segments: Vec::new(),
                by_entity: IndexMap::new(),
                open_tick: TickId(0),
                open_start: ActionSeq::START,
            }),
            published: AtomicU64::new(0),
            echo: AtomicBool::new(true),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Writers ─────────────────────────────────────────────────

    /// Append a draft, returning its sequence number.
    ///
    /// Sequence numbers are contiguous and strictly increasing across all
    /// concurrent appenders.
    pub fn append(&self, draft: ActionDraft) -> ActionSeq {
        let (seq, echoed) = {
            let mut inner = self.lock();
            let seq = ActionSeq(inner.actions.len() as u64);
            let action = Action::from_draft(seq, inner.open_tick, draft);
            inner.by_entity.entry(action.entity).or_default().push(seq);
            let echoed = self.echo.load(Ordering::Relaxed).then(|| action.to_string());
            inner.actions.push(action);
            self.published.store(seq.0 + 1, Ordering::Release);
            (seq, echoed)
        };
        if let Some(line) = echoed {
            tracing::info!(target: "gridsim::actions", seq = seq.0, "{line}");
        }
        seq
    }

    /// Close the open tick and open the next one.
    ///
    /// Called exactly once per clock tick. See [`ActionLog::close_tick`]
    /// for the variant that also returns the tick's actions.
    pub fn tick_boundary(&self) -> TickSegment {
        self.close_tick().segment
    }

    /// Close the open tick, returning it as a [`TickFrame`].
    ///
    /// Subscribers receive a clone of the frame; disconnected subscribers
    /// are dropped.
    pub fn close_tick(&self) -> TickFrame {
        let frame = {
            let mut inner = self.lock();
            let end = ActionSeq(inner.actions.len() as u64);
            let segment = TickSegment {
                tick: inner.open_tick,
                start: inner.open_start,
                end,
            };
            inner.segments.push(segment);
            inner.open_tick = inner.open_tick.next();
            inner.open_start = end;
            TickFrame {
                segment,
                actions: inner.actions[segment.start.index()..end.index()].into(),
            }
        };

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
        frame
    }

    /// Receive every tick closed from now on.
    pub fn subscribe(&self) -> Receiver<TickFrame> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Toggle emitting each appended action as a `tracing` info event.
    pub fn set_echo(&self, enabled: bool) {
        self.echo.store(enabled, Ordering::Relaxed);
    }

    /// Whether appended actions are echoed.
    pub fn echo_enabled(&self) -> bool {
        self.echo.load(Ordering::Relaxed)
    }

    // ── Readers ─────────────────────────────────────────────────

    /// Number of published actions.
    pub fn len(&self) -> usize {
        self.published.load(Ordering::Acquire) as usize
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The action with sequence number `seq`.
    pub fn get(&self, seq: ActionSeq) -> Option<Action> {
        self.lock().actions.get(seq.index()).cloned()
    }

    /// The tick new actions are stamped with.
    pub fn current_tick(&self) -> TickId {
        self.lock().open_tick
    }

    /// The closed segment of `tick`.
    pub fn segment(&self, tick: TickId) -> Option<TickSegment> {
        // Segments are pushed in tick order, one per tick.
        let inner = self.lock();
        inner
            .segments
            .get(tick.0 as usize)
            .copied()
            .filter(|s| s.tick == tick)
    }

    /// Every closed segment, oldest first.
    pub fn segments(&self) -> Vec<TickSegment> {
        self.lock().segments.clone()
    }

    /// Actions stamped with `tick`, including the still-open tick.
    pub fn actions_in_tick(&self, tick: TickId) -> Vec<Action> {
        let inner = self.lock();
        let range = if tick == inner.open_tick {
            inner.open_start.index()..inner.actions.len()
        } else {
            match inner.segments.get(tick.0 as usize) {
                Some(s) if s.tick == tick => s.start.index()..s.end.index(),
                _ => return Vec::new(),
            }
        };
        inner.actions[range].to_vec()
    }

    /// Actions performed by `entity`, in log order.
    pub fn actions_of_entity(&self, entity: EntityId) -> Vec<Action> {
        let inner = self.lock();
        inner
            .by_entity
            .get(&entity)
            .map(|seqs| {
                seqs.iter()
                    .map(|s| inner.actions[s.index()].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Actions whose [`ActionKind::name`](gridsim_core::ActionKind::name)
    /// equals `kind`.
    pub fn actions_of_kind(&self, kind: &str) -> Vec<Action> {
        self.lock()
            .actions
            .iter()
            .filter(|a| a.kind.name() == kind)
            .cloned()
            .collect()
    }

    /// Entities that have acted, in order of their first action.
    pub fn actors(&self) -> Vec<EntityId> {
        self.lock().by_entity.keys().copied().collect()
    }

    /// A copy of the whole log.
    pub fn snapshot(&self) -> Vec<Action> {
        self.lock().actions.clone()
    }

    /// Lazy live cursor starting at `from`.
    pub fn replay_from(&self, from: ActionSeq) -> Replay<'_> {
        Replay::new(self, from)
    }

    /// Clones of `actions[start..end]`, clamped to the published length.
    pub(crate) fn read_range(&self, start: u64, end: u64) -> Vec<Action> {
        let inner = self.lock();
        let end = (end as usize).min(inner.actions.len());
        let start = (start as usize).min(end);
        inner.actions[start..end].to_vec()
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionLog")
            .field("len", &self.len())
            .field("echo", &self.echo_enabled())
            .finish()
    }
}

// Compile-time assertion: the log is shared by program threads and the clock.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ActionLog>();
};
