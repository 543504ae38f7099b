//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`EntityId`] allocation.
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for an entity.
///
/// Allocated from a monotonic atomic counter via [`EntityId::next`].
/// Entity types store the id they were given at construction and
/// return it from [`Entity::id`](crate::Entity::id), so identity
/// survives despawn and respawn of the same value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a fresh, unique entity ID.
    ///
    /// Each call returns a new ID that has never been returned before
    /// within this process. Thread-safe.
    pub fn next() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value. Intended for tests and tooling; ids built this
    /// way are not checked against the allocator.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing simulation tick counter.
///
/// Tick 0 is the setup tick: everything that happens before the clock
/// first ticks (initial spawns, for instance) is recorded against it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl TickId {
    /// The tick after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Position of an action in the action log.
///
/// Assigned at append time. Sequence numbers start at 0 and are
/// contiguous: the n-th appended action has `ActionSeq(n)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionSeq(pub u64);

impl ActionSeq {
    /// The first sequence number of every log.
    pub const START: Self = Self(0);

    /// Index into a zero-based action vector.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ActionSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ActionSeq {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
