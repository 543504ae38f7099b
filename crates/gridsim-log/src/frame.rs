//! Tick segments and the frames pushed to renderers.

use std::sync::Arc;

use gridsim_core::{Action, ActionSeq, TickId};

/// The half-open range `[start, end)` of actions belonging to one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickSegment {
    /// The tick.
    pub tick: TickId,
    /// First action of the tick.
    pub start: ActionSeq,
    /// One past the last action of the tick.
    pub end: ActionSeq,
}

impl TickSegment {
    /// Number of actions in the tick.
    pub fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize
    }

    /// Whether nothing happened in the tick.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `seq` falls in this tick.
    pub fn contains(&self, seq: ActionSeq) -> bool {
        self.start <= seq && seq < self.end
    }
}

/// A closed tick together with its actions, as handed to renderers.
#[derive(Clone, Debug)]
pub struct TickFrame {
    /// The closed segment.
    pub segment: TickSegment,
    /// The segment's actions in log order.
    pub actions: Arc<[Action]>,
}

impl TickFrame {
    /// The tick this frame closes.
    pub fn tick(&self) -> TickId {
        self.segment.tick
    }
}
