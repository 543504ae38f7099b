//! Live replay cursor.

use gridsim_core::{Action, ActionSeq};

use crate::log::ActionLog;

const BATCH: u64 = 64;

/// Iterator over a log's actions from a starting sequence number.
///
/// Yields actions in original order up to the length published when
/// each item is requested. At the end it returns `None`, but it is not
/// fused: once more actions are appended, `next` yields them.
pub struct Replay<'a> {
    log: &'a ActionLog,
    next: u64,
    buffer: std::vec::IntoIter<Action>,
}

impl<'a> Replay<'a> {
    pub(crate) fn new(log: &'a ActionLog, from: ActionSeq) -> Self {
        Self {
            log,
            next: from.0,
            buffer: Vec::new().into_iter(),
        }
    }

    /// Sequence number of the next action this cursor yields.
    pub fn position(&self) -> ActionSeq {
        ActionSeq(self.next - self.buffer.len() as u64)
    }

    /// Published actions not yet yielded.
    pub fn remaining(&self) -> usize {
        (self.log.len() as u64).saturating_sub(self.position().0) as usize
    }
}

impl Iterator for Replay<'_> {
    type Item = Action;

    fn next(&mut self) -> Option<Action> {
        if let Some(action) = self.buffer.next() {
            return Some(action);
        }
        let published = self.log.len() as u64;
        if self.next >= published {
            return None;
        }
        let end = published.min(self.next + BATCH);
        let batch = self.log.read_range(self.next, end);
        self.next += batch.len() as u64;
        self.buffer = batch.into_iter();
        self.buffer.next()
    }
}
