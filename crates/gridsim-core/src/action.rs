//! Action records: the unit of world history.
//!
//! Every successful state change produces exactly one [`Action`]. Entity
//! operations build an [`ActionDraft`]; the action log stamps it with a
//! sequence number and the open tick.

use std::fmt;

use crate::entity::{Entity, SharedEntity};
use crate::geometry::{Direction, Position};
use crate::id::{ActionSeq, EntityId, TickId};

/// What happened.
#[derive(Clone, Debug)]
pub enum ActionKind {
    /// The entity was placed on the field.
    Spawn {
        /// The placed entity, kept so the action can be replayed.
        entity: SharedEntity,
        /// Cell it was placed in.
        at: Position,
        /// Initial heading.
        facing: Direction,
    },
    /// The entity was removed from the field.
    Despawn {
        /// Cell it was removed from.
        from: Position,
    },
    /// A one-cell step.
    Move {
        /// Cell before the step.
        from: Position,
        /// Cell after the step.
        to: Position,
    },
    /// A jump to an arbitrary cell.
    Teleport {
        /// Cell before the jump.
        from: Position,
        /// Cell after the jump.
        to: Position,
    },
    /// A change of heading.
    Turn {
        /// Heading before.
        from: Direction,
        /// Heading after.
        to: Direction,
    },
    /// The entity picked up `target`.
    Collect {
        /// The collected entity.
        target: EntityId,
        /// Type name of the collected entity.
        target_type: &'static str,
        /// Cell the pickup happened in.
        at: Position,
    },
    /// The entity put `target` down.
    Drop {
        /// The dropped entity.
        target: EntityId,
        /// Type name of the dropped entity.
        target_type: &'static str,
        /// Cell the target was put into.
        at: Position,
    },
}

impl ActionKind {
    /// Stable tag for filtering: `spawn`, `despawn`, `step`, `teleport`,
    /// `turn`, `collect` or `drop`.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Spawn { .. } => "spawn",
            ActionKind::Despawn { .. } => "despawn",
            ActionKind::Move { .. } => "step",
            ActionKind::Teleport { .. } => "teleport",
            ActionKind::Turn { .. } => "turn",
            ActionKind::Collect { .. } => "collect",
            ActionKind::Drop { .. } => "drop",
        }
    }

    /// The other entity involved, for collect and drop.
    pub fn target(&self) -> Option<EntityId> {
        match self {
            ActionKind::Collect { target, .. } | ActionKind::Drop { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// An action not yet appended to a log.
#[derive(Clone, Debug)]
pub struct ActionDraft {
    /// Acting entity.
    pub entity: EntityId,
    /// Type name of the acting entity.
    pub entity_type: &'static str,
    /// What happened.
    pub kind: ActionKind,
}

impl ActionDraft {
    /// Draft an action performed by `entity`.
    pub fn new(entity: &dyn Entity, kind: ActionKind) -> Self {
        Self {
            entity: entity.id(),
            entity_type: entity.type_name(),
            kind,
        }
    }
}

/// A logged, immutable action.
///
/// # Examples
///
/// ```
/// use gridsim_core::{Action, ActionKind, ActionSeq, EntityId, Position, TickId};
///
/// let action = Action {
///     seq: ActionSeq(0),
///     tick: TickId(1),
///     entity: EntityId::from_raw(3),
///     entity_type: "Walker",
///     kind: ActionKind::Move {
///         from: Position::new(0, 0),
///         to: Position::new(1, 0),
///     },
/// };
/// assert_eq!(
///     action.to_string(),
///     "Walker#3 stepped from (x=0, y=0) to (x=1, y=0)"
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Action {
    /// Position in the log.
    pub seq: ActionSeq,
    /// Tick the action happened in.
    pub tick: TickId,
    /// Acting entity.
    pub entity: EntityId,
    /// Type name of the acting entity.
    pub entity_type: &'static str,
    /// What happened.
    pub kind: ActionKind,
}

impl Action {
    /// Stamp a draft.
    pub fn from_draft(seq: ActionSeq, tick: TickId, draft: ActionDraft) -> Self {
        Self {
            seq,
            tick,
            entity: draft.entity,
            entity_type: draft.entity_type,
            kind: draft.kind,
        }
    }

    /// Whether `id` is the actor or the target of this action.
    pub fn involves(&self, id: EntityId) -> bool {
        self.entity == id || self.kind.target() == Some(id)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ", self.entity_type, self.entity)?;
        match &self.kind {
            ActionKind::Spawn { at, facing, .. } => {
                write!(f, "spawned at {at} facing {facing}")
            }
            ActionKind::Despawn { from } => write!(f, "despawned from {from}"),
            ActionKind::Move { from, to } => write!(f, "stepped from {from} to {to}"),
            ActionKind::Teleport { from, to } => write!(f, "teleported from {from} to {to}"),
            ActionKind::Turn { from, to } => write!(f, "turned from {from} to {to}"),
            ActionKind::Collect {
                target,
                target_type,
                at,
            } => write!(f, "collected {target_type}#{target} at {at}"),
            ActionKind::Drop {
                target,
                target_type,
                at,
            } => write!(f, "dropped {target_type}#{target} at {at}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(kind: ActionKind) -> Action {
        Action {
            seq: ActionSeq(4),
            tick: TickId(2),
            entity: EntityId::from_raw(9),
            entity_type: "Mario",
            kind,
        }
    }

    #[test]
    fn descriptions() {
        let turn = stamped(ActionKind::Turn {
            from: Direction::East,
            to: Direction::South,
        });
        assert_eq!(turn.to_string(), "Mario#9 turned from east to south");
        assert_eq!(turn.kind.name(), "turn");

        let collect = stamped(ActionKind::Collect {
            target: EntityId::from_raw(11),
            target_type: "Coin",
            at: Position::new(2, 2),
        });
        assert_eq!(collect.to_string(), "Mario#9 collected Coin#11 at (x=2, y=2)");
        assert!(collect.involves(EntityId::from_raw(11)));
        assert!(collect.involves(EntityId::from_raw(9)));
        assert!(!collect.involves(EntityId::from_raw(10)));
    }

    #[test]
    fn from_draft_keeps_payload() {
        let draft = ActionDraft {
            entity: EntityId::from_raw(1),
            entity_type: "Walker",
            kind: ActionKind::Despawn {
                from: Position::new(0, 1),
            },
        };
        let action = Action::from_draft(ActionSeq(0), TickId(0), draft);
        assert_eq!(action.entity, EntityId::from_raw(1));
        assert_eq!(action.kind.name(), "despawn");
        assert_eq!(action.to_string(), "Walker#1 despawned from (x=0, y=1)");
    }
}
