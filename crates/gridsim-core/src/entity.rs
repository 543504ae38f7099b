//! The entity model.
//!
//! An entity is any object living on the playfield: an actor a program
//! drives, a wall, a coin waiting to be picked up. Entity types implement
//! [`Entity`] and opt into behaviour by additionally implementing one or
//! more capability traits ([`Movable`], [`Solid`], [`Collectable`],
//! [`Collector`]) and exposing them through the matching `as_*` hook.
//!
//! Entities never store where they are. Position, facing and inventory
//! belong to the playfield; an entity value only carries its identity and
//! whatever private state its type needs.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::id::EntityId;
use crate::inspect::Inspectable;

bitflags! {
    /// The set of capabilities an entity exposes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// Can step, turn and teleport.
        const MOVABLE = 1;
        /// Can be picked up by a collector.
        const COLLECTABLE = 1 << 1;
        /// Blocks other solid entities from sharing its cell.
        const SOLID = 1 << 2;
        /// Can pick up collectables and carry them.
        const COLLECTOR = 1 << 3;
    }
}

/// An object on the playfield.
///
/// Every entity is also [`Inspectable`], which comes for free from a
/// (possibly empty) [`Inspect`](crate::Inspect) implementation.
///
/// # Examples
///
/// ```
/// use gridsim_core::{Entity, EntityId, Inspect, Movable, Capabilities};
///
/// struct Turtle { id: EntityId }
///
/// impl Inspect for Turtle {}
/// impl Movable for Turtle {}
///
/// impl Entity for Turtle {
///     fn id(&self) -> EntityId { self.id }
///     fn type_name(&self) -> &'static str { "Turtle" }
///     fn as_movable(&self) -> Option<&dyn Movable> { Some(self) }
/// }
///
/// let t = Turtle { id: EntityId::next() };
/// assert_eq!(t.capabilities(), Capabilities::MOVABLE);
/// ```
pub trait Entity: Inspectable {
    /// Stable identity of this entity.
    fn id(&self) -> EntityId;

    /// Human-readable type name used in action descriptions.
    fn type_name(&self) -> &'static str;

    /// This entity viewed as [`Movable`], if it is.
    fn as_movable(&self) -> Option<&dyn Movable> {
        None
    }

    /// This entity viewed as [`Solid`], if it is.
    fn as_solid(&self) -> Option<&dyn Solid> {
        None
    }

    /// This entity viewed as [`Collectable`], if it is.
    fn as_collectable(&self) -> Option<&dyn Collectable> {
        None
    }

    /// This entity viewed as [`Collector`], if it is.
    fn as_collector(&self) -> Option<&dyn Collector> {
        None
    }

    /// The capability set, derived from the `as_*` hooks.
    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::MOVABLE, self.as_movable().is_some());
        caps.set(Capabilities::SOLID, self.as_solid().is_some());
        caps.set(Capabilities::COLLECTABLE, self.as_collectable().is_some());
        caps.set(Capabilities::COLLECTOR, self.as_collector().is_some());
        caps
    }
}

/// Shared handle to an entity. The playfield, the log and actors all
/// hold clones of the same allocation.
pub type SharedEntity = Arc<dyn Entity>;

/// Marker for entities that can step, turn and teleport.
pub trait Movable: Send + Sync {}

/// Entities that block other solid entities.
pub trait Solid: Send + Sync {
    /// Whether the entity blocks right now. Types that can toggle
    /// solidity (an open door, say) override this.
    fn is_currently_solid(&self) -> bool {
        true
    }
}

/// Entities a collector can pick up.
pub trait Collectable: Send + Sync {
    /// Whether the entity can be picked up right now.
    fn is_currently_collectable(&self) -> bool {
        true
    }
}

/// Entities that pick up and carry collectables.
pub trait Collector: Send + Sync {
    /// Whether this collector is willing to carry `item`.
    fn can_carry(&self, item: &dyn Entity) -> bool {
        let _ = item;
        true
    }
}

impl dyn Entity {
    /// `Type#id`, the label used in action descriptions.
    pub fn label(&self) -> String {
        format!("{}#{}", self.type_name(), self.id())
    }

    /// Solid and currently blocking.
    pub fn is_solid_now(&self) -> bool {
        self.as_solid().is_some_and(|s| s.is_currently_solid())
    }

    /// Collectable and currently available for pickup.
    pub fn is_collectable_now(&self) -> bool {
        self.as_collectable()
            .is_some_and(|c| c.is_currently_collectable())
    }
}

impl fmt::Debug for dyn Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name(), self.id())
    }
}

// Compile-time assertion: entity handles cross program threads.
const _: fn() = || {
    fn assert<T: Send + Sync + ?Sized>() {}
    assert::<dyn Entity>();
    assert::<SharedEntity>();
};
