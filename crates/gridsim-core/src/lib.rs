//! Core types and traits for the gridsim grid-world engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace: grid
//! geometry, identifiers, the [`Entity`] trait with its capability
//! mix-ins, the inspection primitives entity types opt into, and the
//! [`Action`] records that make up the world's history.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod id;
pub mod inspect;

pub use action::{Action, ActionDraft, ActionKind};
pub use entity::{
    Capabilities, Collectable, Collector, Entity, Movable, SharedEntity, Solid,
};
pub use error::MemberError;
pub use geometry::{Direction, Position};
pub use id::{ActionSeq, EntityId, TickId};
pub use inspect::{
    AttributeDescriptor, Describe, Inspect, InspectValue, Inspectable, MethodDescriptor,
    MethodReturn, TypeDescriptor, Value, ValueKind,
};
