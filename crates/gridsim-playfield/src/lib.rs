//! The playfield: where every entity is, which way it faces, and who
//! carries what.
//!
//! A [`Playfield`] is a single `RwLock` around a [`FieldState`]. Readers
//! use the convenience methods on [`Playfield`], each of which takes the
//! read lock for one query. Mutation needs the [`FieldWriter`] the
//! playfield was created with: entity operations take
//! [`FieldWriter::write`] and validate, mutate and log inside that one
//! critical section, so no reader ever sees a half-applied action.
//!
//! The store itself is passive. It enforces structural invariants (an
//! entity is in exactly one cell or one inventory of exactly one
//! playfield, two solids never share a cell on spawn, bounds) and leaves
//! movement rules to the caller.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bounds;
mod claims;
pub mod error;
pub mod field;
mod replay;

pub use bounds::Bounds;
pub use error::PlayfieldError;
pub use field::{FieldState, FieldWriter, Placement, Playfield};
