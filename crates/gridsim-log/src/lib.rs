//! The action log: the world's history, one [`Action`] per successful
//! state change.
//!
//! # Architecture
//!
//! - [`ActionLog::append`] stamps a draft with the next sequence number and
//!   the open tick inside one short critical section.
//! - [`ActionLog::tick_boundary`] closes the open tick into a
//!   [`TickSegment`] and pushes a [`TickFrame`] to subscribers.
//! - [`ActionLog::replay_from`] returns a [`Replay`] cursor that reads up
//!   to the published length and picks up again once the log grows.
//!
//! The published length is an atomic, so `len()` and cursor bounds never
//! wait on writers.
//!
//! [`Action`]: gridsim_core::Action

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod frame;
pub mod log;
pub mod replay;

pub use frame::{TickFrame, TickSegment};
pub use log::ActionLog;
pub use replay::Replay;
