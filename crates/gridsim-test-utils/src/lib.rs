//! Fixture entity types for gridsim development.
//!
//! - [`Walker`]: movable collector, the usual program-driven actor.
//! - [`Rover`]: movable and solid, for blocking tests.
//! - [`Wall`]: solid obstacle.
//! - [`Door`]: solid obstacle whose solidity toggles.
//! - [`Coin`]: collectable with a read-only `value`.
//! - [`Bag`]: collectable collector, for nested inventories.
//! - [`Dial`]: inspection fixture with an editable `x` and a few methods.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod entities;

pub use entities::{Bag, Coin, Dial, Door, Rover, Walker, Wall};

use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call from
/// every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
