//! Which playfield owns which entity.
//!
//! An entity value lives on at most one playfield at a time. Every
//! playfield created through a [`FieldWriter`](crate::FieldWriter) takes a
//! [`FieldId`] and claims the ids it places in one process-wide table.
//! Replay targets are built unclaimed so they can hold the very entity
//! values the live field holds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use gridsim_core::EntityId;

use crate::error::PlayfieldError;

static NEXT_FIELD: AtomicU64 = AtomicU64::new(1);

static OWNERS: LazyLock<Mutex<HashMap<EntityId, FieldId>>> = LazyLock::new(Default::default);

/// Identity of one claiming playfield.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FieldId(u64);

impl FieldId {
    pub(crate) fn next() -> Self {
        Self(NEXT_FIELD.fetch_add(1, Ordering::Relaxed))
    }
}

fn owners() -> MutexGuard<'static, HashMap<EntityId, FieldId>> {
    OWNERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record `field` as the owner of `entity`.
pub(crate) fn claim(entity: EntityId, field: FieldId) -> Result<(), PlayfieldError> {
    let mut owners = owners();
    match owners.get(&entity) {
        Some(owner) if *owner != field => Err(PlayfieldError::EntityOnAnotherField { entity }),
        _ => {
            owners.insert(entity, field);
            Ok(())
        }
    }
}

/// Drop `field`'s claim on each of `entities`. Claims held by other
/// fields are left alone.
pub(crate) fn release(entities: impl IntoIterator<Item = EntityId>, field: FieldId) {
    let mut owners = owners();
    for entity in entities {
        if owners.get(&entity) == Some(&field) {
            owners.remove(&entity);
        }
    }
}
