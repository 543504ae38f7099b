//! The inspection manager.

use std::any::TypeId;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use gridsim_core::{
    Entity, EntityId, MemberError, SharedEntity, TypeDescriptor, Value, ValueKind,
};
use gridsim_playfield::Playfield;

use crate::data::{AttributeData, InspectionData, MethodData};
use crate::error::{InspectionError, InspectionFailure};

/// Names of the attributes derived from capabilities. Always read-only.
const BUILTIN: [&str; 4] = ["position", "facing", "solid", "inventory"];

/// Built-in attribute values, read in one pass under the playfield read
/// lock.
struct Builtins {
    entity: SharedEntity,
    values: Vec<(&'static str, ValueKind, Option<Value>)>,
}

/// Reads and pokes live entity state through per-type descriptor tables.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gridsim_core::{Direction, Entity, Position, Value};
/// use gridsim_inspect::InspectionManager;
/// use gridsim_playfield::FieldWriter;
/// use gridsim_test_utils::Dial;
///
/// let field = FieldWriter::new();
/// let dial = Arc::new(Dial::new(2));
/// let id = dial.id();
/// field.place(dial, Position::new(0, 0), Direction::East).unwrap();
///
/// let manager = InspectionManager::new();
/// manager.set_attribute(&field, id, "x", Value::Int(5)).unwrap();
/// assert_eq!(manager.inspect(&field, id).unwrap().value("x"), Some("5"));
/// ```
#[derive(Default)]
pub struct InspectionManager {
    tables: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
}

impl InspectionManager {
    /// A manager with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached descriptor table for `entity`'s concrete type.
    pub fn descriptor_for(&self, entity: &dyn Entity) -> Arc<TypeDescriptor> {
        let key = entity.type_key();
        if let Some(table) = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(table);
        }
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(key).or_insert_with(|| {
            let table = entity.descriptor();
            tracing::debug!(
                type_name = table.type_name(),
                attributes = table.attributes().len(),
                methods = table.methods().len(),
                "built inspection table"
            );
            Arc::new(table)
        });
        Arc::clone(table)
    }

    /// Number of descriptor tables built so far.
    pub fn cached_types(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn builtins(&self, field: &Playfield, id: EntityId) -> Result<Builtins, InspectionError> {
        let state = field.read();
        let entity = state.get(id).ok_or_else(|| {
            InspectionError::point(id, "", InspectionFailure::UnknownEntity, "no such entity")
        })?;
        let mut values = Vec::new();
        if entity.as_movable().is_some() {
            values.push((
                BUILTIN[0],
                ValueKind::Position,
                state.position_of(id).map(Value::Position),
            ));
            values.push((
                BUILTIN[1],
                ValueKind::Direction,
                state.facing_of(id).map(Value::Direction),
            ));
        }
        if entity.as_solid().is_some() {
            values.push((
                BUILTIN[2],
                ValueKind::Bool,
                Some(Value::Bool(entity.is_solid_now())),
            ));
        }
        if entity.as_collector().is_some() {
            let items: Vec<String> = state.inventory_of(id).iter().map(|e| e.label()).collect();
            values.push((
                BUILTIN[3],
                ValueKind::Text,
                Some(Value::Text(format!("[{}]", items.join(", ")))),
            ));
        }
        Ok(Builtins { entity, values })
    }

    fn entity(&self, field: &Playfield, id: EntityId) -> Result<SharedEntity, InspectionError> {
        field.get(id).ok_or_else(|| {
            InspectionError::point(id, "", InspectionFailure::UnknownEntity, "no such entity")
        })
    }

    /// Snapshot every visible member of `id`.
    pub fn inspect(&self, field: &Playfield, id: EntityId) -> Result<InspectionData, InspectionError> {
        let Builtins { entity, values } = self.builtins(field, id)?;
        let table = self.descriptor_for(entity.as_ref());

        let mut attributes: Vec<AttributeData> = values
            .into_iter()
            .map(|(name, kind, value)| AttributeData {
                name,
                kind,
                value: value.map(|v| v.to_string()),
                editable: false,
            })
            .collect();
        for attr in table.attributes() {
            if BUILTIN.contains(&attr.name()) {
                continue;
            }
            let value = guarded(id, attr.name(), || attr.get(entity.as_any())).ok();
            attributes.push(AttributeData {
                name: attr.name(),
                kind: attr.kind(),
                value: value.map(|v| v.to_string()),
                editable: attr.is_editable(),
            });
        }
        let methods = table
            .methods()
            .iter()
            .map(|m| MethodData {
                name: m.name(),
                params: m.params().to_vec(),
            })
            .collect();

        Ok(InspectionData {
            entity: id,
            type_name: entity.type_name(),
            attributes,
            methods,
        })
    }

    /// Read one attribute, built-in or declared.
    pub fn get_attribute(
        &self,
        field: &Playfield,
        id: EntityId,
        name: &str,
    ) -> Result<Value, InspectionError> {
        let Builtins { entity, values } = self.builtins(field, id)?;
        if let Some((_, _, value)) = values.into_iter().find(|(n, _, _)| *n == name) {
            return value.ok_or_else(|| {
                InspectionError::point(id, name, InspectionFailure::MemberFailed, "not on the field")
            });
        }
        let table = self.descriptor_for(entity.as_ref());
        let attr = table.attribute(name).ok_or_else(|| unknown(id, name))?;
        guarded(id, name, || attr.get(entity.as_any()))
    }

    /// Write a declared, editable attribute.
    pub fn set_attribute(
        &self,
        field: &Playfield,
        id: EntityId,
        name: &str,
        value: Value,
    ) -> Result<(), InspectionError> {
        let entity = self.entity(field, id)?;
        if BUILTIN.contains(&name) {
            return Err(read_only(id, name));
        }
        let table = self.descriptor_for(entity.as_ref());
        let attr = table.attribute(name).ok_or_else(|| unknown(id, name))?;
        if !attr.is_editable() {
            return Err(read_only(id, name));
        }
        guarded(id, name, || attr.set(entity.as_any(), value))
    }

    /// Parse `text` according to the attribute's kind, then write it.
    pub fn set_attribute_text(
        &self,
        field: &Playfield,
        id: EntityId,
        name: &str,
        text: &str,
    ) -> Result<(), InspectionError> {
        let kind = self.attribute_kind(field, id, name)?;
        let value = kind.parse(text).ok_or_else(|| {
            InspectionError::point(
                id,
                name,
                InspectionFailure::BadArguments,
                format!("'{text}' is not a valid {kind}"),
            )
        })?;
        self.set_attribute(field, id, name, value)
    }

    /// Call a declared method.
    pub fn invoke(
        &self,
        field: &Playfield,
        id: EntityId,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>, InspectionError> {
        let entity = self.entity(field, id)?;
        let table = self.descriptor_for(entity.as_ref());
        let method = table.method(name).ok_or_else(|| unknown(id, name))?;
        guarded(id, name, || method.invoke(entity.as_any(), args))
    }

    /// Attribute names in display order.
    pub fn attribute_names(
        &self,
        field: &Playfield,
        id: EntityId,
    ) -> Result<Vec<&'static str>, InspectionError> {
        let Builtins { entity, values } = self.builtins(field, id)?;
        let table = self.descriptor_for(entity.as_ref());
        let mut names: Vec<_> = values.into_iter().map(|(n, _, _)| n).collect();
        names.extend(
            table
                .attributes()
                .iter()
                .map(|a| a.name())
                .filter(|n| !BUILTIN.contains(n)),
        );
        Ok(names)
    }

    /// Method names in registration order.
    pub fn method_names(
        &self,
        field: &Playfield,
        id: EntityId,
    ) -> Result<Vec<&'static str>, InspectionError> {
        let entity = self.entity(field, id)?;
        let table = self.descriptor_for(entity.as_ref());
        Ok(table.methods().iter().map(|m| m.name()).collect())
    }

    /// Whether attribute `name` accepts writes.
    pub fn is_attribute_editable(
        &self,
        field: &Playfield,
        id: EntityId,
        name: &str,
    ) -> Result<bool, InspectionError> {
        let Builtins { entity, values } = self.builtins(field, id)?;
        if values.iter().any(|(n, _, _)| *n == name) {
            return Ok(false);
        }
        let table = self.descriptor_for(entity.as_ref());
        table
            .attribute(name)
            .map(|a| a.is_editable())
            .ok_or_else(|| unknown(id, name))
    }

    /// Declared kind of attribute `name`.
    pub fn attribute_kind(
        &self,
        field: &Playfield,
        id: EntityId,
        name: &str,
    ) -> Result<ValueKind, InspectionError> {
        let Builtins { entity, values } = self.builtins(field, id)?;
        if let Some((_, kind, _)) = values.iter().find(|(n, _, _)| *n == name) {
            return Ok(*kind);
        }
        let table = self.descriptor_for(entity.as_ref());
        table
            .attribute(name)
            .map(|a| a.kind())
            .ok_or_else(|| unknown(id, name))
    }
}

impl std::fmt::Debug for InspectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionManager")
            .field("cached_types", &self.cached_types())
            .finish()
    }
}

fn unknown(id: EntityId, name: &str) -> InspectionError {
    InspectionError::point(id, name, InspectionFailure::UnknownMember, "not declared")
}

fn read_only(id: EntityId, name: &str) -> InspectionError {
    InspectionError::point(id, name, InspectionFailure::ReadOnly, "attribute is read-only")
}

/// Run member code, turning errors and panics into inspection errors.
fn guarded<T>(
    id: EntityId,
    member: &str,
    f: impl FnOnce() -> Result<T, MemberError>,
) -> Result<T, InspectionError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(InspectionError::from_member(id, member, err)),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            tracing::warn!(entity = %id, member, %message, "inspected member panicked");
            Err(InspectionError::point(
                id,
                member,
                InspectionFailure::Panicked,
                format!("panicked: {message}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsim_core::{Direction, Position};
    use gridsim_playfield::FieldWriter;
    use gridsim_test_utils::{Coin, Dial, Walker, Wall};

    fn setup() -> (FieldWriter, InspectionManager) {
        (FieldWriter::new(), InspectionManager::new())
    }

    #[test]
    fn tables_are_cached_per_type() {
        let (field, manager) = setup();
        let a = Arc::new(Dial::new(1));
        let b = Arc::new(Dial::new(2));
        let (ia, ib) = (a.id(), b.id());
        field.place(a, Position::new(0, 0), Direction::East).unwrap();
        field.place(b, Position::new(1, 0), Direction::East).unwrap();
        manager.inspect(&field, ia).unwrap();
        manager.inspect(&field, ib).unwrap();
        assert_eq!(manager.cached_types(), 1);
    }

    #[test]
    fn builtins_follow_capabilities() {
        let (field, manager) = setup();
        let walker = Arc::new(Walker::new());
        let wall = Arc::new(Wall::new());
        let (w, s) = (walker.id(), wall.id());
        field.place(walker, Position::new(3, 4), Direction::South).unwrap();
        field.place(wall, Position::new(0, 0), Direction::East).unwrap();

        let data = manager.inspect(&field, w).unwrap();
        assert_eq!(data.value("position"), Some("(x=3, y=4)"));
        assert_eq!(data.value("facing"), Some("south"));
        assert_eq!(data.value("inventory"), Some("[]"));
        assert!(data.attribute("solid").is_none());
        assert_eq!(
            manager.attribute_names(&field, w).unwrap(),
            vec!["position", "facing", "inventory", "name"]
        );

        let data = manager.inspect(&field, s).unwrap();
        assert_eq!(data.value("solid"), Some("true"));
        assert!(data.attribute("position").is_none());
    }

    #[test]
    fn inventory_lists_carried_items() {
        let (field, manager) = setup();
        let walker = Arc::new(Walker::new());
        let coin = Arc::new(Coin::new());
        let (w, c) = (walker.id(), coin.id());
        field.place(walker, Position::new(0, 0), Direction::East).unwrap();
        field.place(coin, Position::new(0, 0), Direction::East).unwrap();
        field.write().carry(w, c).unwrap();
        assert_eq!(
            manager.get_attribute(&field, w, "inventory").unwrap(),
            Value::Text(format!("[Coin#{c}]"))
        );
    }

    #[test]
    fn builtins_are_read_only() {
        let (field, manager) = setup();
        let walker = Arc::new(Walker::new());
        let w = walker.id();
        field.place(walker, Position::new(0, 0), Direction::East).unwrap();
        let err = manager
            .set_attribute(&field, w, "position", Value::Position(Position::new(9, 9)))
            .unwrap_err();
        assert_eq!(err.failure(), InspectionFailure::ReadOnly);
        assert_eq!(field.position_of(w), Some(Position::new(0, 0)));
        assert!(!manager.is_attribute_editable(&field, w, "facing").unwrap());
        assert!(manager.is_attribute_editable(&field, w, "name").unwrap());
    }

    #[test]
    fn text_edits_are_parsed_by_kind() {
        let (field, manager) = setup();
        let dial = Arc::new(Dial::new(0));
        let id = dial.id();
        field.place(dial.clone(), Position::new(0, 0), Direction::East).unwrap();
        manager.set_attribute_text(&field, id, "x", " 12 ").unwrap();
        assert_eq!(dial.x(), 12);
        let err = manager.set_attribute_text(&field, id, "x", "twelve").unwrap_err();
        assert_eq!(err.failure(), InspectionFailure::BadArguments);
        assert_eq!(
            manager.attribute_kind(&field, id, "label").unwrap(),
            ValueKind::Text
        );
    }
}
