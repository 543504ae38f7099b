//! Inspection snapshots.

use std::fmt;

use gridsim_core::{EntityId, ValueKind};

/// One attribute as shown to a viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeData {
    /// Attribute name.
    pub name: &'static str,
    /// Declared kind, used to parse edits.
    pub kind: ValueKind,
    /// Current value, formatted. `None` if the getter failed.
    pub value: Option<String>,
    /// Whether the viewer may write it.
    pub editable: bool,
}

/// One invocable method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodData {
    /// Method name.
    pub name: &'static str,
    /// Parameter kinds.
    pub params: Vec<ValueKind>,
}

/// Everything a viewer can see about one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InspectionData {
    /// The inspected entity.
    pub entity: EntityId,
    /// Its type name.
    pub type_name: &'static str,
    /// Built-in attributes first, then the type's own, in registration
    /// order.
    pub attributes: Vec<AttributeData>,
    /// Declared methods in registration order.
    pub methods: Vec<MethodData>,
}

impl InspectionData {
    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The formatted value of attribute `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.attribute(name)?.value.as_deref()
    }
}

impl fmt::Display for InspectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}#{}", self.type_name, self.entity)?;
        for a in &self.attributes {
            let marker = if a.editable { "*" } else { " " };
            let value = a.value.as_deref().unwrap_or("<unavailable>");
            writeln!(f, " {marker}{}: {} = {value}", a.name, a.kind)?;
        }
        for m in &self.methods {
            let params: Vec<String> = m.params.iter().map(ToString::to_string).collect();
            writeln!(f, "  {}({})", m.name, params.join(", "))?;
        }
        Ok(())
    }
}
