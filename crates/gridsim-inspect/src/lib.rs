//! Runtime inspection of live entities.
//!
//! The [`InspectionManager`] turns an entity id into an
//! [`InspectionData`] snapshot a viewer can display, and lets the viewer
//! write editable attributes and call declared methods. Members come from
//! two places: built-in attributes derived from the entity's capabilities
//! (read from the playfield), then the concrete type's
//! [`TypeDescriptor`](gridsim_core::TypeDescriptor), built once per type
//! and cached.
//!
//! Every failure is an [`InspectionError`]; member code that panics is
//! caught and reported the same way.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod data;
pub mod error;
pub mod manager;

pub use data::{AttributeData, InspectionData, MethodData};
pub use error::{InspectionError, InspectionFailure};
pub use manager::InspectionManager;
