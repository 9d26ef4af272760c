//! Static, read-only metadata: one `EntityModel` per record type and one
//! `RelationDescriptor` per declared relation slot.

mod entity;
mod relation;


pub use entity::EntityModel;
pub use relation::{JunctionModel, Multiplicity, RelationDescriptor};
