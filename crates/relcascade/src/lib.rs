//! Relation-persistence cascades for an owner record: related records assigned
//! to named relation slots are validated, persisted, linked and unlinked as
//! one logical unit around the owner's own save or delete.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cascade;
pub mod config;
pub mod error;
pub mod model;
pub mod obs;
pub mod record;
pub mod traits;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Separator between primary-key components inside an identity token.
pub const IDENTITY_TOKEN_SEPARATOR: char = '-';

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, stores, sinks, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        cascade::{Assignment, CascadeCycle, CascadeEngine, MutationHooks},
        model::{EntityModel, JunctionModel, Multiplicity, RelationDescriptor},
        record::{Record, RelationValue},
        value::Value,
    };
}
