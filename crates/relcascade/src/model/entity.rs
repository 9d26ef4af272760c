use crate::{error::InternalError, model::RelationDescriptor};
use std::fmt;

///
/// EntityModel
///
/// Static runtime model for one record type: its path, ordered primary-key
/// attributes and the registry of relations it declares. Declaration order
/// of `relations` is the order in which cascades process them.
///

pub struct EntityModel {
    pub path: &'static str,
    pub primary_key: &'static [&'static str],
    pub relations: &'static [RelationDescriptor],
}

impl EntityModel {
    #[must_use]
    pub const fn new(
        path: &'static str,
        primary_key: &'static [&'static str],
        relations: &'static [RelationDescriptor],
    ) -> Self {
        Self {
            path,
            primary_key,
            relations,
        }
    }

    /// Look up a declared relation by name.
    #[must_use]
    pub fn relation(&'static self, name: &str) -> Option<&'static RelationDescriptor> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Look up a declared relation, rejecting undeclared names.
    pub fn try_relation(
        &'static self,
        name: &str,
    ) -> Result<&'static RelationDescriptor, InternalError> {
        self.relation(name)
            .ok_or_else(|| InternalError::unknown_relation(self.path, name))
    }

    /// Models are static singletons; identity is address identity.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Debug for EntityModel {
    // Relations reference other models (possibly cyclically); print names only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityModel")
            .field("path", &self.path)
            .field("primary_key", &self.primary_key)
            .field(
                "relations",
                &self.relations.iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
