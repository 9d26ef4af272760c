use crate::model::EntityModel;
use convert_case::{Case, Casing};
use std::fmt;

///
/// Multiplicity
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Multiplicity {
    One,
    Many,
}

///
/// JunctionModel
///
/// Join table mediating a many-valued relation.
/// `owner_link` pairs are `(junction attribute, owner attribute)`.
///

#[derive(Debug)]
pub struct JunctionModel {
    pub table: &'static str,
    pub owner_link: &'static [(&'static str, &'static str)],
}

impl JunctionModel {
    #[must_use]
    pub const fn new(
        table: &'static str,
        owner_link: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { table, owner_link }
    }
}

///
/// RelationDescriptor
///
/// Immutable metadata for one named relation slot.
///
/// `link` pairs are always written target-side first:
/// - direct relation: `(target attribute, owner attribute)`
/// - junction relation: `(target attribute, junction attribute)`
///
/// `inverse_of` means the owner row holds the foreign key (e.g. a
/// `category_id` column on the owner pointing at `category.id`); otherwise
/// the related row points back at the owner.
///

pub struct RelationDescriptor {
    pub name: &'static str,
    pub multiplicity: Multiplicity,
    pub target: &'static EntityModel,
    pub link: &'static [(&'static str, &'static str)],
    pub via: Option<&'static JunctionModel>,
    pub inverse_of: bool,
    pub label: Option<&'static str>,
    pub input_name: Option<&'static str>,
    pub cascade_delete: bool,
}

impl RelationDescriptor {
    const fn base(
        name: &'static str,
        multiplicity: Multiplicity,
        target: &'static EntityModel,
        link: &'static [(&'static str, &'static str)],
        inverse_of: bool,
    ) -> Self {
        Self {
            name,
            multiplicity,
            target,
            link,
            via: None,
            inverse_of,
            label: None,
            input_name: None,
            cascade_delete: false,
        }
    }

    /// Single-valued relation whose row points back at the owner.
    #[must_use]
    pub const fn has_one(
        name: &'static str,
        target: &'static EntityModel,
        link: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self::base(name, Multiplicity::One, target, link, false)
    }

    /// Single-valued relation whose key is held by the owner row.
    #[must_use]
    pub const fn belongs_to(
        name: &'static str,
        target: &'static EntityModel,
        link: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self::base(name, Multiplicity::One, target, link, true)
    }

    /// Many-valued relation, either direct or (with `via`) through a junction.
    #[must_use]
    pub const fn has_many(
        name: &'static str,
        target: &'static EntityModel,
        link: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self::base(name, Multiplicity::Many, target, link, false)
    }

    #[must_use]
    pub const fn via(mut self, junction: &'static JunctionModel) -> Self {
        self.via = Some(junction);
        self
    }

    #[must_use]
    pub const fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    #[must_use]
    pub const fn input_name(mut self, input_name: &'static str) -> Self {
        self.input_name = Some(input_name);
        self
    }

    #[must_use]
    pub const fn cascade_delete(mut self) -> Self {
        self.cascade_delete = true;
        self
    }

    // ------------------------------------------------------------------
    // Derived metadata
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn is_many(&self) -> bool {
        matches!(self.multiplicity, Multiplicity::Many)
    }

    /// Human-readable relation name used to prefix child validation errors.
    #[must_use]
    pub fn display_label(&self) -> String {
        self.label
            .map_or_else(|| self.name.to_case(Case::Sentence), str::to_string)
    }

    /// Key under which `load_relations` finds this relation's external input.
    #[must_use]
    pub fn input_key(&self) -> &'static str {
        self.input_name.unwrap_or(self.name)
    }

    /// Target attributes that identify an existing related row during coercion.
    ///
    /// Junction and owner-held links reference the target by the linked
    /// attributes; a direct child link only carries the back-reference, so
    /// the target's own primary key is used instead.
    #[must_use]
    pub fn lookup_fields(&self) -> Vec<&'static str> {
        if self.via.is_some() || self.inverse_of {
            self.link.iter().map(|(target, _)| *target).collect()
        } else {
            self.target.primary_key.to_vec()
        }
    }

    /// Whether unlinking removes the row (junction row or dependent record)
    /// instead of nulling the back-reference.
    #[must_use]
    pub const fn unlink_deletes(&self) -> bool {
        self.via.is_some() || self.cascade_delete
    }
}

impl fmt::Debug for RelationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("name", &self.name)
            .field("multiplicity", &self.multiplicity)
            .field("target", &self.target.path)
            .field("link", &self.link)
            .field("via", &self.via.map(|j| j.table))
            .field("inverse_of", &self.inverse_of)
            .field("cascade_delete", &self.cascade_delete)
            .finish_non_exhaustive()
    }
}
