use crate::{
    model::{EntityModel, RelationDescriptor},
    value::{IdentityToken, Value},
};
use derive_more::{Deref, DerefMut, IntoIterator};
use std::collections::BTreeMap;

///
/// FieldErrors
///
/// Validation issues keyed by attribute (or relation) name.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Eq, IntoIterator, PartialEq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    #[must_use]
    pub fn for_field(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }
}

///
/// RelationValue
///
/// The related record(s) held in one relation slot.
///

#[derive(Clone, Debug, PartialEq)]
pub enum RelationValue {
    One(Option<Record>),
    Many(Vec<Record>),
}

impl RelationValue {
    /// Empty value matching a relation's multiplicity.
    #[must_use]
    pub const fn empty_for(relation: &RelationDescriptor) -> Self {
        if relation.is_many() {
            Self::Many(Vec::new())
        } else {
            Self::One(None)
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        match self {
            Self::One(Some(record)) => std::slice::from_ref(record),
            Self::One(None) => &[],
            Self::Many(records) => records,
        }
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        match self {
            Self::One(Some(record)) => std::slice::from_mut(record),
            Self::One(None) => &mut [],
            Self::Many(records) => records,
        }
    }

    #[must_use]
    pub const fn as_one(&self) -> Option<&Record> {
        match self {
            Self::One(record) => record.as_ref(),
            Self::Many(_) => None,
        }
    }
}

///
/// Record
///
/// One entity row in memory: current attributes, the last persisted image
/// (absent for new records), validation errors and populated relations.
///

#[derive(Clone, Debug)]
pub struct Record {
    model: &'static EntityModel,
    attributes: BTreeMap<String, Value>,
    persisted: Option<BTreeMap<String, Value>>,
    errors: FieldErrors,
    related: BTreeMap<&'static str, RelationValue>,
}

impl Record {
    /// A new, unpersisted record.
    #[must_use]
    pub const fn new(model: &'static EntityModel) -> Self {
        Self {
            model,
            attributes: BTreeMap::new(),
            persisted: None,
            errors: FieldErrors::new(),
            related: BTreeMap::new(),
        }
    }

    /// A record loaded from storage; its attributes are the persisted image.
    #[must_use]
    pub fn from_stored(model: &'static EntityModel, attributes: BTreeMap<String, Value>) -> Self {
        Self {
            model,
            persisted: Some(attributes.clone()),
            attributes,
            errors: FieldErrors::new(),
            related: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Attribute value; unset attributes read as `Value::Null`.
    #[must_use]
    pub fn get(&self, name: &str) -> &Value {
        const NULL: &Value = &Value::Null;

        self.attributes.get(name).unwrap_or(NULL)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Apply an attribute mapping, overwriting existing values.
    pub fn apply(&mut self, attributes: &BTreeMap<String, Value>) {
        for (name, value) in attributes {
            self.attributes.insert(name.clone(), value.clone());
        }
    }

    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    // ------------------------------------------------------------------
    // Persistence state
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.persisted.is_none()
    }

    /// Last persisted image, if the record has been stored.
    #[must_use]
    pub const fn persisted(&self) -> Option<&BTreeMap<String, Value>> {
        self.persisted.as_ref()
    }

    /// Names of attributes whose value differs from the persisted image.
    /// For new records, every non-null attribute is dirty.
    #[must_use]
    pub fn dirty_attributes(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(name, value)| match &self.persisted {
                Some(persisted) => persisted.get(name.as_str()).unwrap_or(&Value::Null) != *value,
                None => !value.is_null(),
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty_attributes().is_empty()
    }

    /// Record the current attributes as the persisted image.
    pub fn mark_persisted(&mut self) {
        self.persisted = Some(self.attributes.clone());
    }

    /// Replace attributes with a freshly loaded persisted image.
    pub fn reload(&mut self, attributes: BTreeMap<String, Value>) {
        self.persisted = Some(attributes.clone());
        self.attributes = attributes;
    }

    /// Ordered primary-key values.
    #[must_use]
    pub fn primary_key(&self) -> Vec<Value> {
        self.model
            .primary_key
            .iter()
            .map(|field| self.get(field).clone())
            .collect()
    }

    /// Identity token for persisted records with a complete primary key.
    #[must_use]
    pub fn identity_token(&self) -> Option<IdentityToken> {
        if self.is_new() {
            return None;
        }

        IdentityToken::from_values(&self.primary_key())
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub const fn errors_mut(&mut self) -> &mut FieldErrors {
        &mut self.errors
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    // ------------------------------------------------------------------
    // Populated relations
    // ------------------------------------------------------------------

    /// Related value currently held in memory for `relation`, if populated.
    #[must_use]
    pub fn related(&self, relation: &str) -> Option<&RelationValue> {
        self.related.get(relation)
    }

    pub fn related_mut(&mut self, relation: &str) -> Option<&mut RelationValue> {
        self.related.get_mut(relation)
    }

    #[must_use]
    pub fn is_populated(&self, relation: &str) -> bool {
        self.related.contains_key(relation)
    }

    pub fn populate(&mut self, relation: &'static str, value: RelationValue) {
        self.related.insert(relation, value);
    }

    pub(crate) fn take_related(&mut self, relation: &str) -> Option<RelationValue> {
        self.related.remove(relation)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.is(other.model)
            && self.attributes == other.attributes
            && self.persisted == other.persisted
    }
}

///
/// TESTS
///
