//! Module: cascade::coerce
//! Responsibility: turn an assigned value (record, key, attribute map) into
//! concrete related records, loading existing rows by key when possible.
//! Does not own: snapshot capture or any write to storage.

use crate::{
    config::AssignMode,
    error::InternalError,
    model::RelationDescriptor,
    record::{Record, RelationValue},
    traits::Storage,
    value::Value,
};
use std::collections::BTreeMap;

///
/// Assignment
///
/// A value assigned to a relation slot.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Assignment {
    /// A record of the relation's target model, used unchanged.
    Record(Record),
    /// Ordered key values (one per lookup field).
    Key(Vec<Value>),
    /// Attribute mapping; may carry key values for a lookup.
    Attributes(BTreeMap<String, Value>),
    /// One entry per related record of a many-valued relation.
    Many(Vec<Self>),
    Null,
}

impl Assignment {
    #[must_use]
    pub fn key(value: impl Into<Value>) -> Self {
        Self::Key(vec![value.into()])
    }

    #[must_use]
    pub fn attributes<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Attributes(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Record> for Assignment {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<Vec<Record>> for Assignment {
    fn from(records: Vec<Record>) -> Self {
        Self::Many(records.into_iter().map(Self::Record).collect())
    }
}

impl From<Option<Record>> for Assignment {
    fn from(record: Option<Record>) -> Self {
        record.map_or(Self::Null, Self::Record)
    }
}

// External input shapes: maps are attribute data, lists are many-valued,
// scalars are keys.
impl From<Value> for Assignment {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Map(entries) => Self::Attributes(entries),
            Value::List(items) => Self::Many(items.into_iter().map(Self::from).collect()),
            scalar => Self::Key(vec![scalar]),
        }
    }
}

/// Coerce an assignment into the relation's in-memory value.
///
/// `owner` supplies back-reference values for child lookups when the
/// assigned data leaves them out.
pub(crate) fn coerce_relation<S: Storage + ?Sized>(
    store: &S,
    owner: &Record,
    mode: AssignMode,
    relation: &'static RelationDescriptor,
    value: Assignment,
) -> Result<RelationValue, InternalError> {
    if relation.is_many() {
        let items = match value {
            Assignment::Null => Vec::new(),
            Assignment::Many(items) => items,
            single => vec![single],
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            if let Some(record) = coerce_one(store, owner, mode, relation, item)? {
                records.push(record);
            }
        }

        return Ok(RelationValue::Many(records));
    }

    if matches!(value, Assignment::Many(_)) {
        return Err(InternalError::coercion_config(format!(
            "many-valued assignment to single-valued relation: relation={} target={}",
            relation.name, relation.target.path,
        )));
    }

    Ok(RelationValue::One(coerce_one(store, owner, mode, relation, value)?))
}

/// Coerce one entry; empty input yields no record.
fn coerce_one<S: Storage + ?Sized>(
    store: &S,
    owner: &Record,
    mode: AssignMode,
    relation: &'static RelationDescriptor,
    value: Assignment,
) -> Result<Option<Record>, InternalError> {
    match value {
        Assignment::Null => Ok(None),

        Assignment::Record(record) => {
            if !record.model().is(relation.target) {
                return Err(InternalError::coercion_config(format!(
                    "record of wrong model assigned: relation={} expected={} found={}",
                    relation.name,
                    relation.target.path,
                    record.model().path,
                )));
            }

            Ok(Some(record))
        }

        Assignment::Key(values) => {
            if values.iter().all(Value::is_empty) {
                return Ok(None);
            }

            // Phase 1: bind positional key values onto the lookup fields.
            let fields = relation.lookup_fields();
            if fields.len() != values.len() {
                return Err(InternalError::coercion_config(format!(
                    "key arity mismatch: relation={} expected={} found={}",
                    relation.name,
                    fields.len(),
                    values.len(),
                )));
            }
            let keys: Vec<(&'static str, Value)> = fields.into_iter().zip(values).collect();

            // Phase 2: load the referenced row, or stand up a new one.
            if let Some(found) = store.find_one(relation.target, &keys)? {
                return Ok(Some(found));
            }
            if mode == AssignMode::ReferenceOnly {
                return Err(not_found(relation, &keys));
            }

            let mut record = Record::new(relation.target);
            for (field, value) in keys {
                record.set(field, value);
            }

            Ok(Some(record))
        }

        Assignment::Attributes(attributes) => {
            if attributes.is_empty() {
                return Ok(None);
            }

            // Phase 1: derive lookup keys; back-reference columns left out
            // of the mapping come from the owner, the rest must be present.
            let keys = relation
                .lookup_fields()
                .into_iter()
                .map(|field| match attributes.get(field) {
                    Some(value) if !value.is_empty() => Some((field, value.clone())),
                    _ => owner_link_value(owner, relation, field).map(|value| (field, value)),
                })
                .collect::<Option<Vec<_>>>();

            // Phase 2: lookup, then overlay the mapping onto whatever we hold.
            let found = match &keys {
                Some(keys) => store.find_one(relation.target, keys)?,
                None => None,
            };
            let mut record = match found {
                Some(found) => found,
                None if mode == AssignMode::ReferenceOnly => {
                    return Err(not_found(relation, keys.as_deref().unwrap_or_default()));
                }
                None => Record::new(relation.target),
            };
            record.apply(&attributes);

            Ok(Some(record))
        }

        Assignment::Many(_) => Err(InternalError::coercion_config(format!(
            "nested many-valued assignment: relation={}",
            relation.name,
        ))),
    }
}

// Owner value behind a child's back-reference column, if the owner has one.
fn owner_link_value(
    owner: &Record,
    relation: &RelationDescriptor,
    field: &str,
) -> Option<Value> {
    if relation.via.is_some() || relation.inverse_of {
        return None;
    }

    relation
        .link
        .iter()
        .find(|(target_attr, _)| *target_attr == field)
        .map(|(_, owner_attr)| owner.get(owner_attr))
        .filter(|value| !value.is_null())
        .cloned()
}

fn not_found(relation: &RelationDescriptor, keys: &[(&'static str, Value)]) -> InternalError {
    let rendered = keys
        .iter()
        .map(|(field, value)| format!("{field}={value}"))
        .collect::<Vec<_>>()
        .join(",");

    InternalError::coercion_not_found(format!(
        "referenced record not found: relation={} target={} keys=[{rendered}]",
        relation.name, relation.target.path,
    ))
}

///
/// TESTS
///
