//! Module: cascade::validate
//! Responsibility: validate one related record and lift its field errors
//! onto the owner under the relation's name.
//! Does not own: deciding whether the cascade continues after a failure.

use crate::{
    error::InternalError,
    model::RelationDescriptor,
    obs::sink::{self, CascadeEvent},
    record::Record,
    traits::Storage,
};

/// Validate `related` if it is new or dirty; unchanged stored records are skipped.
///
/// On failure every child field error is added to `owner` under
/// `relation.name`, prefixed with the relation label and, for many-valued
/// relations, a 1-based position (`"Order items #2: ..."`).
pub(crate) fn validate_related<S: Storage + ?Sized>(
    store: &S,
    owner: &mut Record,
    relation: &'static RelationDescriptor,
    related: &mut Record,
    index: Option<usize>,
) -> Result<bool, InternalError> {
    if !related.is_new() && !related.is_dirty() {
        return Ok(true);
    }

    if store.validate(related)? {
        return Ok(true);
    }

    let label = relation.display_label();
    let prefix = match index {
        Some(i) => format!("{label} #{}", i + 1),
        None => label,
    };
    for messages in related.errors().values() {
        for message in messages {
            owner.add_error(relation.name, format!("{prefix}: {message}"));
        }
    }

    sink::record(CascadeEvent::ValidationFailed {
        entity_path: owner.model().path,
        relation: relation.name,
    });
    tracing::debug!(
        entity = owner.model().path,
        relation = relation.name,
        target = relation.target.path,
        "related record failed validation"
    );

    Ok(false)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_support::{
            MemoryStore,
            fixtures::{ORDER, ORDER_ITEM, POST, TAG},
        },
        value::Value,
    };

    #[test]
    fn invalid_many_member_reports_label_and_position() {
        let store = MemoryStore::new().require(&ORDER_ITEM, &["product"]);
        let relation = ORDER.relation("order_items").expect("fixture relation");
        let mut owner = Record::new(&ORDER);
        let mut item = Record::new(&ORDER_ITEM).with("quantity", 2);

        let ok = validate_related(&store, &mut owner, relation, &mut item, Some(1))
            .expect("validation should run");

        assert!(!ok);
        assert_eq!(
            owner.errors().for_field("order_items"),
            &["Order items #2: Product cannot be blank.".to_string()]
        );
    }

    #[test]
    fn single_relation_prefix_has_no_position() {
        let store = MemoryStore::new().require(&TAG, &["name"]);
        let relation = POST.relation("tags").expect("fixture relation");
        let mut owner = Record::new(&POST);
        let mut tag = Record::new(&TAG).with("name", "");

        let ok = validate_related(&store, &mut owner, relation, &mut tag, None)
            .expect("validation should run");

        assert!(!ok);
        assert_eq!(
            owner.errors().for_field("tags"),
            &["Tags: Name cannot be blank.".to_string()]
        );
    }

    #[test]
    fn unchanged_stored_record_is_not_validated() {
        let mut store = MemoryStore::new();
        let relation = POST.relation("tags").expect("fixture relation");
        let mut owner = Record::new(&POST);

        // stored with a blank name; the rule is added afterwards
        let mut tag = store.insert_row(&TAG, &[("name", Value::from(""))]);
        let store = store.require(&TAG, &["name"]);

        let ok = validate_related(&store, &mut owner, relation, &mut tag, Some(0))
            .expect("validation should run");

        assert!(ok);
        assert!(!owner.has_errors());
        assert!(!tag.has_errors());
    }
}
