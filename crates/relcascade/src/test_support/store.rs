use crate::{
    error::InternalError,
    model::{EntityModel, RelationDescriptor},
    record::{Record, RelationValue},
    traits::{Storage, TransactionHandle},
    value::{IdentityToken, Value},
};
use convert_case::{Case, Casing};
use std::collections::BTreeMap;

type Row = BTreeMap<String, Value>;
type Tables = BTreeMap<&'static str, Vec<Row>>;

///
/// StoreOp
///
/// One write observed by `MemoryStore`, in call order.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum StoreOp {
    Begin,
    Commit,
    Rollback,
    Insert {
        entity: &'static str,
        token: String,
    },
    Update {
        entity: &'static str,
        token: String,
    },
    Delete {
        entity: &'static str,
        token: String,
    },
    Link {
        relation: &'static str,
        token: String,
    },
    Unlink {
        relation: &'static str,
        token: String,
        delete: bool,
    },
}

impl StoreOp {
    pub(crate) const fn is_link(&self) -> bool {
        matches!(self, Self::Link { .. } | Self::Unlink { .. })
    }
}

///
/// MemoryStore
///
/// Transactional in-memory storage collaborator. Rows are attribute maps
/// keyed by entity path (or junction table name); `id` primary keys are
/// auto-assigned integers. A transaction snapshots every table and restores
/// the snapshot on rollback.
///

#[derive(Debug)]
pub(crate) struct MemoryStore {
    tables: Tables,
    next_id: i64,
    next_tx: u64,
    open: Option<(u64, Tables, i64)>,
    ops: Vec<StoreOp>,
    required: BTreeMap<&'static str, Vec<&'static str>>,
    fail_unlink_at: Option<usize>,
    unlink_calls: usize,
    refuse_delete: Option<&'static str>,
    refuse_save: Option<&'static str>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            tables: Tables::new(),
            next_id: 1,
            next_tx: 1,
            open: None,
            ops: Vec::new(),
            required: BTreeMap::new(),
            fail_unlink_at: None,
            unlink_calls: 0,
            refuse_delete: None,
            refuse_save: None,
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Validation rule: `fields` must be non-empty on records of `model`.
    pub(crate) fn require(mut self, model: &'static EntityModel, fields: &[&'static str]) -> Self {
        self.required
            .entry(model.path)
            .or_default()
            .extend_from_slice(fields);
        self
    }

    /// Fail the `n`th unlink call (1-based) with a store error.
    pub(crate) fn fail_unlink_at(mut self, n: usize) -> Self {
        self.fail_unlink_at = Some(n);
        self
    }

    /// Refuse (`Ok(false)`) every delete of `model` records.
    pub(crate) fn refuse_delete(mut self, model: &'static EntityModel) -> Self {
        self.refuse_delete = Some(model.path);
        self
    }

    /// Refuse (`Ok(false)`) every save of `model` records.
    pub(crate) fn refuse_save(mut self, model: &'static EntityModel) -> Self {
        self.refuse_save = Some(model.path);
        self
    }

    // ------------------------------------------------------------------
    // Seeding and inspection
    // ------------------------------------------------------------------

    /// Insert a row without logging an operation; returns the stored record.
    pub(crate) fn insert_row(
        &mut self,
        model: &'static EntityModel,
        attrs: &[(&str, Value)],
    ) -> Record {
        let mut record = Record::new(model);
        for (name, value) in attrs {
            record.set(name, value.clone());
        }
        self.insert(&mut record);

        record
    }

    pub(crate) fn insert_junction(&mut self, table: &'static str, attrs: &[(&str, Value)]) {
        let row = attrs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        self.tables.entry(table).or_default().push(row);
    }

    /// Load a stored record by integer id.
    pub(crate) fn fetch(&self, model: &'static EntityModel, id: &Value) -> Option<Record> {
        self.rows(model.path)
            .iter()
            .find(|row| row.get("id") == Some(id))
            .map(|row| Record::from_stored(model, row.clone()))
    }

    pub(crate) fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    pub(crate) fn take_ops(&mut self) -> Vec<StoreOp> {
        std::mem::take(&mut self.ops)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn insert(&mut self, record: &mut Record) {
        let model = record.model();
        if model.primary_key == ["id"] {
            match record.get("id") {
                Value::Null => {
                    record.set("id", Value::Int(self.next_id));
                    self.next_id += 1;
                }
                Value::Int(id) => self.next_id = self.next_id.max(id + 1),
                _ => {}
            }
        }

        self.tables
            .entry(model.path)
            .or_default()
            .push(record.attributes().clone());
        record.mark_persisted();
    }

    // Row position by the record's persisted key (the key may be edited in memory).
    fn position(&self, record: &Record) -> Option<usize> {
        let image = record.persisted().unwrap_or_else(|| record.attributes());
        let model = record.model();

        self.rows(model.path).iter().position(|row| {
            model
                .primary_key
                .iter()
                .all(|field| row.get(*field) == image.get(*field))
        })
    }

    fn matching(&self, model: &'static EntityModel, keys: &[(&str, Value)]) -> Vec<Record> {
        self.rows(model.path)
            .iter()
            .filter(|row| {
                keys.iter()
                    .all(|(field, value)| row.get(*field) == Some(value))
            })
            .map(|row| Record::from_stored(model, row.clone()))
            .collect()
    }

    fn junction_keys(
        owner: &Record,
        relation: &RelationDescriptor,
        related: &Record,
    ) -> Vec<(&'static str, Value)> {
        let Some(junction) = relation.via else {
            return Vec::new();
        };

        junction
            .owner_link
            .iter()
            .map(|&(junction_attr, owner_attr)| (junction_attr, owner.get(owner_attr).clone()))
            .chain(
                relation
                    .link
                    .iter()
                    .map(|&(target_attr, junction_attr)| {
                        (junction_attr, related.get(target_attr).clone())
                    }),
            )
            .collect()
    }

    fn token(record: &Record) -> String {
        IdentityToken::from_values(&record.primary_key())
            .map(|token| token.to_string())
            .unwrap_or_default()
    }

    fn check_unlink_failure(&mut self) -> Result<(), InternalError> {
        self.unlink_calls += 1;
        if self.fail_unlink_at == Some(self.unlink_calls) {
            return Err(InternalError::store_internal(format!(
                "injected unlink failure: call={}",
                self.unlink_calls
            )));
        }

        Ok(())
    }
}

impl Storage for MemoryStore {
    fn begin_transaction(&mut self) -> Result<TransactionHandle, InternalError> {
        if self.open.is_some() {
            return Err(InternalError::transaction_internal(
                "transaction already open",
            ));
        }

        let id = self.next_tx;
        self.next_tx += 1;
        self.open = Some((id, self.tables.clone(), self.next_id));
        self.ops.push(StoreOp::Begin);

        Ok(TransactionHandle::new(id))
    }

    fn commit(&mut self, tx: TransactionHandle) -> Result<(), InternalError> {
        match &self.open {
            Some((id, _, _)) if *id == tx.id() => {
                self.open = None;
                self.ops.push(StoreOp::Commit);
                Ok(())
            }
            _ => Err(InternalError::transaction_internal(format!(
                "commit of inactive transaction: id={}",
                tx.id()
            ))),
        }
    }

    fn rollback(&mut self, tx: TransactionHandle) -> Result<(), InternalError> {
        match self.open.take() {
            Some((id, tables, next_id)) if id == tx.id() => {
                self.tables = tables;
                self.next_id = next_id;
                self.ops.push(StoreOp::Rollback);
                Ok(())
            }
            other => {
                self.open = other;
                Err(InternalError::transaction_internal(format!(
                    "rollback of inactive transaction: id={}",
                    tx.id()
                )))
            }
        }
    }

    fn is_active(&self, tx: &TransactionHandle) -> bool {
        matches!(&self.open, Some((id, _, _)) if *id == tx.id())
    }

    fn in_transaction(&self) -> bool {
        self.open.is_some()
    }

    fn find_one(
        &self,
        model: &'static EntityModel,
        keys: &[(&'static str, Value)],
    ) -> Result<Option<Record>, InternalError> {
        Ok(self.matching(model, keys).into_iter().next())
    }

    fn find_related(
        &self,
        owner: &Record,
        relation: &'static RelationDescriptor,
    ) -> Result<RelationValue, InternalError> {
        let records = if let Some(junction) = relation.via {
            let owner_keys = junction
                .owner_link
                .iter()
                .map(|&(junction_attr, owner_attr)| (junction_attr, owner.get(owner_attr).clone()))
                .collect::<Vec<_>>();

            let mut records = Vec::new();
            for row in self.rows(junction.table) {
                if !owner_keys
                    .iter()
                    .all(|(field, value)| row.get(*field) == Some(value))
                {
                    continue;
                }
                let target_keys = relation
                    .link
                    .iter()
                    .map(|&(target_attr, junction_attr)| {
                        (target_attr, row.get(junction_attr).cloned().unwrap_or_default())
                    })
                    .collect::<Vec<_>>();
                records.extend(self.matching(relation.target, &target_keys));
            }
            records
        } else {
            let keys = relation
                .link
                .iter()
                .map(|&(target_attr, owner_attr)| (target_attr, owner.get(owner_attr).clone()))
                .collect::<Vec<_>>();
            if keys.iter().any(|(_, value)| value.is_null()) {
                Vec::new()
            } else {
                self.matching(relation.target, &keys)
            }
        };

        Ok(if relation.is_many() {
            RelationValue::Many(records)
        } else {
            RelationValue::One(records.into_iter().next())
        })
    }

    fn refresh(&self, record: &mut Record) -> Result<(), InternalError> {
        let Some(index) = self.position(record) else {
            return Err(InternalError::store_not_found(format!(
                "{}#{}",
                record.model().path,
                Self::token(record)
            )));
        };
        record.reload(self.rows(record.model().path)[index].clone());

        Ok(())
    }

    fn validate(&self, record: &mut Record) -> Result<bool, InternalError> {
        record.clear_errors();
        if let Some(fields) = self.required.get(record.model().path) {
            for field in fields {
                if record.get(field).is_empty() {
                    let message = format!("{} cannot be blank.", field.to_case(Case::Sentence));
                    record.add_error(*field, message);
                }
            }
        }

        Ok(!record.has_errors())
    }

    fn save(&mut self, record: &mut Record, validate_first: bool) -> Result<bool, InternalError> {
        if validate_first && !self.validate(record)? {
            return Ok(false);
        }
        let entity = record.model().path;
        if self.refuse_save == Some(entity) {
            return Ok(false);
        }

        if record.is_new() {
            if record.primary_key().len() > 1 && record.primary_key().iter().any(Value::is_null) {
                return Err(InternalError::store_internal(format!(
                    "incomplete composite key: entity={entity}"
                )));
            }
            self.insert(record);
            self.ops.push(StoreOp::Insert {
                entity,
                token: Self::token(record),
            });

            return Ok(true);
        }

        if !record.is_dirty() {
            return Ok(true);
        }
        let Some(index) = self.position(record) else {
            return Err(InternalError::store_not_found(format!(
                "{entity}#{}",
                Self::token(record)
            )));
        };
        if let Some(rows) = self.tables.get_mut(entity) {
            rows[index] = record.attributes().clone();
        }
        record.mark_persisted();
        self.ops.push(StoreOp::Update {
            entity,
            token: Self::token(record),
        });

        Ok(true)
    }

    fn delete(&mut self, record: &Record) -> Result<bool, InternalError> {
        let entity = record.model().path;
        if self.refuse_delete == Some(entity) {
            return Ok(false);
        }
        let Some(index) = self.position(record) else {
            return Ok(false);
        };
        if let Some(rows) = self.tables.get_mut(entity) {
            rows.remove(index);
        }
        self.ops.push(StoreOp::Delete {
            entity,
            token: Self::token(record),
        });

        Ok(true)
    }

    fn link(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
    ) -> Result<(), InternalError> {
        if let Some(junction) = relation.via {
            let row = Self::junction_keys(owner, relation, related)
                .into_iter()
                .map(|(field, value)| (field.to_string(), value))
                .collect();
            self.tables.entry(junction.table).or_default().push(row);
        } else if relation.inverse_of {
            for &(target_attr, owner_attr) in relation.link {
                owner.set(owner_attr, related.get(target_attr).clone());
            }
            self.save(owner, false)?;
        } else {
            for &(target_attr, owner_attr) in relation.link {
                related.set(target_attr, owner.get(owner_attr).clone());
            }
            self.save(related, false)?;
        }

        self.ops.push(StoreOp::Link {
            relation: relation.name,
            token: Self::token(related),
        });

        Ok(())
    }

    fn unlink(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
        delete: bool,
    ) -> Result<(), InternalError> {
        self.check_unlink_failure()?;

        if let Some(junction) = relation.via {
            let keys = Self::junction_keys(owner, relation, related);
            if let Some(rows) = self.tables.get_mut(junction.table) {
                rows.retain(|row| !keys.iter().all(|(field, value)| row.get(*field) == Some(value)));
            }
        } else if relation.inverse_of {
            for &(_, owner_attr) in relation.link {
                owner.set(owner_attr, Value::Null);
            }
            self.save(owner, false)?;
        } else if delete {
            self.delete(related)?;
        } else {
            for &(target_attr, _) in relation.link {
                related.set(target_attr, Value::Null);
            }
            self.save(related, false)?;
        }

        self.ops.push(StoreOp::Unlink {
            relation: relation.name,
            token: Self::token(related),
            delete,
        });

        Ok(())
    }
}
