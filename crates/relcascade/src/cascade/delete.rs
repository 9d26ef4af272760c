use crate::{
    cascade::{
        CascadeEngine,
        cycle::{CascadeCycle, CascadeState},
    },
    error::InternalError,
    model::RelationDescriptor,
    obs::sink::{self, CascadeEvent, CycleKind},
    record::{Record, RelationValue},
    traits::Storage,
};

impl<S: Storage> CascadeEngine<'_, S> {
    /// Remove the owner's dependents, then the owner, in one transaction.
    ///
    /// `Ok(false)` means the store refused a delete; nothing is removed.
    pub(super) fn delete_cascade(&mut self, owner: &mut Record) -> Result<bool, InternalError> {
        let entity = owner.model().path;
        if owner.is_new() {
            return Err(InternalError::delete_unsupported(format!(
                "cannot delete an unpersisted record: entity={entity}"
            )));
        }

        let mut cycle = CascadeCycle::new();
        sink::record(CascadeEvent::CycleStart {
            kind: CycleKind::Delete,
            entity_path: entity,
        });
        tracing::debug!(entity, token = ?owner.identity_token(), "cascade delete");

        if self.config.transactions.delete && !self.store.in_transaction() {
            cycle.transaction = Some(self.store.begin_transaction()?);
        }

        let result = (|| -> Result<bool, InternalError> {
            for relation in owner.model().relations {
                // the owner's own key column goes with the owner row
                if !relation.is_many() && relation.inverse_of {
                    continue;
                }

                let current = match owner.related(relation.name) {
                    Some(value) => value.clone(),
                    None => self.store.find_related(owner, relation)?,
                };
                if !self.remove_dependents(owner, relation, current)? {
                    return Ok(false);
                }
            }

            self.store.delete(owner)
        })();

        match result {
            Ok(true) => {
                if let Some(tx) = cycle.transaction.take()
                    && let Err(err) = self.store.commit(tx)
                {
                    self.rollback(&mut cycle, entity);
                    return Err(err);
                }
                // in-memory slots follow storage only once the delete is durable
                for relation in owner.model().relations {
                    owner.populate(relation.name, RelationValue::empty_for(relation));
                }
                cycle.state = CascadeState::Committed;
                sink::record(CascadeEvent::Committed {
                    entity_path: entity,
                });
                tracing::debug!(entity, "cascade delete committed");

                Ok(true)
            }
            Ok(false) => {
                self.rollback(&mut cycle, entity);
                Ok(false)
            }
            Err(err) => {
                self.rollback(&mut cycle, entity);
                Err(err)
            }
        }
    }

    fn remove_dependents(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        value: RelationValue,
    ) -> Result<bool, InternalError> {
        match value {
            RelationValue::Many(records) => {
                let delete = relation.unlink_deletes();
                for mut related in records.into_iter().filter(|r| !r.is_new()) {
                    self.unlink(owner, relation, &mut related, delete)?;
                    if delete && relation.via.is_none() {
                        sink::record(CascadeEvent::ChildDeleted {
                            entity_path: owner.model().path,
                            relation: relation.name,
                        });
                    }
                }

                Ok(true)
            }
            RelationValue::One(Some(related)) if !related.is_new() => {
                if !self.store.delete(&related)? {
                    tracing::warn!(
                        entity = owner.model().path,
                        relation = relation.name,
                        token = ?related.identity_token(),
                        "store refused to delete dependent record"
                    );
                    return Ok(false);
                }
                sink::record(CascadeEvent::ChildDeleted {
                    entity_path: owner.model().path,
                    relation: relation.name,
                });

                Ok(true)
            }
            RelationValue::One(_) => Ok(true),
        }
    }
}
