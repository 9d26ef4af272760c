//! Module: cascade::persist
//! Responsibility: the two save-cycle phases around the owner's own write.
//! PreValidating validates tracked relations, persists owner-held targets and
//! reconciles foreign keys; PostPersisting writes children, links, unlinks
//! and closes the cycle's transaction.
//! Does not own: the owner write itself (the storage collaborator does that).

use crate::{
    cascade::{
        CascadeEngine,
        cycle::{CascadeCycle, CascadeState},
        diff::diff_records,
        validate::validate_related,
    },
    config::SaveMode,
    error::InternalError,
    model::RelationDescriptor,
    obs::sink::{self, CascadeEvent, CycleKind},
    record::{Record, RelationValue},
    traits::Storage,
};

impl<S: Storage> CascadeEngine<'_, S> {
    // ─────────────────────────────────────────────
    // PRE-VALIDATING
    // ─────────────────────────────────────────────

    /// Run the pre-validation phase. `Ok(false)` means a related record was
    /// invalid (or refused by the store); the owner must not be written.
    pub(super) fn pre_validate(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
        mode: SaveMode,
    ) -> Result<bool, InternalError> {
        let entity = owner.model().path;
        match cycle.state {
            // re-entrant trigger from a nested save inside this cycle
            CascadeState::PreValidating | CascadeState::PostPersisting => return Ok(true),
            // the previous owner write never reported back; start over
            CascadeState::OwnerPersisting => {
                tracing::warn!(entity, "abandoning cycle left waiting on its owner write");
                self.rollback(cycle, entity);
            }
            CascadeState::Idle | CascadeState::Committed | CascadeState::RolledBack => {}
        }

        cycle.state = CascadeState::PreValidating;
        sink::record(CascadeEvent::CycleStart {
            kind: CycleKind::Save,
            entity_path: entity,
        });
        tracing::debug!(
            entity,
            mode = mode.tag(),
            relations = ?cycle.dirty_relations(),
            "cascade pre-validation"
        );

        if self.config.transactions.requires(mode) && !self.store.in_transaction() {
            match self.store.begin_transaction() {
                Ok(tx) => cycle.transaction = Some(tx),
                Err(err) => {
                    self.rollback(cycle, entity);
                    return Err(err);
                }
            }
        }

        let result = (|| -> Result<bool, InternalError> {
            // Phase 1: validate every tracked relation; keep going after a
            // failure so the owner collects all relation errors at once.
            let mut valid = true;
            for relation in owner.model().relations {
                if !cycle.tracker.is_tracked(relation.name) {
                    continue;
                }
                let Some(mut value) = owner.take_related(relation.name) else {
                    continue;
                };
                let outcome = self.validate_relation(owner, relation, &mut value);
                owner.populate(relation.name, value);
                valid &= outcome?;
            }
            if !valid {
                return Ok(false);
            }

            // Phase 2: owner-held targets need a key before the owner can
            // point at them, so they are written now.
            for relation in owner.model().relations {
                if relation.is_many() || !cycle.tracker.is_tracked(relation.name) {
                    continue;
                }
                let Some(mut value) = owner.take_related(relation.name) else {
                    continue;
                };
                let outcome = self.prepare_single(owner, relation, &mut value);
                owner.populate(relation.name, value);
                if !outcome? {
                    return Ok(false);
                }
            }

            Ok(true)
        })();

        match result {
            Ok(true) => {
                cycle.state = CascadeState::OwnerPersisting;
                Ok(true)
            }
            Ok(false) => {
                self.rollback(cycle, entity);
                Ok(false)
            }
            Err(err) => {
                self.rollback(cycle, entity);
                Err(err)
            }
        }
    }

    fn validate_relation(
        &self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        value: &mut RelationValue,
    ) -> Result<bool, InternalError> {
        let store = &*self.store;

        match value {
            RelationValue::Many(records) => {
                let mut valid = true;
                for (index, record) in records.iter_mut().enumerate() {
                    valid &= validate_related(store, owner, relation, record, Some(index))?;
                }

                Ok(valid)
            }
            RelationValue::One(Some(record)) => {
                validate_related(store, owner, relation, record, None)
            }
            RelationValue::One(None) => Ok(true),
        }
    }

    // Persist a changed owner-held target, then reconcile foreign keys.
    fn prepare_single(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        value: &mut RelationValue,
    ) -> Result<bool, InternalError> {
        let RelationValue::One(Some(related)) = value else {
            return Ok(true);
        };

        if relation.inverse_of
            && (related.is_new() || related.is_dirty())
            && !self.persist_child(owner, relation, related)?
        {
            owner.add_error(
                relation.name,
                format!("{}: could not be saved.", relation.display_label()),
            );
            return Ok(false);
        }
        sync_foreign_keys(owner, relation, related)?;

        Ok(true)
    }

    // ─────────────────────────────────────────────
    // POST-PERSISTING
    // ─────────────────────────────────────────────

    /// Run the post-persistence phase, then refresh the owner and commit.
    pub(super) fn post_persist(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
    ) -> Result<(), InternalError> {
        if cycle.post_persisting {
            return Ok(());
        }

        let entity = owner.model().path;
        cycle.post_persisting = true;
        cycle.state = CascadeState::PostPersisting;
        tracing::debug!(entity, relations = ?cycle.dirty_relations(), "cascade post-persistence");

        let result = (|| -> Result<(), InternalError> {
            for relation in owner.model().relations {
                let Some(old) = cycle.tracker.snapshot_of(relation.name).cloned() else {
                    continue;
                };
                let mut current = owner
                    .take_related(relation.name)
                    .unwrap_or_else(|| RelationValue::empty_for(relation));

                let outcome = if relation.is_many() {
                    self.reconcile_many(owner, relation, &old, &mut current)
                } else {
                    self.reconcile_one(owner, relation, &old, &mut current)
                };
                owner.populate(relation.name, current);
                outcome?;
            }

            self.store.refresh(owner)?;
            if let Some(tx) = cycle.transaction.take() {
                self.store.commit(tx)?;
            }

            Ok(())
        })();

        match result {
            Ok(()) => {
                // snapshots go only once the work is durable; a rolled back
                // cycle keeps them so a retry reconciles the same changes
                for name in cycle.tracker.names() {
                    cycle.tracker.clear(name);
                }
                cycle.state = CascadeState::Committed;
                cycle.post_persisting = false;
                sink::record(CascadeEvent::Committed {
                    entity_path: entity,
                });
                tracing::debug!(entity, "cascade committed");

                Ok(())
            }
            Err(err) => {
                self.rollback(cycle, entity);
                Err(err)
            }
        }
    }

    fn reconcile_many(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        old: &RelationValue,
        current: &mut RelationValue,
    ) -> Result<(), InternalError> {
        let RelationValue::Many(records) = current else {
            return Err(shape_mismatch(owner, relation));
        };

        // Phase 1: new members are written and linked straight away; stored
        // members are flushed if dirty and held back for the diff.
        let mut existing = Vec::new();
        for (index, record) in records.iter_mut().enumerate() {
            if record.is_new() {
                if relation.via.is_some() {
                    self.persist_required(owner, relation, record)?;
                }
                self.link(owner, relation, record)?;
            } else {
                if record.is_dirty() {
                    self.persist_required(owner, relation, record)?;
                }
                existing.push(index);
            }
        }

        // Phase 2: diff stored members against the snapshot; removals first.
        let candidates = existing
            .iter()
            .map(|&index| records[index].clone())
            .collect::<Vec<_>>();
        let diff = diff_records(old.records(), &candidates);

        for &index in &diff.removed {
            let mut removed = old.records()[index].clone();
            self.unlink(owner, relation, &mut removed, relation.unlink_deletes())?;
        }
        for &index in &diff.added {
            self.link(owner, relation, &mut records[existing[index]])?;
        }

        Ok(())
    }

    fn reconcile_one(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        old: &RelationValue,
        current: &mut RelationValue,
    ) -> Result<(), InternalError> {
        let (RelationValue::One(old), RelationValue::One(current)) = (old, current) else {
            return Err(shape_mismatch(owner, relation));
        };

        let unchanged = match (old.as_ref(), current.as_ref()) {
            (None, None) => true,
            (Some(old), Some(current)) => {
                let token = current.identity_token();
                !current.is_new() && token.is_some() && token == old.identity_token()
            }
            _ => false,
        };

        if unchanged {
            if let Some(related) = current.as_mut()
                && related.is_dirty()
            {
                self.persist_required(owner, relation, related)?;
            }
            return Ok(());
        }

        match current.as_mut() {
            Some(related) if relation.inverse_of => {
                self.link(owner, relation, related)?;
            }
            Some(related) => {
                if let Some(old) = old {
                    let mut old = old.clone();
                    self.unlink(owner, relation, &mut old, relation.unlink_deletes())?;
                }
                if relation.via.is_some() {
                    if related.is_new() || related.is_dirty() {
                        self.persist_required(owner, relation, related)?;
                    }
                    self.link(owner, relation, related)?;
                } else {
                    // the owner key is only known now for a freshly inserted owner
                    sync_foreign_keys(owner, relation, related)?;
                    self.persist_required(owner, relation, related)?;
                }
            }
            None => {
                if let Some(old) = old {
                    let mut old = old.clone();
                    self.unlink(owner, relation, &mut old, relation.unlink_deletes())?;
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────
    // STORAGE WRAPPERS
    // ─────────────────────────────────────────────

    pub(super) fn persist_child(
        &mut self,
        owner: &Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
    ) -> Result<bool, InternalError> {
        let inserted = related.is_new();
        if !self.store.save(related, false)? {
            tracing::warn!(
                entity = owner.model().path,
                relation = relation.name,
                target = relation.target.path,
                "store refused related record"
            );
            return Ok(false);
        }

        sink::record(CascadeEvent::ChildPersisted {
            entity_path: owner.model().path,
            relation: relation.name,
        });
        tracing::debug!(
            entity = owner.model().path,
            relation = relation.name,
            token = ?related.identity_token(),
            inserted,
            "persisted related record"
        );

        Ok(true)
    }

    // After the owner is written a refused child write cannot be reported as
    // a validation result any more; it fails the cycle.
    fn persist_required(
        &mut self,
        owner: &Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
    ) -> Result<(), InternalError> {
        if self.persist_child(owner, relation, related)? {
            Ok(())
        } else {
            Err(InternalError::cascade_conflict(format!(
                "related record refused by store: entity={} relation={} target={}",
                owner.model().path,
                relation.name,
                relation.target.path,
            )))
        }
    }

    pub(super) fn link(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
    ) -> Result<(), InternalError> {
        self.store.link(owner, relation, related)?;

        sink::record(CascadeEvent::Linked {
            entity_path: owner.model().path,
            relation: relation.name,
        });
        tracing::debug!(
            entity = owner.model().path,
            relation = relation.name,
            token = ?related.identity_token(),
            "linked"
        );

        Ok(())
    }

    pub(super) fn unlink(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
        delete: bool,
    ) -> Result<(), InternalError> {
        self.store.unlink(owner, relation, related, delete)?;

        sink::record(CascadeEvent::Unlinked {
            entity_path: owner.model().path,
            relation: relation.name,
        });
        tracing::debug!(
            entity = owner.model().path,
            relation = relation.name,
            token = ?related.identity_token(),
            delete,
            "unlinked"
        );

        Ok(())
    }

    /// Roll back the cycle's own transaction (if any) and mark the cycle
    /// terminal. A transaction the cycle did not open is left to its owner.
    pub(super) fn rollback(&mut self, cycle: &mut CascadeCycle, entity: &'static str) {
        if let Some(tx) = cycle.transaction.take()
            && self.store.is_active(&tx)
            && let Err(err) = self.store.rollback(tx)
        {
            tracing::warn!(entity, error = %err.display_with_class(), "rollback failed");
        }

        cycle.state = CascadeState::RolledBack;
        cycle.post_persisting = false;
        sink::record(CascadeEvent::RolledBack {
            entity_path: entity,
        });
        tracing::warn!(entity, "cascade rolled back");
    }
}

/// Reconcile the key columns of a single-valued relation.
///
/// Owner-held keys copy target values onto the owner; otherwise the owner's
/// values are copied onto the target. Equal values are left untouched.
/// Junction relations carry no key columns on either record.
fn sync_foreign_keys(
    owner: &mut Record,
    relation: &'static RelationDescriptor,
    related: &mut Record,
) -> Result<(), InternalError> {
    if relation.via.is_some() {
        return Ok(());
    }
    if relation.link.is_empty() {
        return Err(InternalError::relation_config(format!(
            "relation declares no link attributes: entity={} relation={}",
            owner.model().path,
            relation.name,
        )));
    }

    for &(target_attr, owner_attr) in relation.link {
        if relation.inverse_of {
            let value = related.get(target_attr);
            if owner.get(owner_attr) != value {
                owner.set(owner_attr, value.clone());
            }
        } else {
            let value = owner.get(owner_attr);
            if related.get(target_attr) != value {
                related.set(target_attr, value.clone());
            }
        }
    }

    Ok(())
}

fn shape_mismatch(owner: &Record, relation: &RelationDescriptor) -> InternalError {
    InternalError::cascade_invariant(format!(
        "relation value does not match its multiplicity: entity={} relation={} multiplicity={:?}",
        owner.model().path,
        relation.name,
        relation.multiplicity,
    ))
}
