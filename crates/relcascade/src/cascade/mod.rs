//! Cascade engine: relation assignment, the save-cycle phases and the
//! deletion cascade, driven against a `Storage` collaborator.

mod coerce;
mod cycle;
mod delete;
mod diff;
mod persist;
mod tracker;
mod validate;


pub use coerce::Assignment;
pub use cycle::{CascadeCycle, CascadeState};
pub use diff::{RecordDiff, RelationDiff, diff_records, diff_tokens};
pub use tracker::RelationTracker;

use crate::{
    config::{CascadeConfig, SaveMode},
    error::InternalError,
    model::RelationDescriptor,
    obs::{MetricsSink, with_metrics_sink},
    record::{Record, RelationValue},
    traits::Storage,
    value::Value,
};
use coerce::coerce_relation;
use std::collections::BTreeMap;

///
/// MutationHooks
///
/// Lifecycle entry points the owner's persistence orchestrator calls
/// directly around its own writes.
///

pub trait MutationHooks {
    /// Before the owner validates. `Ok(false)` means the owner write must be skipped.
    fn before_mutate(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
        mode: SaveMode,
    ) -> Result<bool, InternalError>;

    /// After the owner's insert or update completed.
    fn after_persist(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
    ) -> Result<(), InternalError>;

    /// The owner's own validation or write failed after `before_mutate`
    /// succeeded; the cycle is rolled back and its snapshots kept.
    fn after_failed_mutate(&mut self, cycle: &mut CascadeCycle, owner: &Record);

    /// Replaces the owner's delete with the deletion cascade.
    fn replace_delete(&mut self, owner: &mut Record) -> Result<bool, InternalError>;
}

///
/// CascadeEngine
///
/// Borrows the storage collaborator for the duration of one or more owner
/// mutations. All per-mutation state lives in the caller's `CascadeCycle`.
///

pub struct CascadeEngine<'a, S: Storage> {
    store: &'a mut S,
    config: CascadeConfig,
    metrics: Option<&'static dyn MetricsSink>,
}

impl<'a, S: Storage> CascadeEngine<'a, S> {
    #[must_use]
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            config: CascadeConfig::default(),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.config = config;
        self
    }

    /// Route this engine's cascade events to `sink` instead of the default counters.
    #[must_use]
    pub fn metrics_sink(mut self, sink: &'static dyn MetricsSink) -> Self {
        self.metrics = Some(sink);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &CascadeConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &*self.store
    }

    /// The collaborator, for callers that perform the owner write themselves
    /// between `MutationHooks::before_mutate` and `after_persist`.
    pub fn store_mut(&mut self) -> &mut S {
        &mut *self.store
    }

    // ─────────────────────────────────────────────
    // ASSIGNMENT
    // ─────────────────────────────────────────────

    /// Assign a value to the relation slot `name`.
    ///
    /// The value is coerced first; only then is the slot's previous value
    /// captured (once per cycle) and the new value populated on the owner.
    pub fn assign(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
        name: &str,
        value: impl Into<Assignment>,
    ) -> Result<(), InternalError> {
        let relation = owner.model().try_relation(name)?;
        let coerced = coerce_relation(
            &*self.store,
            owner,
            self.config.assign_mode,
            relation,
            value.into(),
        )?;

        self.capture(cycle, owner, relation)?;
        owner.populate(relation.name, coerced);

        Ok(())
    }

    /// Assign every relation whose input key appears in `input`, in
    /// declaration order. Returns how many relations were assigned.
    pub fn load_relations(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
        input: &BTreeMap<String, Value>,
    ) -> Result<usize, InternalError> {
        let mut loaded = 0;
        for relation in owner.model().relations {
            let Some(value) = input.get(relation.input_key()) else {
                continue;
            };
            self.assign(cycle, owner, relation.name, value.clone())?;
            loaded += 1;
        }

        Ok(loaded)
    }

    /// Track `name` without assigning, so in-place edits to its populated
    /// records are reconciled by the next save.
    pub fn mark_relation_dirty(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
        name: &str,
    ) -> Result<(), InternalError> {
        let relation = owner.model().try_relation(name)?;

        self.capture(cycle, owner, relation)
    }

    fn capture(
        &self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
    ) -> Result<(), InternalError> {
        if cycle.tracker.is_tracked(relation.name) {
            return Ok(());
        }

        let current = match owner.related(relation.name) {
            Some(value) => value.clone(),
            None if owner.is_new() => RelationValue::empty_for(relation),
            None => self.store.find_related(owner, relation)?,
        };
        if !owner.is_populated(relation.name) {
            owner.populate(relation.name, current.clone());
        }
        cycle.tracker.capture(relation.name, current);

        tracing::debug!(
            entity = owner.model().path,
            relation = relation.name,
            "captured relation snapshot"
        );

        Ok(())
    }

    // ─────────────────────────────────────────────
    // LIFECYCLE
    // ─────────────────────────────────────────────

    /// Pre-validation phase for the owner's pending insert or update.
    pub fn before_validate(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
    ) -> Result<bool, InternalError> {
        let mode = save_mode(owner);
        let metrics = self.metrics;

        scoped(metrics, || self.pre_validate(cycle, owner, mode))
    }

    /// Post-persistence phase; commits the cycle's transaction.
    pub fn after_save(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
    ) -> Result<(), InternalError> {
        let metrics = self.metrics;

        scoped(metrics, || self.post_persist(cycle, owner))
    }

    /// Full save cycle: pre-validation, the owner write (validating first),
    /// then post-persistence. `Ok(false)` means nothing was kept.
    pub fn save(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
    ) -> Result<bool, InternalError> {
        let mode = save_mode(owner);
        let metrics = self.metrics;

        scoped(metrics, || -> Result<bool, InternalError> {
            if !self.pre_validate(cycle, owner, mode)? {
                return Ok(false);
            }

            match self.store.save(owner, true) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(entity = owner.model().path, "owner save refused");
                    self.abort_cycle(cycle, owner);
                    return Ok(false);
                }
                Err(err) => {
                    self.abort_cycle(cycle, owner);
                    return Err(err);
                }
            }

            self.post_persist(cycle, owner)?;

            Ok(true)
        })
    }

    /// Abandon an in-flight cycle after the owner write failed outside the
    /// engine. Rolls back the cycle's own transaction; snapshots are kept.
    pub fn abort(&mut self, cycle: &mut CascadeCycle, owner: &Record) {
        let metrics = self.metrics;

        scoped(metrics, || self.abort_cycle(cycle, owner));
    }

    fn abort_cycle(&mut self, cycle: &mut CascadeCycle, owner: &Record) {
        if cycle.state.is_active() {
            self.rollback(cycle, owner.model().path);
        }
    }

    /// Deletion cascade: dependents first, then the owner, in one transaction.
    pub fn delete(&mut self, owner: &mut Record) -> Result<bool, InternalError> {
        let metrics = self.metrics;

        scoped(metrics, || self.delete_cascade(owner))
    }
}

impl<S: Storage> MutationHooks for CascadeEngine<'_, S> {
    fn before_mutate(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
        mode: SaveMode,
    ) -> Result<bool, InternalError> {
        let metrics = self.metrics;

        scoped(metrics, || self.pre_validate(cycle, owner, mode))
    }

    fn after_persist(
        &mut self,
        cycle: &mut CascadeCycle,
        owner: &mut Record,
    ) -> Result<(), InternalError> {
        self.after_save(cycle, owner)
    }

    fn after_failed_mutate(&mut self, cycle: &mut CascadeCycle, owner: &Record) {
        self.abort(cycle, owner);
    }

    fn replace_delete(&mut self, owner: &mut Record) -> Result<bool, InternalError> {
        self.delete(owner)
    }
}

const fn save_mode(owner: &Record) -> SaveMode {
    if owner.is_new() {
        SaveMode::Insert
    } else {
        SaveMode::Update
    }
}

// Install the engine's sink override (if any) around one entry point.
fn scoped<T>(sink: Option<&'static dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    match sink {
        Some(sink) => with_metrics_sink(sink, f),
        None => f(),
    }
}
