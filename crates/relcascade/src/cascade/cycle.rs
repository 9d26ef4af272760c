use crate::{cascade::tracker::RelationTracker, record::RelationValue, traits::TransactionHandle};

///
/// CascadeState
///
/// Idle → PreValidating → OwnerPersisting → PostPersisting → Committed | RolledBack
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CascadeState {
    #[default]
    Idle,
    PreValidating,
    OwnerPersisting,
    PostPersisting,
    Committed,
    RolledBack,
}

impl CascadeState {
    /// A phase of the current cycle is running or pending completion.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::PreValidating | Self::OwnerPersisting | Self::PostPersisting
        )
    }
}

///
/// CascadeCycle
///
/// Cycle-scoped state for one owner mutation: relation snapshots, the phase
/// state machine, the re-entrancy guard and the transaction this cycle
/// opened (if any). One cycle belongs to exactly one owner record; it is
/// never shared between owners.
///
/// Snapshots survive a rollback so a corrected retry reconciles the same
/// changes; they are cleared once PostPersisting has committed.
///

#[derive(Debug, Default)]
pub struct CascadeCycle {
    pub(in crate::cascade) tracker: RelationTracker,
    pub(in crate::cascade) state: CascadeState,
    pub(in crate::cascade) transaction: Option<TransactionHandle>,
    pub(in crate::cascade) post_persisting: bool,
}

impl CascadeCycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> CascadeState {
        self.state
    }

    /// Whether this cycle currently owns an open transaction.
    #[must_use]
    pub const fn owns_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Names of relations assigned (or marked dirty) in this cycle, in capture order.
    #[must_use]
    pub fn dirty_relations(&self) -> Vec<&'static str> {
        self.tracker.names()
    }

    /// The value `name` held before its first assignment in this cycle.
    #[must_use]
    pub fn old_relation(&self, name: &str) -> Option<&RelationValue> {
        self.tracker.snapshot_of(name)
    }

    #[must_use]
    pub const fn tracker(&self) -> &RelationTracker {
        &self.tracker
    }
}
