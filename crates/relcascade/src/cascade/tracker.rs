use crate::record::RelationValue;

///
/// RelationTracker
///
/// Old-value snapshots for the relations assigned during one cycle.
/// A relation is tracked iff it was assigned (or explicitly marked dirty)
/// in the current cycle; untracked relations are left alone by every phase.
///

#[derive(Clone, Debug, Default)]
pub struct RelationTracker {
    // capture order; a handful of relations per owner at most
    snapshots: Vec<(&'static str, RelationValue)>,
}

impl RelationTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }

    /// Record `current` as the old value of `name` unless one is already held.
    /// Returns whether a new snapshot was taken.
    pub fn capture(&mut self, name: &'static str, current: RelationValue) -> bool {
        if self.is_tracked(name) {
            return false;
        }
        self.snapshots.push((name, current));

        true
    }

    #[must_use]
    pub fn snapshot_of(&self, name: &str) -> Option<&RelationValue> {
        self.snapshots
            .iter()
            .find(|(tracked, _)| *tracked == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn is_tracked(&self, name: &str) -> bool {
        self.snapshot_of(name).is_some()
    }

    /// Drop the snapshot once the relation has been reconciled.
    pub fn clear(&mut self, name: &str) {
        self.snapshots.retain(|(tracked, _)| *tracked != name);
    }

    /// Tracked relation names, in capture order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.snapshots.iter().map(|(name, _)| *name).collect()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

///
/// TESTS
///
