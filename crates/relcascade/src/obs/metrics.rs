use std::{cell::RefCell, collections::BTreeMap};

///
/// CascadeCounters
/// Ephemeral, in-memory counters for cascade operations.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CascadeCounters {
    // Cycle entrypoints
    pub save_cycles: u64,
    pub delete_cycles: u64,

    // Child writes
    pub children_persisted: u64,
    pub children_deleted: u64,
    pub links: u64,
    pub unlinks: u64,

    // Outcomes
    pub validation_failures: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

///
/// CascadeReport
/// Global counters plus per-owner-entity counters.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CascadeReport {
    pub totals: CascadeCounters,
    pub entities: BTreeMap<String, CascadeCounters>,
}

thread_local! {
    static REPORT: RefCell<CascadeReport> = RefCell::new(CascadeReport::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&CascadeReport) -> R) -> R {
    REPORT.with(|m| f(&m.borrow()))
}

/// Apply one counter update to the totals and to the owner entity's entry.
pub(crate) fn bump(entity_path: &str, f: impl Fn(&mut CascadeCounters)) {
    REPORT.with(|m| {
        let mut m = m.borrow_mut();
        f(&mut m.totals);
        f(m.entities.entry(entity_path.to_string()).or_default());
    });
}

/// Reset all counters (useful in tests).
pub(crate) fn reset() {
    REPORT.with(|m| *m.borrow_mut() = CascadeReport::default());
}
