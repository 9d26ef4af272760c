//! Metrics sink boundary.
//!
//! This module is the only bridge between cascade logic and the
//! thread-local counter state.
use crate::obs::metrics::{self, CascadeReport};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<&'static dyn MetricsSink>> = const { RefCell::new(None) };
}

///
/// CycleKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CycleKind {
    Save,
    Delete,
}

///
/// CascadeEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CascadeEvent {
    CycleStart {
        kind: CycleKind,
        entity_path: &'static str,
    },
    ChildPersisted {
        entity_path: &'static str,
        relation: &'static str,
    },
    ChildDeleted {
        entity_path: &'static str,
        relation: &'static str,
    },
    Linked {
        entity_path: &'static str,
        relation: &'static str,
    },
    Unlinked {
        entity_path: &'static str,
        relation: &'static str,
    },
    ValidationFailed {
        entity_path: &'static str,
        relation: &'static str,
    },
    Committed {
        entity_path: &'static str,
    },
    RolledBack {
        entity_path: &'static str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: CascadeEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local counters.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: CascadeEvent) {
        match event {
            CascadeEvent::CycleStart { kind, entity_path } => match kind {
                CycleKind::Save => metrics::bump(entity_path, |c| {
                    c.save_cycles = c.save_cycles.saturating_add(1);
                }),
                CycleKind::Delete => metrics::bump(entity_path, |c| {
                    c.delete_cycles = c.delete_cycles.saturating_add(1);
                }),
            },
            CascadeEvent::ChildPersisted { entity_path, .. } => {
                metrics::bump(entity_path, |c| {
                    c.children_persisted = c.children_persisted.saturating_add(1);
                });
            }
            CascadeEvent::ChildDeleted { entity_path, .. } => {
                metrics::bump(entity_path, |c| {
                    c.children_deleted = c.children_deleted.saturating_add(1);
                });
            }
            CascadeEvent::Linked { entity_path, .. } => {
                metrics::bump(entity_path, |c| c.links = c.links.saturating_add(1));
            }
            CascadeEvent::Unlinked { entity_path, .. } => {
                metrics::bump(entity_path, |c| c.unlinks = c.unlinks.saturating_add(1));
            }
            CascadeEvent::ValidationFailed { entity_path, .. } => {
                metrics::bump(entity_path, |c| {
                    c.validation_failures = c.validation_failures.saturating_add(1);
                });
            }
            CascadeEvent::Committed { entity_path } => {
                metrics::bump(entity_path, |c| c.commits = c.commits.saturating_add(1));
            }
            CascadeEvent::RolledBack { entity_path } => {
                metrics::bump(entity_path, |c| c.rollbacks = c.rollbacks.saturating_add(1));
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: CascadeEvent) {
    let override_sink = SINK_OVERRIDE.with(|cell| *cell.borrow());
    match override_sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current counters.
#[must_use]
pub fn metrics_report() -> CascadeReport {
    metrics::with_state(Clone::clone)
}

/// Reset all counters.
pub fn metrics_reset_all() {
    metrics::reset();
}

/// Run a closure with a temporary metrics sink override.
/// The previous sink is restored on every exit, including unwinding.
pub fn with_metrics_sink<T>(sink: &'static dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<&'static dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
