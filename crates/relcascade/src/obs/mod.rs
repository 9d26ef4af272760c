//! Observability: cascade counters and the sink abstraction.
//!
//! Cascade logic never touches `metrics` state directly; every event flows
//! through `sink::record`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{CascadeCounters, CascadeReport};
pub use sink::{
    CascadeEvent, CycleKind, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink,
};
