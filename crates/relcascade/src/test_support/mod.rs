//! Test-only collaborators: static fixture models and a transactional
//! in-memory store with an operation log and failure injection.

pub(crate) mod fixtures;
mod store;

pub(crate) use store::{MemoryStore, StoreOp};

use crate::{model::EntityModel, record::Record, value::Value};

/// Build a record that looks loaded from storage, without touching a store.
pub(crate) fn stored(model: &'static EntityModel, attrs: &[(&str, Value)]) -> Record {
    Record::from_stored(
        model,
        attrs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect(),
    )
}

/// Route engine logs to the test harness; repeated calls are harmless.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
