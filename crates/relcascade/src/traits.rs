use crate::{
    error::InternalError,
    model::{EntityModel, RelationDescriptor},
    record::{Record, RelationValue},
    value::Value,
};

///
/// TransactionHandle
///
/// Opaque handle for one open storage transaction. Not `Clone`: commit and
/// rollback consume it, so a handle can never be reused after either.
///

#[derive(Debug, Eq, PartialEq)]
pub struct TransactionHandle(u64);

impl TransactionHandle {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

///
/// Storage
///
/// The record-storage collaborator the cascade engine drives. The engine owns
/// no storage of its own; every read and write goes through this trait.
///
/// `save` and `delete` return `Ok(false)` when the store refuses the write
/// (failed validation, a veto), and `Err` when the storage call itself fails.
///

pub trait Storage {
    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    fn begin_transaction(&mut self) -> Result<TransactionHandle, InternalError>;

    fn commit(&mut self, tx: TransactionHandle) -> Result<(), InternalError>;

    fn rollback(&mut self, tx: TransactionHandle) -> Result<(), InternalError>;

    fn is_active(&self, tx: &TransactionHandle) -> bool;

    /// Whether any transaction is currently open on this store.
    fn in_transaction(&self) -> bool;

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Find one record of `model` whose attributes equal every `(name, value)` pair.
    fn find_one(
        &self,
        model: &'static EntityModel,
        keys: &[(&'static str, Value)],
    ) -> Result<Option<Record>, InternalError>;

    /// Load the records currently related to `owner` through `relation`.
    fn find_related(
        &self,
        owner: &Record,
        relation: &'static RelationDescriptor,
    ) -> Result<RelationValue, InternalError>;

    /// Reload `record` from storage.
    fn refresh(&self, record: &mut Record) -> Result<(), InternalError>;

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Validate `record`, replacing its field errors. Returns whether it is valid.
    fn validate(&self, record: &mut Record) -> Result<bool, InternalError>;

    fn save(&mut self, record: &mut Record, validate_first: bool) -> Result<bool, InternalError>;

    fn delete(&mut self, record: &Record) -> Result<bool, InternalError>;

    /// Establish the relation between `owner` and `related`, writing whichever
    /// side (owner, related or junction row) holds the key.
    fn link(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
    ) -> Result<(), InternalError>;

    /// Remove the relation between `owner` and `related`. With `delete`, the
    /// junction row or dependent record is deleted instead of having its key
    /// nulled.
    fn unlink(
        &mut self,
        owner: &mut Record,
        relation: &'static RelationDescriptor,
        related: &mut Record,
        delete: bool,
    ) -> Result<(), InternalError>;
}
