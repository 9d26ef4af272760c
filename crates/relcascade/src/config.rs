use serde::Deserialize;

///
/// SaveMode
///
/// The owner write a save cycle is about to perform.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SaveMode {
    #[default]
    Insert,
    Update,
}

impl SaveMode {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
        }
    }
}

///
/// AssignMode
///
/// How lookup data that matches no stored row is treated during assignment.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AssignMode {
    /// Instantiate a new related record.
    #[default]
    Upsert,
    /// Reject with a not-found error; keys must reference existing rows.
    ReferenceOnly,
}

///
/// TransactionPolicy
///
/// Which owner operations run their cascade inside a transaction.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct TransactionPolicy {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl TransactionPolicy {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            insert: false,
            update: false,
            delete: false,
        }
    }

    #[must_use]
    pub const fn requires(&self, mode: SaveMode) -> bool {
        match mode {
            SaveMode::Insert => self.insert,
            SaveMode::Update => self.update,
        }
    }
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        Self {
            insert: true,
            update: true,
            delete: true,
        }
    }
}

///
/// CascadeConfig
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CascadeConfig {
    pub transactions: TransactionPolicy,
    pub assign_mode: AssignMode,
}

///
/// TESTS
///
