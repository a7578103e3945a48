//! Tunables for [`InMemoryStore`](crate::InMemoryStore).

use serde::{Deserialize, Serialize};

use docdouble_core::error::{StoreError, StoreResult};

/// Length of the hex alphabet an object id is drawn from.
const MAX_OBJECT_ID_LENGTH: usize = 32;

/// Query window and id settings.
///
/// Every field falls back to its default when absent from a deserialized
/// source, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Page size used when a query names no `limit`.
    pub default_limit: usize,
    /// Upper bound applied to any requested `limit`.
    pub max_limit: usize,
    /// Number of characters in a generated `objectId`.
    pub object_id_length: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
            object_id_length: 10,
        }
    }
}

impl StoreConfig {
    /// Checks that the settings describe a usable store.
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_limit == 0 {
            return Err(StoreError::Initialization("max_limit must be positive".into()));
        }

        if self.default_limit > self.max_limit {
            return Err(StoreError::Initialization(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit,
            )));
        }

        if !(1..=MAX_OBJECT_ID_LENGTH).contains(&self.object_id_length) {
            return Err(StoreError::Initialization(format!(
                "object_id_length must be between 1 and {MAX_OBJECT_ID_LENGTH}, got {}",
                self.object_id_length,
            )));
        }

        Ok(())
    }

    /// Resolves a requested page size against the configured window.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}
