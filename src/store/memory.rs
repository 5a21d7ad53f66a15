//! In-process record store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::row::PolicyRow;
use crate::store::traits::RecordStore;

/// Keeps rows in memory. Used by tests and the `memory` backend.
///
/// `fail_with` makes every append fail with the given message, for
/// exercising store-error paths.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<PolicyRow>>,
    append_calls: RwLock<usize>,
    fail_with: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail (`Some`) or succeed again (`None`).
    pub async fn set_failure(&self, message: Option<&str>) {
        *self.fail_with.write().await = message.map(str::to_string);
    }

    /// Number of `append` calls, including failed ones.
    pub async fn append_calls(&self) -> usize {
        *self.append_calls.read().await
    }

    pub async fn rows(&self) -> Vec<PolicyRow> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, row: &PolicyRow) -> Result<(), StoreError> {
        *self.append_calls.write().await += 1;
        if let Some(message) = self.fail_with.read().await.clone() {
            return Err(StoreError::Unavailable(message));
        }
        self.rows.write().await.push(row.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PolicyRow>, StoreError> {
        Ok(self.rows.read().await.clone())
    }
}
