//! `RecordStore` trait — the single persistence seam for onboarded policies.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::row::PolicyRow;

/// Append-only sink for finalized policy rows.
///
/// The onboarding core only ever calls [`append`](RecordStore::append);
/// [`list`](RecordStore::list) backs the policy selection pages.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Persist one row. Rows are never updated afterwards.
    async fn append(&self, row: &PolicyRow) -> Result<(), StoreError>;

    /// All stored rows, oldest first.
    async fn list(&self) -> Result<Vec<PolicyRow>, StoreError>;
}
