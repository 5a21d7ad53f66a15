//! Persistence layer — append-only record stores for onboarded policies.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod row;
pub mod sheets;
pub mod traits;

use std::sync::Arc;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use row::PolicyRow;
pub use sheets::SheetsStore;
pub use traits::RecordStore;

use crate::config::{AppConfig, StoreBackend};
use crate::error::{ConfigError, Error};

/// Open the record store selected by `config`.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>, Error> {
    let store: Arc<dyn RecordStore> = match config.backend {
        StoreBackend::Sheets => {
            let sheets = config.sheets.as_ref().ok_or_else(|| ConfigError::MissingRequired {
                key: "GOOGLE_SHEETS_SPREADSHEET_ID".to_string(),
                hint: "The sheets backend needs a spreadsheet.".to_string(),
            })?;
            Arc::new(SheetsStore::new(sheets)?)
        }
        StoreBackend::LibSql => Arc::new(LibSqlStore::new_local(&config.db_path).await?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
