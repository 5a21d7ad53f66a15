//! libSQL backend — local `RecordStore` implementation.
//!
//! Supports local file and in-memory databases. Money columns are stored
//! as decimal text so amounts round-trip exactly.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::row::PolicyRow;
use crate::store::traits::RecordStore;

const POLICY_COLUMNS: &str = "insured_name, dob, carrier, le_months, le_report_date, \
                              death_benefit, internal_cost, premiums_json";

/// libSQL record store.
///
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Policy database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Database(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Database(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn row_to_policy(row: &libsql::Row) -> Result<PolicyRow, StoreError> {
    let read = |e: libsql::Error| StoreError::Database(format!("read policy row: {e}"));
    let decimal = |field: &str, s: String| {
        Decimal::from_str(&s).map_err(|e| StoreError::MalformedRow(format!("{field}: '{s}': {e}")))
    };

    let months: i64 = row.get(3).map_err(read)?;
    Ok(PolicyRow {
        insured_name: row.get(0).map_err(read)?,
        date_of_birth: row.get(1).map_err(read)?,
        carrier_name: row.get(2).map_err(read)?,
        life_expectancy_months: u32::try_from(months)
            .map_err(|_| StoreError::MalformedRow(format!("le_months: {months}")))?,
        le_report_date: row.get(4).map_err(read)?,
        death_benefit: decimal("death_benefit", row.get(5).map_err(read)?)?,
        internal_cost: decimal("internal_cost", row.get(6).map_err(read)?)?,
        premiums_json: row.get(7).map_err(read)?,
    })
}

#[async_trait]
impl RecordStore for LibSqlStore {
    fn name(&self) -> &str {
        "libsql"
    }

    async fn append(&self, row: &PolicyRow) -> Result<(), StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO policies (id, {POLICY_COLUMNS}, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    id.clone(),
                    row.insured_name.as_str(),
                    row.date_of_birth.as_str(),
                    row.carrier_name.as_str(),
                    i64::from(row.life_expectancy_months),
                    row.le_report_date.as_str(),
                    row.death_benefit.to_string(),
                    row.internal_cost.to_string(),
                    row.premiums_json.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Database(format!("append policy: {e}")))?;

        debug!(id = %id, insured_name = %row.insured_name, "Policy row inserted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PolicyRow>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {POLICY_COLUMNS} FROM policies ORDER BY rowid ASC"),
                (),
            )
            .await
            .map_err(|e| StoreError::Database(format!("list policies: {e}")))?;

        let mut policies = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Database(format!("list policies: {e}")))?
        {
            match row_to_policy(&row) {
                Ok(policy) => policies.push(policy),
                Err(e) => tracing::warn!("Skipping policy row: {e}"),
            }
        }
        Ok(policies)
    }
}
