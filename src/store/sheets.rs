//! Google Sheets record store over the Sheets v4 REST API.
//!
//! Rows are appended with `valueInputOption=RAW` so dates and the premium
//! JSON stay text. Authentication is a bearer token supplied by config.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::SheetsConfig;
use crate::error::StoreError;
use crate::store::row::{HEADERS, PolicyRow};
use crate::store::traits::RecordStore;

#[derive(Serialize)]
struct ValueRange<'a> {
    values: [&'a [Value]; 1],
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Appends policy rows to one sheet of a spreadsheet.
pub struct SheetsStore {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    access_token: SecretString,
    timeout: std::time::Duration,
}

impl SheetsStore {
    pub fn new(config: &SheetsConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Http(format!("Failed to build HTTP client: {e}")))?;

        info!(
            spreadsheet = %config.spreadsheet_id,
            range = %config.range,
            "Using Google Sheets record store"
        );
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
            access_token: config.access_token.clone(),
            timeout: config.timeout,
        })
    }

    fn values_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, self.range
        )
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Http(e.to_string())
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Server {
            status: status.as_u16(),
            body: error_message(status, &body),
        })
    }
}

/// Pull the human-readable message out of a Google API error body.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.to_string()
            }
        })
}

/// Turn a sheet's value grid into rows, using the first row as headers.
///
/// Rows whose cells cannot be decoded are skipped.
fn rows_from_grid(grid: Vec<Vec<Value>>) -> Vec<PolicyRow> {
    let mut iter = grid.into_iter();
    let headers: Vec<String> = match iter.next() {
        Some(first) if first.iter().any(|v| v.as_str() == Some(HEADERS[0])) => first
            .iter()
            .map(|v| v.as_str().unwrap_or_default().trim().to_string())
            .collect(),
        // No header row: fall back to positional columns.
        Some(first) => {
            let mut rows = Vec::new();
            for values in std::iter::once(first).chain(iter) {
                match PolicyRow::from_values(&values) {
                    Ok(row) => rows.push(row),
                    Err(e) => tracing::warn!("Skipping sheet row: {e}"),
                }
            }
            return rows;
        }
        None => return Vec::new(),
    };

    iter.filter(|values| values.iter().any(|v| !v.is_null() && v.as_str() != Some("")))
        .filter_map(|values| {
            let cells: Map<String, Value> = headers
                .iter()
                .cloned()
                .zip(values.into_iter())
                .collect();
            PolicyRow::from_named(&cells)
                .map_err(|e| tracing::warn!("Skipping sheet row: {e}"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl RecordStore for SheetsStore {
    fn name(&self) -> &str {
        "google_sheets"
    }

    async fn append(&self, row: &PolicyRow) -> Result<(), StoreError> {
        let url = format!("{}:append", self.values_url());
        let values = row.to_values();
        let body = ValueRange {
            values: [values.as_slice()],
        };

        debug!(url = %url, "Appending policy row");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PolicyRow>, StoreError> {
        let resp = self
            .client
            .get(self.values_url())
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("valueRenderOption", "UNFORMATTED_VALUE")])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = Self::check(resp).await?;
        let grid: ValuesResponse = resp.json().await?;
        Ok(rows_from_grid(grid.values))
    }
}
