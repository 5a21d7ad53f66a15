//! REST endpoints over stored policies.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{StoreError, TemplateError};
use crate::onboarding::model::PolicyRecord;
use crate::onboarding::routes::error_response;
use crate::store::RecordStore;

use super::returns;

/// Shared state for policy routes.
#[derive(Clone)]
pub struct PolicyRouteState {
    pub store: Arc<dyn RecordStore>,
}

/// One entry of `GET /api/policies`.
#[derive(Debug, Serialize)]
pub struct PolicySummary {
    pub key: String,
    pub insured_name: String,
    pub carrier_name: String,
    pub date_of_birth: NaiveDate,
    pub le_report_date: NaiveDate,
    pub life_expectancy_months: u32,
    pub death_benefit: Decimal,
}

impl From<&PolicyRecord> for PolicySummary {
    fn from(record: &PolicyRecord) -> Self {
        let meta = &record.metadata;
        Self {
            key: record.key(),
            insured_name: meta.insured_name.clone(),
            carrier_name: meta.carrier_name.clone(),
            date_of_birth: meta.date_of_birth,
            le_report_date: meta.le_report_date,
            life_expectancy_months: meta.life_expectancy_months,
            death_benefit: meta.death_benefit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub policy: String,
    /// Decimal text, `$` and thousands separators allowed.
    pub investment: String,
}

/// Decode every stored row, skipping rows that fail.
async fn load_records(store: &dyn RecordStore) -> Result<Vec<PolicyRecord>, StoreError> {
    let rows = store.list().await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            row.to_record()
                .map_err(|e| warn!(insured = %row.insured_name, "Skipping stored policy: {e}"))
                .ok()
        })
        .collect())
}

/// Last stored record with `key`; later rows supersede earlier ones.
pub fn find_policy(records: Vec<PolicyRecord>, key: &str) -> Option<PolicyRecord> {
    records.into_iter().rev().find(|r| r.key() == key)
}

fn parse_investment(text: &str) -> Result<Decimal, TemplateError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    Decimal::from_str(&cleaned).map_err(|_| TemplateError::InvalidInvestment(text.to_string()))
}

fn template_error_response(err: &TemplateError) -> Response {
    let status = match err {
        TemplateError::PolicyNotFound { .. } => StatusCode::NOT_FOUND,
        TemplateError::InvalidInvestment(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error_response(status, err.to_string())
}

/// GET /api/policies
async fn list_policies(State(state): State<PolicyRouteState>) -> Response {
    match load_records(state.store.as_ref()).await {
        Ok(records) => {
            let summaries: Vec<PolicySummary> = records.iter().map(PolicySummary::from).collect();
            Json(summaries).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

/// POST /api/policies/return-template
async fn return_template(
    State(state): State<PolicyRouteState>,
    Json(req): Json<TemplateRequest>,
) -> Response {
    let investment = match parse_investment(&req.investment) {
        Ok(v) => v,
        Err(e) => return template_error_response(&e),
    };
    let records = match load_records(state.store.as_ref()).await {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    };
    let Some(record) = find_policy(records, &req.policy) else {
        return template_error_response(&TemplateError::PolicyNotFound { key: req.policy });
    };

    match returns::generate(&record, investment, Utc::now().date_naive()) {
        Ok(template) => Json(template).into_response(),
        Err(e) => template_error_response(&e),
    }
}

/// Build the policy REST routes.
pub fn policy_routes(state: PolicyRouteState) -> Router {
    Router::new()
        .route("/api/policies", get(list_policies))
        .route("/api/policies/return-template", post(return_template))
        .with_state(state)
}
