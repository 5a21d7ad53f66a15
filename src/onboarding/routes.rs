//! REST endpoints that drive the onboarding wizard.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::OnboardingError;
use crate::store::RecordStore;

use super::model::MetadataInput;
use super::registry::SessionRegistry;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<dyn RecordStore>,
}

/// Step-2 request body: raw pasted text per year.
#[derive(Debug, Deserialize)]
pub struct PremiumsRequest {
    #[serde(default)]
    pub premiums: BTreeMap<i32, String>,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

fn onboarding_error_response(err: &OnboardingError) -> Response {
    let status = match err {
        OnboardingError::InvalidField { .. } | OnboardingError::EmptySchedule => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OnboardingError::WrongStep { .. } => StatusCode::CONFLICT,
        OnboardingError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, err.to_string())
}

fn session_not_found(id: Uuid) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Onboarding session {id} not found"))
}

/// POST /api/onboarding/sessions
async fn create_session(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let (_, handle) = state.sessions.create().await;
    let status = handle.lock().await.status();
    (StatusCode::CREATED, Json(status))
}

/// GET /api/onboarding/sessions/{id}
async fn get_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.sessions.get(id).await {
        Some(handle) => Json(handle.lock().await.status()).into_response(),
        None => session_not_found(id),
    }
}

/// POST /api/onboarding/sessions/{id}/metadata
///
/// Captures step 1 and returns the session, now listing the premium years.
async fn submit_metadata(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
    Json(input): Json<MetadataInput>,
) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return session_not_found(id);
    };
    let mut session = handle.lock().await;
    let today = Utc::now().date_naive();
    if let Err(e) = session.submit_metadata(input, today) {
        return onboarding_error_response(&e);
    }
    Json(session.status()).into_response()
}

/// POST /api/onboarding/sessions/{id}/premiums
///
/// Parses the pasted premiums and saves the policy to the record store.
async fn submit_premiums(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PremiumsRequest>,
) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return session_not_found(id);
    };
    let mut session = handle.lock().await;
    match session.submit_premiums(body.premiums, state.store.as_ref()).await {
        Ok(saved) => Json(serde_json::json!({
            "message": format!(
                "Policy for {} saved to {}.",
                saved.record.metadata.insured_name,
                state.store.name()
            ),
            "record": saved.record,
            "dropped_lines": saved.dropped_lines,
        }))
        .into_response(),
        Err(e) => onboarding_error_response(&e),
    }
}

/// POST /api/onboarding/sessions/{id}/restart
async fn restart_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return session_not_found(id);
    };
    let mut session = handle.lock().await;
    session.restart();
    Json(session.status()).into_response()
}

/// DELETE /api/onboarding/sessions/{id}
async fn delete_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<Uuid>,
) -> Response {
    if state.sessions.remove(id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        session_not_found(id)
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/sessions", post(create_session))
        .route(
            "/api/onboarding/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/onboarding/sessions/{id}/metadata", post(submit_metadata))
        .route("/api/onboarding/sessions/{id}/premiums", post(submit_premiums))
        .route("/api/onboarding/sessions/{id}/restart", post(restart_session))
        .with_state(state)
}
