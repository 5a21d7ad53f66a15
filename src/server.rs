//! HTTP app assembly.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::onboarding::{OnboardingRouteState, SessionRegistry, onboarding_routes};
use crate::policies::{PolicyRouteState, policy_routes};
use crate::store::RecordStore;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Full router: onboarding wizard, stored policies and `/health`.
pub fn build_app(sessions: Arc<SessionRegistry>, store: Arc<dyn RecordStore>) -> Router {
    let onboarding = onboarding_routes(OnboardingRouteState {
        sessions,
        store: Arc::clone(&store),
    });
    let policies = policy_routes(PolicyRouteState { store });

    Router::new()
        .route("/health", get(health))
        .merge(onboarding)
        .merge(policies)
        .layer(CorsLayer::permissive())
}
