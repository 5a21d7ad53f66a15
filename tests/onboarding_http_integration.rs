//! Integration tests for the onboarding and policy REST surface.
//!
//! Each test spins up an Axum server on a random port and drives the real
//! HTTP contract with reqwest. The Google Sheets store is exercised against
//! a local mock of the Sheets v4 values API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;

use policy_onboard::config::SheetsConfig;
use policy_onboard::error::StoreError;
use policy_onboard::onboarding::{PolicyMetadata, PolicyRecord, PremiumSchedule, SessionRegistry};
use policy_onboard::server::build_app;
use policy_onboard::store::row::HEADERS;
use policy_onboard::store::{MemoryStore, PolicyRow, RecordStore, SheetsStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve `app` on a random local port and return the port.
async fn serve(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    port
}

/// Start the app over a memory store, return (base url, store).
async fn start_server() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let app = build_app(SessionRegistry::new(), store.clone());
    let port = serve(app).await;
    (format!("http://127.0.0.1:{port}"), store)
}

fn metadata_body() -> Value {
    json!({
        "insured_name": "Jane Doe",
        "date_of_birth": "1941-04-02",
        "carrier_name": "Acme Life",
        "life_expectancy_months": 24,
        "le_report_date": "2025-03-01",
        "death_benefit": "1000000",
        "internal_cost": "12500.506"
    })
}

/// Money fields serialize as decimal strings.
fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

/// Create a session and return its id.
async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let resp = client
        .post(format!("{base}/api/onboarding/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["step"], "awaiting_metadata");
    assert_eq!(body["step_number"], 1);
    body["id"].as_str().unwrap().to_string()
}

/// Create a session and complete step 1; return (id, years).
async fn session_on_step_two(client: &reqwest::Client, base: &str) -> (String, Vec<i32>) {
    let id = create_session(client, base).await;
    let resp = client
        .post(format!("{base}/api/onboarding/sessions/{id}/metadata"))
        .json(&metadata_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["step"], "awaiting_premiums");
    let years = body["years"]
        .as_array()
        .unwrap()
        .iter()
        .map(|y| y.as_i64().unwrap() as i32)
        .collect();
    (id, years)
}

#[tokio::test]
async fn health_responds_ok() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn full_wizard_saves_policy() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();

        let (id, years) = session_on_step_two(&client, &base).await;
        // 24 months -> 2 years of coverage plus 3 buffer years.
        assert_eq!(years.len(), 5);
        assert_eq!(years[0], Utc::now().year());
        assert!(years.windows(2).all(|w| w[1] == w[0] + 1));

        let first = years[0];
        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/premiums"))
            .json(&json!({
                "premiums": {
                    first.to_string(): "$1,000.00\n1000\nn/a\n",
                    years[1].to_string(): "   \n"
                }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Policy for Jane Doe saved to memory.");
        assert_eq!(body["record"]["premiums"][first.to_string()], json!([1000.0, 1000.0]));
        assert!(body["record"]["premiums"].get(years[1].to_string()).is_none());
        assert_eq!(body["dropped_lines"][first.to_string()], json!([3]));

        let rows = store.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].insured_name, "Jane Doe");
        assert_eq!(rows[0].internal_cost, dec!(12500.51));
        assert_eq!(
            rows[0].premiums_json,
            format!("{{\"{first}\": [1000.0, 1000.0]}}")
        );

        // Saving does not advance or clear the form.
        let status: Value = client
            .get(format!("{base}/api/onboarding/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["step"], "awaiting_premiums");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_metadata_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let id = create_session(&client, &base).await;

        let mut body = metadata_body();
        body["life_expectancy_months"] = json!(0);
        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/metadata"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err: Value = resp.json().await.unwrap();
        assert!(
            err["error"].as_str().unwrap().contains("life_expectancy_months"),
            "unexpected error: {err}"
        );

        // Still on step 1.
        let status: Value = client
            .get(format!("{base}/api/onboarding/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["step_number"], 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oversized_life_expectancy_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let id = create_session(&client, &base).await;

        let mut body = metadata_body();
        body["life_expectancy_months"] = json!(u32::MAX);
        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/metadata"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err: Value = resp.json().await.unwrap();
        assert!(
            err["error"].as_str().unwrap().contains("at most 1200 months"),
            "unexpected error: {err}"
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_schedule_is_not_saved() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();
        let (id, years) = session_on_step_two(&client, &base).await;

        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/premiums"))
            .json(&json!({ "premiums": { years[0].to_string(): "abc\n\n" } }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"], "No premiums parsed. Please check your input.");
        assert_eq!(store.append_calls().await, 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn premiums_before_metadata_conflict() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();
        let id = create_session(&client, &base).await;

        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/premiums"))
            .json(&json!({ "premiums": { "2026": "100" } }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(store.append_calls().await, 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn store_failure_is_bad_gateway_and_retryable() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();
        let (id, years) = session_on_step_two(&client, &base).await;
        let body = json!({ "premiums": { years[0].to_string(): "250" } });

        store.set_failure(Some("quota exceeded")).await;
        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/premiums"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let err: Value = resp.json().await.unwrap();
        let message = err["error"].as_str().unwrap();
        assert!(message.starts_with("Failed to save policy:"), "{message}");
        assert!(message.contains("quota exceeded"), "{message}");

        store.set_failure(None).await;
        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/premiums"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(store.append_calls().await, 2);
        assert_eq!(store.rows().await.len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn restart_returns_to_step_one() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let (id, _) = session_on_step_two(&client, &base).await;

        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/restart"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["step"], "awaiting_metadata");
        assert!(body.get("metadata").is_none());
        assert_eq!(body["years"], json!([]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_and_deleted_sessions_are_not_found() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();

        let missing = uuid::Uuid::new_v4();
        let resp = client
            .get(format!("{base}/api/onboarding/sessions/{missing}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let id = create_session(&client, &base).await;
        let resp = client
            .delete(format!("{base}/api/onboarding/sessions/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{id}/restart"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn idle_session_expires() {
    timeout(TEST_TIMEOUT, async {
        let store = Arc::new(MemoryStore::new());
        let app = build_app(SessionRegistry::with_ttl(Duration::from_millis(100)), store);
        let base = format!("http://127.0.0.1:{}", serve(app).await);
        let client = reqwest::Client::new();

        let id = create_session(&client, &base).await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        let resp = client
            .get(format!("{base}/api/onboarding/sessions/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn saved_policy_feeds_return_template() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let (id, years) = session_on_step_two(&client, &base).await;
        client
            .post(format!("{base}/api/onboarding/sessions/{id}/premiums"))
            .json(&json!({ "premiums": { years[0].to_string(): "100\n100" } }))
            .send()
            .await
            .unwrap();

        let policies: Value = client
            .get(format!("{base}/api/policies"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(policies[0]["key"], "jane_doe");
        assert_eq!(policies[0]["carrier_name"], "Acme Life");

        let resp = client
            .post(format!("{base}/api/policies/return-template"))
            .json(&json!({ "policy": "jane_doe", "investment": "$100,000" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let template: Value = resp.json().await.unwrap();
        assert_eq!(template["insured_name"], "Jane Doe");
        assert_eq!(decimal(&template["investment"]), dec!(100000));
        let rows = template["rows"].as_array().unwrap();
        assert!(rows.len() >= 3);
        assert_eq!(rows[0]["year"], Utc::now().year());
        assert_eq!(decimal(&rows[0]["premium"]), dec!(200));
        assert_eq!(decimal(&rows[0]["total_cost"]), dec!(100200));

        let resp = client
            .post(format!("{base}/api/policies/return-template"))
            .json(&json!({ "policy": "john_smith", "investment": "1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

// ── Google Sheets store against a mock values API ───────────────────────

#[derive(Default)]
struct MockSheet {
    rows: Vec<Value>,
    auth: Vec<String>,
    queries: Vec<HashMap<String, String>>,
}

type SharedSheet = Arc<Mutex<MockSheet>>;

async fn mock_append(
    State(sheet): State<SharedSheet>,
    Path((id, range)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if id == "forbidden" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": 403, "message": "The caller does not have permission"}})),
        );
    }
    assert_eq!(range, "Policies:append");
    let mut sheet = sheet.lock().await;
    sheet.auth.push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    );
    sheet.queries.push(query);
    for row in body["values"].as_array().cloned().unwrap_or_default() {
        sheet.rows.push(row);
    }
    (StatusCode::OK, Json(json!({"spreadsheetId": id})))
}

async fn mock_values(State(sheet): State<SharedSheet>) -> Json<Value> {
    let sheet = sheet.lock().await;
    let mut values = vec![json!(HEADERS)];
    values.extend(sheet.rows.iter().cloned());
    Json(json!({ "range": "Policies!A1:H", "values": values }))
}

async fn start_mock_sheets() -> (u16, SharedSheet) {
    let sheet = SharedSheet::default();
    let app = Router::new()
        .route(
            "/v4/spreadsheets/{id}/values/{range}",
            get(mock_values).post(mock_append),
        )
        .with_state(Arc::clone(&sheet));
    (serve(app).await, sheet)
}

fn sheets_store(port: u16, spreadsheet_id: &str) -> SheetsStore {
    SheetsStore::new(&SheetsConfig {
        spreadsheet_id: spreadsheet_id.to_string(),
        range: "Policies".to_string(),
        access_token: SecretString::from("test-token".to_string()),
        base_url: format!("http://127.0.0.1:{port}"),
        timeout: Duration::from_secs(2),
    })
    .unwrap()
}

fn sample_row() -> PolicyRow {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let premiums: PremiumSchedule = vec![(2026, vec![100.0, 100.0]), (2027, vec![105.5])]
        .into_iter()
        .collect();
    let record = PolicyRecord {
        metadata: PolicyMetadata {
            insured_name: "Bob Roe".to_string(),
            date_of_birth: date(1950, 7, 4),
            carrier_name: "Zenith".to_string(),
            life_expectancy_months: 48,
            le_report_date: date(2025, 11, 30),
            death_benefit: dec!(500000),
            internal_cost: dec!(1250.75),
        },
        premiums,
    };
    PolicyRow::from_record(&record).unwrap()
}

#[tokio::test]
async fn sheets_store_appends_and_lists() {
    timeout(TEST_TIMEOUT, async {
        let (port, sheet) = start_mock_sheets().await;
        let store = sheets_store(port, "sheet-123");
        let row = sample_row();

        store.append(&row).await.unwrap();

        {
            let sheet = sheet.lock().await;
            assert_eq!(sheet.auth, vec!["Bearer test-token".to_string()]);
            assert_eq!(sheet.queries[0]["valueInputOption"], "RAW");
            assert_eq!(sheet.queries[0]["insertDataOption"], "INSERT_ROWS");
            assert_eq!(sheet.rows[0][0], "Bob Roe");
            assert_eq!(sheet.rows[0][7], r#"{"2026": [100.0, 100.0], "2027": [105.5]}"#);
        }

        let rows = store.list().await.unwrap();
        assert_eq!(rows, vec![row]);
        assert_eq!(store.name(), "google_sheets");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn sheets_store_surfaces_google_errors() {
    timeout(TEST_TIMEOUT, async {
        let (port, _) = start_mock_sheets().await;
        let store = sheets_store(port, "forbidden");

        match store.append(&sample_row()).await {
            Err(StoreError::Server { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "The caller does not have permission");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}
