//! Integration tests for the HTTP API.
//!
//! These drive the full router (auth disabled) against in-memory SQLite
//! storage and a locally-bound fake upstream, verifying proxy behavior,
//! the project registry, the dashboard bundle, and CSV export end-to-end.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::IntoResponse,
    Router,
};
use mirador::api::create_api_router;
use mirador::auth::AuthService;
use mirador::config::{AuthConfig, AuthMode, FrontendConfig, UpstreamConfig};
use mirador::dashboard::DashboardService;
use mirador::storage::{ProfileStore, SqliteStorage};
use mirador::upstream::{AnalyticsApi, ReportFetcher};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn ProfileStore> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create a test auth service with authentication disabled
async fn create_test_auth_service() -> Arc<AuthService> {
    let config = AuthConfig {
        mode: AuthMode::None,
        oauth: None,
    };
    Arc::new(AuthService::new(config).await.unwrap())
}

#[derive(Clone)]
struct FakeUpstream {
    status: u16,
    body: String,
    hits: Arc<AtomicUsize>,
}

async fn fake_upstream_handler(State(fake): State<FakeUpstream>) -> impl IntoResponse {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::from_u16(fake.status).unwrap(),
        fake.body.clone(),
    )
}

/// Bind a fake upstream on an ephemeral port that answers every request
/// with the given status and body, counting hits.
async fn spawn_fake_upstream(status: u16, body: &str) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let fake = FakeUpstream {
        status,
        body: body.to_string(),
        hits: Arc::clone(&hits),
    };

    let app = Router::new()
        .fallback(fake_upstream_handler)
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

/// Helper to build the full router against the given upstream base URL
async fn create_test_router(base_url: &str) -> Router {
    let storage = create_test_storage().await;
    let auth_service = create_test_auth_service().await;

    let upstream_config = UpstreamConfig {
        api_token: "test-token".to_string(),
        team_id: None,
        base_url: base_url.to_string(),
    };
    let fetcher: Arc<dyn ReportFetcher> = Arc::new(AnalyticsApi::new(upstream_config).unwrap());
    let dashboard = Arc::new(DashboardService::new(Arc::clone(&fetcher)));

    create_api_router(
        storage,
        fetcher,
        dashboard,
        auth_service,
        FrontendConfig { static_dir: None },
    )
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn missing_project_id_returns_400_without_calling_upstream() {
    let (base_url, hits) = spawn_fake_upstream(200, r#"{"data": []}"#).await;
    let router = create_test_router(&base_url).await;

    let response = router.oneshot(get("/api/analytics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "missing project id");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_failure_status_is_mirrored_with_details() {
    let (base_url, _hits) = spawn_fake_upstream(403, "forbidden").await;
    let router = create_test_router(&base_url).await;

    let response = router
        .oneshot(get("/api/analytics?projectId=prj_1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["details"], "forbidden");
    assert!(body["error"].is_string());
    assert!(body["hint"].is_string());
}

#[tokio::test]
async fn successful_report_is_passed_through_verbatim() {
    let upstream_body = r#"{"data":[{"date":"2024-01-01","visitors":10,"pageviews":20}]}"#;
    let (base_url, hits) = spawn_fake_upstream(200, upstream_body).await;
    let router = create_test_router(&base_url).await;

    let response = router
        .oneshot(get(
            "/api/analytics?projectId=prj_1&type=stats&groupBy=path&from=2024-01-01&to=2024-02-01",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let expected: Value = serde_json::from_str(upstream_body).unwrap();
    assert_eq!(body, expected);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn project_registry_round_trips() {
    let (base_url, _hits) = spawn_fake_upstream(200, r#"{"data": []}"#).await;
    let router = create_test_router(&base_url).await;

    // Starts empty
    let response = router.clone().oneshot(get("/api/projects")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));

    // Add a project
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/projects",
            &json!({"id": "prj_1", "name": "Landing"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router.clone().oneshot(get("/api/projects")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body, json!([{"id": "prj_1", "name": "Landing"}]));

    // Duplicate ids are rejected
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/projects",
            &json!({"id": "prj_1", "name": "Duplicado"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Deletion requires the confirmation flag
    let response = router
        .clone()
        .oneshot(delete("/api/projects/prj_1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .clone()
        .oneshot(delete("/api/projects/prj_1?confirm=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Back to the prior state
    let response = router.clone().oneshot(get("/api/projects")).await.unwrap();
    assert_eq!(body_json(response).await, json!([]));

    // Deleting again is a 404
    let response = router
        .oneshot(delete("/api/projects/prj_1?confirm=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_project_fields_are_rejected() {
    let (base_url, _hits) = spawn_fake_upstream(200, r#"{"data": []}"#).await;
    let router = create_test_router(&base_url).await;

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/projects",
            &json!({"id": "", "name": "Landing"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(post_json(
            "/api/projects",
            &json!({"id": "prj_1", "name": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_returns_a_csv_attachment() {
    let (base_url, _hits) = spawn_fake_upstream(200, r#"{"data": []}"#).await;
    let router = create_test_router(&base_url).await;

    let response = router
        .oneshot(post_json(
            "/api/export",
            &json!({
                "filename": "reporte-prj_1-general",
                "rows": [
                    {"a": 1, "b": "x,y"},
                    {"a": 2, "b": "He said \"hi\""},
                ],
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"reporte-prj_1-general.csv\""
    );

    let csv = body_text(response).await;
    assert_eq!(csv, "\"a\",\"b\"\n\"1\",\"x,y\"\n\"2\",\"He said \"\"hi\"\"\"");
}

#[tokio::test]
async fn exporting_nothing_is_refused() {
    let (base_url, _hits) = spawn_fake_upstream(200, r#"{"data": []}"#).await;
    let router = create_test_router(&base_url).await;

    let response = router
        .oneshot(post_json(
            "/api/export",
            &json!({"filename": "vacio", "rows": []}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "no data to export");
}

#[tokio::test]
async fn dashboard_returns_a_normalized_bundle_with_totals() {
    let upstream_body = r#"{"data":[{"date":"2024-01-01","visitors":10,"pageviews":20}]}"#;
    let (base_url, hits) = spawn_fake_upstream(200, upstream_body).await;
    let router = create_test_router(&base_url).await;

    let response = router
        .clone()
        .oneshot(get("/api/dashboard?projectId=prj_1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["timeseries"][0]["Visitantes"], 10);
    assert_eq!(body["timeseries"][0]["Vistas"], 20);
    assert_eq!(body["timeseries"][0]["date"], "1 ene");
    assert_eq!(body["totals"]["visitors"], 10);
    assert_eq!(body["totals"]["pageviews"], 20);
    assert_eq!(body["totals"]["unique_pages"], 1);

    // One fetch cycle = timeseries + three breakdowns
    assert_eq!(hits.load(Ordering::SeqCst), 4);

    // The dashboard needs a selected project to query for
    let response = router.oneshot(get("/api/dashboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
