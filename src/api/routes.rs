use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::auth::{auth_middleware, AuthService};
use crate::config::FrontendConfig;
use crate::dashboard::DashboardService;
use crate::storage::ProfileStore;
use crate::upstream::ReportFetcher;

use super::analytics::proxy_report;
use super::handlers::{
    add_project, dashboard_view, delete_project, export_csv, health_check, list_projects,
    AppState,
};

pub fn create_api_router(
    store: Arc<dyn ProfileStore>,
    fetcher: Arc<dyn ReportFetcher>,
    dashboard: Arc<DashboardService>,
    auth_service: Arc<AuthService>,
    frontend: FrontendConfig,
) -> Router {
    let state = Arc::new(AppState {
        store,
        fetcher,
        dashboard,
    });

    let protected_routes = Router::new()
        .route("/api/analytics", get(proxy_report))
        .route("/api/dashboard", get(dashboard_view))
        .route("/api/projects", get(list_projects).post(add_project))
        .route("/api/projects/{id}", delete(delete_project))
        .route("/api/export", post(export_csv))
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(state);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(CorsLayer::permissive());

    if let Some(static_dir) = frontend.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
}
