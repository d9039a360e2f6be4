use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::auth::AuthenticatedUser;
use crate::dashboard::{BundleView, DashboardService, Selection};
use crate::export;
use crate::models::{Project, UserProfile};
use crate::storage::ProfileStore;
use crate::upstream::query::{DEFAULT_FROM, DEFAULT_TO};
use crate::upstream::ReportFetcher;

pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub fetcher: Arc<dyn ReportFetcher>,
    pub dashboard: Arc<DashboardService>,
}

impl AppState {
    /// The profile document is created lazily, on the first authenticated
    /// request that needs it.
    async fn profile_for(&self, user: &AuthenticatedUser) -> Result<UserProfile, ApiError> {
        self.store
            .ensure_profile(&user.user_id, user.email.as_deref())
            .await
            .map_err(ApiError::Internal)
    }
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct NewProject {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Deserialize)]
pub struct DashboardParams {
    #[serde(default, rename = "projectId")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Deserialize)]
pub struct ExportRequest {
    pub filename: String,
    pub rows: Vec<Map<String, Value>>,
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

/// List the caller's registered projects
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let profile = state.profile_for(&user).await?;
    Ok(Json(profile.projects))
}

/// Register a new project for the caller
pub async fn add_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let id = payload.id.trim().to_string();
    let name = payload.name.trim().to_string();

    if id.is_empty() {
        return Err(ApiError::Validation("project id cannot be empty".to_string()));
    }
    if name.is_empty() {
        return Err(ApiError::Validation(
            "project name cannot be empty".to_string(),
        ));
    }

    let profile = state.profile_for(&user).await?;
    let list_was_empty = profile.projects.is_empty();

    let project = Project { id, name };
    state.store.add_project(&user.user_id, &project).await?;
    state
        .dashboard
        .note_added(&user.user_id, &project.id, list_was_empty);

    Ok((StatusCode::CREATED, Json(project)))
}

/// Remove a project from the caller's list. Deletion never proceeds
/// without the confirmation flag the client sets after prompting the user.
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(project_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    if !params.confirm {
        return Err(ApiError::Validation(
            "project deletion requires confirmation".to_string(),
        ));
    }

    state.profile_for(&user).await?;
    let remaining = state
        .store
        .remove_project(&user.user_id, &project_id)
        .await?;
    state
        .dashboard
        .note_removed(&user.user_id, &project_id, &remaining);

    Ok(StatusCode::NO_CONTENT)
}

/// Run a fetch cycle for the requested selection and return the
/// chart-ready bundle with its derived totals.
pub async fn dashboard_view(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<BundleView>, ApiError> {
    let project_id = params
        .project_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("missing project id".to_string()))?;

    state.profile_for(&user).await?;

    let selection = Selection {
        project_id,
        from: params.from.unwrap_or_else(|| DEFAULT_FROM.to_string()),
        to: params.to.unwrap_or_else(|| DEFAULT_TO.to_string()),
    };

    let view = state.dashboard.refresh(&user.user_id, selection).await?;
    Ok(Json(view))
}

/// Serialize the posted rows as a CSV download
pub async fn export_csv(
    State(_state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthenticatedUser>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, ApiError> {
    let csv = export::to_csv(&request.rows)
        .map_err(|err| ApiError::Validation(err.to_string()))?;

    let filename = export::sanitize_filename(&request.filename);
    let disposition = format!("attachment; filename=\"{filename}.csv\"");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
