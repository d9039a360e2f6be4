//! Analytics proxy endpoint.
//!
//! Forwards a report query to the third-party analytics API with the
//! server-held credentials injected, and passes the upstream JSON body
//! through verbatim. Never caches: every invocation is a fresh round trip.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::upstream::query::{DEFAULT_FROM, DEFAULT_TO};
use crate::upstream::{GroupBy, ReportQuery, ReportType};

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    #[serde(default, rename = "projectId")]
    pub project_id: Option<String>,
    #[serde(default, rename = "type")]
    pub report_type: Option<ReportType>,
    #[serde(default, rename = "groupBy")]
    pub group_by: Option<GroupBy>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl ReportParams {
    /// Validate and fill defaults. The project id is the only required
    /// input; dates default to the rolling 30-day window.
    pub fn into_query(self) -> Result<ReportQuery, ApiError> {
        let project_id = self
            .project_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Validation("missing project id".to_string()))?;

        Ok(ReportQuery {
            project_id,
            report_type: self.report_type.unwrap_or_default(),
            group_by: self.group_by,
            from: self.from.unwrap_or_else(|| DEFAULT_FROM.to_string()),
            to: self.to.unwrap_or_else(|| DEFAULT_TO.to_string()),
        })
    }
}

/// Proxy a report query to the upstream analytics API
pub async fn proxy_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.into_query()?;
    let body = state.fetcher.fetch(&query).await?;
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_id_is_a_validation_error() {
        let params = ReportParams {
            project_id: None,
            report_type: None,
            group_by: None,
            from: None,
            to: None,
        };
        assert!(matches!(
            params.into_query(),
            Err(ApiError::Validation(message)) if message == "missing project id"
        ));

        let params = ReportParams {
            project_id: Some(String::new()),
            report_type: None,
            group_by: None,
            from: None,
            to: None,
        };
        assert!(params.into_query().is_err());
    }

    #[test]
    fn defaults_fill_type_and_date_bounds() {
        let params = ReportParams {
            project_id: Some("prj_1".to_string()),
            report_type: None,
            group_by: None,
            from: None,
            to: None,
        };

        let query = params.into_query().unwrap();
        assert_eq!(query.report_type, ReportType::Timeseries);
        assert_eq!(query.from, DEFAULT_FROM);
        assert_eq!(query.to, DEFAULT_TO);
    }
}
