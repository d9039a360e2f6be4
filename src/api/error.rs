use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;
use crate::upstream::UpstreamError;

/// Everything a handler can fail with. Errors are recovered here, at the
/// response boundary; none of them propagates past a handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    /// The third-party analytics API answered with a non-success status.
    /// The response mirrors that status and carries the raw upstream text.
    #[error("upstream returned status {status}")]
    Upstream {
        status: u16,
        details: String,
        hint: Option<&'static str>,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::Conflict(message) => (StatusCode::CONFLICT, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Upstream {
                status,
                details,
                hint,
            } => {
                let status =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                let mut body = json!({
                    "error": "analytics upstream request failed",
                    "details": details,
                });
                if let Some(hint) = hint {
                    body["hint"] = Value::String(hint.to_string());
                }
                (status, body)
            }
            ApiError::Internal(err) => {
                error!("internal error while handling request: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, body } => ApiError::Upstream {
                status,
                details: body,
                hint: hint_for_status(status),
            },
            UpstreamError::Transport(err) => ApiError::Internal(err),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => ApiError::Conflict("project id already registered".into()),
            StorageError::NotFound => ApiError::NotFound("project not found".into()),
            StorageError::Other(err) => ApiError::Internal(err),
        }
    }
}

fn hint_for_status(status: u16) -> Option<&'static str> {
    match status {
        401 | 403 => Some("check the analytics API token and team id"),
        404 => Some("check the project id"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_carry_a_hint_for_credential_problems() {
        let err = ApiError::from(UpstreamError::Status {
            status: 403,
            body: "forbidden".to_string(),
        });

        match err {
            ApiError::Upstream {
                status,
                details,
                hint,
            } => {
                assert_eq!(status, 403);
                assert_eq!(details, "forbidden");
                assert!(hint.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn storage_conflicts_map_to_conflict() {
        let err = ApiError::from(StorageError::Conflict);
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
