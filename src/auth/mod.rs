pub mod oauth;

use anyhow::{anyhow, bail, Result};
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::config::{AuthConfig, AuthMode};
use oauth::OAuthValidator;

/// Resolved caller identity. This is what keys the profile document.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
}

impl AuthenticatedUser {
    /// Identity used when authentication is disabled: the whole instance
    /// belongs to one local user.
    pub fn local() -> Self {
        Self {
            user_id: "local".to_string(),
            email: None,
        }
    }
}

pub struct AuthService {
    mode: AuthMode,
    oauth: Option<OAuthValidator>,
}

impl AuthService {
    pub async fn new(config: AuthConfig) -> Result<Self> {
        let oauth = match (&config.mode, config.oauth.as_ref()) {
            (AuthMode::Oauth, Some(oauth_config)) => {
                Some(OAuthValidator::from_config(oauth_config).await?)
            }
            (AuthMode::Oauth, None) => {
                bail!("AUTH_MODE=oauth requires OAuth configuration")
            }
            (AuthMode::None, _) => None,
        };

        Ok(Self {
            mode: config.mode,
            oauth,
        })
    }

    /// Resolve the caller's identity from the request headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser> {
        match self.mode {
            AuthMode::None => Ok(AuthenticatedUser::local()),
            AuthMode::Oauth => {
                let token = bearer_token(headers)
                    .ok_or_else(|| anyhow!("missing bearer token"))?;
                let validator = self
                    .oauth
                    .as_ref()
                    .ok_or_else(|| anyhow!("OAuth validator not configured"))?;

                let claims = validator.validate(token).await?;
                Ok(AuthenticatedUser {
                    user_id: claims.sub,
                    email: claims.email,
                })
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(&headers).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => {
            debug!("rejected unauthenticated request: {err}");
            (StatusCode::UNAUTHORIZED, "Invalid or missing bearer token").into_response()
        }
    }
}
