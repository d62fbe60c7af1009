//! Authentication extractor.
//!
//! When `AUTH_TOKEN` is configured every guarded route requires
//! `Authorization: Bearer <AUTH_TOKEN>`. Without it the surface is open, which
//! suits an agent bound to loopback.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Caller that passed the bearer check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// A matching bearer token was presented
    Token,
    /// No token is configured
    Anonymous,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.auth_token.as_deref() else {
            return Ok(AuthUser::Anonymous);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "));

        match presented {
            Some(token) if token == expected => Ok(AuthUser::Token),
            Some(_) => {
                tracing::warn!(path = %parts.uri.path(), "rejected bearer token");
                Err(AppError::Unauthorized)
            }
            None => Err(AppError::Unauthorized),
        }
    }
}
