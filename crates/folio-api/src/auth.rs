//! Bearer-token extractors.
//!
//! ```ignore
//! async fn my_handler(auth: RequireAuth) -> Result<impl IntoResponse, ApiError> {
//!     let user_id = auth.user_id;
//!     // ...
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use tracing::warn;

use folio_core::{AuthPrincipal, UserRole};

use crate::{ApiError, AppState};

/// Token carried by the `Authorization: Bearer ...` header, if any.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extractor for optionally authenticated requests.
///
/// Unknown or malformed tokens resolve to [`AuthPrincipal::Anonymous`].
#[derive(Debug, Clone)]
pub struct Auth {
    pub principal: AuthPrincipal,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = match bearer_token(parts) {
            Some(token) => match state.db.tokens.authenticate(token).await {
                Ok(Some(principal)) => principal,
                Ok(None) => AuthPrincipal::Anonymous,
                Err(e) => {
                    warn!(subsystem = "api", component = "auth", error = %e, "Token lookup failed");
                    return Err(e.into());
                }
            },
            None => AuthPrincipal::Anonymous,
        };
        Ok(Auth { principal })
    }
}

/// Extractor that requires a valid token.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
}

impl RequireAuth {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = Auth::from_request_parts(parts, state).await?;
        match auth.principal {
            AuthPrincipal::User {
                user_id,
                username,
                role,
            } => Ok(RequireAuth {
                user_id,
                username,
                role,
            }),
            AuthPrincipal::Anonymous => Err(ApiError::Unauthorized("Unauthenticated.".to_string())),
        }
    }
}

/// Extractor that requires an admin token.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub RequireAuth);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = RequireAuth::from_request_parts(parts, state).await?;
        if !auth.is_admin() {
            return Err(ApiError::Forbidden(
                "This action is unauthorized.".to_string(),
            ));
        }
        Ok(RequireAdmin(auth))
    }
}
