//! Registration, login, and logout.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use tracing::info;

use folio_core::defaults::TOKEN_NAME_BEARER;
use folio_core::{CreateUserRequest, UserRepository, UserRole};

use crate::auth::RequireAuth;
use crate::{validation, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub password_confirmation: Option<String>,
    pub bio: Option<String>,
}

/// Create an account and return its first token.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    let req = CreateUserRequest {
        first_name: validation::name("firstName", &body.first_name)?,
        last_name: validation::name("lastName", &body.last_name)?,
        email: validation::email(&body.email)?,
        username: validation::username(&body.username)?,
        password: {
            validation::confirmed_password(&body.password, body.password_confirmation.as_deref())?;
            body.password
        },
        user_role: UserRole::Member,
        bio: validation::bio(body.bio.as_deref())?,
    };

    let user = state.db.users.create(req).await?;
    let token = state.db.tokens.issue(user.id, TOKEN_NAME_BEARER).await?;
    info!(subsystem = "api", component = "auth", op = "register", user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "token": token })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users
        .find_by_username(body.username.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("No such user".to_string()))?;

    if !state.db.users.verify_password(user.id, &body.password).await? {
        return Err(ApiError::Unauthorized("Wrong password".to_string()));
    }

    let token = state.db.tokens.issue(user.id, TOKEN_NAME_BEARER).await?;
    info!(subsystem = "api", component = "auth", op = "login", user_id = user.id, "User logged in");
    Ok(Json(serde_json::json!({ "token": token, "user": user })))
}

/// Revoke every token of the caller.
pub async fn logout(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state.db.tokens.revoke_all(auth.user_id).await?;
    info!(
        subsystem = "api",
        component = "auth",
        op = "logout",
        user_id = auth.user_id,
        revoked,
        "Tokens revoked"
    );
    Ok(Json(serde_json::json!({ "message": "Logged out successfully." })))
}
