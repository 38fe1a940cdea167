//! User profile handlers.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use folio_core::{Error, ImageRepository, PublicUser, UpdateUserRequest, UserRepository, UserRole};
use folio_db::delete_files_best_effort;

use crate::auth::{RequireAdmin, RequireAuth};
use crate::handlers::double_option;
use crate::{validation, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct PublicUserQuery {
    pub id: Option<i64>,
}

/// Public profile of any user.
pub async fn get_public_user(
    State(state): State<AppState>,
    Query(query): Query<PublicUserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::BadRequest("The id parameter is required.".to_string()))?;
    let user = state
        .db
        .users
        .fetch(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;
    Ok(Json(PublicUser::from(&user)))
}

/// The caller's own account.
pub async fn get_me(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users
        .fetch(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;
    Ok(Json(user))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMeBody {
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    #[serde(rename = "userRole")]
    pub user_role: Option<UserRole>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_id: Option<Option<i64>>,
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<UpdateMeBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.user_role.is_some() && !auth.is_admin() {
        return Err(ApiError::Forbidden(
            "Only administrators may change roles.".to_string(),
        ));
    }
    if let Some(password) = &body.password {
        validation::confirmed_password(password, body.password_confirmation.as_deref())?;
    }
    if let Some(Some(avatar_id)) = body.avatar_id {
        if !state.db.images.owned_by(avatar_id, auth.user_id).await? {
            return Err(match state.db.images.fetch(avatar_id).await? {
                None => Error::ImageNotFound(avatar_id),
                Some(_) => Error::ImageNotOwned {
                    field: "avatar_id".to_string(),
                    image_id: avatar_id,
                },
            }
            .into());
        }
    }

    let req = UpdateUserRequest {
        first_name: body
            .first_name
            .as_deref()
            .map(|v| validation::name("firstName", v))
            .transpose()?,
        last_name: body
            .last_name
            .as_deref()
            .map(|v| validation::name("lastName", v))
            .transpose()?,
        email: body.email.as_deref().map(validation::email).transpose()?,
        username: body.username.as_deref().map(validation::username).transpose()?,
        password: body.password,
        user_role: body.user_role,
        bio: match body.bio {
            Some(bio) => Some(validation::bio(bio.as_deref())?),
            None => None,
        },
        avatar_id: body.avatar_id,
    };

    let user = state.db.users.update(auth.user_id, req).await?;
    Ok(Json(user))
}

/// Delete the caller's account, their notes, images, and files.
pub async fn delete_me(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let paths = state.db.images.storage_paths_for_user(auth.user_id).await?;
    state.db.users.delete(auth.user_id).await?;
    let removed = delete_files_best_effort(state.storage.as_ref(), &paths).await;

    info!(
        subsystem = "api",
        component = "users",
        op = "delete",
        user_id = auth.user_id,
        file_count = removed,
        "Account deleted"
    );
    Ok(Json(serde_json::json!({ "message": "Account deleted." })))
}

/// All accounts (admin only).
pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users.list().await?;
    Ok(Json(users))
}
