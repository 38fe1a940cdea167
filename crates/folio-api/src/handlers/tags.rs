//! Tag listing.

use axum::{extract::State, response::IntoResponse, Json};

use folio_core::TagRepository;

use crate::{ApiError, AppState};

pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tags = state.db.tags.list().await?;
    Ok(Json(tags))
}
