//! Note HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use folio_core::defaults::{FIRST_PAGE, PAGE_LIMIT, PAGE_LIMIT_MAX};
use folio_core::{
    CreateNoteRequest, ListNotesRequest, NoteOrderBy, NoteRepository, NoteWithRelations,
    UpdateNoteRequest,
};

use crate::auth::RequireAuth;
use crate::handlers::double_option;
use crate::{ApiError, AppState};

// =============================================================================
// LIST
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListNotesQuery {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub lead: Option<String>,
    pub user_id: Option<i64>,
    pub slug: Option<String>,
    /// Comma-separated tag ids; the note must carry all of them.
    pub tag_ids: Option<String>,
    /// Comma-separated tag names; the note must carry all of them.
    pub tag_names: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// Pagination metadata for page-numbered list responses.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PaginationMeta {
    /// Total number of items matching the query (across all pages)
    pub total: i64,
    pub limit: i64,
    /// 1-based page number
    pub page: i64,
    pub last_page: i64,
    /// True if more items are available after this page
    pub has_more: bool,
}

impl PaginationMeta {
    pub fn new(total: i64, limit: i64, page: i64) -> Self {
        let last_page = if total == 0 { 1 } else { (total + limit - 1) / limit };
        Self {
            total,
            limit,
            page,
            last_page,
            has_more: page < last_page,
        }
    }
}

/// List response wrapper with pagination metadata.
#[derive(Serialize, Debug)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

fn split_csv(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl ListNotesQuery {
    /// Validate and convert into a repository request.
    pub fn into_request(self) -> Result<ListNotesRequest, ApiError> {
        let limit = self.limit.unwrap_or(PAGE_LIMIT);
        if !(1..=PAGE_LIMIT_MAX).contains(&limit) {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}",
                PAGE_LIMIT_MAX
            )));
        }
        let page = self.page.unwrap_or(FIRST_PAGE);
        if page < 1 {
            return Err(ApiError::BadRequest("page must be >= 1".to_string()));
        }

        let order_by = match self.order_by.as_deref() {
            None | Some("") => NoteOrderBy::default(),
            Some(s) => NoteOrderBy::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid order_by: {}", s)))?,
        };
        let descending = match self.order_dir.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(ApiError::BadRequest(format!("Invalid order_dir: {}", other)))
            }
        };

        let tag_ids = match self.tag_ids.as_deref() {
            Some(raw) => split_csv(raw)
                .map(|s| {
                    s.parse::<i64>()
                        .map_err(|_| ApiError::BadRequest(format!("Invalid tag id: {}", s)))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let tag_names = self
            .tag_names
            .as_deref()
            .map(|raw| split_csv(raw).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(ListNotesRequest {
            id: self.id,
            title: self.title.filter(|s| !s.is_empty()),
            lead: self.lead.filter(|s| !s.is_empty()),
            user_id: self.user_id,
            slug: self.slug.filter(|s| !s.is_empty()),
            tag_ids,
            tag_names,
            order_by,
            descending,
            limit,
            page,
        })
    }
}

pub async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListNotesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let req = query.into_request()?;
    let (limit, page) = (req.limit, req.page);
    let response = state.db.notes.list(req).await?;
    Ok(Json(ListResponse {
        data: response.notes,
        pagination: PaginationMeta::new(response.total, limit, page),
    }))
}

// =============================================================================
// WRITES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateNoteBody {
    pub title: String,
    pub lead: String,
    pub content: JsonValue,
    pub main_visual_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub note: NoteWithRelations,
}

pub async fn create_note(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<CreateNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state
        .notes()
        .create(
            auth.user_id,
            CreateNoteRequest {
                title: body.title,
                lead: body.lead,
                content: body.content,
                main_visual_id: body.main_visual_id,
                tags: body.tags,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(NoteResponse { note })))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateNoteBody {
    pub title: Option<String>,
    pub lead: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub content: Option<Option<JsonValue>>,
    #[serde(default, deserialize_with = "double_option")]
    pub main_visual_id: Option<Option<i64>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct UpdateNoteResponse {
    pub note: NoteWithRelations,
    pub reaped_image_ids: Vec<i64>,
}

pub async fn update_note(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i64>,
    Json(body): Json<UpdateNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    // `"content": null` is a malformed tree, not an omitted field.
    let content = match body.content {
        Some(None) => {
            return Err(ApiError::unprocessable(
                "content",
                "The content must be a JSON object or array.",
            ))
        }
        Some(Some(tree)) => Some(tree),
        None => None,
    };
    let outcome = state
        .notes()
        .update(
            auth.user_id,
            id,
            UpdateNoteRequest {
                title: body.title,
                lead: body.lead,
                content,
                main_visual_id: body.main_visual_id,
                tags: body.tags,
            },
        )
        .await?;
    let reaped_image_ids = outcome.reaped_ids();
    Ok(Json(UpdateNoteResponse {
        note: outcome.value,
        reaped_image_ids,
    }))
}

pub async fn delete_note(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.notes().delete(auth.user_id, id).await?;
    Ok(Json(serde_json::json!({
        "message": "Note deleted successfully.",
        "reaped_image_ids": outcome.reaped_ids(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SetTagsBody {
    pub tag_ids: Vec<i64>,
}

/// Replace a note's tags by id.
pub async fn set_note_tags(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i64>,
    Json(body): Json<SetTagsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = state.notes().set_tag_ids(auth.user_id, id, &body.tag_ids).await?;
    Ok(Json(serde_json::json!({ "note_id": id, "tags": tags })))
}
