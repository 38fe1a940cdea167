//! Image upload, lookup, and removal.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use folio_core::defaults::{UPLOAD_MAX_BYTES, UPLOAD_MAX_FILES};
use folio_core::{
    detect_content_type, validate_file, CreateImageRequest, FileVerdict, Image, ImageRepository,
    NoteRepository,
};
use folio_db::{delete_files_best_effort, public_url, upload_path};

use crate::auth::RequireAuth;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct GetUploadQuery {
    pub image_id: Option<i64>,
}

pub async fn get_upload(
    State(state): State<AppState>,
    Query(query): Query<GetUploadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query
        .image_id
        .ok_or_else(|| ApiError::BadRequest("The image_id parameter is required.".to_string()))?;
    let image = state
        .db
        .images
        .fetch(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found.".to_string()))?;
    Ok(Json(image))
}

struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

/// Parsed multipart form of an upload request.
#[derive(Default)]
struct UploadForm {
    files: Vec<UploadedFile>,
    kind: Option<String>,
    note_id: Option<i64>,
    title: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" | "files[]" => {
                if form.files.len() >= UPLOAD_MAX_FILES {
                    return Err(ApiError::unprocessable(
                        "files",
                        format!("At most {} files may be uploaded at once.", UPLOAD_MAX_FILES),
                    ));
                }
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                form.files.push(UploadedFile {
                    filename,
                    data: data.to_vec(),
                });
            }
            "type" => {
                form.kind = Some(read_text(field).await?);
            }
            "note_id" => {
                let raw = read_text(field).await?;
                if !raw.trim().is_empty() {
                    let id = raw.trim().parse::<i64>().map_err(|_| {
                        ApiError::unprocessable("note_id", "The note_id must be an integer.")
                    })?;
                    form.note_id = Some(id);
                }
            }
            "title" => {
                let title = read_text(field).await?;
                form.title = Some(title.trim().to_string()).filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))
}

/// Store up to five files and record them as images of the caller.
pub async fn upload_images(
    State(state): State<AppState>,
    auth: RequireAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart).await?;
    if form.files.is_empty() {
        return Err(ApiError::unprocessable("files", "At least one file is required."));
    }

    for file in &form.files {
        if let FileVerdict::Blocked { reason } =
            validate_file(&file.filename, &file.data, UPLOAD_MAX_BYTES)
        {
            warn!(
                subsystem = "api",
                component = "uploads",
                user_id = auth.user_id,
                filename = %file.filename,
                reason = %reason,
                "Upload rejected"
            );
            return Err(ApiError::unprocessable("files", reason));
        }
    }

    if let Some(note_id) = form.note_id {
        if state.db.notes.find_owned(note_id, auth.user_id).await?.is_none() {
            return Err(ApiError::NotFound("Note not found.".to_string()));
        }
    }

    // Files first; records only once every file is on disk.
    let mut written: Vec<String> = Vec::with_capacity(form.files.len());
    for file in &form.files {
        let path = upload_path(&auth.username, &file.filename, &file.data);
        if let Err(e) = state.storage.write(&path, &file.data).await {
            delete_files_best_effort(state.storage.as_ref(), &written).await;
            return Err(e.into());
        }
        written.push(path);
    }

    match record_images(&state, &auth, &form, &written).await {
        Ok(images) => {
            info!(
                subsystem = "api",
                component = "uploads",
                op = "upload",
                user_id = auth.user_id,
                file_count = images.len(),
                kind = form.kind.as_deref().unwrap_or(""),
                "Images uploaded"
            );
            Ok((StatusCode::CREATED, Json(serde_json::json!({ "images": images }))))
        }
        Err(e) => {
            delete_files_best_effort(state.storage.as_ref(), &written).await;
            Err(e)
        }
    }
}

async fn record_images(
    state: &AppState,
    auth: &RequireAuth,
    form: &UploadForm,
    paths: &[String],
) -> Result<Vec<Image>, ApiError> {
    let mut tx = state.db.begin().await?;
    let mut images = Vec::with_capacity(paths.len());

    for (file, path) in form.files.iter().zip(paths) {
        let image = state
            .db
            .images
            .insert_tx(
                &mut tx,
                CreateImageRequest {
                    url: public_url(&state.public_url, path),
                    storage_path: path.clone(),
                    name: form.title.clone().or_else(|| Some(file.filename.clone())),
                    user_id: auth.user_id,
                    note_id: form.note_id,
                },
            )
            .await?;
        tracing::debug!(
            subsystem = "api",
            component = "uploads",
            image_id = image.id,
            content_type = %detect_content_type(&file.data, "application/octet-stream"),
            "Image recorded"
        );
        images.push(image);
    }

    if form.kind.as_deref() == Some("avatar") {
        if let Some(avatar) = images.last() {
            state
                .db
                .users
                .set_avatar_tx(&mut tx, auth.user_id, avatar.id)
                .await?;
        }
    }

    tx.commit().await.map_err(folio_core::Error::Database)?;
    Ok(images)
}

/// Remove one of the caller's images and its file.
pub async fn delete_upload(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let image = state
        .db
        .images
        .fetch_owned(id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found.".to_string()))?;

    delete_files_best_effort(state.storage.as_ref(), std::slice::from_ref(&image.storage_path))
        .await;
    state.db.images.delete(id).await?;

    info!(
        subsystem = "api",
        component = "uploads",
        op = "delete",
        user_id = auth.user_id,
        image_id = id,
        "Image deleted"
    );
    Ok(Json(serde_json::json!({ "deleted": true, "id": id })))
}
