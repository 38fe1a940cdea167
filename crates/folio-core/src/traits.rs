//! Core traits for folio abstractions.
//!
//! Repository traits are implemented by the PostgreSQL layer in `folio-db`.
//! [`ImageCatalog`] is the narrow view of image state the content-image
//! lifecycle needs; the database implementation is bound to a transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Column a note listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteOrderBy {
    Id,
    Title,
    Slug,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl NoteOrderBy {
    /// Parse a client-supplied column name; unknown names are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Self::Id),
            "title" => Some(Self::Title),
            "slug" => Some(Self::Slug),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "n.id",
            Self::Title => "n.title",
            Self::Slug => "n.slug",
            Self::CreatedAt => "n.created_at",
            Self::UpdatedAt => "n.updated_at",
        }
    }
}

/// Request for listing notes.
#[derive(Debug, Clone)]
pub struct ListNotesRequest {
    /// Exact note id
    pub id: Option<i64>,
    /// Substring of the title
    pub title: Option<String>,
    /// Substring of the lead
    pub lead: Option<String>,
    /// Owner
    pub user_id: Option<i64>,
    /// Exact slug
    pub slug: Option<String>,
    /// Note must carry every one of these tag ids
    pub tag_ids: Vec<i64>,
    /// Note must carry every one of these tag names (case-insensitive)
    pub tag_names: Vec<String>,
    pub order_by: NoteOrderBy,
    /// Descending order when true
    pub descending: bool,
    /// Page size
    pub limit: i64,
    /// 1-based page number
    pub page: i64,
}

impl Default for ListNotesRequest {
    fn default() -> Self {
        Self {
            id: None,
            title: None,
            lead: None,
            user_id: None,
            slug: None,
            tag_ids: Vec::new(),
            tag_names: Vec::new(),
            order_by: NoteOrderBy::default(),
            descending: false,
            limit: crate::defaults::PAGE_LIMIT,
            page: crate::defaults::FIRST_PAGE,
        }
    }
}

/// Response for listing notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListNotesResponse {
    pub notes: Vec<NoteWithRelations>,
    pub total: i64,
}

/// Request for creating a new note.
#[derive(Debug, Clone)]
pub struct CreateNoteRequest {
    pub title: String,
    pub lead: String,
    pub content: JsonValue,
    pub main_visual_id: Option<i64>,
    pub tags: Vec<String>,
}

/// Partial update of a note. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub lead: Option<String>,
    /// Replaces the whole content tree.
    pub content: Option<JsonValue>,
    /// `Some(None)` clears the main visual.
    pub main_visual_id: Option<Option<i64>>,
    /// Replaces the note's tags (sync semantics).
    pub tags: Option<Vec<String>>,
}

/// Repository for note reads.
///
/// Mutations go through transaction-scoped methods on the concrete
/// repository so they can share a transaction with image cleanup.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Fetch a note with tags and main visual.
    async fn fetch(&self, id: i64) -> Result<NoteWithRelations>;

    /// Fetch a note only if it belongs to `user_id`.
    async fn find_owned(&self, id: i64, user_id: i64) -> Result<Option<Note>>;

    /// List notes with filtering and pagination.
    async fn list(&self, req: ListNotesRequest) -> Result<ListNotesResponse>;

    /// Check if a note exists.
    async fn exists(&self, id: i64) -> Result<bool>;
}

// =============================================================================
// IMAGE REPOSITORY TRAITS
// =============================================================================

/// Request for recording an uploaded image.
#[derive(Debug, Clone)]
pub struct CreateImageRequest {
    pub url: String,
    pub storage_path: String,
    pub name: Option<String>,
    pub user_id: i64,
    pub note_id: Option<i64>,
}

/// Repository for image records.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Record an uploaded image.
    async fn insert(&self, req: CreateImageRequest) -> Result<Image>;

    /// Fetch an image by id.
    async fn fetch(&self, id: i64) -> Result<Option<Image>>;

    /// Fetch an image only if it belongs to `user_id`.
    async fn fetch_owned(&self, id: i64, user_id: i64) -> Result<Option<Image>>;

    /// Whether `user_id` owns image `id`.
    async fn owned_by(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Delete an image record, returning it if it existed.
    async fn delete(&self, id: i64) -> Result<Option<Image>>;
}

// =============================================================================
// TAG REPOSITORY TRAITS
// =============================================================================

/// Repository for tags.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// List all tags.
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Get all tags attached to a note.
    async fn get_for_note(&self, note_id: i64) -> Result<Vec<Tag>>;

    /// Replace a note's tags with the given existing tag ids.
    async fn set_ids_for_note(&self, note_id: i64, tag_ids: &[i64]) -> Result<()>;

    /// Return the subset of `tag_ids` that do not exist.
    async fn missing_ids(&self, tag_ids: &[i64]) -> Result<Vec<i64>>;
}

// =============================================================================
// USER REPOSITORY TRAITS
// =============================================================================

/// Request for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    /// Plain-text password; hashed by the repository.
    pub password: String,
    pub user_role: UserRole,
    pub bio: Option<String>,
}

/// Partial update of a user. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Plain-text password; hashed by the repository.
    pub password: Option<String>,
    pub user_role: Option<UserRole>,
    pub bio: Option<Option<String>>,
    pub avatar_id: Option<Option<i64>>,
}

/// Repository for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user.
    async fn create(&self, req: CreateUserRequest) -> Result<User>;

    /// Fetch a user by id.
    async fn fetch(&self, id: i64) -> Result<Option<User>>;

    /// Fetch a user by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Check a password against the stored hash.
    async fn verify_password(&self, user_id: i64, password: &str) -> Result<bool>;

    /// List all users.
    async fn list(&self) -> Result<Vec<User>>;

    /// Apply a partial update.
    async fn update(&self, id: i64, req: UpdateUserRequest) -> Result<User>;

    /// Delete a user and everything they own.
    async fn delete(&self, id: i64) -> Result<()>;
}

// =============================================================================
// IMAGE CATALOG (content-image lifecycle)
// =============================================================================

/// An image row held under a deletion lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedImage {
    pub id: i64,
    pub user_id: Option<i64>,
    pub storage_path: String,
}

/// Image lookups needed by ownership validation and orphan reaping.
///
/// Methods take `&mut self` so implementations can run on a borrowed
/// database transaction.
#[async_trait]
pub trait ImageCatalog: Send {
    /// Owner of image `image_id`; outer `None` if the image does not exist.
    async fn image_owner(&mut self, image_id: i64) -> Result<Option<Option<i64>>>;

    /// Lock the image row for deletion, or `None` if it no longer exists.
    async fn lock_image(&mut self, image_id: i64) -> Result<Option<LockedImage>>;

    /// Whether any note uses the image as its main visual.
    async fn is_main_visual(&mut self, image_id: i64) -> Result<bool>;

    /// Whether any note other than `note_id` references the image in its content.
    async fn is_referenced_elsewhere(&mut self, image_id: i64, note_id: i64) -> Result<bool>;

    /// Delete the image record.
    async fn delete_image(&mut self, image_id: i64) -> Result<()>;
}
