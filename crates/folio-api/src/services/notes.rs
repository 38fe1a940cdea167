//! Note writes and the content-image lifecycle.
//!
//! Every write runs in one transaction: lock the note, validate image
//! ownership, diff old and new content, write the note, sync tags and
//! image reference rows, reap orphans. Backing files of reaped images are
//! removed only after commit.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use folio_core::{
    date_slug, reap_orphans, removed_image_ids, unique_image_ids, validate_content_ownership,
    validate_main_visual, CreateNoteRequest, Error, NoteWithRelations, ReapedImage, Result, Tag,
    TagRepository, UpdateNoteRequest,
};
use folio_db::{
    delete_files_best_effort, normalize_tag_names, Database, NewNote, PgImageCatalog,
    StorageBackend,
};

use crate::validation;

/// Result of an update or delete: what was written and which images went away.
#[derive(Debug, Clone)]
pub struct NoteWriteOutcome<T> {
    pub value: T,
    pub reaped: Vec<ReapedImage>,
}

impl<T> NoteWriteOutcome<T> {
    pub fn reaped_ids(&self) -> Vec<i64> {
        self.reaped.iter().map(|r| r.id).collect()
    }
}

/// Orchestrates note mutations on top of the repositories.
#[derive(Clone)]
pub struct NoteService {
    db: Database,
    storage: Arc<dyn StorageBackend>,
}

impl NoteService {
    pub fn new(db: Database, storage: Arc<dyn StorageBackend>) -> Self {
        Self { db, storage }
    }

    /// Create a note owned by `user_id`.
    pub async fn create(&self, user_id: i64, req: CreateNoteRequest) -> Result<NoteWithRelations> {
        let start = Instant::now();
        let title = validation::title(&req.title)?;
        let lead = validation::lead(&req.lead)?;
        validation::content(&req.content)?;
        let tags = normalize_tag_names(&req.tags)?;
        validation::non_empty_tags(&tags)?;

        let mut tx = self.db.begin().await?;

        let image_ids = {
            let mut catalog = PgImageCatalog::new(&mut tx);
            if let Some(visual_id) = req.main_visual_id {
                validate_main_visual(&mut catalog, user_id, visual_id).await?;
            }
            validate_content_ownership(&mut catalog, user_id, &req.content).await?
        };

        let base = date_slug(&title, Utc::now().date_naive());
        let slug = self.db.notes.unique_slug_tx(&mut tx, &base, None).await?;
        let note = self
            .db
            .notes
            .insert_tx(
                &mut tx,
                NewNote {
                    title: &title,
                    slug: &slug,
                    lead: &lead,
                    content: &req.content,
                    user_id,
                    main_visual_id: req.main_visual_id,
                },
            )
            .await?;

        self.db
            .tags
            .sync_names_for_note_tx(&mut tx, note.id, &tags)
            .await?;
        PgImageCatalog::new(&mut tx)
            .replace_references(note.id, &image_ids)
            .await?;

        let created = self.db.notes.fetch_tx(&mut tx, note.id).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "notes",
            op = "create",
            note_id = note.id,
            user_id,
            image_count = image_ids.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Note created"
        );
        Ok(created)
    }

    /// Apply a partial update to a note owned by `user_id`.
    ///
    /// A note that does not exist or belongs to someone else is reported as
    /// not found.
    pub async fn update(
        &self,
        user_id: i64,
        note_id: i64,
        req: UpdateNoteRequest,
    ) -> Result<NoteWriteOutcome<NoteWithRelations>> {
        let start = Instant::now();
        let title = req.title.as_deref().map(validation::title).transpose()?;
        let lead = req.lead.as_deref().map(validation::lead).transpose()?;
        if let Some(content) = &req.content {
            validation::content(content)?;
        }
        let tags = match &req.tags {
            Some(tags) => {
                let tags = normalize_tag_names(tags)?;
                validation::non_empty_tags(&tags)?;
                Some(tags)
            }
            None => None,
        };

        let mut tx = self.db.begin().await?;

        let mut note = self
            .db
            .notes
            .lock_owned_tx(&mut tx, note_id, user_id)
            .await?
            .ok_or(Error::NoteNotFound(note_id))?;

        // Old content is read under the row lock, before it is overwritten.
        let mut new_references = None;
        let mut removed = Vec::new();
        {
            let mut catalog = PgImageCatalog::new(&mut tx);
            if let Some(Some(visual_id)) = req.main_visual_id {
                validate_main_visual(&mut catalog, user_id, visual_id).await?;
            }
            if let Some(content) = &req.content {
                let ids = validate_content_ownership(&mut catalog, user_id, content).await?;
                removed = removed_image_ids(&note.content, content);
                new_references = Some(ids);
            }
        }

        if let Some(title) = title {
            if title != note.title {
                let base = date_slug(&title, Utc::now().date_naive());
                note.slug = self
                    .db
                    .notes
                    .unique_slug_tx(&mut tx, &base, Some(note_id))
                    .await?;
                note.title = title;
            }
        }
        if let Some(lead) = lead {
            note.lead = lead;
        }
        if let Some(content) = req.content {
            note.content = content;
        }
        if let Some(main_visual_id) = req.main_visual_id {
            note.main_visual_id = main_visual_id;
        }
        self.db.notes.update_tx(&mut tx, &note).await?;

        if let Some(tags) = tags {
            self.db
                .tags
                .sync_names_for_note_tx(&mut tx, note_id, &tags)
                .await?;
        }

        let reaped = match new_references {
            Some(ids) => {
                let mut catalog = PgImageCatalog::new(&mut tx);
                catalog.replace_references(note_id, &ids).await?;
                reap_orphans(&mut catalog, user_id, note_id, &removed).await?
            }
            None => Vec::new(),
        };

        let updated = self.db.notes.fetch_tx(&mut tx, note_id).await?;
        tx.commit().await.map_err(Error::Database)?;

        self.remove_files(&reaped).await;

        info!(
            subsystem = "api",
            component = "notes",
            op = "update",
            note_id,
            user_id,
            removed_count = removed.len(),
            reaped_count = reaped.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Note updated"
        );
        Ok(NoteWriteOutcome {
            value: updated,
            reaped,
        })
    }

    /// Delete a note owned by `user_id` and reap the images only it used.
    pub async fn delete(&self, user_id: i64, note_id: i64) -> Result<NoteWriteOutcome<()>> {
        let start = Instant::now();
        let mut tx = self.db.begin().await?;

        let note = self
            .db
            .notes
            .lock_owned_tx(&mut tx, note_id, user_id)
            .await?
            .ok_or(Error::NoteNotFound(note_id))?;
        let removed = unique_image_ids(&note.content);

        // Tag links and reference rows cascade with the note.
        self.db.notes.delete_tx(&mut tx, note_id).await?;
        let reaped = {
            let mut catalog = PgImageCatalog::new(&mut tx);
            reap_orphans(&mut catalog, user_id, note_id, &removed).await?
        };
        tx.commit().await.map_err(Error::Database)?;

        self.remove_files(&reaped).await;

        info!(
            subsystem = "api",
            component = "notes",
            op = "delete",
            note_id,
            user_id,
            reaped_count = reaped.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Note deleted"
        );
        Ok(NoteWriteOutcome { value: (), reaped })
    }

    /// Replace a note's tags by id.
    ///
    /// Unknown notes are not found; notes of other users are forbidden.
    pub async fn set_tag_ids(&self, user_id: i64, note_id: i64, tag_ids: &[i64]) -> Result<Vec<Tag>> {
        match self.db.notes.owner_of(note_id).await? {
            None => return Err(Error::NoteNotFound(note_id)),
            Some(owner) if owner != user_id => {
                return Err(Error::Forbidden(
                    "You are not allowed to edit this note.".to_string(),
                ))
            }
            Some(_) => {}
        }

        let mut ids = tag_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let missing = self.db.tags.missing_ids(&ids).await?;
        if let Some(first) = missing.first() {
            return Err(Error::validation(
                "tag_ids",
                format!("The selected tag id {} is invalid.", first),
            ));
        }

        self.db.tags.set_ids_for_note(note_id, &ids).await?;
        debug!(
            subsystem = "api",
            component = "notes",
            op = "set_tags",
            note_id,
            tag_count = ids.len(),
            "Note tags replaced"
        );
        self.db.tags.get_for_note(note_id).await
    }

    async fn remove_files(&self, reaped: &[ReapedImage]) {
        if reaped.is_empty() {
            return;
        }
        let paths: Vec<String> = reaped.iter().map(|r| r.storage_path.clone()).collect();
        delete_files_best_effort(self.storage.as_ref(), &paths).await;
    }
}
