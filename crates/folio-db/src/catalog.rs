//! Transaction-bound image catalog and note/image reference rows.
//!
//! [`PgImageCatalog`] answers the lifecycle's ownership and retention
//! questions on the same transaction that rewrites the note, so the reaper
//! sees the note's new reference rows and its row locks hold until commit.

use async_trait::async_trait;
use sqlx::{Postgres, Row, Transaction};

use folio_core::{Error, ImageCatalog, LockedImage, Result};

/// [`ImageCatalog`] over a borrowed PostgreSQL transaction.
pub struct PgImageCatalog<'a, 'c> {
    tx: &'a mut Transaction<'c, Postgres>,
}

impl<'a, 'c> PgImageCatalog<'a, 'c> {
    pub fn new(tx: &'a mut Transaction<'c, Postgres>) -> Self {
        Self { tx }
    }

    /// Replace the reference rows of `note_id` with `image_ids`.
    ///
    /// Inserting a row takes a key-share lock on the image, which conflicts
    /// with the reaper's `FOR UPDATE` on the same image.
    pub async fn replace_references(&mut self, note_id: i64, image_ids: &[i64]) -> Result<()> {
        sqlx::query(
            "DELETE FROM note_image WHERE note_id = $1 AND NOT (image_id = ANY($2::bigint[]))",
        )
        .bind(note_id)
        .bind(image_ids)
        .execute(&mut **self.tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO note_image (note_id, image_id)
             SELECT $1, UNNEST($2::bigint[])
             ON CONFLICT (note_id, image_id) DO NOTHING",
        )
        .bind(note_id)
        .bind(image_ids)
        .execute(&mut **self.tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl<'a, 'c> ImageCatalog for PgImageCatalog<'a, 'c> {
    async fn image_owner(&mut self, image_id: i64) -> Result<Option<Option<i64>>> {
        let row = sqlx::query("SELECT user_id FROM image WHERE id = $1")
            .bind(image_id)
            .fetch_optional(&mut **self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| r.get::<Option<i64>, _>("user_id")))
    }

    async fn lock_image(&mut self, image_id: i64) -> Result<Option<LockedImage>> {
        let row = sqlx::query("SELECT id, user_id, storage_path FROM image WHERE id = $1 FOR UPDATE")
            .bind(image_id)
            .fetch_optional(&mut **self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| LockedImage {
            id: r.get("id"),
            user_id: r.get("user_id"),
            storage_path: r.get("storage_path"),
        }))
    }

    async fn is_main_visual(&mut self, image_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM note WHERE main_visual_id = $1) AS used",
        )
        .bind(image_id)
        .fetch_one(&mut **self.tx)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("used"))
    }

    async fn is_referenced_elsewhere(&mut self, image_id: i64, note_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(
                 SELECT 1 FROM note_image WHERE image_id = $1 AND note_id <> $2
             ) AS used",
        )
        .bind(image_id)
        .bind(note_id)
        .fetch_one(&mut **self.tx)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("used"))
    }

    async fn delete_image(&mut self, image_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM image WHERE id = $1")
            .bind(image_id)
            .execute(&mut **self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
