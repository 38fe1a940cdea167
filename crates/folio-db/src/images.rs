//! Image repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};

use folio_core::{CreateImageRequest, Error, Image, ImageRepository, Result};

const IMAGE_COLUMNS: &str = "id, url, storage_path, name, user_id, note_id, created_at, updated_at";

pub(crate) fn image_from_row(row: &PgRow) -> Image {
    Image {
        id: row.get("id"),
        url: row.get("url"),
        name: row.get("name"),
        user_id: row.get("user_id"),
        note_id: row.get("note_id"),
        storage_path: row.get("storage_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of ImageRepository.
#[derive(Clone)]
pub struct PgImageRepository {
    pool: Pool<Postgres>,
}

impl PgImageRepository {
    /// Create a new PgImageRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Storage paths of every image owned by `user_id`.
    ///
    /// Read before deleting a user so the backing files can be removed once
    /// the cascade has committed.
    pub async fn storage_paths_for_user(&self, user_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT storage_path FROM image WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(|row| row.get("storage_path")).collect())
    }

    /// Record an uploaded image within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: CreateImageRequest,
    ) -> Result<Image> {
        let row = sqlx::query(&format!(
            "INSERT INTO image (url, storage_path, name, user_id, note_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(&req.url)
        .bind(&req.storage_path)
        .bind(&req.name)
        .bind(req.user_id)
        .bind(req.note_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(image_from_row(&row))
    }

    /// Fetch an image within an existing transaction.
    pub async fn fetch_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<Image>> {
        let row = sqlx::query(&format!("SELECT {} FROM image WHERE id = $1", IMAGE_COLUMNS))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(image_from_row))
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn insert(&self, req: CreateImageRequest) -> Result<Image> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let image = self.insert_tx(&mut tx, req).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(image)
    }

    async fn fetch(&self, id: i64) -> Result<Option<Image>> {
        let row = sqlx::query(&format!("SELECT {} FROM image WHERE id = $1", IMAGE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(image_from_row))
    }

    async fn fetch_owned(&self, id: i64, user_id: i64) -> Result<Option<Image>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM image WHERE id = $1 AND user_id = $2",
            IMAGE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(image_from_row))
    }

    async fn owned_by(&self, id: i64, user_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM image WHERE id = $1 AND user_id = $2) AS owned",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("owned"))
    }

    async fn delete(&self, id: i64) -> Result<Option<Image>> {
        let row = sqlx::query(&format!("DELETE FROM image WHERE id = $1 RETURNING {}", IMAGE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(image_from_row))
    }
}
