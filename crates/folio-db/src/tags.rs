//! Tag repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use std::collections::HashSet;

use folio_core::defaults::TAG_NAME_MAX_LEN;
use folio_core::{Error, Result, Tag, TagRepository};

/// Trim, validate, and de-duplicate (case-insensitively) a list of tag names.
///
/// The first spelling of each name wins. Returns a validation error naming
/// the `tags` field when a name is empty or too long.
pub fn normalize_tag_names(names: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for raw in names {
        let name = raw.trim();
        if name.is_empty() {
            return Err(Error::validation("tags", "Tag names must not be empty."));
        }
        if name.chars().count() > TAG_NAME_MAX_LEN {
            return Err(Error::validation(
                "tags",
                format!(
                    "Tag names may not be greater than {} characters.",
                    TAG_NAME_MAX_LEN
                ),
            ));
        }
        if seen.insert(name.to_lowercase()) {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn list(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name, created_at, updated_at FROM tag ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn get_for_note(&self, note_id: i64) -> Result<Vec<Tag>> {
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        fetch_for_note(&mut *conn, note_id).await
    }

    async fn set_ids_for_note(&self, note_id: i64, tag_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.set_ids_for_note_tx(&mut tx, note_id, tag_ids).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn missing_ids(&self, tag_ids: &[i64]) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT requested.id FROM UNNEST($1::bigint[]) AS requested(id)
             WHERE NOT EXISTS (SELECT 1 FROM tag t WHERE t.id = requested.id)
             ORDER BY requested.id",
        )
        .bind(tag_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

/// Transaction-aware variants used by note writes.
impl PgTagRepository {
    /// Get a note's tags within an existing transaction.
    pub async fn get_for_note_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        note_id: i64,
    ) -> Result<Vec<Tag>> {
        fetch_for_note(&mut **tx, note_id).await
    }

    /// Find a tag by name (case-insensitive) or create it.
    pub async fn find_or_create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Tag> {
        let row = sqlx::query(
            "INSERT INTO tag (name) VALUES ($1)
             ON CONFLICT ((LOWER(name))) DO UPDATE SET name = tag.name
             RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(tag_from_row(&row))
    }

    /// Make `names` the exact tag set of a note.
    ///
    /// Unknown names are created, tags no longer listed are detached, and
    /// the resulting tags are returned sorted by name.
    pub async fn sync_names_for_note_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        note_id: i64,
        names: &[String],
    ) -> Result<Vec<Tag>> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let tag = self.find_or_create_tx(tx, name).await?;
            ids.push(tag.id);
        }
        self.set_ids_for_note_tx(tx, note_id, &ids).await?;
        self.get_for_note_tx(tx, note_id).await
    }

    /// Make `tag_ids` the exact tag set of a note. The ids must exist.
    pub async fn set_ids_for_note_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        note_id: i64,
        tag_ids: &[i64],
    ) -> Result<()> {
        sqlx::query("DELETE FROM note_tag WHERE note_id = $1 AND NOT (tag_id = ANY($2::bigint[]))")
            .bind(note_id)
            .bind(tag_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO note_tag (note_id, tag_id)
             SELECT $1, UNNEST($2::bigint[])
             ON CONFLICT (note_id, tag_id) DO NOTHING",
        )
        .bind(note_id)
        .bind(tag_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

async fn fetch_for_note(conn: &mut sqlx::PgConnection, note_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        "SELECT t.id, t.name, t.created_at, t.updated_at
         FROM tag t JOIN note_tag nt ON nt.tag_id = t.id
         WHERE nt.note_id = $1
         ORDER BY t.name, t.id",
    )
    .bind(note_id)
    .fetch_all(conn)
    .await
    .map_err(Error::Database)?;
    Ok(rows.iter().map(tag_from_row).collect())
}
