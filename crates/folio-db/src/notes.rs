//! Note repository implementation.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use std::collections::HashMap;
use tracing::debug;

use folio_core::slug::with_suffix;
use folio_core::{
    Error, Image, ListNotesRequest, ListNotesResponse, Note, NoteRepository, NoteWithRelations,
    Result, Tag,
};

use crate::images::image_from_row;
use crate::note_filter::{NoteFilterQueryBuilder, QueryParam};

const NOTE_COLUMNS: &str =
    "n.id, n.title, n.slug, n.lead, n.content, n.user_id, n.main_visual_id, n.created_at, n.updated_at";

fn note_from_row(row: &PgRow) -> Note {
    Note {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        lead: row.get("lead"),
        content: row.get::<JsonValue, _>("content"),
        user_id: row.get("user_id"),
        main_visual_id: row.get("main_visual_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Row offset of a 1-based page, or `None` when it does not fit in an `i64`.
pub fn page_offset(page: i64, limit: i64) -> Option<i64> {
    (page.max(1) - 1).checked_mul(limit)
}

/// Map a unique-constraint violation on `note.slug` to [`Error::Conflict`].
///
/// Two creates with the same title can pick the same free slug; the later
/// insert loses and the client may retry.
fn map_note_write_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() && db_err.constraint().is_some_and(|c| c.contains("slug")) {
            return Error::Conflict("The slug has already been taken. Please retry.".to_string());
        }
    }
    Error::Database(e)
}

/// Fields of a new note row.
#[derive(Debug, Clone)]
pub struct NewNote<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub lead: &'a str,
    pub content: &'a JsonValue,
    pub user_id: i64,
    pub main_visual_id: Option<i64>,
}

/// PostgreSQL implementation of NoteRepository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Owner of a note, or `None` if the note does not exist.
    pub async fn owner_of(&self, id: i64) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT user_id FROM note WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("user_id")))
    }

    /// Load tags and main visuals for a page of notes with two queries.
    async fn attach_relations(
        conn: &mut sqlx::PgConnection,
        notes: Vec<Note>,
    ) -> Result<Vec<NoteWithRelations>> {
        if notes.is_empty() {
            return Ok(Vec::new());
        }
        let note_ids: Vec<i64> = notes.iter().map(|n| n.id).collect();
        let visual_ids: Vec<i64> = notes.iter().filter_map(|n| n.main_visual_id).collect();

        let tag_rows = sqlx::query(
            "SELECT nt.note_id, t.id, t.name, t.created_at, t.updated_at
             FROM note_tag nt JOIN tag t ON t.id = nt.tag_id
             WHERE nt.note_id = ANY($1::bigint[])
             ORDER BY t.name, t.id",
        )
        .bind(&note_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::Database)?;

        let mut tags_by_note: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in &tag_rows {
            tags_by_note
                .entry(row.get("note_id"))
                .or_default()
                .push(Tag {
                    id: row.get("id"),
                    name: row.get("name"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                });
        }

        let mut visuals: HashMap<i64, Image> = HashMap::new();
        if !visual_ids.is_empty() {
            let rows = sqlx::query(
                "SELECT id, url, storage_path, name, user_id, note_id, created_at, updated_at
                 FROM image WHERE id = ANY($1::bigint[])",
            )
            .bind(&visual_ids)
            .fetch_all(&mut *conn)
            .await
            .map_err(Error::Database)?;
            for row in &rows {
                let image = image_from_row(row);
                visuals.insert(image.id, image);
            }
        }

        Ok(notes
            .into_iter()
            .map(|note| NoteWithRelations {
                tags: tags_by_note.remove(&note.id).unwrap_or_default(),
                main_visual: note.main_visual_id.and_then(|id| visuals.get(&id).cloned()),
                note,
            })
            .collect())
    }
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    params: &'q [QueryParam],
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        q = match param {
            QueryParam::BigInt(v) => q.bind(v),
            QueryParam::BigIntArray(v) => q.bind(v),
            QueryParam::String(s) => q.bind(s),
            QueryParam::StringArray(arr) => q.bind(arr),
        };
    }
    q
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn fetch(&self, id: i64) -> Result<NoteWithRelations> {
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        fetch_with_relations(&mut *conn, id).await
    }

    async fn find_owned(&self, id: i64, user_id: i64) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM note n WHERE n.id = $1 AND n.user_id = $2",
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(note_from_row))
    }

    async fn list(&self, req: ListNotesRequest) -> Result<ListNotesResponse> {
        let (where_clause, params) = NoteFilterQueryBuilder::new(&req, 0).build();
        let direction = if req.descending { "DESC" } else { "ASC" };
        let order_clause = format!("{} {}, n.id {}", req.order_by.column(), direction, direction);

        let count_sql = format!("SELECT COUNT(*) AS count FROM note n WHERE {}", where_clause);
        let count_row = bind_params(sqlx::query(&count_sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        let total: i64 = count_row.get("count");

        let limit_param = params.len() + 1;
        let offset_param = params.len() + 2;
        let notes_sql = format!(
            "SELECT {} FROM note n WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            NOTE_COLUMNS, where_clause, order_clause, limit_param, offset_param
        );
        // A page past i64 range cannot hold rows.
        let Some(offset) = page_offset(req.page, req.limit) else {
            return Ok(ListNotesResponse {
                notes: Vec::new(),
                total,
            });
        };
        let rows = bind_params(sqlx::query(&notes_sql), &params)
            .bind(req.limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let notes: Vec<Note> = rows.iter().map(note_from_row).collect();
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        let notes = Self::attach_relations(&mut *conn, notes).await?;

        debug!(
            subsystem = "db",
            component = "notes",
            op = "list",
            result_count = notes.len(),
            total,
            "Listed notes"
        );
        Ok(ListNotesResponse { notes, total })
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM note WHERE id = $1) AS found")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("found"))
    }
}

async fn fetch_with_relations(conn: &mut sqlx::PgConnection, id: i64) -> Result<NoteWithRelations> {
    let row = sqlx::query(&format!("SELECT {} FROM note n WHERE n.id = $1", NOTE_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::NoteNotFound(id))?;
    let note = note_from_row(&row);
    PgNoteRepository::attach_relations(conn, vec![note])
        .await?
        .pop()
        .ok_or(Error::NoteNotFound(id))
}

/// Transaction-aware variants used by the note service.
///
/// A note write, its tag sync, its image reference rows, and the orphan
/// reaper all share one transaction.
impl PgNoteRepository {
    /// Insert a note within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: NewNote<'_>,
    ) -> Result<Note> {
        let row = sqlx::query(&format!(
            "INSERT INTO note AS n (title, slug, lead, content, user_id, main_visual_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            NOTE_COLUMNS
        ))
        .bind(new.title)
        .bind(new.slug)
        .bind(new.lead)
        .bind(new.content)
        .bind(new.user_id)
        .bind(new.main_visual_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_note_write_error)?;
        Ok(note_from_row(&row))
    }

    /// Fetch a note with tags and main visual within an existing transaction.
    pub async fn fetch_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<NoteWithRelations> {
        fetch_with_relations(&mut **tx, id).await
    }

    /// Lock a note owned by `user_id` for the rest of the transaction.
    ///
    /// Returns `None` when the note does not exist or belongs to someone else.
    pub async fn lock_owned_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM note n WHERE n.id = $1 AND n.user_id = $2 FOR UPDATE",
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(note_from_row))
    }

    /// Write every mutable column of `note` within an existing transaction.
    pub async fn update_tx(&self, tx: &mut Transaction<'_, Postgres>, note: &Note) -> Result<Note> {
        let row = sqlx::query(&format!(
            "UPDATE note AS n
             SET title = $2, slug = $3, lead = $4, content = $5, main_visual_id = $6,
                 updated_at = NOW()
             WHERE n.id = $1
             RETURNING {}",
            NOTE_COLUMNS
        ))
        .bind(note.id)
        .bind(&note.title)
        .bind(&note.slug)
        .bind(&note.lead)
        .bind(&note.content)
        .bind(note.main_visual_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_note_write_error)?
        .ok_or(Error::NoteNotFound(note.id))?;
        Ok(note_from_row(&row))
    }

    /// Delete a note within an existing transaction.
    ///
    /// Tag links and image reference rows go with it (cascade).
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM note WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }

    /// First free slug among `base`, `base-2`, `base-3`, …
    ///
    /// `exclude_id` lets a note keep its current slug.
    pub async fn unique_slug_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        base: &str,
        exclude_id: Option<i64>,
    ) -> Result<String> {
        let mut n: u32 = 1;
        loop {
            let candidate = if n == 1 {
                base.to_string()
            } else {
                with_suffix(base, n)
            };
            let row = sqlx::query(
                "SELECT EXISTS(
                     SELECT 1 FROM note WHERE slug = $1 AND ($2::bigint IS NULL OR id <> $2)
                 ) AS taken",
            )
            .bind(&candidate)
            .bind(exclude_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;
            if !row.get::<bool, _>("taken") {
                if n > 1 {
                    debug!(
                        subsystem = "db",
                        component = "notes",
                        slug = %candidate,
                        "Slug disambiguated"
                    );
                }
                return Ok(candidate);
            }
            n += 1;
        }
    }
}
