//! # folio-db
//!
//! PostgreSQL database layer for folio.
//!
//! This crate provides:
//! - Connection pool management and schema migrations
//! - Repository implementations for notes, images, tags, users and tokens
//! - A transaction-bound [`catalog::PgImageCatalog`] for the image lifecycle
//! - The filesystem upload store
//!
//! ## Example
//!
//! ```rust,ignore
//! use folio_db::{Database, NoteRepository, ListNotesRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/folio").await?;
//!     db.migrate().await?;
//!
//!     let page = db.notes.list(ListNotesRequest::default()).await?;
//!     println!("{} notes", page.total);
//!     Ok(())
//! }
//! ```
pub mod catalog;
pub mod file_storage;
pub mod images;
pub mod note_filter;
pub mod notes;
pub mod pool;
pub mod tags;
pub mod tokens;
pub mod users;

// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use folio_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use catalog::PgImageCatalog;
pub use file_storage::{
    delete_files_best_effort, public_url, upload_path, FilesystemBackend, StorageBackend,
};
pub use images::PgImageRepository;
pub use note_filter::{NoteFilterQueryBuilder, QueryParam};
pub use notes::{NewNote, PgNoteRepository};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tags::{normalize_tag_names, PgTagRepository};
pub use tokens::PgTokenRepository;
pub use users::PgUserRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Note repository.
    pub notes: PgNoteRepository,
    /// Uploaded image records.
    pub images: PgImageRepository,
    /// Case-insensitive tag repository.
    pub tags: PgTagRepository,
    /// User accounts.
    pub users: PgUserRepository,
    /// Bearer tokens.
    pub tokens: PgTokenRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            images: PgImageRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            tokens: PgTokenRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Begin a transaction on the pool.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
