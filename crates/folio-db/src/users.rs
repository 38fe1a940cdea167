//! User repository implementation.
//!
//! Passwords are stored as Argon2id PHC strings and never leave this module.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};

use folio_core::{
    CreateUserRequest, Error, Result, UpdateUserRequest, User, UserRepository, UserRole,
};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, username, user_role, bio, avatar_id, created_at, updated_at";

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("user_role");
    Ok(User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        username: row.get("username"),
        user_role: role
            .parse::<UserRole>()
            .map_err(|_| Error::Internal(format!("Unknown stored user role: {}", role)))?,
        bio: row.get("bio"),
        avatar_id: row.get("avatar_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Map unique-constraint violations on `app_user` to [`Error::Conflict`].
fn map_user_write_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(c) if c.contains("email") => "email",
                _ => "username",
            };
            return Error::Conflict(format!("The {} has already been taken.", field));
        }
    }
    Error::Database(e)
}

/// PostgreSQL implementation of UserRepository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Point a user's avatar at `image_id` within an existing transaction.
    pub async fn set_avatar_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        image_id: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE app_user SET avatar_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(image_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, req: CreateUserRequest) -> Result<User> {
        let password_hash = hash_password(&req.password)?;
        let row = sqlx::query(&format!(
            "INSERT INTO app_user
                 (first_name, last_name, email, username, password_hash, user_role, bio)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(&req.username)
        .bind(&password_hash)
        .bind(req.user_role.as_str())
        .bind(&req.bio)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_write_error)?;
        user_from_row(&row)
    }

    async fn fetch(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM app_user WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM app_user WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn verify_password(&self, user_id: i64, password: &str) -> Result<bool> {
        let row = sqlx::query("SELECT password_hash FROM app_user WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(match row {
            Some(row) => verify_password(password, &row.get::<String, _>("password_hash")),
            None => false,
        })
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {} FROM app_user ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update(&self, id: i64, req: UpdateUserRequest) -> Result<User> {
        let password_hash = req.password.as_deref().map(hash_password).transpose()?;
        let (set_bio, bio) = match req.bio {
            Some(bio) => (true, bio),
            None => (false, None),
        };
        let (set_avatar, avatar_id) = match req.avatar_id {
            Some(avatar_id) => (true, avatar_id),
            None => (false, None),
        };

        let row = sqlx::query(&format!(
            "UPDATE app_user SET
                 first_name    = COALESCE($2, first_name),
                 last_name     = COALESCE($3, last_name),
                 email         = COALESCE($4, email),
                 username      = COALESCE($5, username),
                 password_hash = COALESCE($6, password_hash),
                 user_role     = COALESCE($7, user_role),
                 bio           = CASE WHEN $8 THEN $9 ELSE bio END,
                 avatar_id     = CASE WHEN $10 THEN $11 ELSE avatar_id END,
                 updated_at    = NOW()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(&req.username)
        .bind(&password_hash)
        .bind(req.user_role.map(|r| r.as_str()))
        .bind(set_bio)
        .bind(&bio)
        .bind(set_avatar)
        .bind(avatar_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_user_write_error)?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;
        user_from_row(&row)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM app_user WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
