//! Bearer token repository.
//!
//! Tokens are `fo_tok_` followed by a random alphanumeric secret. Only the
//! SHA-256 hex digest of the full token is stored.

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row};

use folio_core::defaults::{TOKEN_PREFIX, TOKEN_SECRET_LEN};
use folio_core::{AuthPrincipal, Error, Result, UserRole};

/// PostgreSQL repository for issued bearer tokens.
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: Pool<Postgres>,
}

impl PgTokenRepository {
    /// Create a new PgTokenRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Generate a cryptographically secure random string.
    fn generate_secret(length: usize) -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }

    /// Hash a token using SHA256.
    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Issue a new token for `user_id`. The plain token is returned once.
    pub async fn issue(&self, user_id: i64, name: &str) -> Result<String> {
        let token = format!("{}{}", TOKEN_PREFIX, Self::generate_secret(TOKEN_SECRET_LEN));
        sqlx::query("INSERT INTO api_token (user_id, name, token_hash) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(name)
            .bind(Self::hash_token(&token))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(token)
    }

    /// Resolve a presented token to its owner.
    ///
    /// Returns `None` for malformed or unknown tokens. Touches `last_used_at`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<AuthPrincipal>> {
        if !token.starts_with(TOKEN_PREFIX) {
            return Ok(None);
        }
        let row = sqlx::query(
            "UPDATE api_token t SET last_used_at = $2
             FROM app_user u
             WHERE t.token_hash = $1 AND u.id = t.user_id
             RETURNING u.id, u.username, u.user_role",
        )
        .bind(Self::hash_token(token))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let role: String = row.get("user_role");
        Ok(Some(AuthPrincipal::User {
            user_id: row.get("id"),
            username: row.get("username"),
            role: role.parse::<UserRole>().unwrap_or_default(),
        }))
    }

    /// Revoke every token of `user_id`. Returns how many were removed.
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM api_token WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
