/// Password reset tokens
///
/// The raw token is handed to the user once; only its SHA-256 hex digest is
/// stored. A token is valid for one hour and can be used once.
///
/// # Example
///
/// ```no_run
/// use flexjobs_shared::models::password_reset::{generate_token, PasswordResetToken};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, user_id: i64) -> Result<(), sqlx::Error> {
/// let token = generate_token();
/// PasswordResetToken::create(&pool, user_id, &token).await?;
///
/// let mut tx = pool.begin().await?;
/// if let Some(reset) = PasswordResetToken::find_valid(&mut tx, &token).await? {
///     PasswordResetToken::mark_used(&mut tx, reset.id).await?;
/// }
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool};

/// How long a reset token stays valid
pub const TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the token, hex encoded
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl PasswordResetToken {
    /// Stores the hash of `token` with a one hour expiry
    pub async fn create(pool: &PgPool, user_id: i64, token: &str) -> Result<Self, sqlx::Error> {
        let expires_at = Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES);

        sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Unused, unexpired token matching `token`, locked for the transaction
    pub async fn find_valid(
        conn: &mut PgConnection,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT * FROM password_reset_tokens
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(conn)
        .await
    }

    pub async fn mark_used(conn: &mut PgConnection, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
