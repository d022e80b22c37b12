//! User repository
//!
//! Users are keyed by their identity-provider uid and created lazily on the
//! first authenticated write.

use sqlx::FromRow;

use crate::db::{Database, DbError};

/// User record
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: Option<String>,
    pub welcome_sent: bool,
}

/// User repository
pub struct UserRepo<'a> {
    db: &'a Database,
}

impl<'a> UserRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get or create the user for `uid`.
    ///
    /// A newer non-empty email replaces the stored one; a missing one never
    /// clears it.
    pub async fn upsert(&self, uid: &str, email: Option<&str>) -> Result<UserRecord, DbError> {
        self.db
            .run(|pool| async move {
                sqlx::query_as(
                    r#"
                    INSERT INTO users (firebase_uid, email)
                    VALUES ($1, $2)
                    ON CONFLICT (firebase_uid)
                    DO UPDATE SET email = COALESCE(EXCLUDED.email, users.email)
                    RETURNING id, email, welcome_sent
                    "#,
                )
                .bind(uid)
                .bind(email)
                .fetch_one(&pool)
                .await
            })
            .await
    }

    /// Atomically mark the welcome mail as sent.
    ///
    /// Returns the address to send to, or `None` when it was already sent or
    /// there is no address on file. Only one concurrent caller wins.
    pub async fn claim_welcome(&self, user_id: i64) -> Result<Option<String>, DbError> {
        self.db
            .run(|pool| async move {
                sqlx::query_scalar(
                    r#"
                    UPDATE users
                    SET welcome_sent = TRUE
                    WHERE id = $1 AND welcome_sent = FALSE AND email IS NOT NULL
                    RETURNING email
                    "#,
                )
                .bind(user_id)
                .fetch_optional(&pool)
                .await
            })
            .await
    }

    /// Undo [`UserRepo::claim_welcome`] after a failed send.
    pub async fn release_welcome(&self, user_id: i64) -> Result<(), DbError> {
        self.db
            .run(|pool| async move {
                sqlx::query("UPDATE users SET welcome_sent = FALSE WHERE id = $1")
                    .bind(user_id)
                    .execute(&pool)
                    .await
            })
            .await?;

        Ok(())
    }
}
