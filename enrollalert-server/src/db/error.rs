//! Database error type

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Pool stayed exhausted through every retry.
    #[error("database busy after {attempts} attempt(s)")]
    Busy { attempts: u32 },
}

/// Pool exhaustion and server-side connection pressure are worth retrying;
/// everything else is returned as-is.
pub fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        // too_many_connections, cannot_connect_now
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("53300" | "57P03")),
        _ => false,
    }
}
