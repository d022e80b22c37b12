//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Borrows the shared [`Database`](crate::db::Database) and runs every query through it
//! - Uses JOINs for list operations (no N+1)
//! - Handles conflicts via ON CONFLICT (no check-then-insert)
//! - Uses transactions for multi-step operations

pub mod alerts;
pub mod catalog;
pub mod courses;
pub mod users;

pub use alerts::{AlertRepo, SaveOutcome, SavedCourse, SavedSection};
pub use catalog::CatalogRepo;
pub use courses::{CourseRepo, CourseSummary, DiscussionSection, Lecture, Subsection};
pub use users::{UserRecord, UserRepo};

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for the database-backed tests (`cargo test -- --ignored`)

    use std::sync::atomic::{AtomicU64, Ordering};

    use enrollalert_core::config::DatabaseSection;

    use crate::db::{create_pool, migrations, Database};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    pub async fn database() -> Database {
        let config = DatabaseSection {
            url: std::env::var("DATABASE_URL").expect("DATABASE_URL required"),
            ..DatabaseSection::default()
        };
        let pool = create_pool(&config).await.expect("connect");
        migrations::run(&pool).await.expect("migrate");
        Database::from_config(pool, &config)
    }

    /// Identity-provider uid that no other test run will reuse
    pub fn unique_uid(prefix: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!(
            "test-{prefix}-{nanos}-{}",
            COUNTER.fetch_add(1, Ordering::Relaxed)
        )
    }
}
