//! Catalog repository - subject and breadth lookups for filter menus

use enrollalert_core::Term;

use crate::db::{Database, DbError};

/// Catalog repository
pub struct CatalogRepo<'a> {
    db: &'a Database,
}

impl<'a> CatalogRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Names of subjects offered in `term`, alphabetical.
    pub async fn subjects(&self, term: Term) -> Result<Vec<String>, DbError> {
        self.db
            .run(|pool| async move {
                sqlx::query_scalar(
                    r#"
                    SELECT s.subject_name
                    FROM subjects s
                    WHERE EXISTS (
                        SELECT 1 FROM course_sections c
                        WHERE c.subject_id = s.subject_id AND c.term = $1
                    )
                    ORDER BY s.subject_name
                    "#,
                )
                .bind(term.code())
                .fetch_all(&pool)
                .await
            })
            .await
    }

    /// Every distinct breadth requirement, alphabetical.
    pub async fn breadths(&self) -> Result<Vec<String>, DbError> {
        self.db
            .run(|pool| async move {
                sqlx::query_scalar(
                    r#"
                    SELECT DISTINCT breadth
                    FROM course_breadths
                    ORDER BY breadth
                    "#,
                )
                .fetch_all(&pool)
                .await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn subjects_are_scoped_to_term() {
        let db = crate::db::repos::test_support::database().await;
        let subjects = super::CatalogRepo::new(&db)
            .subjects(enrollalert_core::Term(9999))
            .await
            .unwrap();
        assert!(subjects.is_empty());
    }
}
