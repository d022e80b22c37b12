//! Schema migrations
//!
//! Every statement is idempotent, so running on each startup is safe.

use sqlx::PgPool;

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            firebase_uid TEXT NOT NULL UNIQUE,
            email TEXT,
            welcome_sent BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "subjects",
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            subject_id INTEGER PRIMARY KEY,
            subject_name TEXT NOT NULL UNIQUE
        )
        "#,
    ),
    (
        "course_sections",
        r#"
        CREATE TABLE IF NOT EXISTS course_sections (
            term INTEGER NOT NULL,
            course_id TEXT NOT NULL,
            subject_id INTEGER NOT NULL REFERENCES subjects(subject_id),
            course_name TEXT NOT NULL,
            course_title TEXT NOT NULL DEFAULT '',
            section_num TEXT NOT NULL,
            section_type TEXT NOT NULL CHECK (section_type IN ('LEC', 'DIS', 'LAB', 'SEM')),
            parent_section_num TEXT,
            professor TEXT,
            capacity INTEGER NOT NULL DEFAULT 0,
            enrolled INTEGER NOT NULL DEFAULT 0,
            open_seats INTEGER NOT NULL DEFAULT 0,
            waitlist_capacity INTEGER NOT NULL DEFAULT 0,
            waitlist_open_spots INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (term, course_id, section_num)
        )
        "#,
    ),
    (
        "course_breadths",
        r#"
        CREATE TABLE IF NOT EXISTS course_breadths (
            course_id TEXT NOT NULL,
            breadth TEXT NOT NULL,
            PRIMARY KEY (course_id, breadth)
        )
        "#,
    ),
    (
        "user_courses",
        r#"
        CREATE TABLE IF NOT EXISTS user_courses (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            course_id TEXT NOT NULL,
            section_num TEXT NOT NULL,
            alert_type TEXT NOT NULL CHECK (alert_type IN ('any', 'threshold')),
            seat_threshold INTEGER CHECK (seat_threshold IS NULL OR seat_threshold >= 1),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, course_id, section_num),
            CHECK (
                (alert_type = 'any' AND seat_threshold IS NULL)
                OR (alert_type = 'threshold' AND seat_threshold IS NOT NULL)
            )
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_course_sections_lookup ON course_sections(term, course_id, section_type)",
    "CREATE INDEX IF NOT EXISTS idx_course_sections_parent ON course_sections(term, course_id, parent_section_num)",
    "CREATE INDEX IF NOT EXISTS idx_course_sections_name ON course_sections(term, course_name)",
    "CREATE INDEX IF NOT EXISTS idx_course_breadths_breadth ON course_breadths(breadth)",
    "CREATE INDEX IF NOT EXISTS idx_user_courses_section ON user_courses(course_id, section_num)",
];

/// Run all migrations
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running migrations...");

    for (table, ddl) in TABLES {
        tracing::debug!(table, "ensuring table");
        sqlx::query(ddl).execute(pool).await?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_created_before_their_references() {
        let order: Vec<&str> = TABLES.iter().map(|(name, _)| *name).collect();
        let pos = |name: &str| order.iter().position(|t| *t == name).unwrap();
        assert!(pos("subjects") < pos("course_sections"));
        assert!(pos("users") < pos("user_courses"));
    }

    #[test]
    fn every_statement_is_idempotent() {
        for (_, ddl) in TABLES {
            assert!(ddl.contains("IF NOT EXISTS"));
        }
        for ddl in INDEXES {
            assert!(ddl.contains("IF NOT EXISTS"));
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_run_twice() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = PgPool::connect(&url).await.expect("connect");
        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");
    }
}
