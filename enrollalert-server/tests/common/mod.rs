//! Fixtures shared by the database-backed tests
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p enrollalert-server -- --ignored

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use enrollalert_core::config::DatabaseSection;
use enrollalert_core::Term;
use enrollalert_server::db::{create_pool, migrations, Database};

pub const TERM: Term = Term(1262);

/// Subject every `seed_course` course belongs to
pub const TEST_SUBJECT_ID: i32 = 9999;

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

fn next() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    (nanos % 1_000_000_000) as u64 * 1_000 + COUNTER.fetch_add(1, Ordering::Relaxed) % 1_000
}

/// Short alphanumeric token unique to this process and call
pub fn unique(prefix: &str) -> String {
    format!("{prefix}{}", next())
}

/// Positive id unlikely to collide with other runs
pub fn unique_id() -> i32 {
    100_000 + (next() % 2_000_000_000) as i32
}

/// One section row to insert
pub struct SectionSeed<'a> {
    pub section_num: &'a str,
    pub section_type: &'a str,
    pub parent: Option<&'a str>,
    pub open_seats: i32,
}

impl<'a> SectionSeed<'a> {
    pub fn lecture(section_num: &'a str) -> Self {
        Self {
            section_num,
            section_type: "LEC",
            parent: None,
            open_seats: 5,
        }
    }

    pub fn child(section_num: &'a str, section_type: &'a str, parent: &'a str) -> Self {
        Self {
            section_num,
            section_type,
            parent: Some(parent),
            open_seats: 2,
        }
    }
}

pub async fn seed_subject(db: &Database, subject_id: i32, name: &str) {
    sqlx::query(
        "INSERT INTO subjects (subject_id, subject_name) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(subject_id)
    .bind(name)
    .execute(db.pool())
    .await
    .unwrap();
}

pub async fn seed_section(
    db: &Database,
    term: Term,
    subject_id: i32,
    course_id: &str,
    name: &str,
    section: &SectionSeed<'_>,
) {
    sqlx::query(
        r#"
        INSERT INTO course_sections
            (term, course_id, subject_id, course_name, course_title,
             section_num, section_type, parent_section_num, professor,
             capacity, enrolled, open_seats)
        VALUES ($1, $2, $3, $4, 'Test Course', $5, $6, $7, 'Prof. Test', 100, $8, $9)
        "#,
    )
    .bind(term.code())
    .bind(course_id)
    .bind(subject_id)
    .bind(name)
    .bind(section.section_num)
    .bind(section.section_type)
    .bind(section.parent)
    .bind(100 - section.open_seats)
    .bind(section.open_seats)
    .execute(db.pool())
    .await
    .unwrap();
}

/// Insert a course with one lecture per entry in `sections`.
pub async fn seed_course(db: &Database, course_id: &str, name: &str, sections: &[&str]) {
    seed_subject(db, TEST_SUBJECT_ID, "TEST SUBJ").await;
    for section in sections {
        seed_section(
            db,
            TERM,
            TEST_SUBJECT_ID,
            course_id,
            name,
            &SectionSeed::lecture(section),
        )
        .await;
    }
}
