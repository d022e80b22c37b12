//! Alert repository - saved section alerts per user
//!
//! Saving runs in one transaction with the user row locked, so the
//! existence check, the limit check and the upsert see a consistent set of
//! alerts even when the same user saves from two tabs at once.

use chrono::{DateTime, Utc};
use enrollalert_core::Term;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::db::{Database, DbError};
use crate::models::{AlertRule, SectionSelection};

/// An alert as stored
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StoredAlert {
    pub course_id: String,
    pub section_num: String,
    pub alert_type: String,
    pub seat_threshold: Option<i32>,
}

impl StoredAlert {
    fn matches(&self, rule: AlertRule) -> bool {
        self.alert_type == rule.alert_type().as_str() && self.seat_threshold == rule.seat_threshold()
    }
}

/// What a save would do, decided before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavePlan {
    /// Upsert these sections
    Write {
        sections: Vec<String>,
        created: usize,
        updated: usize,
    },
    /// Every section already has exactly this rule
    Duplicate,
    /// New sections would push the user past the cap
    OverLimit { limit: u32, current: usize },
}

/// Decide how to apply `rule` to `selection` given the user's current alerts.
///
/// Sections that already carry the same rule are left alone, sections with a
/// different rule are updated in place, and only brand-new sections count
/// against `max_alerts`.
pub fn plan_save(
    existing: &[StoredAlert],
    selection: &SectionSelection,
    rule: AlertRule,
    max_alerts: u32,
) -> SavePlan {
    let mut sections = Vec::new();
    let (mut created, mut updated) = (0, 0);

    for section in &selection.sections {
        let current = existing.iter().find(|a| {
            a.course_id == selection.course_id.as_str() && a.section_num == section.as_str()
        });
        match current {
            None => created += 1,
            Some(alert) if !alert.matches(rule) => updated += 1,
            Some(_) => continue,
        }
        sections.push(section.as_str().to_owned());
    }

    if sections.is_empty() {
        return SavePlan::Duplicate;
    }

    if existing.len() + created > max_alerts as usize {
        return SavePlan::OverLimit {
            limit: max_alerts,
            current: existing.len(),
        };
    }

    SavePlan::Write {
        sections,
        created,
        updated,
    }
}

/// Result of [`AlertRepo::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { created: usize, updated: usize },
    Duplicate,
    LimitExceeded { limit: u32, current: usize },
    /// Requested sections that do not exist in the term
    UnknownSections(Vec<String>),
}

/// Flat saved-alert row joined with live section data
#[derive(Debug, Clone, Default, FromRow)]
pub struct SavedAlertRow {
    pub course_id: String,
    pub course_name: String,
    pub course_title: String,
    pub total_open_seats: i64,
    pub total_enrolled: i64,
    pub total_capacity: i64,
    pub total_waitlist_open: i64,
    pub total_waitlist_capacity: i64,
    pub section_num: String,
    pub section_type: String,
    pub open_seats: i32,
    pub capacity: i32,
    pub enrolled: i32,
    pub waitlist_capacity: i32,
    pub waitlist_open_spots: i32,
    pub alert_type: String,
    pub seat_threshold: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A course the user watches, with the watched sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedCourse {
    pub course_id: String,
    pub course_name: String,
    pub course_title: String,
    pub total_open_seats: i64,
    pub total_enrolled: i64,
    pub total_capacity: i64,
    pub total_waitlist_open: i64,
    pub total_waitlist_capacity: i64,
    pub alerts: Vec<SavedSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedSection {
    pub section_num: String,
    pub section_type: String,
    pub open_seats: i32,
    pub capacity: i32,
    pub enrolled: i32,
    pub waitlist_capacity: i32,
    pub waitlist_open_spots: i32,
    pub alert_type: String,
    pub seat_threshold: Option<i32>,
    /// When the alert was first saved or last changed
    pub created_at: DateTime<Utc>,
}

/// Fold rows ordered by course into one entry per course.
pub fn group_saved(rows: Vec<SavedAlertRow>) -> Vec<SavedCourse> {
    let mut courses: Vec<SavedCourse> = Vec::new();

    for row in rows {
        let section = SavedSection {
            section_num: row.section_num,
            section_type: row.section_type,
            open_seats: row.open_seats,
            capacity: row.capacity,
            enrolled: row.enrolled,
            waitlist_capacity: row.waitlist_capacity,
            waitlist_open_spots: row.waitlist_open_spots,
            alert_type: row.alert_type,
            seat_threshold: row.seat_threshold,
            created_at: row.created_at,
        };

        match courses.last_mut() {
            Some(course) if course.course_id == row.course_id => course.alerts.push(section),
            _ => courses.push(SavedCourse {
                course_id: row.course_id,
                course_name: row.course_name,
                course_title: row.course_title,
                total_open_seats: row.total_open_seats,
                total_enrolled: row.total_enrolled,
                total_capacity: row.total_capacity,
                total_waitlist_open: row.total_waitlist_open,
                total_waitlist_capacity: row.total_waitlist_capacity,
                alerts: vec![section],
            }),
        }
    }

    courses
}

async fn save_in_tx(
    pool: PgPool,
    user_id: i64,
    selection: &SectionSelection,
    requested: &[String],
    rule: AlertRule,
    term: Term,
    max_alerts: u32,
) -> Result<SaveOutcome, sqlx::Error> {
    let course_id = selection.course_id.as_str();
    let mut tx = pool.begin().await?;

    // Serializes concurrent saves for the same user
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let found: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT section_num
        FROM course_sections
        WHERE term = $1 AND course_id = $2 AND section_num = ANY($3)
        "#,
    )
    .bind(term.code())
    .bind(course_id)
    .bind(requested)
    .fetch_all(&mut *tx)
    .await?;

    let missing: Vec<String> = requested
        .iter()
        .filter(|s| !found.contains(s))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Ok(SaveOutcome::UnknownSections(missing));
    }

    let existing: Vec<StoredAlert> = sqlx::query_as(
        r#"
        SELECT course_id, section_num, alert_type, seat_threshold
        FROM user_courses
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let (sections, created, updated) = match plan_save(&existing, selection, rule, max_alerts) {
        SavePlan::Duplicate => return Ok(SaveOutcome::Duplicate),
        SavePlan::OverLimit { limit, current } => {
            return Ok(SaveOutcome::LimitExceeded { limit, current })
        }
        SavePlan::Write {
            sections,
            created,
            updated,
        } => (sections, created, updated),
    };

    sqlx::query(
        r#"
        INSERT INTO user_courses (user_id, course_id, section_num, alert_type, seat_threshold)
        SELECT $1, $2, UNNEST($3::TEXT[]), $4, $5
        ON CONFLICT (user_id, course_id, section_num)
        DO UPDATE SET
            alert_type = EXCLUDED.alert_type,
            seat_threshold = EXCLUDED.seat_threshold,
            created_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(&sections)
    .bind(rule.alert_type().as_str())
    .bind(rule.seat_threshold())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(SaveOutcome::Saved { created, updated })
}

/// Alert repository
pub struct AlertRepo<'a> {
    db: &'a Database,
}

impl<'a> AlertRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Save `rule` for every section in `selection`.
    pub async fn save(
        &self,
        user_id: i64,
        selection: &SectionSelection,
        rule: AlertRule,
        term: Term,
        max_alerts: u32,
    ) -> Result<SaveOutcome, DbError> {
        let requested = selection.section_strs();
        let requested = requested.as_slice();

        self.db
            .run(|pool| save_in_tx(pool, user_id, selection, requested, rule, term, max_alerts))
            .await
    }

    /// Remove the user's alerts for the selected sections.
    ///
    /// Returns how many were removed; sections without an alert are ignored.
    pub async fn delete(&self, user_id: i64, selection: &SectionSelection) -> Result<u64, DbError> {
        let sections = selection.section_strs();
        let sections = sections.as_slice();
        let course_id = selection.course_id.as_str();

        let result = self
            .db
            .run(|pool| async move {
                sqlx::query(
                    r#"
                    DELETE FROM user_courses
                    WHERE user_id = $1 AND course_id = $2 AND section_num = ANY($3)
                    "#,
                )
                .bind(user_id)
                .bind(course_id)
                .bind(sections)
                .execute(&pool)
                .await
            })
            .await?;

        Ok(result.rows_affected())
    }

    /// Saved alerts with current seat counts, grouped by course.
    pub async fn list_for_user(&self, user_id: i64, term: Term) -> Result<Vec<SavedCourse>, DbError> {
        let rows: Vec<SavedAlertRow> = self
            .db
            .run(|pool| async move {
                sqlx::query_as(
                    r#"
                    WITH lecture_totals AS (
                        SELECT
                            course_id,
                            SUM(open_seats)::BIGINT AS total_open_seats,
                            SUM(enrolled)::BIGINT AS total_enrolled,
                            SUM(capacity)::BIGINT AS total_capacity,
                            SUM(waitlist_open_spots)::BIGINT AS total_waitlist_open,
                            SUM(waitlist_capacity)::BIGINT AS total_waitlist_capacity
                        FROM course_sections
                        WHERE term = $2 AND section_type = 'LEC'
                        GROUP BY course_id
                    )
                    SELECT
                        s.course_id,
                        s.course_name,
                        s.course_title,
                        COALESCE(t.total_open_seats, 0) AS total_open_seats,
                        COALESCE(t.total_enrolled, 0) AS total_enrolled,
                        COALESCE(t.total_capacity, 0) AS total_capacity,
                        COALESCE(t.total_waitlist_open, 0) AS total_waitlist_open,
                        COALESCE(t.total_waitlist_capacity, 0) AS total_waitlist_capacity,
                        a.section_num,
                        s.section_type,
                        s.open_seats,
                        s.capacity,
                        s.enrolled,
                        s.waitlist_capacity,
                        s.waitlist_open_spots,
                        a.alert_type,
                        a.seat_threshold,
                        a.created_at
                    FROM user_courses a
                    JOIN course_sections s
                        ON s.course_id = a.course_id
                       AND s.section_num = a.section_num
                       AND s.term = $2
                    LEFT JOIN lecture_totals t ON t.course_id = s.course_id
                    WHERE a.user_id = $1
                    ORDER BY s.course_name, s.course_id, s.section_type, s.section_num
                    "#,
                )
                .bind(user_id)
                .bind(term.code())
                .fetch_all(&pool)
                .await
            })
            .await?;

        Ok(group_saved(rows))
    }
}
