//! Course repository - catalog search and section trees
//!
//! - search: dynamic filters assembled with QueryBuilder, window count for total
//!   (separate COUNT when the page lies past the last match)
//! - subsections: one LEFT JOIN, grouped into lectures in memory (no N+1)

use enrollalert_core::Term;
use serde::Serialize;
use sqlx::{FromRow, Postgres, QueryBuilder};

use crate::db::{Database, DbError};
use crate::models::{CourseFilters, CourseId, Paginated, Pagination};

/// One course, aggregated over its lecture sections
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseSummary {
    pub course_id: String,
    pub course_name: String,
    pub course_title: String,
    pub subject_id: i32,
    pub subject_name: String,
    pub total_enrolled: i64,
    pub total_capacity: i64,
    pub total_open_seats: i64,
    pub total_waitlist_capacity: i64,
    pub total_waitlist_open: i64,
    pub has_subsections: bool,
    pub breadths: Vec<String>,
}

#[derive(Debug, FromRow)]
struct CourseSummaryRow {
    #[sqlx(flatten)]
    course: CourseSummary,
    total: i64,
}

/// Lecture with its discussions/labs/seminars
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lecture {
    pub lecture_num: String,
    pub professor: Option<String>,
    pub capacity: i32,
    pub enrolled: i32,
    pub open_seats: i32,
    pub waitlist_capacity: i32,
    pub waitlist_open_spots: i32,
    pub discussions: Vec<Subsection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subsection {
    pub section_num: String,
    pub section_type: String,
    pub capacity: i32,
    pub enrolled: i32,
    pub open_seats: i32,
    pub waitlist_capacity: i32,
    pub waitlist_open_spots: i32,
}

/// Flat lecture ⟕ subsection row
#[derive(Debug, Clone, Default, FromRow)]
pub struct SubsectionRow {
    pub lecture_num: String,
    pub professor: Option<String>,
    pub capacity: i32,
    pub enrolled: i32,
    pub open_seats: i32,
    pub waitlist_capacity: i32,
    pub waitlist_open_spots: i32,
    pub dis_section_num: Option<String>,
    pub dis_section_type: Option<String>,
    pub dis_capacity: Option<i32>,
    pub dis_enrolled: Option<i32>,
    pub dis_open_seats: Option<i32>,
    pub dis_waitlist_capacity: Option<i32>,
    pub dis_waitlist_open_spots: Option<i32>,
}

/// Non-lecture section in flat form
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DiscussionSection {
    pub section_num: String,
    pub section_type: String,
    pub open_seats: i32,
    pub parent_section_num: Option<String>,
}

/// Push the FROM/WHERE/GROUP BY/HAVING part shared by the search and
/// count queries. The term is always the first bind parameter.
fn push_matching_courses(
    qb: &mut QueryBuilder<'static, Postgres>,
    filters: &CourseFilters,
    term: Term,
) {
    qb.push(
        r#"
        FROM course_sections c
        JOIN subjects s ON s.subject_id = c.subject_id
        WHERE c.section_type = 'LEC' AND c.term = "#,
    );
    qb.push_bind(term.code());

    if let Some(search) = &filters.search {
        let pattern = search.like_pattern();
        qb.push(" AND (c.course_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR c.course_title ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }

    if let Some(subject) = &filters.subject {
        qb.push(" AND s.subject_name = ");
        qb.push_bind(subject.clone());
    }

    if !filters.breadths.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM course_breadths fb \
             WHERE fb.course_id = c.course_id AND fb.breadth = ANY(",
        );
        qb.push_bind(filters.breadths.clone());
        qb.push("))");
    }

    qb.push(
        " GROUP BY c.term, c.course_id, c.course_name, c.course_title, \
         c.subject_id, s.subject_name",
    );

    if filters.open_only {
        qb.push(" HAVING COALESCE(SUM(c.open_seats), 0) > 0");
    }
}

/// Assemble the course search query.
///
/// Kept separate from execution so the SQL shape can be tested without a
/// database. Every user value is a bind parameter.
pub fn build_search_query(
    filters: &CourseFilters,
    term: Term,
    page: Pagination,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT
            c.course_id,
            c.course_name,
            c.course_title,
            c.subject_id,
            s.subject_name,
            COALESCE(SUM(c.enrolled), 0)::BIGINT AS total_enrolled,
            COALESCE(SUM(c.capacity), 0)::BIGINT AS total_capacity,
            COALESCE(SUM(c.open_seats), 0)::BIGINT AS total_open_seats,
            COALESCE(SUM(c.waitlist_capacity), 0)::BIGINT AS total_waitlist_capacity,
            COALESCE(SUM(c.waitlist_open_spots), 0)::BIGINT AS total_waitlist_open,
            EXISTS (
                SELECT 1 FROM course_sections sub
                WHERE sub.term = c.term
                  AND sub.course_id = c.course_id
                  AND sub.section_type <> 'LEC'
            ) AS has_subsections,
            ARRAY(
                SELECT b.breadth FROM course_breadths b
                WHERE b.course_id = c.course_id
                ORDER BY b.breadth
            ) AS breadths,
            COUNT(*) OVER() AS total"#,
    );
    push_matching_courses(&mut qb, filters, term);

    // course_id breaks ties so pages never overlap
    qb.push(" ORDER BY c.course_name, c.course_id LIMIT ");
    qb.push_bind(page.limit());
    qb.push(" OFFSET ");
    qb.push_bind(page.offset());

    qb
}

/// Count every course matching the filters, independent of paging.
pub fn build_count_query(filters: &CourseFilters, term: Term) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT c.course_id");
    push_matching_courses(&mut qb, filters, term);
    qb.push(") matched");
    qb
}

/// Fold ordered lecture/subsection rows into lectures.
///
/// Rows must be ordered by lecture number; a lecture with no children
/// arrives as a single row with NULL subsection columns.
pub fn group_lectures(rows: Vec<SubsectionRow>) -> Vec<Lecture> {
    let mut lectures: Vec<Lecture> = Vec::new();

    for row in rows {
        let child = match (row.dis_section_num, row.dis_section_type) {
            (Some(section_num), Some(section_type)) => Some(Subsection {
                section_num,
                section_type,
                capacity: row.dis_capacity.unwrap_or(0),
                enrolled: row.dis_enrolled.unwrap_or(0),
                open_seats: row.dis_open_seats.unwrap_or(0),
                waitlist_capacity: row.dis_waitlist_capacity.unwrap_or(0),
                waitlist_open_spots: row.dis_waitlist_open_spots.unwrap_or(0),
            }),
            _ => None,
        };

        let same_lecture = lectures
            .last()
            .is_some_and(|l| l.lecture_num == row.lecture_num);
        if !same_lecture {
            lectures.push(Lecture {
                lecture_num: row.lecture_num,
                professor: row.professor,
                capacity: row.capacity,
                enrolled: row.enrolled,
                open_seats: row.open_seats,
                waitlist_capacity: row.waitlist_capacity,
                waitlist_open_spots: row.waitlist_open_spots,
                discussions: Vec::new(),
            });
        }

        if let (Some(child), Some(lecture)) = (child, lectures.last_mut()) {
            lecture.discussions.push(child);
        }
    }

    lectures
}

/// Course repository
pub struct CourseRepo<'a> {
    db: &'a Database,
}

impl<'a> CourseRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Filtered, paginated course list for a term.
    pub async fn search(
        &self,
        filters: &CourseFilters,
        term: Term,
        page: Pagination,
    ) -> Result<Paginated<CourseSummary>, DbError> {
        let rows: Vec<CourseSummaryRow> = self
            .db
            .run(|pool| async move {
                let mut qb = build_search_query(filters, term, page);
                qb.build_query_as().fetch_all(&pool).await
            })
            .await?;

        // The window count is taken before OFFSET, so a page past the end
        // carries no total of its own.
        let total = match rows.first() {
            Some(row) => row.total,
            None if page.page > 1 => self.count(filters, term).await?,
            None => 0,
        };
        let items = rows.into_iter().map(|r| r.course).collect();

        Ok(Paginated::new(items, total, page))
    }

    /// Number of courses matching the filters.
    pub async fn count(&self, filters: &CourseFilters, term: Term) -> Result<i64, DbError> {
        self.db
            .run(|pool| async move {
                let mut qb = build_count_query(filters, term);
                qb.build_query_scalar::<i64>().fetch_one(&pool).await
            })
            .await
    }

    /// Lectures of a course with their subsections, ordered by lecture number.
    pub async fn subsections(
        &self,
        course_id: &CourseId,
        term: Term,
    ) -> Result<Vec<Lecture>, DbError> {
        let rows: Vec<SubsectionRow> = self
            .db
            .run(|pool| async move {
                sqlx::query_as(
                    r#"
                    SELECT
                        l.section_num AS lecture_num,
                        l.professor,
                        l.capacity,
                        l.enrolled,
                        l.open_seats,
                        l.waitlist_capacity,
                        l.waitlist_open_spots,
                        d.section_num AS dis_section_num,
                        d.section_type AS dis_section_type,
                        d.capacity AS dis_capacity,
                        d.enrolled AS dis_enrolled,
                        d.open_seats AS dis_open_seats,
                        d.waitlist_capacity AS dis_waitlist_capacity,
                        d.waitlist_open_spots AS dis_waitlist_open_spots
                    FROM course_sections l
                    LEFT JOIN course_sections d
                        ON d.term = l.term
                       AND d.course_id = l.course_id
                       AND d.parent_section_num = l.section_num
                       AND d.section_type <> 'LEC'
                    WHERE l.term = $1
                      AND l.course_id = $2
                      AND l.section_type = 'LEC'
                    ORDER BY l.section_num, d.section_type, d.section_num
                    "#,
                )
                .bind(term.code())
                .bind(course_id.as_str())
                .fetch_all(&pool)
                .await
            })
            .await?;

        Ok(group_lectures(rows))
    }

    /// Discussion, lab and seminar sections of a course.
    pub async fn discussions(
        &self,
        course_id: &CourseId,
        term: Term,
    ) -> Result<Vec<DiscussionSection>, DbError> {
        self.db
            .run(|pool| async move {
                sqlx::query_as(
                    r#"
                    SELECT section_num, section_type, open_seats, parent_section_num
                    FROM course_sections
                    WHERE term = $1
                      AND course_id = $2
                      AND section_type <> 'LEC'
                    ORDER BY section_num
                    "#,
                )
                .bind(term.code())
                .bind(course_id.as_str())
                .fetch_all(&pool)
                .await
            })
            .await
    }
}
