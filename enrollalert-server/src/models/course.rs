//! Course identifiers and search filters
//!
//! Registrar course ids are short numeric strings ("024798"); section
//! numbers are three-character codes ("001", "301").

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

const MAX_COURSE_ID_LEN: usize = 16;
const MAX_SECTION_NUM_LEN: usize = 8;
const MAX_SEARCH_LEN: usize = 100;
const MAX_FILTER_LEN: usize = 64;
const MAX_BREADTHS: usize = 16;

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("invalid code regex"));

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

fn validate_code(
    s: &str,
    field: &'static str,
    max: usize,
) -> Result<String, ValidationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if s.len() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    if !CODE_RE.is_match(s) {
        return Err(ValidationError::InvalidFormat {
            field,
            reason: "must be ASCII letters and digits only",
        });
    }
    Ok(s.to_owned())
}

/// Validated registrar course id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseId(String);

impl CourseId {
    /// # Example
    /// ```
    /// use enrollalert_server::models::CourseId;
    ///
    /// assert!(CourseId::new("024798").is_ok());
    /// assert!(CourseId::new("02 4798").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        validate_code(s, "course id", MAX_COURSE_ID_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CourseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated section number within a course
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionNum(String);

impl SectionNum {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        validate_code(s, "section number", MAX_SECTION_NUM_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Free-text course search, normalised for a case-insensitive LIKE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchText(String);

impl SearchText {
    /// Returns `Ok(None)` for blank input so callers can skip the filter.
    pub fn new(s: &str) -> Result<Option<Self>, ValidationError> {
        let collapsed = WHITESPACE_RE.replace_all(s.trim(), " ");
        if collapsed.is_empty() {
            return Ok(None);
        }
        if collapsed.chars().count() > MAX_SEARCH_LEN {
            return Err(ValidationError::TooLong {
                field: "search",
                max: MAX_SEARCH_LEN,
            });
        }
        Ok(Some(Self(collapsed.into_owned())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `%term%` with LIKE metacharacters escaped (backslash is the
    /// Postgres default escape).
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.0.len() + 2);
        pattern.push('%');
        for c in self.0.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }
}

/// Validated filters for the course search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilters {
    pub search: Option<SearchText>,
    /// Exact subject name ("COMP SCI")
    pub subject: Option<String>,
    /// Course matches when it carries any of these
    pub breadths: Vec<String>,
    /// Only courses with open lecture seats
    pub open_only: bool,
}

impl CourseFilters {
    /// Build filters from raw query values. `breadths` is comma-separated.
    pub fn parse(
        search: Option<&str>,
        subject: Option<&str>,
        breadths: Option<&str>,
        open_only: bool,
    ) -> Result<Self, ValidationError> {
        let search = match search {
            Some(s) => SearchText::new(s)?,
            None => None,
        };

        let subject = match subject.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) if s.len() > MAX_FILTER_LEN => {
                return Err(ValidationError::TooLong {
                    field: "subject",
                    max: MAX_FILTER_LEN,
                })
            }
            other => other.map(str::to_owned),
        };

        let mut parsed = Vec::new();
        for breadth in breadths
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
        {
            if breadth.len() > MAX_FILTER_LEN {
                return Err(ValidationError::TooLong {
                    field: "breadth",
                    max: MAX_FILTER_LEN,
                });
            }
            if !parsed.iter().any(|b| b == breadth) {
                parsed.push(breadth.to_owned());
            }
        }
        if parsed.len() > MAX_BREADTHS {
            return Err(ValidationError::InvalidFormat {
                field: "breadths",
                reason: "too many breadths selected",
            });
        }

        Ok(Self {
            search,
            subject,
            breadths: parsed,
            open_only,
        })
    }
}
