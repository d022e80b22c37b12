//! Alert rules and the sections an alert request targets

use std::collections::BTreeSet;

use enrollalert_core::AlertType;

use super::{CourseId, SectionNum, ValidationError};

/// Upper bound on sections in one request; a course rarely has more.
const MAX_SECTIONS_PER_REQUEST: usize = 64;

/// When a saved alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertRule {
    /// Any open seat
    Any,
    /// Seat count threshold (>= 1)
    Threshold(i32),
}

impl AlertRule {
    /// Validate an alert type/threshold pair. `any` ignores the threshold.
    pub fn new(alert_type: &str, seat_threshold: Option<i32>) -> Result<Self, ValidationError> {
        let kind: AlertType = alert_type
            .parse()
            .map_err(|_| ValidationError::InvalidVariant {
                field: "alert type",
                value: alert_type.to_owned(),
            })?;

        match kind {
            AlertType::Any => Ok(Self::Any),
            AlertType::Threshold => match seat_threshold {
                Some(n) if n >= 1 => Ok(Self::Threshold(n)),
                Some(_) => Err(ValidationError::TooSmall {
                    field: "seat threshold",
                    min: 1,
                }),
                None => Err(ValidationError::Empty {
                    field: "seat threshold",
                }),
            },
        }
    }

    pub fn alert_type(self) -> AlertType {
        match self {
            Self::Any => AlertType::Any,
            Self::Threshold(_) => AlertType::Threshold,
        }
    }

    /// Stored threshold; NULL for `any`.
    pub fn seat_threshold(self) -> Option<i32> {
        match self {
            Self::Any => None,
            Self::Threshold(n) => Some(n),
        }
    }
}

/// A course plus a non-empty, de-duplicated set of its sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSelection {
    pub course_id: CourseId,
    pub sections: Vec<SectionNum>,
}

impl SectionSelection {
    pub fn new(course_id: &str, sections: &[String]) -> Result<Self, ValidationError> {
        let course_id = CourseId::new(course_id)?;

        let unique = sections
            .iter()
            .map(|s| SectionNum::new(s))
            .collect::<Result<BTreeSet<_>, _>>()?;

        if unique.is_empty() {
            return Err(ValidationError::Empty {
                field: "section numbers",
            });
        }
        if unique.len() > MAX_SECTIONS_PER_REQUEST {
            return Err(ValidationError::InvalidFormat {
                field: "section numbers",
                reason: "too many sections in one request",
            });
        }

        Ok(Self {
            course_id,
            sections: unique.into_iter().collect(),
        })
    }

    /// Section numbers as plain strings, for array binds.
    pub fn section_strs(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.as_str().to_owned()).collect()
    }
}
