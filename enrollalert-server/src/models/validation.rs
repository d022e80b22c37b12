//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Number below the allowed minimum
    TooSmall { field: &'static str, min: i64 },

    /// Sections that don't exist for the course in the current term
    UnknownSections { course_id: String, sections: Vec<String> },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::TooSmall { field, min } => {
                write!(f, "{} must be at least {}", field, min)
            }
            Self::UnknownSections { course_id, sections } => {
                write!(
                    f,
                    "course {} has no section(s) {} this term",
                    course_id,
                    sections.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "search",
            max: 100,
        };
        assert_eq!(
            err.to_string(),
            "search exceeds maximum length of 100 characters"
        );
    }

    #[test]
    fn unknown_sections_lists_them() {
        let err = ValidationError::UnknownSections {
            course_id: "024798".into(),
            sections: vec!["009".into(), "310".into()],
        };
        assert_eq!(
            err.to_string(),
            "course 024798 has no section(s) 009, 310 this term"
        );
    }
}
