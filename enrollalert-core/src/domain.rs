//! Registrar vocabulary: terms and alert types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored or user-supplied code is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseDomainError {
    pub kind: &'static str,
    pub value: String,
}

/// Registrar term code (e.g. 1262 for Fall 2025).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term(pub i32);

impl Term {
    pub fn code(self) -> i32 {
        self.0
    }
}

impl Default for Term {
    fn default() -> Self {
        Self(1262)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Term {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .ok()
            .filter(|code| *code > 0)
            .map(Term)
            .ok_or_else(|| ParseDomainError {
                kind: "term",
                value: s.to_owned(),
            })
    }
}

/// How a saved alert decides it has been triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Any open seat.
    Any,
    /// Seat count crosses a user-chosen threshold.
    Threshold,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Threshold => "threshold",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(Self::Any),
            "threshold" => Ok(Self::Threshold),
            _ => Err(ParseDomainError {
                kind: "alert type",
                value: s.to_owned(),
            }),
        }
    }
}
