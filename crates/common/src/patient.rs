//! Patient identifier validation.
//!
//! Every memory and completion call is scoped by a [`PatientId`]. The only
//! way to obtain one is through [`PatientId::parse`] or
//! [`PatientId::require`], so holding a value means the identifier is in
//! canonical `PAT-XXXXX` form.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

static PATIENT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PAT-[A-Z0-9]{5}$").expect("patient ID pattern is valid"));

/// Errors produced while validating a raw patient identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatientIdError {
    #[error("Invalid patient ID format. Must be PAT-XXXXX")]
    InvalidFormat,

    #[error("Error: Invalid patient ID")]
    Missing,
}

/// A validated patient identifier in canonical `PAT-XXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientId(String);

impl PatientId {
    /// Validate and normalize a raw identifier.
    ///
    /// Empty input yields `Ok(None)`. Anything else is trimmed and
    /// upper-cased, then must match `^PAT-[A-Z0-9]{5}$`.
    pub fn parse(raw: &str) -> Result<Option<Self>, PatientIdError> {
        if raw.is_empty() {
            return Ok(None);
        }

        let candidate = raw.trim().to_uppercase();
        if !PATIENT_ID_PATTERN.is_match(&candidate) {
            return Err(PatientIdError::InvalidFormat);
        }

        Ok(Some(Self(candidate)))
    }

    /// Like [`PatientId::parse`], but an empty identifier is an error.
    pub fn require(raw: &str) -> Result<Self, PatientIdError> {
        Self::parse(raw)?.ok_or(PatientIdError::Missing)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PatientId {
    type Err = PatientIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::require(s)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for PatientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
