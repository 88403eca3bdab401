//! Repository name validation.
//!
//! Names are interpolated into CLI arguments, Terraform variables and
//! remediation commands, so they are validated in full before any remote call
//! is made. A [`RepositoryName`] can only be obtained through validation.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Maximum repository name length accepted by ECR Public.
pub const MAX_NAME_LENGTH: usize = 256;

const UNIQUE_SUFFIX_LENGTH: usize = 6;

/// Reasons a candidate repository name is rejected.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// Raised when the candidate is empty.
    #[error("repository name cannot be empty")]
    Empty,
    /// Raised when the candidate exceeds [`MAX_NAME_LENGTH`].
    #[error("repository name must be {MAX_NAME_LENGTH} characters or less (got {length})")]
    TooLong {
        /// Length of the rejected candidate in bytes.
        length: usize,
    },
    /// Raised when the candidate contains anything besides `[a-z0-9-]`.
    #[error(
        "invalid repository name format: {name}; repository names must contain only \
         lowercase letters, numbers, and hyphens"
    )]
    InvalidCharacters {
        /// Rejected candidate.
        name: String,
    },
    /// Raised when the candidate contains a `..` sequence.
    #[error("repository name cannot contain '..' patterns: {name}")]
    DotDot {
        /// Rejected candidate.
        name: String,
    },
    /// Raised when the candidate starts or ends with a hyphen.
    #[error("repository name cannot start or end with hyphens: {name}")]
    EdgeHyphen {
        /// Rejected candidate.
        name: String,
    },
}

/// Checks `candidate` against the ECR Public naming rules.
///
/// Checks run in a fixed order: emptiness, length, character set, `..`
/// sequences, then leading or trailing hyphens.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate(candidate: &str) -> Result<(), ValidationError> {
    if candidate.is_empty() {
        return Err(ValidationError::Empty);
    }
    if candidate.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            length: candidate.len(),
        });
    }
    if !candidate.bytes().all(is_name_byte) {
        return Err(ValidationError::InvalidCharacters {
            name: candidate.to_owned(),
        });
    }
    if candidate.contains("..") {
        return Err(ValidationError::DotDot {
            name: candidate.to_owned(),
        });
    }
    if candidate.starts_with('-') || candidate.ends_with('-') {
        return Err(ValidationError::EdgeHyphen {
            name: candidate.to_owned(),
        });
    }
    Ok(())
}

const fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-'
}

/// A repository name that passed [`validate`].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Validates and wraps `candidate`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the candidate breaks a naming rule.
    pub fn parse(candidate: impl Into<String>) -> Result<Self, ValidationError> {
        let name = candidate.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Builds `<prefix>-<suffix>` with a short random lowercase suffix, so
    /// parallel tests never contend for the same remote name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the prefix makes the name invalid.
    pub fn unique(prefix: &str) -> Result<Self, ValidationError> {
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(UNIQUE_SUFFIX_LENGTH)
            .collect();
        Self::parse(format!("{prefix}-{suffix}"))
    }

    /// Returns the validated name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RepositoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests;
