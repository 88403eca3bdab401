//! Loader for external test payload documents.
//!
//! Large catalog texts live in files under a fixed root instead of being
//! embedded in test code. Each file may contain [`REPOSITORY_NAME_PLACEHOLDER`]
//! wherever the fixture's repository name belongs.

use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::config::FixtureSettings;
use crate::identifier::RepositoryName;

/// Largest document the loader will read (1 MiB).
pub const MAX_TEST_DATA_BYTES: u64 = 1024 * 1024;

/// Token replaced with the repository name on load.
pub const REPOSITORY_NAME_PLACEHOLDER: &str = "{{REPOSITORY_NAME}}";

/// Default root directory for test payloads, relative to the test crate.
pub const DEFAULT_TEST_DATA_ROOT: &str = "testdata";

/// Errors raised while loading a test document.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TestDataError {
    /// Raised when the root or the document cannot be accessed.
    #[error("failed to read test data {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the document exceeds [`MAX_TEST_DATA_BYTES`].
    #[error("test data file {name} is too large ({size} bytes, max {limit} bytes)")]
    SizeExceeded {
        /// Document name relative to the root.
        name: String,
        /// Size reported by the file system, or `limit + 1` when the
        /// document outgrew the limit while it was being read.
        size: u64,
        /// Enforced limit.
        limit: u64,
    },
}

/// Reads documents from a fixed root and substitutes the repository name.
///
/// Nothing is cached; every call re-reads the file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestDataLoader {
    root: Utf8PathBuf,
}

impl Default for TestDataLoader {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_DATA_ROOT)
    }
}

impl TestDataLoader {
    /// Creates a loader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a loader rooted at the configured `test_data_root`.
    #[must_use]
    pub fn from_settings(settings: &FixtureSettings) -> Self {
        Self::new(settings.test_data_root.as_str())
    }

    /// Returns the configured root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Loads `name` and replaces every placeholder with `repository`.
    ///
    /// The size check runs against file metadata before any content is read,
    /// and the read itself stops one byte past the limit.
    /// Names are resolved inside the root directory handle and cannot escape
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`TestDataError::SizeExceeded`] for oversized documents and
    /// [`TestDataError::Io`] when the root or document cannot be read.
    pub fn load(&self, name: &str, repository: &RepositoryName) -> Result<String, TestDataError> {
        let path = self.root.join(name);
        let io_error = |err: std::io::Error| TestDataError::Io {
            path: path.clone(),
            message: err.to_string(),
        };

        let dir = Dir::open_ambient_dir(&self.root, ambient_authority()).map_err(io_error)?;
        let size = dir.metadata(name).map_err(io_error)?.len();
        if size > MAX_TEST_DATA_BYTES {
            return Err(TestDataError::SizeExceeded {
                name: name.to_owned(),
                size,
                limit: MAX_TEST_DATA_BYTES,
            });
        }

        let file = dir.open(name).map_err(io_error)?;
        let Some(content) = read_capped(file, MAX_TEST_DATA_BYTES).map_err(io_error)? else {
            return Err(TestDataError::SizeExceeded {
                name: name.to_owned(),
                size: MAX_TEST_DATA_BYTES.saturating_add(1),
                limit: MAX_TEST_DATA_BYTES,
            });
        };
        Ok(content.replace(REPOSITORY_NAME_PLACEHOLDER, repository.as_str()))
    }
}

/// Reads at most `limit` bytes as UTF-8. Returns `None` when `reader`
/// holds more than `limit` bytes.
fn read_capped(reader: impl Read, limit: u64) -> io::Result<Option<String>> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if u64::try_from(bytes.len()).unwrap_or(u64::MAX) > limit {
        return Ok(None);
    }
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
