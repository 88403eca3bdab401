//! ECR Public test-repository janitor.
//!
//! Teardown can be interrupted (timeouts, cancelled CI jobs), which leaves
//! repositories behind. The janitor is the out-of-band reconciliation sweep:
//! it deletes every repository whose name carries the test prefix, then
//! re-lists and fails if anything remains.

use thiserror::Error;
use tracing::{info, warn};

use crate::command::ProcessCommandRunner;
use crate::registry::{AdminError, AwsEcrPublic, RepositoryAdmin};

/// Name prefix given to repositories created by the test suite.
pub const DEFAULT_TEST_PREFIX: &str = "terratest-";

/// Configuration for a janitor sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JanitorConfig {
    /// Region to sweep.
    pub region: String,
    /// Repositories whose names start with this prefix are deleted.
    pub prefix: String,
    /// Path to the `aws` CLI binary.
    pub aws_bin: String,
}

impl JanitorConfig {
    /// Constructs a config, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::InvalidConfig`] when any field is blank. A
    /// blank prefix would match every repository in the account.
    pub fn new(
        region: impl Into<String>,
        prefix: impl Into<String>,
        aws_bin: impl Into<String>,
    ) -> Result<Self, JanitorError> {
        Ok(Self {
            region: required("region", region)?,
            prefix: required("prefix", prefix)?,
            aws_bin: required("aws_bin", aws_bin)?,
        })
    }
}

fn required(field: &str, value: impl Into<String>) -> Result<String, JanitorError> {
    let raw: String = value.into();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JanitorError::InvalidConfig {
            field: field.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

/// Summary of janitor work.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepSummary {
    /// Repositories deleted during the sweep.
    pub deleted: Vec<String>,
}

/// Errors returned by the janitor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum JanitorError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}")]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
    /// Raised when repositories remain after the sweep.
    #[error("repositories remain after janitor sweep: {}", remaining.join(", "))]
    NotClean {
        /// Repositories still present.
        remaining: Vec<String>,
    },
    /// Raised when the administrative API fails.
    #[error(transparent)]
    Admin(#[from] AdminError),
}

/// Deletes prefixed test repositories through a [`RepositoryAdmin`].
#[derive(Clone, Debug)]
pub struct Janitor<A: RepositoryAdmin> {
    config: JanitorConfig,
    admin: A,
}

impl Janitor<AwsEcrPublic<ProcessCommandRunner>> {
    /// Creates a janitor that shells out to the configured `aws` binary.
    #[must_use]
    pub fn with_process_runner(config: JanitorConfig) -> Self {
        let admin = AwsEcrPublic::new(config.aws_bin.clone(), ProcessCommandRunner);
        Self::new(config, admin)
    }
}

impl<A: RepositoryAdmin> Janitor<A> {
    /// Creates a new janitor using the provided configuration and admin API.
    #[must_use]
    pub const fn new(config: JanitorConfig, admin: A) -> Self {
        Self { config, admin }
    }

    /// Lists the repositories a sweep would delete, without deleting them.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Admin`] when listing fails.
    pub fn plan(&self) -> Result<Vec<String>, JanitorError> {
        Ok(self
            .admin
            .list_repositories(&self.config.region)?
            .into_iter()
            .map(|repo| repo.repository_name)
            .filter(|name| name.starts_with(&self.config.prefix))
            .collect())
    }

    /// Force-deletes every prefixed repository and verifies none remain.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Admin`] when listing or deletion fails, and
    /// [`JanitorError::NotClean`] when prefixed repositories survive.
    pub fn sweep(&self) -> Result<SweepSummary, JanitorError> {
        let targets = self.plan()?;
        info!(
            region = %self.config.region,
            prefix = %self.config.prefix,
            count = targets.len(),
            "sweeping test repositories"
        );

        let mut deleted = Vec::with_capacity(targets.len());
        for name in targets {
            self.admin.delete(&name, &self.config.region, true)?;
            info!(repository = %name, "deleted test repository");
            deleted.push(name);
        }

        let remaining = self.plan()?;
        if !remaining.is_empty() {
            warn!(count = remaining.len(), "test repositories remain after sweep");
            return Err(JanitorError::NotClean { remaining });
        }

        Ok(SweepSummary { deleted })
    }
}
