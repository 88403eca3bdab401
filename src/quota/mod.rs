//! Pre-flight quota guard.
//!
//! The repository count is a shared remote counter read without locking, so
//! parallel tests may race past the check together. Thresholds are kept well
//! below the hard limit to leave room for them.

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{
    DEFAULT_QUOTA_HARD_LIMIT, DEFAULT_REMEDIATION_SCRIPT, EnvironmentSignals, FixtureSettings,
};
use crate::registry::RepositoryAdmin;

const WARN_PERCENT: u64 = 70;
const ERROR_PERCENT: u64 = 85;

/// Warn and abort thresholds for the repository count.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QuotaThresholds {
    warn: u64,
    error: u64,
    hard_limit: u64,
}

/// Classification of a repository count against [`QuotaThresholds`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuotaLevel {
    /// Below the warning threshold.
    Normal,
    /// At or above the warning threshold.
    Warning,
    /// At or above the abort threshold.
    Exceeded,
}

impl QuotaThresholds {
    /// Derives thresholds as 70% and 85% of `hard_limit`.
    #[must_use]
    pub const fn from_hard_limit(hard_limit: u64) -> Self {
        Self {
            warn: hard_limit.saturating_mul(WARN_PERCENT).div_euclid(100),
            error: hard_limit.saturating_mul(ERROR_PERCENT).div_euclid(100),
            hard_limit,
        }
    }

    /// Uses explicit thresholds.
    #[must_use]
    pub const fn new(warn: u64, error: u64, hard_limit: u64) -> Self {
        Self {
            warn,
            error,
            hard_limit,
        }
    }

    /// Count at which a warning is logged.
    #[must_use]
    pub const fn warn(&self) -> u64 {
        self.warn
    }

    /// Count at which fixture creation is refused.
    #[must_use]
    pub const fn error(&self) -> u64 {
        self.error
    }

    /// Provider hard limit.
    #[must_use]
    pub const fn hard_limit(&self) -> u64 {
        self.hard_limit
    }

    /// Classifies `count`.
    #[must_use]
    pub const fn evaluate(&self, count: u64) -> QuotaLevel {
        if count >= self.error {
            QuotaLevel::Exceeded
        } else if count >= self.warn {
            QuotaLevel::Warning
        } else {
            QuotaLevel::Normal
        }
    }
}

impl Default for QuotaThresholds {
    fn default() -> Self {
        Self::from_hard_limit(DEFAULT_QUOTA_HARD_LIMIT)
    }
}

/// Why a quota check did not enforce anything.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Running under CI.
    CiEnvironment,
    /// `AWS_SKIP_QUOTA_CHECK` was set.
    ExplicitOverride,
    /// The repository count could not be read.
    QueryFailed {
        /// Error reported by the administrative API.
        message: String,
    },
}

/// Result of one quota check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuotaSnapshot {
    /// Repositories counted in the region (zero when skipped).
    pub current_count: u64,
    /// Count at which a warning is logged.
    pub warn_threshold: u64,
    /// Count at which fixture creation is refused.
    pub error_threshold: u64,
    /// Whether enforcement was skipped.
    pub skipped: bool,
    /// Reason for skipping, when `skipped` is set.
    pub skip_reason: Option<SkipReason>,
}

impl QuotaSnapshot {
    const fn skipped(thresholds: QuotaThresholds, reason: SkipReason) -> Self {
        Self {
            current_count: 0,
            warn_threshold: thresholds.warn,
            error_threshold: thresholds.error,
            skipped: true,
            skip_reason: Some(reason),
        }
    }
}

/// Errors raised by the quota guard.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum QuotaError {
    /// Raised when the repository count reaches the abort threshold.
    #[error(
        "ECR Public repository quota nearly exhausted: {current} of {hard_limit} repositories \
         exist (abort threshold {threshold}); run {script} to remove orphaned test repositories"
    )]
    Exceeded {
        /// Repositories counted.
        current: u64,
        /// Abort threshold that was reached.
        threshold: u64,
        /// Provider hard limit.
        hard_limit: u64,
        /// Remediation script to run.
        script: String,
    },
}

/// Decides whether a test may create another repository.
#[derive(Clone, Debug)]
pub struct QuotaGuard<A: RepositoryAdmin> {
    admin: A,
    region: String,
    thresholds: QuotaThresholds,
    signals: EnvironmentSignals,
    remediation_script: String,
}

impl<A: RepositoryAdmin> QuotaGuard<A> {
    /// Creates a guard with default thresholds.
    #[must_use]
    pub fn new(admin: A, region: impl Into<String>, signals: EnvironmentSignals) -> Self {
        Self {
            admin,
            region: region.into(),
            thresholds: QuotaThresholds::default(),
            signals,
            remediation_script: DEFAULT_REMEDIATION_SCRIPT.to_owned(),
        }
    }

    /// Creates a guard from loaded settings.
    #[must_use]
    pub fn from_settings(
        admin: A,
        settings: &FixtureSettings,
        signals: EnvironmentSignals,
    ) -> Self {
        Self::new(admin, settings.region.clone(), signals)
            .with_thresholds(QuotaThresholds::from_hard_limit(settings.quota_hard_limit))
            .with_remediation_script(settings.remediation_script.clone())
    }

    /// Overrides the thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: QuotaThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Overrides the script named in the abort message.
    #[must_use]
    pub fn with_remediation_script(mut self, script: impl Into<String>) -> Self {
        self.remediation_script = script.into();
        self
    }

    /// Thresholds in force.
    #[must_use]
    pub const fn thresholds(&self) -> QuotaThresholds {
        self.thresholds
    }

    /// Counts repositories and decides whether to proceed.
    ///
    /// Skip signals short-circuit without a remote call. A failed count is
    /// logged and treated as a skip.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Exceeded`] when the count reaches the abort
    /// threshold.
    pub fn check(&self) -> Result<QuotaSnapshot, QuotaError> {
        if self.signals.ci {
            info!("skipping ECR Public quota check in CI");
            return Ok(QuotaSnapshot::skipped(
                self.thresholds,
                SkipReason::CiEnvironment,
            ));
        }
        if self.signals.skip_quota_check {
            info!("skipping ECR Public quota check on request");
            return Ok(QuotaSnapshot::skipped(
                self.thresholds,
                SkipReason::ExplicitOverride,
            ));
        }

        let count = match self.admin.count_repositories(&self.region) {
            Ok(count) => u64::try_from(count).unwrap_or(u64::MAX),
            Err(err) => {
                warn!(
                    region = %self.region,
                    error = %err,
                    "could not read ECR Public repository count; proceeding without quota check"
                );
                return Ok(QuotaSnapshot::skipped(
                    self.thresholds,
                    SkipReason::QueryFailed {
                        message: err.to_string(),
                    },
                ));
            }
        };

        match self.thresholds.evaluate(count) {
            QuotaLevel::Exceeded => {
                error!(
                    region = %self.region,
                    current = count,
                    threshold = self.thresholds.error,
                    script = %self.remediation_script,
                    "ECR Public repository quota nearly exhausted"
                );
                return Err(QuotaError::Exceeded {
                    current: count,
                    threshold: self.thresholds.error,
                    hard_limit: self.thresholds.hard_limit,
                    script: self.remediation_script.clone(),
                });
            }
            QuotaLevel::Warning => warn!(
                region = %self.region,
                current = count,
                threshold = self.thresholds.warn,
                script = %self.remediation_script,
                "ECR Public repository count is high; consider running the cleanup script"
            ),
            QuotaLevel::Normal => info!(
                region = %self.region,
                current = count,
                "ECR Public repository count within limits"
            ),
        }

        Ok(QuotaSnapshot {
            current_count: count,
            warn_threshold: self.thresholds.warn,
            error_threshold: self.thresholds.error,
            skipped: false,
            skip_reason: None,
        })
    }
}
