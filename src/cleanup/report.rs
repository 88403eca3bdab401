//! Teardown results and the manual remediation report.

use std::fmt;

/// Terminal result of tearing down one fixture.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CleanupOutcome {
    /// `terraform destroy` removed the fixture.
    TerraformSucceeded,
    /// Destroy failed; the direct administrative delete succeeded (or found
    /// nothing left to delete).
    FallbackSucceeded,
    /// The first direct delete failed; the single retry succeeded.
    RetrySucceeded,
    /// Every tier failed; an operator must remove the repository.
    ManualRequired,
}

impl CleanupOutcome {
    /// Returns `true` unless the repository may still exist.
    #[must_use]
    pub const fn is_clean(self) -> bool {
        !matches!(self, Self::ManualRequired)
    }
}

/// Teardown tier that was attempted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CleanupTier {
    /// Declarative destroy.
    Destroy,
    /// First direct administrative delete.
    Fallback,
    /// Direct delete repeated after the backoff.
    Retry,
}

/// One tier attempt and its error, if it failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupAttempt {
    /// Tier attempted.
    pub tier: CleanupTier,
    /// Error message when the tier failed.
    pub error: Option<String>,
}

/// Everything a caller needs to know about a teardown.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupReport {
    /// Terminal outcome.
    pub outcome: CleanupOutcome,
    /// Tier attempts in the order they ran.
    pub attempts: Vec<CleanupAttempt>,
    /// Remediation instructions, present only for
    /// [`CleanupOutcome::ManualRequired`].
    pub remediation: Option<RemediationReport>,
}

/// Instructions for deleting an orphaned repository by hand.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemediationReport {
    /// Orphaned repository.
    pub repository: String,
    /// Region hosting the repository.
    pub region: String,
    /// Exact command that force-deletes the repository.
    pub delete_command: String,
    /// Command that checks whether the repository still exists.
    pub describe_command: String,
    /// Sweep script that removes orphaned test repositories.
    pub script: String,
    /// Console page listing repositories in the region.
    pub console_url: String,
}

impl RemediationReport {
    /// Console page listing ECR repositories in `region`.
    #[must_use]
    pub fn console_url_for(region: &str) -> String {
        format!("https://console.aws.amazon.com/ecr/repositories?region={region}")
    }
}

impl fmt::Display for RemediationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== MANUAL CLEANUP REQUIRED ===")?;
        writeln!(f, "Repository: {}", self.repository)?;
        writeln!(f, "Region: {}", self.region)?;
        writeln!(f, "Delete it with:")?;
        writeln!(f, "  {}", self.delete_command)?;
        writeln!(f, "Alternatives:")?;
        writeln!(f, "  1. Run the cleanup script: {}", self.script)?;
        writeln!(f, "  2. Use the AWS console: {}", self.console_url)?;
        writeln!(f, "  3. Check whether it still exists: {}", self.describe_command)?;
        write!(f, "===============================")
    }
}
