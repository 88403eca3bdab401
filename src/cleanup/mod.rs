//! Tiered teardown for fixtures.
//!
//! Teardown walks a fixed ladder: `terraform destroy`, then a direct
//! administrative delete, then that delete once more after a backoff, and
//! finally a manual remediation report. Every failure along the way is
//! absorbed; [`CleanupOrchestrator::teardown`] always returns a
//! [`CleanupReport`].

use tracing::{error, info, warn};

use crate::config::{DEFAULT_REMEDIATION_SCRIPT, EnvironmentSignals, FixtureSettings};
use crate::launcher::FixtureHandle;
use crate::registry::{AdminError, Presence, RepositoryAdmin};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::terraform::Provisioner;

mod report;

pub use report::{
    CleanupAttempt, CleanupOutcome, CleanupReport, CleanupTier, RemediationReport,
};

/// Runs the teardown ladder for fixtures.
#[derive(Clone, Debug)]
pub struct CleanupOrchestrator<P: Provisioner, A: RepositoryAdmin> {
    provisioner: P,
    admin: A,
    policy: RetryPolicy,
    signals: EnvironmentSignals,
    remediation_script: String,
}

impl<P: Provisioner, A: RepositoryAdmin> CleanupOrchestrator<P, A> {
    /// Creates an orchestrator. `policy` bounds the direct-delete tier;
    /// [`RetryPolicy::single_retry`] gives one fallback plus one retry.
    #[must_use]
    pub fn new(
        provisioner: P,
        admin: A,
        policy: RetryPolicy,
        signals: EnvironmentSignals,
    ) -> Self {
        Self {
            provisioner,
            admin,
            policy,
            signals,
            remediation_script: DEFAULT_REMEDIATION_SCRIPT.to_owned(),
        }
    }

    /// Creates an orchestrator using the backoff and script from `settings`.
    #[must_use]
    pub fn from_settings(
        provisioner: P,
        admin: A,
        settings: &FixtureSettings,
        signals: EnvironmentSignals,
    ) -> Self {
        Self::new(
            provisioner,
            admin,
            RetryPolicy::single_retry(settings.cleanup_retry_delay()),
            signals,
        )
        .with_remediation_script(settings.remediation_script.clone())
    }

    /// Overrides the script named in remediation reports.
    #[must_use]
    pub fn with_remediation_script(mut self, script: impl Into<String>) -> Self {
        self.remediation_script = script.into();
        self
    }

    /// Declarative engine used for the first tier.
    #[must_use]
    pub const fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Removes the fixture described by `handle`.
    #[must_use]
    pub fn teardown(&self, handle: &FixtureHandle) -> CleanupReport {
        let repository = handle.identifier().as_str();
        let region = handle.region();
        let mut attempts = Vec::new();

        info!(repository, region, "destroying fixture with terraform");
        match self.provisioner.destroy(handle.options()) {
            Ok(()) => {
                info!(repository, region, "terraform destroy succeeded");
                attempts.push(CleanupAttempt {
                    tier: CleanupTier::Destroy,
                    error: None,
                });
                return CleanupReport {
                    outcome: CleanupOutcome::TerraformSucceeded,
                    attempts,
                    remediation: None,
                };
            }
            Err(err) => {
                warn!(repository, region, error = %err, "terraform destroy failed");
                attempts.push(CleanupAttempt {
                    tier: CleanupTier::Destroy,
                    error: Some(err.to_string()),
                });
            }
        }

        if self.signals.ci {
            warn!(
                repository,
                region,
                "direct cleanup is disabled in CI; skipping administrative delete"
            );
            return self.manual_required(handle, attempts);
        }

        let outcome = self.policy.run(|attempt| {
            let tier = if attempt > 1 {
                warn!(
                    repository,
                    region,
                    delay_secs = self.policy.delay().as_secs(),
                    "retrying direct delete after backoff"
                );
                CleanupTier::Retry
            } else {
                info!(repository, region, "attempting direct delete");
                CleanupTier::Fallback
            };
            let result = self.delete_directly(repository, region);
            attempts.push(CleanupAttempt {
                tier,
                error: result.as_ref().err().map(ToString::to_string),
            });
            if let Err(err) = &result {
                warn!(repository, region, attempt, error = %err, "direct delete failed");
            }
            result
        });

        match outcome {
            RetryOutcome::Succeeded { attempt: 1, .. } => {
                info!(repository, region, "direct delete succeeded");
                CleanupReport {
                    outcome: CleanupOutcome::FallbackSucceeded,
                    attempts,
                    remediation: None,
                }
            }
            RetryOutcome::Succeeded { .. } => {
                info!(repository, region, "direct delete succeeded on retry");
                CleanupReport {
                    outcome: CleanupOutcome::RetrySucceeded,
                    attempts,
                    remediation: None,
                }
            }
            RetryOutcome::Exhausted { .. } => self.manual_required(handle, attempts),
        }
    }

    fn delete_directly(&self, repository: &str, region: &str) -> Result<(), AdminError> {
        match self.admin.describe(repository, region)? {
            Presence::Absent => {
                info!(repository, region, "repository already absent");
                Ok(())
            }
            Presence::Exists => self.admin.delete(repository, region, true),
        }
    }

    fn manual_required(
        &self,
        handle: &FixtureHandle,
        attempts: Vec<CleanupAttempt>,
    ) -> CleanupReport {
        let repository = handle.identifier().as_str();
        let region = handle.region();
        let remediation = RemediationReport {
            repository: repository.to_owned(),
            region: region.to_owned(),
            delete_command: self.admin.delete_command(repository, region),
            describe_command: self.admin.describe_command(repository, region),
            script: self.remediation_script.clone(),
            console_url: RemediationReport::console_url_for(region),
        };
        error!(
            repository,
            region,
            delete_command = %remediation.delete_command,
            "failed to clean up fixture\n{remediation}"
        );
        CleanupReport {
            outcome: CleanupOutcome::ManualRequired,
            attempts,
            remediation: Some(remediation),
        }
    }
}
