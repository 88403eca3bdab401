//! Fixture creation and scoped teardown.
//!
//! [`FixtureLauncher::prepare`] validates the name and checks the quota before
//! anything remote happens, yielding a [`PreparedFixture`]. Only a prepared
//! fixture can be passed to [`FixtureLauncher::launch`], which applies the module and
//! returns a [`Fixture`] guard whose teardown runs exactly once, either when
//! [`Fixture::teardown`] is called or when the guard is dropped, including
//! while unwinding from a failed assertion.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::cleanup::{CleanupOrchestrator, CleanupReport};
use crate::command::ProcessCommandRunner;
use crate::config::{EnvironmentSignals, FixtureSettings};
use crate::identifier::{RepositoryName, ValidationError};
use crate::quota::{QuotaError, QuotaGuard, QuotaSnapshot};
use crate::registry::{AwsEcrPublic, RepositoryAdmin};
use crate::terraform::{ProvisionError, Provisioner, Terraform, TerraformOptions};

mod configuration;

pub use configuration::{
    CATALOG_DATA_VAR, CatalogData, ConfigurationError, FLAT_CATALOG_PREFIX, FixtureConfiguration,
    FixtureConfigurationBuilder, REPOSITORY_NAME_VAR, test_tags,
};

/// Environment variable carrying the region into every `terraform` call.
pub const REGION_ENV: &str = "AWS_DEFAULT_REGION";

/// A created (or partially created) fixture.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FixtureHandle {
    identifier: RepositoryName,
    region: String,
    outputs: BTreeMap<String, String>,
    options: TerraformOptions,
}

impl FixtureHandle {
    /// Describes a fixture; `outputs` are frozen from here on.
    #[must_use]
    pub const fn new(
        identifier: RepositoryName,
        region: String,
        outputs: BTreeMap<String, String>,
        options: TerraformOptions,
    ) -> Self {
        Self {
            identifier,
            region,
            outputs,
            options,
        }
    }

    /// Repository name.
    #[must_use]
    pub const fn identifier(&self) -> &RepositoryName {
        &self.identifier
    }

    /// Region hosting the repository.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Outputs reported by the module after apply.
    #[must_use]
    pub const fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    /// Module inputs, reused verbatim for destroy.
    #[must_use]
    pub const fn options(&self) -> &TerraformOptions {
        &self.options
    }
}

/// Errors raised while creating a fixture.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The repository name was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The account is too close to its repository quota.
    #[error(transparent)]
    Quota(#[from] QuotaError),
    /// The fixture configuration is malformed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// `terraform apply` failed; cleanup has already run.
    #[error("failed to apply fixture: {source}")]
    Apply {
        /// Engine error.
        source: ProvisionError,
        /// Result of the defensive teardown.
        cleanup: Box<CleanupReport>,
    },
}

/// A validated name whose quota check has run. Produced by
/// [`FixtureLauncher::prepare`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreparedFixture {
    name: RepositoryName,
    snapshot: QuotaSnapshot,
}

impl PreparedFixture {
    /// Repository name that will be created.
    #[must_use]
    pub const fn name(&self) -> &RepositoryName {
        &self.name
    }

    /// Quota observed during preparation.
    #[must_use]
    pub const fn snapshot(&self) -> &QuotaSnapshot {
        &self.snapshot
    }
}

/// Validates names, guards the quota and applies fixtures.
#[derive(Debug)]
pub struct FixtureLauncher<P: Provisioner, A: RepositoryAdmin> {
    orchestrator: CleanupOrchestrator<P, A>,
    quota: QuotaGuard<A>,
    region: String,
}

impl FixtureLauncher<Terraform<ProcessCommandRunner>, AwsEcrPublic<ProcessCommandRunner>> {
    /// Creates a launcher that shells out to the configured `terraform` and
    /// `aws` binaries.
    #[must_use]
    pub fn with_process_runner(settings: &FixtureSettings, signals: EnvironmentSignals) -> Self {
        let provisioner = Terraform::new(settings.terraform_bin.as_str(), ProcessCommandRunner);
        let admin = AwsEcrPublic::new(settings.aws_bin.as_str(), ProcessCommandRunner);
        Self::from_settings(provisioner, admin, settings, signals)
    }
}

impl<P: Provisioner, A: RepositoryAdmin> FixtureLauncher<P, A> {
    /// Creates a launcher from its collaborators.
    #[must_use]
    pub fn new(
        orchestrator: CleanupOrchestrator<P, A>,
        quota: QuotaGuard<A>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            quota,
            region: region.into(),
        }
    }

    /// Wires a launcher from loaded settings.
    #[must_use]
    pub fn from_settings(
        provisioner: P,
        admin: A,
        settings: &FixtureSettings,
        signals: EnvironmentSignals,
    ) -> Self
    where
        A: Clone,
    {
        Self::new(
            CleanupOrchestrator::from_settings(provisioner, admin.clone(), settings, signals),
            QuotaGuard::from_settings(admin, settings, signals),
            settings.region.clone(),
        )
    }

    /// Orchestrator used for teardown.
    #[must_use]
    pub const fn orchestrator(&self) -> &CleanupOrchestrator<P, A> {
        &self.orchestrator
    }

    /// Validates `candidate` and checks the quota. Nothing is created.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Validation`] for a malformed name and
    /// [`LaunchError::Quota`] when the quota is nearly exhausted.
    pub fn prepare(&self, candidate: &str) -> Result<PreparedFixture, LaunchError> {
        let name = RepositoryName::parse(candidate)?;
        let snapshot = self.quota.check()?;
        Ok(PreparedFixture { name, snapshot })
    }

    /// Applies the module in `module_dir` for the prepared repository.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Configuration`] when the configuration cannot
    /// be rendered and [`LaunchError::Apply`] when `terraform` fails. In the
    /// latter case teardown has already run and its report is attached.
    pub fn launch(
        &self,
        prepared: &PreparedFixture,
        config: &FixtureConfiguration,
        module_dir: impl Into<Utf8PathBuf>,
    ) -> Result<Fixture<'_, P, A>, LaunchError> {
        let name = &prepared.name;
        let options = TerraformOptions {
            dir: module_dir.into(),
            vars: config.to_vars(name)?,
            env: BTreeMap::from([(REGION_ENV.to_owned(), self.region.clone())]),
        };

        info!(repository = %name, region = %self.region, dir = %options.dir, "applying fixture");
        match self.orchestrator.provisioner().apply(&options) {
            Ok(outputs) => Ok(Fixture {
                handle: FixtureHandle::new(name.clone(), self.region.clone(), outputs, options),
                orchestrator: &self.orchestrator,
                torn_down: false,
            }),
            Err(source) => {
                error!(repository = %name, error = %source, "fixture apply failed; cleaning up");
                let handle =
                    FixtureHandle::new(name.clone(), self.region.clone(), BTreeMap::new(), options);
                let cleanup = self.orchestrator.teardown(&handle);
                Err(LaunchError::Apply {
                    source,
                    cleanup: Box::new(cleanup),
                })
            }
        }
    }
}

/// A live fixture. Teardown runs once, on [`Fixture::teardown`] or on drop.
#[derive(Debug)]
pub struct Fixture<'a, P: Provisioner, A: RepositoryAdmin> {
    handle: FixtureHandle,
    orchestrator: &'a CleanupOrchestrator<P, A>,
    torn_down: bool,
}

impl<P: Provisioner, A: RepositoryAdmin> Fixture<'_, P, A> {
    /// Handle describing the fixture.
    #[must_use]
    pub const fn handle(&self) -> &FixtureHandle {
        &self.handle
    }

    /// Looks up a module output.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&str> {
        self.handle.outputs.get(name).map(String::as_str)
    }

    /// Tears the fixture down now and returns the report.
    #[must_use]
    pub fn teardown(mut self) -> CleanupReport {
        self.run_teardown()
    }

    fn run_teardown(&mut self) -> CleanupReport {
        self.torn_down = true;
        self.orchestrator.teardown(&self.handle)
    }
}

impl<P: Provisioner, A: RepositoryAdmin> Drop for Fixture<'_, P, A> {
    fn drop(&mut self) {
        if !self.torn_down {
            let report = self.run_teardown();
            info!(
                repository = %self.handle.identifier,
                outcome = ?report.outcome,
                "fixture torn down on drop"
            );
        }
    }
}
