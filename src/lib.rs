//! Lifecycle management for ephemeral ECR Public test fixtures.
//!
//! The crate validates repository names, guards the account's repository
//! quota, applies Terraform modules to create fixtures, and guarantees their
//! removal through a tiered teardown (declarative destroy, direct delete,
//! one bounded retry, then a manual remediation report).

pub mod cleanup;
pub mod command;
pub mod config;
pub mod identifier;
pub mod janitor;
pub mod launcher;
pub mod quota;
pub mod registry;
pub mod retry;
pub mod terraform;
pub mod test_data;
pub mod test_support;

pub use cleanup::{CleanupOrchestrator, CleanupOutcome, CleanupReport, RemediationReport};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, EnvironmentSignals, FixtureSettings};
pub use identifier::{RepositoryName, ValidationError, validate};
pub use janitor::{DEFAULT_TEST_PREFIX, Janitor, JanitorConfig, JanitorError, SweepSummary};
pub use launcher::{
    CatalogData, ConfigurationError, Fixture, FixtureConfiguration, FixtureHandle,
    FixtureLauncher, LaunchError, PreparedFixture, test_tags,
};
pub use quota::{QuotaError, QuotaGuard, QuotaLevel, QuotaSnapshot, QuotaThresholds, SkipReason};
pub use registry::{AdminError, AwsEcrPublic, Presence, RepositoryAdmin, RepositorySummary};
pub use retry::{RetryOutcome, RetryPolicy};
pub use terraform::{ProvisionError, Provisioner, Terraform, TerraformOptions, VarValue};
pub use test_data::{TestDataError, TestDataLoader};
