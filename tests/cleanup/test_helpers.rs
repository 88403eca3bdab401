//! Shared fixtures and helpers for teardown BDD scenarios.

use std::time::Duration;

use ecrpub_fixtures::cleanup::{CleanupOrchestrator, CleanupOutcome, CleanupReport};
use ecrpub_fixtures::test_support::{ScriptedAdmin, ScriptedProvisioner};
use ecrpub_fixtures::{EnvironmentSignals, RepositoryName, RetryPolicy};
use rstest::fixture;

/// Terraform module directory used by launcher scenarios.
pub const MODULE_DIR: &str = "modules/ecr-public";

#[derive(Clone, Debug)]
pub struct CleanupContext {
    pub name: Option<RepositoryName>,
    pub provisioner: ScriptedProvisioner,
    pub admin: ScriptedAdmin,
    pub signals: EnvironmentSignals,
    pub report: Option<CleanupReport>,
    pub launch_error: Option<String>,
}

impl CleanupContext {
    pub fn orchestrator(&self) -> CleanupOrchestrator<ScriptedProvisioner, ScriptedAdmin> {
        CleanupOrchestrator::new(
            self.provisioner.clone(),
            self.admin.clone(),
            RetryPolicy::single_retry(Duration::ZERO),
            self.signals,
        )
    }

    pub fn name(&self) -> RepositoryName {
        self.name
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a fixture name"))
    }
}

#[fixture]
pub fn cleanup_context() -> CleanupContext {
    CleanupContext {
        name: None,
        provisioner: ScriptedProvisioner::new(),
        admin: ScriptedAdmin::new(),
        signals: EnvironmentSignals::default(),
        report: None,
        launch_error: None,
    }
}

pub fn parse_outcome(label: &str) -> CleanupOutcome {
    match label {
        "TerraformSucceeded" => CleanupOutcome::TerraformSucceeded,
        "FallbackSucceeded" => CleanupOutcome::FallbackSucceeded,
        "RetrySucceeded" => CleanupOutcome::RetrySucceeded,
        "ManualRequired" => CleanupOutcome::ManualRequired,
        other => panic!("unknown cleanup outcome {other}"),
    }
}
