//! BDD step definitions for fixture teardown.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use ecrpub_fixtures::terraform::TerraformOptions;
use ecrpub_fixtures::{
    FixtureConfiguration, FixtureHandle, FixtureLauncher, LaunchError, Presence, QuotaGuard,
    RepositoryName,
};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{CleanupContext, MODULE_DIR, parse_outcome};
use crate::test_constants::REGION;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a fixture named \"{name}\"")]
fn fixture_named(mut cleanup_context: CleanupContext, name: String) -> CleanupContext {
    let parsed = RepositoryName::parse(name)
        .unwrap_or_else(|err| panic!("scenario fixture name must be valid: {err}"));
    cleanup_context.name = Some(parsed);
    cleanup_context
}

#[given("terraform destroy succeeds")]
fn destroy_succeeds(cleanup_context: CleanupContext) -> CleanupContext {
    cleanup_context.provisioner.push_destroy_success();
    cleanup_context
}

#[given("terraform destroy fails")]
fn destroy_fails(cleanup_context: CleanupContext) -> CleanupContext {
    cleanup_context
        .provisioner
        .push_destroy_failure("Error: deleting ECR Public Repository: RequestError");
    cleanup_context
}

#[given("terraform apply fails")]
fn apply_fails(cleanup_context: CleanupContext) -> CleanupContext {
    cleanup_context
        .provisioner
        .push_apply_failure("Error: creating ECR Public Repository: InvalidParameterException");
    cleanup_context
}

#[given("the repository is already absent")]
fn repository_absent(cleanup_context: CleanupContext) -> CleanupContext {
    cleanup_context.admin.push_describe(Presence::Absent);
    cleanup_context
}

#[given("the first direct delete fails")]
fn first_delete_fails(cleanup_context: CleanupContext) -> CleanupContext {
    cleanup_context.admin.push_describe(Presence::Exists);
    cleanup_context
        .admin
        .push_delete_failure("RepositoryNotEmptyException");
    cleanup_context
}

#[given("the retried direct delete succeeds")]
fn retried_delete_succeeds(cleanup_context: CleanupContext) -> CleanupContext {
    cleanup_context.admin.push_describe(Presence::Exists);
    cleanup_context.admin.push_delete_success();
    cleanup_context
}

#[given("every direct delete fails")]
fn every_delete_fails(cleanup_context: CleanupContext) -> CleanupContext {
    for _ in 0..2 {
        cleanup_context.admin.push_describe(Presence::Exists);
        cleanup_context.admin.push_delete_failure("AccessDeniedException");
    }
    cleanup_context
}

#[given("the suite runs in CI")]
fn suite_runs_in_ci(mut cleanup_context: CleanupContext) -> CleanupContext {
    cleanup_context.signals.ci = true;
    cleanup_context
}

#[when("the fixture is torn down")]
fn fixture_torn_down(mut cleanup_context: CleanupContext) -> CleanupContext {
    let handle = FixtureHandle::new(
        cleanup_context.name(),
        REGION.to_owned(),
        BTreeMap::new(),
        TerraformOptions {
            dir: Utf8PathBuf::from(MODULE_DIR),
            ..TerraformOptions::default()
        },
    );
    let report = cleanup_context.orchestrator().teardown(&handle);
    cleanup_context.report = Some(report);
    cleanup_context
}

#[when("the fixture is launched")]
fn fixture_launched(mut cleanup_context: CleanupContext) -> CleanupContext {
    let name = cleanup_context.name();
    let launcher = FixtureLauncher::new(
        cleanup_context.orchestrator(),
        QuotaGuard::new(
            cleanup_context.admin.clone(),
            REGION,
            cleanup_context.signals,
        ),
        REGION,
    );
    cleanup_context.admin.push_list(&[]);
    let prepared = launcher
        .prepare(name.as_str())
        .unwrap_or_else(|err| panic!("scenario fixture should pass pre-flight: {err}"));
    let config = FixtureConfiguration::minimal_flat(prepared.name());
    match launcher.launch(&prepared, &config, MODULE_DIR) {
        Ok(fixture) => {
            cleanup_context.report = Some(fixture.teardown());
        }
        Err(LaunchError::Apply { source, cleanup }) => {
            cleanup_context.launch_error = Some(source.to_string());
            cleanup_context.report = Some(*cleanup);
        }
        Err(other) => panic!("unexpected launch error: {other}"),
    }
    cleanup_context
}

#[then("the cleanup outcome is \"{outcome}\"")]
fn cleanup_outcome(cleanup_context: &CleanupContext, outcome: String) -> Result<(), StepError> {
    let expected = parse_outcome(&outcome);
    let report = cleanup_context
        .report
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing cleanup report")))?;
    if report.outcome == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected outcome {expected:?}, got {:?}",
            report.outcome
        )))
    }
}

#[then("no direct delete is issued")]
fn no_direct_delete(cleanup_context: &CleanupContext) -> Result<(), StepError> {
    match cleanup_context.admin.delete_calls() {
        0 => Ok(()),
        count => Err(StepError::Assertion(format!(
            "expected no delete calls, got {count}"
        ))),
    }
}

#[then("{count:usize} direct deletes are issued")]
fn direct_deletes_issued(cleanup_context: &CleanupContext, count: usize) -> Result<(), StepError> {
    let actual = cleanup_context.admin.delete_calls();
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} delete calls, got {actual}"
        )))
    }
}

#[then("no administrative call is made")]
fn no_admin_calls(cleanup_context: &CleanupContext) -> Result<(), StepError> {
    let calls = cleanup_context.admin.calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no administrative calls, got {calls:?}"
        )))
    }
}

#[then("the remediation report names the repository and region")]
fn remediation_names_repository(cleanup_context: &CleanupContext) -> Result<(), StepError> {
    let rendered = rendered_remediation(cleanup_context)?;
    let name = cleanup_context.name();
    if rendered.contains(name.as_str()) && rendered.contains(REGION) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "remediation report should name {name} in {REGION}: {rendered}"
        )))
    }
}

#[then("the remediation report contains the delete command")]
fn remediation_contains_delete(cleanup_context: &CleanupContext) -> Result<(), StepError> {
    let rendered = rendered_remediation(cleanup_context)?;
    let expected = format!(
        "aws ecr-public delete-repository --repository-name {} --region {REGION} --force",
        cleanup_context.name()
    );
    if rendered.contains(&expected) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected `{expected}` in remediation report: {rendered}"
        )))
    }
}

#[then("the launch fails with an apply error")]
fn launch_fails_with_apply_error(cleanup_context: &CleanupContext) -> Result<(), StepError> {
    let message = cleanup_context
        .launch_error
        .as_deref()
        .ok_or_else(|| StepError::Assertion(String::from("expected an apply error")))?;
    if message.contains("InvalidParameterException") {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "apply error should carry terraform stderr, got: {message}"
        )))
    }
}

fn rendered_remediation(cleanup_context: &CleanupContext) -> Result<String, StepError> {
    cleanup_context
        .report
        .as_ref()
        .and_then(|report| report.remediation.as_ref())
        .map(ToString::to_string)
        .ok_or_else(|| StepError::Assertion(String::from("missing remediation report")))
}
