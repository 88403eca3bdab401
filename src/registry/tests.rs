//! Unit tests for the ECR Public adapter.

use super::*;
use crate::test_support::{CommandInvocation, ScriptedRunner, json_repositories};
use rstest::{fixture, rstest};

const REGION: &str = "us-east-1";

#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

#[rstest]
fn describe_reports_existing_repository(runner: ScriptedRunner) {
    runner.push_output(Some(0), json_repositories(&["terratest-abc123"]), "");
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner.clone());

    let presence = admin
        .describe("terratest-abc123", REGION)
        .expect("describe should succeed");

    assert_eq!(presence, Presence::Exists);
    let calls = runner.invocations();
    assert_eq!(
        calls.first().map(CommandInvocation::command_string).as_deref(),
        Some(
            "aws ecr-public describe-repositories --repository-names terratest-abc123 \
             --region us-east-1 --output json"
        )
    );
}

#[rstest]
fn describe_treats_not_found_as_absent(runner: ScriptedRunner) {
    runner.push_output(
        Some(254),
        "",
        "An error occurred (RepositoryNotFoundException) when calling the \
         DescribeRepositories operation",
    );
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner);

    let presence = admin
        .describe("terratest-gone", REGION)
        .expect("not found is not an error");

    assert_eq!(presence, Presence::Absent);
}

#[rstest]
fn describe_surfaces_other_failures(runner: ScriptedRunner) {
    runner.push_output(Some(255), "", "Unable to locate credentials");
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner);

    let err = admin
        .describe("terratest-abc123", REGION)
        .expect_err("credential errors must not look like absence");

    assert!(
        matches!(err, AdminError::CommandFailure { status: Some(255), ref stderr, .. }
            if stderr.contains("credentials")),
        "unexpected error: {err}"
    );
}

#[rstest]
#[case(true, true)]
#[case(false, false)]
fn delete_passes_force_flag_only_when_requested(
    runner: ScriptedRunner,
    #[case] force: bool,
    #[case] expect_flag: bool,
) {
    runner.push_success();
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner.clone());

    admin
        .delete("terratest-abc123", REGION, force)
        .expect("delete should succeed");

    let calls = runner.invocations();
    let call = calls.first().expect("one invocation");
    assert!(call.has_arg("delete-repository"));
    assert_eq!(call.has_arg("--force"), expect_flag);
}

#[rstest]
fn delete_of_missing_repository_succeeds(runner: ScriptedRunner) {
    runner.push_output(Some(254), "", "RepositoryNotFoundException");
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner);

    assert!(admin.delete("terratest-gone", REGION, true).is_ok());
}

#[rstest]
fn delete_reports_failures(runner: ScriptedRunner) {
    runner.push_output(Some(255), "", "AccessDeniedException");
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner);

    let err = admin
        .delete("terratest-abc123", REGION, true)
        .expect_err("delete should fail");

    assert!(matches!(
        err,
        AdminError::CommandFailure { ref action, .. } if action == "delete-repository"
    ));
}

#[rstest]
fn lists_and_counts_repositories(runner: ScriptedRunner) {
    runner.push_output(Some(0), json_repositories(&["a", "b", "c"]), "");
    runner.push_output(Some(0), json_repositories(&["a", "b", "c"]), "");
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner.clone());

    let repos = admin.list_repositories(REGION).expect("list");
    let names: Vec<&str> = repos
        .iter()
        .map(|repo| repo.repository_name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(admin.count_repositories(REGION).expect("count"), 3);

    let calls = runner.invocations();
    assert!(calls.iter().all(|call| !call.has_arg("--repository-names")));
}

#[rstest]
#[case("not json", "expected")]
#[case("[]", "unexpected JSON shape")]
#[case("{}", "missing 'repositories' field")]
#[case("{\"repositories\":[{\"repositoryUri\":\"x\"}]}", "repositoryName")]
fn list_rejects_malformed_output(
    runner: ScriptedRunner,
    #[case] stdout: &str,
    #[case] fragment: &str,
) {
    runner.push_output(Some(0), stdout, "");
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner);

    let err = admin
        .list_repositories(REGION)
        .expect_err("parse should fail");

    assert!(
        matches!(err, AdminError::Parse { ref message, .. } if message.contains(fragment)),
        "unexpected error: {err}"
    );
}

#[rstest]
fn list_reports_command_failures(runner: ScriptedRunner) {
    runner.push_failure(255);
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner);

    assert!(matches!(
        admin.count_repositories(REGION),
        Err(AdminError::CommandFailure { .. })
    ));
}

#[rstest]
fn spawn_failures_are_propagated(runner: ScriptedRunner) {
    let admin = AwsEcrPublic::new(DEFAULT_AWS_BIN, runner);

    assert!(matches!(
        admin.describe("terratest-abc123", REGION),
        Err(AdminError::Runner(CommandError::Spawn { .. }))
    ));
}

#[rstest]
fn renders_copy_pasteable_commands() {
    let admin = AwsEcrPublic::new("/opt/aws cli/aws", ScriptedRunner::new());

    assert_eq!(
        admin.delete_command("terratest-abc123", REGION),
        "'/opt/aws cli/aws' ecr-public delete-repository --repository-name terratest-abc123 \
         --region us-east-1 --force"
    );
    assert!(
        admin
            .describe_command("terratest-abc123", REGION)
            .contains("describe-repositories --repository-names terratest-abc123")
    );
}
