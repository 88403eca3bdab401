//! BDD scenarios for fixture teardown.

use rstest_bdd_macros::scenario;

use super::test_helpers::{CleanupContext, cleanup_context};

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Declarative destroy removes the fixture"
)]
fn scenario_destroy_succeeds(cleanup_context: CleanupContext) {
    drop(cleanup_context);
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Direct cleanup finds the repository already gone"
)]
fn scenario_repository_already_gone(cleanup_context: CleanupContext) {
    drop(cleanup_context);
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Retry recovers from a transient delete failure"
)]
fn scenario_retry_recovers(cleanup_context: CleanupContext) {
    drop(cleanup_context);
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Exhausted tiers require manual cleanup"
)]
fn scenario_manual_required(cleanup_context: CleanupContext) {
    drop(cleanup_context);
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "CI disables direct cleanup"
)]
fn scenario_ci_disables_direct_cleanup(cleanup_context: CleanupContext) {
    drop(cleanup_context);
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Failed apply still triggers cleanup"
)]
fn scenario_failed_apply_cleans_up(cleanup_context: CleanupContext) {
    drop(cleanup_context);
}
