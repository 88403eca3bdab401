//! Command-line interface definitions for the `ecrpub-janitor` binary.
//!
//! This module centralises the clap parser structures so both the binary and
//! the build script can reuse them when generating the manual page. It is
//! compiled standalone by `build.rs`, so defaults are spelled out here.

use clap::Parser;

/// Deletes orphaned ECR Public test repositories.
#[derive(Debug, Parser)]
#[command(
    name = "ecrpub-janitor",
    about = "Delete orphaned ECR Public test repositories by name prefix"
)]
pub(crate) struct Cli {
    /// Region to sweep. ECR Public only exists in us-east-1.
    #[arg(long, env = "ECRPUB_FIXTURE_REGION", default_value = "us-east-1")]
    pub(crate) region: String,
    /// Delete repositories whose names start with this prefix.
    #[arg(long, default_value = "terratest-")]
    pub(crate) prefix: String,
    /// Path to the AWS CLI binary.
    #[arg(long, env = "ECRPUB_FIXTURE_AWS_BIN", default_value = "aws")]
    pub(crate) aws_bin: String,
    /// List matching repositories without deleting them.
    #[arg(long)]
    pub(crate) dry_run: bool,
}
