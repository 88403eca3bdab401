//! Direct administrative access to ECR Public through the `aws` CLI.
//!
//! This is the path used when declarative teardown fails, and by the quota
//! guard and janitor to count or list repositories.

use std::ffi::OsString;

use serde::Deserialize;
use thiserror::Error;

use crate::command::{CommandError, CommandOutput, CommandRunner, render_command_line};

mod types;

pub use types::RepositorySummary;
use types::DescribeRepositoriesResponse;

/// Default `aws` CLI binary name.
pub const DEFAULT_AWS_BIN: &str = "aws";

const NOT_FOUND_MARKER: &str = "RepositoryNotFoundException";

/// Whether a repository currently exists.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Presence {
    /// The repository is visible to the administrative API.
    Exists,
    /// The repository does not exist (or is already deleted).
    Absent,
}

/// Errors raised by the administrative API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AdminError {
    /// Raised when the CLI exits with a non-zero status.
    #[error("{program} exited with status {status_text} during {action}: {stderr}")]
    CommandFailure {
        /// Program that failed (typically `aws`).
        program: String,
        /// Operation being attempted (for example `delete-repository`).
        action: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when JSON output from the CLI cannot be parsed.
    #[error("failed to parse {resource} output: {message}")]
    Parse {
        /// Resource type being parsed.
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when command execution fails.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Administrative operations on public repositories.
pub trait RepositoryAdmin {
    /// Reports whether `name` exists in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] when existence cannot be determined.
    fn describe(&self, name: &str, region: &str) -> Result<Presence, AdminError>;

    /// Deletes `name` in `region`; `force` also removes any images.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] when the delete call fails.
    fn delete(&self, name: &str, region: &str, force: bool) -> Result<(), AdminError>;

    /// Lists every repository in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] when listing or parsing fails.
    fn list_repositories(&self, region: &str) -> Result<Vec<RepositorySummary>, AdminError>;

    /// Counts repositories in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] when listing or parsing fails.
    fn count_repositories(&self, region: &str) -> Result<usize, AdminError> {
        self.list_repositories(region).map(|repos| repos.len())
    }

    /// Renders the exact shell command that force-deletes `name`.
    fn delete_command(&self, name: &str, region: &str) -> String;

    /// Renders the shell command that checks whether `name` exists.
    fn describe_command(&self, name: &str, region: &str) -> String;
}

/// [`RepositoryAdmin`] backed by `aws ecr-public`.
#[derive(Clone, Debug)]
pub struct AwsEcrPublic<R: CommandRunner> {
    aws_bin: String,
    runner: R,
}

impl<R: CommandRunner> AwsEcrPublic<R> {
    /// Creates an adapter that invokes `aws_bin` through `runner`.
    #[must_use]
    pub fn new(aws_bin: impl Into<String>, runner: R) -> Self {
        Self {
            aws_bin: aws_bin.into(),
            runner,
        }
    }

    fn describe_args(name: &str, region: &str) -> Vec<OsString> {
        vec![
            OsString::from("ecr-public"),
            OsString::from("describe-repositories"),
            OsString::from("--repository-names"),
            OsString::from(name),
            OsString::from("--region"),
            OsString::from(region),
            OsString::from("--output"),
            OsString::from("json"),
        ]
    }

    fn delete_args(name: &str, region: &str, force: bool) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("ecr-public"),
            OsString::from("delete-repository"),
            OsString::from("--repository-name"),
            OsString::from(name),
            OsString::from("--region"),
            OsString::from(region),
        ];
        if force {
            args.push(OsString::from("--force"));
        }
        args
    }

    fn failure(&self, action: &str, output: CommandOutput) -> AdminError {
        AdminError::CommandFailure {
            program: self.aws_bin.clone(),
            action: action.to_owned(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr,
        }
    }
}

impl<R: CommandRunner> RepositoryAdmin for AwsEcrPublic<R> {
    fn describe(&self, name: &str, region: &str) -> Result<Presence, AdminError> {
        let output = self
            .runner
            .run(&self.aws_bin, &Self::describe_args(name, region))?;
        if output.is_success() {
            return Ok(Presence::Exists);
        }
        if output.stderr.contains(NOT_FOUND_MARKER) {
            return Ok(Presence::Absent);
        }
        Err(self.failure("describe-repositories", output))
    }

    fn delete(&self, name: &str, region: &str, force: bool) -> Result<(), AdminError> {
        let output = self
            .runner
            .run(&self.aws_bin, &Self::delete_args(name, region, force))?;
        if output.is_success() || output.stderr.contains(NOT_FOUND_MARKER) {
            return Ok(());
        }
        Err(self.failure("delete-repository", output))
    }

    fn list_repositories(&self, region: &str) -> Result<Vec<RepositorySummary>, AdminError> {
        let args = [
            OsString::from("ecr-public"),
            OsString::from("describe-repositories"),
            OsString::from("--region"),
            OsString::from(region),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        let output = self.runner.run(&self.aws_bin, &args)?;
        if !output.is_success() {
            return Err(self.failure("describe-repositories", output));
        }
        parse_repositories(&output.stdout)
    }

    fn delete_command(&self, name: &str, region: &str) -> String {
        render_command_line(&self.aws_bin, &Self::delete_args(name, region, true))
    }

    fn describe_command(&self, name: &str, region: &str) -> String {
        render_command_line(&self.aws_bin, &Self::describe_args(name, region))
    }
}

fn parse_repositories(stdout: &str) -> Result<Vec<RepositorySummary>, AdminError> {
    let parse_error = |message: String| AdminError::Parse {
        resource: String::from("repositories"),
        message,
    };
    let value: serde_json::Value =
        serde_json::from_str(stdout).map_err(|err| parse_error(err.to_string()))?;
    if !value.is_object() {
        return Err(parse_error(String::from("unexpected JSON shape")));
    }
    if value.get("repositories").is_none() {
        return Err(parse_error(String::from("missing 'repositories' field")));
    }
    DescribeRepositoriesResponse::deserialize(value)
        .map(|response| response.repositories)
        .map_err(|err| parse_error(err.to_string()))
}

#[cfg(test)]
mod tests;
