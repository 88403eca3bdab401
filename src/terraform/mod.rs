//! Declarative apply/destroy through the `terraform` CLI.
//!
//! The engine is treated as a black box: it receives a module directory, a
//! variable map and environment overrides, and reports named outputs.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{CommandError, CommandRunner};
use crate::retry::{RetryOutcome, RetryPolicy};

/// Default `terraform` binary name.
pub const DEFAULT_TERRAFORM_BIN: &str = "terraform";

/// Stderr fragments that mark a transient engine or provider failure worth
/// retrying.
pub const DEFAULT_RETRYABLE_ERRORS: &[&str] = &[
    "Client.Timeout exceeded while awaiting headers",
    "TLS handshake timeout",
    "connection reset by peer",
    "RequestError: send request failed",
    "Failed to query available provider packages",
    "Error installing provider",
    "timeout while waiting for plugin to start",
    "ThrottlingException",
];

const RETRYABLE_ATTEMPTS: u32 = 3;
const RETRYABLE_DELAY: Duration = Duration::from_secs(5);

/// A Terraform input variable value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VarValue {
    /// String scalar, passed to the CLI verbatim.
    String(String),
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Number(i64),
    /// List of values.
    List(Vec<VarValue>),
    /// Nested object.
    Object(BTreeMap<String, VarValue>),
}

impl VarValue {
    /// Renders the value as a `-var` argument value. Strings pass through;
    /// everything else is JSON, which Terraform parses as an HCL literal.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Encode`] when serialisation fails.
    pub fn to_cli_value(&self, variable: &str) -> Result<String, ProvisionError> {
        match self {
            Self::String(value) => Ok(value.clone()),
            other => serde_json::to_string(other).map_err(|err| ProvisionError::Encode {
                variable: variable.to_owned(),
                message: err.to_string(),
            }),
        }
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for VarValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for VarValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<BTreeMap<String, T>> for VarValue {
    fn from(values: BTreeMap<String, T>) -> Self {
        Self::Object(
            values
                .into_iter()
                .map(|(key, value)| (key, value.into()))
                .collect(),
        )
    }
}

/// Inputs for one declarative apply/destroy cycle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TerraformOptions {
    /// Module directory passed to `-chdir`.
    pub dir: Utf8PathBuf,
    /// Input variables.
    pub vars: BTreeMap<String, VarValue>,
    /// Environment overrides for every CLI call.
    pub env: BTreeMap<String, String>,
}

/// Errors raised by the declarative engine.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when `terraform` exits with a non-zero status.
    #[error("{program} {action} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed.
        program: String,
        /// Subcommand being run (`init`, `apply`, `destroy`, `output`).
        action: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when `terraform output -json` cannot be parsed.
    #[error("failed to parse terraform outputs: {message}")]
    Parse {
        /// Parser error message.
        message: String,
    },
    /// Raised when a variable cannot be rendered for the CLI.
    #[error("failed to encode variable {variable}: {message}")]
    Encode {
        /// Variable name.
        variable: String,
        /// Serialiser error message.
        message: String,
    },
    /// Raised when command execution fails.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Declarative create/remove collaborator.
pub trait Provisioner {
    /// Creates the resources described by `options` and returns the module's
    /// outputs.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the engine fails; resources may have
    /// been partially created.
    fn apply(
        &self,
        options: &TerraformOptions,
    ) -> Result<BTreeMap<String, String>, ProvisionError>;

    /// Removes the resources described by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the engine fails.
    fn destroy(&self, options: &TerraformOptions) -> Result<(), ProvisionError>;
}

#[derive(Debug, Deserialize)]
struct OutputEntry {
    value: serde_json::Value,
}

/// [`Provisioner`] backed by the `terraform` CLI.
#[derive(Clone, Debug)]
pub struct Terraform<R: CommandRunner> {
    bin: String,
    runner: R,
    retry: RetryPolicy,
    retryable_errors: Vec<String>,
}

impl<R: CommandRunner> Terraform<R> {
    /// Creates an engine adapter that retries known transient failures.
    #[must_use]
    pub fn new(bin: impl Into<String>, runner: R) -> Self {
        Self {
            bin: bin.into(),
            runner,
            retry: RetryPolicy::new(RETRYABLE_ATTEMPTS, RETRYABLE_DELAY),
            retryable_errors: DEFAULT_RETRYABLE_ERRORS
                .iter()
                .map(|pattern| (*pattern).to_owned())
                .collect(),
        }
    }

    /// Overrides the retry policy applied to transient failures.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the list of stderr fragments treated as transient.
    #[must_use]
    pub fn with_retryable_errors(mut self, patterns: Vec<String>) -> Self {
        self.retryable_errors = patterns;
        self
    }

    fn is_retryable(&self, err: &ProvisionError) -> bool {
        let ProvisionError::CommandFailure { stderr, .. } = err else {
            return false;
        };
        self.retryable_errors
            .iter()
            .any(|pattern| stderr.contains(pattern.as_str()))
    }

    fn base_args(options: &TerraformOptions, action: &str) -> Vec<OsString> {
        vec![
            OsString::from(format!("-chdir={}", options.dir)),
            OsString::from(action),
            OsString::from("-input=false"),
            OsString::from("-no-color"),
        ]
    }

    fn var_args(options: &TerraformOptions) -> Result<Vec<OsString>, ProvisionError> {
        let mut args = Vec::with_capacity(options.vars.len() * 2);
        for (name, value) in &options.vars {
            args.push(OsString::from("-var"));
            args.push(OsString::from(format!(
                "{name}={}",
                value.to_cli_value(name)?
            )));
        }
        Ok(args)
    }

    fn run(
        &self,
        options: &TerraformOptions,
        action: &str,
        args: &[OsString],
    ) -> Result<String, ProvisionError> {
        let env: Vec<(String, String)> = options
            .env
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        debug!(action, dir = %options.dir, "running terraform");
        let output = self.runner.run_with_env(&self.bin, args, &env)?;
        if output.is_success() {
            return Ok(output.stdout);
        }
        Err(ProvisionError::CommandFailure {
            program: self.bin.clone(),
            action: action.to_owned(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr,
        })
    }

    fn run_retrying(
        &self,
        options: &TerraformOptions,
        action: &str,
        args: &[OsString],
    ) -> Result<String, ProvisionError> {
        let outcome = self.retry.run_while(
            |err| self.is_retryable(err),
            |attempt| {
                if attempt > 1 {
                    warn!(action, attempt, "retrying terraform after transient error");
                }
                self.run(options, action, args)
            },
        );
        if let RetryOutcome::Exhausted { attempts, .. } = &outcome
            && *attempts > 1
        {
            warn!(action, attempts, "terraform retries exhausted");
        }
        outcome.into_result()
    }

    fn read_outputs(
        &self,
        options: &TerraformOptions,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        let args = [
            OsString::from(format!("-chdir={}", options.dir)),
            OsString::from("output"),
            OsString::from("-no-color"),
            OsString::from("-json"),
        ];
        let stdout = self.run(options, "output", &args)?;
        parse_outputs(&stdout)
    }
}

impl<R: CommandRunner> Provisioner for Terraform<R> {
    fn apply(
        &self,
        options: &TerraformOptions,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        self.run_retrying(options, "init", &Self::base_args(options, "init"))?;

        let mut args = Self::base_args(options, "apply");
        args.push(OsString::from("-auto-approve"));
        args.extend(Self::var_args(options)?);
        self.run_retrying(options, "apply", &args)?;

        self.read_outputs(options)
    }

    fn destroy(&self, options: &TerraformOptions) -> Result<(), ProvisionError> {
        let mut args = Self::base_args(options, "destroy");
        args.push(OsString::from("-auto-approve"));
        args.extend(Self::var_args(options)?);
        self.run_retrying(options, "destroy", &args).map(|_| ())
    }
}

fn parse_outputs(stdout: &str) -> Result<BTreeMap<String, String>, ProvisionError> {
    let entries: BTreeMap<String, OutputEntry> =
        serde_json::from_str(stdout).map_err(|err| ProvisionError::Parse {
            message: err.to_string(),
        })?;
    Ok(entries
        .into_iter()
        .map(|(name, entry)| {
            let rendered = match entry.value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            (name, rendered)
        })
        .collect())
}
