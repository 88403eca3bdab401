//! Configuration loading via `ortho-config`.
//!
//! Process-wide signals (`CI`, `AWS_SKIP_QUOTA_CHECK`) are read once into
//! [`EnvironmentSignals`] and handed to the components that need them, rather
//! than being consulted ad hoc.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Region that hosts every ECR Public repository.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Documented per-region ECR Public repository limit.
pub const DEFAULT_QUOTA_HARD_LIMIT: u64 = 10_000;

/// Out-of-band cleanup script named in quota and remediation messages.
pub const DEFAULT_REMEDIATION_SCRIPT: &str = "./test/cleanup-orphaned-resources.sh";

/// Environment variable set by CI providers.
pub const CI_ENV: &str = "CI";

/// Environment variable that disables the quota pre-flight check.
pub const SKIP_QUOTA_CHECK_ENV: &str = "AWS_SKIP_QUOTA_CHECK";

/// Fixture settings derived from environment variables and configuration
/// files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "ECRPUB_FIXTURE",
    discovery(
        app_name = "ecrpub-fixtures",
        env_var = "ECRPUB_FIXTURE_CONFIG_PATH",
        config_file_name = "ecrpub-fixtures.toml",
        dotfile_name = ".ecrpub-fixtures.toml",
        project_file_name = "ecrpub-fixtures.toml"
    )
)]
pub struct FixtureSettings {
    /// Region the fixtures are created in.
    #[ortho_config(default = DEFAULT_REGION.to_owned())]
    pub region: String,
    /// Path to the `aws` CLI binary.
    #[ortho_config(default = "aws".to_owned())]
    pub aws_bin: String,
    /// Path to the `terraform` CLI binary.
    #[ortho_config(default = "terraform".to_owned())]
    pub terraform_bin: String,
    /// Directory holding external test payload documents.
    #[ortho_config(default = crate::test_data::DEFAULT_TEST_DATA_ROOT.to_owned())]
    pub test_data_root: String,
    /// Seconds to wait before the single fallback-delete retry.
    #[ortho_config(default = 10)]
    pub cleanup_retry_delay_secs: u64,
    /// Provider hard limit the quota thresholds are derived from.
    #[ortho_config(default = DEFAULT_QUOTA_HARD_LIMIT)]
    pub quota_hard_limit: u64,
    /// Cleanup script named in remediation guidance.
    #[ortho_config(default = DEFAULT_REMEDIATION_SCRIPT.to_owned())]
    pub remediation_script: String,
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_owned(),
            aws_bin: String::from("aws"),
            terraform_bin: String::from("terraform"),
            test_data_root: crate::test_data::DEFAULT_TEST_DATA_ROOT.to_owned(),
            cleanup_retry_delay_secs: 10,
            quota_hard_limit: DEFAULT_QUOTA_HARD_LIMIT,
            remediation_script: DEFAULT_REMEDIATION_SCRIPT.to_owned(),
        }
    }
}

impl FixtureSettings {
    /// Loads settings without parsing CLI arguments. Values merge defaults,
    /// configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails, or
    /// [`ConfigError::MissingField`] when validation fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        let settings = Self::load_from_iter([OsString::from("ecrpub-fixtures")])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects blank required fields with guidance on how to set them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// and TOML key for the first blank field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (value, key) in [
            (&self.region, "region"),
            (&self.aws_bin, "aws_bin"),
            (&self.terraform_bin, "terraform_bin"),
            (&self.test_data_root, "test_data_root"),
            (&self.remediation_script, "remediation_script"),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "{key}: set ECRPUB_FIXTURE_{} or add {key} to ecrpub-fixtures.toml",
                    key.to_ascii_uppercase()
                )));
            }
        }
        if self.quota_hard_limit == 0 {
            return Err(ConfigError::MissingField(String::from(
                "quota_hard_limit: set ECRPUB_FIXTURE_QUOTA_HARD_LIMIT to a positive value",
            )));
        }
        Ok(())
    }

    /// Backoff applied before the fallback-delete retry.
    #[must_use]
    pub const fn cleanup_retry_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_retry_delay_secs)
    }
}

/// Boolean process signals captured once at start-up.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EnvironmentSignals {
    /// Running under CI: quota checks and direct administrative cleanup are
    /// skipped.
    pub ci: bool,
    /// Explicit request to skip the quota pre-flight check.
    pub skip_quota_check: bool,
}

impl EnvironmentSignals {
    /// Reads the signals from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Reads the signals through `lookup`. A signal is present when its
    /// variable is set to a non-empty value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let present = |key: &str| lookup(key).is_some_and(|value| !value.is_empty());
        Self {
            ci: present(CI_ENV),
            skip_quota_check: present(SKIP_QUOTA_CHECK_ENV),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}
