//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::registry::{AdminError, Presence, RepositoryAdmin, RepositorySummary};
use crate::terraform::{ProvisionError, Provisioner, TerraformOptions};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Environment overrides passed to the program.
    pub env: Vec<(String, String)>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns `true` when any argument equals `needle`.
    #[must_use]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|arg| arg.to_string_lossy() == needle)
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(String, String)],
    ) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            env: env.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Declarative engine double with scripted apply and destroy results.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvisioner {
    apply_results: Rc<RefCell<VecDeque<Result<BTreeMap<String, String>, ProvisionError>>>>,
    destroy_results: Rc<RefCell<VecDeque<Result<(), ProvisionError>>>>,
    applied: Rc<RefCell<Vec<TerraformOptions>>>,
    destroyed: Rc<RefCell<Vec<TerraformOptions>>>,
}

impl ScriptedProvisioner {
    /// Creates a provisioner whose calls fail until results are queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful apply returning `outputs`.
    pub fn push_apply_outputs(&self, outputs: &[(&str, &str)]) {
        self.apply_results.borrow_mut().push_back(Ok(outputs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()));
    }

    /// Queues a failing apply.
    pub fn push_apply_failure(&self, stderr: &str) {
        self.apply_results
            .borrow_mut()
            .push_back(Err(scripted_engine_failure("apply", stderr)));
    }

    /// Queues a successful destroy.
    pub fn push_destroy_success(&self) {
        self.destroy_results.borrow_mut().push_back(Ok(()));
    }

    /// Queues a failing destroy.
    pub fn push_destroy_failure(&self, stderr: &str) {
        self.destroy_results
            .borrow_mut()
            .push_back(Err(scripted_engine_failure("destroy", stderr)));
    }

    /// Options passed to every apply call so far.
    #[must_use]
    pub fn applied(&self) -> Vec<TerraformOptions> {
        self.applied.borrow().clone()
    }

    /// Options passed to every destroy call so far.
    #[must_use]
    pub fn destroyed(&self) -> Vec<TerraformOptions> {
        self.destroyed.borrow().clone()
    }
}

fn scripted_engine_failure(action: &str, stderr: &str) -> ProvisionError {
    ProvisionError::CommandFailure {
        program: String::from("terraform"),
        action: action.to_owned(),
        status: Some(1),
        status_text: String::from("1"),
        stderr: stderr.to_owned(),
    }
}

impl Provisioner for ScriptedProvisioner {
    fn apply(
        &self,
        options: &TerraformOptions,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        self.applied.borrow_mut().push(options.clone());
        self.apply_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(scripted_engine_failure("apply", "no scripted apply result")))
    }

    fn destroy(&self, options: &TerraformOptions) -> Result<(), ProvisionError> {
        self.destroyed.borrow_mut().push(options.clone());
        self.destroy_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Err(scripted_engine_failure(
                    "destroy",
                    "no scripted destroy result",
                ))
            })
    }
}

/// A call recorded by [`ScriptedAdmin`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdminCall {
    /// Existence check.
    Describe {
        /// Repository name.
        name: String,
        /// Region queried.
        region: String,
    },
    /// Delete request.
    Delete {
        /// Repository name.
        name: String,
        /// Region targeted.
        region: String,
        /// Whether images were force-deleted.
        force: bool,
    },
    /// Listing request.
    List {
        /// Region queried.
        region: String,
    },
}

/// Administrative API double with scripted responses.
#[derive(Clone, Debug, Default)]
pub struct ScriptedAdmin {
    describe_results: Rc<RefCell<VecDeque<Result<Presence, AdminError>>>>,
    delete_results: Rc<RefCell<VecDeque<Result<(), AdminError>>>>,
    list_results: Rc<RefCell<VecDeque<Result<Vec<RepositorySummary>, AdminError>>>>,
    calls: Rc<RefCell<Vec<AdminCall>>>,
}

impl ScriptedAdmin {
    /// Creates an admin double whose calls fail until results are queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an existence-check result.
    pub fn push_describe(&self, presence: Presence) {
        self.describe_results.borrow_mut().push_back(Ok(presence));
    }

    /// Queues a successful delete.
    pub fn push_delete_success(&self) {
        self.delete_results.borrow_mut().push_back(Ok(()));
    }

    /// Queues a failing delete.
    pub fn push_delete_failure(&self, stderr: &str) {
        self.delete_results
            .borrow_mut()
            .push_back(Err(scripted_admin_failure("delete-repository", stderr)));
    }

    /// Queues a listing containing `names`.
    pub fn push_list(&self, names: &[&str]) {
        self.list_results.borrow_mut().push_back(Ok(names
            .iter()
            .map(|name| RepositorySummary {
                repository_name: (*name).to_owned(),
                repository_uri: Some(format!("public.ecr.aws/registry/{name}")),
                repository_arn: None,
            })
            .collect()));
    }

    /// Queues a failing listing.
    pub fn push_list_failure(&self, stderr: &str) {
        self.list_results
            .borrow_mut()
            .push_back(Err(scripted_admin_failure("describe-repositories", stderr)));
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<AdminCall> {
        self.calls.borrow().clone()
    }

    /// Number of delete calls recorded so far.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, AdminCall::Delete { .. }))
            .count()
    }
}

fn scripted_admin_failure(action: &str, stderr: &str) -> AdminError {
    AdminError::CommandFailure {
        program: String::from("aws"),
        action: action.to_owned(),
        status: Some(255),
        status_text: String::from("255"),
        stderr: stderr.to_owned(),
    }
}

impl RepositoryAdmin for ScriptedAdmin {
    fn describe(&self, name: &str, region: &str) -> Result<Presence, AdminError> {
        self.calls.borrow_mut().push(AdminCall::Describe {
            name: name.to_owned(),
            region: region.to_owned(),
        });
        self.describe_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(scripted_admin_failure("describe-repositories", "unscripted")))
    }

    fn delete(&self, name: &str, region: &str, force: bool) -> Result<(), AdminError> {
        self.calls.borrow_mut().push(AdminCall::Delete {
            name: name.to_owned(),
            region: region.to_owned(),
            force,
        });
        self.delete_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(scripted_admin_failure("delete-repository", "unscripted")))
    }

    fn list_repositories(&self, region: &str) -> Result<Vec<RepositorySummary>, AdminError> {
        self.calls.borrow_mut().push(AdminCall::List {
            region: region.to_owned(),
        });
        self.list_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(scripted_admin_failure("describe-repositories", "unscripted")))
    }

    fn delete_command(&self, name: &str, region: &str) -> String {
        format!(
            "aws ecr-public delete-repository --repository-name {name} --region {region} --force"
        )
    }

    fn describe_command(&self, name: &str, region: &str) -> String {
        format!(
            "aws ecr-public describe-repositories --repository-names {name} \
             --region {region} --output json"
        )
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Guard that restores environment variables when dropped.
#[derive(Debug)]
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    ///
    /// Duplicate keys are ignored after their first occurrence.
    #[must_use]
    pub fn set_vars(pairs: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut seen = BTreeSet::new();
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if !seen.insert(*key) {
                continue;
            }
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Produces a minimal JSON payload matching
/// `aws ecr-public describe-repositories --output json`.
#[must_use]
pub fn json_repositories(names: &[&str]) -> String {
    let items = names
        .iter()
        .map(|name| {
            format!(
                concat!(
                    "{{\"repositoryArn\":\"arn:aws:ecr-public::123456789012:repository/{name}\",",
                    "\"registryId\":\"123456789012\",",
                    "\"repositoryName\":\"{name}\",",
                    "\"repositoryUri\":\"public.ecr.aws/a1b2c3d4/{name}\"}}"
                ),
                name = name
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"repositories\":[{items}]}}")
}

/// Produces a JSON payload matching `terraform output -json`.
#[must_use]
pub fn json_terraform_outputs(outputs: &[(&str, &str)]) -> String {
    let items = outputs
        .iter()
        .map(|(name, value)| {
            format!("\"{name}\":{{\"sensitive\":false,\"type\":\"string\",\"value\":\"{value}\"}}")
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{items}}}")
}
