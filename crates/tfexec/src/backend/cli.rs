//! Real execution tool backend running the `terraform` binary.

use crate::backend::Executor;
use crate::error::{Error, Result};
use crate::types::{Plan, State, Var};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Backend that executes real `terraform` commands in one working directory.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    /// Directory holding the configuration document.
    working_dir: PathBuf,
    /// Path to the terraform executable.
    binary: PathBuf,
    /// Extra environment for every verb.
    env: Vec<(String, String)>,
}

impl TerraformCli {
    /// Create a backend for `working_dir` using `binary`.
    pub fn new(working_dir: impl Into<PathBuf>, binary: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            binary: binary.into(),
            env: vec![("TF_IN_AUTOMATION".to_string(), "1".to_string())],
        }
    }

    /// Add an environment variable for every verb.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Hand API credentials for `host` to the subprocess.
    ///
    /// Sets `TFE_TOKEN` for the provider and `TF_TOKEN_<host>` for the
    /// remote backend, so nothing is written to a credentials file.
    pub fn with_credentials(self, host: &str, token: &str) -> Self {
        self.with_env("TFE_TOKEN", token)
            .with_env(host_token_var(host), token)
    }

    /// The working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// The binary path.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run a verb and return its raw output.
    fn run(&self, args: &[String]) -> Result<Output> {
        log::debug!("{} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|e| {
                Error::BinaryNotFound(format!("failed to execute {}: {e}", self.binary.display()))
            })?;
        Ok(output)
    }

    /// Run a verb and check for success.
    fn run_checked(&self, verb: &str, args: &[String]) -> Result<String> {
        let output = self.run(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_output(verb, output.status.code(), &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Executor for TerraformCli {
    fn init(&self) -> Result<()> {
        self.run_checked("init", &init_args())?;
        Ok(())
    }

    fn show(&self) -> Result<State> {
        let stdout = self.run_checked("show", &show_args(None))?;
        Ok(serde_json::from_str(&stdout)?)
    }

    fn import(&self, address: &str, id: &str, vars: &[Var]) -> Result<()> {
        self.run_checked("import", &import_args(address, id, vars))?;
        Ok(())
    }

    fn plan(&self, vars: &[Var], out: &Path) -> Result<bool> {
        let output = self.run(&plan_args(vars, out))?;

        // -detailed-exitcode: 0 = no changes, 2 = changes present
        match output.status.code() {
            Some(0) => Ok(false),
            Some(2) => Ok(true),
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(Error::from_output("plan", code, &stderr))
            }
        }
    }

    fn show_plan_raw(&self, plan: &Path) -> Result<String> {
        self.run_checked(
            "show",
            &["show".to_string(), "-no-color".to_string(), path_arg(plan)],
        )
    }

    fn show_plan(&self, plan: &Path) -> Result<Plan> {
        let stdout = self.run_checked("show", &show_args(Some(plan)))?;
        Ok(serde_json::from_str(&stdout)?)
    }

    fn apply(&self, plan: &Path) -> Result<()> {
        self.run_checked("apply", &apply_args(plan))?;
        Ok(())
    }
}

/// Locate `terraform` in PATH.
pub fn find_terraform() -> Result<PathBuf> {
    which::which("terraform").map_err(|e| Error::BinaryNotFound(e.to_string()))
}

/// Environment variable name holding the token for `host`.
///
/// Dots become `_` and hyphens become `__`, following terraform's host
/// credential variable convention.
pub fn host_token_var(host: &str) -> String {
    format!("TF_TOKEN_{}", host.replace('-', "__").replace('.', "_"))
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn init_args() -> Vec<String> {
    vec![
        "init".to_string(),
        "-no-color".to_string(),
        "-input=false".to_string(),
    ]
}

fn show_args(plan: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "show".to_string(),
        "-json".to_string(),
        "-no-color".to_string(),
    ];
    if let Some(plan) = plan {
        args.push(path_arg(plan));
    }
    args
}

fn import_args(address: &str, id: &str, vars: &[Var]) -> Vec<String> {
    let mut args = vec![
        "import".to_string(),
        "-no-color".to_string(),
        "-input=false".to_string(),
    ];
    args.extend(vars.iter().flat_map(Var::args));
    args.push(address.to_string());
    args.push(id.to_string());
    args
}

fn plan_args(vars: &[Var], out: &Path) -> Vec<String> {
    let mut args = vec![
        "plan".to_string(),
        "-no-color".to_string(),
        "-input=false".to_string(),
        "-detailed-exitcode".to_string(),
        format!("-out={}", out.display()),
    ];
    args.extend(vars.iter().flat_map(Var::args));
    args
}

fn apply_args(plan: &Path) -> Vec<String> {
    vec![
        "apply".to_string(),
        "-no-color".to_string(),
        "-input=false".to_string(),
        "-auto-approve".to_string(),
        path_arg(plan),
    ]
}
