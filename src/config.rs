//! Run inputs.
//!
//! Every input can be given as a flag, as an `INPUT_<NAME>` environment
//! variable (the hosting CI's convention) or in a TOML/JSON file passed with
//! `--config`. Flags and environment win over the file.
//!
//! Structured inputs (variables, team access, tags, remote states, backend)
//! are YAML text; in a config file they may also be written as native
//! tables and arrays.

use anyhow::{Context as _, Result};
use clap::Args;
use converge::{
    Backend, Error as ConvergeError, ExpandInput, Provider, RemoteStateReference, SynthInput,
    TagInput, TeamAccessInput, VariableInput, VcsOptions, WorkspaceOptions,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// API host used when none is given.
pub const DEFAULT_HOST: &str = "app.terraform.io";

/// `tfe` provider constraint used when none is given.
pub const DEFAULT_TFE_PROVIDER_VERSION: &str = "~> 0.40";

// ============================================================================
// Raw inputs
// ============================================================================

/// A structured input as given: YAML text, or data read from a config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawInput {
    Text(String),
    Data(serde_yaml::Value),
}

impl FromStr for RawInput {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::Text(s.to_string()))
    }
}

impl RawInput {
    /// Parse into `T`; blank text yields `T::default()`.
    pub fn parse<T: DeserializeOwned + Default>(&self, field: &str) -> converge::Result<T> {
        let parsed = match self {
            Self::Text(text) if text.trim().is_empty() => return Ok(T::default()),
            Self::Text(text) => serde_yaml::from_str(text),
            Self::Data(serde_yaml::Value::Null) => return Ok(T::default()),
            Self::Data(value) => serde_yaml::from_value(value.clone()),
        };
        parsed.map_err(|e| ConvergeError::input(field, e))
    }
}

fn parse_or_default<T: DeserializeOwned + Default>(
    raw: Option<&RawInput>,
    field: &str,
) -> converge::Result<T> {
    raw.map_or_else(|| Ok(T::default()), |raw| raw.parse(field))
}

/// All inputs of a run.
#[derive(Debug, Clone, Default, Args, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Inputs {
    /// Base workspace name
    #[arg(long, env = "INPUT_NAME")]
    pub name: Option<String>,

    /// Workspace suffixes, comma separated or a YAML list
    #[arg(long, env = "INPUT_WORKSPACES")]
    pub workspaces: Option<RawInput>,

    /// Terraform Cloud organization
    #[arg(long, env = "INPUT_TERRAFORM_ORGANIZATION")]
    pub organization: Option<String>,

    /// Terraform Cloud / Enterprise host
    #[arg(long, env = "INPUT_TERRAFORM_HOST")]
    pub host: Option<String>,

    /// API token
    #[arg(long, env = "INPUT_TERRAFORM_TOKEN", hide_env_values = true)]
    #[serde(skip)]
    pub token: Option<String>,

    /// Version constraint of the tfe provider
    #[arg(long, env = "INPUT_TFE_PROVIDER_VERSION")]
    pub tfe_provider_version: Option<String>,

    /// Variables for every workspace (YAML list)
    #[arg(long, env = "INPUT_VARIABLES")]
    pub variables: Option<RawInput>,

    /// Variables per workspace (YAML map of name or suffix to list)
    #[arg(long, env = "INPUT_WORKSPACE_VARIABLES")]
    pub workspace_variables: Option<RawInput>,

    /// Team access templates (YAML list)
    #[arg(long, env = "INPUT_TEAM_ACCESS")]
    pub team_access: Option<RawInput>,

    /// Tags for every workspace (YAML list)
    #[arg(long, env = "INPUT_TAGS")]
    pub tags: Option<RawInput>,

    /// Tags per workspace (YAML map of name or suffix to list)
    #[arg(long, env = "INPUT_WORKSPACE_TAGS")]
    pub workspace_tags: Option<RawInput>,

    /// Remote state lookups (YAML map of name to backend and config)
    #[arg(long, env = "INPUT_REMOTE_STATES")]
    pub remote_states: Option<RawInput>,

    /// State backend of the generated configuration (YAML map with one key)
    #[arg(long, env = "INPUT_BACKEND_CONFIG")]
    pub backend_config: Option<RawInput>,

    #[arg(long, env = "INPUT_AGENT_POOL_ID")]
    pub agent_pool_id: Option<String>,

    #[arg(long, env = "INPUT_AUTO_APPLY")]
    pub auto_apply: Option<bool>,

    /// remote, local or agent
    #[arg(long, env = "INPUT_EXECUTION_MODE")]
    pub execution_mode: Option<String>,

    #[arg(long, env = "INPUT_FILE_TRIGGERS_ENABLED")]
    pub file_triggers_enabled: Option<bool>,

    #[arg(long, env = "INPUT_GLOBAL_REMOTE_STATE")]
    pub global_remote_state: Option<bool>,

    /// Comma separated workspace IDs allowed to read state
    #[arg(long, env = "INPUT_REMOTE_STATE_CONSUMER_IDS")]
    pub remote_state_consumer_ids: Option<String>,

    #[arg(long, env = "INPUT_QUEUE_ALL_RUNS")]
    pub queue_all_runs: Option<bool>,

    #[arg(long, env = "INPUT_SPECULATIVE_ENABLED")]
    pub speculative_enabled: Option<bool>,

    /// Terraform version of the workspaces
    #[arg(long, env = "INPUT_TERRAFORM_VERSION")]
    pub terraform_version: Option<String>,

    #[arg(long, env = "INPUT_SSH_KEY_ID")]
    pub ssh_key_id: Option<String>,

    #[arg(long, env = "INPUT_WORKING_DIRECTORY")]
    pub working_directory: Option<String>,

    /// VCS repository, e.g. org/repo
    #[arg(long, env = "INPUT_VCS_REPO")]
    pub vcs_repo: Option<String>,

    #[arg(long, env = "INPUT_VCS_TOKEN_ID")]
    pub vcs_token_id: Option<String>,

    /// VCS provider used to look up a token, e.g. github
    #[arg(long, env = "INPUT_VCS_TYPE")]
    pub vcs_type: Option<String>,

    #[arg(long, env = "INPUT_VCS_INGRESS_SUBMODULES")]
    pub vcs_ingress_submodules: Option<bool>,

    /// Import existing resources before planning [default: true]
    #[arg(long, env = "INPUT_IMPORT")]
    pub import: Option<bool>,

    /// Apply the plan
    #[arg(long, env = "INPUT_APPLY")]
    pub apply: Option<bool>,

    /// Let the plan delete workspaces
    #[arg(long, env = "INPUT_ALLOW_WORKSPACE_DELETION")]
    pub allow_workspace_deletion: Option<bool>,
}

/// Fill every unset field of `$target` from `$fallback`.
macro_rules! fill {
    ($target:ident, $fallback:ident, $($field:ident),+ $(,)?) => {
        $( $target.$field = $target.$field.take().or($fallback.$field); )+
    };
}

impl Inputs {
    /// Layer these inputs over `file`; values set here win.
    #[must_use]
    pub fn over(self, file: Self) -> Self {
        let mut merged = self;
        fill!(
            merged,
            file,
            name,
            workspaces,
            organization,
            host,
            token,
            tfe_provider_version,
            variables,
            workspace_variables,
            team_access,
            tags,
            workspace_tags,
            remote_states,
            backend_config,
            agent_pool_id,
            auto_apply,
            execution_mode,
            file_triggers_enabled,
            global_remote_state,
            remote_state_consumer_ids,
            queue_all_runs,
            speculative_enabled,
            terraform_version,
            ssh_key_id,
            working_directory,
            vcs_repo,
            vcs_token_id,
            vcs_type,
            vcs_ingress_submodules,
            import,
            apply,
            allow_workspace_deletion,
        );
        merged
    }
}

/// Where inputs come from: a config file plus flags and environment.
#[derive(Debug, Clone, Args)]
pub struct InputSource {
    /// TOML or JSON file with inputs
    #[arg(short, long, env = "INPUT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub inputs: Inputs,
}

impl InputSource {
    /// Merge flags and environment over the config file, then resolve.
    pub fn load(self) -> Result<Settings> {
        let inputs = match &self.config {
            Some(path) => self.inputs.over(load_file(path)?),
            None => self.inputs,
        };
        Settings::resolve(inputs)
    }
}

/// Read inputs from a TOML or JSON file, chosen by extension.
pub fn load_file(path: &Path) -> Result<Inputs> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let inputs = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        _ => toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
    };

    log::debug!("loaded inputs from {}", path.display());
    Ok(inputs)
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Inputs parsed and validated for a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub organization: String,
    pub host: String,
    pub token: Option<String>,
    pub expand: ExpandInput,
    pub synth: SynthInput,
    pub import: bool,
    pub apply: bool,
    pub allow_workspace_deletion: bool,
}

impl Settings {
    /// Parse every structured input, naming the field on failure.
    pub fn resolve(inputs: Inputs) -> Result<Self> {
        Ok(Self::parse(inputs)?)
    }

    fn parse(inputs: Inputs) -> converge::Result<Self> {
        let name = required(inputs.name, "name")?;
        let organization = required(inputs.organization, "organization")?;
        let host = inputs
            .host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let expand = ExpandInput {
            name,
            suffixes: parse_suffixes(inputs.workspaces.as_ref())?,
            variables: parse_or_default::<Vec<VariableInput>>(inputs.variables.as_ref(), "variables")?,
            workspace_variables: parse_or_default(
                inputs.workspace_variables.as_ref(),
                "workspace_variables",
            )?,
            team_access: parse_or_default::<Vec<TeamAccessInput>>(
                inputs.team_access.as_ref(),
                "team_access",
            )?,
            tags: parse_or_default::<Vec<TagInput>>(inputs.tags.as_ref(), "tags")?,
            workspace_tags: parse_or_default(inputs.workspace_tags.as_ref(), "workspace_tags")?,
        };

        let remote_states: BTreeMap<String, RemoteStateReference> =
            parse_or_default(inputs.remote_states.as_ref(), "remote_states")?;
        let backend: BTreeMap<String, serde_json::Value> =
            parse_or_default(inputs.backend_config.as_ref(), "backend_config")?;
        let backend = if backend.is_empty() {
            None
        } else {
            Some(Backend::from_map(backend)?)
        };

        let provider_version = inputs
            .tfe_provider_version
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TFE_PROVIDER_VERSION.to_string());

        let synth = SynthInput {
            workspace: WorkspaceOptions {
                organization: organization.clone(),
                agent_pool_id: inputs.agent_pool_id,
                auto_apply: inputs.auto_apply,
                execution_mode: inputs.execution_mode,
                file_triggers_enabled: inputs.file_triggers_enabled,
                global_remote_state: inputs.global_remote_state,
                remote_state_consumer_ids: inputs.remote_state_consumer_ids,
                queue_all_runs: inputs.queue_all_runs,
                speculative_enabled: inputs.speculative_enabled,
                terraform_version: inputs.terraform_version,
                ssh_key_id: inputs.ssh_key_id,
                working_directory: inputs.working_directory,
                vcs: VcsOptions {
                    repo: inputs.vcs_repo,
                    token_id: inputs.vcs_token_id,
                    vcs_type: inputs.vcs_type,
                    ingress_submodules: inputs.vcs_ingress_submodules.unwrap_or(false),
                },
            },
            remote_states: converge::synth::remote_states(remote_states),
            providers: vec![Provider::tfe(&host, provider_version)],
            backend,
        };

        Ok(Self {
            organization,
            host,
            token: inputs.token.filter(|t| !t.is_empty()),
            expand,
            synth,
            import: inputs.import.unwrap_or(true),
            apply: inputs.apply.unwrap_or(false),
            allow_workspace_deletion: inputs.allow_workspace_deletion.unwrap_or(false),
        })
    }

    /// API token, required whenever the remote API is called.
    pub fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("No API token: pass --token or set INPUT_TERRAFORM_TOKEN")
    }
}

fn required(value: Option<String>, field: &str) -> converge::Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConvergeError::input(field, "must be set"))
}

/// Suffixes from a comma separated string or a YAML list.
fn parse_suffixes(raw: Option<&RawInput>) -> converge::Result<Vec<String>> {
    match raw {
        None => Ok(Vec::new()),
        Some(RawInput::Text(text)) if text.trim_start().starts_with(['[', '-']) => {
            RawInput::Text(text.clone()).parse("workspaces")
        }
        Some(RawInput::Text(text)) => Ok(text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
        Some(data) => data.parse("workspaces"),
    }
}
