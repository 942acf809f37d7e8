//! Entity model for a convergence run.
//!
//! Entities are built fresh by [`expand`](crate::expand) for every run and
//! only live in memory. Each entity knows the resource address it is
//! tracked under, which is what ties the synthesized document and the
//! reconciler together.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Resource type of the workspace resource, the one the plan guard protects.
pub const WORKSPACE_KIND: &str = "tfe_workspace";
/// Resource type of workspace variables.
pub const VARIABLE_KIND: &str = "tfe_variable";
/// Resource type of team access grants.
pub const TEAM_ACCESS_KIND: &str = "tfe_team_access";

/// Logical name of the workspace resource block.
pub const WORKSPACE_BLOCK: &str = "workspace";
/// Logical name of the variable resource block.
pub const VARIABLES_BLOCK: &str = "variables";
/// Logical name of the team access resource block and team data lookup.
pub const TEAMS_BLOCK: &str = "teams";

// ============================================================================
// Workspace
// ============================================================================

/// A workspace managed by the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    /// Full name, `<base>` or `<base>-<suffix>`.
    pub name: String,
    /// Suffix the name was built from, if any.
    pub suffix: Option<String>,
    /// Remote ID once the workspace is known to exist remotely.
    pub remote_id: Option<String>,
}

impl Workspace {
    /// A workspace not yet seen remotely.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: None,
            remote_id: None,
        }
    }

    /// Tracked address, `tfe_workspace.workspace["<name>"]`.
    pub fn address(&self) -> String {
        instance_address(WORKSPACE_KIND, WORKSPACE_BLOCK, &self.name)
    }

    /// Interpolation of the workspace's ID inside the document.
    pub fn id_ref(&self) -> String {
        format!("${{{}.id}}", self.address())
    }

    /// Whether a per-workspace input key refers to this workspace.
    ///
    /// Keys may be the full name or the bare suffix.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.name == key || self.suffix.as_deref() == Some(key)
    }
}

/// Find the workspace a per-workspace input key refers to.
pub fn find_workspace<'a>(workspaces: &'a [Workspace], key: &str) -> Option<&'a Workspace> {
    workspaces
        .iter()
        .find(|ws| ws.name == key.trim())
        .or_else(|| workspaces.iter().find(|ws| ws.matches(key)))
}

// ============================================================================
// Variable
// ============================================================================

/// Category of a workspace variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Terraform input variable.
    #[default]
    Terraform,
    /// Environment variable.
    Env,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terraform => write!(f, "terraform"),
            Self::Env => write!(f, "env"),
        }
    }
}

/// A variable on one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// Variable key.
    pub key: String,
    /// Variable value.
    pub value: String,
    /// Optional description.
    pub description: Option<String>,
    /// Variable category.
    pub category: Category,
    /// Whether the value is write-only.
    pub sensitive: bool,
    /// Owning workspace name.
    pub workspace: String,
}

impl Variable {
    /// Composite key, `<workspace>-<key>`.
    pub fn address_key(&self) -> String {
        format!("{}-{}", self.workspace, self.key)
    }

    /// Tracked address, `tfe_variable.variables["<workspace>-<key>"]`.
    pub fn address(&self) -> String {
        instance_address(VARIABLE_KIND, VARIABLES_BLOCK, &self.address_key())
    }
}

// ============================================================================
// Access grants
// ============================================================================

/// Fine-grained team permissions on a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Run permission (`read`, `plan`, `apply`).
    pub runs: String,
    /// Variable permission (`none`, `read`, `write`).
    pub variables: String,
    /// State version permission.
    pub state_versions: String,
    /// Sentinel mock permission.
    pub sentinel_mocks: String,
    /// Whether the team may lock the workspace.
    #[serde(default)]
    pub workspace_locking: bool,
}

/// A team's access to one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    /// Team name, looked up in the organization when no ID is given.
    pub team_name: String,
    /// Literal team ID, when known.
    pub team_id: Option<String>,
    /// Coarse access level.
    pub access: Option<String>,
    /// Fine-grained permissions.
    pub permissions: Option<Permissions>,
    /// Workspace name.
    pub workspace: String,
}

impl AccessGrant {
    /// Team reference used in the composite key: the ID if known, else the name.
    pub fn team_ref(&self) -> &str {
        self.team_id.as_deref().unwrap_or(&self.team_name)
    }

    /// Composite key, `<workspace>-<teamRef>`.
    pub fn address_key(&self) -> String {
        format!("{}-{}", self.workspace, self.team_ref())
    }

    /// Tracked address, `tfe_team_access.teams["<workspace>-<teamRef>"]`.
    pub fn address(&self) -> String {
        instance_address(TEAM_ACCESS_KIND, TEAMS_BLOCK, &self.address_key())
    }

    /// Interpolation of the team ID inside the document.
    pub fn team_id_ref(&self) -> String {
        match &self.team_id {
            Some(id) => id.clone(),
            None => format!(
                "${{{}.id}}",
                instance_address("data.tfe_team", TEAMS_BLOCK, &self.team_name)
            ),
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

/// A workspace tag, `key` or `key:value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Optional value.
    pub value: Option<String>,
}

impl Tag {
    /// Parse `key` or `key:value`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (key, value) = match text.split_once(':') {
            Some((key, value)) => (key.trim(), Some(value.trim().to_string())),
            None => (text, None),
        };
        if key.is_empty() {
            return Err(Error::input("tags", format!("empty tag key in {text:?}")));
        }
        Ok(Self {
            key: key.to_string(),
            value,
        })
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

// ============================================================================
// Remote state, providers, backend
// ============================================================================

/// A read-only lookup of another configuration's outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStateReference {
    /// Logical name, used as the data source name.
    #[serde(skip)]
    pub name: String,
    /// Backend kind, e.g. `s3` or `remote`.
    pub backend: String,
    /// Backend settings, passed through unchanged.
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// A provider requirement plus its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    /// Local provider name.
    pub name: String,
    /// Registry source.
    pub source: String,
    /// Version constraint.
    pub version: String,
    /// Provider block contents.
    pub config: Value,
}

impl Provider {
    /// The `tfe` provider for a host.
    pub fn tfe(host: &str, version: impl Into<String>) -> Self {
        Self {
            name: "tfe".to_string(),
            source: "hashicorp/tfe".to_string(),
            version: version.into(),
            config: serde_json::json!({ "hostname": host }),
        }
    }
}

/// State backend of the generated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Backend {
    /// Backend kind, e.g. `local` or `s3`.
    pub kind: String,
    /// Backend settings.
    pub config: Value,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            kind: "local".to_string(),
            config: Value::Object(Map::new()),
        }
    }
}

impl Backend {
    /// Build from a `{ <kind>: <config> }` map holding exactly one backend.
    pub fn from_map(map: BTreeMap<String, Value>) -> Result<Self> {
        if map.len() != 1 {
            return Err(Error::input(
                "backend_config",
                format!("expected exactly one backend, found {}", map.len()),
            ));
        }
        let Some((kind, config)) = map.into_iter().next() else {
            return Err(Error::input("backend_config", "no backend given"));
        };
        let config = match config {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => config,
            other => {
                return Err(Error::input(
                    "backend_config",
                    format!("settings for {kind:?} must be a map, got {other}"),
                ));
            }
        };
        Ok(Self { kind, config })
    }
}

/// `<kind>.<block>["<key>"]`
fn instance_address(kind: &str, block: &str, key: &str) -> String {
    format!("{kind}.{block}[{key:?}]")
}
