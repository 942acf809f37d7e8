//! The synthesized configuration document.
//!
//! A [`Document`] serializes to the JSON configuration syntax the execution
//! tool reads from `main.tf.json`:
//!
//! ```text
//! {
//!   "terraform": { "backend": {..}, "required_providers": {..} },
//!   "variable":  { "<name>": {..} },
//!   "resource":  { "<type>": { "<name>": {..} } },
//!   "data":      { "<type>": { "<name>": {..} } },
//!   "provider":  { "<name>": {..} }
//! }
//! ```
//!
//! Maps are ordered so the same inputs always render byte-identical output.
//! Empty sections are left out.

use crate::error::Result;
use crate::model::{Backend, Permissions, Provider, RemoteStateReference};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Document variable holding the set of workspace names.
pub const WORKSPACE_NAMES_VAR: &str = "workspace_names";
/// Document variable holding resolved tags per workspace.
pub const WORKSPACE_TAGS_VAR: &str = "workspace_tags";

/// Resource or data blocks, keyed by type then by logical name.
pub type Blocks = BTreeMap<String, BTreeMap<String, Block>>;

/// The root configuration document.
///
/// Built once by [`synthesize`](crate::synth::synthesize) and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    terraform: TerraformBlock,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    variable: BTreeMap<String, VariableDecl>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    resource: Blocks,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    data: Blocks,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    provider: BTreeMap<String, Value>,
}

impl Document {
    pub(crate) fn new(backend: &Backend) -> Self {
        let mut backends = BTreeMap::new();
        backends.insert(backend.kind.clone(), backend.config.clone());

        Self {
            terraform: TerraformBlock {
                backend: backends,
                required_providers: BTreeMap::new(),
            },
            variable: BTreeMap::new(),
            resource: BTreeMap::new(),
            data: BTreeMap::new(),
            provider: BTreeMap::new(),
        }
    }

    pub(crate) fn declare_variable(&mut self, name: &str, decl: VariableDecl) {
        self.variable.insert(name.to_string(), decl);
    }

    pub(crate) fn insert_resource(&mut self, kind: &str, name: &str, block: Block) {
        self.resource
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), block);
    }

    pub(crate) fn insert_data(&mut self, kind: &str, name: &str, block: Block) {
        self.data
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), block);
    }

    pub(crate) fn add_provider(&mut self, provider: &Provider) {
        self.terraform.required_providers.insert(
            provider.name.clone(),
            ProviderRequirement {
                source: provider.source.clone(),
                version: provider.version.clone(),
            },
        );
        self.provider
            .insert(provider.name.clone(), provider.config.clone());
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Backend section, `{ <kind>: <config> }`.
    pub fn backend(&self) -> &BTreeMap<String, Value> {
        &self.terraform.backend
    }

    /// Required providers by local name.
    pub fn required_providers(&self) -> &BTreeMap<String, ProviderRequirement> {
        &self.terraform.required_providers
    }

    /// Declared input variables.
    pub fn variables(&self) -> &BTreeMap<String, VariableDecl> {
        &self.variable
    }

    /// A resource block by type and logical name.
    pub fn resource(&self, kind: &str, name: &str) -> Option<&Block> {
        self.resource.get(kind).and_then(|blocks| blocks.get(name))
    }

    /// A data block by type and logical name.
    pub fn data(&self, kind: &str, name: &str) -> Option<&Block> {
        self.data.get(kind).and_then(|blocks| blocks.get(name))
    }

    /// All resource blocks.
    pub fn resources(&self) -> &Blocks {
        &self.resource
    }

    /// All data blocks.
    pub fn data_sources(&self) -> &Blocks {
        &self.data
    }

    /// Provider configurations by local name.
    pub fn providers(&self) -> &BTreeMap<String, Value> {
        &self.provider
    }

    /// The document as a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The document as pretty-printed JSON, as written to disk.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct TerraformBlock {
    backend: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    required_providers: BTreeMap<String, ProviderRequirement>,
}

/// An entry of `terraform.required_providers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRequirement {
    /// Registry source.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Version constraint.
    pub version: String,
}

/// A `variable` declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDecl {
    /// Type constraint.
    #[serde(rename = "type")]
    pub type_constraint: String,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Blocks
// ============================================================================

/// One resource or data block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Block {
    /// `resource.tfe_workspace.workspace`
    Workspace(Box<WorkspaceResource>),
    /// `resource.tfe_variable.variables`
    Variables(VariablesResource),
    /// `resource.tfe_team_access.teams`
    TeamAccess(TeamAccessResource),
    /// `data.tfe_team.teams`
    TeamLookup(TeamLookup),
    /// `data.terraform_remote_state.<name>`
    RemoteState(RemoteStateReference),
}

/// The workspace resource, iterated over `var.workspace_names`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceResource {
    pub for_each: String,
    pub name: String,
    pub organization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_pool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_apply: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_triggers_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_remote_state: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remote_state_consumer_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_all_runs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speculative_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcs_repo: Option<VcsRepo>,
}

/// `vcs_repo` block of the workspace resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VcsRepo {
    pub identifier: String,
    pub oauth_token_id: String,
    pub ingress_submodules: bool,
}

/// The variable resource, iterated over a map keyed `<workspace>-<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariablesResource {
    pub for_each: BTreeMap<String, VariableEntry>,
    pub key: String,
    pub value: String,
    pub description: String,
    pub category: String,
    pub sensitive: String,
    pub workspace_id: String,
}

/// One element of the variable resource's `for_each` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableEntry {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub category: String,
    pub sensitive: bool,
    pub workspace_id: String,
}

/// The team access resource, iterated over a map keyed `<workspace>-<teamRef>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamAccessResource {
    pub for_each: BTreeMap<String, TeamAccessEntry>,
    pub team_id: String,
    pub workspace_id: String,
    pub access: String,
    pub dynamic: DynamicPermissions,
}

/// One element of the team access resource's `for_each` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamAccessEntry {
    pub team_id: String,
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
}

/// `dynamic "permissions"` block, materialized once when an entry carries
/// permissions and not at all otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicPermissions {
    pub permissions: Vec<DynamicPermissionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicPermissionEntry {
    pub for_each: String,
    pub content: PermissionContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionContent {
    pub runs: String,
    pub variables: String,
    pub state_versions: String,
    pub sentinel_mocks: String,
    pub workspace_locking: String,
}

impl DynamicPermissions {
    /// The permission block reading every axis from `each.value.permissions`.
    pub fn from_each_value() -> Self {
        let axis = |name: &str| format!("${{each.value.permissions.{name}}}");
        Self {
            permissions: vec![DynamicPermissionEntry {
                for_each: r#"${lookup(each.value ,"permissions", null) != null ? {once: true} : {}}"#
                    .to_string(),
                content: PermissionContent {
                    runs: axis("runs"),
                    variables: axis("variables"),
                    state_versions: axis("state_versions"),
                    sentinel_mocks: axis("sentinel_mocks"),
                    workspace_locking: axis("workspace_locking"),
                },
            }],
        }
    }
}

/// Team lookup by name, iterated over a map name -> `{ name, organization }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamLookup {
    pub for_each: BTreeMap<String, TeamLookupEntry>,
    pub name: String,
    pub organization: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamLookupEntry {
    pub name: String,
    pub organization: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_document() {
        let doc = Document::new(&Backend::default());
        let value = doc.to_value().unwrap();
        assert_eq!(value, json!({"terraform": {"backend": {"local": {}}}}));
    }

    #[test]
    fn test_sections_and_providers() {
        let mut doc = Document::new(&Backend::default());
        doc.add_provider(&Provider::tfe("app.terraform.io", "~> 0.40"));
        doc.declare_variable(
            WORKSPACE_NAMES_VAR,
            VariableDecl {
                type_constraint: "set(string)".to_string(),
                default: None,
                description: None,
            },
        );

        let value = doc.to_value().unwrap();
        assert_eq!(
            value["terraform"]["required_providers"]["tfe"],
            json!({"source": "hashicorp/tfe", "version": "~> 0.40"})
        );
        assert_eq!(value["provider"]["tfe"], json!({"hostname": "app.terraform.io"}));
        assert_eq!(value["variable"]["workspace_names"], json!({"type": "set(string)"}));
        assert!(value.get("resource").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_dynamic_permissions_shape() {
        let value = serde_json::to_value(DynamicPermissions::from_each_value()).unwrap();
        let entry = &value["permissions"][0];
        assert_eq!(
            entry["for_each"],
            r#"${lookup(each.value ,"permissions", null) != null ? {once: true} : {}}"#
        );
        assert_eq!(entry["content"]["runs"], "${each.value.permissions.runs}");
        assert_eq!(
            entry["content"]["workspace_locking"],
            "${each.value.permissions.workspace_locking}"
        );
    }

    #[test]
    fn test_block_lookup() {
        let mut doc = Document::new(&Backend::default());
        doc.insert_data(
            "terraform_remote_state",
            "network",
            Block::RemoteState(RemoteStateReference {
                name: "network".into(),
                backend: "s3".into(),
                config: serde_json::Map::new(),
            }),
        );

        assert!(doc.data("terraform_remote_state", "network").is_some());
        assert!(doc.resource("tfe_workspace", "workspace").is_none());
        let value = doc.to_value().unwrap();
        assert_eq!(
            value["data"]["terraform_remote_state"]["network"],
            json!({"backend": "s3", "config": {}})
        );
    }

    #[test]
    fn test_pretty_json_is_stable() {
        let mut doc = Document::new(&Backend::default());
        doc.add_provider(&Provider::tfe("b.example", "1"));
        doc.add_provider(&Provider {
            name: "aaa".into(),
            source: String::new(),
            version: "2".into(),
            config: json!({}),
        });
        let first = doc.to_json_pretty().unwrap();
        assert_eq!(first, doc.clone().to_json_pretty().unwrap());
        assert!(first.find("\"aaa\"").unwrap() < first.find("\"tfe\"").unwrap());
    }
}
