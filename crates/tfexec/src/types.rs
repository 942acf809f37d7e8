//! Core types for the execution tool.
//!
//! [`State`] and [`Plan`] model the subset of `terraform show -json` output
//! that callers inspect. Plans keep every other field so they can be printed
//! back out unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// Variables
// ============================================================================

/// An input variable passed to `import` and `plan` as `-var name=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    /// Variable name.
    pub name: String,
    /// Raw value; complex values are JSON/HCL literals.
    pub value: String,
}

impl Var {
    /// Create a variable.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a variable whose value is `value` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(name: impl Into<String>, value: &T) -> serde_json::Result<Self> {
        Ok(Self::new(name, serde_json::to_string(value)?))
    }

    /// Command line arguments for this variable.
    pub fn args(&self) -> [String; 2] {
        ["-var".to_string(), self.to_string()]
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

// ============================================================================
// State
// ============================================================================

/// Tracking state as reported by `terraform show -json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// JSON format version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Absent when nothing has been tracked yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<StateValues>,
}

/// Values section of the state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateValues {
    /// Root module.
    #[serde(default)]
    pub root_module: StateModule,
}

/// A module in the state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateModule {
    /// Resources declared directly in this module.
    #[serde(default)]
    pub resources: Vec<StateResource>,
}

/// A tracked resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResource {
    /// Full address, e.g. `tfe_workspace.workspace["demo"]`.
    pub address: String,
    /// Resource type, e.g. `tfe_workspace`.
    #[serde(rename = "type", default)]
    pub resource_type: String,
}

impl State {
    /// Build a state tracking the given addresses.
    pub fn tracking<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resources = addresses
            .into_iter()
            .map(|address| {
                let address = address.into();
                StateResource {
                    resource_type: resource_type_of(&address).to_string(),
                    address,
                }
            })
            .collect();

        Self {
            format_version: Some("1.0".to_string()),
            values: Some(StateValues {
                root_module: StateModule { resources },
            }),
        }
    }

    /// Addresses tracked in the root module.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .flat_map(|v| v.root_module.resources.iter())
            .map(|r| r.address.as_str())
    }
}

// ============================================================================
// Plan
// ============================================================================

/// A change action in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Nothing to do.
    #[serde(rename = "no-op")]
    NoOp,
    /// Resource will be created.
    Create,
    /// Data source will be read.
    Read,
    /// Resource will be updated in place.
    Update,
    /// Resource will be destroyed.
    Delete,
    /// Resource will be removed from state without being destroyed.
    Forget,
}

/// A structured plan as reported by `terraform show -json <planfile>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Proposed resource changes.
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
    /// Every other field of the plan, kept verbatim.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One proposed resource change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Full address.
    pub address: String,
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// The change itself.
    pub change: Change,
    /// Other fields, kept verbatim.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Actions and values of a resource change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Actions, e.g. `["delete", "create"]` for a replacement.
    pub actions: Vec<Action>,
    /// Other fields (`before`, `after`, ...), kept verbatim.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ResourceChange {
    /// Create a change with the given actions.
    pub fn new(address: impl Into<String>, actions: Vec<Action>) -> Self {
        let address = address.into();
        Self {
            resource_type: resource_type_of(&address).to_string(),
            address,
            change: Change {
                actions,
                other: Map::new(),
            },
            other: Map::new(),
        }
    }

    /// Whether this change destroys the resource (including replacement).
    pub fn is_delete(&self) -> bool {
        self.change.actions.contains(&Action::Delete)
    }
}

/// Resource type portion of an address (`tfe_workspace` for `tfe_workspace.workspace["x"]`).
///
/// `data.` addresses yield the data source type.
pub fn resource_type_of(address: &str) -> &str {
    let address = address.strip_prefix("data.").unwrap_or(address);
    address.split('.').next().unwrap_or(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_args() {
        let var = Var::new("region", "eu-west-1");
        assert_eq!(var.args(), ["-var".to_string(), "region=eu-west-1".to_string()]);
    }

    #[test]
    fn test_var_json() {
        let var = Var::json("workspace_names", &["demo-a", "demo-b"]).unwrap();
        assert_eq!(var.to_string(), r#"workspace_names=["demo-a","demo-b"]"#);
    }

    #[test]
    fn test_state_without_values() {
        let state: State = serde_json::from_str(r#"{"format_version":"1.0"}"#).unwrap();
        assert!(state.values.is_none());
        assert_eq!(state.addresses().count(), 0);
    }

    #[test]
    fn test_state_addresses() {
        let json = r#"{
            "format_version": "1.0",
            "terraform_version": "1.9.0",
            "values": {"root_module": {"resources": [
                {"address": "tfe_workspace.workspace[\"demo\"]", "type": "tfe_workspace", "mode": "managed"},
                {"address": "tfe_variable.variables[\"demo-env\"]", "type": "tfe_variable"}
            ]}}
        }"#;
        let state: State = serde_json::from_str(json).unwrap();
        let addresses: Vec<&str> = state.addresses().collect();
        assert_eq!(
            addresses,
            vec![
                "tfe_workspace.workspace[\"demo\"]",
                "tfe_variable.variables[\"demo-env\"]"
            ]
        );
    }

    #[test]
    fn test_state_tracking() {
        let state = State::tracking(["tfe_workspace.workspace[\"demo\"]"]);
        let resources = &state.values.as_ref().unwrap().root_module.resources;
        assert_eq!(resources[0].resource_type, "tfe_workspace");
    }

    #[test]
    fn test_plan_keeps_unknown_fields() {
        let json = r#"{
            "format_version": "1.2",
            "planned_values": {"root_module": {}},
            "resource_changes": [{
                "address": "tfe_workspace.workspace[\"demo\"]",
                "type": "tfe_workspace",
                "name": "workspace",
                "change": {"actions": ["delete", "create"], "before": {"name": "demo"}}
            }]
        }"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.resource_changes.len(), 1);
        assert!(plan.resource_changes[0].is_delete());
        assert!(plan.other.contains_key("planned_values"));

        let back = serde_json::to_value(&plan).unwrap();
        assert_eq!(back["resource_changes"][0]["change"]["before"]["name"], "demo");
        assert_eq!(back["resource_changes"][0]["name"], "workspace");
    }

    #[test]
    fn test_action_serde() {
        let actions: Vec<Action> = serde_json::from_str(r#"["no-op","create","update"]"#).unwrap();
        assert_eq!(actions, vec![Action::NoOp, Action::Create, Action::Update]);
        assert_eq!(serde_json::to_string(&Action::NoOp).unwrap(), r#""no-op""#);
    }

    #[test]
    fn test_resource_type_of() {
        assert_eq!(resource_type_of("tfe_workspace.workspace[\"a.b\"]"), "tfe_workspace");
        assert_eq!(resource_type_of("data.tfe_team.teams[\"ops\"]"), "tfe_team");
        assert_eq!(resource_type_of("plain"), "plain");
    }
}
