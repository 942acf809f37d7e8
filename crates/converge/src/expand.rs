//! Input expansion.
//!
//! Turns the raw inputs of a run (a base name, optional suffixes, global and
//! per-workspace lists) into one entity per (workspace, item) pair.
//!
//! Per-workspace inputs are keyed by either the full workspace name or the
//! bare suffix; any other key fails with [`Error::UnknownWorkspace`]. One
//! workspace may be addressed by only one key per input.
//!
//! The composite keys `<workspace>-<key>` and `<workspace>-<teamRef>` must be
//! unique across the run: they become instance keys in the document and
//! tracked addresses in state.

use crate::error::{Error, Result};
use crate::model::{AccessGrant, Category, Permissions, Tag, Variable, Workspace, find_workspace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ============================================================================
// Raw inputs
// ============================================================================

/// A variable as written in the inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInput {
    /// Variable key.
    pub key: String,
    /// Variable value.
    #[serde(default)]
    pub value: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `terraform` (default) or `env`.
    #[serde(default)]
    pub category: Category,
    /// Whether the value is write-only.
    #[serde(default)]
    pub sensitive: bool,
}

/// A team access template, applied to every workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAccessInput {
    /// Team name.
    #[serde(default)]
    pub name: Option<String>,
    /// Literal team ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Coarse access level.
    #[serde(default)]
    pub access: Option<String>,
    /// Fine-grained permissions.
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

/// A tag as written in the inputs: `"key"`, `"key:value"` or a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    /// `key` or `key:value`.
    Text(String),
    /// `{ key, value }`.
    Pair {
        /// Tag key.
        key: String,
        /// Optional value.
        #[serde(default)]
        value: Option<String>,
    },
}

impl TagInput {
    fn to_tag(&self) -> Result<Tag> {
        match self {
            Self::Text(text) => Tag::parse(text),
            Self::Pair { key, value } => {
                let key = key.trim();
                if key.is_empty() {
                    return Err(Error::input("tags", "empty tag key"));
                }
                Ok(Tag {
                    key: key.to_string(),
                    value: value.as_ref().map(|v| v.trim().to_string()),
                })
            }
        }
    }
}

/// Everything the expander needs.
#[derive(Debug, Clone, Default)]
pub struct ExpandInput {
    /// Base workspace name.
    pub name: String,
    /// Optional suffixes; none means a single workspace named `name`.
    pub suffixes: Vec<String>,
    /// Variables applied to every workspace.
    pub variables: Vec<VariableInput>,
    /// Variables for one workspace, keyed by name or suffix.
    pub workspace_variables: BTreeMap<String, Vec<VariableInput>>,
    /// Team access templates.
    pub team_access: Vec<TeamAccessInput>,
    /// Tags applied to every workspace.
    pub tags: Vec<TagInput>,
    /// Tags for one workspace, keyed by name or suffix.
    pub workspace_tags: BTreeMap<String, Vec<TagInput>>,
}

// ============================================================================
// Expanded entities
// ============================================================================

/// Fully expanded entities of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Expanded {
    /// Workspaces, in input order.
    pub workspaces: Vec<Workspace>,
    /// Variables, per workspace: globals first, then overrides.
    pub variables: Vec<Variable>,
    /// Access grants, template-major.
    pub grants: Vec<AccessGrant>,
    /// Resolved tags per workspace name. Empty when no tags were given.
    pub tags: BTreeMap<String, Vec<Tag>>,
}

impl Expanded {
    /// Workspace names in order.
    pub fn workspace_names(&self) -> Vec<&str> {
        self.workspaces.iter().map(|ws| ws.name.as_str()).collect()
    }

    /// Look up a workspace by exact name.
    pub fn workspace(&self, name: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|ws| ws.name == name)
    }

    /// Input variables the document expects on `import` and `plan`.
    pub fn vars(&self) -> Result<Vec<tfexec::Var>> {
        Ok(vec![tfexec::Var::json(
            crate::document::WORKSPACE_NAMES_VAR,
            &self.workspace_names(),
        )?])
    }
}

/// Expand all inputs.
pub fn expand(input: &ExpandInput) -> Result<Expanded> {
    let workspaces = expand_workspaces(&input.name, &input.suffixes)?;
    let variables = expand_variables(&workspaces, &input.variables, &input.workspace_variables)?;
    let grants = expand_grants(&workspaces, &input.team_access)?;
    let tags = expand_tags(&workspaces, &input.tags, &input.workspace_tags)?;

    ensure_unique_keys(
        "variables",
        variables
            .iter()
            .map(|v| (v.address_key(), format!("{:?} on {}", v.key, v.workspace))),
    )?;
    ensure_unique_keys(
        "team_access",
        grants
            .iter()
            .map(|g| (g.address_key(), format!("team {:?} on {}", g.team_ref(), g.workspace))),
    )?;

    log::debug!(
        "expanded {} workspaces, {} variables, {} grants",
        workspaces.len(),
        variables.len(),
        grants.len()
    );

    Ok(Expanded {
        workspaces,
        variables,
        grants,
        tags,
    })
}

/// Build the workspace set from a base name and suffixes.
///
/// Suffixes are trimmed; blank ones are ignored and repeats collapse into one
/// workspace.
pub fn expand_workspaces(base: &str, suffixes: &[String]) -> Result<Vec<Workspace>> {
    let base = base.trim();
    if base.is_empty() {
        return Err(Error::input("name", "workspace name must not be empty"));
    }

    let mut workspaces: Vec<Workspace> = Vec::new();
    for suffix in suffixes.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if workspaces.iter().any(|ws| ws.suffix.as_deref() == Some(suffix)) {
            log::warn!("Duplicate workspace suffix {suffix:?} ignored");
            continue;
        }
        workspaces.push(Workspace {
            name: format!("{base}-{suffix}"),
            suffix: Some(suffix.to_string()),
            remote_id: None,
        });
    }

    if workspaces.is_empty() {
        workspaces.push(Workspace::new(base));
    }

    Ok(workspaces)
}

/// Expand global and per-workspace variables.
///
/// A later entry for the same (workspace, key) replaces the earlier one in
/// place, so per-workspace values override globals.
pub fn expand_variables(
    workspaces: &[Workspace],
    globals: &[VariableInput],
    per_workspace: &BTreeMap<String, Vec<VariableInput>>,
) -> Result<Vec<Variable>> {
    let overrides = by_workspace(workspaces, per_workspace, "workspace_variables")?;

    let mut variables: Vec<Variable> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for ws in workspaces {
        let local = overrides.get(ws.name.as_str()).copied().unwrap_or_default();
        for input in globals.iter().chain(local) {
            let variable = to_variable(input, ws)?;
            let slot = (variable.workspace.clone(), variable.key.clone());
            match index.get(&slot) {
                Some(&i) => {
                    log::debug!("variable {} overridden", variable.address_key());
                    variables[i] = variable;
                }
                None => {
                    index.insert(slot, variables.len());
                    variables.push(variable);
                }
            }
        }
    }

    Ok(variables)
}

fn to_variable(input: &VariableInput, ws: &Workspace) -> Result<Variable> {
    let key = input.key.trim();
    if key.is_empty() {
        return Err(Error::input("variables", "variable key must not be empty"));
    }
    Ok(Variable {
        key: key.to_string(),
        value: input.value.clone(),
        description: input.description.clone().filter(|d| !d.is_empty()),
        category: input.category,
        sensitive: input.sensitive,
        workspace: ws.name.clone(),
    })
}

/// Cross every team template with every workspace.
pub fn expand_grants(
    workspaces: &[Workspace],
    templates: &[TeamAccessInput],
) -> Result<Vec<AccessGrant>> {
    let mut grants = Vec::with_capacity(templates.len() * workspaces.len());

    for template in templates {
        let name = template.name.as_deref().map(str::trim).unwrap_or_default();
        let id = template
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        if name.is_empty() && id.is_none() {
            return Err(Error::input("team_access", "each entry needs a team name or id"));
        }

        // Fine-grained permissions only apply to custom access
        let access = template
            .access
            .clone()
            .or_else(|| template.permissions.as_ref().map(|_| "custom".to_string()));

        for ws in workspaces {
            grants.push(AccessGrant {
                team_name: if name.is_empty() {
                    id.unwrap_or_default().to_string()
                } else {
                    name.to_string()
                },
                team_id: id.map(String::from),
                access: access.clone(),
                permissions: template.permissions.clone(),
                workspace: ws.name.clone(),
            });
        }
    }

    Ok(grants)
}

/// Resolve tags per workspace: globals merged with overrides, override wins.
///
/// Returns an empty map when no tags were given at all.
pub fn expand_tags(
    workspaces: &[Workspace],
    globals: &[TagInput],
    per_workspace: &BTreeMap<String, Vec<TagInput>>,
) -> Result<BTreeMap<String, Vec<Tag>>> {
    let overrides = by_workspace(workspaces, per_workspace, "workspace_tags")?;

    if globals.is_empty() && overrides.values().all(|tags| tags.is_empty()) {
        return Ok(BTreeMap::new());
    }

    let mut resolved = BTreeMap::new();
    for ws in workspaces {
        let mut merged = dedupe_tags(&ws.name, globals.iter())?;
        let local = overrides.get(ws.name.as_str()).copied().unwrap_or_default();
        for tag in dedupe_tags(&ws.name, local.iter())? {
            match merged.iter_mut().find(|t| t.key == tag.key) {
                Some(existing) => *existing = tag,
                None => merged.push(tag),
            }
        }
        resolved.insert(ws.name.clone(), merged);
    }

    Ok(resolved)
}

/// Resolve per-workspace input keys to workspace names.
///
/// Addressing one workspace by both its full name and its suffix is rejected,
/// as the two lists would have no defined order.
fn by_workspace<'a, T>(
    workspaces: &'a [Workspace],
    per_workspace: &'a BTreeMap<String, Vec<T>>,
    field: &str,
) -> Result<HashMap<&'a str, &'a [T]>> {
    let mut resolved: HashMap<&str, (&str, &[T])> = HashMap::new();
    for (key, inputs) in per_workspace {
        let ws = find_workspace(workspaces, key).ok_or_else(|| Error::UnknownWorkspace {
            field: field.to_string(),
            name: key.clone(),
        })?;
        let previous = resolved.insert(ws.name.as_str(), (key.as_str(), inputs.as_slice()));
        if let Some((other, _)) = previous {
            return Err(Error::input(
                field,
                format!("{other:?} and {key:?} both refer to workspace {}", ws.name),
            ));
        }
    }
    Ok(resolved
        .into_iter()
        .map(|(name, (_, inputs))| (name, inputs))
        .collect())
}

/// Reject two entities that share one composite key.
fn ensure_unique_keys(field: &str, entries: impl Iterator<Item = (String, String)>) -> Result<()> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for (key, origin) in entries {
        if let Some(first) = seen.get(&key) {
            return Err(Error::input(
                field,
                format!("{first} and {origin} both map to key {key:?}"),
            ));
        }
        seen.insert(key, origin);
    }
    Ok(())
}

/// Collapse repeats within one precedence level, rejecting conflicting values.
fn dedupe_tags<'a>(
    workspace: &str,
    inputs: impl Iterator<Item = &'a TagInput>,
) -> Result<Vec<Tag>> {
    let mut tags: Vec<Tag> = Vec::new();
    for input in inputs {
        let tag = input.to_tag()?;
        match tags.iter().find(|t| t.key == tag.key) {
            Some(existing) if existing.value != tag.value => {
                return Err(Error::AmbiguousTag {
                    workspace: workspace.to_string(),
                    key: tag.key,
                    first: display_value(existing.value.as_deref()).to_string(),
                    second: display_value(tag.value.as_deref()).to_string(),
                });
            }
            Some(_) => {}
            None => tags.push(tag),
        }
    }
    Ok(tags)
}

fn display_value(value: Option<&str>) -> impl fmt::Display + '_ {
    value.unwrap_or("<none>")
}
