//! Configuration synthesis.
//!
//! Assembles expanded entities into one [`Document`]. The workspace resource
//! is a single block iterated over `var.workspace_names`; variables and team
//! access grants are single blocks iterated over maps keyed by the same
//! composite keys the reconciler imports under.

use crate::document::{
    Block, Document, DynamicPermissions, TeamAccessEntry, TeamAccessResource, TeamLookup,
    TeamLookupEntry, VariableDecl, VariableEntry, VariablesResource, VcsRepo, WORKSPACE_NAMES_VAR,
    WORKSPACE_TAGS_VAR, WorkspaceResource,
};
use crate::error::{Error, Result};
use crate::expand::Expanded;
use crate::model::{
    Backend, Provider, RemoteStateReference, TEAM_ACCESS_KIND, TEAMS_BLOCK, VARIABLE_KIND,
    VARIABLES_BLOCK, WORKSPACE_BLOCK, WORKSPACE_KIND,
};
use std::collections::BTreeMap;

/// VCS settings of the workspace resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsOptions {
    /// Repository identifier, e.g. `org/repo`.
    pub repo: Option<String>,
    /// OAuth token ID; looked up by `vcs_type` when absent.
    pub token_id: Option<String>,
    /// Service provider used for the token lookup, e.g. `github`.
    pub vcs_type: Option<String>,
    /// Whether submodules are fetched.
    pub ingress_submodules: bool,
}

/// Settings of the workspace resource shared by every workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceOptions {
    pub organization: String,
    pub agent_pool_id: Option<String>,
    pub auto_apply: Option<bool>,
    pub execution_mode: Option<String>,
    pub file_triggers_enabled: Option<bool>,
    pub global_remote_state: Option<bool>,
    /// Comma separated workspace IDs allowed to read state when global
    /// remote state is off.
    pub remote_state_consumer_ids: Option<String>,
    pub queue_all_runs: Option<bool>,
    pub speculative_enabled: Option<bool>,
    pub terraform_version: Option<String>,
    pub ssh_key_id: Option<String>,
    pub working_directory: Option<String>,
    pub vcs: VcsOptions,
}

/// Everything besides the expanded entities that goes into a document.
#[derive(Debug, Clone, Default)]
pub struct SynthInput {
    /// Workspace resource settings.
    pub workspace: WorkspaceOptions,
    /// Remote state lookups.
    pub remote_states: Vec<RemoteStateReference>,
    /// Providers.
    pub providers: Vec<Provider>,
    /// State backend; `local` when absent.
    pub backend: Option<Backend>,
}

/// Build the document for a run.
///
/// The client is only used to resolve a VCS token by provider type.
pub fn synthesize(client: &tfe::Client, expanded: &Expanded, input: &SynthInput) -> Result<Document> {
    let organization = input.workspace.organization.trim();
    if organization.is_empty() {
        return Err(Error::input("organization", "organization must not be empty"));
    }

    let backend = input.backend.clone().unwrap_or_default();
    let mut doc = Document::new(&backend);

    doc.declare_variable(
        WORKSPACE_NAMES_VAR,
        VariableDecl {
            type_constraint: "set(string)".to_string(),
            default: None,
            description: None,
        },
    );

    let mut workspace = workspace_resource(client, &input.workspace)?;
    if !expanded.tags.is_empty() {
        doc.declare_variable(WORKSPACE_TAGS_VAR, tags_variable(expanded));
        workspace.tag_names = Some(format!("${{var.{WORKSPACE_TAGS_VAR}[each.value]}}"));
    }
    doc.insert_resource(
        WORKSPACE_KIND,
        WORKSPACE_BLOCK,
        Block::Workspace(Box::new(workspace)),
    );

    for remote_state in &input.remote_states {
        doc.insert_data(
            "terraform_remote_state",
            &remote_state.name,
            Block::RemoteState(remote_state.clone()),
        );
    }

    add_variables(&mut doc, expanded);
    add_team_access(&mut doc, expanded, organization);

    for provider in &input.providers {
        doc.add_provider(provider);
    }

    Ok(doc)
}

/// Build the workspace resource block.
pub fn workspace_resource(client: &tfe::Client, options: &WorkspaceOptions) -> Result<WorkspaceResource> {
    let mut ws = WorkspaceResource {
        for_each: format!("${{var.{WORKSPACE_NAMES_VAR}}}"),
        name: "${each.value}".to_string(),
        organization: options.organization.trim().to_string(),
        auto_apply: options.auto_apply,
        file_triggers_enabled: options.file_triggers_enabled,
        queue_all_runs: options.queue_all_runs,
        speculative_enabled: options.speculative_enabled,
        terraform_version: non_empty(options.terraform_version.as_deref()),
        ssh_key_id: non_empty(options.ssh_key_id.as_deref()),
        working_directory: non_empty(options.working_directory.as_deref()),
        ..Default::default()
    };

    ws.vcs_repo = vcs_repo(client, &ws.organization, &options.vcs)?;

    match non_empty(options.agent_pool_id.as_deref()) {
        Some(pool) => {
            if let Some(mode) = non_empty(options.execution_mode.as_deref())
                && mode != "agent"
            {
                log::warn!("execution mode {mode:?} ignored, an agent pool forces \"agent\"");
            }
            ws.agent_pool_id = Some(pool);
            ws.execution_mode = Some("agent".to_string());
        }
        None => ws.execution_mode = non_empty(options.execution_mode.as_deref()),
    }

    match options.global_remote_state {
        Some(false) => {
            ws.global_remote_state = Some(false);
            ws.remote_state_consumer_ids = options
                .remote_state_consumer_ids
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }
        Some(true) => ws.global_remote_state = Some(true),
        None => {}
    }

    Ok(ws)
}

fn vcs_repo(client: &tfe::Client, organization: &str, vcs: &VcsOptions) -> Result<Option<VcsRepo>> {
    let repo = non_empty(vcs.repo.as_deref());
    let token_id = non_empty(vcs.token_id.as_deref());
    let vcs_type = non_empty(vcs.vcs_type.as_deref());

    let Some(repo) = repo else {
        if vcs_type.is_some() || token_id.is_some() {
            return Err(Error::input(
                "vcs_repo",
                "a VCS repository is required when a VCS type or token ID is given",
            ));
        }
        return Ok(None);
    };

    let oauth_token_id = match (token_id, vcs_type) {
        (Some(token), _) => token,
        (None, Some(vcs_type)) => resolve_vcs_token(client, organization, &vcs_type)?,
        (None, None) => {
            return Err(Error::input(
                "vcs_repo",
                "a VCS token ID or VCS type is required with a VCS repository",
            ));
        }
    };

    Ok(Some(VcsRepo {
        identifier: repo,
        oauth_token_id,
        ingress_submodules: vcs.ingress_submodules,
    }))
}

/// First token of the first OAuth client whose provider is `vcs_type`.
pub fn resolve_vcs_token(client: &tfe::Client, organization: &str, vcs_type: &str) -> Result<String> {
    let clients = client.oauth_clients(organization)?;
    let matched = clients
        .into_iter()
        .find(|c| c.service_provider == vcs_type)
        .ok_or_else(|| Error::VcsClientNotFound {
            organization: organization.to_string(),
            vcs_type: vcs_type.to_string(),
        })?;

    log::debug!("using VCS client {} ({})", matched.id, matched.service_provider_name);

    matched
        .token_ids
        .first()
        .cloned()
        .ok_or(Error::VcsTokenNotFound {
            client_id: matched.id,
            client_name: matched.service_provider_name,
        })
}

fn tags_variable(expanded: &Expanded) -> VariableDecl {
    let default: BTreeMap<&str, Vec<String>> = expanded
        .workspaces
        .iter()
        .map(|ws| {
            let tags = expanded
                .tags
                .get(&ws.name)
                .map(|tags| tags.iter().map(ToString::to_string).collect())
                .unwrap_or_default();
            (ws.name.as_str(), tags)
        })
        .collect();

    VariableDecl {
        type_constraint: "map(list(string))".to_string(),
        default: serde_json::to_value(default).ok(),
        description: Some("Tag names per workspace".to_string()),
    }
}

fn add_variables(doc: &mut Document, expanded: &Expanded) {
    if expanded.variables.is_empty() {
        return;
    }

    let for_each = expanded
        .variables
        .iter()
        .map(|var| {
            let workspace_id = expanded
                .workspace(&var.workspace)
                .map(|ws| ws.id_ref())
                .unwrap_or_default();
            let entry = VariableEntry {
                key: var.key.clone(),
                value: var.value.clone(),
                description: var.description.clone(),
                category: var.category.to_string(),
                sensitive: var.sensitive,
                workspace_id,
            };
            (var.address_key(), entry)
        })
        .collect();

    doc.insert_resource(
        VARIABLE_KIND,
        VARIABLES_BLOCK,
        Block::Variables(VariablesResource {
            for_each,
            key: each("key"),
            value: each("value"),
            description: each("description"),
            category: each("category"),
            sensitive: each("sensitive"),
            workspace_id: each("workspace_id"),
        }),
    );
}

fn add_team_access(doc: &mut Document, expanded: &Expanded, organization: &str) {
    if expanded.grants.is_empty() {
        return;
    }

    let mut lookups = BTreeMap::new();
    let mut for_each = BTreeMap::new();

    for grant in &expanded.grants {
        if grant.team_id.is_none() {
            lookups.insert(
                grant.team_name.clone(),
                TeamLookupEntry {
                    name: grant.team_name.clone(),
                    organization: organization.to_string(),
                },
            );
        }

        let workspace_id = expanded
            .workspace(&grant.workspace)
            .map(|ws| ws.id_ref())
            .unwrap_or_default();

        for_each.insert(
            grant.address_key(),
            TeamAccessEntry {
                team_id: grant.team_id_ref(),
                workspace_id,
                access: grant.access.clone(),
                permissions: grant.permissions.clone(),
            },
        );
    }

    if !lookups.is_empty() {
        doc.insert_data(
            "tfe_team",
            TEAMS_BLOCK,
            Block::TeamLookup(TeamLookup {
                for_each: lookups,
                name: each("name"),
                organization: each("organization"),
            }),
        );
    }

    doc.insert_resource(
        TEAM_ACCESS_KIND,
        TEAMS_BLOCK,
        Block::TeamAccess(TeamAccessResource {
            for_each,
            team_id: each("team_id"),
            workspace_id: each("workspace_id"),
            access: r#"${lookup(each.value, "access", null)}"#.to_string(),
            dynamic: DynamicPermissions::from_each_value(),
        }),
    );
}

/// `${each.value.<field>}`
fn each(field: &str) -> String {
    format!("${{each.value.{field}}}")
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Remote state references from a `{ <name>: { backend, config } }` map.
pub fn remote_states(map: BTreeMap<String, RemoteStateReference>) -> Vec<RemoteStateReference> {
    map.into_iter()
        .map(|(name, mut reference)| {
            reference.name = name;
            reference
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::{ExpandInput, TagInput, TeamAccessInput, VariableInput, expand};
    use crate::model::Permissions;
    use serde_json::json;
    use tfe::{Client, MockBackend, OAuthClient};

    fn client() -> Client {
        Client::with_backend(Box::new(MockBackend::new()))
    }

    fn options() -> WorkspaceOptions {
        WorkspaceOptions {
            organization: "acme".to_string(),
            ..Default::default()
        }
    }

    fn input() -> SynthInput {
        SynthInput {
            workspace: options(),
            providers: vec![Provider::tfe("app.terraform.io", "~> 0.40")],
            ..Default::default()
        }
    }

    fn expanded(name: &str, suffixes: &[&str], variables: Vec<VariableInput>) -> Expanded {
        expand(&ExpandInput {
            name: name.to_string(),
            suffixes: suffixes.iter().map(|s| (*s).to_string()).collect(),
            variables,
            ..Default::default()
        })
        .unwrap()
    }

    fn oauth_client(id: &str, provider: &str, tokens: &[&str]) -> OAuthClient {
        OAuthClient {
            id: id.to_string(),
            service_provider: provider.to_string(),
            service_provider_name: provider.to_uppercase(),
            token_ids: tokens.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    #[test]
    fn test_single_workspace_document() {
        let doc = synthesize(&client(), &expanded("demo", &[], vec![]), &input()).unwrap();
        let value = doc.to_value().unwrap();

        let resources = value["resource"].as_object().unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(
            value["resource"]["tfe_workspace"]["workspace"],
            json!({
                "for_each": "${var.workspace_names}",
                "name": "${each.value}",
                "organization": "acme"
            })
        );
        assert!(value.get("data").is_none());
        assert_eq!(value["terraform"]["backend"], json!({"local": {}}));
        assert_eq!(value["variable"]["workspace_names"]["type"], "set(string)");
        assert!(value["variable"].get("workspace_tags").is_none());
    }

    #[test]
    fn test_variables_keyed_per_workspace() {
        let vars = vec![VariableInput {
            key: "env".into(),
            value: "x".into(),
            ..Default::default()
        }];
        let expanded = expanded("demo", &["staging", "production"], vars);
        let doc = synthesize(&client(), &expanded, &input()).unwrap();
        let value = doc.to_value().unwrap();

        let block = &value["resource"]["tfe_variable"]["variables"];
        let keys: Vec<&String> = block["for_each"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["demo-production-env", "demo-staging-env"]);
        assert_eq!(
            block["for_each"]["demo-staging-env"],
            json!({
                "key": "env",
                "value": "x",
                "description": null,
                "category": "terraform",
                "sensitive": false,
                "workspace_id": "${tfe_workspace.workspace[\"demo-staging\"].id}"
            })
        );
        assert_eq!(block["key"], "${each.value.key}");
        assert_eq!(block["workspace_id"], "${each.value.workspace_id}");
    }

    #[test]
    fn test_team_access_by_name_and_id() {
        let expanded = expand(&ExpandInput {
            name: "demo".into(),
            team_access: vec![
                TeamAccessInput {
                    name: Some("owners".into()),
                    access: Some("admin".into()),
                    ..Default::default()
                },
                TeamAccessInput {
                    name: Some("ops".into()),
                    id: Some("team-42".into()),
                    permissions: Some(Permissions {
                        runs: "apply".into(),
                        variables: "read".into(),
                        state_versions: "read".into(),
                        sentinel_mocks: "none".into(),
                        workspace_locking: false,
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        })
        .unwrap();

        let doc = synthesize(&client(), &expanded, &input()).unwrap();
        let value = doc.to_value().unwrap();

        let lookup = &value["data"]["tfe_team"]["teams"];
        assert_eq!(
            lookup["for_each"],
            json!({"owners": {"name": "owners", "organization": "acme"}})
        );
        assert_eq!(lookup["name"], "${each.value.name}");

        let access = &value["resource"]["tfe_team_access"]["teams"];
        assert_eq!(
            access["for_each"]["demo-owners"]["team_id"],
            "${data.tfe_team.teams[\"owners\"].id}"
        );
        assert_eq!(access["for_each"]["demo-owners"]["access"], "admin");
        assert!(access["for_each"]["demo-owners"].get("permissions").is_none());

        let custom = &access["for_each"]["demo-team-42"];
        assert_eq!(custom["team_id"], "team-42");
        assert_eq!(custom["access"], "custom");
        assert_eq!(custom["permissions"]["runs"], "apply");
        assert_eq!(access["access"], "${lookup(each.value, \"access\", null)}");
        assert!(access["dynamic"]["permissions"].is_array());
    }

    #[test]
    fn test_remote_states_and_backend() {
        let mut states = BTreeMap::new();
        states.insert(
            "network".to_string(),
            RemoteStateReference {
                name: String::new(),
                backend: "s3".into(),
                config: json!({"bucket": "tf", "key": "network"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            },
        );

        let mut backend = BTreeMap::new();
        backend.insert("s3".to_string(), json!({"bucket": "state"}));

        let synth_input = SynthInput {
            remote_states: remote_states(states),
            backend: Some(Backend::from_map(backend).unwrap()),
            ..input()
        };
        let doc = synthesize(&client(), &expanded("demo", &[], vec![]), &synth_input).unwrap();
        let value = doc.to_value().unwrap();

        assert_eq!(
            value["data"]["terraform_remote_state"]["network"],
            json!({"backend": "s3", "config": {"bucket": "tf", "key": "network"}})
        );
        assert_eq!(value["terraform"]["backend"], json!({"s3": {"bucket": "state"}}));
    }

    #[test]
    fn test_tags_variable() {
        let mut per_ws = BTreeMap::new();
        per_ws.insert("a".to_string(), vec![TagInput::Text("env:a".into())]);
        let expanded = expand(&ExpandInput {
            name: "demo".into(),
            suffixes: vec!["a".into(), "b".into()],
            workspace_tags: per_ws,
            ..Default::default()
        })
        .unwrap();

        let doc = synthesize(&client(), &expanded, &input()).unwrap();
        let value = doc.to_value().unwrap();

        assert_eq!(
            value["variable"]["workspace_tags"]["default"],
            json!({"demo-a": ["env:a"], "demo-b": []})
        );
        assert_eq!(
            value["resource"]["tfe_workspace"]["workspace"]["tag_names"],
            "${var.workspace_tags[each.value]}"
        );
    }

    #[test]
    fn test_agent_pool_forces_agent_mode() {
        let ws = workspace_resource(
            &client(),
            &WorkspaceOptions {
                agent_pool_id: Some("apool-1".into()),
                execution_mode: Some("remote".into()),
                ..options()
            },
        )
        .unwrap();
        assert_eq!(ws.agent_pool_id.as_deref(), Some("apool-1"));
        assert_eq!(ws.execution_mode.as_deref(), Some("agent"));

        let ws = workspace_resource(
            &client(),
            &WorkspaceOptions {
                execution_mode: Some("local".into()),
                ..options()
            },
        )
        .unwrap();
        assert_eq!(ws.execution_mode.as_deref(), Some("local"));
        assert!(ws.agent_pool_id.is_none());
    }

    #[test]
    fn test_global_remote_state_encodings() {
        let off = workspace_resource(
            &client(),
            &WorkspaceOptions {
                global_remote_state: Some(false),
                remote_state_consumer_ids: Some("ws-1, ws-2,,".into()),
                ..options()
            },
        )
        .unwrap();
        assert_eq!(off.global_remote_state, Some(false));
        assert_eq!(off.remote_state_consumer_ids, vec!["ws-1", "ws-2"]);

        let on = workspace_resource(
            &client(),
            &WorkspaceOptions {
                global_remote_state: Some(true),
                remote_state_consumer_ids: Some("ws-1".into()),
                ..options()
            },
        )
        .unwrap();
        assert_eq!(on.global_remote_state, Some(true));
        assert!(on.remote_state_consumer_ids.is_empty());

        let unset = workspace_resource(&client(), &options()).unwrap();
        assert!(unset.global_remote_state.is_none());
        let value = serde_json::to_value(&unset).unwrap();
        assert!(value.get("remote_state_consumer_ids").is_none());
    }

    #[test]
    fn test_vcs_token_resolved_by_type() {
        let mock = MockBackend::new();
        mock.add_oauth_client("acme", oauth_client("oc-1", "gitlab_hosted", &["ot-9"]));
        mock.add_oauth_client("acme", oauth_client("oc-2", "github", &["ot-1", "ot-2"]));
        let client = Client::with_backend(Box::new(mock));

        let ws = workspace_resource(
            &client,
            &WorkspaceOptions {
                vcs: VcsOptions {
                    repo: Some("acme/infra".into()),
                    vcs_type: Some("github".into()),
                    ingress_submodules: true,
                    ..Default::default()
                },
                ..options()
            },
        )
        .unwrap();

        assert_eq!(
            ws.vcs_repo,
            Some(VcsRepo {
                identifier: "acme/infra".into(),
                oauth_token_id: "ot-1".into(),
                ingress_submodules: true,
            })
        );
    }

    #[test]
    fn test_explicit_vcs_token_skips_lookup() {
        let mock = MockBackend::new();
        let client = Client::with_backend(Box::new(mock.clone()));

        let ws = workspace_resource(
            &client,
            &WorkspaceOptions {
                vcs: VcsOptions {
                    repo: Some("acme/infra".into()),
                    token_id: Some("ot-explicit".into()),
                    vcs_type: Some("github".into()),
                    ..Default::default()
                },
                ..options()
            },
        )
        .unwrap();

        assert_eq!(ws.vcs_repo.unwrap().oauth_token_id, "ot-explicit");
        assert_eq!(mock.calls("list_oauth_clients"), 0);
    }

    #[test]
    fn test_vcs_client_not_found() {
        let mock = MockBackend::new();
        mock.add_oauth_client("acme", oauth_client("oc-1", "gitlab_hosted", &["ot-9"]));
        let client = Client::with_backend(Box::new(mock));

        let result = resolve_vcs_token(&client, "acme", "github");
        assert!(matches!(result, Err(Error::VcsClientNotFound { .. })));
    }

    #[test]
    fn test_vcs_token_not_found() {
        let mock = MockBackend::new();
        mock.add_oauth_client("acme", oauth_client("oc-1", "github", &[]));
        let client = Client::with_backend(Box::new(mock));

        match resolve_vcs_token(&client, "acme", "github") {
            Err(Error::VcsTokenNotFound { client_id, .. }) => assert_eq!(client_id, "oc-1"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_vcs_validation() {
        let needs_repo = workspace_resource(
            &client(),
            &WorkspaceOptions {
                vcs: VcsOptions {
                    vcs_type: Some("github".into()),
                    ..Default::default()
                },
                ..options()
            },
        );
        assert!(matches!(needs_repo, Err(Error::InputParse { .. })));

        let needs_token = workspace_resource(
            &client(),
            &WorkspaceOptions {
                vcs: VcsOptions {
                    repo: Some("acme/infra".into()),
                    ..Default::default()
                },
                ..options()
            },
        );
        assert!(matches!(needs_token, Err(Error::InputParse { .. })));
    }

    #[test]
    fn test_missing_organization() {
        let synth_input = SynthInput {
            workspace: WorkspaceOptions::default(),
            ..input()
        };
        let result = synthesize(&client(), &expanded("demo", &[], vec![]), &synth_input);
        assert!(matches!(result, Err(Error::InputParse { .. })));
    }

    #[test]
    fn test_provider_section() {
        let doc = synthesize(&client(), &expanded("demo", &[], vec![]), &input()).unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value["provider"]["tfe"]["hostname"], "app.terraform.io");
        assert_eq!(
            value["terraform"]["required_providers"]["tfe"]["version"],
            "~> 0.40"
        );
    }
}
