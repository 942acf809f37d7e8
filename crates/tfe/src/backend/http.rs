//! Terraform Cloud / Enterprise HTTP backend.
//!
//! Speaks the JSON:API dialect served under `https://<host>/api/v2`. Every
//! request is a blocking GET authenticated with a bearer token.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{OAuthClient, Page, PageRequest, Team, TeamAccess, Variable, Workspace};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("tfe-rs/", env!("CARGO_PKG_VERSION"));
const CONTENT_TYPE: &str = "application/vnd.api+json";

/// HTTP backend for a Terraform Cloud / Enterprise host.
///
/// # Example
///
/// ```no_run
/// use tfe::backend::http::HttpBackend;
/// use tfe::backend::Backend;
///
/// let backend = HttpBackend::new("app.terraform.io", "token");
/// let ws = backend.read_workspace("acme", "demo").unwrap();
/// println!("exists: {}", ws.is_some());
/// ```
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API base URL, e.g. `https://app.terraform.io/api/v2`.
    api_base: String,
    /// Bearer token.
    token: String,
}

impl HttpBackend {
    /// Create a backend for a host name such as `app.terraform.io`.
    #[must_use]
    pub fn new(host: &str, token: impl Into<String>) -> Self {
        Self::with_api_base(format!("https://{}/api/v2", host.trim_end_matches('/')), token)
    }

    /// Create a backend with a custom API base (for testing).
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
            token: token.into(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn workspace_url(&self, organization: &str, name: &str) -> String {
        format!(
            "{}/organizations/{}/workspaces/{}",
            self.api_base, organization, name
        )
    }

    fn workspaces_url(&self, organization: &str) -> String {
        format!("{}/organizations/{}/workspaces", self.api_base, organization)
    }

    fn variables_url(&self, workspace_id: &str) -> String {
        format!("{}/workspaces/{}/vars", self.api_base, workspace_id)
    }

    fn teams_url(&self, organization: &str) -> String {
        format!("{}/organizations/{}/teams", self.api_base, organization)
    }

    fn team_access_url(&self) -> String {
        format!("{}/team-workspaces", self.api_base)
    }

    fn oauth_clients_url(&self, organization: &str) -> String {
        format!("{}/organizations/{}/oauth-clients", self.api_base, organization)
    }

    fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        log::debug!("GET {url} {query:?}");

        let mut request = self
            .agent
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", CONTENT_TYPE)
            .header("Content-Type", CONTENT_TYPE)
            .header("User-Agent", USER_AGENT);

        for (key, value) in query {
            request = request.query(*key, value);
        }

        let body = request.call()?.body_mut().read_json()?;
        Ok(body)
    }

    fn get_page<A, R, T>(
        &self,
        url: &str,
        mut query: Vec<(&str, String)>,
        page: PageRequest,
        convert: impl Fn(Resource<A, R>) -> Result<T>,
    ) -> Result<Page<T>>
    where
        A: DeserializeOwned,
        R: DeserializeOwned + Default,
    {
        query.push(("page[number]", page.number.to_string()));
        query.push(("page[size]", page.size.to_string()));

        let document: ListDocument<A, R> = self.get(url, &query)?;
        let items = document
            .data
            .into_iter()
            .map(convert)
            .collect::<Result<Vec<_>>>()?;

        let pagination = document.meta.and_then(|m| m.pagination);
        Ok(Page {
            items,
            current_page: pagination
                .as_ref()
                .map_or(page.number, |p| p.current_page),
            next_page: pagination.and_then(|p| p.next_page),
        })
    }
}

impl Backend for HttpBackend {
    fn read_workspace(&self, organization: &str, name: &str) -> Result<Option<Workspace>> {
        let url = self.workspace_url(organization, name);

        match self.get::<SingleDocument<WorkspaceAttributes>>(&url, &[]) {
            Ok(document) => Ok(Some(document.data.into())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn list_workspaces(
        &self,
        organization: &str,
        search: &str,
        page: PageRequest,
    ) -> Result<Page<Workspace>> {
        let query = vec![("search[name]", search.to_string())];
        self.get_page(
            &self.workspaces_url(organization),
            query,
            page,
            |r: Resource<WorkspaceAttributes, NoRelationships>| Ok(r.into()),
        )
    }

    fn list_variables(&self, workspace_id: &str, page: PageRequest) -> Result<Page<Variable>> {
        self.get_page(
            &self.variables_url(workspace_id),
            Vec::new(),
            page,
            |r: Resource<VariableAttributes, NoRelationships>| {
                Ok(Variable {
                    id: r.id,
                    key: r.attributes.key,
                    category: r.attributes.category,
                })
            },
        )
    }

    fn list_teams(&self, organization: &str, page: PageRequest) -> Result<Page<Team>> {
        self.get_page(
            &self.teams_url(organization),
            Vec::new(),
            page,
            |r: Resource<TeamAttributes, NoRelationships>| {
                Ok(Team {
                    id: r.id,
                    name: r.attributes.name,
                })
            },
        )
    }

    fn list_team_access(&self, workspace_id: &str, page: PageRequest) -> Result<Page<TeamAccess>> {
        let query = vec![("filter[workspace][id]", workspace_id.to_string())];
        self.get_page(
            &self.team_access_url(),
            query,
            page,
            |r: Resource<TeamAccessAttributes, TeamAccessRelationships>| {
                let team_id = r
                    .relationships
                    .team
                    .map(|rel| rel.data.id)
                    .ok_or_else(|| {
                        Error::InvalidResponse(format!("team access {} has no team", r.id))
                    })?;
                Ok(TeamAccess {
                    id: r.id,
                    access: r.attributes.access,
                    team_id,
                })
            },
        )
    }

    fn list_oauth_clients(
        &self,
        organization: &str,
        page: PageRequest,
    ) -> Result<Page<OAuthClient>> {
        self.get_page(
            &self.oauth_clients_url(organization),
            Vec::new(),
            page,
            |r: Resource<OAuthClientAttributes, OAuthClientRelationships>| Ok(r.into()),
        )
    }
}

// =============================================================================
// JSON:API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SingleDocument<A> {
    data: Resource<A, NoRelationships>,
}

#[derive(Debug, Deserialize)]
struct ListDocument<A, R: Default> {
    data: Vec<Resource<A, R>>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Resource<A, R: Default> {
    id: String,
    attributes: A,
    #[serde(default)]
    relationships: R,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(rename = "current-page")]
    current_page: u32,
    #[serde(rename = "next-page")]
    next_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NoRelationships {}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: RelationshipData,
}

#[derive(Debug, Deserialize)]
struct RelationshipData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RelationshipList {
    #[serde(default)]
    data: Vec<RelationshipData>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceAttributes {
    name: String,
}

#[derive(Debug, Deserialize)]
struct VariableAttributes {
    key: String,
    category: String,
}

#[derive(Debug, Deserialize)]
struct TeamAttributes {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TeamAccessAttributes {
    access: String,
}

#[derive(Debug, Default, Deserialize)]
struct TeamAccessRelationships {
    team: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct OAuthClientAttributes {
    #[serde(rename = "service-provider")]
    service_provider: String,
    #[serde(rename = "service-provider-display-name", default)]
    service_provider_display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OAuthClientRelationships {
    #[serde(rename = "oauth-tokens")]
    oauth_tokens: Option<RelationshipList>,
}

impl From<Resource<WorkspaceAttributes, NoRelationships>> for Workspace {
    fn from(r: Resource<WorkspaceAttributes, NoRelationships>) -> Self {
        Self {
            id: r.id,
            name: r.attributes.name,
        }
    }
}

impl From<Resource<OAuthClientAttributes, OAuthClientRelationships>> for OAuthClient {
    fn from(r: Resource<OAuthClientAttributes, OAuthClientRelationships>) -> Self {
        let token_ids = r
            .relationships
            .oauth_tokens
            .map(|list| list.data.into_iter().map(|d| d.id).collect())
            .unwrap_or_default();

        Self {
            id: r.id,
            service_provider_name: r
                .attributes
                .service_provider_display_name
                .unwrap_or_else(|| r.attributes.service_provider.clone()),
            service_provider: r.attributes.service_provider,
            token_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_from_host() {
        let backend = HttpBackend::new("app.terraform.io", "t");
        assert_eq!(backend.api_base(), "https://app.terraform.io/api/v2");

        let trailing = HttpBackend::new("tfe.example.com/", "t");
        assert_eq!(trailing.api_base(), "https://tfe.example.com/api/v2");
    }

    #[test]
    fn test_urls() {
        let backend = HttpBackend::with_api_base("https://custom.api.com/api/v2", "t");
        assert_eq!(
            backend.workspace_url("acme", "demo"),
            "https://custom.api.com/api/v2/organizations/acme/workspaces/demo"
        );
        assert_eq!(
            backend.variables_url("ws-1"),
            "https://custom.api.com/api/v2/workspaces/ws-1/vars"
        );
        assert_eq!(
            backend.teams_url("acme"),
            "https://custom.api.com/api/v2/organizations/acme/teams"
        );
        assert_eq!(
            backend.team_access_url(),
            "https://custom.api.com/api/v2/team-workspaces"
        );
        assert_eq!(
            backend.oauth_clients_url("acme"),
            "https://custom.api.com/api/v2/organizations/acme/oauth-clients"
        );
    }

    #[test]
    fn test_decode_workspace_list() {
        let body = r#"{
            "data": [
                {"id": "ws-1", "type": "workspaces", "attributes": {"name": "demo-staging"}},
                {"id": "ws-2", "type": "workspaces", "attributes": {"name": "demo-production"}}
            ],
            "meta": {"pagination": {"current-page": 1, "next-page": 2, "total-pages": 2}}
        }"#;

        let doc: ListDocument<WorkspaceAttributes, NoRelationships> =
            serde_json::from_str(body).unwrap();
        assert_eq!(doc.data.len(), 2);

        let pagination = doc.meta.unwrap().pagination.unwrap();
        assert_eq!(pagination.current_page, 1);
        assert_eq!(pagination.next_page, Some(2));
    }

    #[test]
    fn test_decode_last_page() {
        let body = r#"{
            "data": [],
            "meta": {"pagination": {"current-page": 2, "next-page": null}}
        }"#;

        let doc: ListDocument<TeamAttributes, NoRelationships> =
            serde_json::from_str(body).unwrap();
        assert_eq!(doc.meta.unwrap().pagination.unwrap().next_page, None);
    }

    #[test]
    fn test_decode_team_access() {
        let body = r#"{
            "data": [{
                "id": "tws-1",
                "type": "team-workspaces",
                "attributes": {"access": "write"},
                "relationships": {"team": {"data": {"id": "team-9", "type": "teams"}}}
            }]
        }"#;

        let doc: ListDocument<TeamAccessAttributes, TeamAccessRelationships> =
            serde_json::from_str(body).unwrap();
        let resource = doc.data.into_iter().next().unwrap();
        assert_eq!(resource.attributes.access, "write");
        assert_eq!(resource.relationships.team.unwrap().data.id, "team-9");
    }

    #[test]
    fn test_oauth_client_conversion() {
        let body = r#"{
            "id": "oc-1",
            "attributes": {"service-provider": "github", "service-provider-display-name": "GitHub"},
            "relationships": {"oauth-tokens": {"data": [{"id": "ot-1"}, {"id": "ot-2"}]}}
        }"#;

        let resource: Resource<OAuthClientAttributes, OAuthClientRelationships> =
            serde_json::from_str(body).unwrap();
        let client: OAuthClient = resource.into();
        assert_eq!(client.service_provider, "github");
        assert_eq!(client.service_provider_name, "GitHub");
        assert_eq!(client.token_ids, vec!["ot-1", "ot-2"]);
    }

    #[test]
    fn test_oauth_client_without_tokens() {
        let body = r#"{"id": "oc-2", "attributes": {"service-provider": "gitlab_hosted"}}"#;

        let resource: Resource<OAuthClientAttributes, OAuthClientRelationships> =
            serde_json::from_str(body).unwrap();
        let client: OAuthClient = resource.into();
        assert!(client.token_ids.is_empty());
        assert_eq!(client.service_provider_name, "gitlab_hosted");
    }
}
