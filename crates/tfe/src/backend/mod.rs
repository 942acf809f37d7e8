//! Backend traits and implementations for the Terraform Cloud API.
//!
//! This module provides the [`Backend`] trait and two implementations:
//! [`http::HttpBackend`] talks to a real Terraform Cloud / Enterprise host,
//! [`MockBackend`] keeps an in-memory inventory for tests.
//!
//! # Testing
//!
//! ```
//! use tfe::backend::{Backend, MockBackend};
//! use tfe::{PageRequest, Workspace};
//!
//! let mock = MockBackend::new();
//! mock.add_workspace("acme", Workspace::new("ws-1", "demo"));
//!
//! let ws = mock.read_workspace("acme", "demo").unwrap();
//! assert_eq!(ws.unwrap().id, "ws-1");
//! ```

pub mod http;

use crate::error::Result;
use crate::types::{OAuthClient, Page, PageRequest, Team, TeamAccess, Variable, Workspace};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Read-only view of the remote service.
///
/// Every call is a read; creating, updating and deleting remote objects is
/// left to the execution tool.
pub trait Backend: Send + Sync {
    /// Read a workspace by name. `Ok(None)` when it does not exist.
    fn read_workspace(&self, organization: &str, name: &str) -> Result<Option<Workspace>>;

    /// List workspaces whose name matches a search string.
    fn list_workspaces(
        &self,
        organization: &str,
        search: &str,
        page: PageRequest,
    ) -> Result<Page<Workspace>>;

    /// List the variables of a workspace.
    fn list_variables(&self, workspace_id: &str, page: PageRequest) -> Result<Page<Variable>>;

    /// List the teams of an organization.
    fn list_teams(&self, organization: &str, page: PageRequest) -> Result<Page<Team>>;

    /// List the team access grants on a workspace.
    fn list_team_access(&self, workspace_id: &str, page: PageRequest) -> Result<Page<TeamAccess>>;

    /// List the VCS OAuth clients of an organization.
    fn list_oauth_clients(&self, organization: &str, page: PageRequest)
    -> Result<Page<OAuthClient>>;
}

#[derive(Debug, Default)]
struct Inventory {
    workspaces: HashMap<String, Vec<Workspace>>,
    variables: HashMap<String, Vec<Variable>>,
    teams: HashMap<String, Vec<Team>>,
    team_access: HashMap<String, Vec<TeamAccess>>,
    oauth_clients: HashMap<String, Vec<OAuthClient>>,
    page_size: Option<u32>,
    calls: HashMap<&'static str, usize>,
}

/// Mock backend for testing without network access.
///
/// Holds the remote inventory in memory. Clones share the same inventory, so
/// a test can keep a handle while the client owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inventory: Arc<Mutex<Inventory>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve list calls in pages of `size` instead of the requested size.
    #[must_use]
    pub fn with_page_size(self, size: u32) -> Self {
        self.lock().page_size = Some(size.max(1));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inventory> {
        self.inventory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a workspace to an organization.
    pub fn add_workspace(&self, organization: &str, workspace: Workspace) {
        self.lock()
            .workspaces
            .entry(organization.to_string())
            .or_default()
            .push(workspace);
    }

    /// Add a variable to a workspace.
    pub fn add_variable(&self, workspace_id: &str, variable: Variable) {
        self.lock()
            .variables
            .entry(workspace_id.to_string())
            .or_default()
            .push(variable);
    }

    /// Add a team to an organization.
    pub fn add_team(&self, organization: &str, team: Team) {
        self.lock()
            .teams
            .entry(organization.to_string())
            .or_default()
            .push(team);
    }

    /// Add a team access grant to a workspace.
    pub fn add_team_access(&self, workspace_id: &str, access: TeamAccess) {
        self.lock()
            .team_access
            .entry(workspace_id.to_string())
            .or_default()
            .push(access);
    }

    /// Add a VCS OAuth client to an organization.
    pub fn add_oauth_client(&self, organization: &str, client: OAuthClient) {
        self.lock()
            .oauth_clients
            .entry(organization.to_string())
            .or_default()
            .push(client);
    }

    /// Number of times a backend method was called, by method name.
    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    fn record(&self, method: &'static str) {
        *self.lock().calls.entry(method).or_default() += 1;
    }

    fn paginate<T: Clone>(&self, items: &[T], page: PageRequest) -> Page<T> {
        let size = self.lock().page_size.unwrap_or(page.size).max(1) as usize;
        let number = page.number.max(1);
        let start = (number as usize - 1) * size;
        let chunk: Vec<T> = items.iter().skip(start).take(size).cloned().collect();
        let next_page = (start + size < items.len()).then_some(number + 1);

        Page {
            items: chunk,
            current_page: number,
            next_page,
        }
    }

    fn snapshot<T: Clone>(
        &self,
        select: impl FnOnce(&Inventory) -> Option<&Vec<T>>,
    ) -> Vec<T> {
        let inventory = self.lock();
        select(&inventory).cloned().unwrap_or_default()
    }
}

impl Backend for MockBackend {
    fn read_workspace(&self, organization: &str, name: &str) -> Result<Option<Workspace>> {
        self.record("read_workspace");
        let workspaces = self.snapshot(|inv| inv.workspaces.get(organization));
        Ok(workspaces.into_iter().find(|ws| ws.name == name))
    }

    fn list_workspaces(
        &self,
        organization: &str,
        search: &str,
        page: PageRequest,
    ) -> Result<Page<Workspace>> {
        self.record("list_workspaces");
        let matching: Vec<Workspace> = self
            .snapshot(|inv| inv.workspaces.get(organization))
            .into_iter()
            .filter(|ws| ws.name.contains(search))
            .collect();
        Ok(self.paginate(&matching, page))
    }

    fn list_variables(&self, workspace_id: &str, page: PageRequest) -> Result<Page<Variable>> {
        self.record("list_variables");
        let variables = self.snapshot(|inv| inv.variables.get(workspace_id));
        Ok(self.paginate(&variables, page))
    }

    fn list_teams(&self, organization: &str, page: PageRequest) -> Result<Page<Team>> {
        self.record("list_teams");
        let teams = self.snapshot(|inv| inv.teams.get(organization));
        Ok(self.paginate(&teams, page))
    }

    fn list_team_access(&self, workspace_id: &str, page: PageRequest) -> Result<Page<TeamAccess>> {
        self.record("list_team_access");
        let access = self.snapshot(|inv| inv.team_access.get(workspace_id));
        Ok(self.paginate(&access, page))
    }

    fn list_oauth_clients(
        &self,
        organization: &str,
        page: PageRequest,
    ) -> Result<Page<OAuthClient>> {
        self.record("list_oauth_clients");
        let clients = self.snapshot(|inv| inv.oauth_clients.get(organization));
        Ok(self.paginate(&clients, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_new() {
        let mock = MockBackend::new();
        assert!(mock.read_workspace("acme", "demo").unwrap().is_none());
        assert!(mock.list_teams("acme", PageRequest::first()).unwrap().items.is_empty());
    }

    #[test]
    fn test_mock_backend_read_workspace() {
        let mock = MockBackend::new();
        mock.add_workspace("acme", Workspace::new("ws-1", "demo"));

        let found = mock.read_workspace("acme", "demo").unwrap();
        assert_eq!(found, Some(Workspace::new("ws-1", "demo")));

        assert!(mock.read_workspace("other-org", "demo").unwrap().is_none());
        assert_eq!(mock.calls("read_workspace"), 2);
    }

    #[test]
    fn test_mock_backend_search() {
        let mock = MockBackend::new();
        mock.add_workspace("acme", Workspace::new("ws-1", "demo-staging"));
        mock.add_workspace("acme", Workspace::new("ws-2", "demo-production"));
        mock.add_workspace("acme", Workspace::new("ws-3", "other"));

        let page = mock
            .list_workspaces("acme", "demo", PageRequest::first())
            .unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn test_mock_backend_pagination() {
        let mock = MockBackend::new().with_page_size(2);
        for i in 0..5 {
            mock.add_variable("ws-1", Variable::new(format!("var-{i}"), format!("key{i}")));
        }

        let first = mock.list_variables("ws-1", PageRequest::first()).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_page, Some(2));

        let last = mock.list_variables("ws-1", PageRequest::number(3)).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].key, "key4");
        assert_eq!(last.next_page, None);
    }

    #[test]
    fn test_mock_backend_clones_share_inventory() {
        let mock = MockBackend::new();
        let handle = mock.clone();
        handle.add_team("acme", Team::new("team-1", "owners"));

        let teams = mock.list_teams("acme", PageRequest::first()).unwrap();
        assert_eq!(teams.items.len(), 1);
    }
}
