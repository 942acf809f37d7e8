//! # tfe
//!
//! Read-only client for the Terraform Cloud / Enterprise API.
//!
//! This crate answers the lookups needed to reconcile a declared set of
//! workspaces against what already exists remotely:
//! - Finding workspaces by exact name
//! - Finding variables, teams and team access grants
//! - Listing VCS OAuth clients and their tokens
//!
//! Every list endpoint is paginated; the client walks pages until the API
//! stops reporting a later page.
//!
//! ## Example
//!
//! ```no_run
//! use tfe::Client;
//!
//! let client = Client::new("app.terraform.io", "token");
//!
//! if let Some(ws) = client.find_workspace("acme", "demo-staging").unwrap() {
//!     println!("{} -> {}", ws.name, ws.id);
//! }
//! ```
//!
//! ## Testing
//!
//! ```
//! use tfe::{Client, MockBackend, Team};
//!
//! let mock = MockBackend::new();
//! mock.add_team("acme", Team::new("team-1", "owners"));
//!
//! let client = Client::with_backend(Box::new(mock));
//! let team = client.find_team_by_name("acme", "owners").unwrap();
//! assert_eq!(team.unwrap().id, "team-1");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{
    MAX_PAGE_SIZE, OAuthClient, Page, PageRequest, Team, TeamAccess, Variable, Workspace,
};

use backend::Backend;
pub use backend::MockBackend;
use backend::http::HttpBackend;

/// High-level client for Terraform Cloud lookups.
///
/// # Example
///
/// ```no_run
/// use tfe::Client;
///
/// let client = Client::new("app.terraform.io", "token");
/// let clients = client.oauth_clients("acme").unwrap();
/// println!("{} VCS clients", clients.len());
/// ```
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client for a host using the HTTP backend.
    #[must_use]
    pub fn new(host: &str, token: impl Into<String>) -> Self {
        Self {
            backend: Box::new(HttpBackend::new(host, token)),
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Workspaces
    // =========================================================================

    /// Read a workspace by name.
    pub fn find_workspace(&self, organization: &str, name: &str) -> Result<Option<Workspace>> {
        self.backend.read_workspace(organization, name)
    }

    /// Find a workspace by listing search results and matching the name exactly.
    ///
    /// The search endpoint matches substrings, so `demo` also returns
    /// `demo-staging`; only an exact name counts.
    pub fn search_workspace(&self, organization: &str, name: &str) -> Result<Option<Workspace>> {
        find_paged(
            |page| self.backend.list_workspaces(organization, name, page),
            |ws| ws.name == name,
        )
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Find a variable on a workspace by key.
    pub fn find_variable(&self, workspace_id: &str, key: &str) -> Result<Option<Variable>> {
        find_paged(
            |page| self.backend.list_variables(workspace_id, page),
            |var| var.key == key,
        )
    }

    // =========================================================================
    // Teams
    // =========================================================================

    /// Find a team in an organization by name.
    pub fn find_team_by_name(&self, organization: &str, name: &str) -> Result<Option<Team>> {
        find_paged(
            |page| self.backend.list_teams(organization, page),
            |team| team.name == name,
        )
    }

    /// Find a team in an organization by ID.
    pub fn find_team_by_id(&self, organization: &str, id: &str) -> Result<Option<Team>> {
        find_paged(
            |page| self.backend.list_teams(organization, page),
            |team| team.id == id,
        )
    }

    /// Find the access grant a team holds on a workspace.
    pub fn find_team_access(&self, workspace_id: &str, team_id: &str) -> Result<Option<TeamAccess>> {
        find_paged(
            |page| self.backend.list_team_access(workspace_id, page),
            |access| access.team_id == team_id,
        )
    }

    // =========================================================================
    // VCS
    // =========================================================================

    /// List every VCS OAuth client in an organization.
    pub fn oauth_clients(&self, organization: &str) -> Result<Vec<OAuthClient>> {
        collect_paged(|page| self.backend.list_oauth_clients(organization, page))
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Walk pages until an item matches or the pages run out.
fn find_paged<T>(
    mut fetch: impl FnMut(PageRequest) -> Result<Page<T>>,
    mut matches: impl FnMut(&T) -> bool,
) -> Result<Option<T>> {
    let mut request = PageRequest::first();
    loop {
        let page = fetch(request)?;
        let next = page.advance();
        if let Some(found) = page.items.into_iter().find(|item| matches(item)) {
            return Ok(Some(found));
        }
        match next {
            Some(number) => request = PageRequest::number(number),
            None => return Ok(None),
        }
    }
}

/// Collect every item across all pages.
fn collect_paged<T>(mut fetch: impl FnMut(PageRequest) -> Result<Page<T>>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut request = PageRequest::first();
    loop {
        let page = fetch(request)?;
        let next = page.advance();
        items.extend(page.items);
        match next {
            Some(number) => request = PageRequest::number(number),
            None => return Ok(items),
        }
    }
}
