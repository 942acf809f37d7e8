//! Core types returned by the Terraform Cloud API.

use serde::{Deserialize, Serialize};

/// Page size used for every list call.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Which page of a list endpoint to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-indexed page number.
    pub number: u32,
    /// Items per page.
    pub size: u32,
}

impl PageRequest {
    /// The first page at the maximum page size.
    #[must_use]
    pub fn first() -> Self {
        Self::number(1)
    }

    /// A specific page at the maximum page size.
    #[must_use]
    pub fn number(number: u32) -> Self {
        Self {
            number,
            size: MAX_PAGE_SIZE,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Page number of this page.
    pub current_page: u32,
    /// Page number of the next page, if the API reported one.
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    /// A page that is also the last one.
    pub fn single(items: Vec<T>) -> Self {
        Self {
            items,
            current_page: 1,
            next_page: None,
        }
    }

    /// The page to fetch next.
    ///
    /// Returns `None` once the reported next page stops advancing past the
    /// current one, which bounds every pagination loop.
    pub fn advance(&self) -> Option<u32> {
        self.next_page.filter(|next| *next > self.current_page)
    }
}

/// A workspace in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Workspace ID (`ws-...`).
    pub id: String,
    /// Workspace name, unique within the organization.
    pub name: String,
}

impl Workspace {
    /// Create a workspace record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A variable attached to a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable ID (`var-...`).
    pub id: String,
    /// Variable key.
    pub key: String,
    /// `terraform` or `env`.
    pub category: String,
}

impl Variable {
    /// Create a terraform-category variable record.
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            category: "terraform".to_string(),
        }
    }
}

/// A team in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team ID (`team-...`).
    pub id: String,
    /// Team name.
    pub name: String,
}

impl Team {
    /// Create a team record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A team's access grant on a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAccess {
    /// Team access ID (`tws-...`).
    pub id: String,
    /// Coarse access level (`read`, `plan`, `write`, `admin`, `custom`).
    pub access: String,
    /// ID of the team holding the grant.
    pub team_id: String,
}

impl TeamAccess {
    /// Create a team access record.
    pub fn new(
        id: impl Into<String>,
        team_id: impl Into<String>,
        access: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            access: access.into(),
            team_id: team_id.into(),
        }
    }
}

/// A VCS OAuth client registered in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    /// OAuth client ID (`oc-...`).
    pub id: String,
    /// Service provider type (`github`, `gitlab_hosted`, ...).
    pub service_provider: String,
    /// Human readable provider name.
    pub service_provider_name: String,
    /// IDs of the OAuth tokens issued for this client, in API order.
    pub token_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let first = PageRequest::first();
        assert_eq!(first.number, 1);
        assert_eq!(first.size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::default(), first);
    }

    #[test]
    fn test_page_advance() {
        let page = Page {
            items: vec![1, 2],
            current_page: 1,
            next_page: Some(2),
        };
        assert_eq!(page.advance(), Some(2));

        let last = Page {
            items: vec![3],
            current_page: 2,
            next_page: None,
        };
        assert_eq!(last.advance(), None);
    }

    #[test]
    fn test_page_advance_stops_when_not_increasing() {
        let stuck = Page {
            items: Vec::<u8>::new(),
            current_page: 3,
            next_page: Some(3),
        };
        assert_eq!(stuck.advance(), None);

        let backwards = Page {
            items: Vec::<u8>::new(),
            current_page: 3,
            next_page: Some(1),
        };
        assert_eq!(backwards.advance(), None);
    }

    #[test]
    fn test_page_single() {
        let page = Page::single(vec!["a"]);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.advance(), None);
    }
}
