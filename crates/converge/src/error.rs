//! Error types for workspace convergence.
//!
//! Every variant is fatal to the run. Resources that simply do not exist
//! remotely yet are not errors; they surface as
//! [`ImportOutcome::Skipped`](crate::reconcile::ImportOutcome::Skipped).

use std::fmt;
use thiserror::Error;

/// Categories of convergence errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or inconsistent input.
    Input,
    /// Something referenced by the input does not exist remotely.
    MissingReference,
    /// The plan would destroy protected resources.
    Destructive,
    /// The remote API failed.
    Remote,
    /// The execution tool failed.
    Subprocess,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Input => "Invalid input",
            Self::MissingReference => "Referenced object not found",
            Self::Destructive => "Destructive change blocked",
            Self::Remote => "Terraform Cloud API error",
            Self::Subprocess => "terraform failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Input => "Fix the named input and run again",
            Self::MissingReference => {
                "Create the referenced object in the organization or fix its name"
            }
            Self::Destructive => {
                "Deleting a workspace permanently deletes its state versions; \
                 pass --allow-workspace-deletion if this is intended"
            }
            Self::Remote => "Check the API host, token and organization",
            Self::Subprocess => "Read the terraform output for the failing step",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that abort a convergence run.
#[derive(Debug, Error)]
pub enum Error {
    /// An input could not be parsed or is inconsistent.
    #[error("invalid {field}: {message}")]
    InputParse {
        /// Input the problem was found in.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A per-workspace input names a workspace that is not part of the run.
    #[error("unknown workspace {name:?} in {field}")]
    UnknownWorkspace {
        /// Input holding the reference.
        field: String,
        /// The unmatched name.
        name: String,
    },

    /// One tag list holds the same key with different values.
    #[error("tag {key:?} has conflicting values {first:?} and {second:?} for workspace {workspace:?}")]
    AmbiguousTag {
        /// Workspace the tags resolve for.
        workspace: String,
        /// Duplicated key.
        key: String,
        /// First value seen.
        first: String,
        /// Conflicting value.
        second: String,
    },

    /// No OAuth client of the requested VCS type exists.
    #[error("no VCS client of type {vcs_type:?} in organization {organization:?}")]
    VcsClientNotFound {
        /// Organization searched.
        organization: String,
        /// Requested service provider.
        vcs_type: String,
    },

    /// The matched OAuth client has no tokens.
    #[error("no VCS tokens for client {client_name}:{client_id}")]
    VcsTokenNotFound {
        /// OAuth client ID.
        client_id: String,
        /// Provider display name.
        client_name: String,
    },

    /// A team referenced by an access grant does not exist.
    #[error("team {team:?} not found in organization {organization:?}")]
    TeamNotFound {
        /// Organization searched.
        organization: String,
        /// Team name or ID.
        team: String,
    },

    /// The plan deletes protected resources and deletion was not allowed.
    #[error("plan deletes {resource_type} resources: {}", .addresses.join(", "))]
    DestructiveActionBlocked {
        /// Protected resource type.
        resource_type: String,
        /// Addresses that would be deleted.
        addresses: Vec<String>,
    },

    /// The remote API failed.
    #[error("remote API error: {0}")]
    Remote(#[from] tfe::Error),

    /// The execution tool failed.
    #[error(transparent)]
    Subprocess(#[from] tfexec::Error),

    /// The document could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InputParse`].
    pub fn input(field: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InputParse {
            field: field.into(),
            message: message.to_string(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InputParse { .. }
            | Error::UnknownWorkspace { .. }
            | Error::AmbiguousTag { .. } => ErrorCategory::Input,
            Error::VcsClientNotFound { .. }
            | Error::VcsTokenNotFound { .. }
            | Error::TeamNotFound { .. } => ErrorCategory::MissingReference,
            Error::DestructiveActionBlocked { .. } => ErrorCategory::Destructive,
            Error::Remote(_) => ErrorCategory::Remote,
            Error::Subprocess(_) => ErrorCategory::Subprocess,
            Error::Serialize(_) | Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Advice for this error, preferring the wrapped crate's own advice.
    pub fn advice(&self) -> &'static str {
        match self {
            Error::Remote(err) => err.category().advice(),
            Error::Subprocess(err) => err.category().advice(),
            other => other.category().advice(),
        }
    }
}

/// Result type for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(Error::input("variables", "bad yaml").category(), ErrorCategory::Input);
        assert_eq!(
            Error::TeamNotFound {
                organization: "acme".into(),
                team: "ops".into()
            }
            .category(),
            ErrorCategory::MissingReference
        );
        assert_eq!(
            Error::DestructiveActionBlocked {
                resource_type: "tfe_workspace".into(),
                addresses: vec![],
            }
            .category(),
            ErrorCategory::Destructive
        );
    }

    #[test]
    fn test_display() {
        let err = Error::DestructiveActionBlocked {
            resource_type: "tfe_workspace".into(),
            addresses: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "plan deletes tfe_workspace resources: a, b");

        let err = Error::input("backend_config", "expected one backend");
        assert_eq!(err.to_string(), "invalid backend_config: expected one backend");
    }

    #[test]
    fn test_wrapped_advice() {
        let err: Error = tfe::Error::http("HTTP 401", Some(401)).into();
        assert_eq!(err.category(), ErrorCategory::Remote);
        assert_eq!(err.advice(), tfe::ErrorCategory::Auth.advice());

        let err: Error = tfexec::Error::BinaryNotFound("terraform".into()).into();
        assert_eq!(err.advice(), tfexec::ErrorCategory::BinaryNotFound.advice());
    }
}
