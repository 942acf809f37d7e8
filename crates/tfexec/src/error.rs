//! Error types for execution tool operations.
//!
//! A failed verb is categorized from its stderr so the user gets advice
//! that matches the actual cause.

use std::fmt;
use thiserror::Error;

/// Categories of execution tool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Provider or registry download failed.
    Network,
    /// The state is locked by another run.
    Lock,
    /// The `terraform` binary could not be found or started.
    BinaryNotFound,
    /// The verb ran and reported failure.
    Command,
    /// Output could not be decoded.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Lock => "State is locked",
            Self::BinaryNotFound => "terraform not installed",
            Self::Command => "terraform command failed",
            Self::Format => "Unexpected terraform output",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check access to the provider registry and try again",
            Self::Lock => "Wait for the other run to finish or release the lock",
            Self::BinaryNotFound => "Install terraform or pass --terraform-bin",
            Self::Command => "Read the terraform output above for the failing resource",
            Self::Format => "Use a terraform version that supports `show -json`",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while running the execution tool.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry or backend could not be reached.
    #[error("network error during {verb}: {message}")]
    Network {
        /// Verb that failed.
        verb: String,
        /// Trimmed stderr.
        message: String,
    },

    /// State lock could not be acquired.
    #[error("state lock held during {verb}: {message}")]
    Lock {
        /// Verb that failed.
        verb: String,
        /// Trimmed stderr.
        message: String,
    },

    /// Binary not found in PATH.
    #[error("terraform binary not found: {0}")]
    BinaryNotFound(String),

    /// Verb exited unsuccessfully.
    #[error("terraform {verb} failed: {stderr}")]
    CommandFailed {
        /// Verb that failed.
        verb: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Trimmed stderr.
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } => ErrorCategory::Network,
            Error::Lock { .. } => ErrorCategory::Lock,
            Error::BinaryNotFound(_) => ErrorCategory::BinaryNotFound,
            Error::CommandFailed { .. } => ErrorCategory::Command,
            Error::Json(_) => ErrorCategory::Format,
            Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Create an error from a failed verb's output.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_output(verb: &str, code: Option<i32>, stderr: &str) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        if stderr_lower.contains("error acquiring the state lock")
            || stderr_lower.contains("state lock")
        {
            return Error::Lock {
                verb: verb.to_string(),
                message,
            };
        }

        if stderr_lower.contains("could not resolve")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("timeout")
            || stderr_lower.contains("timed out")
            || stderr_lower.contains("failed to query available provider packages")
            || stderr_lower.contains("tls handshake")
        {
            return Error::Network {
                verb: verb.to_string(),
                message,
            };
        }

        Error::CommandFailed {
            verb: verb.to_string(),
            code,
            stderr: message,
        }
    }
}

/// Result type for execution tool operations.
pub type Result<T> = std::result::Result<T, Error>;
