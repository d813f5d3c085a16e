//! Error types for tflifecycle

use crate::types::Dynamic;
use std::time::Duration;

/// Failure reported by a remote object client, keeping the HTTP status so
/// the lifecycle engine can classify it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}{message}", status_prefix(.status))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

fn status_prefix(status: &Option<u16>) -> String {
    status.map(|s| format!("HTTP {}: ", s)).unwrap_or_default()
}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status), message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    /// Optimistic concurrency violation: the version stamp sent with an
    /// update no longer matches the server's.
    pub fn is_version_conflict(&self) -> bool {
        self.status == Some(409)
    }
}

/// Error type for lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Transport error: {0}")]
    Transport(#[from] RemoteError),

    #[error("Resource {id} not found")]
    NotFound { id: String },

    #[error("Resource {id} still exists after deletion")]
    StillExists { id: String },

    #[error("Version conflict updating {id}")]
    VersionConflict { id: String },

    #[error("Resource {id} is inconsistent: attribute '{attribute}' expected {expected}, got {actual}")]
    ConsistencyMismatch {
        id: String,
        attribute: String,
        expected: Dynamic,
        actual: Dynamic,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Timed out after {elapsed:?}: {last}")]
    Timeout {
        elapsed: Duration,
        last: Box<LifecycleError>,
    },

    #[error("Failed to {operation} {resource_type} {id}: {source}")]
    Operation {
        operation: Operation,
        resource_type: String,
        id: String,
        #[source]
        source: Box<LifecycleError>,
    },

    #[error("Resource type not found: {0}")]
    UnknownResourceType(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl LifecycleError {
    pub fn validation(message: impl Into<String>) -> Self {
        LifecycleError::Validation(message.into())
    }

    /// Attach the failed operation and resource identity, unless already attached.
    pub fn during(self, operation: Operation, resource_type: &str, id: &str) -> Self {
        match self {
            e @ LifecycleError::Operation { .. } => e,
            e => LifecycleError::Operation {
                operation,
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                source: Box::new(e),
            },
        }
    }

    /// The innermost error, looking through operation and timeout wrappers.
    pub fn root(&self) -> &LifecycleError {
        match self {
            LifecycleError::Operation { source, .. } => source.root(),
            LifecycleError::Timeout { last, .. } => last.root(),
            e => e,
        }
    }

    pub fn remote_status(&self) -> Option<u16> {
        match self.root() {
            LifecycleError::Transport(e) => e.status,
            LifecycleError::NotFound { .. } => Some(404),
            LifecycleError::VersionConflict { .. } => Some(409),
            _ => None,
        }
    }
}

/// Lifecycle operation named in user-visible errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
    Export,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
            Operation::Export => "export",
        };
        f.write_str(s)
    }
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

impl From<String> for LifecycleError {
    fn from(s: String) -> Self {
        LifecycleError::Validation(s)
    }
}

impl From<&str> for LifecycleError {
    fn from(s: &str) -> Self {
        LifecycleError::Validation(s.to_string())
    }
}
