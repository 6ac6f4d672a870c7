//! Error types for the control manager

use bc_01_cluster_view::ClusterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    /// Error returned by the cluster view
    #[error(transparent)]
    View(#[from] ClusterError),

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Config file could not be read
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    /// Config file could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Membership layer rejected a request
    #[error("Membership {operation} failed: {reason}")]
    Membership {
        operation: &'static str,
        reason: String,
    },

    /// Operation not allowed in the current control state
    #[error("Control manager not available: {operation} in state {state}")]
    NotAvailable {
        operation: &'static str,
        state: String,
    },
}

impl ControlError {
    /// Errors that must abort startup or force maintenance mode.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::View(err) => err.is_fatal(),
            _ => false,
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_errors_keep_fatality() {
        let fatal: ControlError = ClusterError::Recovery {
            reason: "truncated".into(),
        }
        .into();
        assert!(fatal.is_fatal());

        let absorbed: ControlError = ClusterError::LocalServer.into();
        assert!(!absorbed.is_fatal());
        assert!(!ControlError::Parse("bad".into()).is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = ControlError::Membership {
            operation: "clear_retained_attributes",
            reason: "closed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Membership clear_retained_attributes failed: closed"
        );
    }
}
