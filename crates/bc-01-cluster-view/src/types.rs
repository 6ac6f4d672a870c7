use crate::domain::ProtocolVersionRange;
use crate::error::{ClusterError, ClusterResult};
use std::fmt;
use std::time::Duration;

/// Lifecycle phase of the view registry.
///
/// ```text
/// [STARTED] ──restore──→ [RECOVERING]
///     │                       │
///     └───recovery_completed──┴──→ [ACTIVE]
///
/// any ──notify_term──→ [DETACHED] ──close──→ [CLOSED]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ViewPhase {
    /// Constructed; restore allowed
    #[default]
    Started,
    /// Persisted records are being restored
    Recovering,
    /// Local incarnation fixed; normal operation
    Active,
    /// Detached from the cluster; events are ignored
    Detached,
    Closed,
}

impl ViewPhase {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Detached | Self::Closed)
    }

    /// Restore is accepted until recovery completes.
    pub fn accepts_restore(&self) -> bool {
        matches!(self, Self::Started | Self::Recovering)
    }
}

impl fmt::Display for ViewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Recovering => write!(f, "recovering"),
            Self::Active => write!(f, "active"),
            Self::Detached => write!(f, "detached"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Cluster view configuration
#[derive(Clone, Debug)]
pub struct ClusterViewConfig {
    /// Local server name
    pub server_name: String,
    /// Local server uid (stable across restarts)
    pub server_uid: String,
    /// Cluster the local server belongs to
    pub cluster_name: String,
    /// Upper bound on simultaneously allocated server indices
    pub max_servers: u32,
    /// How long a deleted record's index stays reserved
    pub deleted_node_grace_period: Duration,
    /// Accept a persisted self-record written under a different uid
    pub allow_recovery_with_uid_change: bool,
    /// Protocol versions the local server speaks
    pub protocol: ProtocolVersionRange,
}

impl Default for ClusterViewConfig {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            server_uid: String::new(),
            cluster_name: String::new(),
            max_servers: 1024,
            deleted_node_grace_period: Duration::from_secs(60),
            allow_recovery_with_uid_change: false,
            protocol: ProtocolVersionRange::default(),
        }
    }
}

impl ClusterViewConfig {
    pub fn new(
        server_name: impl Into<String>,
        server_uid: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            server_uid: server_uid.into(),
            cluster_name: cluster_name.into(),
            ..Self::default()
        }
    }

    /// Small limits and a short grace period for tests.
    pub fn for_testing() -> Self {
        Self {
            max_servers: 16,
            deleted_node_grace_period: Duration::from_millis(100),
            ..Self::new("local-server", "LOCAL-UID", "test-cluster")
        }
    }

    pub fn validate(&self) -> ClusterResult<()> {
        if self.server_name.is_empty() {
            return Err(ClusterError::ConfigError {
                reason: "server_name must not be empty".into(),
            });
        }
        if self.server_uid.is_empty() {
            return Err(ClusterError::ConfigError {
                reason: "server_uid must not be empty".into(),
            });
        }
        if self.cluster_name.is_empty() {
            return Err(ClusterError::ConfigError {
                reason: "cluster_name must not be empty".into(),
            });
        }
        if self.max_servers == 0 || self.max_servers == crate::domain::RemoteServerHandle::LOCAL_INDEX {
            return Err(ClusterError::ConfigError {
                reason: format!("max_servers out of range: {}", self.max_servers),
            });
        }
        if self.protocol.min > self.protocol.max {
            return Err(ClusterError::ConfigError {
                reason: "protocol range min exceeds max".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_testing_config_is_valid() {
        assert!(ClusterViewConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_identity() {
        let config = ClusterViewConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ClusterError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = ClusterViewConfig {
            max_servers: 0,
            ..ClusterViewConfig::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
