use crate::error::{ControlError, ControlResult};
use bc_01_cluster_view::{ClusterViewConfig, ProtocolVersionRange};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// ControlConfig
// ============================================================================

/// Control manager configuration.
#[derive(Clone, Debug)]
pub struct ControlConfig {
    pub server_name: String,
    /// Stable server uid; a random one is generated when absent
    pub server_uid: Option<String>,
    pub cluster_name: String,
    /// Bound on the wait for the cluster to acknowledge a detach
    pub detach_timeout: Duration,
    /// Period of the deleted-server sweep
    pub gc_interval: Duration,
    /// Minimum time between two engine statistics pulls
    pub engine_statistics_interval: Duration,
    pub view: ViewSettings,
}

/// Settings passed through to the view keeper.
#[derive(Clone, Debug)]
pub struct ViewSettings {
    pub max_servers: u32,
    pub deleted_node_grace_period: Duration,
    pub allow_recovery_with_uid_change: bool,
    pub protocol: ProtocolVersionRange,
}

impl Default for ViewSettings {
    fn default() -> Self {
        let view = ClusterViewConfig::default();
        Self {
            max_servers: view.max_servers,
            deleted_node_grace_period: view.deleted_node_grace_period,
            allow_recovery_with_uid_change: view.allow_recovery_with_uid_change,
            protocol: view.protocol,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            server_uid: None,
            cluster_name: String::new(),
            detach_timeout: Duration::from_millis(5_000),
            gc_interval: Duration::from_secs(10),
            engine_statistics_interval: Duration::from_secs(60),
            view: ViewSettings::default(),
        }
    }
}

impl ControlConfig {
    pub fn new(server_name: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            cluster_name: cluster_name.into(),
            ..Self::default()
        }
    }

    /// Short intervals and the view's test limits.
    pub fn for_testing() -> Self {
        let view = ClusterViewConfig::for_testing();
        Self {
            server_name: view.server_name,
            server_uid: Some(view.server_uid),
            cluster_name: view.cluster_name,
            detach_timeout: Duration::from_millis(500),
            gc_interval: Duration::from_millis(50),
            engine_statistics_interval: Duration::from_millis(200),
            view: ViewSettings {
                max_servers: view.max_servers,
                deleted_node_grace_period: view.deleted_node_grace_period,
                allow_recovery_with_uid_change: view.allow_recovery_with_uid_change,
                protocol: view.protocol,
            },
        }
    }

    /// Fix the server uid, generating a v4 uuid when none is configured.
    pub fn with_resolved_uid(mut self) -> Self {
        if self.server_uid.is_none() {
            self.server_uid = Some(uuid::Uuid::new_v4().simple().to_string().to_uppercase());
        }
        self
    }

    pub fn validate(&self) -> ControlResult<()> {
        if self.server_name.is_empty() {
            return Err(ControlError::Config {
                reason: "server_name must not be empty".into(),
            });
        }
        if self.cluster_name.is_empty() {
            return Err(ControlError::Config {
                reason: "cluster_name must not be empty".into(),
            });
        }
        if self.server_uid.as_deref() == Some("") {
            return Err(ControlError::Config {
                reason: "server_uid must not be empty".into(),
            });
        }
        for (name, value) in [
            ("detach_timeout", self.detach_timeout),
            ("gc_interval", self.gc_interval),
            ("engine_statistics_interval", self.engine_statistics_interval),
        ] {
            if value.is_zero() {
                return Err(ControlError::Config {
                    reason: format!("{name} must be greater than zero"),
                });
            }
        }
        Ok(())
    }

    /// Cluster view configuration for this server.
    ///
    /// Fails if the uid has not been resolved.
    pub fn view_config(&self) -> ControlResult<ClusterViewConfig> {
        self.validate()?;
        let server_uid = self.server_uid.clone().ok_or_else(|| ControlError::Config {
            reason: "server_uid not resolved".into(),
        })?;
        let config = ClusterViewConfig {
            server_name: self.server_name.clone(),
            server_uid,
            cluster_name: self.cluster_name.clone(),
            max_servers: self.view.max_servers,
            deleted_node_grace_period: self.view.deleted_node_grace_period,
            allow_recovery_with_uid_change: self.view.allow_recovery_with_uid_change,
            protocol: self.view.protocol,
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// TomlConfigProvider
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cluster: ClusterSection,
}

#[derive(Debug, Deserialize, Default)]
struct ClusterSection {
    server_name: Option<String>,
    server_uid: Option<String>,
    cluster_name: Option<String>,
    detach_timeout_ms: Option<u64>,
    gc_interval_ms: Option<u64>,
    engine_statistics_interval_ms: Option<u64>,
    max_servers: Option<u32>,
    deleted_node_grace_period_ms: Option<u64>,
    allow_recovery_with_uid_change: Option<bool>,
    protocol_min: Option<u16>,
    protocol_max: Option<u16>,
}

/// Loads `ControlConfig` from a TOML file.
///
/// # Config File Format
///
/// ```toml
/// [cluster]
/// server_name = "broker-a"
/// server_uid = "7F3A9C"
/// cluster_name = "prod"
/// detach_timeout_ms = 5000
/// gc_interval_ms = 10000
/// engine_statistics_interval_ms = 60000
/// max_servers = 1024
/// deleted_node_grace_period_ms = 60000
/// allow_recovery_with_uid_change = false
/// protocol_min = 1
/// protocol_max = 1
/// ```
///
/// Every field is optional; missing ones keep the `ControlConfig` default.
#[derive(Debug, Clone)]
pub struct TomlConfigProvider {
    config: ControlConfig,
}

impl TomlConfigProvider {
    pub fn load<P: AsRef<Path>>(path: P) -> ControlResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ControlError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ControlResult<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ControlError::Parse(e.to_string()))?;
        let section = file.cluster;
        let defaults = ControlConfig::default();
        let millis = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };

        let config = ControlConfig {
            server_name: section.server_name.unwrap_or(defaults.server_name),
            server_uid: section.server_uid,
            cluster_name: section.cluster_name.unwrap_or(defaults.cluster_name),
            detach_timeout: millis(section.detach_timeout_ms, defaults.detach_timeout),
            gc_interval: millis(section.gc_interval_ms, defaults.gc_interval),
            engine_statistics_interval: millis(
                section.engine_statistics_interval_ms,
                defaults.engine_statistics_interval,
            ),
            view: ViewSettings {
                max_servers: section.max_servers.unwrap_or(defaults.view.max_servers),
                deleted_node_grace_period: millis(
                    section.deleted_node_grace_period_ms,
                    defaults.view.deleted_node_grace_period,
                ),
                allow_recovery_with_uid_change: section
                    .allow_recovery_with_uid_change
                    .unwrap_or(defaults.view.allow_recovery_with_uid_change),
                protocol: ProtocolVersionRange::new(
                    section.protocol_min.unwrap_or(defaults.view.protocol.min),
                    section.protocol_max.unwrap_or(defaults.view.protocol.max),
                ),
            },
        };
        Ok(Self { config })
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn into_config(self) -> ControlConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let provider = TomlConfigProvider::parse(
            r#"
            [cluster]
            server_name = "broker-a"
            server_uid = "A1"
            cluster_name = "prod"
            detach_timeout_ms = 2500
            max_servers = 8
            protocol_min = 1
            protocol_max = 3
            "#,
        )
        .unwrap();
        let config = provider.config();
        assert_eq!(config.server_name, "broker-a");
        assert_eq!(config.server_uid.as_deref(), Some("A1"));
        assert_eq!(config.detach_timeout, Duration::from_millis(2_500));
        assert_eq!(config.gc_interval, Duration::from_secs(10));
        assert_eq!(config.view.max_servers, 8);
        assert_eq!(config.view.protocol, ProtocolVersionRange::new(1, 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_file_uses_defaults() {
        let config = TomlConfigProvider::parse("").unwrap().into_config();
        assert_eq!(config.detach_timeout, Duration::from_millis(5_000));
        assert!(config.server_uid.is_none());
        assert!(matches!(config.validate(), Err(ControlError::Config { .. })));
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        assert!(matches!(
            TomlConfigProvider::parse("[cluster\nserver_name = 1"),
            Err(ControlError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            TomlConfigProvider::load("/nonexistent/cluster.toml"),
            Err(ControlError::Io { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ControlConfig {
            detach_timeout: Duration::ZERO,
            ..ControlConfig::for_testing()
        };
        assert!(matches!(config.validate(), Err(ControlError::Config { reason }) if reason.contains("detach_timeout")));
    }

    #[test]
    fn test_uid_generated_once() {
        let config = ControlConfig::new("broker", "prod").with_resolved_uid();
        let uid = config.server_uid.clone().unwrap();
        assert_eq!(uid.len(), 32);
        assert_eq!(config.clone().with_resolved_uid().server_uid, Some(uid.clone()));
        assert_eq!(config.view_config().unwrap().server_uid, uid);
    }

    #[test]
    fn test_view_config_requires_resolved_uid() {
        let config = ControlConfig::new("broker", "prod");
        assert!(config.view_config().is_err());
    }

    #[test]
    fn test_view_config_errors_surface() {
        let mut config = ControlConfig::for_testing();
        config.view.max_servers = 0;
        assert!(matches!(config.view_config(), Err(ControlError::View(_))));
    }
}
