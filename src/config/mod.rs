//! Configuration: a `serde`-deserialized TOML document with a default for
//! every field, validated once at startup before any subsystem spawns.
//!
//! Grounded on `sa_domain::config`'s `Config`/`ConfigError`/`ConfigSeverity`
//! shape: per-section structs with `#[serde(default = "...")]` fields and a
//! `validate(&self) -> Vec<ConfigError>` that never returns early, so every
//! problem in the file is reported in one pass instead of one-at-a-time.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_tcp_port")]
    pub tcp_port: u16,
    #[serde(default = "d_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "d_http_port")]
    pub http_port: u16,
    #[serde(default = "d_bind_host")]
    pub bind_host: String,
    #[serde(default = "d_server_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub public_hostname: Option<String>,
    #[serde(default = "d_max_users")]
    pub max_users: u32,
    #[serde(default)]
    pub admin_nicknames: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_port: d_tcp_port(),
            ssh_port: d_ssh_port(),
            http_port: d_http_port(),
            bind_host: d_bind_host(),
            name: d_server_name(),
            description: String::new(),
            public_hostname: None,
            max_users: d_max_users(),
            admin_nicknames: Vec::new(),
        }
    }
}

fn d_tcp_port() -> u16 {
    6667
}
fn d_ssh_port() -> u16 {
    6698
}
fn d_http_port() -> u16 {
    8080
}
fn d_bind_host() -> String {
    "0.0.0.0".into()
}
fn d_server_name() -> String {
    "superchat".into()
}
fn d_max_users() -> u32 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "d_max_message_len")]
    pub max_message_length: usize,
    #[serde(default = "d_max_name_len")]
    pub max_name_length: usize,
    #[serde(default = "d_min_retention")]
    pub min_retention_hours: u32,
    #[serde(default = "d_max_retention")]
    pub max_retention_hours: u32,
    #[serde(default = "d_max_thread_subs")]
    pub max_thread_subscriptions: usize,
    #[serde(default = "d_max_channel_subs")]
    pub max_channel_subscriptions: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_length: d_max_message_len(),
            max_name_length: d_max_name_len(),
            min_retention_hours: d_min_retention(),
            max_retention_hours: d_max_retention(),
            max_thread_subscriptions: d_max_thread_subs(),
            max_channel_subscriptions: d_max_channel_subs(),
        }
    }
}

fn d_max_message_len() -> usize {
    4096
}
fn d_max_name_len() -> usize {
    64
}
fn d_min_retention() -> u32 {
    1
}
fn d_max_retention() -> u32 {
    24 * 365
}
fn d_max_thread_subs() -> usize {
    50
}
fn d_max_channel_subs() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "d_idle_timeout")]
    pub idle_timeout_seconds: i64,
    #[serde(default = "d_retention_sweep")]
    pub retention_sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: d_idle_timeout(),
            retention_sweep_interval_seconds: d_retention_sweep(),
        }
    }
}

fn d_idle_timeout() -> i64 {
    30 * 60
}
fn d_retention_sweep() -> u64 {
    60 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub known_peers: Vec<String>,
    #[serde(default = "d_registration_rate_limit")]
    pub registrations_per_hour_per_ip: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            known_peers: Vec::new(),
            registrations_per_hour_per_ip: d_registration_rate_limit(),
        }
    }
}

fn d_registration_rate_limit() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "d_host_key_path")]
    pub host_key_path: String,
    #[serde(default = "d_ssh_auto_register_rate_limit")]
    pub auto_registrations_per_hour_per_ip: u32,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host_key_path: d_host_key_path(),
            auto_registrations_per_hour_per_ip: d_ssh_auto_register_rate_limit(),
        }
    }
}

fn d_host_key_path() -> String {
    "superchatd_host_key".into()
}
fn d_ssh_auto_register_rate_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "d_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "d_snapshot_interval")]
    pub snapshot_interval_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: d_sqlite_path(),
            snapshot_interval_seconds: d_snapshot_interval(),
        }
    }
}

fn d_sqlite_path() -> String {
    "superchatd.db".into()
}
fn d_snapshot_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "d_log_format")]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: d_log_format(),
        }
    }
}

fn d_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validates the configuration, collecting every issue rather than
    /// failing on the first one found.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.tcp_port == 0 && self.server.ssh_port == 0 && self.server.http_port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server".into(),
                message: "at least one of tcp_port/ssh_port/http_port must be non-zero".into(),
            });
        }

        if self.limits.min_retention_hours > self.limits.max_retention_hours {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "limits".into(),
                message: "min_retention_hours exceeds max_retention_hours".into(),
            });
        }

        if self.limits.max_message_length == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "limits.max_message_length".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.directory.enabled && self.server.public_hostname.is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "directory".into(),
                message: "directory is enabled but server.public_hostname is unset".into(),
            });
        }

        if self.server.admin_nicknames.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.admin_nicknames".into(),
                message: "no admin nicknames configured".into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let config = Config::default();
        let issues = config.validate();
        assert!(!issues.iter().any(|i| i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn inverted_retention_bounds_is_an_error() {
        let mut config = Config::default();
        config.limits.min_retention_hours = 100;
        config.limits.max_retention_hours = 10;
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error && i.field == "limits"));
    }

    #[test]
    fn directory_enabled_without_hostname_warns() {
        let mut config = Config::default();
        config.directory.enabled = true;
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Warning && i.field == "directory"));
    }
}
