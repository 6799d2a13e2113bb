//! Environment-driven configuration

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::error::{DeployError, Result};

pub const DEFAULT_DEPLOY_COMMAND: &str = "npm install && npm run build";
pub const DEFAULT_ALLOWED_BRANCHES: [&str; 2] = ["main", "master"];
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Resolved server configuration. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct DeployConfig {
    pub secret: String,
    pub project_path: PathBuf,
    pub deploy_command: String,
    pub allowed_branches: BTreeSet<String>,
    pub verbose_logging: bool,
    pub host: String,
    pub port: u16,
    /// Run at most one deployment at a time when set.
    pub serialize_deployments: bool,
    /// How long shutdown waits for running deployments.
    pub shutdown_grace: Duration,
}

impl DeployConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    ///
    /// Only `WEBHOOK_SECRET` is required; everything else has a default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("WEBHOOK_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                DeployError::ConfigError("WEBHOOK_SECRET must be set and non-empty".to_string())
            })?;

        let project_path = match lookup("PROJECT_PATH").filter(|p| !p.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir().map_err(|e| {
                DeployError::ConfigError(format!("Failed to resolve working directory: {}", e))
            })?,
        };

        let deploy_command = lookup("DEPLOY_COMMAND")
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEPLOY_COMMAND.to_string());

        let allowed_branches = lookup("ALLOWED_BRANCHES")
            .map(|raw| parse_branches(&raw))
            .filter(|branches| !branches.is_empty())
            .unwrap_or_else(default_branches);

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                DeployError::ConfigError(format!("Invalid PORT '{}': {}", raw, e))
            })?,
            None => DEFAULT_PORT,
        };

        let shutdown_grace = match lookup("SHUTDOWN_GRACE_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|e| {
                DeployError::ConfigError(format!("Invalid SHUTDOWN_GRACE_SECS '{}': {}", raw, e))
            })?),
            None => Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        };

        Ok(Self {
            secret,
            project_path,
            deploy_command,
            allowed_branches,
            verbose_logging: is_true(lookup("ENABLE_DETAILED_LOGS")),
            host: lookup("HOST")
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            serialize_deployments: is_true(lookup("SERIALIZE_DEPLOYMENTS")),
            shutdown_grace,
        })
    }

    /// Address the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Logs the resolved configuration. The secret value is never printed.
    pub fn log_summary(&self) {
        let branches: Vec<&str> = self.allowed_branches.iter().map(String::as_str).collect();
        info!("Configuration loaded:");
        info!("  Project path: {}", self.project_path.display());
        info!("  Deploy command: {}", self.deploy_command);
        info!("  Allowed branches: {}", branches.join(", "));
        info!("  Detailed logs: {}", self.verbose_logging);
        info!("  Serialized deployments: {}", self.serialize_deployments);
        info!("  Webhook secret: configured");
    }
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("secret", &"<redacted>")
            .field("project_path", &self.project_path)
            .field("deploy_command", &self.deploy_command)
            .field("allowed_branches", &self.allowed_branches)
            .field("verbose_logging", &self.verbose_logging)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("serialize_deployments", &self.serialize_deployments)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

fn parse_branches(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from)
        .collect()
}

fn default_branches() -> BTreeSet<String> {
    DEFAULT_ALLOWED_BRANCHES
        .iter()
        .map(|b| b.to_string())
        .collect()
}

// Only the exact token enables a flag.
fn is_true(value: Option<String>) -> bool {
    value.as_deref() == Some("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::capture;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DeployConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeployConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, DeployError::ConfigError(_)));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = config_from(&[("WEBHOOK_SECRET", "")]).unwrap_err();
        assert!(matches!(err, DeployError::ConfigError(_)));
    }

    #[test]
    fn defaults_are_applied() {
        let config = config_from(&[("WEBHOOK_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.deploy_command, DEFAULT_DEPLOY_COMMAND);
        assert_eq!(config.project_path, std::env::current_dir().unwrap());
        assert!(config.allowed_branches.contains("main"));
        assert!(config.allowed_branches.contains("master"));
        assert_eq!(config.allowed_branches.len(), 2);
        assert!(!config.verbose_logging);
        assert!(!config.serialize_deployments);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.shutdown_grace, Duration::from_secs(30));
    }

    #[test]
    fn branches_are_split_and_trimmed() {
        let config = config_from(&[
            ("WEBHOOK_SECRET", "s"),
            ("ALLOWED_BRANCHES", " production , staging,,"),
        ])
        .unwrap();
        let branches: Vec<&str> = config.allowed_branches.iter().map(String::as_str).collect();
        assert_eq!(branches, vec!["production", "staging"]);
    }

    #[test]
    fn blank_branch_list_falls_back_to_defaults() {
        let config = config_from(&[("WEBHOOK_SECRET", "s"), ("ALLOWED_BRANCHES", " , ")]).unwrap();
        assert!(config.allowed_branches.contains("main"));
    }

    #[test]
    fn detailed_logs_need_exact_token() {
        for (raw, expected) in [("true", true), ("TRUE", false), ("1", false), ("yes", false)] {
            let config =
                config_from(&[("WEBHOOK_SECRET", "s"), ("ENABLE_DETAILED_LOGS", raw)]).unwrap();
            assert_eq!(config.verbose_logging, expected, "value {:?}", raw);
        }
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("WEBHOOK_SECRET", "s"),
            ("PROJECT_PATH", "/srv/app"),
            ("DEPLOY_COMMAND", "make deploy"),
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("SERIALIZE_DEPLOYMENTS", "true"),
            ("SHUTDOWN_GRACE_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.project_path, PathBuf::from("/srv/app"));
        assert_eq!(config.deploy_command, "make deploy");
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert!(config.serialize_deployments);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let err = config_from(&[("WEBHOOK_SECRET", "s"), ("PORT", "http")]).unwrap_err();
        assert!(matches!(err, DeployError::ConfigError(_)));
    }

    #[test]
    fn debug_output_hides_secret() {
        let config = config_from(&[("WEBHOOK_SECRET", "very-private")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-private"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn summary_never_prints_secret() {
        let config = config_from(&[
            ("WEBHOOK_SECRET", "very-private"),
            ("ALLOWED_BRANCHES", "main,release"),
        ])
        .unwrap();
        let logs = capture(|| config.log_summary());
        assert!(!logs.contains("very-private"));
        assert!(logs.contains("Webhook secret: configured"));
        assert!(logs.contains("Allowed branches: main, release"));
        assert!(logs.contains(DEFAULT_DEPLOY_COMMAND));
    }
}
