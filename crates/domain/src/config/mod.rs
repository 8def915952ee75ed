mod discovery;
mod observability;
mod server;
mod simulator;

pub use discovery::*;
pub use observability::*;
pub use server::*;
pub use simulator::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::endpoint::EndpointUrl;
use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a TOML document. Missing sections and fields take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the config at `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Render the resolved configuration (defaults included) as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }

        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if let Some(rate_limit) = &self.server.rate_limit {
            if rate_limit.requests_per_second == 0 {
                errors.push(ConfigError::error(
                    "server.rate_limit.requests_per_second",
                    "must be greater than 0",
                ));
            }
            if rate_limit.burst_size == 0 {
                errors.push(ConfigError::error(
                    "server.rate_limit.burst_size",
                    "must be greater than 0",
                ));
            }
        }

        for (i, raw) in self.discovery.known_servers.iter().enumerate() {
            if let Err(e) = EndpointUrl::parse(raw) {
                errors.push(ConfigError::error(
                    format!("discovery.known_servers[{i}]"),
                    e.to_string(),
                ));
            }
        }

        if self.discovery.known_servers.is_empty() {
            errors.push(ConfigError::warning(
                "discovery.known_servers",
                "no known servers configured",
            ));
        }

        if self.discovery.system_node_names.is_empty() {
            errors.push(ConfigError::warning(
                "discovery.system_node_names",
                "empty system-name set: every top-level container is treated as a domain root",
            ));
        }

        if self.discovery.max_concurrent_endpoints == 0 {
            errors.push(ConfigError::error(
                "discovery.max_concurrent_endpoints",
                "must be greater than 0",
            ));
        }

        if self.discovery.connect_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "discovery.connect_timeout_ms",
                "must be greater than 0",
            ));
        }

        if self.discovery.endpoint_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "discovery.endpoint_timeout_ms",
                "must be greater than 0",
            ));
        }

        if self.simulator.tick_ms == 0 {
            errors.push(ConfigError::error("simulator.tick_ms", "must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for (i, endpoint) in self.simulator.endpoints.iter().enumerate() {
            match EndpointUrl::parse(&endpoint.url) {
                Ok(url) => {
                    if !seen.insert(url.authority().to_owned()) {
                        errors.push(ConfigError::error(
                            format!("simulator.endpoints[{i}].url"),
                            format!("{} is already used by another simulator", url.authority()),
                        ));
                    }
                }
                Err(e) => errors.push(ConfigError::error(
                    format!("simulator.endpoints[{i}].url"),
                    e.to_string(),
                )),
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let issues = Config::default().validate();
        assert!(
            issues.iter().all(|i| i.severity != ConfigSeverity::Error),
            "unexpected issues: {issues:?}"
        );
    }

    #[test]
    fn unparsable_known_server_is_an_error() {
        let mut cfg = Config::default();
        cfg.discovery.known_servers.push("ftp://nowhere".into());
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "discovery.known_servers[3]" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn duplicate_simulator_authority_is_an_error() {
        let mut cfg = Config::default();
        cfg.simulator.endpoints = vec![
            SimulatedEndpointConfig {
                vertical: Vertical::OilGas,
                url: "opc.tcp://localhost:4840".into(),
            },
            SimulatedEndpointConfig {
                vertical: Vertical::Discrete,
                url: "http://localhost:4840/discrete".into(),
            },
        ];
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "simulator.endpoints[1].url"));
    }

    #[test]
    fn zero_limits_are_errors() {
        let mut cfg = Config::default();
        cfg.discovery.max_concurrent_endpoints = 0;
        cfg.discovery.endpoint_timeout_ms = 0;
        let fields: Vec<_> = cfg.validate().into_iter().map(|i| i.field).collect();
        assert!(fields.contains(&"discovery.max_concurrent_endpoints".to_string()));
        assert!(fields.contains(&"discovery.endpoint_timeout_ms".to_string()));
    }

    #[test]
    fn zero_rate_limit_is_an_error() {
        let mut cfg = Config::default();
        cfg.server.rate_limit = Some(server::RateLimitConfig {
            requests_per_second: 10,
            burst_size: 0,
        });
        let fields: Vec<_> = cfg.validate().into_iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["server.rate_limit.burst_size".to_string()]);
    }

    #[test]
    fn empty_system_names_only_warns() {
        let mut cfg = Config::default();
        cfg.discovery.system_node_names.clear();
        let issue = cfg
            .validate()
            .into_iter()
            .find(|i| i.field == "discovery.system_node_names")
            .expect("warning expected");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_error_display() {
        let e = ConfigError::error("server.port", "port must be greater than 0");
        assert_eq!(e.to_string(), "[ERROR] server.port: port must be greater than 0");
    }

    #[test]
    fn resolved_config_renders_as_toml() {
        let rendered = Config::default().to_toml_string().unwrap();
        assert!(rendered.contains("[discovery]"));
        let reparsed = Config::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed.server.port, 8000);
    }
}
