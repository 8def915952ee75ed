use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Discovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Endpoint addresses reported by `GET /servers`. Kept as raw strings so
    /// that a bad entry surfaces through `Config::validate` instead of
    /// failing the whole file.
    #[serde(default = "d_known_servers")]
    pub known_servers: Vec<String>,
    /// Top-level children of `Objects` that are infrastructure, not plant.
    #[serde(default = "d_system_node_names")]
    pub system_node_names: Vec<String>,
    /// Default for `skip_system_tags` when a caller omits it.
    #[serde(default = "d_true")]
    pub skip_system_tags: bool,
    #[serde(default = "d_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound on one endpoint's whole connect + walk.
    #[serde(default = "d_endpoint_timeout_ms")]
    pub endpoint_timeout_ms: u64,
    /// How many endpoints a batch call works on at once.
    #[serde(default = "d_max_concurrent_endpoints")]
    pub max_concurrent_endpoints: usize,
    /// Reuse sessions across calls. When false every call connects and
    /// disconnects.
    #[serde(default = "d_true")]
    pub pool_sessions: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            known_servers: d_known_servers(),
            system_node_names: d_system_node_names(),
            skip_system_tags: true,
            connect_timeout_ms: d_connect_timeout_ms(),
            endpoint_timeout_ms: d_endpoint_timeout_ms(),
            max_concurrent_endpoints: d_max_concurrent_endpoints(),
            pool_sessions: true,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

pub(crate) fn d_known_servers() -> Vec<String> {
    vec![
        "opc.tcp://localhost:4840".into(),
        "opc.tcp://localhost:4841".into(),
        "opc.tcp://localhost:4842".into(),
    ]
}
fn d_system_node_names() -> Vec<String> {
    ["Server", "Types", "Views", "EventTypes", "BaseEventType"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn d_true() -> bool {
    true
}
fn d_connect_timeout_ms() -> u64 {
    5_000
}
fn d_endpoint_timeout_ms() -> u64 {
    30_000
}
fn d_max_concurrent_endpoints() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg: DiscoveryConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.known_servers.len(), 3);
        assert_eq!(cfg.known_servers[1], "opc.tcp://localhost:4841");
        assert!(cfg.system_node_names.iter().any(|n| n == "BaseEventType"));
        assert!(cfg.skip_system_tags);
        assert!(cfg.pool_sessions);
        assert_eq!(cfg.max_concurrent_endpoints, 4);
    }

    #[test]
    fn custom_system_names_replace_defaults() {
        let cfg: DiscoveryConfig = toml::from_str(r#"system_node_names = ["Server"]"#).unwrap();
        assert_eq!(cfg.system_node_names, vec!["Server".to_string()]);
    }
}
