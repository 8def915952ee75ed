//! AppState construction and background-task spawning shared by `serve` and
//! the one-shot CLI commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;

use tb_domain::config::{Config, ConfigSeverity};
use tb_domain::EndpointUrl;
use tb_opcua_client::{Connector, MemoryConnector, SessionManager};
use tb_simulator::SimulatorSet;

use crate::discovery::DiscoveryService;
use crate::mcp::{Dispatcher, ToolRegistry};
use crate::state::AppState;

/// The connector every session goes through.
///
/// Simulated endpoints are always served from `memory`. With the
/// `opcua-transport` feature, addresses nothing is bound to fall through to
/// a real OPC UA client.
pub fn build_connector(memory: Arc<MemoryConnector>) -> Arc<dyn Connector> {
    #[cfg(feature = "opcua-transport")]
    {
        Arc::new(tb_opcua_client::ChainConnector::new(vec![
            memory as Arc<dyn Connector>,
            Arc::new(tb_opcua_client::wire::OpcUaConnector::default()),
        ]))
    }

    #[cfg(not(feature = "opcua-transport"))]
    {
        memory
    }
}

/// Validate config and wire every subsystem into an [`AppState`].
pub fn build_app_state(config: Arc<Config>, connector: Arc<dyn Connector>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── Sessions & discovery ─────────────────────────────────────────
    let sessions = Arc::new(SessionManager::new(
        connector,
        Duration::from_millis(config.discovery.connect_timeout_ms),
    ));
    sessions.track(&known_servers(&config));
    let discovery = Arc::new(DiscoveryService::new(sessions.clone(), &config.discovery));
    tracing::info!(
        known_servers = config.discovery.known_servers.len(),
        pool_sessions = config.discovery.pool_sessions,
        max_concurrent_endpoints = config.discovery.max_concurrent_endpoints,
        "discovery ready"
    );

    // ── MCP ──────────────────────────────────────────────────────────
    let registry = Arc::new(ToolRegistry::new(config.server.base_url.clone()));
    let dispatcher = Arc::new(Dispatcher::new(discovery.clone(), registry.clone()));

    Ok(AppState {
        config,
        sessions,
        discovery,
        registry,
        dispatcher,
    })
}

/// Known servers from config. Validation has already rejected bad entries,
/// so anything unparsable here is only logged.
pub fn known_servers(config: &Config) -> Vec<EndpointUrl> {
    config
        .discovery
        .known_servers
        .iter()
        .filter_map(|raw| match EndpointUrl::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(server_url = %raw, error = %e, "skipping known server");
                None
            }
        })
        .collect()
}

/// Start the configured simulators on `memory`.
pub fn start_simulators(config: &Config, memory: Arc<MemoryConnector>) -> anyhow::Result<SimulatorSet> {
    let set = SimulatorSet::start(&config.simulator, memory).context("starting simulators")?;
    tracing::info!(count = set.len(), tick_ms = config.simulator.tick_ms, "simulators running");
    Ok(set)
}

/// Open pooled sessions to every known server in the background, so the
/// first discovery call does not pay for the connect.
pub fn spawn_session_warmup(state: &AppState) -> Option<JoinHandle<()>> {
    if !state.config.discovery.pool_sessions {
        return None;
    }
    let urls = known_servers(&state.config);
    let sessions = state.sessions.clone();
    Some(tokio::spawn(async move {
        let connected = sessions.connect_all(&urls).await;
        tracing::info!(
            connected = connected.len(),
            known = urls.len(),
            "session warm-up finished"
        );
    }))
}

#[cfg(test)]
mod tests {
    use tb_domain::config::SimulatedEndpointConfig;
    use tb_domain::config::Vertical;

    use super::*;

    #[test]
    fn invalid_config_is_refused() {
        let mut config = Config::default();
        config.discovery.known_servers = vec!["tcp://nowhere".into()];
        let result = build_app_state(
            Arc::new(config),
            build_connector(Arc::new(MemoryConnector::new())),
        );
        assert!(result.is_err());
    }

    #[test]
    fn known_servers_parse_with_the_http_rewrite() {
        let mut config = Config::default();
        config.discovery.known_servers = vec!["http://localhost:4840".into()];
        assert_eq!(
            known_servers(&config),
            vec![EndpointUrl::parse("opc.tcp://localhost:4840").unwrap()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_connects_to_running_simulators() {
        let mut config = Config::default();
        config.discovery.known_servers = vec!["opc.tcp://localhost:4842".into()];
        config.simulator.endpoints = vec![SimulatedEndpointConfig {
            vertical: Vertical::Discrete,
            url: "opc.tcp://localhost:4842".into(),
        }];
        let config = Arc::new(config);

        let memory = Arc::new(MemoryConnector::new());
        let simulators = start_simulators(&config, memory.clone()).unwrap();
        let state = build_app_state(config, build_connector(memory)).unwrap();

        spawn_session_warmup(&state).unwrap().await.unwrap();
        assert_eq!(state.sessions.list_connected().len(), 1);

        state.sessions.disconnect_all().await;
        simulators.stop().await;
    }

    #[tokio::test]
    async fn only_known_servers_keep_failed_entries() {
        let mut config = Config::default();
        config.discovery.known_servers = vec!["opc.tcp://localhost:4841".into()];
        let state = build_app_state(
            Arc::new(config),
            build_connector(Arc::new(MemoryConnector::new())),
        )
        .unwrap();

        assert!(state.discovery.tags("opc.tcp://localhost:4841", true).await.is_err());
        assert!(state.discovery.tags("opc.tcp://elsewhere:4841", true).await.is_err());

        let infos = state.sessions.sessions();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].url.as_str(), "opc.tcp://localhost:4841");
    }
}
