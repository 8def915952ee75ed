//! `tagbridge browse`: a quick look at what a set of servers exposes.

use std::sync::Arc;

use anyhow::Context;

use tb_domain::config::Config;
use tb_domain::{EndpointUrl, TagSample};
use tb_opcua_client::MemoryConnector;

use crate::bootstrap;

pub struct BrowseOptions {
    pub servers: Vec<String>,
    pub limit: usize,
    pub include_system: bool,
    pub simulate: bool,
}

pub async fn run(config: Arc<Config>, options: BrowseOptions) -> anyhow::Result<()> {
    let memory = Arc::new(MemoryConnector::new());
    let simulators = if options.simulate || config.simulator.enabled {
        Some(bootstrap::start_simulators(&config, memory.clone())?)
    } else {
        None
    };
    let state = bootstrap::build_app_state(config.clone(), bootstrap::build_connector(memory))?;

    let urls = if options.servers.is_empty() {
        bootstrap::known_servers(&config)
    } else {
        options
            .servers
            .iter()
            .map(|raw| EndpointUrl::parse(raw).with_context(|| format!("server {raw}")))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let connected = state.sessions.connect_all(&urls).await;
    for url in urls.iter().filter(|url| !connected.contains(url)) {
        println!("Unreachable: {url}");
    }

    for url in &connected {
        println!("\nBrowsing server: {url}");
        let tags = match state.discovery.tags(url.as_str(), !options.include_system).await {
            Ok(tags) => tags,
            Err(e) => {
                println!("  Discovery failed: {e}");
                continue;
            }
        };
        let Some(first) = tags.first() else {
            println!("  No tags found.");
            continue;
        };

        println!("  {} tag(s)", tags.len());
        for tag in tags.iter().take(options.limit) {
            println!("  {} -> {}", tag.browse_path, tag.node_id);
        }

        let reading = state
            .discovery
            .read_value(url.as_str(), first.node_id.as_str())
            .await?;
        let sample = TagSample {
            tag: first.clone(),
            timestamp: reading.timestamp,
            value: reading.value,
        };
        println!(
            "  Sample value from first tag: {}",
            serde_json::to_string(&sample).context("encoding sample")?
        );
    }

    state.sessions.disconnect_all().await;
    if let Some(simulators) = simulators {
        simulators.stop().await;
    }
    Ok(())
}
