//! `tagbridge simulate`: run the simulated plants until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;

use tb_domain::config::Config;
use tb_opcua_client::MemoryConnector;

use crate::bootstrap;

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let set = bootstrap::start_simulators(config, Arc::new(MemoryConnector::new()))?;

    for (vertical, url) in set.endpoints() {
        let nodes = set.space(vertical).map(|space| space.len()).unwrap_or(0);
        println!("{vertical} simulator at {url} ({nodes} nodes)");
    }
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;
    println!("Shutdown requested.");
    set.stop().await;
    Ok(())
}
