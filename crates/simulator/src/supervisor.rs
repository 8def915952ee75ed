//! Start/stop supervision for the simulated endpoints.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tb_domain::config::{SimulatorConfig, Vertical};
use tb_domain::EndpointUrl;
use tb_opcua_client::{AddressSpace, MemoryConnector, TransportError};

use crate::Plant;

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("simulator endpoint: {0}")]
    InvalidEndpoint(#[from] tb_domain::Error),

    #[error("{vertical} simulator could not build its address space: {source}")]
    Build {
        vertical: Vertical,
        source: TransportError,
    },

    #[error("more than one simulator configured at {0}")]
    DuplicateEndpoint(String),
}

struct RunningSimulator {
    vertical: Vertical,
    url: EndpointUrl,
    space: Arc<AddressSpace>,
    handle: JoinHandle<()>,
}

/// A running set of simulators, one task per configured endpoint.
///
/// Each task owns its plant and its RNG; the only thing shared is the
/// cancellation token used by [`SimulatorSet::stop`].
pub struct SimulatorSet {
    connector: Arc<MemoryConnector>,
    shutdown: CancellationToken,
    running: Vec<RunningSimulator>,
}

impl SimulatorSet {
    /// Build every configured plant, bind it on `connector` and start its
    /// update loop.
    ///
    /// Nothing is started unless every endpoint builds.
    pub fn start(
        config: &SimulatorConfig,
        connector: Arc<MemoryConnector>,
    ) -> Result<Self, SimulatorError> {
        let tick = Duration::from_millis(config.tick_ms.max(1));
        let shutdown = CancellationToken::new();

        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let url = EndpointUrl::parse(&endpoint.url)?;
            if !seen.insert(url.authority().to_owned()) {
                return Err(SimulatorError::DuplicateEndpoint(url.to_string()));
            }
            let space = AddressSpace::new();
            let plant = crate::build(endpoint.vertical, &space).map_err(|source| {
                SimulatorError::Build {
                    vertical: endpoint.vertical,
                    source,
                }
            })?;
            prepared.push((endpoint.vertical, url, space, plant));
        }

        let mut running = Vec::with_capacity(prepared.len());
        for (index, (vertical, url, space, plant)) in prepared.into_iter().enumerate() {
            let rng = match config.seed {
                Some(seed) => fastrand::Rng::with_seed(seed.wrapping_add(index as u64)),
                None => fastrand::Rng::new(),
            };
            connector.bind(&url, space.clone());
            let handle = tokio::spawn(run_plant(
                plant,
                space.clone(),
                rng,
                tick,
                url.clone(),
                shutdown.child_token(),
            ));
            tracing::info!(vertical = %vertical, server_url = %url, tick_ms = tick.as_millis() as u64, "simulator started");
            running.push(RunningSimulator {
                vertical,
                url,
                space,
                handle,
            });
        }

        Ok(Self {
            connector,
            shutdown,
            running,
        })
    }

    /// Configured `(vertical, url)` pairs, in start order.
    pub fn endpoints(&self) -> Vec<(Vertical, EndpointUrl)> {
        self.running
            .iter()
            .map(|sim| (sim.vertical, sim.url.clone()))
            .collect()
    }

    /// The address space a simulator writes into.
    pub fn space(&self, vertical: Vertical) -> Option<Arc<AddressSpace>> {
        self.running
            .iter()
            .find(|sim| sim.vertical == vertical)
            .map(|sim| sim.space.clone())
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Stop every loop, wait for them to exit, then take the endpoints
    /// offline and unbind them.
    pub async fn stop(self) {
        self.shutdown.cancel();
        for sim in self.running {
            if let Err(e) = sim.handle.await {
                tracing::warn!(vertical = %sim.vertical, error = %e, "simulator task ended abnormally");
            }
            sim.space.set_online(false);
            self.connector.unbind(&sim.url);
            tracing::info!(vertical = %sim.vertical, server_url = %sim.url, "simulator stopped");
        }
    }
}

async fn run_plant(
    mut plant: Box<dyn Plant>,
    space: Arc<AddressSpace>,
    mut rng: fastrand::Rng,
    tick: Duration,
    url: EndpointUrl,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = plant.tick(&space, &mut rng) {
                    tracing::warn!(
                        root = plant.root_name(),
                        server_url = %url,
                        error = %e,
                        "simulator tick failed"
                    );
                }
            }
        }
    }
}
