use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Simulator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Simulated plant type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
    OilGas,
    LifeSciences,
    Discrete,
}

impl Vertical {
    pub fn as_str(self) -> &'static str {
        match self {
            Vertical::OilGas => "oil_gas",
            Vertical::LifeSciences => "life_sciences",
            Vertical::Discrete => "discrete",
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedEndpointConfig {
    pub vertical: Vertical,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Start the simulators inside `tagbridge serve`.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_tick_ms")]
    pub tick_ms: u64,
    /// Fixed RNG seed. Each vertical derives its own stream from it.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "d_endpoints")]
    pub endpoints: Vec<SimulatedEndpointConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_ms: d_tick_ms(),
            seed: None,
            endpoints: d_endpoints(),
        }
    }
}

fn d_tick_ms() -> u64 {
    2_000
}

fn d_endpoints() -> Vec<SimulatedEndpointConfig> {
    let verticals = [Vertical::OilGas, Vertical::LifeSciences, Vertical::Discrete];
    verticals
        .into_iter()
        .zip(super::discovery::d_known_servers())
        .map(|(vertical, url)| SimulatedEndpointConfig { vertical, url })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_match_known_servers() {
        let cfg = SimulatorConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.tick_ms, 2_000);
        assert_eq!(cfg.endpoints.len(), 3);
        assert_eq!(cfg.endpoints[0].vertical, Vertical::OilGas);
        assert_eq!(cfg.endpoints[2].url, "opc.tcp://localhost:4842");
    }

    #[test]
    fn parses_vertical_names() {
        let cfg: SimulatorConfig = toml::from_str(
            r#"
            enabled = true
            seed = 7

            [[endpoints]]
            vertical = "life_sciences"
            url = "opc.tcp://0.0.0.0:5000"
        "#,
        )
        .unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.endpoints[0].vertical, Vertical::LifeSciences);
    }
}
