//! `tb-simulator`: simulated plants served as in-memory address spaces.
//!
//! Each vertical builds its node layout into an [`AddressSpace`] and
//! rewrites its variables on every tick. [`SimulatorSet`] runs one
//! independent task per configured endpoint and binds the spaces on a
//! [`tb_opcua_client::MemoryConnector`] so discovery can reach them.

mod discrete;
mod life_sciences;
mod oil_gas;
mod supervisor;

pub use discrete::BoardDeckAssembly;
pub use life_sciences::LifeSciencesFacility;
pub use oil_gas::OilAndGasPlant;
pub use supervisor::{SimulatorError, SimulatorSet};

use tb_domain::config::Vertical;
use tb_opcua_client::{AddressSpace, TransportError};

/// A simulated plant: a fixed node layout plus the physics that moves it.
pub trait Plant: Send + 'static {
    /// Display name of the plant's top-level object under `Objects`.
    fn root_name(&self) -> &'static str;

    /// Write one round of new values into `space`.
    fn tick(&mut self, space: &AddressSpace, rng: &mut fastrand::Rng) -> Result<(), TransportError>;
}

/// Build the node layout for `vertical` and return its physics.
pub fn build(vertical: Vertical, space: &AddressSpace) -> Result<Box<dyn Plant>, TransportError> {
    Ok(match vertical {
        Vertical::OilGas => Box::new(OilAndGasPlant::build(space)?),
        Vertical::LifeSciences => Box::new(LifeSciencesFacility::build(space)?),
        Vertical::Discrete => Box::new(BoardDeckAssembly::build(space)?),
    })
}

/// Uniform sample in `[low, high)` rounded to two decimals.
pub(crate) fn uniform(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    round2(low + rng.f64() * (high - low))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn pick<'a>(rng: &mut fastrand::Rng, options: &[&'a str]) -> &'a str {
    options[rng.usize(..options.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(1);
        for _ in 0..1_000 {
            let v = uniform(&mut rng, 6.5, 7.5);
            assert!((6.5..=7.5).contains(&v), "{v}");
            assert_eq!(v, round2(v));
        }
    }

    #[test]
    fn build_roots_each_vertical_under_objects() {
        for (vertical, root) in [
            (Vertical::OilGas, "OilAndGasPlant"),
            (Vertical::LifeSciences, "LifeSciencesFacility"),
            (Vertical::Discrete, "BoardDeckAssembly"),
        ] {
            let space = AddressSpace::new();
            let plant = build(vertical, &space).unwrap();
            assert_eq!(plant.root_name(), root);
            assert!(space.find(&format!("Objects/{root}")).is_some());
        }
    }
}
