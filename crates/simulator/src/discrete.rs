use tb_domain::NodeId;
use tb_opcua_client::{AddressSpace, TransportError};

use crate::{pick, uniform, Plant};

const LINES: usize = 5;

struct AssemblyLine {
    name: String,
    board_present: NodeId,
    spindle_speed: NodeId,
    feed_rate: NodeId,
    operation_status: NodeId,
    pressure: NodeId,
    temperature: NodeId,
    press_cycle_time: NodeId,
    surface_quality: NodeId,
    dimensions_ok: NodeId,
    conveyor_speed: NodeId,
}

/// Five board-deck assembly lines: loader, router, press, inspection
/// station and conveyor.
pub struct BoardDeckAssembly {
    lines: Vec<AssemblyLine>,
}

impl BoardDeckAssembly {
    pub const ROOT: &'static str = "BoardDeckAssembly";

    pub fn build(space: &AddressSpace) -> Result<Self, TransportError> {
        let factory = space.add_object(&space.objects(), Self::ROOT)?;
        let mut lines = Vec::with_capacity(LINES);

        for i in 1..=LINES {
            let name = format!("AssemblyLine{i}");
            let line = space.add_object(&factory, &name)?;

            let loader = space.add_object(&line, "Loader")?;
            let board_present = space.add_variable(&loader, "BoardPresent", false)?;

            let router = space.add_object(&line, "Router")?;
            let spindle_speed = space.add_variable(&router, "SpindleSpeed", 0.0)?;
            let feed_rate = space.add_variable(&router, "FeedRate", 0.0)?;
            let operation_status = space.add_variable(&router, "OperationStatus", "Idle")?;

            let press = space.add_object(&line, "Press")?;
            let pressure = space.add_variable(&press, "Pressure", 0.0)?;
            let temperature = space.add_variable(&press, "Temperature", 0.0)?;
            let press_cycle_time = space.add_variable(&press, "PressCycleTime", 0.0)?;

            let inspection = space.add_object(&line, "InspectionStation")?;
            let surface_quality = space.add_variable(&inspection, "SurfaceQuality", "Unknown")?;
            let dimensions_ok = space.add_variable(&inspection, "DimensionsOK", true)?;

            let conveyor = space.add_object(&line, "Conveyor")?;
            let conveyor_speed = space.add_variable(&conveyor, "Speed", 0.0)?;

            lines.push(AssemblyLine {
                name,
                board_present,
                spindle_speed,
                feed_rate,
                operation_status,
                pressure,
                temperature,
                press_cycle_time,
                surface_quality,
                dimensions_ok,
                conveyor_speed,
            });
        }

        tracing::info!(lines = lines.len(), "board deck assembly configured");
        Ok(Self { lines })
    }
}

impl Plant for BoardDeckAssembly {
    fn root_name(&self) -> &'static str {
        Self::ROOT
    }

    fn tick(&mut self, space: &AddressSpace, rng: &mut fastrand::Rng) -> Result<(), TransportError> {
        for line in &self.lines {
            space.write(&line.board_present, rng.bool())?;

            let status = pick(rng, &["Idle", "Routing", "Error"]);
            let routing = status == "Routing";
            let spindle = if routing { uniform(rng, 5000.0, 20000.0) } else { 0.0 };
            let feed = if routing { uniform(rng, 0.5, 2.5) } else { 0.0 };
            space.write(&line.operation_status, status)?;
            space.write(&line.spindle_speed, spindle)?;
            space.write(&line.feed_rate, feed)?;

            space.write(&line.pressure, uniform(rng, 50.0, 120.0))?;
            space.write(&line.temperature, uniform(rng, 100.0, 180.0))?;
            space.write(&line.press_cycle_time, uniform(rng, 2.0, 5.0))?;

            let quality = pick(rng, &["Excellent", "Good", "Fair", "Fail"]);
            space.write(&line.surface_quality, quality)?;
            space.write(&line.dimensions_ok, quality != "Fail")?;

            let speed = uniform(rng, 0.1, 1.5);
            space.write(&line.conveyor_speed, speed)?;

            tracing::debug!(
                line = %line.name,
                router = status,
                spindle,
                inspection = quality,
                conveyor = speed,
                "discrete tick"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tb_domain::Variant;

    use super::*;

    #[test]
    fn inspection_failure_clears_dimensions_ok() {
        let space = AddressSpace::new();
        let mut assembly = BoardDeckAssembly::build(&space).unwrap();
        let mut rng = fastrand::Rng::with_seed(11);

        for _ in 0..30 {
            assembly.tick(&space, &mut rng).unwrap();
            for i in 1..=5 {
                let base = format!("Objects/BoardDeckAssembly/AssemblyLine{i}/InspectionStation");
                let quality = space
                    .read(&space.find(&format!("{base}/SurfaceQuality")).unwrap())
                    .unwrap();
                let ok = space
                    .read(&space.find(&format!("{base}/DimensionsOK")).unwrap())
                    .unwrap();
                assert_eq!(ok, Variant::Boolean(quality != Variant::from("Fail")));
            }
        }
    }

    #[test]
    fn router_idles_without_spindle() {
        let space = AddressSpace::new();
        let mut assembly = BoardDeckAssembly::build(&space).unwrap();
        let mut rng = fastrand::Rng::with_seed(5);

        for _ in 0..30 {
            assembly.tick(&space, &mut rng).unwrap();
            let base = "Objects/BoardDeckAssembly/AssemblyLine2/Router";
            let status = space
                .read(&space.find(&format!("{base}/OperationStatus")).unwrap())
                .unwrap();
            let spindle = space
                .read(&space.find(&format!("{base}/SpindleSpeed")).unwrap())
                .unwrap()
                .as_f64()
                .unwrap();
            if status == Variant::from("Routing") {
                assert!((5000.0..=20000.0).contains(&spindle));
            } else {
                assert_eq!(spindle, 0.0);
            }
        }
    }
}
