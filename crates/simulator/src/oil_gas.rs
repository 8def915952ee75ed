use tb_domain::NodeId;
use tb_opcua_client::{AddressSpace, TransportError};

use crate::{pick, round2, uniform, Plant};

const LINES: usize = 5;

struct Line {
    name: String,
    motor_temp: NodeId,
    rpm: NodeId,
    pump_status: NodeId,
    pressure: NodeId,
    vibration: NodeId,
    compressor_status: NodeId,
    inlet_valve: NodeId,
    outlet_valve: NodeId,
    flow_rate: NodeId,
    totalized_flow: NodeId,
    total: f64,
}

/// Five production lines, each with a pump, a compressor, a valve group and
/// a flow sensor whose totalizer accumulates across ticks.
pub struct OilAndGasPlant {
    lines: Vec<Line>,
}

impl OilAndGasPlant {
    pub const ROOT: &'static str = "OilAndGasPlant";

    pub fn build(space: &AddressSpace) -> Result<Self, TransportError> {
        let plant = space.add_object(&space.objects(), Self::ROOT)?;
        let mut lines = Vec::with_capacity(LINES);

        for i in 1..=LINES {
            let name = format!("Line{i}");
            let line = space.add_object(&plant, &name)?;

            let pump = space.add_object(&line, "Pump")?;
            let motor_temp = space.add_variable(&pump, "MotorTemp", 0.0)?;
            let rpm = space.add_variable(&pump, "RPM", 0.0)?;
            let pump_status = space.add_variable(&pump, "PumpStatus", "Stopped")?;

            let compressor = space.add_object(&line, "Compressor")?;
            let pressure = space.add_variable(&compressor, "Pressure", 0.0)?;
            let vibration = space.add_variable(&compressor, "Vibration", 0.0)?;
            let compressor_status = space.add_variable(&compressor, "CompressorStatus", "Idle")?;

            let valves = space.add_object(&line, "ValveGroup")?;
            let inlet_valve = space.add_variable(&valves, "InletValve", true)?;
            let outlet_valve = space.add_variable(&valves, "OutletValve", true)?;

            let flow = space.add_object(&line, "FlowSensor")?;
            let flow_rate = space.add_variable(&flow, "FlowRate", 0.0)?;
            let totalized_flow = space.add_variable(&flow, "TotalizedFlow", 0.0)?;

            lines.push(Line {
                name,
                motor_temp,
                rpm,
                pump_status,
                pressure,
                vibration,
                compressor_status,
                inlet_valve,
                outlet_valve,
                flow_rate,
                totalized_flow,
                total: 0.0,
            });
        }

        tracing::info!(lines = lines.len(), "oil & gas plant configured");
        Ok(Self { lines })
    }
}

impl Plant for OilAndGasPlant {
    fn root_name(&self) -> &'static str {
        Self::ROOT
    }

    fn tick(&mut self, space: &AddressSpace, rng: &mut fastrand::Rng) -> Result<(), TransportError> {
        for line in &mut self.lines {
            let motor_temp = uniform(rng, 60.0, 120.0);
            let rpm = uniform(rng, 1500.0, 3000.0);
            let pump_status = pick(rng, &["Running", "Stopped", "Fault"]);
            space.write(&line.motor_temp, motor_temp)?;
            space.write(&line.rpm, rpm)?;
            space.write(&line.pump_status, pump_status)?;

            let pressure = uniform(rng, 80.0, 130.0);
            let compressor_status = pick(rng, &["Idle", "Compressing", "Fault"]);
            space.write(&line.pressure, pressure)?;
            space.write(&line.vibration, uniform(rng, 0.1, 1.5))?;
            space.write(&line.compressor_status, compressor_status)?;

            space.write(&line.inlet_valve, rng.bool())?;
            space.write(&line.outlet_valve, rng.bool())?;

            let flow_rate = uniform(rng, 100.0, 500.0);
            line.total = round2(line.total + flow_rate);
            space.write(&line.flow_rate, flow_rate)?;
            space.write(&line.totalized_flow, line.total)?;

            tracing::debug!(
                line = %line.name,
                flow_rate,
                total = line.total,
                pump = pump_status,
                rpm,
                motor_temp,
                compressor = compressor_status,
                pressure,
                "oil & gas tick"
            );
        }
        Ok(())
    }
}
