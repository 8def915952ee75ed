use tb_domain::NodeId;
use tb_opcua_client::{AddressSpace, TransportError};

use crate::{pick, uniform, Plant};

const ROOMS: usize = 10;

struct Room {
    name: String,
    ph: NodeId,
    dissolved_o2: NodeId,
    temperature: NodeId,
    agitation_speed: NodeId,
    rpm: NodeId,
    status: NodeId,
    load_percent: NodeId,
    room_temp: NodeId,
    humidity: NodeId,
    particle_count: NodeId,
    step: NodeId,
    batch_status: NodeId,
}

/// Ten process rooms, each with a bioreactor, a centrifuge, an environment
/// monitor and a batch controller.
pub struct LifeSciencesFacility {
    rooms: Vec<Room>,
}

impl LifeSciencesFacility {
    pub const ROOT: &'static str = "LifeSciencesFacility";

    pub fn build(space: &AddressSpace) -> Result<Self, TransportError> {
        let facility = space.add_object(&space.objects(), Self::ROOT)?;
        let mut rooms = Vec::with_capacity(ROOMS);

        for i in 1..=ROOMS {
            let name = format!("ProcessRoom{i}");
            let room = space.add_object(&facility, &name)?;

            let bioreactor = space.add_object(&room, "Bioreactor")?;
            let ph = space.add_variable(&bioreactor, "pH", 7.0)?;
            let dissolved_o2 = space.add_variable(&bioreactor, "DissolvedO2", 95.0)?;
            let temperature = space.add_variable(&bioreactor, "Temperature", 37.0)?;
            let agitation_speed = space.add_variable(&bioreactor, "AgitationSpeed", 100.0)?;

            let centrifuge = space.add_object(&room, "Centrifuge")?;
            let rpm = space.add_variable(&centrifuge, "RPM", 0.0)?;
            let status = space.add_variable(&centrifuge, "Status", "Idle")?;
            let load_percent = space.add_variable(&centrifuge, "LoadPercent", 0.0)?;

            let env = space.add_object(&room, "EnvironmentMonitor")?;
            let room_temp = space.add_variable(&env, "RoomTemp", 20.0)?;
            let humidity = space.add_variable(&env, "Humidity", 50.0)?;
            let particle_count = space.add_variable(&env, "ParticleCount", 100_i64)?;

            let batch = space.add_object(&room, "BatchController")?;
            space.add_variable(&batch, "BatchID", format!("BATCH-{i:03}"))?;
            let step = space.add_variable(&batch, "Step", "Initialization")?;
            let batch_status = space.add_variable(&batch, "BatchStatus", "Running")?;

            rooms.push(Room {
                name,
                ph,
                dissolved_o2,
                temperature,
                agitation_speed,
                rpm,
                status,
                load_percent,
                room_temp,
                humidity,
                particle_count,
                step,
                batch_status,
            });
        }

        tracing::info!(rooms = rooms.len(), "life sciences facility configured");
        Ok(Self { rooms })
    }
}

impl Plant for LifeSciencesFacility {
    fn root_name(&self) -> &'static str {
        Self::ROOT
    }

    fn tick(&mut self, space: &AddressSpace, rng: &mut fastrand::Rng) -> Result<(), TransportError> {
        for room in &self.rooms {
            let ph = uniform(rng, 6.5, 7.5);
            space.write(&room.ph, ph)?;
            space.write(&room.dissolved_o2, uniform(rng, 80.0, 100.0))?;
            space.write(&room.temperature, uniform(rng, 36.0, 38.0))?;
            space.write(&room.agitation_speed, uniform(rng, 80.0, 150.0))?;

            let status = pick(rng, &["Idle", "Spinning", "Completed"]);
            let rpm = if status == "Spinning" {
                (rng.f64() * 5000.0).round()
            } else {
                0.0
            };
            let load = if status == "Idle" {
                0.0
            } else {
                uniform(rng, 10.0, 90.0)
            };
            space.write(&room.rpm, rpm)?;
            space.write(&room.status, status)?;
            space.write(&room.load_percent, load)?;

            let room_temp = uniform(rng, 19.5, 21.0);
            let humidity = uniform(rng, 45.0, 55.0);
            let particles = rng.i64(80..=150);
            space.write(&room.room_temp, room_temp)?;
            space.write(&room.humidity, humidity)?;
            space.write(&room.particle_count, particles)?;

            space.write(
                &room.step,
                pick(rng, &["Initialization", "Mixing", "Filling", "Completed"]),
            )?;
            space.write(
                &room.batch_status,
                pick(rng, &["Running", "Paused", "Error", "Completed"]),
            )?;

            tracing::debug!(
                room = %room.name,
                ph,
                centrifuge = status,
                rpm,
                room_temp,
                humidity,
                particles,
                "life sciences tick"
            );
        }
        Ok(())
    }
}
