//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Vehicle runtime, component registry, and reference collaborators."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Turns sensor readings into vehicle-state updates.
use std::collections::BTreeMap;

use r_swarm_msg::{BusError, EventType, HandlerContext, HandlerSpec, HandlerTable, KindId};
use r_swarm_rt::Component;
use r_swarm_schema::{Record, RecordKind, Value, ValueKind};

/// Sensor field to state field, for `MISC_SENSOR_DATA`.
const MISC_FIELDS: [(&str, &str); 3] = [
    ("coords", "coordinates"),
    ("vel", "velocity"),
    ("battery", "battery"),
];

/// Sensor field to state field, for `MOVEMENT_SENSOR_DATA`.
const MOVEMENT_FIELDS: [(&str, &str); 5] = [
    ("vel", "velocity"),
    ("position", "position"),
    ("acceleration", "acceleration"),
    ("rotation", "rotation"),
    ("angular_velocity", "angular_velocity"),
];

/// Evaluator keeping the last reading of every sensor it has seen.
#[derive(Debug, Clone, Default)]
pub struct SensorEvaluator {
    readings: BTreeMap<String, Record>,
}

impl SensorEvaluator {
    /// Evaluator with no readings yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reading reported by `sensor`.
    pub fn last_reading(&self, sensor: &str) -> Option<&Record> {
        self.readings.get(sensor)
    }

    fn evaluate(
        &mut self,
        reading: &Record,
        mapping: &[(&str, &str)],
    ) -> anyhow::Result<Option<Record>> {
        let sensor = reading.get_str("sensor").unwrap_or_default().to_owned();
        let update = state_update(reading, mapping)?;
        self.readings.insert(sensor, reading.clone());
        Ok(update)
    }
}

/// Copy the mapped readings whose values fit the state field they feed.
fn state_update(reading: &Record, mapping: &[(&str, &str)]) -> anyhow::Result<Option<Record>> {
    let mut update = Record::builder(RecordKind::PartialState);
    let mut carried = 0usize;
    for (source, target) in mapping {
        let Some(value) = reading.get(source) else {
            continue;
        };
        let fits = match *target {
            "battery" => value.matches(ValueKind::Record(RecordKind::Battery)),
            _ => matches!(value, Value::Vector(_)),
        };
        if fits {
            update = update.field(*target, value.clone());
            carried += 1;
        }
    }
    if carried == 0 {
        return Ok(None);
    }
    Ok(Some(update.build()?))
}

fn evaluate_misc(
    evaluator: &mut SensorEvaluator,
    _ctx: &HandlerContext,
    reading: &Record,
) -> anyhow::Result<Option<Record>> {
    evaluator.evaluate(reading, &MISC_FIELDS)
}

fn evaluate_movement(
    evaluator: &mut SensorEvaluator,
    _ctx: &HandlerContext,
    reading: &Record,
) -> anyhow::Result<Option<Record>> {
    evaluator.evaluate(reading, &MOVEMENT_FIELDS)
}

impl Component for SensorEvaluator {
    const KIND: KindId = KindId::new("sensor-evaluator");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .on(
                EventType::MiscSensorData,
                HandlerSpec::new(RecordKind::Sensor, evaluate_misc)
                    .evaluates(&[EventType::DroneDataUpdate], RecordKind::PartialState),
            )
            .on(
                EventType::MovementSensorData,
                HandlerSpec::new(RecordKind::Sensor, evaluate_movement)
                    .evaluates(&[EventType::MovementDataUpdate], RecordKind::PartialState),
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_swarm_msg::Mediator;
    use r_swarm_schema::vehicle::battery;
    use r_swarm_schema::Vector3;
    use std::sync::Arc;

    fn ctx() -> HandlerContext {
        HandlerContext::new(Arc::new(Mediator::new()), SensorEvaluator::KIND)
    }

    fn gps_fix(coords: Vector3) -> Record {
        Record::builder(RecordKind::Sensor)
            .field("sensor", "gps")
            .field("timestamp", 12.0)
            .field("coords", coords)
            .field("alt", coords.z)
            .field("h_acc", 0.4)
            .field("v_acc", 0.9)
            .field("h_dil", 1.1)
            .field("v_dil", 1.6)
            .build()
            .expect("gps fix")
    }

    #[test]
    fn each_sensor_profile_feeds_its_own_state_field() {
        let mut evaluator = SensorEvaluator::new();

        let fix = gps_fix(Vector3::new(48.1, 11.5, 520.0));
        let update = evaluate_misc(&mut evaluator, &ctx(), &fix)
            .expect("evaluate")
            .expect("update");
        assert_eq!(update.kind(), RecordKind::PartialState);
        assert_eq!(update.get_vector("coordinates"), Some(Vector3::new(48.1, 11.5, 520.0)));
        assert!(update.get("velocity").is_none());
        assert!(update.get("h_acc").is_none());

        let velocity = Record::builder(RecordKind::Sensor)
            .field("sensor", "velocity")
            .field("timestamp", 13.0)
            .field("vel", Vector3::new(1.0, 0.0, 0.0))
            .build()
            .expect("velocity reading");
        let update = evaluate_misc(&mut evaluator, &ctx(), &velocity)
            .expect("evaluate")
            .expect("update");
        assert_eq!(update.get_vector("velocity"), Some(Vector3::new(1.0, 0.0, 0.0)));
        assert!(update.get("coordinates").is_none());

        let monitor = Record::builder(RecordKind::Sensor)
            .field("sensor", "battery")
            .field("timestamp", 14.0)
            .field("battery", battery(80, 12.1, 2.0).expect("battery"))
            .build()
            .expect("battery reading");
        let update = evaluate_misc(&mut evaluator, &ctx(), &monitor)
            .expect("evaluate")
            .expect("update");
        assert_eq!(
            update.get_record("battery").and_then(|b| b.get_int("level")),
            Some(80)
        );

        assert_eq!(evaluator.last_reading("gps"), Some(&fix));
        assert_eq!(evaluator.last_reading("velocity"), Some(&velocity));
        assert_eq!(evaluator.last_reading("battery"), Some(&monitor));
    }

    #[test]
    fn a_newer_fix_replaces_the_last_reading() {
        let mut evaluator = SensorEvaluator::new();
        evaluate_misc(&mut evaluator, &ctx(), &gps_fix(Vector3::new(1.0, 1.0, 1.0)))
            .expect("first fix");
        let newer = gps_fix(Vector3::new(2.0, 2.0, 2.0));
        evaluate_misc(&mut evaluator, &ctx(), &newer).expect("second fix");
        assert_eq!(evaluator.last_reading("gps"), Some(&newer));
    }

    #[test]
    fn readings_without_state_fields_evaluate_to_nothing() {
        let mut evaluator = SensorEvaluator::new();
        let reading = Record::builder(RecordKind::Sensor)
            .field("sensor", "baro")
            .field("timestamp", 1.0)
            .field("alt", 312.0)
            .build()
            .expect("reading");
        assert!(evaluate_misc(&mut evaluator, &ctx(), &reading)
            .expect("evaluate")
            .is_none());
        assert!(evaluator.last_reading("baro").is_some());
    }

    #[test]
    fn movement_extras_are_forwarded_when_they_are_vectors() {
        let mut evaluator = SensorEvaluator::new();
        let reading = Record::builder(RecordKind::Sensor)
            .field("sensor", "imu")
            .field("timestamp", 3.0)
            .field("acceleration", Vector3::new(0.0, 0.0, -9.8))
            .field("rotation", "level")
            .build()
            .expect("reading");
        let update = evaluate_movement(&mut evaluator, &ctx(), &reading)
            .expect("evaluate")
            .expect("update");
        assert_eq!(update.get_vector("acceleration"), Some(Vector3::new(0.0, 0.0, -9.8)));
        assert!(update.get("rotation").is_none());
    }

    #[test]
    fn table_routes_both_sensor_streams() {
        let table = SensorEvaluator::handlers().expect("table");
        assert_eq!(
            table.handler(EventType::MiscSensorData).expect("misc").evaluation_targets(),
            &[EventType::DroneDataUpdate]
        );
        assert_eq!(
            table.handler(EventType::MovementSensorData).expect("movement").evaluation_targets(),
            &[EventType::MovementDataUpdate]
        );
    }
}
