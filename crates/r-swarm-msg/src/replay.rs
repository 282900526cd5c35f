//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use r_swarm_schema::{from_json, RecordKind};
use serde::Deserialize;

use crate::event::Event;
use crate::event_type::EventType;
use crate::mediator::Mediator;
use crate::{BusError, Result};

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    #[serde(default)]
    delay_ms: Option<u64>,
    event: String,
    payload: serde_json::Value,
}

/// Replay events from a newline-delimited JSON file.
///
/// Each line holds an `event` name, a `payload` object decoded against that
/// event's payload kind, and an optional `delay_ms` slept before publishing.
/// A payload may name a more specific accepted kind through `@kind`.
pub fn replay_from_file<P: AsRef<Path>>(mediator: &Mediator, path: P) -> Result<usize> {
    let file = File::open(path)?;
    replay_from_reader(mediator, BufReader::new(file))
}

/// Replay events from any buffered reader.
pub fn replay_from_reader<R: BufRead>(mediator: &Mediator, reader: R) -> Result<usize> {
    let mut count = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)?;
        let event_type: EventType = record
            .event
            .parse()
            .map_err(|_| BusError::UnknownEvent(record.event.clone()))?;
        let kind = match record.payload.get("@kind").and_then(|kind| kind.as_str()) {
            Some(name) => RecordKind::from_name(name)?,
            None => event_type.payload_kind(),
        };
        let payload = from_json(&record.payload, kind)?;
        let event = Event::new(event_type, payload)?;
        if let Some(delay) = record.delay_ms {
            std::thread::sleep(Duration::from_millis(delay));
        }
        mediator.publish(event);
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_from_file_streams_records() {
        let mediator = Mediator::new();
        let temp = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(
            temp.path(),
            r#"{"event":"COMMAND_START","payload":{"cmd":"START","msg":{"@kind":"Record","takeOffAltitude":5.0}}}

{"delay_ms":1,"event":"DRONE_DATA_UPDATE","payload":{"state":"AT_START"}}
"#,
        )
        .expect("write temp file");

        let replayed = replay_from_file(&mediator, temp.path()).expect("replay works");
        assert_eq!(replayed, 2);
        assert_eq!(mediator.metrics().published, 2);
    }

    #[test]
    fn unknown_events_and_bad_payloads_fail() {
        let mediator = Mediator::new();
        let unknown = replay_from_reader(&mediator, r#"{"event":"WARP","payload":{}}"#.as_bytes());
        assert!(matches!(unknown, Err(BusError::UnknownEvent(name)) if name == "WARP"));

        let mismatch = replay_from_reader(
            &mediator,
            r#"{"event":"COMMAND_LAND","payload":{"@kind":"BatteryRecord","level":1,"voltage":1.0,"current":1.0}}"#
                .as_bytes(),
        );
        assert!(matches!(mismatch, Err(BusError::PayloadMismatch { .. })));
    }
}
