//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Channels, packet digestion, and UDP interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! The fixed set of communication channels.
//!
//! A channel is a whitelist of vehicle-state fields. Packing projects a record
//! onto that whitelist; an empty whitelist forwards the record untouched.
use r_swarm_schema::{Packet, Record};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{Result, TransportError};

/// Named field filter between a vehicle and its peers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Drone to drone.
    DroneToDrone,
    /// Drone to ground station.
    GroundStation,
    /// Operator commands.
    Command,
    /// Drone to digital twin.
    DigitalTwin,
    /// Drone to neighbour.
    Neighbour,
}

impl Channel {
    /// Wire and configuration name.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Forwarded field names; empty forwards everything.
    pub fn whitelist(self) -> &'static [&'static str] {
        match self {
            Channel::DroneToDrone => &["position", "acceleration", "velocity", "state", "flock_group"],
            Channel::GroundStation => &[
                "position",
                "acceleration",
                "velocity",
                "starting_position",
                "battery",
                "start_time",
                "state",
                "flock_group",
            ],
            Channel::Command | Channel::DigitalTwin => &[],
            Channel::Neighbour => &[
                "id",
                "descriptor",
                "position",
                "coordinates",
                "rotation",
                "acceleration",
                "velocity",
                "angular_velocity",
                "starting_position",
                "start_time",
                "state",
                "flock_group",
            ],
        }
    }

    /// Content hash: the first four bytes of SHA-256 over name and whitelist.
    pub fn hash(self) -> i64 {
        let mut hasher = Sha256::new();
        hasher.update(self.name().as_bytes());
        for field in self.whitelist() {
            hasher.update([0u8]);
            hasher.update(field.as_bytes());
        }
        let digest = hasher.finalize();
        i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }

    /// Every channel, in declaration order.
    pub fn all() -> impl Iterator<Item = Channel> {
        Channel::iter()
    }

    /// Resolve a content hash received on the wire.
    pub fn from_hash(hash: i64) -> Result<Channel> {
        Channel::iter()
            .find(|channel| channel.hash() == hash)
            .ok_or(TransportError::UnknownChannelHash(hash))
    }

    /// Resolve a channel name.
    pub fn from_name(name: &str) -> Result<Channel> {
        name.parse()
            .map_err(|_| TransportError::UnknownChannel(name.to_owned()))
    }

    /// Project `record` onto the whitelist and address it to `interface`.
    pub fn pack(self, record: &Record, interface: &str) -> Result<Packet> {
        let payload = record.project(self.whitelist())?;
        Ok(Packet::new(payload, self.name(), interface))
    }
}
