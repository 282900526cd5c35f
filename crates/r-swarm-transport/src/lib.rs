//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Channels, packet digestion, and UDP interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Packet pipeline for R-Swarm.
//!
//! Channels filter vehicle records into packets, digestion turns packets into
//! datagram bytes and back, and the UDP interface moves those bytes between
//! vehicles, optionally through a same-host relay.
#![warn(missing_docs)]

pub mod channel;
pub mod digestion;
pub mod interface;
pub mod relay;
pub mod udp;

use r_swarm_schema::RecordError;

/// Shared result type for the packet pipeline.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures raised while packing, digesting, or moving datagrams.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Channel name not part of the fixed channel set.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    /// No channel carries this content hash.
    #[error("no channel with hash {0:#010x}")]
    UnknownChannelHash(i64),
    /// Wire bytes are not a valid digested packet.
    #[error("digestion failed: {0}")]
    Digestion(String),
    /// Record encoding or decoding failed.
    #[error(transparent)]
    Record(#[from] RecordError),
}

pub use channel::Channel;
pub use digestion::Digestion;
pub use interface::{InterfaceCounters, InterfaceMetrics};
pub use relay::{RelayHub, DEFAULT_RELAY_PORT};
pub use udp::{UdpInterface, UdpMode, UdpSettings, DEFAULT_PORT};
