//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Channels, packet digestion, and UDP interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Pieces shared by every communication interface.
use std::sync::atomic::{AtomicU64, Ordering};

use r_swarm_logging::{swarm_debug, swarm_warn, LogContext};
use r_swarm_msg::{EventType, HandlerContext};
use r_swarm_schema::Packet;

use crate::digestion::Digestion;

/// Prefix of the self-discovery probe; such datagrams never reach the bus.
pub const HELLO_PREFIX: &[u8] = b"R-SWARM-HELLO:";

/// Snapshot of interface counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceMetrics {
    /// Datagrams written to the socket.
    pub sent: u64,
    /// Datagrams decoded and published as `PACKET_RECEIVED`.
    pub received: u64,
    /// Datagrams lost to socket or decode errors.
    pub dropped: u64,
}

/// Counters shared between an interface and its receive threads.
#[derive(Debug, Default)]
pub struct InterfaceCounters {
    sent: AtomicU64,
    received: AtomicU64,
    dropped: AtomicU64,
}

impl InterfaceCounters {
    /// Count a sent datagram.
    pub fn sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a received datagram.
    pub fn received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dropped datagram.
    pub fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> InterfaceMetrics {
        InterfaceMetrics {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Claim an outbound packet for interface `name`.
///
/// Packets addressed to another interface are left alone; an empty or `*`
/// interface is rewritten to `name`.
pub fn claim(packet: &mut Packet, name: &str) -> bool {
    if !packet.addressed_to(name) {
        return false;
    }
    packet.interface = name.to_owned();
    true
}

/// Probe payload carrying `token`.
pub fn hello(token: &str) -> Vec<u8> {
    let mut probe = HELLO_PREFIX.to_vec();
    probe.extend_from_slice(token.as_bytes());
    probe
}

/// Whether a datagram is a discovery probe.
pub fn is_hello(datagram: &[u8]) -> bool {
    datagram.starts_with(HELLO_PREFIX)
}

/// Undigest one inbound datagram and publish it as `PACKET_RECEIVED`.
///
/// Failures are logged and counted as drops; nothing propagates to the caller.
pub fn deliver(
    ctx: &HandlerContext,
    digestion: Digestion,
    interface: &str,
    datagram: &[u8],
    counters: &InterfaceCounters,
) -> bool {
    let log = LogContext::new()
        .with_kind(ctx.origin().as_str())
        .with_interface(interface)
        .with_category("codec");
    let packet = match digestion.undigest(datagram, interface) {
        Ok(packet) => packet,
        Err(err) => {
            counters.dropped();
            swarm_warn!(context = log, "dropped {} byte datagram: {err}", datagram.len());
            return false;
        }
    };
    let published = packet
        .to_record()
        .map_err(anyhow::Error::from)
        .and_then(|record| {
            ctx.raise(EventType::PacketReceived, record)
                .map_err(anyhow::Error::from)
        });
    match published {
        Ok(()) => {
            counters.received();
            swarm_debug!(context = log, "received packet on channel {}", packet.channel);
            true
        }
        Err(err) => {
            counters.dropped();
            swarm_warn!(context = log, "dropped packet on channel {}: {err:#}", packet.channel);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_swarm_msg::{KindId, Mediator};
    use r_swarm_schema::Record;
    use std::sync::Arc;

    #[test]
    fn claims_only_unaddressed_or_matching_packets() {
        let mut open = Packet::new(Record::empty(), "command", "*");
        assert!(claim(&mut open, "udp"));
        assert_eq!(open.interface, "udp");

        let mut other = Packet::new(Record::empty(), "command", "local-udp");
        assert!(!claim(&mut other, "udp"));
        assert_eq!(other.interface, "local-udp");
    }

    #[test]
    fn deliver_counts_drops_and_receptions() {
        let mediator = Arc::new(Mediator::new());
        let ctx = HandlerContext::new(Arc::clone(&mediator), KindId::new("udp"));
        let counters = InterfaceCounters::default();

        assert!(!deliver(&ctx, Digestion::Bytes, "udp", &[0xFF, 0x00], &counters));

        let packet = Packet::new(Record::empty(), "command", "*");
        let wire = Digestion::Bytes.digest(&packet).expect("digest");
        assert!(deliver(&ctx, Digestion::Bytes, "udp", &wire, &counters));

        assert_eq!(
            counters.snapshot(),
            InterfaceMetrics {
                sent: 0,
                received: 1,
                dropped: 1,
            }
        );
        assert_eq!(mediator.metrics().published, 1);
        assert!(is_hello(&hello("abc")));
        assert!(!is_hello(&wire));
    }
}
