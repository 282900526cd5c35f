//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Channels, packet digestion, and UDP interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Packet digestion: packets to datagram bytes and back.
use r_swarm_schema::binary::{decode_int, encode_int, write_len, Reader};
use r_swarm_schema::{decode, encode, from_json_str, to_json_string, Packet, RecordKind};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::channel::Channel;
use crate::{Result, TransportError};

/// Wire representation selected per interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Digestion {
    /// The packet record's JSON text.
    #[default]
    None,
    /// `[payload kind][len][channel hash][binary payload]`.
    Bytes,
}

impl Digestion {
    /// Serialize a packet for the wire.
    pub fn digest(self, packet: &Packet) -> Result<Vec<u8>> {
        match self {
            Digestion::None => {
                let mut plain = packet.clone();
                plain.wire = None;
                Ok(to_json_string(&plain.to_record()?)?.into_bytes())
            }
            Digestion::Bytes => {
                let channel = Channel::from_name(&packet.channel)?;
                let hash = encode_int(channel.hash());
                let payload = encode(&packet.payload)?;
                let mut out = Vec::with_capacity(payload.len() + hash.len() + 4);
                out.push(packet.payload_kind().index());
                write_len(&mut out, hash.len())?;
                out.extend_from_slice(&hash);
                out.extend_from_slice(&payload);
                Ok(out)
            }
        }
    }

    /// Rebuild a packet received on `interface`.
    ///
    /// The returned packet keeps the received bytes in `wire`.
    pub fn undigest(self, wire: &[u8], interface: &str) -> Result<Packet> {
        let mut packet = match self {
            Digestion::None => {
                let text = std::str::from_utf8(wire)
                    .map_err(|err| TransportError::Digestion(format!("datagram is not utf-8: {err}")))?;
                let record = from_json_str(text, RecordKind::Packet)?;
                let packet = Packet::from_record(&record)?;
                Channel::from_name(&packet.channel)?;
                packet
            }
            Digestion::Bytes => {
                let mut reader = Reader::new(wire);
                let kind = RecordKind::from_index(reader.take_u8()?)?;
                let hash = decode_int(reader.take_prefixed()?)?;
                let channel = Channel::from_hash(hash)?;
                let payload = decode(reader.rest(), kind)?;
                Packet::new(payload, channel.name(), "")
            }
        };
        packet.interface = interface.to_owned();
        packet.wire = Some(wire.to_vec());
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_swarm_schema::vehicle::default_state;
    use r_swarm_schema::{RecordError, VehicleState};

    fn ground_station_packet() -> Packet {
        let mut state = default_state().expect("state");
        state.set("state", VehicleState::AtStart).expect("set state");
        Channel::GroundStation.pack(&state, "*").expect("pack")
    }

    #[test]
    fn bytes_frame_carries_kind_and_channel_hash() {
        let packet = ground_station_packet();
        let wire = Digestion::Bytes.digest(&packet).expect("digest");
        assert_eq!(wire[0], RecordKind::PartialState.index());
        let hash_len = usize::from(wire[1]);
        assert_eq!(
            decode_int(&wire[2..2 + hash_len]).expect("hash"),
            Channel::GroundStation.hash()
        );

        let back = Digestion::Bytes.undigest(&wire, "udp").expect("undigest");
        assert_eq!(back.payload, packet.payload);
        assert_eq!(back.channel, "ground-station");
        assert_eq!(back.interface, "udp");
        assert_eq!(back.wire.as_deref(), Some(wire.as_slice()));
    }

    #[test]
    fn none_digestion_is_packet_json() {
        let packet = ground_station_packet();
        let wire = Digestion::None.digest(&packet).expect("digest");
        let text = std::str::from_utf8(&wire).expect("utf-8");
        assert!(text.contains("\"channel\":\"ground-station\""));
        let back = Digestion::None.undigest(&wire, "local-udp").expect("undigest");
        assert_eq!(back.payload, packet.payload);
        assert_eq!(back.interface, "local-udp");
    }

    #[test]
    fn malformed_datagrams_are_rejected() {
        let packet = ground_station_packet();
        let wire = Digestion::Bytes.digest(&packet).expect("digest");
        let truncated = Digestion::Bytes.undigest(&wire[..wire.len() - 3], "udp");
        assert!(matches!(
            truncated,
            Err(TransportError::Record(RecordError::TruncatedInput { .. }))
        ));

        let mut unknown = wire.clone();
        unknown[2] ^= 0x40;
        assert!(Digestion::Bytes.undigest(&unknown, "udp").is_err());
        assert!(Digestion::None.undigest(b"hello", "udp").is_err());
        assert!(Digestion::Bytes.undigest(&[], "udp").is_err());
    }

    #[test]
    fn parses_configuration_names() {
        assert_eq!("BYTES".parse::<Digestion>().expect("digestion"), Digestion::Bytes);
        assert_eq!(Digestion::default(), Digestion::None);
    }
}
