//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Vehicle runtime, component registry, and reference collaborators."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Controllers bridging the vehicle state and the communication channels.
use std::collections::BTreeMap;

use anyhow::Context;
use r_swarm_logging::{swarm_debug, swarm_warn, LogContext};
use r_swarm_msg::{command_event, BusError, EventType, HandlerContext, HandlerSpec, HandlerTable, KindId};
use r_swarm_rt::Component;
use r_swarm_schema::{Packet, Record, RecordKind, Value};
use r_swarm_transport::Channel;
use serde::{Deserialize, Serialize};

/// Settings shared by channel controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChannelSettings {
    /// Interface tag stamped on outbound packets; `*` lets every interface
    /// carry them.
    pub comm_interface: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            comm_interface: "*".to_owned(),
        }
    }
}

/// Broadcasts the tracked vehicle state through one channel after every
/// scheduling pass.
#[derive(Debug, Clone)]
pub struct ChannelController {
    channel: Channel,
    settings: ChannelSettings,
    state: Record,
}

impl ChannelController {
    /// Controller for `channel` starting from `state`.
    pub fn new(channel: Channel, state: Record, settings: ChannelSettings) -> Self {
        Self {
            channel,
            settings,
            state,
        }
    }

    /// Channel this controller packs into.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Last known vehicle state.
    pub fn state(&self) -> &Record {
        &self.state
    }

    /// Pack the tracked state for sending.
    pub fn packet(&self) -> anyhow::Result<Record> {
        let packet = self
            .channel
            .pack(&self.state, &self.settings.comm_interface)
            .with_context(|| format!("packing state for {}", self.channel))?;
        Ok(packet.to_record()?)
    }
}

fn track_state(
    controller: &mut ChannelController,
    _ctx: &HandlerContext,
    update: &Record,
) -> anyhow::Result<Option<Record>> {
    controller.state.update_from(update)?;
    Ok(None)
}

impl Component for ChannelController {
    const KIND: KindId = KindId::new("channel-controller");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .on(
                EventType::DroneDataUpdate,
                HandlerSpec::new(RecordKind::PartialState, track_state),
            )
            .build()
    }

    fn on_initialize(&mut self, _ctx: &HandlerContext, state: &Record) -> anyhow::Result<()> {
        self.state.update_from(state)?;
        Ok(())
    }

    fn post_process(&mut self, ctx: &HandlerContext) -> anyhow::Result<()> {
        ctx.raise(EventType::SendPacket, self.packet()?)?;
        Ok(())
    }
}

/// Relays operator commands over the command channel and turns received
/// command packets back into command events.
#[derive(Debug, Clone, Default)]
pub struct CommandChannelController {
    settings: ChannelSettings,
    rejected: u64,
}

impl CommandChannelController {
    /// Controller stamping outbound packets per `settings`.
    pub fn new(settings: ChannelSettings) -> Self {
        Self {
            settings,
            rejected: 0,
        }
    }

    /// Received command packets dropped as malformed.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

/// Log and count an inbound packet that cannot be used.
fn reject_inbound(
    rejected: &mut u64,
    ctx: &HandlerContext,
    interface: Option<&str>,
    reason: &dyn std::fmt::Display,
) {
    *rejected += 1;
    let mut context = LogContext::new()
        .with_kind(ctx.origin().as_str())
        .with_category("inbound");
    if let Some(interface) = interface {
        context = context.with_interface(interface);
    }
    swarm_warn!(context = context, "dropping received packet: {reason}");
}

fn send_command(
    controller: &mut CommandChannelController,
    _ctx: &HandlerContext,
    command: &Record,
) -> anyhow::Result<Option<Record>> {
    let packet = Channel::Command.pack(command, &controller.settings.comm_interface)?;
    Ok(Some(packet.to_record()?))
}

fn receive_command(
    controller: &mut CommandChannelController,
    ctx: &HandlerContext,
    record: &Record,
) -> anyhow::Result<Option<Record>> {
    let packet = match Packet::from_record(record) {
        Ok(packet) => packet,
        Err(err) => {
            reject_inbound(&mut controller.rejected, ctx, None, &err);
            return Ok(None);
        }
    };
    if packet.channel != Channel::Command.name() {
        return Ok(None);
    }
    let kind = match packet.payload.command() {
        Some(kind) if packet.payload.kind() == RecordKind::Command => kind,
        _ => {
            let reason = format!("{} without a command tag", packet.payload.kind());
            reject_inbound(&mut controller.rejected, ctx, Some(&packet.interface), &reason);
            return Ok(None);
        }
    };
    swarm_debug!(
        context = LogContext::new()
            .with_kind(ctx.origin().as_str())
            .with_interface(&packet.interface)
            .with_category("command"),
        "received {kind} over the command channel"
    );
    ctx.raise(command_event(kind), packet.payload)?;
    Ok(None)
}

impl Component for CommandChannelController {
    const KIND: KindId = KindId::new("command-channel");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .on_any(
                &[
                    EventType::CommandStart,
                    EventType::CommandLand,
                    EventType::CommandChangeCourse,
                ],
                HandlerSpec::new(RecordKind::Command, send_command)
                    .evaluates(&[EventType::SendPacket], RecordKind::Packet),
            )
            .on(
                EventType::PacketReceived,
                HandlerSpec::new(RecordKind::Packet, receive_command),
            )
            .build()
    }
}

/// Broadcasts the vehicle through the neighbour channel and collects what
/// other vehicles broadcast.
#[derive(Debug, Clone)]
pub struct NeighbourChannelController {
    inner: ChannelController,
    neighbours: BTreeMap<String, Value>,
    rejected: u64,
}

impl NeighbourChannelController {
    /// Controller starting from `state`.
    pub fn new(state: Record, settings: ChannelSettings) -> Self {
        Self {
            inner: ChannelController::new(Channel::Neighbour, state, settings),
            neighbours: BTreeMap::new(),
            rejected: 0,
        }
    }

    /// Latest payload per neighbour id.
    pub fn neighbours(&self) -> &BTreeMap<String, Value> {
        &self.neighbours
    }

    /// Received neighbour packets dropped as malformed.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn own_id(&self) -> Option<i64> {
        self.inner.state.get_int("id")
    }
}

fn track_own_state(
    controller: &mut NeighbourChannelController,
    ctx: &HandlerContext,
    update: &Record,
) -> anyhow::Result<Option<Record>> {
    track_state(&mut controller.inner, ctx, update)
}

fn receive_neighbour(
    controller: &mut NeighbourChannelController,
    ctx: &HandlerContext,
    record: &Record,
) -> anyhow::Result<Option<Record>> {
    let packet = match Packet::from_record(record) {
        Ok(packet) => packet,
        Err(err) => {
            reject_inbound(&mut controller.rejected, ctx, None, &err);
            return Ok(None);
        }
    };
    if packet.channel != Channel::Neighbour.name() {
        return Ok(None);
    }
    let Some(id) = packet.payload.get_int("id") else {
        return Ok(None);
    };
    if Some(id) == controller.own_id() {
        return Ok(None);
    }
    controller
        .neighbours
        .insert(id.to_string(), Value::from(packet.payload));
    let update = Record::builder(RecordKind::PartialState)
        .field("neighbours", controller.neighbours.clone())
        .build()?;
    Ok(Some(update))
}

impl Component for NeighbourChannelController {
    const KIND: KindId = KindId::new("neighbour-channel");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .on(
                EventType::DroneDataUpdate,
                HandlerSpec::new(RecordKind::PartialState, track_own_state),
            )
            .on(
                EventType::PacketReceived,
                HandlerSpec::new(RecordKind::Packet, receive_neighbour)
                    .evaluates(&[EventType::DroneDataUpdate], RecordKind::PartialState),
            )
            .build()
    }

    fn on_initialize(&mut self, ctx: &HandlerContext, state: &Record) -> anyhow::Result<()> {
        self.inner.on_initialize(ctx, state)
    }

    fn post_process(&mut self, ctx: &HandlerContext) -> anyhow::Result<()> {
        self.inner.post_process(ctx)
    }
}
