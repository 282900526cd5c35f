//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Channels, packet digestion, and UDP interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! UDP communication interface.
//!
//! One component covers the three deployments: network broadcast,
//! point-to-point, and the same-host relay. Outbound `SEND_PACKET` events are
//! digested and written as single datagrams; a receive thread hands every
//! inbound datagram to a short-lived thread that publishes `PACKET_RECEIVED`.
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use r_swarm_logging::{swarm_debug, swarm_error, swarm_info, swarm_warn, LogContext};
use r_swarm_msg::{BusError, EventType, HandlerContext, HandlerSpec, HandlerTable, KindId};
use r_swarm_rt::Component;
use r_swarm_schema::{Packet, Record, RecordKind};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use uuid::Uuid;

use crate::digestion::Digestion;
use crate::interface::{claim, deliver, hello, is_hello, InterfaceCounters, InterfaceMetrics};
use crate::relay::{is_timeout, RelayHub, DEFAULT_RELAY_PORT};

/// Default datagram port.
pub const DEFAULT_PORT: u16 = 1337;

/// Largest UDP payload over IPv4.
pub(crate) const MAX_DATAGRAM: usize = 65_507;

const POLL: Duration = Duration::from_millis(100);

/// How an interface reaches its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpMode {
    /// Broadcast to every host on the segment.
    Broadcast,
    /// Send to a single configured peer.
    PointToPoint,
    /// Exchange through the same-host relay.
    LocalRelay,
}

/// Interface settings, read from the component's configuration arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UdpSettings {
    /// Interface tag matched against outbound packets.
    pub name: String,
    /// Wire representation.
    pub digestion: Digestion,
    /// Broadcast destination.
    pub broadcast_address: Ipv4Addr,
    /// Local bind address.
    pub bind_address: Ipv4Addr,
    /// Local port, and the peer port unless `target_port` is set.
    pub port: u16,
    /// Peer port when it differs from the local one.
    pub target_port: Option<u16>,
    /// Restrict traffic to `target_address`.
    pub p2p: bool,
    /// Point-to-point peer.
    pub target_address: Ipv4Addr,
    /// Use the same-host relay instead of the network.
    pub local: bool,
    /// Relay port on localhost.
    pub relay_port: u16,
    /// How long to wait for the discovery probe to echo back.
    pub hello_timeout_ms: u64,
}

impl Default for UdpSettings {
    fn default() -> Self {
        Self {
            name: "udp".into(),
            digestion: Digestion::None,
            broadcast_address: Ipv4Addr::BROADCAST,
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            target_port: None,
            p2p: false,
            target_address: Ipv4Addr::BROADCAST,
            local: false,
            relay_port: DEFAULT_RELAY_PORT,
            hello_timeout_ms: 500,
        }
    }
}

impl UdpSettings {
    /// Defaults for the same-host relay variant.
    pub fn local() -> Self {
        Self {
            name: "local-udp".into(),
            local: true,
            ..Self::default()
        }
    }

    /// Deployment selected by these settings.
    pub fn mode(&self) -> UdpMode {
        if self.local {
            UdpMode::LocalRelay
        } else if self.p2p {
            UdpMode::PointToPoint
        } else {
            UdpMode::Broadcast
        }
    }

    fn target(&self) -> SocketAddr {
        let port = self.target_port.unwrap_or(self.port);
        match self.mode() {
            UdpMode::Broadcast => v4(self.broadcast_address, port),
            UdpMode::PointToPoint => v4(self.target_address, port),
            UdpMode::LocalRelay => v4(Ipv4Addr::LOCALHOST, self.relay_port),
        }
    }
}

fn v4(ip: Ipv4Addr, port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(ip, port))
}

/// Open a blocking datagram socket through `socket2`.
pub(crate) fn open_socket(addr: SocketAddr, broadcast: bool, reuse: bool) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if reuse {
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;
    }
    if broadcast {
        socket.set_broadcast(true)?;
    }
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

struct Link {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    own: Option<SocketAddr>,
    connected: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

/// UDP communication interface component.
pub struct UdpInterface {
    settings: UdpSettings,
    link: Option<Link>,
    relay: Option<RelayHub>,
    counters: Arc<InterfaceCounters>,
}

impl UdpInterface {
    /// Interface that connects on activation.
    pub fn new(settings: UdpSettings) -> Self {
        Self {
            settings,
            link: None,
            relay: None,
            counters: Arc::new(InterfaceCounters::default()),
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &UdpSettings {
        &self.settings
    }

    /// Datagram counters.
    pub fn metrics(&self) -> InterfaceMetrics {
        self.counters.snapshot()
    }

    /// Whether the socket is bound and the receive thread runs.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Bound local address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link
            .as_ref()
            .and_then(|link| link.socket.local_addr().ok())
    }

    /// Own address learned through the discovery probe.
    pub fn own_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().and_then(|link| link.own)
    }

    /// Whether this interface hosts the same-host relay.
    pub fn is_relay_host(&self) -> bool {
        self.relay.is_some()
    }

    fn log_context(&self) -> LogContext<'_> {
        LogContext::new()
            .with_kind(Self::KIND.as_str())
            .with_interface(&self.settings.name)
            .with_category("transport")
    }

    fn connect(&mut self, ctx: &HandlerContext) -> anyhow::Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        let settings = &self.settings;
        let target = settings.target();
        let (socket, own) = match settings.mode() {
            UdpMode::Broadcast => {
                let bind = v4(settings.bind_address, settings.port);
                let socket = open_socket(bind, true, true)
                    .with_context(|| format!("binding {} to {bind}", settings.name))?;
                socket.set_read_timeout(Some(POLL))?;
                let own = discover(
                    &socket,
                    target,
                    Duration::from_millis(settings.hello_timeout_ms),
                    &self.log_context(),
                );
                (socket, own)
            }
            UdpMode::PointToPoint => {
                let bind = v4(settings.bind_address, settings.port);
                let socket = open_socket(bind, false, false)
                    .with_context(|| format!("binding {} to {bind}", settings.name))?;
                (socket, None)
            }
            UdpMode::LocalRelay => {
                match RelayHub::bind(target) {
                    Ok(hub) => self.relay = Some(hub),
                    Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                        swarm_debug!(context = self.log_context(), "relay on {target} already hosted");
                    }
                    Err(err) => {
                        return Err(err).with_context(|| format!("hosting relay on {target}"));
                    }
                }
                let socket = open_socket(v4(Ipv4Addr::LOCALHOST, 0), false, false)
                    .context("binding local relay peer")?;
                socket
                    .send_to(&[], target)
                    .with_context(|| format!("registering with relay {target}"))?;
                (socket, None)
            }
        };
        socket.set_read_timeout(Some(POLL))?;

        let socket = Arc::new(socket);
        let connected = Arc::new(AtomicBool::new(true));
        let receiver = {
            let receive = Receiver {
                socket: Arc::clone(&socket),
                connected: Arc::clone(&connected),
                own,
                ctx: ctx.clone(),
                digestion: self.settings.digestion,
                interface: self.settings.name.clone(),
                counters: Arc::clone(&self.counters),
            };
            thread::Builder::new()
                .name(format!("{}-recv", self.settings.name))
                .spawn(move || receive.run())
                .context("spawning receive thread")?
        };
        let local = socket.local_addr()?;
        self.link = Some(Link {
            socket,
            target,
            own,
            connected,
            receiver: Some(receiver),
        });
        swarm_info!(
            context = self.log_context(),
            "connected on {local}, sending to {target}, own address {own:?}"
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.connected.store(false, Ordering::Release);
            if let Some(receiver) = link.receiver.take() {
                if receiver.join().is_err() {
                    swarm_error!(context = self.log_context(), "receive thread panicked");
                }
            }
            swarm_info!(context = self.log_context(), "disconnected");
        }
        if let Some(mut relay) = self.relay.take() {
            relay.stop();
        }
    }
}

/// Send a probe and wait for its echo; the echo's source is our own address.
fn discover(
    socket: &UdpSocket,
    target: SocketAddr,
    timeout: Duration,
    log: &LogContext<'_>,
) -> Option<SocketAddr> {
    let probe = hello(&Uuid::new_v4().to_string());
    if let Err(err) = socket.send_to(&probe, target) {
        swarm_warn!(context = log, "discovery probe to {target} failed: {err}");
        return None;
    }
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) if buf[..len] == probe[..] => return Some(from),
            Ok(_) => {}
            Err(err) if is_timeout(&err) => {}
            Err(err) => {
                swarm_warn!(context = log, "discovery receive failed: {err}");
                return None;
            }
        }
    }
    swarm_warn!(context = log, "discovery probe to {target} never echoed");
    None
}

struct Receiver {
    socket: Arc<UdpSocket>,
    connected: Arc<AtomicBool>,
    own: Option<SocketAddr>,
    ctx: HandlerContext,
    digestion: Digestion,
    interface: String,
    counters: Arc<InterfaceCounters>,
}

impl Receiver {
    fn log_context(&self) -> LogContext<'_> {
        LogContext::new()
            .with_kind(UdpInterface::KIND.as_str())
            .with_interface(&self.interface)
            .with_category("transport")
    }

    fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        while self.connected.load(Ordering::Acquire) {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(err) if is_timeout(&err) => continue,
                Err(err) => {
                    if self.connected.load(Ordering::Acquire) {
                        swarm_warn!(context = self.log_context(), "receive failed: {err}");
                    }
                    continue;
                }
            };
            if Some(from) == self.own || len == 0 || is_hello(&buf[..len]) {
                continue;
            }
            self.dispatch(buf[..len].to_vec());
        }
    }

    fn dispatch(&self, datagram: Vec<u8>) {
        let ctx = self.ctx.clone();
        let digestion = self.digestion;
        let interface = self.interface.clone();
        let counters = Arc::clone(&self.counters);
        let spawned = thread::Builder::new()
            .name(format!("{}-datagram", self.interface))
            .spawn(move || {
                deliver(&ctx, digestion, &interface, &datagram, &counters);
            });
        if let Err(err) = spawned {
            self.counters.dropped();
            swarm_warn!(
                context = self.log_context(),
                "no thread for inbound datagram: {err}"
            );
        }
    }
}

fn transmit(
    interface: &mut UdpInterface,
    _ctx: &HandlerContext,
    record: &Record,
) -> anyhow::Result<Option<Record>> {
    let mut packet = match Packet::from_record(record) {
        Ok(packet) => packet,
        Err(err) => {
            interface.counters.dropped();
            swarm_warn!(
                context = interface.log_context(),
                "unreadable outbound packet dropped: {err}"
            );
            return Ok(None);
        }
    };
    if !claim(&mut packet, &interface.settings.name) {
        return Ok(None);
    }
    let Some(link) = &interface.link else {
        interface.counters.dropped();
        swarm_warn!(context = interface.log_context(), "not connected; packet dropped");
        return Ok(None);
    };
    let wire = match interface.settings.digestion.digest(&packet) {
        Ok(wire) => wire,
        Err(err) => {
            interface.counters.dropped();
            swarm_warn!(
                context = interface.log_context(),
                "packet on channel {} dropped: {err}",
                packet.channel
            );
            return Ok(None);
        }
    };
    if let Err(err) = link.socket.send_to(&wire, link.target) {
        interface.counters.dropped();
        swarm_warn!(
            context = interface.log_context(),
            "send to {} failed: {err}",
            link.target
        );
        return Ok(None);
    }
    interface.counters.sent();
    packet.wire = Some(wire);
    Ok(Some(packet.to_record()?))
}

impl Component for UdpInterface {
    const KIND: KindId = KindId::new("udp");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .on(
                EventType::SendPacket,
                HandlerSpec::new(RecordKind::Packet, transmit)
                    .evaluates(&[EventType::PacketSent], RecordKind::Packet),
            )
            .build()
    }

    fn on_activate(&mut self, ctx: &HandlerContext) -> anyhow::Result<()> {
        self.connect(ctx)
    }

    fn on_deactivate(&mut self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        self.disconnect();
        Ok(())
    }

    fn on_power_down(&mut self, _ctx: &HandlerContext, _state: Option<&Record>) -> anyhow::Result<()> {
        self.disconnect();
        Ok(())
    }
}

impl Drop for UdpInterface {
    fn drop(&mut self) {
        self.disconnect();
    }
}
