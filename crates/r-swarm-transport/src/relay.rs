//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Channels, packet digestion, and UDP interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Same-host relay standing in for network broadcast.
//!
//! The first local interface to bind the relay port hosts it. Every datagram
//! registers its sender as a peer; non-empty datagrams are forwarded to all
//! other known peers, never back to the sender.
use std::collections::BTreeSet;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use r_swarm_logging::{swarm_debug, swarm_error, swarm_info, swarm_warn, LogContext};

use crate::udp::{open_socket, MAX_DATAGRAM};

/// Port the relay listens on.
pub const DEFAULT_RELAY_PORT: u16 = 1338;

const POLL: Duration = Duration::from_millis(100);

fn relay_context() -> LogContext<'static> {
    LogContext::new()
        .with_component("udp-relay")
        .with_category("transport")
}

/// Relay thread and its peer table.
pub struct RelayHub {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    peers: Arc<Mutex<BTreeSet<SocketAddr>>>,
    forwarded: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl RelayHub {
    /// Bind the relay port and start forwarding.
    ///
    /// Fails with `AddrInUse` when another process already hosts the relay.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = open_socket(addr, false, false)?;
        socket.set_read_timeout(Some(POLL))?;
        let addr = socket.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let peers = Arc::new(Mutex::new(BTreeSet::new()));
        let forwarded = Arc::new(AtomicU64::new(0));

        let thread = {
            let running = Arc::clone(&running);
            let peers = Arc::clone(&peers);
            let forwarded = Arc::clone(&forwarded);
            thread::Builder::new()
                .name("udp-relay".into())
                .spawn(move || relay_loop(socket, running, peers, forwarded))?
        };
        swarm_info!(context = relay_context(), "hosting local relay on {addr}");
        Ok(Self {
            addr,
            running,
            peers,
            forwarded,
            thread: Some(thread),
        })
    }

    /// Bound relay address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Registered peers.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.peers.lock().iter().copied().collect()
    }

    /// Datagrams forwarded so far, counted per recipient.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Stop the relay thread and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                swarm_error!(context = relay_context(), "relay thread on {} panicked", self.addr);
            }
        }
    }
}

impl Drop for RelayHub {
    fn drop(&mut self) {
        self.stop();
    }
}

fn relay_loop(
    socket: UdpSocket,
    running: Arc<AtomicBool>,
    peers: Arc<Mutex<BTreeSet<SocketAddr>>>,
    forwarded: Arc<AtomicU64>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while running.load(Ordering::Acquire) {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if is_timeout(&err) => continue,
            Err(err) => {
                swarm_warn!(context = relay_context(), "relay receive failed: {err}");
                continue;
            }
        };
        let targets: Vec<SocketAddr> = {
            let mut peers = peers.lock();
            if peers.insert(from) {
                swarm_debug!(context = relay_context(), "relay peer {from} registered");
            }
            peers.iter().copied().filter(|peer| *peer != from).collect()
        };
        if len == 0 {
            continue;
        }
        for peer in targets {
            match socket.send_to(&buf[..len], peer) {
                Ok(_) => {
                    forwarded.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    swarm_warn!(context = relay_context(), "relay send to {peer} failed: {err}");
                }
            }
        }
    }
}

pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
