// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! The per-slot state machine that drives discovery end to end:
//!
//! ```text
//! IDLE -> DERIVE -> BIND -> BROADCAST -> LISTEN(slot_duration_ms) -> UNBIND -> IDLE
//! ```
//!
//! Runs on a single logical worker (a `current_thread` runtime is
//! sufficient and matches the model); the only suspension points are the
//! short inter-tick sleep, the UDP readiness wait, and the bounded
//! subprocess calls for binding and the peer callback.

use crate::core::config::Config;
use crate::core::types::SlotKey;
use crate::monitoring::metrics::Metrics;
use crate::rendezvous::binder::Binder;
use crate::rendezvous::clock::SlotOracle;
use crate::rendezvous::codec::{self, DecodedFrame};
use crate::rendezvous::deriver;
use crate::rendezvous::learner::PeerLearner;
use crate::rendezvous::store::LocalDescriptor;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, SocketAddrV6};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_millis(10);
const RECV_POLL: Duration = Duration::from_millis(100);
const MAX_DATAGRAM: usize = 65535;

/// Bind or send failure on the per-slot UDP socket. Always non-fatal: the
/// slot is abandoned and the engine proceeds to the next one.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The socket could not be bound to the derived address/port.
    #[error("failed to bind rendezvous socket: {0}")]
    Bind(std::io::Error),
}

/// Resolve a network interface name to its Linux `ifindex` (used as the
/// IPv6 scope id), via `/sys/class/net/<iface>/ifindex`. Returns `0`
/// (meaning "unspecified scope") if the interface cannot be resolved,
/// which lets the OS pick a default rather than aborting the slot.
pub fn interface_scope_id(iface: &str) -> u32 {
    let path = format!("/sys/class/net/{iface}/ifindex");
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

/// Bind a UDP socket with `SO_REUSEADDR` (and, on unix, `SO_REUSEPORT`) set
/// before binding, matching the reference implementation's sockets.
///
/// Without this, two colocated nodes deriving the identical `(addr, port)`
/// for a slot cannot both bind it, and scenario S3 (two-node discovery on
/// one host) fails with `EADDRINUSE` on the second bind.
pub fn bind_reuse_udp(addr: SocketAddrV6) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V6(addr).into())?;
    UdpSocket::from_std(socket.into())
}

/// Drives the per-slot discovery loop.
pub struct SlotEngine<B: Binder> {
    config: Config,
    oracle: SlotOracle,
    binder: B,
    scope_id: u32,
    local: Option<LocalDescriptor>,
    learner: PeerLearner,
    metrics: Option<Arc<Metrics>>,
}

impl<B: Binder> SlotEngine<B> {
    /// Build an engine. `local` is `None` when no descriptor file was found
    /// at startup — the engine still runs, it just never broadcasts.
    pub fn new(
        config: Config,
        binder: B,
        local: Option<LocalDescriptor>,
        learner: PeerLearner,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let oracle = SlotOracle::new(config.epoch_seconds, config.slots_per_epoch);
        let scope_id = interface_scope_id(&config.interface);
        Self { config, oracle, binder, scope_id, local, learner, metrics }
    }

    /// Run until `stop_rx` reports `true`. A slot in progress completes its
    /// unbind step (best-effort) before the loop exits.
    pub async fn run(&mut self, mut stop_rx: watch::Receiver<bool>) {
        let mut last_key: Option<SlotKey> = None;

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let (key, remaining) = self.oracle.current();
            if last_key != Some(key) {
                last_key = Some(key);
                if let Some(m) = &self.metrics {
                    m.slots_total.inc();
                }
                self.run_slot(key, remaining, &mut stop_rx).await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(TICK) => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("slot engine stopped");
    }

    async fn run_slot(&mut self, key: SlotKey, seconds_remaining: f64, stop_rx: &mut watch::Receiver<bool>) {
        let endpoint = deriver::derive(&self.config.mesh_secret, key);
        let iface = self.config.interface.clone();

        if let Err(e) = self.binder.add(&iface, endpoint.address).await {
            warn!(epoch = key.epoch, slot = key.slot, err = %e, "bind failed, skipping slot");
            if let Some(m) = &self.metrics {
                m.binder_errors_total.inc();
            }
            return;
        }

        let slot_budget = Duration::from_secs_f64(seconds_remaining.max(0.0))
            .min(Duration::from_millis(self.config.slot_duration_ms));

        if let Err(e) = self.run_socket_phase(&iface, endpoint.address, endpoint.port, slot_budget, stop_rx).await {
            warn!(epoch = key.epoch, slot = key.slot, err = %e, "socket phase failed");
            if let Some(m) = &self.metrics {
                m.socket_errors_total.inc();
            }
        }

        if let Err(e) = self.binder.remove(&iface, endpoint.address).await {
            warn!(epoch = key.epoch, slot = key.slot, err = %e, "best-effort unbind failed");
            if let Some(m) = &self.metrics {
                m.binder_errors_total.inc();
            }
        }
    }

    async fn run_socket_phase(
        &mut self,
        iface: &str,
        address: std::net::Ipv6Addr,
        port: u16,
        slot_budget: Duration,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), SocketError> {
        let bind_addr = SocketAddrV6::new(address, port, 0, self.scope_id);
        let socket = bind_reuse_udp(bind_addr).map_err(SocketError::Bind)?;

        if let Some(local) = &self.local {
            let frame = codec::encode(&local.bytes, local.signature.as_ref().map(|s| s.0.as_slice()));
            let dest = SocketAddr::V6(SocketAddrV6::new(address, port, 0, self.scope_id));
            if let Err(e) = socket.send_to(&frame, dest).await {
                warn!(%iface, err = %e, "broadcast failed");
            } else {
                debug!(%iface, node_id = local.descriptor.node_id().unwrap_or("?"), "broadcast sent");
            }
        }

        let deadline = tokio::time::Instant::now() + slot_budget;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            if *stop_rx.borrow() {
                return Ok(());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let wait = RECV_POLL.min(deadline - now);

            tokio::select! {
                res = tokio::time::timeout(wait, socket.recv_from(&mut buf)) => {
                    match res {
                        Ok(Ok((len, from))) => self.handle_datagram(&buf[..len], from).await,
                        Ok(Err(e)) => warn!(err = %e, "recv_from failed"),
                        Err(_) => {} // poll timeout, loop again and re-check the deadline
                    }
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        let decoded: DecodedFrame = match codec::decode(bytes) {
            Ok(f) => f,
            Err(e) => {
                warn!(%from, err = %e, "dropping malformed frame");
                if let Some(m) = &self.metrics {
                    m.frames_dropped_total.inc();
                }
                return;
            }
        };
        match self.learner.learn(decoded).await {
            Ok(learned) => info!(%from, node_id = %learned.node_id, pending = learned.pending, "peer learned"),
            Err(e) => debug!(%from, err = %e, "peer not learned"),
        }
    }
}

/// Load a [`Config`] at `path`, exiting the process with a single-line
/// error on stderr and a non-zero status on failure (matches the CLI
/// contract in `SPEC_FULL.md` section 6).
pub fn load_config_or_exit(path: &Path) -> Config {
    match Config::load(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    }
}
