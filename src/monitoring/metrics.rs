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

//! Prometheus metrics mirroring the error taxonomy in `SPEC_FULL.md` section 7,
//! plus one gauge per slot-engine state variable worth observing live.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric construction or registration failed.
    #[error("prometheus")]
    Prom,
}

/// Metrics container for the rendezvous daemon.
#[derive(Clone)]
pub struct Metrics {
    /// Registry all metrics below are registered into.
    pub registry: Registry,

    /// Current size of `known_peers`.
    pub known_peers: IntGauge,
    /// Total slot transitions observed.
    pub slots_total: IntCounter,
    /// `BinderError`s (address add/remove failures).
    pub binder_errors_total: IntCounter,
    /// `SocketError`s (bind/send failures).
    pub socket_errors_total: IntCounter,
    /// Inbound frames dropped (malformed, self-loop, already-known, bad charset).
    pub frames_dropped_total: IntCounter,
    /// `StoreError`s (peer file write failures).
    pub store_errors_total: IntCounter,
    /// Non-zero exit or timeout from `peer_callback`.
    pub callback_failures_total: IntCounter,
    /// Peers currently held in `peers_dir/pending` awaiting verification.
    pub pending_peers_total: IntGauge,
    /// Peers evicted from `known_peers` due to the `max_peers` cap.
    pub peers_evicted_total: IntCounter,
}

impl Metrics {
    /// Create and register all metrics against a fresh [`Registry`].
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let known_peers = IntGauge::new("rendezvous_known_peers", "Peers currently known this process lifetime")
            .map_err(|_| MetricsError::Prom)?;
        let slots_total = IntCounter::new("rendezvous_slots_total", "Total slot transitions")
            .map_err(|_| MetricsError::Prom)?;
        let binder_errors_total = IntCounter::new(
            "rendezvous_binder_errors_total",
            "Address bind/unbind failures",
        )
        .map_err(|_| MetricsError::Prom)?;
        let socket_errors_total = IntCounter::new("rendezvous_socket_errors_total", "UDP bind/send failures")
            .map_err(|_| MetricsError::Prom)?;
        let frames_dropped_total = IntCounter::new(
            "rendezvous_frames_dropped_total",
            "Inbound frames dropped before persistence",
        )
        .map_err(|_| MetricsError::Prom)?;
        let store_errors_total = IntCounter::new("rendezvous_store_errors_total", "Peer file write failures")
            .map_err(|_| MetricsError::Prom)?;
        let callback_failures_total = IntCounter::new(
            "rendezvous_callback_failures_total",
            "peer_callback non-zero exit or timeout",
        )
        .map_err(|_| MetricsError::Prom)?;
        let pending_peers_total = IntGauge::new(
            "rendezvous_pending_peers_total",
            "Peers held under peers_dir/pending awaiting verification",
        )
        .map_err(|_| MetricsError::Prom)?;
        let peers_evicted_total = IntCounter::new(
            "rendezvous_peers_evicted_total",
            "Peers evicted from known_peers due to max_peers",
        )
        .map_err(|_| MetricsError::Prom)?;

        for metric in [
            Box::new(known_peers.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(slots_total.clone()),
            Box::new(binder_errors_total.clone()),
            Box::new(socket_errors_total.clone()),
            Box::new(frames_dropped_total.clone()),
            Box::new(store_errors_total.clone()),
            Box::new(callback_failures_total.clone()),
            Box::new(pending_peers_total.clone()),
            Box::new(peers_evicted_total.clone()),
        ] {
            registry.register(metric).map_err(|_| MetricsError::Prom)?;
        }

        Ok(Self {
            registry,
            known_peers,
            slots_total,
            binder_errors_total,
            socket_errors_total,
            frames_dropped_total,
            store_errors_total,
            callback_failures_total,
            pending_peers_total,
            peers_evicted_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_construct_and_register_without_collision() {
        let m = Metrics::new().unwrap();
        assert!(m.registry.gather().len() >= 9);
    }
}
