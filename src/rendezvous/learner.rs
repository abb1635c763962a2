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

//! Deduplicates peers, enforces the `max_peers` cap, persists descriptors,
//! and invokes the external peer callback.
//!
//! **Security note (normative):** this module MUST NOT grant any trust
//! based on a signature merely being present. With no [`Verifier`]
//! attached, trust is entirely the downstream callback's responsibility.

use crate::core::security::verifier::{VerifyOutcome, Verifier};
use crate::core::types::{NodeDescriptor, Signature};
use crate::rendezvous::codec::DecodedFrame;
use crate::rendezvous::store::{self, StoreError};
use crate::monitoring::metrics::Metrics;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced while invoking `peer_callback`.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The callback could not be spawned.
    #[error("failed to spawn peer_callback: {0}")]
    Spawn(std::io::Error),
    /// The callback did not exit within its 30s bound.
    #[error("peer_callback timed out")]
    Timeout,
    /// The callback exited with a non-zero status.
    #[error("peer_callback exited with status {0:?}")]
    NonZeroExit(Option<i32>),
}

/// Why a decoded frame did not result in a persisted, callback-notified peer.
#[derive(Debug, Error)]
pub enum LearnOutcome {
    /// `node_id` is missing, empty, equal to our own, or already known.
    #[error("frame dropped: {0}")]
    Dropped(&'static str),
    /// `node_id` charset validation or disk persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of successfully learning a peer.
#[derive(Debug)]
pub struct Learned {
    /// The peer's `node_id`.
    pub node_id: String,
    /// Absolute path to the persisted descriptor.
    pub path: PathBuf,
    /// Whether the descriptor was routed to `peers_dir/pending` (verification failed).
    pub pending: bool,
    /// Result of invoking `peer_callback`, if one was configured and the peer was not pending.
    pub callback_result: Option<Result<(), CallbackError>>,
}

/// Deduplicates peers (process-lifetime only — deliberately not persisted,
/// so a restarted daemon re-learns and re-notifies every peer it next
/// hears from; see `SPEC_FULL.md` section 9), enforces `max_peers`, and
/// drives persistence + callback invocation.
pub struct PeerLearner {
    self_node_id: String,
    peers_dir: PathBuf,
    max_peers: usize,
    peer_callback: Option<String>,
    verifier: Option<Arc<dyn Verifier>>,
    known_peers: HashSet<String>,
    order: VecDeque<String>,
    metrics: Option<Arc<Metrics>>,
}

impl PeerLearner {
    /// Construct a learner for a node whose own id is `self_node_id`.
    pub fn new(
        self_node_id: impl Into<String>,
        peers_dir: PathBuf,
        max_peers: usize,
        peer_callback: Option<String>,
        verifier: Option<Arc<dyn Verifier>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            self_node_id: self_node_id.into(),
            peers_dir,
            max_peers: max_peers.max(1),
            peer_callback,
            verifier,
            known_peers: HashSet::new(),
            order: VecDeque::new(),
            metrics,
        }
    }

    /// Number of peers currently held in memory.
    pub fn known_peer_count(&self) -> usize {
        self.known_peers.len()
    }

    fn record_drop(&self, reason: &'static str) {
        if let Some(m) = &self.metrics {
            m.frames_dropped_total.inc();
        }
        warn!(reason, "dropped inbound frame");
    }

    /// Process one already-decoded frame through the full learning pipeline.
    pub async fn learn(&mut self, frame: DecodedFrame) -> Result<Learned, LearnOutcome> {
        let Some(node_id) = frame.descriptor.node_id().map(str::to_string) else {
            self.record_drop("missing_node_id");
            return Err(LearnOutcome::Dropped("missing_node_id"));
        };
        if node_id.is_empty() {
            self.record_drop("empty_node_id");
            return Err(LearnOutcome::Dropped("empty_node_id"));
        }
        if node_id == self.self_node_id {
            self.record_drop("self_loop");
            return Err(LearnOutcome::Dropped("self_loop"));
        }
        if self.known_peers.contains(&node_id) {
            self.record_drop("already_known");
            return Err(LearnOutcome::Dropped("already_known"));
        }
        if store::validate_node_id(&node_id).is_err() {
            self.record_drop("invalid_charset");
            return Err(LearnOutcome::Dropped("invalid_charset"));
        }

        let verdict = self
            .verifier
            .as_ref()
            .map(|v| v.verify(&frame.descriptor, &frame.descriptor_bytes, frame.signature.as_ref()))
            .unwrap_or(VerifyOutcome::NoOpinion);
        let pending = verdict == VerifyOutcome::Invalid;

        let path = store::persist_peer(
            &self.peers_dir,
            &node_id,
            &frame.descriptor,
            frame.signature.as_ref(),
            pending,
        )
        .map_err(|e| {
            if let Some(m) = &self.metrics {
                m.store_errors_total.inc();
            }
            e
        })?;

        self.insert_known(node_id.clone());

        let callback_result = if pending {
            None
        } else {
            match &self.peer_callback {
                Some(cmd) => {
                    let result = run_callback(cmd, &path).await;
                    if let (Err(_), Some(m)) = (&result, &self.metrics) {
                        m.callback_failures_total.inc();
                    }
                    Some(result)
                }
                None => None,
            }
        };

        if let Some(m) = &self.metrics {
            m.known_peers.set(self.known_peers.len() as i64);
            if pending {
                m.pending_peers_total.inc();
            }
        }
        info!(%node_id, pending, "learned peer");

        Ok(Learned { node_id, path, pending, callback_result })
    }

    fn insert_known(&mut self, node_id: String) {
        self.known_peers.insert(node_id.clone());
        self.order.push_back(node_id);
        while self.known_peers.len() > self.max_peers {
            if let Some(evicted) = self.order.pop_front() {
                self.known_peers.remove(&evicted);
                if let Some(m) = &self.metrics {
                    m.peers_evicted_total.inc();
                }
            } else {
                break;
            }
        }
    }
}

async fn run_callback(cmd: &str, descriptor_path: &std::path::Path) -> Result<(), CallbackError> {
    let mut parts = cmd.split_whitespace();
    let Some(program) = parts.next() else {
        return Ok(());
    };
    let args: Vec<&str> = parts.collect();

    let mut command = Command::new(program);
    command.args(args).arg(descriptor_path).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    let child = command.spawn().map_err(CallbackError::Spawn)?;
    let status = tokio::time::timeout(CALLBACK_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| CallbackError::Timeout)?
        .map_err(CallbackError::Spawn)?;

    if status.status.success() {
        Ok(())
    } else {
        Err(CallbackError::NonZeroExit(status.status.code()))
    }
}

/// Unverified descriptor bytes paired with an optional signature, used
/// directly by tests and the client CLI without going through the wire codec.
pub fn frame_from_parts(descriptor: NodeDescriptor, signature: Option<Signature>) -> DecodedFrame {
    let descriptor_bytes = descriptor.to_json_bytes().unwrap_or_default();
    DecodedFrame { signature, descriptor, descriptor_bytes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NodeDescriptor;
    use tempfile::tempdir;

    fn frame(node_id: &str) -> DecodedFrame {
        let descriptor =
            NodeDescriptor::from_json_bytes(format!(r#"{{"node_id":"{node_id}"}}"#).as_bytes()).unwrap();
        frame_from_parts(descriptor, None)
    }

    #[tokio::test]
    async fn self_loop_is_silently_dropped() {
        let dir = tempdir().unwrap();
        let mut learner = PeerLearner::new("self1", dir.path().to_path_buf(), 64, None, None, None);
        let err = learner.learn(frame("self1")).await.unwrap_err();
        assert!(matches!(err, LearnOutcome::Dropped("self_loop")));
        assert_eq!(learner.known_peer_count(), 0);
        assert!(!dir.path().join("self1.json").exists());
    }

    #[tokio::test]
    async fn new_peer_is_persisted_and_remembered() {
        let dir = tempdir().unwrap();
        let mut learner = PeerLearner::new("self1", dir.path().to_path_buf(), 64, None, None, None);
        let learned = learner.learn(frame("peer-a")).await.unwrap();
        assert_eq!(learned.node_id, "peer-a");
        assert!(!learned.pending);
        assert!(dir.path().join("peer-a.json").exists());
        assert_eq!(learner.known_peer_count(), 1);
    }

    #[tokio::test]
    async fn repeat_sighting_in_same_process_is_dropped() {
        let dir = tempdir().unwrap();
        let mut learner = PeerLearner::new("self1", dir.path().to_path_buf(), 64, None, None, None);
        learner.learn(frame("peer-a")).await.unwrap();
        let err = learner.learn(frame("peer-a")).await.unwrap_err();
        assert!(matches!(err, LearnOutcome::Dropped("already_known")));
    }

    #[tokio::test]
    async fn capacity_eviction_bounds_known_peers() {
        let dir = tempdir().unwrap();
        let mut learner = PeerLearner::new("self1", dir.path().to_path_buf(), 2, None, None, None);
        learner.learn(frame("n1")).await.unwrap();
        learner.learn(frame("n2")).await.unwrap();
        learner.learn(frame("n3")).await.unwrap();
        assert_eq!(learner.known_peer_count(), 2);
        // Oldest (n1) was evicted under the FIFO/LRU-by-insertion policy.
        assert!(!learner.known_peers.contains("n1"));
        assert!(learner.known_peers.contains("n2"));
        assert!(learner.known_peers.contains("n3"));
    }

    #[tokio::test]
    async fn callback_failure_is_non_fatal_and_peer_remains_known() {
        let dir = tempdir().unwrap();
        let mut learner = PeerLearner::new(
            "self1",
            dir.path().to_path_buf(),
            64,
            Some("/bin/false".to_string()),
            None,
            None,
        );
        let learned = learner.learn(frame("peer-a")).await.unwrap();
        assert!(matches!(learned.callback_result, Some(Err(CallbackError::NonZeroExit(_)))));
        assert_eq!(learner.known_peer_count(), 1);
        assert!(dir.path().join("peer-a.json").exists());
    }

    #[tokio::test]
    async fn invalid_node_id_charset_is_dropped() {
        let dir = tempdir().unwrap();
        let mut learner = PeerLearner::new("self1", dir.path().to_path_buf(), 64, None, None, None);
        let err = learner.learn(frame("../escape")).await.unwrap_err();
        assert!(matches!(err, LearnOutcome::Dropped("invalid_charset")));
    }
}
