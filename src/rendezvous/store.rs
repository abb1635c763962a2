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

//! Loads the local node descriptor and persists received peer descriptors.
//!
//! Peer writes are atomic (temp file in the same directory, then rename) so
//! a consumer racing the peer callback never observes a half-written file.

use crate::core::security::keystore::atomic_write_private;
use crate::core::types::{DescriptorError, NodeDescriptor, Signature};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced while loading or persisting descriptors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `node_id` contains characters outside `[A-Za-z0-9_.-]+`.
    #[error("node_id {0:?} contains characters outside [A-Za-z0-9_.-]+")]
    InvalidNodeId(String),
    /// The descriptor file could not be read or parsed.
    #[error("invalid descriptor")]
    Descriptor(#[from] DescriptorError),
    /// A filesystem operation failed while persisting a record.
    #[error("io error persisting peer record")]
    Io,
}

/// This node's own descriptor and detached signature, loaded at startup.
#[derive(Clone, Debug)]
pub struct LocalDescriptor {
    /// The parsed descriptor.
    pub descriptor: NodeDescriptor,
    /// Raw JSON bytes, exactly as read from `descriptor_path`.
    pub bytes: Vec<u8>,
    /// Detached signature read from `<descriptor_path>.sig`, if present.
    pub signature: Option<Signature>,
}

/// Validate a `node_id` against the charset `[A-Za-z0-9_.-]+`.
pub fn validate_node_id(node_id: &str) -> Result<(), StoreError> {
    let valid = !node_id.is_empty()
        && node_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidNodeId(node_id.to_string()))
    }
}

/// Load this node's own descriptor and optional sibling signature.
///
/// A missing descriptor file is not an error here: the daemon may still run
/// (it just won't broadcast); the caller is responsible for logging that.
pub fn load_local_descriptor(descriptor_path: &Path) -> Option<LocalDescriptor> {
    let bytes = std::fs::read(descriptor_path).ok()?;
    let descriptor = NodeDescriptor::from_json_bytes(&bytes).ok()?;
    let sig_path = sig_path_for(descriptor_path);
    let signature = std::fs::read(&sig_path).ok().map(Signature);
    Some(LocalDescriptor { descriptor, bytes, signature })
}

fn sig_path_for(descriptor_path: &Path) -> PathBuf {
    let mut os = descriptor_path.as_os_str().to_os_string();
    os.push(".sig");
    PathBuf::from(os)
}

/// Target paths for `<peers_dir>/<node_id>.json[.sig]`, or the `pending/`
/// subtree when `pending` is set (descriptors that failed verification).
fn peer_paths(peers_dir: &Path, node_id: &str, pending: bool) -> (PathBuf, PathBuf) {
    let base = if pending { peers_dir.join("pending") } else { peers_dir.to_path_buf() };
    (base.join(format!("{node_id}.json")), base.join(format!("{node_id}.json.sig")))
}

/// Atomically persist a peer's descriptor (pretty-printed JSON) and optional
/// signature under `peers_dir`, or `peers_dir/pending` when `pending` is set.
///
/// Returns the absolute path to the written descriptor file.
pub fn persist_peer(
    peers_dir: &Path,
    node_id: &str,
    descriptor: &NodeDescriptor,
    signature: Option<&Signature>,
    pending: bool,
) -> Result<PathBuf, StoreError> {
    validate_node_id(node_id)?;

    let (json_path, sig_path) = peer_paths(peers_dir, node_id, pending);
    let pretty = descriptor.to_pretty_json_bytes()?;

    atomic_write_private(&json_path, &pretty).map_err(|_| StoreError::Io)?;
    if let Some(sig) = signature {
        atomic_write_private(&sig_path, &sig.0).map_err(|_| StoreError::Io)?;
    }

    std::fs::canonicalize(&json_path).or_else(|_| Ok(json_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn node_id_charset_validation() {
        assert!(validate_node_id("node-1_A.local").is_ok());
        assert!(validate_node_id("").is_err());
        assert!(validate_node_id("../etc/passwd").is_err());
        assert!(validate_node_id("node 1").is_err());
        assert!(validate_node_id("node/1").is_err());
    }

    #[test]
    fn persists_descriptor_and_signature_atomically() {
        let dir = tempdir().unwrap();
        let descriptor = NodeDescriptor::from_json_bytes(br#"{"node_id":"peer-1"}"#).unwrap();
        let sig = Signature(vec![9, 9, 9]);

        let path = persist_peer(dir.path(), "peer-1", &descriptor, Some(&sig), false).unwrap();
        assert!(path.exists());

        let written = std::fs::read(dir.path().join("peer-1.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed["node_id"], "peer-1");

        let written_sig = std::fs::read(dir.path().join("peer-1.json.sig")).unwrap();
        assert_eq!(written_sig, vec![9, 9, 9]);
    }

    #[test]
    fn pending_writes_land_under_pending_subdir() {
        let dir = tempdir().unwrap();
        let descriptor = NodeDescriptor::from_json_bytes(br#"{"node_id":"peer-2"}"#).unwrap();
        persist_peer(dir.path(), "peer-2", &descriptor, None, true).unwrap();
        assert!(dir.path().join("pending").join("peer-2.json").exists());
        assert!(!dir.path().join("peer-2.json").exists());
    }

    #[test]
    fn rejects_invalid_node_id_before_touching_disk() {
        let dir = tempdir().unwrap();
        let descriptor = NodeDescriptor::from_json_bytes(br#"{"node_id":"../escape"}"#).unwrap();
        let err = persist_peer(dir.path(), "../escape", &descriptor, None, false).unwrap_err();
        assert!(matches!(err, StoreError::InvalidNodeId(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_local_descriptor_is_not_fatal() {
        let dir = tempdir().unwrap();
        assert!(load_local_descriptor(&dir.path().join("missing.json")).is_none());
    }

    #[test]
    fn loads_local_descriptor_with_sibling_signature() {
        let dir = tempdir().unwrap();
        let descriptor_path = dir.path().join("descriptor.json");
        std::fs::write(&descriptor_path, br#"{"node_id":"self1"}"#).unwrap();
        std::fs::write(dir.path().join("descriptor.json.sig"), [1, 2, 3]).unwrap();

        let local = load_local_descriptor(&descriptor_path).unwrap();
        assert_eq!(local.descriptor.node_id(), Some("self1"));
        assert_eq!(local.signature, Some(Signature(vec![1, 2, 3])));
    }
}
