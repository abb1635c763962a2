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

//! Core data types shared across the rendezvous stack: the opaque node
//! descriptor, the derived rendezvous endpoint, and the signature wrapper.

use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use thiserror::Error;

/// Ed25519 (or otherwise opaque) signature bytes, carried but never
/// interpreted by the discovery core itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// Errors surfaced while loading or validating a [`NodeDescriptor`].
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The JSON payload could not be parsed.
    #[error("invalid descriptor json")]
    InvalidJson,
    /// The descriptor is missing the required `node_id` field, or it is empty.
    #[error("missing or empty node_id")]
    MissingNodeId,
}

/// A node descriptor: an opaque JSON object produced out-of-band, identified
/// by a required `node_id` field. Every other field (`identity`, `endpoints`,
/// `attestation`, ...) is preserved verbatim — this crate never interprets them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeDescriptor(serde_json::Value);

impl NodeDescriptor {
    /// Parse a descriptor from raw JSON bytes, validating only that `node_id`
    /// is present and non-empty.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, DescriptorError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|_| DescriptorError::InvalidJson)?;
        let descriptor = Self(value);
        match descriptor.node_id() {
            Some(id) if !id.is_empty() => Ok(descriptor),
            _ => Err(DescriptorError::MissingNodeId),
        }
    }

    /// The descriptor's `node_id`, if present and a JSON string.
    pub fn node_id(&self) -> Option<&str> {
        self.0.get("node_id").and_then(|v| v.as_str())
    }

    /// Read a pinned Ed25519 public key (hex, 32 bytes) from the
    /// conventional `identity.pubkey_hex` field, if present and well formed.
    pub fn identity_pubkey_hex(&self) -> Option<&str> {
        self.0.get("identity")?.get("pubkey_hex")?.as_str()
    }

    /// Canonical JSON bytes as received/stored (compact form, stable key order
    /// is not guaranteed by `serde_json::Value`, but round-trips byte-for-byte
    /// for a given parse since we never re-derive the value).
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, DescriptorError> {
        serde_json::to_vec(&self.0).map_err(|_| DescriptorError::InvalidJson)
    }

    /// Pretty-printed JSON bytes, used when persisting a peer record to disk.
    pub fn to_pretty_json_bytes(&self) -> Result<Vec<u8>, DescriptorError> {
        serde_json::to_vec_pretty(&self.0).map_err(|_| DescriptorError::InvalidJson)
    }

    /// The underlying JSON value, for callers that need direct field access.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// `(epoch, slot)` pair that forms the HMAC input for rendezvous derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    /// Epoch number (`floor(unix_time / epoch_seconds)`).
    pub epoch: u64,
    /// Slot index within the epoch, in `[0, slots_per_epoch)`.
    pub slot: u32,
}

impl SlotKey {
    /// Construct a slot key.
    pub fn new(epoch: u64, slot: u32) -> Self {
        Self { epoch, slot }
    }
}

/// A derived, short-lived rendezvous endpoint. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendezvousEndpoint {
    /// Link-local IPv6 address (`fe80::/10`).
    pub address: Ipv6Addr,
    /// UDP port (`BASE_PORT + slot`).
    pub port: u16,
    /// The slot key this endpoint was derived from.
    pub slot_key: SlotKey,
}
