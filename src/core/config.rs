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

//! Process-wide configuration, loaded once at startup from a shell-style
//! `key = value` text file.
//!
//! Unknown keys are ignored (forward compatible). Lines without `=` are
//! ignored rather than rejected. `#` starts a comment. Values may be
//! wrapped in matching single or double quotes, which are stripped.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the rendezvous config file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/infrasim/rendezvous.conf";

const DEFAULT_EPOCH_SECONDS: u64 = 60;
const DEFAULT_SLOTS_PER_EPOCH: u32 = 4;
const DEFAULT_SLOT_DURATION_MS: u64 = 500;
const DEFAULT_INTERFACE: &str = "eth0";
const DEFAULT_MAX_PEERS: usize = 64;
const DEFAULT_DESCRIPTOR_PATH: &str = "/etc/infrasim/descriptor.json";
const DEFAULT_PEERS_DIR: &str = "/var/lib/infrasim/peers";

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {0}")]
    Read(PathBuf),
    /// `mesh_secret` is missing or empty after load.
    #[error("mesh_secret is required and must be non-empty")]
    MissingMeshSecret,
    /// An integer-valued key failed to parse as a positive integer.
    #[error("invalid integer value for {key}: {value:?}")]
    InvalidInteger {
        /// The offending key.
        key: String,
        /// The raw (quote-stripped) value that failed to parse.
        value: String,
    },
    /// `slot_duration_ms` is larger than `epoch_seconds*1000/slots_per_epoch` allows.
    #[error("slot_duration_ms ({slot_duration_ms}) exceeds epoch_seconds*1000/slots_per_epoch ({max})")]
    SlotDurationTooLarge {
        /// The configured slot duration.
        slot_duration_ms: u64,
        /// The maximum permitted slot duration given the other settings.
        max: u64,
    },
}

/// Process-wide rendezvous configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Shared symmetric secret, raw bytes (UTF-8 encoded from the config value).
    pub mesh_secret: Vec<u8>,
    /// Epoch length in seconds.
    pub epoch_seconds: u64,
    /// Number of slots per epoch.
    pub slots_per_epoch: u32,
    /// Slot duration in milliseconds.
    pub slot_duration_ms: u64,
    /// Named network interface to bind rendezvous addresses on.
    pub interface: String,
    /// Maximum number of peers retained in memory/on disk.
    pub max_peers: usize,
    /// Whitespace-separated command line invoked with the peer descriptor path appended.
    pub peer_callback: Option<String>,
    /// Path to this node's own descriptor JSON.
    pub descriptor_path: PathBuf,
    /// Directory peer records are persisted into.
    pub peers_dir: PathBuf,
    /// Whether to attach a signature [`crate::core::security::verifier::Verifier`].
    pub verify_signatures: bool,
    /// Pinned expected signer public key (hex), if any.
    pub verifier_pubkey_hex: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mesh_secret: Vec::new(),
            epoch_seconds: DEFAULT_EPOCH_SECONDS,
            slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH,
            slot_duration_ms: DEFAULT_SLOT_DURATION_MS,
            interface: DEFAULT_INTERFACE.to_string(),
            max_peers: DEFAULT_MAX_PEERS,
            peer_callback: None,
            descriptor_path: PathBuf::from(DEFAULT_DESCRIPTOR_PATH),
            peers_dir: PathBuf::from(DEFAULT_PEERS_DIR),
            verify_signatures: false,
            verifier_pubkey_hex: None,
        }
    }
}

fn strip_quotes(v: &str) -> &str {
    let bytes = v.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &v[1..v.len() - 1];
        }
    }
    v
}

fn parse_positive_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidInteger { key: key.to_string(), value: value.to_string() })
}

fn parse_positive_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidInteger { key: key.to_string(), value: value.to_string() })
}

fn parse_positive_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidInteger { key: key.to_string(), value: value.to_string() })
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Load and validate configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::Read(path.to_path_buf()))?;
        Self::parse(&raw)
    }

    /// Parse configuration from the raw text of a `key = value` file.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = strip_quotes(value.trim());

            match key {
                "mesh_secret" => cfg.mesh_secret = value.as_bytes().to_vec(),
                "epoch_seconds" => cfg.epoch_seconds = parse_positive_u64(key, value)?,
                "slots_per_epoch" => cfg.slots_per_epoch = parse_positive_u32(key, value)?,
                "slot_duration_ms" => cfg.slot_duration_ms = parse_positive_u64(key, value)?,
                "interface" => cfg.interface = value.to_string(),
                "max_peers" => cfg.max_peers = parse_positive_usize(key, value)?,
                "peer_callback" => cfg.peer_callback = Some(value.to_string()).filter(|v| !v.is_empty()),
                "descriptor_path" => cfg.descriptor_path = PathBuf::from(value),
                "peers_dir" => cfg.peers_dir = PathBuf::from(value),
                "verify_signatures" => cfg.verify_signatures = parse_bool(value),
                "verifier_pubkey_hex" => {
                    cfg.verifier_pubkey_hex = Some(value.to_string()).filter(|v| !v.is_empty())
                }
                _ => {} // unknown keys are ignored, forward compatible
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mesh_secret.is_empty() {
            return Err(ConfigError::MissingMeshSecret);
        }
        let max_slot_duration_ms =
            (self.epoch_seconds * 1000) / self.slots_per_epoch as u64;
        if self.slot_duration_ms > max_slot_duration_ms {
            return Err(ConfigError::SlotDurationTooLarge {
                slot_duration_ms: self.slot_duration_ms,
                max: max_slot_duration_ms,
            });
        }
        Ok(())
    }
}
