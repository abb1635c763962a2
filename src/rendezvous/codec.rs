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

//! Wire framing for the rendezvous UDP payload:
//!
//! ```text
//! offset  size     field
//! 0       4        sig_len (u32, big-endian)
//! 4       sig_len  signature bytes (may be zero-length)
//! 4+sl    N        descriptor JSON bytes (UTF-8)
//! ```
//!
//! There is no acknowledgment and no retry at this layer; a malformed frame
//! is simply dropped by the caller.

use crate::core::types::{NodeDescriptor, Signature};
use thiserror::Error;

/// Frames must fit comfortably inside a single UDP datagram.
pub const MAX_FRAME_LEN: usize = 65535;

/// Errors surfaced while decoding an inbound frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than 4 bytes were received; no `sig_len` header is present.
    #[error("frame shorter than the 4-byte sig_len header")]
    TooShort,
    /// `sig_len` claims more bytes than the datagram actually carries.
    #[error("declared sig_len exceeds the datagram length")]
    SigLenOverflow,
    /// The trailing bytes are not valid UTF-8 or not valid descriptor JSON.
    #[error("descriptor payload is not valid JSON")]
    BadDescriptor,
}

/// A decoded frame: the carried (never verified here) signature, and the descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFrame {
    /// Raw signature bytes, if any were present (`sig_len == 0` otherwise).
    pub signature: Option<Signature>,
    /// The parsed node descriptor.
    pub descriptor: NodeDescriptor,
    /// The descriptor's raw JSON bytes, exactly as received (needed for signature verification).
    pub descriptor_bytes: Vec<u8>,
}

/// Encode `descriptor_bytes` and an optional detached `sig` into a wire frame.
pub fn encode(descriptor_bytes: &[u8], sig: Option<&[u8]>) -> Vec<u8> {
    let sig = sig.unwrap_or(&[]);
    let mut out = Vec::with_capacity(4 + sig.len() + descriptor_bytes.len());
    out.extend_from_slice(&(sig.len() as u32).to_be_bytes());
    out.extend_from_slice(sig);
    out.extend_from_slice(descriptor_bytes);
    out
}

/// Decode a wire frame received off the UDP socket.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
    if bytes.len() < 4 {
        return Err(FrameError::TooShort);
    }
    let sig_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let header = 4usize
        .checked_add(sig_len)
        .filter(|&h| h <= bytes.len())
        .ok_or(FrameError::SigLenOverflow)?;

    let signature = if sig_len == 0 {
        None
    } else {
        Some(Signature(bytes[4..header].to_vec()))
    };
    let descriptor_bytes = bytes[header..].to_vec();
    let descriptor = NodeDescriptor::from_json_bytes(&descriptor_bytes).map_err(|_| FrameError::BadDescriptor)?;

    Ok(DecodedFrame { signature, descriptor, descriptor_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_signature() {
        let descriptor = br#"{"node_id":"n1"}"#;
        let sig = [0x00, 0x01, 0x02];
        let encoded = encode(descriptor, Some(&sig));
        assert_eq!(encoded.len(), 4 + sig.len() + descriptor.len());

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.signature, Some(Signature(sig.to_vec())));
        assert_eq!(decoded.descriptor.node_id(), Some("n1"));
        assert_eq!(decoded.descriptor_bytes, descriptor);
    }

    #[test]
    fn round_trip_without_signature() {
        let descriptor = br#"{"node_id":"n2"}"#;
        let encoded = encode(descriptor, None);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.signature, None);
        assert_eq!(decoded.descriptor.node_id(), Some("n2"));
    }

    #[test]
    fn too_short_is_rejected() {
        assert_eq!(decode(&[0, 0, 0]).unwrap_err(), FrameError::TooShort);
        assert_eq!(decode(&[]).unwrap_err(), FrameError::TooShort);
    }

    #[test]
    fn sig_len_overflow_is_rejected() {
        // Declares a 10-byte signature but the datagram is only 4 bytes long.
        let mut bytes = 10u32.to_be_bytes().to_vec();
        assert_eq!(decode(&bytes).unwrap_err(), FrameError::SigLenOverflow);

        bytes.extend_from_slice(&[0u8; 5]); // still short of the declared 10
        assert_eq!(decode(&bytes).unwrap_err(), FrameError::SigLenOverflow);
    }

    #[test]
    fn non_json_trailer_is_rejected() {
        let mut bytes = 0u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"not json");
        assert_eq!(decode(&bytes).unwrap_err(), FrameError::BadDescriptor);
    }

    #[test]
    fn unknown_descriptor_fields_are_preserved() {
        let descriptor = br#"{"node_id":"n1","endpoints":["10.0.0.1:1"],"attestation":{"quote":"abc"}}"#;
        let encoded = encode(descriptor, None);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.descriptor_bytes, descriptor);
        assert_eq!(
            decoded.descriptor.as_value().get("attestation").and_then(|v| v.get("quote")).and_then(|v| v.as_str()),
            Some("abc")
        );
    }
}
