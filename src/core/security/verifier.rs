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

//! Additive, pluggable signature verification for the peer learner.
//!
//! The discovery core performs *no* verification by default — signatures
//! are carried through and handed to whatever downstream consumes the
//! persisted peer record. A node MAY opt into this capability to demote
//! unverifiable peers to "pending" storage instead of trusting them
//! outright. See `SPEC_FULL.md` section 9 for the rationale.

use crate::core::security::keystore::verify_pubkey_bytes;
use crate::core::types::{NodeDescriptor, Signature};

/// Outcome of an attempted verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// No verifier is configured, or the descriptor carries no usable
    /// signature/pubkey material. Absence of proof is not proof of absence.
    NoOpinion,
    /// The signature was checked and matches.
    Valid,
    /// The signature was checked and does not match.
    Invalid,
}

/// Consulted by the peer learner after basic frame/charset validation.
pub trait Verifier: Send + Sync {
    /// Check `sig` over the canonical descriptor JSON bytes.
    fn verify(&self, descriptor: &NodeDescriptor, descriptor_json: &[u8], sig: Option<&Signature>) -> VerifyOutcome;
}

/// The implicit default: never has an opinion. Preserves the reference's
/// behavior of carrying signatures through without judging them.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Verifier for AcceptAll {
    fn verify(&self, _descriptor: &NodeDescriptor, _descriptor_json: &[u8], _sig: Option<&Signature>) -> VerifyOutcome {
        VerifyOutcome::NoOpinion
    }
}

/// Ed25519 verification, either against a pinned key (`pinned_pubkey`) or,
/// absent that, trust-on-first-use of the descriptor's own
/// `identity.pubkey_hex` field.
#[derive(Clone, Debug, Default)]
pub struct Ed25519Verifier {
    /// A pinned 32-byte public key (hex), if operators chose to pin one.
    pub pinned_pubkey_hex: Option<String>,
}

impl Ed25519Verifier {
    /// Build a verifier with no pinned key (pure trust-on-first-use).
    pub fn trust_on_first_use() -> Self {
        Self { pinned_pubkey_hex: None }
    }

    /// Build a verifier pinned to a single expected signer.
    pub fn pinned(pubkey_hex: impl Into<String>) -> Self {
        Self { pinned_pubkey_hex: Some(pubkey_hex.into()) }
    }

    fn resolve_pubkey(&self, descriptor: &NodeDescriptor) -> Option<[u8; 32]> {
        let hex_str = self
            .pinned_pubkey_hex
            .as_deref()
            .or_else(|| descriptor.identity_pubkey_hex())?;
        let bytes = hex::decode(hex_str.trim()).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Some(out)
    }
}

impl Verifier for Ed25519Verifier {
    fn verify(&self, descriptor: &NodeDescriptor, descriptor_json: &[u8], sig: Option<&Signature>) -> VerifyOutcome {
        let Some(sig) = sig else {
            return VerifyOutcome::NoOpinion;
        };
        if sig.0.is_empty() {
            return VerifyOutcome::NoOpinion;
        }
        let Some(pubkey) = self.resolve_pubkey(descriptor) else {
            return VerifyOutcome::NoOpinion;
        };
        if verify_pubkey_bytes(&pubkey, descriptor_json, sig) {
            VerifyOutcome::Valid
        } else {
            VerifyOutcome::Invalid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::security::keystore::FileEd25519Backend;
    use tempfile::tempdir;

    fn descriptor_with_pubkey(node_id: &str, pubkey_hex: &str) -> NodeDescriptor {
        let json = format!(
            r#"{{"node_id":"{node_id}","identity":{{"pubkey_hex":"{pubkey_hex}"}}}}"#
        );
        NodeDescriptor::from_json_bytes(json.as_bytes()).unwrap()
    }

    #[test]
    fn accept_all_never_has_an_opinion() {
        let descriptor = NodeDescriptor::from_json_bytes(br#"{"node_id":"n1"}"#).unwrap();
        let outcome = AcceptAll.verify(&descriptor, b"{}", Some(&Signature(vec![1, 2, 3])));
        assert_eq!(outcome, VerifyOutcome::NoOpinion);
    }

    #[test]
    fn missing_signature_or_pubkey_is_no_opinion_not_invalid() {
        let descriptor = NodeDescriptor::from_json_bytes(br#"{"node_id":"n1"}"#).unwrap();
        let v = Ed25519Verifier::trust_on_first_use();
        assert_eq!(v.verify(&descriptor, b"{}", None), VerifyOutcome::NoOpinion);
        assert_eq!(
            v.verify(&descriptor, b"{}", Some(&Signature(vec![]))),
            VerifyOutcome::NoOpinion
        );
    }

    #[test]
    fn valid_signature_against_trust_on_first_use_pubkey() {
        let dir = tempdir().unwrap();
        let backend = FileEd25519Backend::load_or_create(&dir.path().join("k")).unwrap();
        let pubkey_hex = hex::encode(backend.public_key());
        let descriptor = descriptor_with_pubkey("n1", &pubkey_hex);
        let json = descriptor.to_json_bytes().unwrap();

        use crate::core::security::keystore::SignerBackend;
        let sig = backend.sign(&json).unwrap();

        let v = Ed25519Verifier::trust_on_first_use();
        assert_eq!(v.verify(&descriptor, &json, Some(&sig)), VerifyOutcome::Valid);
    }

    #[test]
    fn wrong_signature_is_invalid_under_pinned_key() {
        let dir = tempdir().unwrap();
        let backend = FileEd25519Backend::load_or_create(&dir.path().join("k")).unwrap();
        let pubkey_hex = hex::encode(backend.public_key());
        let descriptor = descriptor_with_pubkey("n1", &pubkey_hex);
        let json = descriptor.to_json_bytes().unwrap();

        let bogus_sig = Signature(vec![0u8; 64]);
        let v = Ed25519Verifier::pinned(pubkey_hex);
        assert_eq!(v.verify(&descriptor, &json, Some(&bogus_sig)), VerifyOutcome::Invalid);
    }
}
