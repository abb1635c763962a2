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

//! Deterministically maps `(mesh_secret, epoch, slot)` to a short-lived
//! link-local IPv6 rendezvous endpoint.
//!
//! This is the correctness foundation of the whole mechanism: for identical
//! inputs, every node must derive the byte-identical endpoint. Endianness
//! (big-endian) is part of the wire contract, not an implementation detail.

use crate::core::types::{RendezvousEndpoint, SlotKey};
use ring::hmac;
use std::net::Ipv6Addr;

/// `51821 + slot` is the derived UDP port.
pub const BASE_PORT: u16 = 51821;

/// Derive the rendezvous endpoint for `(secret, epoch, slot)`.
///
/// ```text
/// msg  = be_u64(epoch) || be_u32(slot)
/// mac  = HMAC-SHA256(secret, msg)
/// iid  = mac[0:8] with bit 1 of the first byte cleared (locally administered)
/// addr = fe80:: || iid
/// port = 51821 + slot
/// ```
pub fn derive(secret: &[u8], slot_key: SlotKey) -> RendezvousEndpoint {
    let mut msg = [0u8; 12];
    msg[0..8].copy_from_slice(&slot_key.epoch.to_be_bytes());
    msg[8..12].copy_from_slice(&slot_key.slot.to_be_bytes());

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let mac = hmac::sign(&key, &msg);
    let mac_bytes = mac.as_ref();

    let mut iid = [0u8; 8];
    iid.copy_from_slice(&mac_bytes[0..8]);
    iid[0] &= 0xFD; // clear the "universal" bit: locally administered EUI-64

    let mut segments = [0u16; 8];
    segments[0] = 0xfe80;
    for i in 0..4 {
        segments[4 + i] = u16::from_be_bytes([iid[2 * i], iid[2 * i + 1]]);
    }
    let address = Ipv6Addr::from(segments);

    let port = BASE_PORT.wrapping_add(slot_key.slot as u16);

    RendezvousEndpoint { address, port, slot_key }
}

/// True iff `addr` falls in `fe80::/10` (the link-local IPv6 range).
///
/// The first 10 bits of a link-local address are `1111111010`; this checks
/// the first two octets directly rather than relying on `Ipv6Addr::is_unicast_link_local`
/// so the property is explicit and independent of stdlib stabilization history.
pub fn is_link_local(addr: &Ipv6Addr) -> bool {
    let octets = addr.octets();
    (octets[0] == 0xfe) && (octets[1] & 0xc0 == 0x80)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let secret = b"test_secret_for_validation";
        let key = SlotKey::new(27764400, 0);
        let a = derive(secret, key);
        let b = derive(secret, key);
        assert_eq!(a, b);
    }

    #[test]
    fn derived_address_is_link_local_with_universal_bit_cleared() {
        let secret = b"test_secret_for_validation";
        for slot in 0..4u32 {
            let ep = derive(secret, SlotKey::new(27764400, slot));
            assert!(is_link_local(&ep.address));
            assert_eq!(ep.address.octets()[8] & 0x02, 0);
            assert_eq!(ep.port, BASE_PORT + slot as u16);
        }
    }

    #[test]
    fn different_secrets_give_different_addresses() {
        let key = SlotKey::new(1, 0);
        let a = derive(b"secret-a", key);
        let b = derive(b"secret-b", key);
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn different_slots_give_different_ports() {
        let secret = b"s";
        let a = derive(secret, SlotKey::new(1, 0));
        let b = derive(secret, SlotKey::new(1, 1));
        assert_ne!(a.port, b.port);
        assert_eq!(b.port, a.port + 1);
    }

    #[test]
    fn is_link_local_rejects_non_link_local() {
        assert!(!is_link_local(&Ipv6Addr::LOCALHOST));
        assert!(!is_link_local(&Ipv6Addr::UNSPECIFIED));
        assert!(!is_link_local(&"2001:db8::1".parse().unwrap()));
    }
}
