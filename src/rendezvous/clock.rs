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

//! Maps wall-clock time to `(epoch, slot)` pairs.
//!
//! All nodes must agree on the wall clock to within one slot duration; NTP
//! skew beyond that silently degrades discovery rather than erroring. This
//! is a documented operational dependency, not something the oracle guards
//! against (see `SPEC_FULL.md` section 9).

use crate::core::types::SlotKey;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Maps wall-clock time onto `(epoch, slot)` using the configured
/// `epoch_seconds` / `slots_per_epoch` geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotOracle {
    epoch_seconds: u64,
    slots_per_epoch: u32,
}

impl SlotOracle {
    /// Build an oracle over the given epoch/slot geometry.
    pub fn new(epoch_seconds: u64, slots_per_epoch: u32) -> Self {
        Self { epoch_seconds, slots_per_epoch }
    }

    /// Real-valued duration of a single slot.
    pub fn slot_duration(&self) -> Duration {
        Duration::from_secs_f64(self.epoch_seconds as f64 / self.slots_per_epoch as f64)
    }

    /// Compute `(epoch, slot, seconds_remaining_in_slot)` for time `t`
    /// (seconds since the Unix epoch).
    pub fn at(&self, t: f64) -> (SlotKey, f64) {
        let epoch = (t / self.epoch_seconds as f64).floor() as u64;
        let slot_duration = self.epoch_seconds as f64 / self.slots_per_epoch as f64;
        let into_epoch = t.rem_euclid(self.epoch_seconds as f64);
        let slot = (into_epoch / slot_duration).floor() as u32;
        let slot = slot.min(self.slots_per_epoch.saturating_sub(1));
        let slot_start = slot as f64 * slot_duration;
        let remaining = (slot_duration - (into_epoch - slot_start)).max(0.0);
        (SlotKey::new(epoch, slot), remaining)
    }

    /// `(epoch, slot, seconds_remaining_in_slot)` for the current wall-clock time.
    pub fn current(&self) -> (SlotKey, f64) {
        self.at(now_seconds())
    }

    /// The next `k` slot keys after `from`, wrapping into subsequent epochs.
    pub fn upcoming_after(&self, from: SlotKey, k: usize) -> Vec<SlotKey> {
        let mut out = Vec::with_capacity(k);
        let mut cur = from;
        for _ in 0..k {
            cur = self.next(cur);
            out.push(cur);
        }
        out
    }

    /// The next `k` slot keys after the current wall-clock slot.
    pub fn upcoming(&self, k: usize) -> Vec<SlotKey> {
        let (current, _) = self.current();
        self.upcoming_after(current, k)
    }

    fn next(&self, key: SlotKey) -> SlotKey {
        if key.slot + 1 < self.slots_per_epoch {
            SlotKey::new(key.epoch, key.slot + 1)
        } else {
            SlotKey::new(key.epoch + 1, 0)
        }
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_is_always_in_range() {
        let oracle = SlotOracle::new(60, 4);
        for t in 0..600 {
            let (key, remaining) = oracle.at(t as f64);
            assert!(key.slot < 4, "slot {} out of range", key.slot);
            assert!(remaining >= 0.0 && remaining <= 15.0);
        }
    }

    #[test]
    fn epoch_boundary_resets_slot_to_zero() {
        let oracle = SlotOracle::new(60, 4);
        let (key, _) = oracle.at(60.0);
        assert_eq!(key, SlotKey::new(1, 0));
    }

    #[test]
    fn known_vector() {
        let oracle = SlotOracle::new(60, 4);
        // 27764400 * 60 = 1665864000s -> epoch 27764400, slot 0, t == epoch boundary exactly.
        let (key, remaining) = oracle.at(27764400.0 * 60.0);
        assert_eq!(key, SlotKey::new(27764400, 0));
        assert!((remaining - 15.0).abs() < 1e-9);
    }

    #[test]
    fn upcoming_wraps_across_epoch() {
        let oracle = SlotOracle::new(60, 4);
        let last_slot_of_epoch = SlotKey::new(5, 3);
        let upcoming = oracle.upcoming_after(last_slot_of_epoch, 3);
        assert_eq!(upcoming, vec![SlotKey::new(6, 0), SlotKey::new(6, 1), SlotKey::new(6, 2)]);
    }

    #[test]
    fn upcoming_within_same_epoch() {
        let oracle = SlotOracle::new(60, 4);
        let mid = SlotKey::new(2, 1);
        let upcoming = oracle.upcoming_after(mid, 2);
        assert_eq!(upcoming, vec![SlotKey::new(2, 2), SlotKey::new(2, 3)]);
    }
}
