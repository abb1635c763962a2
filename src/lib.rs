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

//! IPv6 epoch/slot rendezvous discovery.
//!
//! This crate provides:
//! - HMAC-derived, time-sliced IPv6 link-local rendezvous endpoints
//! - Host address plumbing for binding/unbinding those endpoints
//! - A UDP wire codec for signed node descriptors
//! - A single-threaded slot engine that drives discovery end to end
//! - Atomic on-disk peer learning with an optional pluggable signature verifier
//! - Monitoring via Prometheus metrics and structured logging

/// Core data model: descriptors, peer records, config, and the signing keystore.
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// Rendezvous discovery stack (clock, deriver, binder, codec, store, learner, engine, verifier).
pub mod rendezvous;
