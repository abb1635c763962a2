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

//! Ed25519 signing/verification primitives, and the pluggable descriptor
//! [`verifier::Verifier`] consumed by the peer learner.

/// File-backed Ed25519 keystore used by the identity keygen tool and,
/// optionally, by a node that signs its own descriptor.
pub mod keystore;
/// Additive, pluggable descriptor signature verification.
pub mod verifier;
