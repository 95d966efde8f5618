// Copyright 2025 bgpcore Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-peer BGP-4 session core.
//!
//! The crate drives a single peering relationship from idle through
//! establishment to steady-state route exchange: the peer FSM and its
//! timers, OPEN capability negotiation, NOTIFICATION teardown, the
//! AS_PATH/AS4_PATH reconciliation needed for 2-byte-AS peers, the `Path`
//! value model, and the outbound UPDATE batcher.

pub mod bgp;
pub mod config;
pub mod log;
pub mod net;
pub mod peer;
pub mod policy;
pub mod table;
