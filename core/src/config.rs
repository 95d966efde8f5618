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

//! Configuration snapshot types. The supplier (file loader, watcher) hands
//! the core a complete [`ConfigSet`]; the core never reloads on its own.

use crate::bgp::multiprotocol::AfiSafi;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};

/// BGP confederation membership (RFC 5065).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Confederation {
    pub identifier: u32,
    #[serde(default)]
    pub member_as_list: Vec<u32>,
}

/// Global (speaker-wide) configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Global {
    #[serde(rename = "as")]
    pub asn: u32,
    pub router_id: Ipv4Addr,
    #[serde(default)]
    pub confederation: Option<Confederation>,
}

impl Global {
    /// True when `peer_as` belongs to the local confederation.
    pub fn is_confed_member(&self, peer_as: u32) -> bool {
        match &self.confederation {
            Some(confed) => confed.member_as_list.contains(&peer_as),
            None => false,
        }
    }
}

fn default_hold_time() -> u64 {
    90
}

fn default_keepalive_interval() -> u64 {
    30
}

fn default_connect_retry() -> u64 {
    120
}

fn default_idle_hold_time() -> u64 {
    5
}

fn default_bgp_port() -> u16 {
    179
}

fn default_afi_safis() -> Vec<AfiSafi> {
    vec![AfiSafi::IPV4_UNICAST]
}

/// Per-neighbor configuration, read-mostly from the FSM's point of view.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Neighbor {
    pub neighbor_address: IpAddr,
    pub peer_as: u32,
    /// Remote TCP port; anything but 179 only makes sense in tests.
    #[serde(default = "default_bgp_port")]
    pub port: u16,
    #[serde(default = "default_hold_time")]
    pub hold_time: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
    #[serde(default = "default_connect_retry")]
    pub connect_retry: u64,
    #[serde(default = "default_idle_hold_time")]
    pub idle_hold_time: u64,
    #[serde(default)]
    pub passive_mode: bool,
    /// Local address to bind outbound connections to, and the next-hop
    /// rewrite target for EBGP egress.
    #[serde(default)]
    pub local_address: Option<IpAddr>,
    #[serde(default)]
    pub ebgp_multihop: bool,
    #[serde(default)]
    pub ebgp_multihop_ttl: u8,
    #[serde(default)]
    pub route_reflector_client: bool,
    #[serde(default)]
    pub route_reflector_cluster_id: Option<Ipv4Addr>,
    #[serde(default)]
    pub route_server_client: bool,
    #[serde(default)]
    pub admin_down: bool,
    #[serde(default = "default_afi_safis")]
    pub afi_safis: Vec<AfiSafi>,
}

impl Neighbor {
    pub fn new(neighbor_address: IpAddr, peer_as: u32) -> Self {
        Neighbor {
            neighbor_address,
            peer_as,
            port: default_bgp_port(),
            hold_time: default_hold_time(),
            keepalive_interval: default_keepalive_interval(),
            connect_retry: default_connect_retry(),
            idle_hold_time: default_idle_hold_time(),
            passive_mode: false,
            local_address: None,
            ebgp_multihop: false,
            ebgp_multihop_ttl: 0,
            route_reflector_client: false,
            route_reflector_cluster_id: None,
            route_server_client: false,
            admin_down: false,
            afi_safis: default_afi_safis(),
        }
    }

    /// True when the session crosses an AS boundary.
    pub fn is_ebgp(&self, global: &Global) -> bool {
        global.asn != self.peer_as
    }
}

/// A complete configuration snapshot as delivered by the supplier.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfigSet {
    pub global: Global,
    #[serde(default)]
    pub neighbors: Vec<Neighbor>,
}

impl ConfigSet {
    /// Load a configuration snapshot from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}
