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

use super::msg_notification::{BgpError, UpdateMessageError};
use super::multiprotocol::{Afi, AfiSafi};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Debug, PartialEq, Clone)]
pub enum ParserError {
    IoError(String),
    BgpError { error: BgpError, data: Vec<u8> },
}

impl ParserError {
    pub(super) fn update_error(sub: UpdateMessageError) -> Self {
        ParserError::BgpError {
            error: BgpError::UpdateMessageError(sub),
            data: Vec::new(),
        }
    }
}

impl Display for ParserError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ParserError::IoError(s) => write!(f, "IO error: {}", s),
            ParserError::BgpError { error, .. } => write!(f, "BGP error: {:?}", error),
        }
    }
}

impl Error for ParserError {}

/// An address-family-tagged prefix (NLRI).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum IpNetwork {
    V4(Ipv4Net),
    V6(Ipv6Net),
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Ipv4Net {
    pub address: Ipv4Addr,
    pub prefix_length: u8,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Ipv6Net {
    pub address: Ipv6Addr,
    pub prefix_length: u8,
}

impl IpNetwork {
    pub fn v4(address: Ipv4Addr, prefix_length: u8) -> Self {
        IpNetwork::V4(Ipv4Net {
            address,
            prefix_length,
        })
    }

    pub fn v6(address: Ipv6Addr, prefix_length: u8) -> Self {
        IpNetwork::V6(Ipv6Net {
            address,
            prefix_length,
        })
    }

    pub fn family(&self) -> AfiSafi {
        match self {
            IpNetwork::V4(_) => AfiSafi::IPV4_UNICAST,
            IpNetwork::V6(_) => AfiSafi::IPV6_UNICAST,
        }
    }

    /// Wire form: one length octet followed by the minimal prefix octets.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            IpNetwork::V4(net) => {
                let byte_len = (net.prefix_length as usize + 7) / 8;
                let mut bytes = Vec::with_capacity(1 + byte_len);
                bytes.push(net.prefix_length);
                bytes.extend_from_slice(&net.address.octets()[..byte_len]);
                bytes
            }
            IpNetwork::V6(net) => {
                let byte_len = (net.prefix_length as usize + 7) / 8;
                let mut bytes = Vec::with_capacity(1 + byte_len);
                bytes.push(net.prefix_length);
                bytes.extend_from_slice(&net.address.octets()[..byte_len]);
                bytes
            }
        }
    }

    pub fn wire_len(&self) -> usize {
        let prefix_length = match self {
            IpNetwork::V4(net) => net.prefix_length,
            IpNetwork::V6(net) => net.prefix_length,
        };
        1 + (prefix_length as usize + 7) / 8
    }
}

impl Display for IpNetwork {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            IpNetwork::V4(net) => write!(f, "{}/{}", net.address, net.prefix_length),
            IpNetwork::V6(net) => write!(f, "{}/{}", net.address, net.prefix_length),
        }
    }
}

/// Parse a run of prefixes of the given AFI until `bytes` is exhausted.
pub fn parse_nlri_list(bytes: &[u8], afi: Afi) -> Result<Vec<IpNetwork>, ParserError> {
    let mut cursor = 0;
    let mut nlri_list = Vec::new();

    while cursor < bytes.len() {
        let prefix_length = bytes[cursor];
        cursor += 1;

        let max_bits = match afi {
            Afi::Ipv4 => 32,
            Afi::Ipv6 => 128,
        };
        if prefix_length > max_bits {
            return Err(ParserError::update_error(
                UpdateMessageError::InvalidNetworkField,
            ));
        }

        let byte_len = (prefix_length as usize + 7) / 8;
        if cursor + byte_len > bytes.len() {
            return Err(ParserError::update_error(
                UpdateMessageError::InvalidNetworkField,
            ));
        }

        let network = match afi {
            Afi::Ipv4 => {
                let mut buf = [0u8; 4];
                buf[..byte_len].copy_from_slice(&bytes[cursor..cursor + byte_len]);
                IpNetwork::v4(Ipv4Addr::from(buf), prefix_length)
            }
            Afi::Ipv6 => {
                let mut buf = [0u8; 16];
                buf[..byte_len].copy_from_slice(&bytes[cursor..cursor + byte_len]);
                IpNetwork::v6(Ipv6Addr::from(buf), prefix_length)
            }
        };
        nlri_list.push(network);
        cursor += byte_len;
    }

    Ok(nlri_list)
}

pub fn read_u32(bytes: &[u8]) -> Result<u32, ParserError> {
    match bytes.len() {
        4 => Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => Err(ParserError::update_error(
            UpdateMessageError::AttributeLengthError,
        )),
    }
}

/// Validates if an IPv4 address is a valid unicast host address.
/// Returns false for 0.0.0.0, 255.255.255.255, or multicast (224.0.0.0/4).
pub fn is_valid_unicast_ipv4(ip: u32) -> bool {
    !(ip == 0 || ip == 0xFFFFFFFF || (ip & 0xF0000000) == 0xE0000000)
}
