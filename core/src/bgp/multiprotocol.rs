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
use super::utils::ParserError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Address Family Identifier per IANA registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Afi {
    Ipv4 = 1,
    Ipv6 = 2,
}

impl fmt::Display for Afi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Afi::Ipv4 => write!(f, "ipv4"),
            Afi::Ipv6 => write!(f, "ipv6"),
        }
    }
}

impl TryFrom<u16> for Afi {
    type Error = ParserError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Afi::Ipv4),
            2 => Ok(Afi::Ipv6),
            _ => Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::OptionalAttributeError),
                data: Vec::new(),
            }),
        }
    }
}

/// Subsequent Address Family Identifier per IANA registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Safi {
    Unicast = 1,
    Multicast = 2,
}

impl fmt::Display for Safi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Safi::Unicast => write!(f, "unicast"),
            Safi::Multicast => write!(f, "multicast"),
        }
    }
}

impl TryFrom<u8> for Safi {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Safi::Unicast),
            2 => Ok(Safi::Multicast),
            _ => Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::OptionalAttributeError),
                data: Vec::new(),
            }),
        }
    }
}

/// A route family: the AFI/SAFI pair negotiated per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AfiSafi {
    pub afi: Afi,
    pub safi: Safi,
}

impl AfiSafi {
    pub const IPV4_UNICAST: AfiSafi = AfiSafi {
        afi: Afi::Ipv4,
        safi: Safi::Unicast,
    };
    pub const IPV6_UNICAST: AfiSafi = AfiSafi {
        afi: Afi::Ipv6,
        safi: Safi::Unicast,
    };

    pub fn new(afi: Afi, safi: Safi) -> Self {
        AfiSafi { afi, safi }
    }

    /// Parse AFI/SAFI from a MultiProtocol capability value
    /// (RFC 4760: AFI_HIGH, AFI_LOW, RESERVED, SAFI).
    pub fn from_capability_bytes(val: &[u8]) -> Result<Self, ParserError> {
        if val.len() < 4 {
            return Err(ParserError::BgpError {
                error: BgpError::UpdateMessageError(UpdateMessageError::OptionalAttributeError),
                data: Vec::new(),
            });
        }
        let afi = Afi::try_from(u16::from_be_bytes([val[0], val[1]]))?;
        let safi = Safi::try_from(val[3])?;
        Ok(AfiSafi::new(afi, safi))
    }

    pub fn to_capability_bytes(&self) -> [u8; 4] {
        let afi = (self.afi as u16).to_be_bytes();
        [afi[0], afi[1], 0, self.safi as u8]
    }
}

impl fmt::Display for AfiSafi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.afi, self.safi)
    }
}

impl FromStr for AfiSafi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ipv4-unicast" => Ok(AfiSafi::IPV4_UNICAST),
            "ipv6-unicast" => Ok(AfiSafi::IPV6_UNICAST),
            "ipv4-multicast" => Ok(AfiSafi::new(Afi::Ipv4, Safi::Multicast)),
            "ipv6-multicast" => Ok(AfiSafi::new(Afi::Ipv6, Safi::Multicast)),
            _ => Err(format!("unknown route family: {}", s)),
        }
    }
}

impl Serialize for AfiSafi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AfiSafi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
