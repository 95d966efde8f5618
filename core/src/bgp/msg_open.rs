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

use super::msg::{Message, MessageType};
use super::msg_notification::{BgpError, OpenMessageError};
use super::multiprotocol::AfiSafi;
use super::utils::{is_valid_unicast_ipv4, ParserError};

const BGP_VERSION: u8 = 4;

/// Sentinel AS carried in 2-byte fields when the true AS exceeds 16 bits
/// (RFC 6793).
pub const AS_TRANS: u16 = 23456;

/// Capability codes per the IANA registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityCode {
    MultiProtocol,
    RouteRefresh,
    FourOctetAs,
    Unknown(u8),
}

impl CapabilityCode {
    pub fn as_u8(&self) -> u8 {
        match self {
            CapabilityCode::MultiProtocol => 1,
            CapabilityCode::RouteRefresh => 2,
            CapabilityCode::FourOctetAs => 65,
            CapabilityCode::Unknown(v) => *v,
        }
    }
}

impl From<u8> for CapabilityCode {
    fn from(value: u8) -> Self {
        match value {
            1 => CapabilityCode::MultiProtocol,
            2 => CapabilityCode::RouteRefresh,
            65 => CapabilityCode::FourOctetAs,
            v => CapabilityCode::Unknown(v),
        }
    }
}

/// A single capability value from an OPEN optional parameter (RFC 5492).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    MultiProtocol(AfiSafi),
    RouteRefresh,
    FourOctetAs(u32),
    Unknown { code: u8, value: Vec<u8> },
}

impl Capability {
    pub fn code(&self) -> CapabilityCode {
        match self {
            Capability::MultiProtocol(_) => CapabilityCode::MultiProtocol,
            Capability::RouteRefresh => CapabilityCode::RouteRefresh,
            Capability::FourOctetAs(_) => CapabilityCode::FourOctetAs,
            Capability::Unknown { code, .. } => CapabilityCode::Unknown(*code),
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        match self {
            Capability::MultiProtocol(family) => family.to_capability_bytes().to_vec(),
            Capability::RouteRefresh => Vec::new(),
            Capability::FourOctetAs(asn) => asn.to_be_bytes().to_vec(),
            Capability::Unknown { value, .. } => value.clone(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let value = self.value_bytes();
        let mut bytes = Vec::with_capacity(2 + value.len());
        bytes.push(self.code().as_u8());
        bytes.push(value.len() as u8);
        bytes.extend_from_slice(&value);
        bytes
    }

    fn from_bytes(code: u8, value: &[u8]) -> Result<Self, ParserError> {
        match CapabilityCode::from(code) {
            CapabilityCode::MultiProtocol => Ok(Capability::MultiProtocol(
                AfiSafi::from_capability_bytes(value)?,
            )),
            CapabilityCode::RouteRefresh => Ok(Capability::RouteRefresh),
            CapabilityCode::FourOctetAs => {
                if value.len() != 4 {
                    return Err(open_error(OpenMessageError::Unknown(0)));
                }
                Ok(Capability::FourOctetAs(u32::from_be_bytes([
                    value[0], value[1], value[2], value[3],
                ])))
            }
            CapabilityCode::Unknown(code) => Ok(Capability::Unknown {
                code,
                value: value.to_vec(),
            }),
        }
    }
}

// https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-11
const OPT_PARAM_TYPE_CAPABILITY: u8 = 2; // RFC 5492

/// OPEN optional parameter. Only the capability container is understood;
/// anything else is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalParam {
    Capabilities(Vec<Capability>),
    Unknown { param_type: u8, value: Vec<u8> },
}

impl OptionalParam {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            OptionalParam::Capabilities(caps) => {
                let value: Vec<u8> = caps.iter().flat_map(|c| c.to_bytes()).collect();
                let mut bytes = Vec::with_capacity(2 + value.len());
                bytes.push(OPT_PARAM_TYPE_CAPABILITY);
                bytes.push(value.len() as u8);
                bytes.extend_from_slice(&value);
                bytes
            }
            OptionalParam::Unknown { param_type, value } => {
                let mut bytes = Vec::with_capacity(2 + value.len());
                bytes.push(*param_type);
                bytes.push(value.len() as u8);
                bytes.extend_from_slice(value);
                bytes
            }
        }
    }
}

fn open_error(sub: OpenMessageError) -> ParserError {
    ParserError::BgpError {
        error: BgpError::OpenMessageError(sub),
        data: Vec::new(),
    }
}

fn read_optional_parameters(bytes: &[u8]) -> Result<Vec<OptionalParam>, ParserError> {
    let mut cursor = 0;
    let mut params = Vec::new();

    while cursor < bytes.len() {
        if cursor + 2 > bytes.len() {
            return Err(open_error(OpenMessageError::Unknown(0)));
        }
        let param_type = bytes[cursor];
        let param_len = bytes[cursor + 1] as usize;
        cursor += 2;
        if cursor + param_len > bytes.len() {
            return Err(open_error(OpenMessageError::Unknown(0)));
        }
        let value = &bytes[cursor..cursor + param_len];
        cursor += param_len;

        if param_type == OPT_PARAM_TYPE_CAPABILITY {
            let mut caps = Vec::new();
            let mut inner = 0;
            while inner < value.len() {
                if inner + 2 > value.len() {
                    return Err(open_error(OpenMessageError::Unknown(0)));
                }
                let code = value[inner];
                let cap_len = value[inner + 1] as usize;
                inner += 2;
                if inner + cap_len > value.len() {
                    return Err(open_error(OpenMessageError::Unknown(0)));
                }
                caps.push(Capability::from_bytes(code, &value[inner..inner + cap_len])?);
                inner += cap_len;
            }
            params.push(OptionalParam::Capabilities(caps));
        } else {
            params.push(OptionalParam::Unknown {
                param_type,
                value: value.to_vec(),
            });
        }
    }

    Ok(params)
}

/// Validate BGP version (RFC 4271 Section 6.2)
fn validate_version(version: u8) -> Result<(), ParserError> {
    if version != BGP_VERSION {
        // Data is a 2-octet integer with the largest locally-supported version.
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::UnsupportedVersionNumber),
            data: (BGP_VERSION as u16).to_be_bytes().to_vec(),
        });
    }
    Ok(())
}

/// Validate Hold Time (RFC 4271 Section 6.2): one and two seconds are rejected.
fn validate_hold_time(hold_time: u16) -> Result<(), ParserError> {
    if hold_time == 1 || hold_time == 2 {
        return Err(open_error(OpenMessageError::UnacceptableHoldTime));
    }
    Ok(())
}

/// Validate BGP Identifier (RFC 4271 Section 6.2): must be a valid unicast
/// host address.
fn validate_bgp_identifier(bgp_identifier: u32) -> Result<(), ParserError> {
    if !is_valid_unicast_ipv4(bgp_identifier) {
        return Err(open_error(OpenMessageError::BadBgpIdentifier));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMessage {
    pub version: u8,
    /// 2-octet header field; AS_TRANS when the true AS needs 4 octets.
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_identifier: u32,
    pub optional_params: Vec<OptionalParam>,
}

impl OpenMessage {
    pub fn new(
        asn: u16,
        hold_time: u16,
        bgp_identifier: u32,
        optional_params: Vec<OptionalParam>,
    ) -> Self {
        OpenMessage {
            version: BGP_VERSION,
            asn,
            hold_time,
            bgp_identifier,
            optional_params,
        }
    }

    /// All capability values across all capability parameters, in wire order.
    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.optional_params.iter().flat_map(|p| match p {
            OptionalParam::Capabilities(caps) => caps.as_slice(),
            OptionalParam::Unknown { .. } => &[],
        })
    }

    /// The peer's real AS: the FourOctetASNumber capability value when
    /// present, the 2-octet header field otherwise (RFC 6793).
    pub fn peer_as(&self) -> u32 {
        for cap in self.capabilities() {
            if let Capability::FourOctetAs(asn) = cap {
                return *asn;
            }
        }
        self.asn as u32
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ParserError> {
        if bytes.len() < 10 {
            return Err(open_error(OpenMessageError::Unknown(0)));
        }

        let version = bytes[0];
        let asn = u16::from_be_bytes([bytes[1], bytes[2]]);
        let hold_time = u16::from_be_bytes([bytes[3], bytes[4]]);
        let bgp_identifier = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let optional_params_len = bytes[9] as usize;

        if optional_params_len != bytes.len() - 10 {
            return Err(open_error(OpenMessageError::Unknown(0)));
        }

        validate_version(version)?;
        validate_hold_time(hold_time)?;
        validate_bgp_identifier(bgp_identifier)?;

        let optional_params = read_optional_parameters(&bytes[10..])?;

        Ok(OpenMessage {
            version,
            asn,
            hold_time,
            bgp_identifier,
            optional_params,
        })
    }
}

impl Message for OpenMessage {
    fn kind(&self) -> MessageType {
        MessageType::Open
    }

    fn to_bytes(&self) -> Vec<u8> {
        let params: Vec<u8> = self
            .optional_params
            .iter()
            .flat_map(|p| p.to_bytes())
            .collect();

        let mut bytes = Vec::with_capacity(10 + params.len());
        bytes.push(self.version);
        bytes.extend_from_slice(&self.asn.to_be_bytes());
        bytes.extend_from_slice(&self.hold_time.to_be_bytes());
        bytes.extend_from_slice(&self.bgp_identifier.to_be_bytes());
        bytes.push(params.len() as u8);
        bytes.extend_from_slice(&params);
        bytes
    }
}

/// Validate a received OPEN against the configured peer AS (RFC 4271
/// Section 6.2 / RFC 6793). Field-level validation already happened during
/// parsing; this is the semantic check the FSM runs in OpenSent.
pub fn validate_open(open: &OpenMessage, configured_peer_as: u32) -> Result<(), ParserError> {
    if open.peer_as() != configured_peer_as {
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::BadPeerAs),
            data: open.peer_as().to_be_bytes().to_vec(),
        });
    }
    Ok(())
}
