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
use super::msg_notification::UpdateMessageError;
use super::multiprotocol::{Afi, AfiSafi, Safi};
use super::utils::{parse_nlri_list, read_u32, IpNetwork, ParserError};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub mod attr_flags {
    pub const OPTIONAL: u8 = 1 << 7;
    pub const TRANSITIVE: u8 = 1 << 6;
    pub const PARTIAL: u8 = 1 << 5;
    pub const EXTENDED_LENGTH: u8 = 1 << 4;
}

pub mod attr_type_code {
    pub const ORIGIN: u8 = 1;
    pub const AS_PATH: u8 = 2;
    pub const NEXT_HOP: u8 = 3;
    pub const MULTI_EXIT_DISC: u8 = 4;
    pub const LOCAL_PREF: u8 = 5;
    pub const ATOMIC_AGGREGATE: u8 = 6;
    pub const AGGREGATOR: u8 = 7;
    pub const COMMUNITIES: u8 = 8;
    pub const ORIGINATOR_ID: u8 = 9;
    pub const CLUSTER_LIST: u8 = 10;
    pub const MP_REACH_NLRI: u8 = 14;
    pub const MP_UNREACH_NLRI: u8 = 15;
    pub const AS4_PATH: u8 = 17;
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl TryFrom<u8> for Origin {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Origin::Igp),
            1 => Ok(Origin::Egp),
            2 => Ok(Origin::Incomplete),
            _ => Err(ParserError::update_error(
                UpdateMessageError::InvalidOriginAttribute,
            )),
        }
    }
}

/// AS_PATH segment types (RFC 4271, RFC 5065).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsSegmentType {
    AsSet = 1,
    AsSequence = 2,
    AsConfedSequence = 3,
    AsConfedSet = 4,
}

impl AsSegmentType {
    pub fn is_confed(&self) -> bool {
        matches!(
            self,
            AsSegmentType::AsConfedSequence | AsSegmentType::AsConfedSet
        )
    }
}

impl TryFrom<u8> for AsSegmentType {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AsSegmentType::AsSet),
            2 => Ok(AsSegmentType::AsSequence),
            3 => Ok(AsSegmentType::AsConfedSequence),
            4 => Ok(AsSegmentType::AsConfedSet),
            _ => Err(ParserError::update_error(
                UpdateMessageError::MalformedASPath,
            )),
        }
    }
}

/// One AS_PATH segment. ASNs are held 4-byte internally regardless of the
/// wire encoding.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct AsSegment {
    pub segment_type: AsSegmentType,
    pub asn_list: Vec<u32>,
}

impl AsSegment {
    pub fn sequence(asn_list: Vec<u32>) -> Self {
        AsSegment {
            segment_type: AsSegmentType::AsSequence,
            asn_list,
        }
    }

    /// Path-length contribution (RFC 4271 9.1.2.2): a SEQUENCE counts each
    /// ASN, a SET counts one, confederation segments count zero.
    pub fn as_len(&self) -> usize {
        match self.segment_type {
            AsSegmentType::AsSequence => self.asn_list.len(),
            AsSegmentType::AsSet => 1,
            AsSegmentType::AsConfedSequence | AsSegmentType::AsConfedSet => 0,
        }
    }

    /// Confederation-segment length (RFC 5065): CONFED_SEQUENCE counts each
    /// ASN, CONFED_SET counts one.
    pub fn confed_len(&self) -> usize {
        match self.segment_type {
            AsSegmentType::AsConfedSequence => self.asn_list.len(),
            AsSegmentType::AsConfedSet => 1,
            _ => 0,
        }
    }
}

/// AS_PATH attribute value. `four_byte` records the wire width negotiated
/// for the session this attribute was built for (RFC 6793).
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct AsPath {
    pub segments: Vec<AsSegment>,
    pub four_byte: bool,
}

impl AsPath {
    pub fn new(segments: Vec<AsSegment>, four_byte: bool) -> Self {
        AsPath {
            segments,
            four_byte,
        }
    }

    /// The leftmost AS: the one most recently prepended.
    pub fn leftmost_as(&self) -> Option<u32> {
        self.segments
            .first()
            .and_then(|seg| seg.asn_list.first().copied())
    }

    pub fn has_confed_segments(&self) -> bool {
        self.segments.iter().any(|s| s.segment_type.is_confed())
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Aggregator {
    pub asn: u32,
    pub address: Ipv4Addr,
    /// Wire width of the AS field, as for AS_PATH.
    pub four_byte: bool,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum PathAttrValue {
    Origin(Origin),
    AsPath(AsPath),
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    Communities(Vec<u32>),
    OriginatorId(Ipv4Addr),
    ClusterList(Vec<Ipv4Addr>),
    MpReachNlri {
        family: AfiSafi,
        next_hop: IpAddr,
        nlris: Vec<IpNetwork>,
    },
    MpUnreachNlri {
        family: AfiSafi,
        nlris: Vec<IpNetwork>,
    },
    As4Path(Vec<AsSegment>),
    Unknown {
        type_code: u8,
        data: Vec<u8>,
    },
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct PathAttribute {
    pub flags: u8,
    pub value: PathAttrValue,
}

fn serialize_segments(segments: &[AsSegment], four_byte: bool, out: &mut Vec<u8>) {
    for segment in segments {
        out.push(segment.segment_type as u8);
        out.push(segment.asn_list.len() as u8);
        for asn in &segment.asn_list {
            if four_byte {
                out.extend_from_slice(&asn.to_be_bytes());
            } else {
                out.extend_from_slice(&(*asn as u16).to_be_bytes());
            }
        }
    }
}

fn parse_segments(bytes: &[u8], four_byte: bool) -> Result<Vec<AsSegment>, ParserError> {
    let asn_width = if four_byte { 4 } else { 2 };
    let mut segments = Vec::new();
    let mut cursor = 0;
    while cursor < bytes.len() {
        if cursor + 2 > bytes.len() {
            return Err(ParserError::update_error(
                UpdateMessageError::MalformedASPath,
            ));
        }
        let segment_type = AsSegmentType::try_from(bytes[cursor])?;
        let count = bytes[cursor + 1] as usize;
        cursor += 2;
        if cursor + count * asn_width > bytes.len() {
            return Err(ParserError::update_error(
                UpdateMessageError::MalformedASPath,
            ));
        }
        let mut asn_list = Vec::with_capacity(count);
        for i in 0..count {
            let at = cursor + i * asn_width;
            let asn = if four_byte {
                u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
            } else {
                u16::from_be_bytes([bytes[at], bytes[at + 1]]) as u32
            };
            asn_list.push(asn);
        }
        cursor += count * asn_width;
        segments.push(AsSegment {
            segment_type,
            asn_list,
        });
    }
    Ok(segments)
}

impl PathAttribute {
    /// Build an attribute with the RFC-mandated flag bits for its type.
    pub fn new(value: PathAttrValue) -> Self {
        use attr_flags::{OPTIONAL, TRANSITIVE};
        let flags = match &value {
            PathAttrValue::Origin(_)
            | PathAttrValue::AsPath(_)
            | PathAttrValue::NextHop(_)
            | PathAttrValue::LocalPref(_)
            | PathAttrValue::AtomicAggregate => TRANSITIVE,
            PathAttrValue::MultiExitDisc(_)
            | PathAttrValue::OriginatorId(_)
            | PathAttrValue::ClusterList(_)
            | PathAttrValue::MpReachNlri { .. }
            | PathAttrValue::MpUnreachNlri { .. } => OPTIONAL,
            PathAttrValue::Aggregator(_)
            | PathAttrValue::Communities(_)
            | PathAttrValue::As4Path(_) => OPTIONAL | TRANSITIVE,
            PathAttrValue::Unknown { .. } => OPTIONAL | TRANSITIVE,
        };
        PathAttribute { flags, value }
    }

    pub fn type_code(&self) -> u8 {
        use attr_type_code::*;
        match &self.value {
            PathAttrValue::Origin(_) => ORIGIN,
            PathAttrValue::AsPath(_) => AS_PATH,
            PathAttrValue::NextHop(_) => NEXT_HOP,
            PathAttrValue::MultiExitDisc(_) => MULTI_EXIT_DISC,
            PathAttrValue::LocalPref(_) => LOCAL_PREF,
            PathAttrValue::AtomicAggregate => ATOMIC_AGGREGATE,
            PathAttrValue::Aggregator(_) => AGGREGATOR,
            PathAttrValue::Communities(_) => COMMUNITIES,
            PathAttrValue::OriginatorId(_) => ORIGINATOR_ID,
            PathAttrValue::ClusterList(_) => CLUSTER_LIST,
            PathAttrValue::MpReachNlri { .. } => MP_REACH_NLRI,
            PathAttrValue::MpUnreachNlri { .. } => MP_UNREACH_NLRI,
            PathAttrValue::As4Path(_) => AS4_PATH,
            PathAttrValue::Unknown { type_code, .. } => *type_code,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match &self.value {
            PathAttrValue::Origin(origin) => out.push(*origin as u8),
            PathAttrValue::AsPath(as_path) => {
                serialize_segments(&as_path.segments, as_path.four_byte, &mut out)
            }
            PathAttrValue::NextHop(addr) => out.extend_from_slice(&addr.octets()),
            PathAttrValue::MultiExitDisc(med) => out.extend_from_slice(&med.to_be_bytes()),
            PathAttrValue::LocalPref(pref) => out.extend_from_slice(&pref.to_be_bytes()),
            PathAttrValue::AtomicAggregate => {}
            PathAttrValue::Aggregator(agg) => {
                if agg.four_byte {
                    out.extend_from_slice(&agg.asn.to_be_bytes());
                } else {
                    out.extend_from_slice(&(agg.asn as u16).to_be_bytes());
                }
                out.extend_from_slice(&agg.address.octets());
            }
            PathAttrValue::Communities(communities) => {
                for community in communities {
                    out.extend_from_slice(&community.to_be_bytes());
                }
            }
            PathAttrValue::OriginatorId(id) => out.extend_from_slice(&id.octets()),
            PathAttrValue::ClusterList(ids) => {
                for id in ids {
                    out.extend_from_slice(&id.octets());
                }
            }
            PathAttrValue::MpReachNlri {
                family,
                next_hop,
                nlris,
            } => {
                out.extend_from_slice(&(family.afi as u16).to_be_bytes());
                out.push(family.safi as u8);
                match next_hop {
                    IpAddr::V4(addr) => {
                        out.push(4);
                        out.extend_from_slice(&addr.octets());
                    }
                    IpAddr::V6(addr) => {
                        out.push(16);
                        out.extend_from_slice(&addr.octets());
                    }
                }
                out.push(0); // reserved
                for nlri in nlris {
                    out.extend_from_slice(&nlri.to_bytes());
                }
            }
            PathAttrValue::MpUnreachNlri { family, nlris } => {
                out.extend_from_slice(&(family.afi as u16).to_be_bytes());
                out.push(family.safi as u8);
                for nlri in nlris {
                    out.extend_from_slice(&nlri.to_bytes());
                }
            }
            PathAttrValue::As4Path(segments) => serialize_segments(segments, true, &mut out),
            PathAttrValue::Unknown { data, .. } => out.extend_from_slice(data),
        }
        out
    }

    /// Full attribute TLV. The extended-length bit follows the actual value
    /// size so serialization is deterministic.
    pub fn to_bytes(&self) -> Vec<u8> {
        let value = self.value_bytes();
        let extended = value.len() > 255;
        let mut flags = self.flags & !attr_flags::EXTENDED_LENGTH;
        if extended {
            flags |= attr_flags::EXTENDED_LENGTH;
        }

        let mut bytes = Vec::with_capacity(4 + value.len());
        bytes.push(flags);
        bytes.push(self.type_code());
        if extended {
            bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        } else {
            bytes.push(value.len() as u8);
        }
        bytes.extend_from_slice(&value);
        bytes
    }

    pub fn wire_len(&self) -> usize {
        self.to_bytes().len()
    }

    fn from_value_bytes(
        flags: u8,
        type_code: u8,
        value: &[u8],
        four_byte_asn: bool,
    ) -> Result<Self, ParserError> {
        use attr_type_code::*;
        let length_error = || ParserError::update_error(UpdateMessageError::AttributeLengthError);

        let parsed = match type_code {
            ORIGIN => {
                if value.len() != 1 {
                    return Err(length_error());
                }
                PathAttrValue::Origin(Origin::try_from(value[0])?)
            }
            AS_PATH => PathAttrValue::AsPath(AsPath::new(
                parse_segments(value, four_byte_asn)?,
                four_byte_asn,
            )),
            NEXT_HOP => {
                if value.len() != 4 {
                    return Err(ParserError::update_error(
                        UpdateMessageError::InvalidNextHopAttribute,
                    ));
                }
                PathAttrValue::NextHop(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            MULTI_EXIT_DISC => PathAttrValue::MultiExitDisc(read_u32(value)?),
            LOCAL_PREF => PathAttrValue::LocalPref(read_u32(value)?),
            ATOMIC_AGGREGATE => {
                if !value.is_empty() {
                    return Err(length_error());
                }
                PathAttrValue::AtomicAggregate
            }
            AGGREGATOR => {
                let asn_width = if four_byte_asn { 4 } else { 2 };
                if value.len() != asn_width + 4 {
                    return Err(length_error());
                }
                let asn = if four_byte_asn {
                    u32::from_be_bytes([value[0], value[1], value[2], value[3]])
                } else {
                    u16::from_be_bytes([value[0], value[1]]) as u32
                };
                let a = &value[asn_width..];
                PathAttrValue::Aggregator(Aggregator {
                    asn,
                    address: Ipv4Addr::new(a[0], a[1], a[2], a[3]),
                    four_byte: four_byte_asn,
                })
            }
            COMMUNITIES => {
                if value.len() % 4 != 0 {
                    return Err(length_error());
                }
                PathAttrValue::Communities(
                    value
                        .chunks_exact(4)
                        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                        .collect(),
                )
            }
            ORIGINATOR_ID => {
                if value.len() != 4 {
                    return Err(length_error());
                }
                PathAttrValue::OriginatorId(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            CLUSTER_LIST => {
                if value.len() % 4 != 0 {
                    return Err(length_error());
                }
                PathAttrValue::ClusterList(
                    value
                        .chunks(4)
                        .map(|c| Ipv4Addr::new(c[0], c[1], c[2], c[3]))
                        .collect(),
                )
            }
            MP_REACH_NLRI => {
                if value.len() < 5 {
                    return Err(length_error());
                }
                let afi = Afi::try_from(u16::from_be_bytes([value[0], value[1]]))?;
                let safi = Safi::try_from(value[2])?;
                let nh_len = value[3] as usize;
                if value.len() < 5 + nh_len {
                    return Err(length_error());
                }
                let next_hop = match nh_len {
                    4 => {
                        let mut buf = [0u8; 4];
                        buf.copy_from_slice(&value[4..8]);
                        IpAddr::V4(Ipv4Addr::from(buf))
                    }
                    16 | 32 => {
                        // A 32-octet next hop carries global + link-local;
                        // keep the global one.
                        let mut buf = [0u8; 16];
                        buf.copy_from_slice(&value[4..20]);
                        IpAddr::V6(Ipv6Addr::from(buf))
                    }
                    _ => {
                        return Err(ParserError::update_error(
                            UpdateMessageError::OptionalAttributeError,
                        ))
                    }
                };
                let nlris = parse_nlri_list(&value[5 + nh_len..], afi)?;
                PathAttrValue::MpReachNlri {
                    family: AfiSafi::new(afi, safi),
                    next_hop,
                    nlris,
                }
            }
            MP_UNREACH_NLRI => {
                if value.len() < 3 {
                    return Err(length_error());
                }
                let afi = Afi::try_from(u16::from_be_bytes([value[0], value[1]]))?;
                let safi = Safi::try_from(value[2])?;
                let nlris = parse_nlri_list(&value[3..], afi)?;
                PathAttrValue::MpUnreachNlri {
                    family: AfiSafi::new(afi, safi),
                    nlris,
                }
            }
            AS4_PATH => PathAttrValue::As4Path(parse_segments(value, true)?),
            _ => PathAttrValue::Unknown {
                type_code,
                data: value.to_vec(),
            },
        };

        Ok(PathAttribute {
            flags,
            value: parsed,
        })
    }

    /// Mandated high flag bits per attribute type (RFC 4271 Section 5).
    fn expected_flags(type_code: u8) -> Option<u8> {
        use attr_flags::{OPTIONAL, TRANSITIVE};
        use attr_type_code::*;
        match type_code {
            ORIGIN | AS_PATH | NEXT_HOP | LOCAL_PREF | ATOMIC_AGGREGATE => Some(TRANSITIVE),
            MULTI_EXIT_DISC | ORIGINATOR_ID | CLUSTER_LIST | MP_REACH_NLRI | MP_UNREACH_NLRI => {
                Some(OPTIONAL)
            }
            AGGREGATOR | COMMUNITIES | AS4_PATH => Some(OPTIONAL | TRANSITIVE),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UpdateMessage {
    pub withdrawn_routes: Vec<IpNetwork>,
    pub path_attributes: Vec<PathAttribute>,
    pub nlri: Vec<IpNetwork>,
}

impl UpdateMessage {
    pub fn new(
        withdrawn_routes: Vec<IpNetwork>,
        path_attributes: Vec<PathAttribute>,
        nlri: Vec<IpNetwork>,
    ) -> Self {
        UpdateMessage {
            withdrawn_routes,
            path_attributes,
            nlri,
        }
    }

    pub fn get_attr(&self, type_code: u8) -> Option<&PathAttribute> {
        self.path_attributes
            .iter()
            .find(|a| a.type_code() == type_code)
    }

    pub fn as_path(&self) -> Option<&AsPath> {
        match self.get_attr(attr_type_code::AS_PATH).map(|a| &a.value) {
            Some(PathAttrValue::AsPath(as_path)) => Some(as_path),
            _ => None,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, four_byte_asn: bool) -> Result<Self, ParserError> {
        let malformed = || ParserError::update_error(UpdateMessageError::MalformedAttributeList);

        if bytes.len() < 4 {
            return Err(malformed());
        }

        let withdrawn_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if 2 + withdrawn_len + 2 > bytes.len() {
            return Err(malformed());
        }
        let withdrawn_routes = parse_nlri_list(&bytes[2..2 + withdrawn_len], Afi::Ipv4)?;

        let attrs_off = 2 + withdrawn_len;
        let attrs_len =
            u16::from_be_bytes([bytes[attrs_off], bytes[attrs_off + 1]]) as usize;
        let attrs_end = attrs_off + 2 + attrs_len;
        if attrs_end > bytes.len() {
            return Err(malformed());
        }

        let mut path_attributes = Vec::new();
        let attr_bytes = &bytes[attrs_off + 2..attrs_end];
        let mut cursor = 0;
        while cursor < attr_bytes.len() {
            if cursor + 3 > attr_bytes.len() {
                return Err(malformed());
            }
            let flags = attr_bytes[cursor];
            let type_code = attr_bytes[cursor + 1];
            let (value_len, header_len) = if flags & attr_flags::EXTENDED_LENGTH != 0 {
                if cursor + 4 > attr_bytes.len() {
                    return Err(malformed());
                }
                (
                    u16::from_be_bytes([attr_bytes[cursor + 2], attr_bytes[cursor + 3]]) as usize,
                    4,
                )
            } else {
                (attr_bytes[cursor + 2] as usize, 3)
            };
            cursor += header_len;
            if cursor + value_len > attr_bytes.len() {
                return Err(ParserError::update_error(
                    UpdateMessageError::AttributeLengthError,
                ));
            }
            path_attributes.push(PathAttribute::from_value_bytes(
                flags,
                type_code,
                &attr_bytes[cursor..cursor + value_len],
                four_byte_asn,
            )?);
            cursor += value_len;
        }

        let nlri = parse_nlri_list(&bytes[attrs_end..], Afi::Ipv4)?;

        Ok(UpdateMessage {
            withdrawn_routes,
            path_attributes,
            nlri,
        })
    }

    /// Semantic validation the FSM runs on a parsed UPDATE: flag
    /// correctness, duplicates, mandatory attributes, negotiated families,
    /// and the confederation-segment prohibition for plain EBGP sessions
    /// (RFC 4271 Section 6.3, RFC 4760 Section 7, RFC 5065).
    pub fn validate(
        &self,
        rf_map: &HashSet<AfiSafi>,
        confed_check: bool,
    ) -> Result<(), ParserError> {
        let mut seen = HashSet::new();
        for attr in &self.path_attributes {
            let type_code = attr.type_code();
            if !seen.insert(type_code) {
                return Err(ParserError::update_error(
                    UpdateMessageError::MalformedAttributeList,
                ));
            }
            if let Some(expected) = PathAttribute::expected_flags(type_code) {
                let significant = attr_flags::OPTIONAL | attr_flags::TRANSITIVE;
                if attr.flags & significant != expected {
                    return Err(ParserError::BgpError {
                        error: super::msg_notification::BgpError::UpdateMessageError(
                            UpdateMessageError::AttributeFlagsError,
                        ),
                        data: vec![attr.flags, type_code],
                    });
                }
            }
            match &attr.value {
                PathAttrValue::MpReachNlri { family, .. }
                | PathAttrValue::MpUnreachNlri { family, .. } => {
                    if !rf_map.contains(family) {
                        return Err(ParserError::update_error(
                            UpdateMessageError::OptionalAttributeError,
                        ));
                    }
                }
                PathAttrValue::AsPath(as_path) => {
                    if confed_check && as_path.has_confed_segments() {
                        return Err(ParserError::update_error(
                            UpdateMessageError::MalformedASPath,
                        ));
                    }
                }
                _ => {}
            }
        }

        if !self.nlri.is_empty() {
            use attr_type_code::{AS_PATH, NEXT_HOP, ORIGIN};
            for mandatory in [ORIGIN, AS_PATH, NEXT_HOP] {
                if !seen.contains(&mandatory) {
                    return Err(ParserError::BgpError {
                        error: super::msg_notification::BgpError::UpdateMessageError(
                            UpdateMessageError::MissingWellKnownAttribute,
                        ),
                        data: vec![mandatory],
                    });
                }
            }
        }

        Ok(())
    }
}

impl Message for UpdateMessage {
    fn kind(&self) -> MessageType {
        MessageType::Update
    }

    fn to_bytes(&self) -> Vec<u8> {
        let withdrawn: Vec<u8> = self
            .withdrawn_routes
            .iter()
            .flat_map(|n| n.to_bytes())
            .collect();
        let attrs: Vec<u8> = self
            .path_attributes
            .iter()
            .flat_map(|a| a.to_bytes())
            .collect();

        let mut bytes = Vec::with_capacity(4 + withdrawn.len() + attrs.len());
        bytes.extend_from_slice(&(withdrawn.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&withdrawn);
        bytes.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&attrs);
        for nlri in &self.nlri {
            bytes.extend_from_slice(&nlri.to_bytes());
        }
        bytes
    }
}
