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

use super::msg_keepalive::KeepAliveMessage;
use super::msg_notification::{BgpError, MessageHeaderError, NotificationMessage};
use super::msg_open::OpenMessage;
use super::msg_route_refresh::RouteRefreshMessage;
use super::msg_update::UpdateMessage;
use super::utils::ParserError;

pub const BGP_HEADER_SIZE_BYTES: usize = 19;
pub const MAX_MESSAGE_SIZE: u16 = 4096;
pub const BGP_PORT: u16 = 179;

// BGP header marker (16 bytes of 0xFF)
pub const BGP_MARKER: [u8; 16] = [0xff; 16];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    KeepAlive = 4,
    RouteRefresh = 5,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Open),
            2 => Ok(MessageType::Update),
            3 => Ok(MessageType::Notification),
            4 => Ok(MessageType::KeepAlive),
            5 => Ok(MessageType::RouteRefresh),
            _ => Err(ParserError::BgpError {
                error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageType),
                data: vec![value],
            }),
        }
    }
}

/// Trait for BGP message types that can serialize themselves
pub trait Message {
    /// Returns the message type identifier
    fn kind(&self) -> MessageType;

    /// Serializes the message body (without BGP header)
    fn to_bytes(&self) -> Vec<u8>;

    /// Serializes the complete BGP message, header included.
    fn serialize(&self) -> Vec<u8> {
        let body = self.to_bytes();
        let mut message = Vec::with_capacity(BGP_HEADER_SIZE_BYTES + body.len());
        message.extend_from_slice(&BGP_MARKER);
        let length = (BGP_HEADER_SIZE_BYTES + body.len()) as u16;
        message.extend_from_slice(&length.to_be_bytes());
        message.push(self.kind().as_u8());
        message.extend_from_slice(&body);
        message
    }
}

/// Decoded, validated BGP message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgpHeader {
    pub length: u16,
    pub message_type: MessageType,
}

impl BgpHeader {
    pub fn body_length(&self) -> usize {
        self.length as usize - BGP_HEADER_SIZE_BYTES
    }
}

/// Parse and validate a 19-octet message header (RFC 4271 Section 6.1).
pub fn parse_header(buf: &[u8; BGP_HEADER_SIZE_BYTES]) -> Result<BgpHeader, ParserError> {
    if buf[0..16] != BGP_MARKER {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::ConnectionNotSynchronized),
            data: Vec::new(),
        });
    }

    let length = u16::from_be_bytes([buf[16], buf[17]]);
    let type_val = buf[18];

    if length < BGP_HEADER_SIZE_BYTES as u16 || length > MAX_MESSAGE_SIZE {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
            data: length.to_be_bytes().to_vec(),
        });
    }

    let message_type = MessageType::try_from(type_val)?;

    // Type-specific length floors/equalities.
    let bad_length = match message_type {
        MessageType::Open => length < 29,
        MessageType::Update => length < 23,
        MessageType::Notification => length < 21,
        MessageType::KeepAlive => length != BGP_HEADER_SIZE_BYTES as u16,
        MessageType::RouteRefresh => length != BGP_HEADER_SIZE_BYTES as u16 + 4,
    };
    if bad_length {
        return Err(ParserError::BgpError {
            error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
            data: length.to_be_bytes().to_vec(),
        });
    }

    Ok(BgpHeader {
        length,
        message_type,
    })
}

pub enum BgpMessage {
    Open(OpenMessage),
    Update(UpdateMessage),
    KeepAlive(KeepAliveMessage),
    Notification(NotificationMessage),
    RouteRefresh(RouteRefreshMessage),
}

impl BgpMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            BgpMessage::Open(_) => MessageType::Open,
            BgpMessage::Update(_) => MessageType::Update,
            BgpMessage::KeepAlive(_) => MessageType::KeepAlive,
            BgpMessage::Notification(_) => MessageType::Notification,
            BgpMessage::RouteRefresh(_) => MessageType::RouteRefresh,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            BgpMessage::Open(m) => m.serialize(),
            BgpMessage::Update(m) => m.serialize(),
            BgpMessage::KeepAlive(m) => m.serialize(),
            BgpMessage::Notification(m) => m.serialize(),
            BgpMessage::RouteRefresh(m) => m.serialize(),
        }
    }
}

/// Parse a message body given its validated header.
///
/// `four_byte_asn` selects the AS_PATH wire width for UPDATE bodies; it is
/// true once both sides advertised the FourOctetASNumber capability.
pub fn parse_body(
    header: &BgpHeader,
    body: Vec<u8>,
    four_byte_asn: bool,
) -> Result<BgpMessage, ParserError> {
    match header.message_type {
        MessageType::Open => Ok(BgpMessage::Open(OpenMessage::from_bytes(body)?)),
        MessageType::Update => Ok(BgpMessage::Update(UpdateMessage::from_bytes(
            body,
            four_byte_asn,
        )?)),
        MessageType::KeepAlive => Ok(BgpMessage::KeepAlive(KeepAliveMessage {})),
        MessageType::Notification => Ok(BgpMessage::Notification(NotificationMessage::from_bytes(
            body,
        ))),
        MessageType::RouteRefresh => Ok(BgpMessage::RouteRefresh(
            RouteRefreshMessage::from_bytes(&body)?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOCK_OPEN_HEADER: [u8; BGP_HEADER_SIZE_BYTES] = [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x00, 0x1d, // length 29
        0x01, // Open
    ];

    #[test]
    fn test_parse_header() {
        let header = parse_header(&MOCK_OPEN_HEADER).unwrap();
        assert_eq!(header.length, 29);
        assert_eq!(header.message_type, MessageType::Open);
        assert_eq!(header.body_length(), 10);
    }

    #[test]
    fn test_parse_header_invalid_marker() {
        let mut buf = MOCK_OPEN_HEADER;
        buf[0] = 0x00;
        match parse_header(&buf) {
            Err(ParserError::BgpError { error, .. }) => assert_eq!(
                error,
                BgpError::MessageHeaderError(MessageHeaderError::ConnectionNotSynchronized)
            ),
            other => panic!("expected ConnectionNotSynchronized, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_parse_header_bad_lengths() {
        // (length, type, description)
        let cases = [
            (18u16, 1u8, "below header size"),
            (4097, 1, "above maximum"),
            (20, 4, "keepalive must be exactly 19"),
            (28, 1, "open below minimum"),
            (20, 3, "notification below minimum"),
        ];
        for (length, typ, desc) in cases {
            let mut buf = MOCK_OPEN_HEADER;
            buf[16..18].copy_from_slice(&length.to_be_bytes());
            buf[18] = typ;
            match parse_header(&buf) {
                Err(ParserError::BgpError { error, data }) => {
                    assert_eq!(
                        error,
                        BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
                        "{}",
                        desc
                    );
                    assert_eq!(data, length.to_be_bytes().to_vec(), "{}", desc);
                }
                other => panic!("{}: expected BadMessageLength, got {:?}", desc, other.err()),
            }
        }
    }

    #[test]
    fn test_parse_header_bad_type() {
        let mut buf = MOCK_OPEN_HEADER;
        buf[18] = 99;
        match parse_header(&buf) {
            Err(ParserError::BgpError { error, data }) => {
                assert_eq!(
                    error,
                    BgpError::MessageHeaderError(MessageHeaderError::BadMessageType)
                );
                assert_eq!(data, vec![99]);
            }
            other => panic!("expected BadMessageType, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_parse_body_open() {
        let header = parse_header(&MOCK_OPEN_HEADER).unwrap();
        let body = vec![
            0x04, // version
            0x04, 0xd2, // ASN 1234
            0x00, 0x0a, // hold time 10
            0x0a, 0x0a, 0x0a, 0x0a, // identifier 10.10.10.10
            0x00, // no optional params
        ];
        match parse_body(&header, body, false).unwrap() {
            BgpMessage::Open(open) => {
                assert_eq!(open.asn, 1234);
                assert_eq!(open.hold_time, 10);
            }
            _ => panic!("expected OPEN"),
        }
    }
}
