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
use super::utils::ParserError;

/// Message Header Error subcodes (RFC 4271 Section 6.1)
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MessageHeaderError {
    ConnectionNotSynchronized,
    BadMessageLength,
    BadMessageType,
    Unknown(u8),
}

impl MessageHeaderError {
    fn as_u8(&self) -> u8 {
        match self {
            MessageHeaderError::ConnectionNotSynchronized => 1,
            MessageHeaderError::BadMessageLength => 2,
            MessageHeaderError::BadMessageType => 3,
            MessageHeaderError::Unknown(v) => *v,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => MessageHeaderError::ConnectionNotSynchronized,
            2 => MessageHeaderError::BadMessageLength,
            3 => MessageHeaderError::BadMessageType,
            v => MessageHeaderError::Unknown(v),
        }
    }
}

/// OPEN Message Error subcodes (RFC 4271 Section 6.2)
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum OpenMessageError {
    UnsupportedVersionNumber,
    BadPeerAs,
    BadBgpIdentifier,
    UnsupportedOptionalParameter,
    UnacceptableHoldTime,
    Unknown(u8),
}

impl OpenMessageError {
    fn as_u8(&self) -> u8 {
        match self {
            OpenMessageError::UnsupportedVersionNumber => 1,
            OpenMessageError::BadPeerAs => 2,
            OpenMessageError::BadBgpIdentifier => 3,
            OpenMessageError::UnsupportedOptionalParameter => 4,
            OpenMessageError::UnacceptableHoldTime => 6,
            OpenMessageError::Unknown(v) => *v,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => OpenMessageError::UnsupportedVersionNumber,
            2 => OpenMessageError::BadPeerAs,
            3 => OpenMessageError::BadBgpIdentifier,
            4 => OpenMessageError::UnsupportedOptionalParameter,
            6 => OpenMessageError::UnacceptableHoldTime,
            v => OpenMessageError::Unknown(v),
        }
    }
}

/// UPDATE Message Error subcodes (RFC 4271 Section 6.3)
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum UpdateMessageError {
    MalformedAttributeList,
    UnrecognizedWellKnownAttribute,
    MissingWellKnownAttribute,
    AttributeFlagsError,
    AttributeLengthError,
    InvalidOriginAttribute,
    InvalidNextHopAttribute,
    OptionalAttributeError,
    InvalidNetworkField,
    MalformedASPath,
    Unknown(u8),
}

impl UpdateMessageError {
    fn as_u8(&self) -> u8 {
        match self {
            UpdateMessageError::MalformedAttributeList => 1,
            UpdateMessageError::UnrecognizedWellKnownAttribute => 2,
            UpdateMessageError::MissingWellKnownAttribute => 3,
            UpdateMessageError::AttributeFlagsError => 4,
            UpdateMessageError::AttributeLengthError => 5,
            UpdateMessageError::InvalidOriginAttribute => 6,
            UpdateMessageError::InvalidNextHopAttribute => 8,
            UpdateMessageError::OptionalAttributeError => 9,
            UpdateMessageError::InvalidNetworkField => 10,
            UpdateMessageError::MalformedASPath => 11,
            UpdateMessageError::Unknown(v) => *v,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => UpdateMessageError::MalformedAttributeList,
            2 => UpdateMessageError::UnrecognizedWellKnownAttribute,
            3 => UpdateMessageError::MissingWellKnownAttribute,
            4 => UpdateMessageError::AttributeFlagsError,
            5 => UpdateMessageError::AttributeLengthError,
            6 => UpdateMessageError::InvalidOriginAttribute,
            8 => UpdateMessageError::InvalidNextHopAttribute,
            9 => UpdateMessageError::OptionalAttributeError,
            10 => UpdateMessageError::InvalidNetworkField,
            11 => UpdateMessageError::MalformedASPath,
            v => UpdateMessageError::Unknown(v),
        }
    }
}

/// Cease subcodes (RFC 4486)
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CeaseSubcode {
    MaxPrefixesReached,
    AdministrativeShutdown,
    PeerDeconfigured,
    AdministrativeReset,
    ConnectionRejected,
    OtherConfigurationChange,
    ConnectionCollisionResolution,
    OutOfResources,
    Unknown(u8),
}

impl CeaseSubcode {
    fn as_u8(&self) -> u8 {
        match self {
            CeaseSubcode::MaxPrefixesReached => 1,
            CeaseSubcode::AdministrativeShutdown => 2,
            CeaseSubcode::PeerDeconfigured => 3,
            CeaseSubcode::AdministrativeReset => 4,
            CeaseSubcode::ConnectionRejected => 5,
            CeaseSubcode::OtherConfigurationChange => 6,
            CeaseSubcode::ConnectionCollisionResolution => 7,
            CeaseSubcode::OutOfResources => 8,
            CeaseSubcode::Unknown(v) => *v,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CeaseSubcode::MaxPrefixesReached,
            2 => CeaseSubcode::AdministrativeShutdown,
            3 => CeaseSubcode::PeerDeconfigured,
            4 => CeaseSubcode::AdministrativeReset,
            5 => CeaseSubcode::ConnectionRejected,
            6 => CeaseSubcode::OtherConfigurationChange,
            7 => CeaseSubcode::ConnectionCollisionResolution,
            8 => CeaseSubcode::OutOfResources,
            v => CeaseSubcode::Unknown(v),
        }
    }
}

/// NOTIFICATION error code + subcode (RFC 4271 Section 4.5)
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BgpError {
    MessageHeaderError(MessageHeaderError),
    OpenMessageError(OpenMessageError),
    UpdateMessageError(UpdateMessageError),
    HoldTimerExpired,
    FiniteStateMachineError,
    Cease(CeaseSubcode),
    Unknown { code: u8, subcode: u8 },
}

impl BgpError {
    pub fn code(&self) -> u8 {
        match self {
            BgpError::MessageHeaderError(_) => 1,
            BgpError::OpenMessageError(_) => 2,
            BgpError::UpdateMessageError(_) => 3,
            BgpError::HoldTimerExpired => 4,
            BgpError::FiniteStateMachineError => 5,
            BgpError::Cease(_) => 6,
            BgpError::Unknown { code, .. } => *code,
        }
    }

    pub fn subcode(&self) -> u8 {
        match self {
            BgpError::MessageHeaderError(sub) => sub.as_u8(),
            BgpError::OpenMessageError(sub) => sub.as_u8(),
            BgpError::UpdateMessageError(sub) => sub.as_u8(),
            BgpError::HoldTimerExpired => 0,
            BgpError::FiniteStateMachineError => 0,
            BgpError::Cease(sub) => sub.as_u8(),
            BgpError::Unknown { subcode, .. } => *subcode,
        }
    }

    pub fn from_codes(code: u8, subcode: u8) -> Self {
        match code {
            1 => BgpError::MessageHeaderError(MessageHeaderError::from_u8(subcode)),
            2 => BgpError::OpenMessageError(OpenMessageError::from_u8(subcode)),
            3 => BgpError::UpdateMessageError(UpdateMessageError::from_u8(subcode)),
            4 => BgpError::HoldTimerExpired,
            5 => BgpError::FiniteStateMachineError,
            6 => BgpError::Cease(CeaseSubcode::from_u8(subcode)),
            code => BgpError::Unknown { code, subcode },
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NotificationMessage {
    error: BgpError,
    data: Vec<u8>,
}

impl NotificationMessage {
    pub fn new(error: BgpError, data: Vec<u8>) -> Self {
        NotificationMessage { error, data }
    }

    pub fn error(&self) -> &BgpError {
        &self.error
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Body is code + subcode + whatever data the sender attached. Anything
    /// shorter than two octets was already rejected by header validation.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let code = bytes.first().copied().unwrap_or(0);
        let subcode = bytes.get(1).copied().unwrap_or(0);
        NotificationMessage {
            error: BgpError::from_codes(code, subcode),
            data: bytes.get(2..).map(|d| d.to_vec()).unwrap_or_default(),
        }
    }

    /// Build the NOTIFICATION that answers a parse failure, if any applies.
    /// IO errors have no wire representation.
    pub fn from_parser_error(err: &ParserError) -> Option<Self> {
        match err {
            ParserError::BgpError { error, data } => {
                Some(NotificationMessage::new(error.clone(), data.clone()))
            }
            ParserError::IoError(_) => None,
        }
    }
}

impl Message for NotificationMessage {
    fn kind(&self) -> MessageType {
        MessageType::Notification
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.data.len());
        bytes.push(self.error.code());
        bytes.push(self.error.subcode());
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cease_serialization() {
        let notif = NotificationMessage::new(
            BgpError::Cease(CeaseSubcode::AdministrativeShutdown),
            Vec::new(),
        );
        let bytes = notif.to_bytes();
        assert_eq!(bytes, vec![6, 2]);

        let wire = notif.serialize();
        assert_eq!(wire.len(), 21);
        assert_eq!(wire[18], MessageType::Notification.as_u8());
    }

    #[test]
    fn test_hold_timer_expired_codes() {
        let notif = NotificationMessage::new(BgpError::HoldTimerExpired, Vec::new());
        assert_eq!(notif.to_bytes(), vec![4, 0]);
    }

    #[test]
    fn test_from_bytes() {
        let notif = NotificationMessage::from_bytes(vec![6, 3]);
        assert_eq!(
            notif.error(),
            &BgpError::Cease(CeaseSubcode::PeerDeconfigured)
        );
        assert!(notif.data().is_empty());

        let notif = NotificationMessage::from_bytes(vec![2, 2, 0xfd, 0xe9]);
        assert_eq!(
            notif.error(),
            &BgpError::OpenMessageError(OpenMessageError::BadPeerAs)
        );
        assert_eq!(notif.data(), &[0xfd, 0xe9]);
    }

    #[test]
    fn test_from_parser_error() {
        let err = ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::UnsupportedVersionNumber),
            data: vec![0, 4],
        };
        let notif = NotificationMessage::from_parser_error(&err).unwrap();
        assert_eq!(notif.to_bytes(), vec![2, 1, 0, 4]);

        assert!(
            NotificationMessage::from_parser_error(&ParserError::IoError("eof".into())).is_none()
        );
    }

    #[test]
    fn test_unknown_codes_round_trip() {
        let err = BgpError::from_codes(99, 7);
        assert_eq!(err.code(), 99);
        assert_eq!(err.subcode(), 7);
    }
}
