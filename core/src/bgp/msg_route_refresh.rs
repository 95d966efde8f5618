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
use super::multiprotocol::AfiSafi;
use super::utils::ParserError;

/// ROUTE_REFRESH message (RFC 2918). The session core only decodes and
/// forwards these; re-advertisement is the route processor's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRefreshMessage {
    pub family: AfiSafi,
}

impl RouteRefreshMessage {
    pub fn new(family: AfiSafi) -> Self {
        RouteRefreshMessage { family }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParserError> {
        Ok(RouteRefreshMessage {
            family: AfiSafi::from_capability_bytes(bytes)?,
        })
    }
}

impl Message for RouteRefreshMessage {
    fn kind(&self) -> MessageType {
        MessageType::RouteRefresh
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.family.to_capability_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let msg = RouteRefreshMessage::new(AfiSafi::IPV6_UNICAST);
        let body = msg.to_bytes();
        assert_eq!(body, vec![0x00, 0x02, 0x00, 0x01]);
        assert_eq!(RouteRefreshMessage::from_bytes(&body).unwrap(), msg);
    }
}
