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

use super::msg::{Message, MessageType, BGP_HEADER_SIZE_BYTES};

/// KEEPALIVE carries no body (RFC 4271 Section 4.4).
pub struct KeepAliveMessage {}

impl Message for KeepAliveMessage {
    fn kind(&self) -> MessageType {
        MessageType::KeepAlive
    }

    fn to_bytes(&self) -> Vec<u8> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        let wire = KeepAliveMessage {}.serialize();
        assert_eq!(wire.len(), BGP_HEADER_SIZE_BYTES);
        assert_eq!(wire[16..19], [0x00, 0x13, 0x04]);
    }
}
