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

use super::fsm::{
    negotiate_timers, open2cap, AdminState, Fsm, FsmMsgData, FsmState, FsmStateReason,
    Negotiated,
};
use crate::bgp::msg::BgpMessage;
use crate::bgp::msg_keepalive::KeepAliveMessage;
use crate::bgp::msg_notification::{BgpError, NotificationMessage};
use crate::bgp::msg_open::{validate_open, CapabilityCode, OpenMessage};
use crate::log::{info, warn};
use crate::table::PeerInfo;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

impl Fsm {
    /// OpenSent: our OPEN is on the wire; wait for the peer's under the
    /// RFC 4271 "large value" hold timer.
    pub(crate) async fn opensent(&mut self) -> (Option<FsmState>, FsmStateReason) {
        let open = self.build_open();
        if let Err(e) = self.send_message_direct(&BgpMessage::Open(open)).await {
            warn!(
                peer = %self.neighbor.neighbor_address,
                error = %e,
                "failed to send OPEN"
            );
            return (Some(FsmState::Idle), FsmStateReason::WriteFailed);
        }
        info!(peer = %self.neighbor.neighbor_address, "sent OPEN");

        let mut msg_rx = self.spawn_recv_once();

        let hold = tokio::time::sleep(Duration::from_secs(self.opensent_hold_time));
        tokio::pin!(hold);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    return (None, FsmStateReason::Dying);
                }

                Some(conn) = self.conn_rx.recv() => {
                    drop(conn);
                    warn!(
                        peer = %self.neighbor.neighbor_address,
                        state = %self.state,
                        "closed an accepted connection"
                    );
                }

                Some(msg) = msg_rx.recv() => {
                    self.reclaim_read_half().await;
                    match msg.data {
                        FsmMsgData::Message(Ok(BgpMessage::Open(open))) => {
                            return self.handle_open(open).await;
                        }
                        FsmMsgData::Message(Ok(_)) => {
                            // Anything but OPEN here is a protocol violation;
                            // the source closes without a NOTIFICATION.
                            warn!(
                                peer = %self.neighbor.neighbor_address,
                                "unexpected message while waiting for OPEN"
                            );
                            return (Some(FsmState::Idle), FsmStateReason::InvalidMsg);
                        }
                        FsmMsgData::Message(Err(parse_err)) => {
                            if let Some(notif) = NotificationMessage::from_parser_error(&parse_err) {
                                self.send_notification_direct(notif).await;
                            }
                            return (Some(FsmState::Idle), FsmStateReason::InvalidMsg);
                        }
                        FsmMsgData::StateChange(_) => {}
                    }
                }

                Some(reason) = self.error_rx.recv() => {
                    return (Some(FsmState::Idle), reason);
                }

                _ = &mut hold => {
                    self.send_notification_direct(Self::notification(BgpError::HoldTimerExpired))
                        .await;
                    return (Some(FsmState::Idle), FsmStateReason::HoldTimerExpired);
                }

                Some(state) = self.admin_rx.recv() => {
                    if self.change_admin_state(state).is_ok()
                        && state == AdminState::Down
                    {
                        return (Some(FsmState::Idle), FsmStateReason::AdminDown);
                    }
                }
            }
        }
    }

    /// Validate the peer's OPEN, derive session parameters, answer with a
    /// KEEPALIVE.
    async fn handle_open(&mut self, open: OpenMessage) -> (Option<FsmState>, FsmStateReason) {
        if let Err(e) = validate_open(&open, self.neighbor.peer_as) {
            if let Some(notif) = NotificationMessage::from_parser_error(&e) {
                self.send_notification_direct(notif).await;
            }
            return (Some(FsmState::Idle), FsmStateReason::InvalidMsg);
        }

        let peer_id = Ipv4Addr::from(open.bgp_identifier);
        self.peer_info = Arc::new(PeerInfo {
            id: peer_id,
            ..(*self.peer_info).clone()
        });

        let (cap_map, rf_map) = open2cap(&open, &self.neighbor.afi_safis);
        let four_byte_asn = cap_map.contains_key(&CapabilityCode::FourOctetAs);

        let (hold_time, keepalive_interval) = negotiate_timers(
            self.neighbor.hold_time,
            self.neighbor.keepalive_interval,
            open.hold_time as u64,
        );
        self.negotiated_hold_time = hold_time;
        self.keepalive_interval = keepalive_interval;
        self.cap_map = cap_map;
        self.rf_map = rf_map.clone();
        self.recv_open = Some(open);

        let confed_check = self.neighbor.is_ebgp(&self.global)
            && !self.global.is_confed_member(self.neighbor.peer_as);
        *self
            .session
            .negotiated
            .write()
            .expect("negotiated lock poisoned") = Some(Negotiated {
            hold_time,
            keepalive_interval,
            four_byte_asn,
            rf_map,
            peer_info: Arc::clone(&self.peer_info),
            confed_check,
        });

        info!(
            peer = %self.neighbor.neighbor_address,
            peer_id = %peer_id,
            hold_time,
            keepalive_interval,
            four_byte_asn,
            "OPEN accepted"
        );

        if let Err(e) = self
            .send_message_direct(&BgpMessage::KeepAlive(KeepAliveMessage {}))
            .await
        {
            warn!(
                peer = %self.neighbor.neighbor_address,
                error = %e,
                "failed to send KEEPALIVE"
            );
            return (Some(FsmState::Idle), FsmStateReason::WriteFailed);
        }

        (Some(FsmState::OpenConfirm), FsmStateReason::None)
    }
}
