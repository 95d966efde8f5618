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
    keepalive_ticker, next_tick, AdminState, Fsm, FsmMsgData, FsmState, FsmStateReason,
};
use crate::bgp::msg::BgpMessage;
use crate::bgp::msg_keepalive::KeepAliveMessage;
use crate::bgp::msg_notification::{BgpError, NotificationMessage};
use crate::log::warn;
use std::time::Duration;

impl Fsm {
    /// OpenConfirm: KEEPALIVEs flow both ways; the peer's first one takes
    /// the session to Established.
    pub(crate) async fn openconfirm(&mut self) -> (Option<FsmState>, FsmStateReason) {
        let mut msg_rx = self.spawn_recv_once();
        let mut ticker = keepalive_ticker(self.negotiated_hold_time, self.keepalive_interval);

        let hold_enabled = self.negotiated_hold_time > 0;
        let hold = tokio::time::sleep(Duration::from_secs(self.negotiated_hold_time.max(1)));
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

                _ = next_tick(&mut ticker) => {
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
                }

                Some(msg) = msg_rx.recv() => {
                    self.reclaim_read_half().await;
                    match msg.data {
                        FsmMsgData::Message(Ok(BgpMessage::KeepAlive(_))) => {
                            return (Some(FsmState::Established), FsmStateReason::None);
                        }
                        FsmMsgData::Message(Ok(_)) => {
                            warn!(
                                peer = %self.neighbor.neighbor_address,
                                "unexpected message while waiting for KEEPALIVE"
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

                _ = &mut hold, if hold_enabled => {
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
}
