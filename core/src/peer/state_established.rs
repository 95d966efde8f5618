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

use super::fsm::{AdminState, Fsm, FsmState, FsmStateReason};
use crate::bgp::msg::BgpMessage;
use crate::bgp::msg_notification::CeaseSubcode;
use crate::log::warn;
use std::time::Duration;

impl Fsm {
    /// Established: the send and receive activities own the socket; the
    /// driver only watches timers, errors, and administrative signals.
    pub(crate) async fn established(&mut self) -> (Option<FsmState>, FsmStateReason) {
        self.spawn_receive_loop();
        self.spawn_send_loop();

        let hold_enabled = self.negotiated_hold_time > 0;
        let hold_period = Duration::from_secs(self.negotiated_hold_time.max(1));
        let hold = tokio::time::sleep(hold_period);
        tokio::pin!(hold);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    // The send activity emits a cease/peer-deconfigured
                    // NOTIFICATION on its way out.
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

                Some(reason) = self.error_rx.recv() => {
                    return (Some(FsmState::Idle), reason);
                }

                _ = &mut hold, if hold_enabled => {
                    warn!(
                        peer = %self.neighbor.neighbor_address,
                        "hold timer expired"
                    );
                    let notif = Self::notification(
                        crate::bgp::msg_notification::BgpError::HoldTimerExpired,
                    );
                    let _ = self
                        .outgoing_tx
                        .send(BgpMessage::Notification(notif))
                        .await;
                    return (Some(FsmState::Idle), FsmStateReason::HoldTimerExpired);
                }

                Some(_) = self.holdtimer_reset_rx.recv(), if hold_enabled => {
                    hold.as_mut().reset(tokio::time::Instant::now() + hold_period);
                }

                Some(state) = self.admin_rx.recv() => {
                    if self.change_admin_state(state).is_ok()
                        && state == AdminState::Down
                    {
                        // Enqueue the shutdown NOTIFICATION; the send
                        // activity reports notification-sent, which lands in
                        // the error channel and takes us to Idle.
                        let notif = Self::cease(CeaseSubcode::AdministrativeShutdown);
                        let _ = self
                            .outgoing_tx
                            .send(BgpMessage::Notification(notif))
                            .await;
                    }
                }
            }
        }
    }
}
