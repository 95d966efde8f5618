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

//! The send activity: drains the outbound queue, paces keepalives, applies
//! the write deadline, and turns a sent NOTIFICATION into session teardown.

use super::fsm::{keepalive_ticker, next_tick, Fsm, FsmState, FsmStateReason, SessionShared};
use crate::bgp::msg::{BgpMessage, MessageType};
use crate::bgp::msg_keepalive::KeepAliveMessage;
use crate::bgp::msg_notification::CeaseSubcode;
use crate::log::{debug, error, warn};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

pub(crate) struct SendLoop {
    pub write_half: OwnedWriteHalf,
    pub outgoing: Arc<Mutex<mpsc::Receiver<BgpMessage>>>,
    pub session: Arc<SessionShared>,
    pub error_tx: mpsc::Sender<FsmStateReason>,
    pub token: CancellationToken,
    pub peer_addr: IpAddr,
}

impl SendLoop {
    pub(crate) async fn run(mut self) {
        let (hold_time, keepalive_interval) = match self.session.negotiated() {
            Some(negotiated) => (negotiated.hold_time, negotiated.keepalive_interval),
            None => {
                error!(peer = %self.peer_addr, "send activity started without negotiation");
                return;
            }
        };
        let mut ticker = keepalive_ticker(hold_time, keepalive_interval);

        // The queue outlives this session; lock it for the session's
        // duration so queued messages survive a bounce.
        let outgoing_handle = Arc::clone(&self.outgoing);
        let mut outgoing = outgoing_handle.lock().await;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    // Dying while established: best-effort farewell. If the
                    // teardown came from a dead connection the write simply
                    // fails, which is fine either way.
                    if self.session.state() == FsmState::Established {
                        let notif = Fsm::cease(CeaseSubcode::PeerDeconfigured);
                        let _ = self
                            .write(BgpMessage::Notification(notif), hold_time)
                            .await;
                    }
                    return;
                }

                Some(msg) = outgoing.recv() => {
                    if self.send(msg, hold_time).await.is_err() {
                        return;
                    }
                }

                _ = next_tick(&mut ticker) => {
                    let keepalive = BgpMessage::KeepAlive(KeepAliveMessage {});
                    if self.send(keepalive, hold_time).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Send one message; `Err` means the loop must stop (write failure or a
    /// NOTIFICATION went out).
    async fn send(&mut self, msg: BgpMessage, hold_time: u64) -> Result<(), ()> {
        let message_type = msg.message_type();
        if self.write(msg, hold_time).await.is_err() {
            warn!(peer = %self.peer_addr, "failed to send message");
            let _ = self.error_tx.try_send(FsmStateReason::WriteFailed);
            return Err(());
        }

        self.session.sent.count(Some(message_type));

        if message_type == MessageType::Notification {
            warn!(peer = %self.peer_addr, "sent notification");
            let _ = self.error_tx.try_send(FsmStateReason::NotificationSent);
            return Err(());
        }

        debug!(peer = %self.peer_addr, message_type = ?message_type, "sent message");
        Ok(())
    }

    /// Raw write under the negotiated-hold-time deadline. A zero hold time
    /// means no liveness enforcement, so no deadline either.
    async fn write(&mut self, msg: BgpMessage, hold_time: u64) -> Result<(), ()> {
        let bytes = msg.serialize();
        if hold_time > 0 {
            match tokio::time::timeout(
                Duration::from_secs(hold_time),
                self.write_half.write_all(&bytes),
            )
            .await
            {
                Ok(Ok(())) => Ok(()),
                _ => Err(()),
            }
        } else {
            self.write_half.write_all(&bytes).await.map_err(|_| ())
        }
    }
}

impl Fsm {
    /// Spawn the Established send loop on the session's write half.
    pub(crate) fn spawn_send_loop(&mut self) {
        let Some(write_half) = self.write_half.take() else {
            error!(
                peer = %self.neighbor.neighbor_address,
                "no write half to spawn send loop on"
            );
            return;
        };
        let token = self
            .session_token
            .clone()
            .unwrap_or_else(|| self.token.child_token());

        let task = SendLoop {
            write_half,
            outgoing: Arc::clone(&self.outgoing_rx),
            session: Arc::clone(&self.session),
            error_tx: self.error_tx.clone(),
            token,
            peer_addr: self.neighbor.neighbor_address,
        };
        self.send_handle = Some(tokio::spawn(task.run()));
    }
}
