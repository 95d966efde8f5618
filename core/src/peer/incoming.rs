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

//! The receive activity: framed reads off the session socket, per-message
//! accounting, and the Established-state UPDATE pipeline (validation, AS4
//! reconciliation, path extraction, inbound policy).

use super::fsm::{Fsm, FsmMsg, FsmMsgData, FsmStateReason, SessionShared};
use crate::bgp::msg::{parse_body, parse_header, BgpMessage, BGP_HEADER_SIZE_BYTES};
use crate::bgp::utils::ParserError;
use crate::log::{error, warn};
use crate::policy::{PolicyDirection, SharedPolicy};
use crate::table::{process_message, reconcile_4byte};
use std::io;
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Result of reading one frame. Header-level failures poison the framing;
/// body-level failures do not.
enum ReadOutcome {
    Message {
        message: BgpMessage,
        header: [u8; BGP_HEADER_SIZE_BYTES],
        body: Vec<u8>,
    },
    BadHeader(ParserError),
    BadBody(ParserError),
}

/// Read and parse one message, counting it against the shared counters.
async fn read_message(
    read_half: &mut OwnedReadHalf,
    session: &SessionShared,
) -> io::Result<ReadOutcome> {
    let mut header_buf = [0u8; BGP_HEADER_SIZE_BYTES];
    read_half.read_exact(&mut header_buf).await?;

    let header = match parse_header(&header_buf) {
        Ok(header) => header,
        Err(e) => {
            session.recv.count(None);
            return Ok(ReadOutcome::BadHeader(e));
        }
    };

    let mut body = vec![0u8; header.body_length()];
    if !body.is_empty() {
        read_half.read_exact(&mut body).await?;
    }

    let four_byte_asn = session
        .negotiated()
        .map(|n| n.four_byte_asn)
        .unwrap_or(false);

    match parse_body(&header, body.clone(), four_byte_asn) {
        Ok(message) => {
            session.recv.count(Some(header.message_type));
            if header.message_type == crate::bgp::msg::MessageType::Update {
                session.update_recv_time.store(unix_now(), Ordering::Relaxed);
            }
            Ok(ReadOutcome::Message {
                message,
                header: header_buf,
                body,
            })
        }
        Err(e) => {
            session.recv.count(None);
            Ok(ReadOutcome::BadBody(e))
        }
    }
}

fn envelope(
    peer_addr: IpAddr,
    local_addr: Option<IpAddr>,
    data: FsmMsgData,
) -> FsmMsg {
    FsmMsg {
        src: peer_addr,
        dst: local_addr,
        data,
        path_list: Vec::new(),
        timestamp: None,
        payload: None,
    }
}

/// Single-message receiver used in OpenSent and OpenConfirm, mirroring the
/// one-shot read the handshake needs. Returns the read half for reuse when
/// the frame was consumed cleanly.
pub(crate) struct RecvOnce {
    pub read_half: OwnedReadHalf,
    pub session: Arc<SessionShared>,
    pub msg_tx: mpsc::Sender<FsmMsg>,
    pub error_tx: mpsc::Sender<FsmStateReason>,
    pub token: CancellationToken,
    pub peer_addr: IpAddr,
    pub local_addr: Option<IpAddr>,
}

impl RecvOnce {
    pub(crate) async fn run(mut self) -> Option<OwnedReadHalf> {
        let result = tokio::select! {
            _ = self.token.cancelled() => return None,
            result = read_message(&mut self.read_half, &self.session) => result,
        };

        match result {
            Err(e) => {
                warn!(peer = %self.peer_addr, error = %e, "failed to read message");
                let _ = self.error_tx.try_send(FsmStateReason::ReadFailed);
                None
            }
            Ok(ReadOutcome::BadHeader(e)) | Ok(ReadOutcome::BadBody(e)) => {
                warn!(peer = %self.peer_addr, error = %e, "malformed BGP message");
                let msg = envelope(self.peer_addr, self.local_addr, FsmMsgData::Message(Err(e)));
                let _ = self.msg_tx.send(msg).await;
                None
            }
            Ok(ReadOutcome::Message { message, .. }) => {
                let mut msg = envelope(
                    self.peer_addr,
                    self.local_addr,
                    FsmMsgData::Message(Ok(message)),
                );
                msg.timestamp = Some(SystemTime::now());
                let _ = self.msg_tx.send(msg).await;
                Some(self.read_half)
            }
        }
    }
}

/// The Established-state receive loop.
pub(crate) struct RecvLoop {
    pub read_half: OwnedReadHalf,
    pub session: Arc<SessionShared>,
    pub policy: SharedPolicy,
    pub incoming_tx: mpsc::Sender<FsmMsg>,
    pub error_tx: mpsc::Sender<FsmStateReason>,
    pub holdtimer_reset_tx: mpsc::Sender<()>,
    pub token: CancellationToken,
    pub peer_addr: IpAddr,
    pub local_addr: Option<IpAddr>,
}

impl RecvLoop {
    pub(crate) async fn run(mut self) {
        loop {
            let result = tokio::select! {
                _ = self.token.cancelled() => return,
                result = read_message(&mut self.read_half, &self.session) => result,
            };

            match result {
                Err(e) => {
                    warn!(peer = %self.peer_addr, error = %e, "failed to read message");
                    let _ = self.error_tx.try_send(FsmStateReason::ReadFailed);
                    return;
                }
                Ok(ReadOutcome::BadHeader(e)) => {
                    // Message boundaries are lost; surface the error and
                    // stop reading. The hold timer bounds the fallout.
                    warn!(peer = %self.peer_addr, error = %e, "malformed BGP header");
                    let msg =
                        envelope(self.peer_addr, self.local_addr, FsmMsgData::Message(Err(e)));
                    let _ = self.incoming_tx.send(msg).await;
                    return;
                }
                Ok(ReadOutcome::BadBody(e)) => {
                    // The frame was well-delimited; drop the message and
                    // keep the session.
                    warn!(peer = %self.peer_addr, error = %e, "malformed BGP message body");
                    let msg =
                        envelope(self.peer_addr, self.local_addr, FsmMsgData::Message(Err(e)));
                    let _ = self.incoming_tx.send(msg).await;
                }
                Ok(ReadOutcome::Message {
                    message,
                    header,
                    body,
                }) => {
                    if !self.handle_message(message, header, body).await {
                        return;
                    }
                }
            }
        }
    }

    /// Process one parsed message. Returns false when the loop must stop.
    async fn handle_message(
        &mut self,
        message: BgpMessage,
        header: [u8; BGP_HEADER_SIZE_BYTES],
        body: Vec<u8>,
    ) -> bool {
        match message {
            BgpMessage::KeepAlive(_) => {
                self.reset_hold_timer();
                true
            }

            BgpMessage::Notification(notif) => {
                warn!(
                    peer = %self.peer_addr,
                    error = ?notif.error(),
                    "received notification"
                );
                let _ = self.error_tx.try_send(FsmStateReason::NotificationRecv);
                false
            }

            BgpMessage::Update(mut update) => {
                let Some(negotiated) = self.session.negotiated() else {
                    // Cannot happen once Established; tolerate it by
                    // forwarding the raw message.
                    error!(peer = %self.peer_addr, "missing negotiated session state");
                    let msg = envelope(
                        self.peer_addr,
                        self.local_addr,
                        FsmMsgData::Message(Ok(BgpMessage::Update(update))),
                    );
                    let _ = self.incoming_tx.send(msg).await;
                    return true;
                };

                let timestamp = SystemTime::now();
                let (data, path_list) =
                    match update.validate(&negotiated.rf_map, negotiated.confed_check) {
                        Err(e) => {
                            warn!(
                                peer = %self.peer_addr,
                                error = %e,
                                "malformed BGP update message"
                            );
                            (FsmMsgData::Message(Err(e)), Vec::new())
                        }
                        Ok(()) => {
                            reconcile_4byte(&mut update);

                            let mut path_list =
                                process_message(&update, &negotiated.peer_info, timestamp);

                            // A path the engine does not explicitly accept
                            // is recorded as filtered inbound.
                            let peer_id = self.peer_addr.to_string();
                            {
                                let policy =
                                    self.policy.read().expect("policy lock poisoned");
                                for path in &mut path_list {
                                    if policy
                                        .apply(&peer_id, PolicyDirection::In, path)
                                        .is_none()
                                    {
                                        path.filter(&peer_id, PolicyDirection::In);
                                    }
                                }
                            }

                            (
                                FsmMsgData::Message(Ok(BgpMessage::Update(update))),
                                path_list,
                            )
                        }
                    };

                let mut msg = envelope(self.peer_addr, self.local_addr, data);
                msg.timestamp = Some(timestamp);
                msg.path_list = path_list;

                // Raw octets ride along for BMP/MRT duplication.
                let mut payload = Vec::with_capacity(header.len() + body.len());
                payload.extend_from_slice(&header);
                payload.extend_from_slice(&body);
                msg.payload = Some(payload);

                self.reset_hold_timer();
                let _ = self.incoming_tx.send(msg).await;
                true
            }

            // OPEN in Established is a protocol violation the route
            // processor decides on; ROUTE_REFRESH is its business entirely.
            other => {
                let mut msg = envelope(
                    self.peer_addr,
                    self.local_addr,
                    FsmMsgData::Message(Ok(other)),
                );
                msg.timestamp = Some(SystemTime::now());
                let _ = self.incoming_tx.send(msg).await;
                true
            }
        }
    }

    /// Coalescing reset: if a reset is already pending, this one is
    /// redundant by construction.
    fn reset_hold_timer(&self) {
        let _ = self.holdtimer_reset_tx.try_send(());
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl Fsm {
    /// Spawn the one-shot receiver for OpenSent/OpenConfirm. The returned
    /// channel yields at most one envelope.
    pub(crate) fn spawn_recv_once(&mut self) -> mpsc::Receiver<FsmMsg> {
        let (msg_tx, msg_rx) = mpsc::channel(1);
        let Some(read_half) = self.read_half.take() else {
            error!(
                peer = %self.neighbor.neighbor_address,
                "no read half to spawn receiver on"
            );
            return msg_rx;
        };
        let token = self
            .session_token
            .clone()
            .unwrap_or_else(|| self.token.child_token());

        let task = RecvOnce {
            read_half,
            session: Arc::clone(&self.session),
            msg_tx,
            error_tx: self.error_tx.clone(),
            token,
            peer_addr: self.neighbor.neighbor_address,
            local_addr: self.neighbor.local_address,
        };
        self.recv_once_handle = Some(tokio::spawn(task.run()));
        msg_rx
    }

    /// Spawn the Established receive loop.
    pub(crate) fn spawn_receive_loop(&mut self) {
        let Some(read_half) = self.read_half.take() else {
            error!(
                peer = %self.neighbor.neighbor_address,
                "no read half to spawn receive loop on"
            );
            return;
        };
        let token = self
            .session_token
            .clone()
            .unwrap_or_else(|| self.token.child_token());

        let task = RecvLoop {
            read_half,
            session: Arc::clone(&self.session),
            policy: Arc::clone(&self.policy),
            incoming_tx: self.incoming_tx.clone(),
            error_tx: self.error_tx.clone(),
            holdtimer_reset_tx: self.holdtimer_reset_tx.clone(),
            token,
            peer_addr: self.neighbor.neighbor_address,
            local_addr: self.neighbor.local_address,
        };
        self.recv_handle = Some(tokio::spawn(task.run()));
    }
}
