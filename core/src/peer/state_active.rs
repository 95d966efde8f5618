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
use crate::log::{info, warn};

impl Fsm {
    /// TTL applied to the session socket: 1 for plain EBGP, the configured
    /// value for EBGP multihop, untouched for IBGP.
    fn session_ttl(&self) -> Option<u32> {
        if !self.neighbor.is_ebgp(&self.global) {
            return None;
        }
        let ttl = if self.neighbor.ebgp_multihop {
            self.neighbor.ebgp_multihop_ttl as u32
        } else {
            1
        };
        (ttl != 0).then_some(ttl)
    }

    /// Active: the connect loop is dialing; attach whatever connection it
    /// lands and move straight to OpenSent (no delayed-open support).
    pub(crate) async fn active(&mut self) -> (Option<FsmState>, FsmStateReason) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    return (None, FsmStateReason::Dying);
                }

                Some(stream) = self.conn_rx.recv() => {
                    if let Some(ttl) = self.session_ttl() {
                        if let Err(e) = stream.set_ttl(ttl) {
                            warn!(
                                peer = %self.neighbor.neighbor_address,
                                error = %e,
                                "failed to set TCP TTL"
                            );
                        }
                    }

                    info!(peer = %self.neighbor.neighbor_address, "connection attached");
                    let (read_half, write_half) = stream.into_split();
                    self.read_half = Some(read_half);
                    self.write_half = Some(write_half);
                    self.session_token = Some(self.token.child_token());
                    return (Some(FsmState::OpenSent), FsmStateReason::None);
                }

                Some(reason) = self.error_rx.recv() => {
                    return (Some(FsmState::Idle), reason);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Neighbor;
    use crate::peer::fsm::tests::{test_fsm, test_global};
    use tokio::net::{TcpListener, TcpStream};

    async fn loopback_pair() -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // Keep the remote end open for the duration of the test.
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            drop(stream);
        });
        TcpStream::connect(addr).await.unwrap()
    }

    #[tokio::test]
    async fn test_active_attaches_connection() {
        let neighbor = Neighbor::new("127.0.0.1".parse().unwrap(), 65002);
        let (mut fsm, wiring) = test_fsm(test_global(65001), neighbor);

        let stream = loopback_pair().await;
        wiring.conn_tx.send(stream).await.unwrap();

        let (next, reason) = fsm.active().await;
        assert_eq!(next, Some(FsmState::OpenSent));
        assert_eq!(reason, FsmStateReason::None);
        assert!(fsm.read_half.is_some());
        assert!(fsm.write_half.is_some());
        assert!(fsm.session_token.is_some());
    }

    #[tokio::test]
    async fn test_session_ttl() {
        // Plain EBGP pins the TTL to 1.
        let neighbor = Neighbor::new("127.0.0.1".parse().unwrap(), 65002);
        let (fsm, _wiring) = test_fsm(test_global(65001), neighbor);
        assert_eq!(fsm.session_ttl(), Some(1));

        // EBGP multihop uses the configured TTL.
        let mut neighbor = Neighbor::new("127.0.0.1".parse().unwrap(), 65002);
        neighbor.ebgp_multihop = true;
        neighbor.ebgp_multihop_ttl = 16;
        let (fsm, _wiring) = test_fsm(test_global(65001), neighbor);
        assert_eq!(fsm.session_ttl(), Some(16));

        // IBGP leaves the socket default alone.
        let neighbor = Neighbor::new("127.0.0.1".parse().unwrap(), 65001);
        let (fsm, _wiring) = test_fsm(test_global(65001), neighbor);
        assert_eq!(fsm.session_ttl(), None);
    }

    #[tokio::test]
    async fn test_active_admin_down() {
        let neighbor = Neighbor::new("127.0.0.1".parse().unwrap(), 65002);
        let (mut fsm, wiring) = test_fsm(test_global(65001), neighbor);

        wiring.admin_tx.send(AdminState::Down).await.unwrap();
        let (next, reason) = fsm.active().await;
        assert_eq!(next, Some(FsmState::Idle));
        assert_eq!(reason, FsmStateReason::AdminDown);
    }

    #[tokio::test]
    async fn test_active_spurious_admin_up_ignored() {
        let neighbor = Neighbor::new("127.0.0.1".parse().unwrap(), 65002);
        let (mut fsm, wiring) = test_fsm(test_global(65001), neighbor);

        // Already up; the FSM logs and keeps waiting, then dies on cancel.
        wiring.admin_tx.send(AdminState::Up).await.unwrap();
        let token = wiring.token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            token.cancel();
        });

        let (next, reason) = fsm.active().await;
        assert_eq!(next, None);
        assert_eq!(reason, FsmStateReason::Dying);
    }
}
