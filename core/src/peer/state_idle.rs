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

use super::fsm::{AdminState, Fsm, FsmState, FsmStateReason, HOLDTIME_IDLE};
use crate::log::{debug, warn};
use std::time::Duration;

impl Fsm {
    /// Idle: wait out the idle-hold timer, refuse stray connections, follow
    /// administrative toggles.
    pub(crate) async fn idle(&mut self) -> (Option<FsmState>, FsmStateReason) {
        let idle_hold = tokio::time::sleep(Duration::from_secs(self.idle_hold_time));
        tokio::pin!(idle_hold);
        let mut armed = true;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    return (None, FsmStateReason::Dying);
                }

                Some(conn) = self.conn_rx.recv() => {
                    // RFC 4271 8.2.2: no connections are accepted in Idle.
                    drop(conn);
                    warn!(
                        peer = %self.neighbor.neighbor_address,
                        "closed an accepted connection"
                    );
                }

                _ = &mut idle_hold, if armed => {
                    if self.admin_state == AdminState::Up {
                        debug!(
                            peer = %self.neighbor.neighbor_address,
                            duration = self.idle_hold_time,
                            "idle hold timer expired"
                        );
                        self.idle_hold_time = HOLDTIME_IDLE;
                        return (Some(FsmState::Active), FsmStateReason::IdleHoldTimerExpired);
                    }
                    debug!(
                        peer = %self.neighbor.neighbor_address,
                        "idle hold timer expired, staying idle while admin is down"
                    );
                    armed = false;
                }

                Some(state) = self.admin_rx.recv() => {
                    if self.change_admin_state(state).is_ok() {
                        match state {
                            AdminState::Down => armed = false,
                            AdminState::Up => {
                                idle_hold.as_mut().reset(
                                    tokio::time::Instant::now()
                                        + Duration::from_secs(self.idle_hold_time),
                                );
                                armed = true;
                            }
                        }
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

    fn neighbor() -> Neighbor {
        let mut n = Neighbor::new("127.0.0.1".parse().unwrap(), 65002);
        n.idle_hold_time = 0;
        n
    }

    #[tokio::test]
    async fn test_idle_hold_expiry_moves_to_active() {
        let (mut fsm, _wiring) = test_fsm(test_global(65001), neighbor());
        let (next, reason) = fsm.idle().await;
        assert_eq!(next, Some(FsmState::Active));
        assert_eq!(reason, FsmStateReason::IdleHoldTimerExpired);
        // The idle hold time collapses after the first expiry.
        assert_eq!(fsm.idle_hold_time, HOLDTIME_IDLE);
    }

    #[tokio::test]
    async fn test_idle_stays_down_until_admin_up() {
        let mut n = neighbor();
        n.admin_down = true;
        let (mut fsm, wiring) = test_fsm(test_global(65001), n);

        let admin_tx = wiring.admin_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            admin_tx.send(AdminState::Up).await.unwrap();
        });

        let (next, reason) = fsm.idle().await;
        assert_eq!(next, Some(FsmState::Active));
        assert_eq!(reason, FsmStateReason::IdleHoldTimerExpired);
    }

    #[tokio::test]
    async fn test_idle_closes_unexpected_connection() {
        let mut n = neighbor();
        n.idle_hold_time = 1;
        let (mut fsm, wiring) = test_fsm(test_global(65001), n);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await });

        let stream = TcpStream::connect(addr).await.unwrap();
        wiring.conn_tx.send(stream).await.unwrap();

        // The FSM drops the connection and later leaves on the idle hold
        // timer; the accepted side observes EOF.
        let (next, _) = fsm.idle().await;
        assert_eq!(next, Some(FsmState::Active));

        use tokio::io::AsyncReadExt;
        let (mut accepted, _) = accept.await.unwrap().unwrap();
        let mut buf = [0u8; 1];
        let read = accepted.read(&mut buf).await.unwrap();
        assert_eq!(read, 0, "expected EOF after the FSM closed the socket");
    }

    #[tokio::test]
    async fn test_idle_dying() {
        let (mut fsm, wiring) = test_fsm(test_global(65001), {
            let mut n = neighbor();
            n.idle_hold_time = 60;
            n
        });
        wiring.token.cancel();
        let (next, reason) = fsm.idle().await;
        assert_eq!(next, None);
        assert_eq!(reason, FsmStateReason::Dying);
    }
}
