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

use super::fsm::{next_tick, FsmState, SessionShared, MIN_CONNECT_RETRY};
use crate::config::Neighbor;
use crate::log::debug;
use crate::net::dial_peer;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Effective retry-ticker period.
pub(crate) fn retry_tick_secs(configured: u64) -> u64 {
    configured.max(MIN_CONNECT_RETRY)
}

/// Random delay before the first dial after activation, uniform in
/// `[tick, 2·tick)`. Spreads simultaneous-open storms across peers.
pub(crate) fn jitter_delay(tick: u64) -> Duration {
    Duration::from_secs(rand::thread_rng().gen_range(tick..tick * 2))
}

/// The active dialer: one per peer, running for the peer's lifetime. It
/// only dials while the FSM sits in Active, and hands connections off
/// best-effort through the 1-slot channel.
pub(crate) struct ConnectLoop {
    pub neighbor: Neighbor,
    pub session: Arc<SessionShared>,
    pub conn_tx: mpsc::Sender<TcpStream>,
    pub activate_rx: mpsc::Receiver<()>,
    pub token: CancellationToken,
}

impl ConnectLoop {
    pub(crate) async fn run(mut self) {
        let tick = retry_tick_secs(self.neighbor.connect_retry);
        let mut ticker: Option<tokio::time::Interval> = None;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    debug!(peer = %self.neighbor.neighbor_address, "stop connect loop");
                    return;
                }

                _ = next_tick(&mut ticker) => {
                    self.connect(tick).await;
                }

                Some(_) = self.activate_rx.recv() => {
                    let delay = jitter_delay(tick);
                    debug!(
                        peer = %self.neighbor.neighbor_address,
                        delay_secs = delay.as_secs(),
                        "activated, dialing after jitter"
                    );
                    tokio::select! {
                        _ = self.token.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    self.connect(tick).await;
                    let period = Duration::from_secs(tick);
                    ticker = Some(tokio::time::interval_at(
                        tokio::time::Instant::now() + period,
                        period,
                    ));
                }
            }
        }
    }

    async fn connect(&self, tick: u64) {
        if self.session.state() != FsmState::Active {
            return;
        }

        let remote = SocketAddr::new(self.neighbor.neighbor_address, self.neighbor.port);
        let local = self
            .neighbor
            .local_address
            .map(|ip| SocketAddr::new(ip, 0));
        let timeout = Duration::from_secs(tick.saturating_sub(1).max(1));

        match dial_peer(local, remote, timeout).await {
            Ok(stream) => {
                // Best effort: if the FSM left Active meanwhile and is not
                // draining, drop the connection rather than block.
                if self.conn_tx.try_send(stream).is_err() {
                    debug!(
                        peer = %self.neighbor.neighbor_address,
                        "fsm not draining, dropping dialed connection"
                    );
                }
            }
            Err(e) => {
                debug!(
                    peer = %self.neighbor.neighbor_address,
                    error = %e,
                    "failed to connect"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_tick_clamped_to_minimum() {
        assert_eq!(retry_tick_secs(0), MIN_CONNECT_RETRY);
        assert_eq!(retry_tick_secs(3), MIN_CONNECT_RETRY);
        assert_eq!(retry_tick_secs(5), 5);
        assert_eq!(retry_tick_secs(120), 120);
    }

    #[test]
    fn test_jitter_delay_range() {
        for _ in 0..200 {
            let delay = jitter_delay(5).as_secs();
            assert!((5..10).contains(&delay), "delay {} out of [5, 10)", delay);
        }
        for _ in 0..200 {
            let delay = jitter_delay(30).as_secs();
            assert!((30..60).contains(&delay), "delay {} out of [30, 60)", delay);
        }
    }
}
