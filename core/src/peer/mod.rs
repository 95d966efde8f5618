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

//! One BGP peer: the FSM driver, its connect loop, and the send/receive
//! activities spawned per TCP session.

use crate::bgp::msg::BgpMessage;
use crate::config::{Global, Neighbor};
use crate::log::debug;
use crate::policy::SharedPolicy;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod connect;
mod fsm;
mod incoming;
mod outgoing;
mod state_active;
mod state_established;
mod state_idle;
mod state_openconfirm;
mod state_opensent;

pub use fsm::{
    AdminState, Fsm, FsmMsg, FsmMsgData, FsmState, FsmStateReason, MessageCounter, Negotiated,
    SessionShared, HOLDTIME_IDLE, HOLDTIME_OPENSENT, MIN_CONNECT_RETRY,
};

/// Handle the owner keeps for one running peer.
pub struct PeerHandle {
    /// Administrative up/down toggle.
    pub admin_tx: mpsc::Sender<AdminState>,
    /// Outbound message queue drained by the send activity.
    pub outgoing_tx: mpsc::Sender<BgpMessage>,
    /// Hand-off for connections the listener accepted on this peer's
    /// behalf. Depth 1; the FSM closes anything it cannot use.
    pub conn_tx: mpsc::Sender<TcpStream>,
    /// Counters and negotiated session state, readable at any time.
    pub session: Arc<SessionShared>,
    /// Cancelling this stops every activity of the peer promptly.
    pub shutdown: CancellationToken,
    /// The driver task; completes once `shutdown` is cancelled.
    pub driver: JoinHandle<()>,
}

impl PeerHandle {
    /// Begin shutdown and wait for the driver to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.driver.await;
    }
}

/// Spawn the FSM driver and connect loop for one configured neighbor.
///
/// `incoming_tx` receives parsed messages with their path lists while the
/// session is established; `state_tx` receives a `StateChange` envelope for
/// every transition.
pub fn spawn(
    global: Arc<Global>,
    neighbor: Neighbor,
    policy: SharedPolicy,
    incoming_tx: mpsc::Sender<FsmMsg>,
    state_tx: mpsc::Sender<FsmMsg>,
) -> PeerHandle {
    let (fsm, wiring) = Fsm::new(global, neighbor.clone(), policy, incoming_tx, state_tx);

    let conn_tx = wiring.conn_tx.clone();
    let dialer = connect::ConnectLoop {
        neighbor,
        session: Arc::clone(&wiring.session),
        conn_tx: wiring.conn_tx,
        activate_rx: wiring.activate_rx,
        token: wiring.token.clone(),
    };
    tokio::spawn(dialer.run());

    debug!(peer = %fsm.neighbor.neighbor_address, "peer spawned");
    let driver = tokio::spawn(fsm.run());

    PeerHandle {
        admin_tx: wiring.admin_tx,
        outgoing_tx: wiring.outgoing_tx,
        conn_tx,
        session: wiring.session,
        shutdown: wiring.token,
        driver,
    }
}
