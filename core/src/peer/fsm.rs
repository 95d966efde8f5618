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

//! The per-peer BGP FSM: states, timers, negotiation, and the driver loop
//! that serializes all state transitions for one peer.

use crate::bgp::msg::{BgpMessage, MessageType};
use crate::bgp::msg_notification::{BgpError, CeaseSubcode, NotificationMessage};
use crate::bgp::msg_open::{
    Capability, CapabilityCode, OpenMessage, OptionalParam, AS_TRANS,
};
use crate::bgp::multiprotocol::AfiSafi;
use crate::bgp::utils::ParserError;
use crate::config::{Global, Neighbor};
use crate::log::{debug, error, info, warn};
use crate::policy::SharedPolicy;
use crate::table::{Path, PeerInfo};
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// RFC 4271 Section 8: "large value" hold time while waiting for the peer's
/// OPEN.
pub const HOLDTIME_OPENSENT: u64 = 240;
/// Idle hold time applied after the first expiry, keeping flapping peers
/// from hammering the network.
pub const HOLDTIME_IDLE: u64 = 5;
/// Floor for the connect-retry ticker.
pub const MIN_CONNECT_RETRY: u64 = 5;

/// Outbound queue depth; one slot per queued message is enough in practice.
pub(crate) const OUTGOING_QUEUE_DEPTH: usize = 8;

/// How long session activities get to stop before we call it a bug.
const SHUTDOWN_WATCHDOG: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum FsmState {
    Idle = 0,
    Active = 1,
    OpenSent = 2,
    OpenConfirm = 3,
    Established = 4,
}

impl FsmState {
    fn from_u8(value: u8) -> FsmState {
        match value {
            1 => FsmState::Active,
            2 => FsmState::OpenSent,
            3 => FsmState::OpenConfirm,
            4 => FsmState::Established,
            _ => FsmState::Idle,
        }
    }
}

impl std::fmt::Display for FsmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FsmState::Idle => "idle",
            FsmState::Active => "active",
            FsmState::OpenSent => "opensent",
            FsmState::OpenConfirm => "openconfirm",
            FsmState::Established => "established",
        };
        write!(f, "{}", s)
    }
}

/// Why the FSM last changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmStateReason {
    None,
    Dying,
    AdminDown,
    ReadFailed,
    WriteFailed,
    NotificationSent,
    NotificationRecv,
    HoldTimerExpired,
    IdleHoldTimerExpired,
    RestartTimerExpired,
    GracefulRestart,
    InvalidMsg,
}

impl std::fmt::Display for FsmStateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FsmStateReason::None => "none",
            FsmStateReason::Dying => "dying",
            FsmStateReason::AdminDown => "admin-down",
            FsmStateReason::ReadFailed => "read-failed",
            FsmStateReason::WriteFailed => "write-failed",
            FsmStateReason::NotificationSent => "notification-sent",
            FsmStateReason::NotificationRecv => "notification-recved",
            FsmStateReason::HoldTimerExpired => "hold-timer-expired",
            FsmStateReason::IdleHoldTimerExpired => "idle-hold-timer-expired",
            FsmStateReason::RestartTimerExpired => "restart-timer-expired",
            FsmStateReason::GracefulRestart => "graceful-restart",
            FsmStateReason::InvalidMsg => "invalid-msg",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminState {
    Up,
    Down,
}

impl std::fmt::Display for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminState::Up => write!(f, "up"),
            AdminState::Down => write!(f, "down"),
        }
    }
}

/// Payload of an [`FsmMsg`].
pub enum FsmMsgData {
    StateChange(FsmState),
    Message(Result<BgpMessage, ParserError>),
}

/// Envelope exchanged between the FSM and its owner.
pub struct FsmMsg {
    pub src: IpAddr,
    pub dst: Option<IpAddr>,
    pub data: FsmMsgData,
    pub path_list: Vec<Path>,
    pub timestamp: Option<SystemTime>,
    /// Raw header+body octets of a received UPDATE, for BMP/MRT duplication.
    pub payload: Option<Vec<u8>>,
}

/// Per-direction message counters, shared across the driver and the send
/// and receive activities.
#[derive(Debug, Default)]
pub struct MessageCounter {
    pub open: AtomicU64,
    pub update: AtomicU64,
    pub keepalive: AtomicU64,
    pub notification: AtomicU64,
    pub refresh: AtomicU64,
    pub discarded: AtomicU64,
    pub total: AtomicU64,
}

impl MessageCounter {
    /// Account one message; `None` lands in the discarded bucket.
    pub fn count(&self, message_type: Option<MessageType>) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let bucket = match message_type {
            Some(MessageType::Open) => &self.open,
            Some(MessageType::Update) => &self.update,
            Some(MessageType::KeepAlive) => &self.keepalive,
            Some(MessageType::Notification) => &self.notification,
            Some(MessageType::RouteRefresh) => &self.refresh,
            None => &self.discarded,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }
}

/// Session parameters fixed at OPEN negotiation.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub hold_time: u64,
    pub keepalive_interval: u64,
    pub four_byte_asn: bool,
    pub rf_map: HashSet<AfiSafi>,
    pub peer_info: Arc<PeerInfo>,
    /// Whether UPDATE validation rejects confederation segments: true for
    /// EBGP sessions outside the local confederation.
    pub confed_check: bool,
}

/// State shared between the driver and the send/receive/connect activities.
#[derive(Debug)]
pub struct SessionShared {
    state: AtomicU8,
    pub sent: MessageCounter,
    pub recv: MessageCounter,
    pub update_recv_time: AtomicI64,
    pub negotiated: RwLock<Option<Negotiated>>,
}

impl SessionShared {
    pub fn new() -> Self {
        SessionShared {
            state: AtomicU8::new(FsmState::Idle as u8),
            sent: MessageCounter::default(),
            recv: MessageCounter::default(),
            update_recv_time: AtomicI64::new(0),
            negotiated: RwLock::new(None),
        }
    }

    pub fn state(&self) -> FsmState {
        FsmState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: FsmState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn negotiated(&self) -> Option<Negotiated> {
        self.negotiated.read().expect("negotiated lock poisoned").clone()
    }
}

impl Default for SessionShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Hold time and keepalive interval negotiation (RFC 4271 4.2/6.2): the
/// smaller hold time wins; the keepalive interval drops to a third of the
/// negotiated hold time when the peer forced it below our configuration.
pub(crate) fn negotiate_timers(
    configured_hold: u64,
    configured_keepalive: u64,
    peer_hold: u64,
) -> (u64, u64) {
    let negotiated = configured_hold.min(peer_hold);
    let keepalive = if negotiated < configured_hold {
        negotiated / 3
    } else {
        configured_keepalive
    };
    (negotiated, keepalive)
}

/// Keepalive ticker for the negotiated timers. `None` when the hold time is
/// zero; the period never goes sub-second.
pub(crate) fn keepalive_ticker(
    negotiated_hold: u64,
    keepalive_interval: u64,
) -> Option<tokio::time::Interval> {
    if negotiated_hold == 0 {
        return None;
    }
    let period = Duration::from_secs(keepalive_interval.max(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    Some(ticker)
}

/// Await the next tick, or forever when no ticker is armed.
pub(crate) async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Group a received OPEN's capabilities by code and intersect its
/// MultiProtocol families with the configured set. A peer advertising no
/// MultiProtocol capability at all gets exactly IPv4 unicast.
pub(crate) fn open2cap(
    open: &OpenMessage,
    configured: &[AfiSafi],
) -> (HashMap<CapabilityCode, Vec<Capability>>, HashSet<AfiSafi>) {
    let mut cap_map: HashMap<CapabilityCode, Vec<Capability>> = HashMap::new();
    let mut received = HashSet::new();
    for cap in open.capabilities() {
        cap_map.entry(cap.code()).or_default().push(cap.clone());
        if let Capability::MultiProtocol(family) = cap {
            received.insert(*family);
        }
    }

    let rf_map = if received.is_empty() {
        [AfiSafi::IPV4_UNICAST].into()
    } else {
        configured
            .iter()
            .copied()
            .filter(|family| received.contains(family))
            .collect()
    };

    (cap_map, rf_map)
}

/// Channel ends handed to the connect loop and the peer's owner.
pub(crate) struct FsmWiring {
    pub admin_tx: mpsc::Sender<AdminState>,
    pub outgoing_tx: mpsc::Sender<BgpMessage>,
    pub conn_tx: mpsc::Sender<TcpStream>,
    pub activate_rx: mpsc::Receiver<()>,
    pub token: CancellationToken,
    pub session: Arc<SessionShared>,
}

/// The per-peer FSM. One instance per configured neighbor; lives for the
/// process lifetime and cycles through states many times.
pub struct Fsm {
    pub(crate) global: Arc<Global>,
    pub(crate) neighbor: Neighbor,
    pub(crate) state: FsmState,
    pub(crate) reason: FsmStateReason,
    pub(crate) idle_hold_time: u64,
    pub(crate) opensent_hold_time: u64,
    pub(crate) admin_state: AdminState,
    pub(crate) admin_rx: mpsc::Receiver<AdminState>,
    pub(crate) conn_rx: mpsc::Receiver<TcpStream>,
    pub(crate) activate_tx: mpsc::Sender<()>,
    pub(crate) session: Arc<SessionShared>,
    pub(crate) policy: SharedPolicy,
    pub(crate) recv_open: Option<OpenMessage>,
    pub(crate) cap_map: HashMap<CapabilityCode, Vec<Capability>>,
    pub(crate) rf_map: HashSet<AfiSafi>,
    pub(crate) peer_info: Arc<PeerInfo>,
    pub(crate) incoming_tx: mpsc::Sender<FsmMsg>,
    pub(crate) state_tx: mpsc::Sender<FsmMsg>,
    pub(crate) outgoing_tx: mpsc::Sender<BgpMessage>,
    pub(crate) outgoing_rx: Arc<Mutex<mpsc::Receiver<BgpMessage>>>,
    pub(crate) error_tx: mpsc::Sender<FsmStateReason>,
    pub(crate) error_rx: mpsc::Receiver<FsmStateReason>,
    pub(crate) holdtimer_reset_tx: mpsc::Sender<()>,
    pub(crate) holdtimer_reset_rx: mpsc::Receiver<()>,
    pub(crate) token: CancellationToken,
    pub(crate) session_token: Option<CancellationToken>,
    pub(crate) write_half: Option<OwnedWriteHalf>,
    pub(crate) read_half: Option<OwnedReadHalf>,
    pub(crate) recv_once_handle: Option<JoinHandle<Option<OwnedReadHalf>>>,
    pub(crate) recv_handle: Option<JoinHandle<()>>,
    pub(crate) send_handle: Option<JoinHandle<()>>,
    pub(crate) negotiated_hold_time: u64,
    pub(crate) keepalive_interval: u64,
    pub(crate) uptime: Option<SystemTime>,
    pub(crate) downtime: Option<SystemTime>,
    pub(crate) established_count: u64,
}

impl Fsm {
    pub(crate) fn new(
        global: Arc<Global>,
        neighbor: Neighbor,
        policy: SharedPolicy,
        incoming_tx: mpsc::Sender<FsmMsg>,
        state_tx: mpsc::Sender<FsmMsg>,
    ) -> (Self, FsmWiring) {
        let (admin_tx, admin_rx) = mpsc::channel(1);
        let (conn_tx, conn_rx) = mpsc::channel(1);
        let (activate_tx, activate_rx) = mpsc::channel(1);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_DEPTH);
        let (error_tx, error_rx) = mpsc::channel(2);
        let (holdtimer_reset_tx, holdtimer_reset_rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let session = Arc::new(SessionShared::new());

        let admin_state = if neighbor.admin_down {
            AdminState::Down
        } else {
            AdminState::Up
        };
        let peer_info = Arc::new(PeerInfo::new(&global, &neighbor));
        let idle_hold_time = neighbor.idle_hold_time;

        let fsm = Fsm {
            global,
            neighbor,
            state: FsmState::Idle,
            reason: FsmStateReason::None,
            idle_hold_time,
            opensent_hold_time: HOLDTIME_OPENSENT,
            admin_state,
            admin_rx,
            conn_rx,
            activate_tx,
            session: Arc::clone(&session),
            policy,
            recv_open: None,
            cap_map: HashMap::new(),
            rf_map: HashSet::new(),
            peer_info,
            incoming_tx,
            state_tx,
            outgoing_tx: outgoing_tx.clone(),
            outgoing_rx: Arc::new(Mutex::new(outgoing_rx)),
            error_tx,
            error_rx,
            holdtimer_reset_tx,
            holdtimer_reset_rx,
            token: token.clone(),
            session_token: None,
            write_half: None,
            read_half: None,
            recv_once_handle: None,
            recv_handle: None,
            send_handle: None,
            negotiated_hold_time: 0,
            keepalive_interval: 0,
            uptime: None,
            downtime: None,
            established_count: 0,
        };

        let wiring = FsmWiring {
            admin_tx,
            outgoing_tx,
            conn_tx,
            activate_rx,
            token,
            session,
        };

        (fsm, wiring)
    }

    /// Drive the FSM until the peer token is cancelled. All transitions are
    /// serialized here; the terminal state event of a session is only
    /// emitted after both session activities have stopped.
    pub(crate) async fn run(mut self) {
        let peer = self.neighbor.neighbor_address;
        debug!(peer = %peer, "starting peer fsm");

        loop {
            let old_state = self.state;
            let (next, reason) = match old_state {
                FsmState::Idle => self.idle().await,
                FsmState::Active => self.active().await,
                FsmState::OpenSent => self.opensent().await,
                FsmState::OpenConfirm => self.openconfirm().await,
                FsmState::Established => self.established().await,
            };
            self.reason = reason;

            // Leaving a session (or dying): stop the send and receive
            // activities before telling anyone about the transition.
            if matches!(next, None | Some(FsmState::Idle)) {
                self.stop_session().await;
            }

            if old_state == FsmState::Established {
                info!(peer = %peer, reason = %self.reason, "Peer Down");
            }

            let Some(next) = next else {
                debug!(peer = %peer, "peer fsm stopped");
                return;
            };

            if next == FsmState::Established && old_state == FsmState::OpenConfirm {
                info!(peer = %peer, "Peer Up");
            }

            self.state_change(next);

            let envelope = self.envelope(FsmMsgData::StateChange(next));
            if self.state_tx.send(envelope).await.is_err() {
                debug!(peer = %peer, "state event channel closed, stopping");
                return;
            }
        }
    }

    /// Apply a state transition: counters, timestamps, and the activate
    /// signal for the connect loop.
    pub(crate) fn state_change(&mut self, next: FsmState) {
        debug!(
            peer = %self.neighbor.neighbor_address,
            old = %self.state,
            new = %next,
            reason = %self.reason,
            "state changed"
        );
        self.state = next;
        self.session.set_state(next);

        match next {
            FsmState::Established => {
                self.uptime = Some(SystemTime::now());
                self.established_count += 1;
            }
            _ => {
                // Downtime is stamped on entry to every non-established
                // state.
                self.downtime = Some(SystemTime::now());
                if next == FsmState::Active && !self.neighbor.passive_mode {
                    let _ = self.activate_tx.try_send(());
                }
            }
        }
    }

    pub(crate) fn envelope(&self, data: FsmMsgData) -> FsmMsg {
        FsmMsg {
            src: self.neighbor.neighbor_address,
            dst: self.neighbor.local_address,
            data,
            path_list: Vec::new(),
            timestamp: None,
            payload: None,
        }
    }

    /// Flip the administrative state; a transition to the state we are
    /// already in is a caller bug, logged and ignored.
    pub(crate) fn change_admin_state(&mut self, state: AdminState) -> Result<(), ()> {
        if self.admin_state == state {
            warn!(
                peer = %self.neighbor.neighbor_address,
                state = %self.state,
                admin_state = %state,
                "ignoring administrative transition to the current state"
            );
            return Err(());
        }

        debug!(
            peer = %self.neighbor.neighbor_address,
            admin_state = %state,
            "admin state changed"
        );
        self.admin_state = state;
        match state {
            AdminState::Up => {
                info!(peer = %self.neighbor.neighbor_address, "Administrative start")
            }
            AdminState::Down => {
                info!(peer = %self.neighbor.neighbor_address, "Administrative shutdown")
            }
        }
        Ok(())
    }

    /// The OPEN we advertise: mandatory Route-Refresh and FourOctetAS
    /// capabilities plus one MultiProtocol capability per configured family.
    /// A local AS above 16 bits goes on the wire as AS_TRANS.
    pub(crate) fn build_open(&self) -> OpenMessage {
        let mut caps = vec![Capability::RouteRefresh];
        for family in &self.neighbor.afi_safis {
            caps.push(Capability::MultiProtocol(*family));
        }
        caps.push(Capability::FourOctetAs(self.global.asn));

        let asn = if self.global.asn > u16::MAX as u32 {
            AS_TRANS
        } else {
            self.global.asn as u16
        };

        OpenMessage::new(
            asn,
            self.neighbor.hold_time as u16,
            u32::from(self.global.router_id),
            vec![OptionalParam::Capabilities(caps)],
        )
    }

    /// Write a message straight on the session socket; used before the send
    /// activity exists (OPEN, KEEPALIVE, NOTIFICATION during handshake).
    pub(crate) async fn send_message_direct(&mut self, msg: &BgpMessage) -> io::Result<()> {
        let write_half = self.write_half.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no session socket")
        })?;
        write_half.write_all(&msg.serialize()).await?;
        self.session.sent.count(Some(msg.message_type()));
        Ok(())
    }

    pub(crate) async fn send_notification_direct(&mut self, notif: NotificationMessage) {
        warn!(
            peer = %self.neighbor.neighbor_address,
            error = ?notif.error(),
            "sending notification"
        );
        if let Err(e) = self
            .send_message_direct(&BgpMessage::Notification(notif))
            .await
        {
            warn!(
                peer = %self.neighbor.neighbor_address,
                error = %e,
                "failed to send notification"
            );
        }
    }

    pub(crate) fn notification(error: BgpError) -> NotificationMessage {
        NotificationMessage::new(error, Vec::new())
    }

    pub(crate) fn cease(subcode: CeaseSubcode) -> NotificationMessage {
        NotificationMessage::new(BgpError::Cease(subcode), Vec::new())
    }

    /// Tear down the session activities: cancel the session scope, reclaim
    /// or drop the socket halves, join both tasks under the watchdog, and
    /// flush single-session channels.
    pub(crate) async fn stop_session(&mut self) {
        if let Some(token) = self.session_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.recv_once_handle.take() {
            match tokio::time::timeout(SHUTDOWN_WATCHDOG, handle).await {
                Ok(_) => {}
                Err(_) => self.watchdog_fired("receive"),
            }
        }
        if let Some(handle) = self.recv_handle.take() {
            if tokio::time::timeout(SHUTDOWN_WATCHDOG, handle).await.is_err() {
                self.watchdog_fired("receive");
            }
        }
        if let Some(handle) = self.send_handle.take() {
            if tokio::time::timeout(SHUTDOWN_WATCHDOG, handle).await.is_err() {
                self.watchdog_fired("send");
            }
        }

        // Closing the socket is the driver's job; dropping the halves here
        // is what closes it.
        self.write_half = None;
        self.read_half = None;

        // Drain session-scoped signals so a stale error cannot leak into the
        // next session.
        while self.error_rx.try_recv().is_ok() {}
        while self.holdtimer_reset_rx.try_recv().is_ok() {}
        *self
            .session
            .negotiated
            .write()
            .expect("negotiated lock poisoned") = None;
    }

    fn watchdog_fired(&self, activity: &str) {
        error!(
            peer = %self.neighbor.neighbor_address,
            activity,
            "session activity failed to stop within 120s, this is a bug"
        );
    }

    /// Reclaim the read half from a finished single-message receive task.
    pub(crate) async fn reclaim_read_half(&mut self) {
        if let Some(handle) = self.recv_once_handle.take() {
            if let Ok(Some(half)) = handle.await {
                self.read_half = Some(half);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::policy::new_shared_policy;
    use std::net::Ipv4Addr;

    pub(crate) fn test_global(asn: u32) -> Arc<Global> {
        Arc::new(Global {
            asn,
            router_id: Ipv4Addr::new(1, 1, 1, 1),
            confederation: None,
        })
    }

    pub(crate) fn test_fsm(global: Arc<Global>, neighbor: Neighbor) -> (Fsm, FsmWiring) {
        let (incoming_tx, _incoming_rx) = mpsc::channel(16);
        let (state_tx, _state_rx) = mpsc::channel(16);
        Fsm::new(global, neighbor, new_shared_policy(), incoming_tx, state_tx)
    }

    #[test]
    fn test_negotiate_timers() {
        // (configured_hold, configured_keepalive, peer_hold,
        //  expected_hold, expected_keepalive)
        let cases = [
            (90, 30, 90, 90, 30),
            (90, 30, 30, 30, 10),  // peer forces hold down -> third
            (30, 10, 90, 30, 10),  // we are the smaller side -> configured
            (240, 80, 120, 120, 40),
            (90, 30, 0, 0, 0),     // zero disables
            (0, 30, 90, 0, 30),    // our zero wins the min; keepalive unused
        ];
        for (hold, keepalive, peer, want_hold, want_keepalive) in cases {
            assert_eq!(
                negotiate_timers(hold, keepalive, peer),
                (want_hold, want_keepalive),
                "hold={} keepalive={} peer={}",
                hold,
                keepalive,
                peer
            );
        }
    }

    #[tokio::test]
    async fn test_keepalive_ticker_disabled_and_clamped() {
        assert!(keepalive_ticker(0, 30).is_none());
        // A zero interval is clamped to one second, never sub-second.
        let ticker = keepalive_ticker(1, 0).unwrap();
        assert_eq!(ticker.period(), Duration::from_secs(1));
        let ticker = keepalive_ticker(90, 30).unwrap();
        assert_eq!(ticker.period(), Duration::from_secs(30));
    }

    #[test]
    fn test_build_open_capabilities() {
        let neighbor = {
            let mut n = Neighbor::new("10.0.0.2".parse().unwrap(), 65002);
            n.afi_safis = vec![AfiSafi::IPV4_UNICAST, AfiSafi::IPV6_UNICAST];
            n.hold_time = 90;
            n
        };
        let (fsm, _wiring) = test_fsm(test_global(65001), neighbor);
        let open = fsm.build_open();

        assert_eq!(open.asn, 65001);
        assert_eq!(open.hold_time, 90);
        let caps: Vec<_> = open.capabilities().collect();
        assert!(caps.contains(&&Capability::RouteRefresh));
        assert!(caps.contains(&&Capability::FourOctetAs(65001)));
        assert!(caps.contains(&&Capability::MultiProtocol(AfiSafi::IPV4_UNICAST)));
        assert!(caps.contains(&&Capability::MultiProtocol(AfiSafi::IPV6_UNICAST)));
    }

    #[test]
    fn test_build_open_as_trans() {
        let neighbor = Neighbor::new("10.0.0.2".parse().unwrap(), 65002);
        let (fsm, _wiring) = test_fsm(test_global(131073), neighbor);
        let open = fsm.build_open();

        assert_eq!(open.asn, AS_TRANS);
        assert!(open
            .capabilities()
            .any(|c| *c == Capability::FourOctetAs(131073)));
    }

    #[test]
    fn test_open2cap_intersection() {
        let received = OpenMessage::new(
            65002,
            90,
            u32::from(Ipv4Addr::new(2, 2, 2, 2)),
            vec![OptionalParam::Capabilities(vec![
                Capability::RouteRefresh,
                Capability::MultiProtocol(AfiSafi::IPV4_UNICAST),
                Capability::MultiProtocol(AfiSafi::IPV6_UNICAST),
                Capability::FourOctetAs(65002),
            ])],
        );

        // Configured for IPv4 only: the intersection drops IPv6.
        let (cap_map, rf_map) = open2cap(&received, &[AfiSafi::IPV4_UNICAST]);
        assert_eq!(rf_map, [AfiSafi::IPV4_UNICAST].into());
        assert_eq!(
            cap_map.get(&CapabilityCode::MultiProtocol).unwrap().len(),
            2,
            "all occurrences preserved in the capability map"
        );
        assert!(cap_map.contains_key(&CapabilityCode::FourOctetAs));
    }

    #[test]
    fn test_open2cap_no_multiprotocol_defaults_to_ipv4() {
        let received = OpenMessage::new(
            65002,
            90,
            u32::from(Ipv4Addr::new(2, 2, 2, 2)),
            vec![OptionalParam::Capabilities(vec![Capability::RouteRefresh])],
        );
        let (_cap_map, rf_map) = open2cap(&received, &[AfiSafi::IPV6_UNICAST]);
        assert_eq!(rf_map, [AfiSafi::IPV4_UNICAST].into());
    }

    #[test]
    fn test_change_admin_state() {
        let neighbor = Neighbor::new("10.0.0.2".parse().unwrap(), 65002);
        let (mut fsm, _wiring) = test_fsm(test_global(65001), neighbor);

        assert_eq!(fsm.admin_state, AdminState::Up);
        // A transition to the current state is ignored, not fatal.
        assert!(fsm.change_admin_state(AdminState::Up).is_err());
        assert!(fsm.change_admin_state(AdminState::Down).is_ok());
        assert_eq!(fsm.admin_state, AdminState::Down);
        assert!(fsm.change_admin_state(AdminState::Down).is_err());
    }

    #[test]
    fn test_state_change_accounting() {
        let neighbor = Neighbor::new("10.0.0.2".parse().unwrap(), 65002);
        let (mut fsm, wiring) = test_fsm(test_global(65001), neighbor);

        fsm.state_change(FsmState::Active);
        assert!(fsm.downtime.is_some());
        assert_eq!(fsm.established_count, 0);
        assert_eq!(wiring.session.state(), FsmState::Active);

        fsm.state = FsmState::OpenConfirm;
        fsm.state_change(FsmState::Established);
        assert!(fsm.uptime.is_some());
        assert_eq!(fsm.established_count, 1);
        assert_eq!(wiring.session.state(), FsmState::Established);
    }

    #[test]
    fn test_state_change_to_active_signals_connect_loop() {
        let neighbor = Neighbor::new("10.0.0.2".parse().unwrap(), 65002);
        let (mut fsm, mut wiring) = test_fsm(test_global(65001), neighbor);

        fsm.state_change(FsmState::Active);
        assert!(wiring.activate_rx.try_recv().is_ok());

        // Passive peers never dial out.
        let mut neighbor = Neighbor::new("10.0.0.3".parse().unwrap(), 65002);
        neighbor.passive_mode = true;
        let (mut fsm, mut wiring) = test_fsm(test_global(65001), neighbor);
        fsm.state_change(FsmState::Active);
        assert!(wiring.activate_rx.try_recv().is_err());
    }

    #[test]
    fn test_reason_display() {
        let cases = [
            (FsmStateReason::Dying, "dying"),
            (FsmStateReason::AdminDown, "admin-down"),
            (FsmStateReason::ReadFailed, "read-failed"),
            (FsmStateReason::WriteFailed, "write-failed"),
            (FsmStateReason::NotificationSent, "notification-sent"),
            (FsmStateReason::NotificationRecv, "notification-recved"),
            (FsmStateReason::HoldTimerExpired, "hold-timer-expired"),
            (
                FsmStateReason::IdleHoldTimerExpired,
                "idle-hold-timer-expired",
            ),
            (
                FsmStateReason::RestartTimerExpired,
                "restart-timer-expired",
            ),
            (FsmStateReason::GracefulRestart, "graceful-restart"),
            (FsmStateReason::InvalidMsg, "invalid-msg"),
        ];
        for (reason, s) in cases {
            assert_eq!(reason.to_string(), s);
        }
    }
}
