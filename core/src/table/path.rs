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

use crate::bgp::msg_update::{
    attr_type_code, AsPath, AsSegment, AsSegmentType, PathAttrValue, PathAttribute,
};
use crate::bgp::multiprotocol::AfiSafi;
use crate::bgp::utils::IpNetwork;
use crate::config::{Global, Neighbor};
use crate::log::error;
use crate::policy::PolicyDirection;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

/// Fixed-size bit set used to deduplicate attribute types during the
/// parent-chain walk.
struct Bitmap(Vec<u64>);

impl Bitmap {
    fn new(size: usize) -> Self {
        Bitmap(vec![0; (size + 63) / 64])
    }

    fn flag(&mut self, i: u8) {
        self.0[i as usize / 64] |= 1 << (i as usize % 64);
    }

    fn get(&self, i: u8) -> bool {
        self.0[i as usize / 64] & (1 << (i as usize % 64)) != 0
    }
}

/// RPKI origin-validation verdict attached to a path at creation. The
/// validation service itself is an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpkiValidation {
    None,
    NotFound,
    Valid,
    Invalid,
}

/// Identity of the session a path was learned over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub local_as: u32,
    pub peer_as: u32,
    /// Local router-id.
    pub local_id: std::net::Ipv4Addr,
    /// Peer router-id, learned from its OPEN.
    pub id: std::net::Ipv4Addr,
    /// Peer address; `None` marks a locally originated path.
    pub address: Option<IpAddr>,
    pub local_address: Option<IpAddr>,
}

impl PeerInfo {
    pub fn new(global: &Global, neighbor: &Neighbor) -> Self {
        PeerInfo {
            local_as: global.asn,
            peer_as: neighbor.peer_as,
            local_id: global.router_id,
            id: std::net::Ipv4Addr::UNSPECIFIED,
            address: Some(neighbor.neighbor_address),
            local_address: neighbor.local_address,
        }
    }

    /// Identity for locally originated paths.
    pub fn local(local_as: u32, router_id: std::net::Ipv4Addr) -> Self {
        PeerInfo {
            local_as,
            peer_as: local_as,
            local_id: router_id,
            id: router_id,
            address: None,
            local_address: None,
        }
    }

    pub fn is_ebgp(&self) -> bool {
        self.address.is_some() && self.peer_as != self.local_as
    }

    pub fn is_ibgp(&self) -> bool {
        self.address.is_some() && self.peer_as == self.local_as
    }

    pub fn is_confed_member(&self, global: &Global) -> bool {
        global.is_confed_member(self.peer_as)
    }
}

/// Identity fields owned by the root of a path's clone chain.
#[derive(Debug, Clone)]
pub struct OriginInfo {
    pub nlri: IpNetwork,
    pub source: Arc<PeerInfo>,
    pub timestamp: SystemTime,
    pub no_implicit_withdraw: bool,
    pub validation: RpkiValidation,
    pub is_from_zebra: bool,
    pub uuid: Option<Vec<u8>>,
}

impl OriginInfo {
    pub fn new(
        source: Arc<PeerInfo>,
        nlri: IpNetwork,
        timestamp: SystemTime,
        no_implicit_withdraw: bool,
    ) -> Self {
        OriginInfo {
            nlri,
            source,
            timestamp,
            no_implicit_withdraw,
            validation: RpkiValidation::None,
            is_from_zebra: false,
            uuid: None,
        }
    }
}

/// One NLRI advertisement with copy-on-write attribute overlay.
///
/// A clone links to its parent and starts with an empty overlay; attribute
/// reads walk child-to-root with nearest-wins semantics, honouring each
/// node's delete set. All nodes of a chain share the root's [`OriginInfo`].
pub struct Path {
    info: Arc<OriginInfo>,
    pub is_withdraw: bool,
    attrs: Vec<PathAttribute>,
    dels: Vec<u8>,
    parent: Option<Arc<Path>>,
    filtered: HashMap<String, PolicyDirection>,
}

impl Path {
    /// Create a root path. A non-withdraw path must carry attributes;
    /// refusing that here keeps the invariant out of every consumer.
    pub fn new(
        source: Arc<PeerInfo>,
        nlri: IpNetwork,
        is_withdraw: bool,
        attrs: Option<Vec<PathAttribute>>,
        timestamp: SystemTime,
        no_implicit_withdraw: bool,
    ) -> Option<Self> {
        Self::from_origin(
            OriginInfo::new(source, nlri, timestamp, no_implicit_withdraw),
            is_withdraw,
            attrs,
        )
    }

    pub fn from_origin(
        info: OriginInfo,
        is_withdraw: bool,
        attrs: Option<Vec<PathAttribute>>,
    ) -> Option<Self> {
        let attrs = match attrs {
            Some(attrs) => attrs,
            None if is_withdraw => Vec::new(),
            None => {
                error!(nlri = %info.nlri, "attributes required for a path that is not a withdraw");
                return None;
            }
        };
        Some(Path {
            info: Arc::new(info),
            is_withdraw,
            attrs,
            dels: Vec::new(),
            parent: None,
            filtered: HashMap::new(),
        })
    }

    /// Clone into a child with an empty overlay. Mutating the child never
    /// affects the parent or any sibling.
    pub fn clone_path(this: &Arc<Path>, is_withdraw: bool) -> Path {
        Path {
            info: Arc::clone(&this.info),
            is_withdraw,
            attrs: Vec::new(),
            dels: Vec::new(),
            parent: Some(Arc::clone(this)),
            filtered: HashMap::new(),
        }
    }

    pub fn origin_info(&self) -> &OriginInfo {
        &self.info
    }

    pub fn nlri(&self) -> &IpNetwork {
        &self.info.nlri
    }

    pub fn source(&self) -> &Arc<PeerInfo> {
        &self.info.source
    }

    pub fn timestamp(&self) -> SystemTime {
        self.info.timestamp
    }

    pub fn no_implicit_withdraw(&self) -> bool {
        self.info.no_implicit_withdraw
    }

    pub fn validation(&self) -> RpkiValidation {
        self.info.validation
    }

    pub fn is_from_zebra(&self) -> bool {
        self.info.is_from_zebra
    }

    pub fn uuid(&self) -> Option<&[u8]> {
        self.info.uuid.as_deref()
    }

    /// Textual NLRI, the path's table key.
    pub fn key(&self) -> String {
        self.info.nlri.to_string()
    }

    pub fn route_family(&self) -> AfiSafi {
        self.info.nlri.family()
    }

    pub fn is_local(&self) -> bool {
        self.info.source.address.is_none()
    }

    pub fn is_ibgp(&self) -> bool {
        self.info.source.peer_as == self.info.source.local_as
    }

    pub fn filter(&mut self, peer_id: &str, direction: PolicyDirection) {
        self.filtered.insert(peer_id.to_string(), direction);
    }

    pub fn filtered(&self, peer_id: &str) -> Option<PolicyDirection> {
        self.filtered.get(peer_id).copied()
    }

    /// Effective attribute list: child-to-root walk, one entry per type,
    /// nearest child wins, deletes shadow ancestors.
    pub fn get_attrs(&self) -> Vec<&PathAttribute> {
        let mut seen = Bitmap::new(256);
        let mut list = Vec::new();
        let mut node: &Path = self;
        loop {
            for t in &node.dels {
                seen.flag(*t);
            }
            for attr in &node.attrs {
                let type_code = attr.type_code();
                if !seen.get(type_code) {
                    list.push(attr);
                    seen.flag(type_code);
                }
            }
            match &node.parent {
                Some(parent) => node = parent,
                None => return list,
            }
        }
    }

    pub fn get_attr(&self, type_code: u8) -> Option<&PathAttribute> {
        let mut node: &Path = self;
        loop {
            if node.dels.contains(&type_code) {
                return None;
            }
            if let Some(attr) = node.attrs.iter().find(|a| a.type_code() == type_code) {
                return Some(attr);
            }
            match &node.parent {
                Some(parent) => node = parent,
                None => return None,
            }
        }
    }

    /// Replace the same-type entry on this node, or append.
    pub fn set_attr(&mut self, attr: PathAttribute) {
        let type_code = attr.type_code();
        match self.attrs.iter_mut().find(|a| a.type_code() == type_code) {
            Some(existing) => *existing = attr,
            None => self.attrs.push(attr),
        }
    }

    /// Record a delete on this node; parents are never touched.
    pub fn del_attr(&mut self, type_code: u8) {
        self.dels.push(type_code);
    }

    pub fn get_as_path(&self) -> Option<&AsPath> {
        match self.get_attr(attr_type_code::AS_PATH).map(|a| &a.value) {
            Some(PathAttrValue::AsPath(as_path)) => Some(as_path),
            _ => None,
        }
    }

    /// AS_PATH length per RFC 4271 9.1.2.2.
    pub fn as_path_len(&self) -> usize {
        self.get_as_path()
            .map(|p| p.segments.iter().map(|s| s.as_len()).sum())
            .unwrap_or(0)
    }

    /// ASNs appearing in SEQUENCE segments, left to right.
    pub fn as_seq_list(&self) -> Vec<u32> {
        let mut list = Vec::new();
        if let Some(as_path) = self.get_as_path() {
            for segment in &as_path.segments {
                if segment.segment_type == AsSegmentType::AsSequence {
                    list.extend_from_slice(&segment.asn_list);
                }
            }
        }
        list
    }

    pub fn get_nexthop(&self) -> Option<IpAddr> {
        if let Some(attr) = self.get_attr(attr_type_code::NEXT_HOP) {
            if let PathAttrValue::NextHop(addr) = &attr.value {
                return Some(IpAddr::V4(*addr));
            }
        }
        if let Some(attr) = self.get_attr(attr_type_code::MP_REACH_NLRI) {
            if let PathAttrValue::MpReachNlri { next_hop, .. } = &attr.value {
                return Some(*next_hop);
            }
        }
        None
    }

    /// Rewrite the next hop on whichever carrier attribute is present
    /// (NEXT_HOP and/or MP_REACH_NLRI).
    pub fn set_nexthop(&mut self, next_hop: IpAddr) {
        if self.get_attr(attr_type_code::NEXT_HOP).is_some() {
            if let IpAddr::V4(v4) = next_hop {
                self.set_attr(PathAttribute::new(PathAttrValue::NextHop(v4)));
            }
        }
        let mp_reach = match self
            .get_attr(attr_type_code::MP_REACH_NLRI)
            .map(|a| &a.value)
        {
            Some(PathAttrValue::MpReachNlri { family, nlris, .. }) => {
                Some((*family, nlris.clone()))
            }
            _ => None,
        };
        if let Some((family, nlris)) = mp_reach {
            self.set_attr(PathAttribute::new(PathAttrValue::MpReachNlri {
                family,
                next_hop,
                nlris,
            }));
        }
    }

    /// Prepend `asn` `repeat` times (RFC 4271 5.1.2): extend the leading
    /// SEQUENCE up to 255 ASes, then spill into a new leading SEQUENCE.
    /// `prepend_asn(0, 0)` attaches an empty AS_PATH if none exists.
    pub fn prepend_asn(&mut self, asn: u32, repeat: u8) {
        let mut asns = vec![asn; repeat as usize];

        let (mut segments, four_byte) = match self.get_as_path() {
            Some(as_path) => (as_path.segments.clone(), as_path.four_byte),
            None => (Vec::new(), true),
        };

        if let Some(first) = segments.first_mut() {
            if first.segment_type == AsSegmentType::AsSequence {
                let room = 255usize.saturating_sub(first.asn_list.len());
                let take = room.min(asns.len());
                let mut merged = asns.split_off(asns.len() - take);
                merged.extend_from_slice(&first.asn_list);
                first.asn_list = merged;
            }
        }

        if !asns.is_empty() {
            segments.insert(0, AsSegment::sequence(asns));
        }

        self.set_attr(PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
            segments, four_byte,
        ))));
    }

    pub fn get_communities(&self) -> Vec<u32> {
        match self.get_attr(attr_type_code::COMMUNITIES).map(|a| &a.value) {
            Some(PathAttrValue::Communities(communities)) => communities.clone(),
            _ => Vec::new(),
        }
    }

    /// Add or replace communities. Replacing with an empty list clears the
    /// attribute.
    pub fn set_communities(&mut self, communities: &[u32], replace: bool) {
        if communities.is_empty() && replace {
            self.del_attr(attr_type_code::COMMUNITIES);
            return;
        }
        let new_list = if replace {
            communities.to_vec()
        } else {
            let mut list = self.get_communities();
            list.extend_from_slice(communities);
            list
        };
        self.set_attr(PathAttribute::new(PathAttrValue::Communities(new_list)));
    }

    /// Remove specific communities; removing the last one drops the
    /// attribute. Returns how many were removed.
    pub fn remove_communities(&mut self, communities: &[u32]) -> usize {
        if communities.is_empty() {
            return 0;
        }
        let current = self.get_communities();
        if current.is_empty() {
            return 0;
        }
        let (removed, kept): (Vec<u32>, Vec<u32>) =
            current.iter().partition(|c| communities.contains(c));
        if kept.is_empty() {
            self.del_attr(attr_type_code::COMMUNITIES);
        } else {
            self.set_attr(PathAttribute::new(PathAttrValue::Communities(kept)));
        }
        removed.len()
    }

    pub fn get_med(&self) -> Option<u32> {
        match self
            .get_attr(attr_type_code::MULTI_EXIT_DISC)
            .map(|a| &a.value)
        {
            Some(PathAttrValue::MultiExitDisc(med)) => Some(*med),
            _ => None,
        }
    }

    /// Replace MED, or adjust it by a signed delta.
    pub fn set_med(&mut self, med: i64, replace: bool) -> Result<(), String> {
        let new_med = if replace {
            u32::try_from(med).map_err(|_| "med value out of range".to_string())?
        } else {
            let current = self.get_med().unwrap_or(0) as i64;
            u32::try_from(current + med).map_err(|_| "med value out of range".to_string())?
        };
        self.set_attr(PathAttribute::new(PathAttrValue::MultiExitDisc(new_med)));
        Ok(())
    }

    pub fn get_local_pref(&self) -> Option<u32> {
        match self.get_attr(attr_type_code::LOCAL_PREF).map(|a| &a.value) {
            Some(PathAttrValue::LocalPref(pref)) => Some(*pref),
            _ => None,
        }
    }

    pub fn get_originator_id(&self) -> Option<std::net::Ipv4Addr> {
        match self
            .get_attr(attr_type_code::ORIGINATOR_ID)
            .map(|a| &a.value)
        {
            Some(PathAttrValue::OriginatorId(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn get_cluster_list(&self) -> Vec<std::net::Ipv4Addr> {
        match self.get_attr(attr_type_code::CLUSTER_LIST).map(|a| &a.value) {
            Some(PathAttrValue::ClusterList(ids)) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// Policy-independent egress rewrites for one peer (RFC 4271 5.1.2/5.1.3,
    /// RFC 4456). Route-server clients see the path untouched.
    pub fn update_for_peer(&mut self, global: &Global, peer: &Neighbor) {
        use attr_type_code::{AS_PATH, LOCAL_PREF, MULTI_EXIT_DISC, ORIGINATOR_ID};

        if peer.route_server_client {
            return;
        }

        if peer.is_ebgp(global) {
            if let Some(local) = peer.local_address {
                self.set_nexthop(local);
            }

            self.prepend_asn(global.asn, 1);

            if self.get_attr(MULTI_EXIT_DISC).is_some() && !self.is_local() {
                self.del_attr(MULTI_EXIT_DISC);
            }

            if self.get_attr(LOCAL_PREF).is_some() && !global.is_confed_member(peer.peer_as) {
                self.del_attr(LOCAL_PREF);
            }
        } else {
            // If the path was generated locally and the next hop is still
            // unspecified, point it at the local address; otherwise leave it.
            if self.is_local() {
                let unspecified = match self.get_nexthop() {
                    Some(IpAddr::V4(v4)) => v4.is_unspecified(),
                    Some(IpAddr::V6(v6)) => v6.is_unspecified(),
                    None => false,
                };
                if unspecified {
                    if let Some(local) = peer.local_address {
                        self.set_nexthop(local);
                    }
                }
            }

            // IBGP requires an AS_PATH attribute even if empty.
            if self.get_attr(AS_PATH).is_none() {
                self.prepend_asn(0, 0);
            }

            if self.get_attr(LOCAL_PREF).is_none() || !self.is_local() {
                self.set_attr(PathAttribute::new(PathAttrValue::LocalPref(100)));
            }

            // RFC 4456 8: reflection towards a client stamps ORIGINATOR_ID
            // and prepends the cluster id to CLUSTER_LIST.
            if peer.route_reflector_client {
                if self.get_attr(ORIGINATOR_ID).is_none() {
                    let originator = self.info.source.id;
                    self.set_attr(PathAttribute::new(PathAttrValue::OriginatorId(originator)));
                }
                let cluster_id = peer
                    .route_reflector_cluster_id
                    .unwrap_or(global.router_id);
                let mut cluster_list = vec![cluster_id];
                cluster_list.extend(self.get_cluster_list());
                self.set_attr(PathAttribute::new(PathAttrValue::ClusterList(cluster_list)));
            }
        }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("nlri", &self.key())
            .field("is_withdraw", &self.is_withdraw)
            .field("attrs", &self.get_attrs())
            .finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ {} | src: ", self.key())?;
        match self.info.source.address {
            Some(addr) => write!(f, "{}", addr)?,
            None => write!(f, "local")?,
        }
        if let Some(next_hop) = self.get_nexthop() {
            write!(f, ", nh: {}", next_hop)?;
        }
        if self.is_withdraw {
            write!(f, ", withdraw")?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::msg_update::Origin;
    use std::net::Ipv4Addr;

    fn ebgp_source() -> Arc<PeerInfo> {
        Arc::new(PeerInfo {
            local_as: 65001,
            peer_as: 65002,
            local_id: Ipv4Addr::new(1, 1, 1, 1),
            id: Ipv4Addr::new(2, 2, 2, 2),
            address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            local_address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
        })
    }

    fn local_source() -> Arc<PeerInfo> {
        Arc::new(PeerInfo::local(65001, Ipv4Addr::new(1, 1, 1, 1)))
    }

    fn base_attrs() -> Vec<PathAttribute> {
        vec![
            PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
            PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
                vec![AsSegment::sequence(vec![65002, 65010])],
                true,
            ))),
            PathAttribute::new(PathAttrValue::NextHop(Ipv4Addr::new(10, 0, 0, 2))),
        ]
    }

    fn make_path(source: Arc<PeerInfo>, attrs: Vec<PathAttribute>) -> Path {
        Path::new(
            source,
            IpNetwork::v4(Ipv4Addr::new(192, 0, 2, 0), 24),
            false,
            Some(attrs),
            SystemTime::now(),
            false,
        )
        .unwrap()
    }

    fn test_global() -> Global {
        Global {
            asn: 65001,
            router_id: Ipv4Addr::new(1, 1, 1, 1),
            confederation: None,
        }
    }

    #[test]
    fn test_new_refuses_announce_without_attrs() {
        let path = Path::new(
            ebgp_source(),
            IpNetwork::v4(Ipv4Addr::new(192, 0, 2, 0), 24),
            false,
            None,
            SystemTime::now(),
            false,
        );
        assert!(path.is_none());

        // Withdraws carry no attributes.
        let withdraw = Path::new(
            ebgp_source(),
            IpNetwork::v4(Ipv4Addr::new(192, 0, 2, 0), 24),
            true,
            None,
            SystemTime::now(),
            false,
        );
        assert!(withdraw.is_some());
    }

    #[test]
    fn test_clone_shares_origin_and_isolates_attrs() {
        let root = Arc::new(make_path(ebgp_source(), base_attrs()));
        let mut child = Path::clone_path(&root, false);

        assert_eq!(child.key(), root.key());
        assert_eq!(child.source().peer_as, 65002);

        // Child override is invisible to the root and to siblings.
        child.set_attr(PathAttribute::new(PathAttrValue::NextHop(Ipv4Addr::new(
            172, 16, 0, 1,
        ))));
        let sibling = Path::clone_path(&root, false);
        assert_eq!(
            child.get_nexthop(),
            Some(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1)))
        );
        assert_eq!(
            sibling.get_nexthop(),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
        );
        assert_eq!(
            root.get_nexthop(),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
        );
    }

    #[test]
    fn test_del_attr_shadows_parent() {
        let root = Arc::new(make_path(ebgp_source(), {
            let mut attrs = base_attrs();
            attrs.push(PathAttribute::new(PathAttrValue::MultiExitDisc(50)));
            attrs
        }));
        let mut child = Path::clone_path(&root, false);

        child.del_attr(attr_type_code::MULTI_EXIT_DISC);
        assert_eq!(child.get_med(), None);
        assert_eq!(root.get_med(), Some(50));

        // The delete also keeps the type out of the full walk.
        let types: Vec<u8> = child.get_attrs().iter().map(|a| a.type_code()).collect();
        assert!(!types.contains(&attr_type_code::MULTI_EXIT_DISC));
        assert_eq!(types.len(), 3);
    }

    #[test]
    fn test_get_attrs_nearest_wins_once_per_type() {
        let root = Arc::new(make_path(ebgp_source(), base_attrs()));
        let mut child = Path::clone_path(&root, false);
        child.set_attr(PathAttribute::new(PathAttrValue::Origin(Origin::Egp)));
        let grandchild = Path::clone_path(&Arc::new(child), false);

        let attrs = grandchild.get_attrs();
        let origins: Vec<_> = attrs
            .iter()
            .filter(|a| a.type_code() == attr_type_code::ORIGIN)
            .collect();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].value, PathAttrValue::Origin(Origin::Egp));
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn test_prepend_asn_basic() {
        let mut path = make_path(ebgp_source(), base_attrs());
        path.prepend_asn(65001, 1);
        assert_eq!(path.as_seq_list(), vec![65001, 65002, 65010]);
    }

    #[test]
    fn test_prepend_asn_spills_past_255() {
        let attrs = vec![
            PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
            PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
                vec![AsSegment::sequence(vec![65002; 254])],
                true,
            ))),
            PathAttribute::new(PathAttrValue::NextHop(Ipv4Addr::new(10, 0, 0, 2))),
        ];
        let mut path = make_path(ebgp_source(), attrs);
        path.prepend_asn(65001, 3);

        let as_path = path.get_as_path().unwrap();
        assert_eq!(as_path.segments.len(), 2);
        // One AS fits in the old leading segment, two spill into a new one.
        assert_eq!(as_path.segments[0].asn_list, vec![65001, 65001]);
        assert_eq!(as_path.segments[1].asn_list.len(), 255);
        assert_eq!(as_path.segments[1].asn_list[0], 65001);
    }

    #[test]
    fn test_prepend_asn_onto_set_creates_sequence() {
        let attrs = vec![
            PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
            PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
                vec![AsSegment {
                    segment_type: AsSegmentType::AsSet,
                    asn_list: vec![65002, 65003],
                }],
                true,
            ))),
            PathAttribute::new(PathAttrValue::NextHop(Ipv4Addr::new(10, 0, 0, 2))),
        ];
        let mut path = make_path(ebgp_source(), attrs);
        path.prepend_asn(65001, 2);

        let as_path = path.get_as_path().unwrap();
        assert_eq!(as_path.segments.len(), 2);
        assert_eq!(as_path.segments[0].segment_type, AsSegmentType::AsSequence);
        assert_eq!(as_path.segments[0].asn_list, vec![65001, 65001]);
        assert_eq!(as_path.segments[1].segment_type, AsSegmentType::AsSet);
    }

    #[test]
    fn test_prepend_asn_empty_creates_empty_as_path() {
        let mut path = Path::new(
            local_source(),
            IpNetwork::v4(Ipv4Addr::new(192, 0, 2, 0), 24),
            false,
            Some(vec![PathAttribute::new(PathAttrValue::Origin(Origin::Igp))]),
            SystemTime::now(),
            false,
        )
        .unwrap();
        assert!(path.get_as_path().is_none());

        path.prepend_asn(0, 0);
        let as_path = path.get_as_path().unwrap();
        assert!(as_path.segments.is_empty());
    }

    #[test]
    fn test_update_for_peer_ebgp() {
        let global = test_global();
        let peer = {
            let mut n = Neighbor::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 65002);
            n.local_address = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
            n
        };

        // Received path with MED and LOCAL_PREF.
        let mut attrs = base_attrs();
        attrs.push(PathAttribute::new(PathAttrValue::MultiExitDisc(20)));
        attrs.push(PathAttribute::new(PathAttrValue::LocalPref(200)));
        let before_len = {
            let p = make_path(ebgp_source(), attrs.clone());
            p.as_path_len()
        };

        let root = Arc::new(make_path(ebgp_source(), attrs));
        let mut out = Path::clone_path(&root, false);
        out.update_for_peer(&global, &peer);

        assert_eq!(
            out.get_nexthop(),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
        );
        assert_eq!(out.as_seq_list()[0], 65001);
        assert_eq!(out.as_path_len(), before_len + 1);
        assert_eq!(out.get_med(), None, "MED dropped for non-local paths");
        assert_eq!(out.get_local_pref(), None, "LOCAL_PREF dropped on EBGP");

        // The root is untouched.
        assert_eq!(root.get_med(), Some(20));
    }

    #[test]
    fn test_update_for_peer_ebgp_keeps_local_med() {
        let global = test_global();
        let peer = Neighbor::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 65002);

        let mut attrs = base_attrs();
        attrs.push(PathAttribute::new(PathAttrValue::MultiExitDisc(20)));
        let root = Arc::new(make_path(local_source(), attrs));
        let mut out = Path::clone_path(&root, false);
        out.update_for_peer(&global, &peer);

        assert_eq!(out.get_med(), Some(20));
    }

    #[test]
    fn test_update_for_peer_ibgp_local_pref() {
        let global = test_global();
        let peer = Neighbor::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)), 65001);

        // Non-local path: LOCAL_PREF reset to the default 100.
        let mut attrs = base_attrs();
        attrs.push(PathAttribute::new(PathAttrValue::LocalPref(300)));
        let root = Arc::new(make_path(ebgp_source(), attrs));
        let mut out = Path::clone_path(&root, false);
        out.update_for_peer(&global, &peer);
        assert_eq!(out.get_local_pref(), Some(100));

        // Local path already carrying one keeps it.
        let mut attrs = base_attrs();
        attrs.push(PathAttribute::new(PathAttrValue::LocalPref(300)));
        let root = Arc::new(make_path(local_source(), attrs));
        let mut out = Path::clone_path(&root, false);
        out.update_for_peer(&global, &peer);
        assert_eq!(out.get_local_pref(), Some(300));
    }

    #[test]
    fn test_update_for_peer_ibgp_attaches_empty_as_path() {
        let global = test_global();
        let peer = Neighbor::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)), 65001);

        let root = Arc::new(make_path(
            local_source(),
            vec![PathAttribute::new(PathAttrValue::Origin(Origin::Igp))],
        ));
        let mut out = Path::clone_path(&root, false);
        out.update_for_peer(&global, &peer);
        assert!(out.get_as_path().is_some());
        assert_eq!(out.as_path_len(), 0);
    }

    #[test]
    fn test_update_for_peer_route_reflector() {
        let global = test_global();
        let peer = {
            let mut n = Neighbor::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)), 65001);
            n.route_reflector_client = true;
            n.route_reflector_cluster_id = Some(Ipv4Addr::new(9, 9, 9, 9));
            n
        };

        let ibgp_source = Arc::new(PeerInfo {
            local_as: 65001,
            peer_as: 65001,
            local_id: Ipv4Addr::new(1, 1, 1, 1),
            id: Ipv4Addr::new(3, 3, 3, 3),
            address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4))),
            local_address: None,
        });
        let mut attrs = base_attrs();
        attrs.push(PathAttribute::new(PathAttrValue::ClusterList(vec![
            Ipv4Addr::new(8, 8, 8, 8),
        ])));
        let root = Arc::new(make_path(ibgp_source, attrs));
        let mut out = Path::clone_path(&root, false);
        out.update_for_peer(&global, &peer);

        assert_eq!(out.get_originator_id(), Some(Ipv4Addr::new(3, 3, 3, 3)));
        assert_eq!(
            out.get_cluster_list(),
            vec![Ipv4Addr::new(9, 9, 9, 9), Ipv4Addr::new(8, 8, 8, 8)]
        );
    }

    #[test]
    fn test_update_for_peer_route_server_client_untouched() {
        let global = test_global();
        let peer = {
            let mut n = Neighbor::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 65002);
            n.route_server_client = true;
            n.local_address = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
            n
        };

        let root = Arc::new(make_path(ebgp_source(), base_attrs()));
        let mut out = Path::clone_path(&root, false);
        out.update_for_peer(&global, &peer);

        assert_eq!(out.as_seq_list(), vec![65002, 65010]);
        assert_eq!(
            out.get_nexthop(),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
        );
    }

    #[test]
    fn test_communities() {
        let mut path = make_path(ebgp_source(), base_attrs());
        assert!(path.get_communities().is_empty());

        path.set_communities(&[100, 200], false);
        assert_eq!(path.get_communities(), vec![100, 200]);

        path.set_communities(&[300], false);
        assert_eq!(path.get_communities(), vec![100, 200, 300]);

        path.set_communities(&[400], true);
        assert_eq!(path.get_communities(), vec![400]);

        assert_eq!(path.remove_communities(&[400, 999]), 1);
        assert!(path.get_communities().is_empty());
        assert!(path.get_attr(attr_type_code::COMMUNITIES).is_none());
    }

    #[test]
    fn test_set_med() {
        let mut path = make_path(ebgp_source(), base_attrs());
        path.set_med(10, true).unwrap();
        assert_eq!(path.get_med(), Some(10));

        path.set_med(5, false).unwrap();
        assert_eq!(path.get_med(), Some(15));

        assert!(path.set_med(-20, false).is_err());
        assert!(path.set_med(u32::MAX as i64 + 1, true).is_err());
    }

    #[test]
    fn test_filtered_map() {
        let mut path = make_path(ebgp_source(), base_attrs());
        assert_eq!(path.filtered("10.0.0.2"), None);
        path.filter("10.0.0.2", PolicyDirection::In);
        assert_eq!(path.filtered("10.0.0.2"), Some(PolicyDirection::In));
    }
}
