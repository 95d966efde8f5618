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

use crate::bgp::msg::{BGP_HEADER_SIZE_BYTES, MAX_MESSAGE_SIZE};
use crate::bgp::msg_open::AS_TRANS;
use crate::bgp::msg_update::{
    attr_type_code, AsPath, AsSegment, PathAttrValue, PathAttribute, UpdateMessage,
};
use crate::bgp::multiprotocol::AfiSafi;
use crate::log::warn;
use crate::table::path::{Path, PeerInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

/// Rewrite an UPDATE for a 2-byte-AS peer (RFC 6793 4.2.2): every AS that
/// does not fit 16 bits becomes AS_TRANS in AS_PATH, and the true 4-byte
/// segments are collected into AS4_PATH, excluding confederation segments.
/// AS4_PATH is only appended when at least one substitution happened.
pub fn downgrade_to_2byte(msg: &mut UpdateMessage) {
    let Some(idx) = msg
        .path_attributes
        .iter()
        .position(|a| a.type_code() == attr_type_code::AS_PATH)
    else {
        return;
    };
    let PathAttrValue::AsPath(as_path) = &msg.path_attributes[idx].value else {
        return;
    };

    let mut as2_segments = Vec::with_capacity(as_path.segments.len());
    let mut as4_segments = Vec::new();
    let mut needs_as4 = false;
    for segment in &as_path.segments {
        let narrowed: Vec<u32> = segment
            .asn_list
            .iter()
            .map(|&asn| {
                if asn > u16::MAX as u32 {
                    needs_as4 = true;
                    AS_TRANS as u32
                } else {
                    asn
                }
            })
            .collect();
        as2_segments.push(AsSegment {
            segment_type: segment.segment_type,
            asn_list: narrowed,
        });

        if !segment.segment_type.is_confed() {
            as4_segments.push(segment.clone());
        }
    }

    msg.path_attributes[idx] =
        PathAttribute::new(PathAttrValue::AsPath(AsPath::new(as2_segments, false)));
    if needs_as4 {
        msg.path_attributes
            .push(PathAttribute::new(PathAttrValue::As4Path(as4_segments)));
    }
}

/// Merge AS4_PATH back into AS_PATH on receipt from a 2-byte-AS peer
/// (RFC 6793 4.2.3). The AS_PATH is widened to 4-byte form either way;
/// AS4_PATH is always removed from the attribute list.
pub fn reconcile_4byte(msg: &mut UpdateMessage) {
    let mut as_attr_pos = None;
    let mut as4_attr_pos = None;
    for (i, attr) in msg.path_attributes.iter_mut().enumerate() {
        match &mut attr.value {
            PathAttrValue::AsPath(as_path) => {
                as_path.four_byte = true;
                as_attr_pos = Some(i);
            }
            PathAttrValue::As4Path(_) => as4_attr_pos = Some(i),
            _ => {}
        }
    }

    let Some(as4_pos) = as4_attr_pos else {
        return;
    };
    let as4_attr = msg.path_attributes.remove(as4_pos);
    let PathAttrValue::As4Path(as4_raw) = as4_attr.value else {
        return;
    };

    let Some(mut as_pos) = as_attr_pos else {
        return;
    };
    if as4_pos < as_pos {
        as_pos -= 1;
    }
    let PathAttrValue::AsPath(as_path) = &msg.path_attributes[as_pos].value else {
        return;
    };

    let as_len: usize = as_path.segments.iter().map(|s| s.as_len()).sum();
    let as_confed_len: usize = as_path.segments.iter().map(|s| s.confed_len()).sum();

    // RFC 6793 6: confederation segments must not appear in AS4_PATH; drop
    // them with a log line and keep going.
    let mut as4_segments = Vec::with_capacity(as4_raw.len());
    let mut as4_len = 0;
    for segment in as4_raw {
        if segment.segment_type.is_confed() {
            warn!(
                segment_type = ?segment.segment_type,
                "AS4_PATH contains a confederation segment, ignoring it"
            );
            continue;
        }
        as4_len += segment.as_len();
        as4_segments.push(segment);
    }

    if as_len + as_confed_len < as4_len {
        warn!("AS4_PATH is longer than AS_PATH, ignoring AS4_PATH");
        return;
    }

    // Keep the AS_PATH prefix worth `total - len(AS4_PATH)` ASes, then graft
    // the AS4_PATH segments onto the tail.
    let mut keep = as_len + as_confed_len - as4_len;
    let mut new_segments: Vec<AsSegment> = Vec::with_capacity(as_path.segments.len());
    for segment in &as_path.segments {
        if keep >= segment.as_len() {
            keep -= segment.as_len();
            new_segments.push(segment.clone());
        } else {
            // Only a SEQUENCE can land here.
            let mut truncated = segment.clone();
            truncated.asn_list.truncate(keep);
            new_segments.push(truncated);
            keep = 0;
        }
        if keep == 0 {
            break;
        }
    }

    for segment in as4_segments {
        match new_segments.last_mut() {
            Some(last)
                if last.segment_type == segment.segment_type
                    && segment.segment_type == crate::bgp::msg_update::AsSegmentType::AsSequence
                    && last.asn_list.len() + segment.asn_list.len() <= 255 =>
            {
                last.asn_list.extend(segment.asn_list);
            }
            _ => new_segments.push(segment),
        }
    }

    msg.path_attributes[as_pos] =
        PathAttribute::new(PathAttrValue::AsPath(AsPath::new(new_segments, true)));
}

/// Expand a parsed UPDATE into one [`Path`] per announced and withdrawn
/// NLRI, including the MP_REACH/MP_UNREACH families.
pub fn process_message(
    msg: &UpdateMessage,
    peer_info: &Arc<PeerInfo>,
    timestamp: SystemTime,
) -> Vec<Path> {
    let attrs: Vec<PathAttribute> = msg.path_attributes.clone();
    let mut paths = Vec::new();

    for withdrawn in &msg.withdrawn_routes {
        paths.extend(Path::new(
            Arc::clone(peer_info),
            *withdrawn,
            true,
            None,
            timestamp,
            false,
        ));
    }

    for nlri in &msg.nlri {
        paths.extend(Path::new(
            Arc::clone(peer_info),
            *nlri,
            false,
            Some(attrs.clone()),
            timestamp,
            false,
        ));
    }

    for attr in &msg.path_attributes {
        match &attr.value {
            PathAttrValue::MpReachNlri { nlris, .. } => {
                for nlri in nlris {
                    paths.extend(Path::new(
                        Arc::clone(peer_info),
                        *nlri,
                        false,
                        Some(attrs.clone()),
                        timestamp,
                        false,
                    ));
                }
            }
            PathAttrValue::MpUnreachNlri { nlris, .. } => {
                for nlri in nlris {
                    // MP withdraws keep the attribute list so the original
                    // MP_UNREACH can be reproduced downstream.
                    paths.extend(Path::new(
                        Arc::clone(peer_info),
                        *nlri,
                        true,
                        Some(attrs.clone()),
                        timestamp,
                        false,
                    ));
                }
            }
            _ => {}
        }
    }

    paths
}

/// Build one UPDATE from a path, or merge the path's NLRI into `msg`.
fn update_msg_from_path(path: &Path, msg: Option<&mut UpdateMessage>) -> Option<UpdateMessage> {
    let cloned_attrs = || -> Vec<PathAttribute> {
        path.get_attrs().into_iter().cloned().collect()
    };

    if path.route_family() == AfiSafi::IPV4_UNICAST {
        let nlri = *path.nlri();
        if path.is_withdraw {
            match msg {
                Some(update) => {
                    update.withdrawn_routes.push(nlri);
                    None
                }
                None => Some(UpdateMessage::new(vec![nlri], Vec::new(), Vec::new())),
            }
        } else {
            match msg {
                Some(update) => {
                    update.nlri.push(nlri);
                    None
                }
                None => Some(UpdateMessage::new(Vec::new(), cloned_attrs(), vec![nlri])),
            }
        }
    } else if path.is_withdraw {
        match msg {
            Some(update) => {
                for attr in update.path_attributes.iter_mut() {
                    if let PathAttrValue::MpUnreachNlri { nlris, .. } = &mut attr.value {
                        nlris.push(*path.nlri());
                    }
                }
                None
            }
            None => {
                // Withdraw everything the path's MP_REACH announced; a
                // post-policy path without MP_REACH falls back to its
                // preserved MP_UNREACH.
                let nlris = match path
                    .get_attr(attr_type_code::MP_REACH_NLRI)
                    .map(|a| &a.value)
                {
                    Some(PathAttrValue::MpReachNlri { nlris, .. }) => nlris.clone(),
                    _ => match path
                        .get_attr(attr_type_code::MP_UNREACH_NLRI)
                        .map(|a| &a.value)
                    {
                        Some(PathAttrValue::MpUnreachNlri { nlris, .. }) => nlris.clone(),
                        _ => Vec::new(),
                    },
                };

                let mut attrs = cloned_attrs();
                for attr in attrs.iter_mut() {
                    let type_code = attr.type_code();
                    if type_code == attr_type_code::MP_REACH_NLRI
                        || type_code == attr_type_code::MP_UNREACH_NLRI
                    {
                        *attr = PathAttribute::new(PathAttrValue::MpUnreachNlri {
                            family: path.route_family(),
                            nlris,
                        });
                        break;
                    }
                }
                Some(UpdateMessage::new(Vec::new(), attrs, Vec::new()))
            }
        }
    } else {
        match msg {
            Some(update) => {
                for attr in update.path_attributes.iter_mut() {
                    if let PathAttrValue::MpReachNlri { nlris, .. } = &mut attr.value {
                        nlris.push(*path.nlri());
                    }
                }
                None
            }
            None => Some(UpdateMessage::new(Vec::new(), cloned_attrs(), Vec::new())),
        }
    }
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

struct Bucket {
    attrs: Vec<u8>,
    paths: Vec<Arc<Path>>,
}

/// Group paths into wire UPDATEs. IPv4-unicast announcements sharing a
/// byte-identical attribute list coalesce into common messages, bounded by
/// the 4096-octet message limit; everything else becomes a standalone
/// UPDATE.
pub fn create_update_msgs_from_paths(path_list: &[Arc<Path>]) -> Vec<UpdateMessage> {
    let mut msgs = Vec::new();

    // Buckets keyed by FNV-1a over the serialized attributes; hash
    // collisions fall back to full byte comparison, so two buckets may
    // share a key.
    let mut path_by_attrs: HashMap<u32, Vec<Bucket>> = HashMap::new();

    for path in path_list {
        let coalesce = path.route_family() == AfiSafi::IPV4_UNICAST && !path.is_withdraw;
        if coalesce {
            let attrs: Vec<u8> = path
                .get_attrs()
                .iter()
                .flat_map(|a| a.to_bytes())
                .collect();
            let key = fnv1a_32(&attrs);
            let buckets = path_by_attrs.entry(key).or_default();
            match buckets.iter_mut().find(|b| b.attrs == attrs) {
                Some(bucket) => bucket.paths.push(Arc::clone(path)),
                None => buckets.push(Bucket {
                    attrs,
                    paths: vec![Arc::clone(path)],
                }),
            }
        } else if let Some(msg) = update_msg_from_path(path, None) {
            msgs.push(msg);
        }
    }

    for buckets in path_by_attrs.values() {
        for bucket in buckets {
            let mut current: Option<UpdateMessage> = None;
            for path in &bucket.paths {
                // Header + withdrawn-length + attribute-length + attributes
                // + worst-case NLRI octets including the one about to be
                // added, plus a safety margin.
                let needs_new = match current.as_ref() {
                    None => true,
                    Some(msg) => {
                        let attrs_len: usize =
                            msg.path_attributes.iter().map(|a| a.wire_len()).sum();
                        let msg_len =
                            BGP_HEADER_SIZE_BYTES + 2 + 2 + attrs_len + (msg.nlri.len() + 1) * 5;
                        msg_len + 32 > MAX_MESSAGE_SIZE as usize
                    }
                };

                if needs_new {
                    if let Some(done) = current.take() {
                        msgs.push(done);
                    }
                    current = update_msg_from_path(path, None);
                } else if let Some(msg) = current.as_mut() {
                    update_msg_from_path(path, Some(msg));
                }
            }
            if let Some(msg) = current {
                msgs.push(msg);
            }
        }
    }

    msgs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::msg::Message;
    use crate::bgp::msg_update::{AsSegmentType, Origin};
    use crate::bgp::utils::IpNetwork;
    use std::net::{IpAddr, Ipv4Addr};

    fn seq(asns: Vec<u32>) -> AsSegment {
        AsSegment::sequence(asns)
    }

    fn confed_seq(asns: Vec<u32>) -> AsSegment {
        AsSegment {
            segment_type: AsSegmentType::AsConfedSequence,
            asn_list: asns,
        }
    }

    fn update_with_as_path(segments: Vec<AsSegment>, four_byte: bool) -> UpdateMessage {
        UpdateMessage::new(
            vec![],
            vec![
                PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
                PathAttribute::new(PathAttrValue::AsPath(AsPath::new(segments, four_byte))),
                PathAttribute::new(PathAttrValue::NextHop(Ipv4Addr::new(10, 0, 0, 1))),
            ],
            vec![IpNetwork::v4(Ipv4Addr::new(192, 0, 2, 0), 24)],
        )
    }

    fn as_path_of(msg: &UpdateMessage) -> &AsPath {
        msg.as_path().unwrap()
    }

    fn as4_path_of(msg: &UpdateMessage) -> Option<&Vec<AsSegment>> {
        match msg
            .get_attr(attr_type_code::AS4_PATH)
            .map(|a| &a.value)
        {
            Some(PathAttrValue::As4Path(segments)) => Some(segments),
            _ => None,
        }
    }

    #[test]
    fn test_downgrade_substitutes_as_trans() {
        let mut msg = update_with_as_path(vec![seq(vec![131073, 300, 400])], true);
        downgrade_to_2byte(&mut msg);

        let as_path = as_path_of(&msg);
        assert!(!as_path.four_byte);
        assert_eq!(
            as_path.segments[0].asn_list,
            vec![AS_TRANS as u32, 300, 400]
        );
        assert_eq!(
            as4_path_of(&msg).unwrap(),
            &vec![seq(vec![131073, 300, 400])]
        );
    }

    #[test]
    fn test_downgrade_without_wide_asns_adds_no_as4_path() {
        let mut msg = update_with_as_path(vec![seq(vec![65001, 300])], true);
        downgrade_to_2byte(&mut msg);

        assert_eq!(as_path_of(&msg).segments[0].asn_list, vec![65001, 300]);
        assert!(as4_path_of(&msg).is_none());
    }

    #[test]
    fn test_downgrade_excludes_confed_segments_from_as4_path() {
        let mut msg = update_with_as_path(
            vec![confed_seq(vec![65100]), seq(vec![131073, 300])],
            true,
        );
        downgrade_to_2byte(&mut msg);

        // The 2-byte AS_PATH keeps the confed segment, AS4_PATH drops it.
        let as_path = as_path_of(&msg);
        assert_eq!(as_path.segments.len(), 2);
        assert_eq!(
            as_path.segments[0].segment_type,
            AsSegmentType::AsConfedSequence
        );
        assert_eq!(as4_path_of(&msg).unwrap(), &vec![seq(vec![131073, 300])]);
    }

    #[test]
    fn test_reconcile_merges_as4_path() {
        // AS_PATH = SEQ[23456, 300, 400], AS4_PATH = SEQ[131073]
        let mut msg = update_with_as_path(vec![seq(vec![AS_TRANS as u32, 300, 400])], false);
        msg.path_attributes
            .push(PathAttribute::new(PathAttrValue::As4Path(vec![seq(vec![
                131073,
            ])])));

        reconcile_4byte(&mut msg);

        let as_path = as_path_of(&msg);
        assert!(as_path.four_byte);
        assert_eq!(as_path.segments.len(), 1);
        // Leading (3 - 1) ASes kept, AS4_PATH grafted onto the tail; the
        // combined length equals the original AS_PATH length.
        assert_eq!(as_path.segments[0].asn_list, vec![AS_TRANS as u32, 300, 131073]);
        assert!(as4_path_of(&msg).is_none());
    }

    #[test]
    fn test_reconcile_longer_as4_path_is_discarded() {
        // AS_PATH = SEQ[23456], AS4_PATH = SEQ[1, 2, 3]
        let mut msg = update_with_as_path(vec![seq(vec![AS_TRANS as u32])], false);
        msg.path_attributes
            .push(PathAttribute::new(PathAttrValue::As4Path(vec![seq(vec![
                1, 2, 3,
            ])])));

        reconcile_4byte(&mut msg);

        let as_path = as_path_of(&msg);
        assert!(as_path.four_byte, "AS_PATH still widened");
        assert_eq!(as_path.segments[0].asn_list, vec![AS_TRANS as u32]);
        assert!(as4_path_of(&msg).is_none(), "AS4_PATH removed either way");
    }

    #[test]
    fn test_reconcile_drops_confed_segments_in_as4_path() {
        let mut msg = update_with_as_path(vec![seq(vec![AS_TRANS as u32, 300])], false);
        msg.path_attributes
            .push(PathAttribute::new(PathAttrValue::As4Path(vec![
                confed_seq(vec![65100]),
                seq(vec![131073]),
            ])));

        reconcile_4byte(&mut msg);

        let as_path = as_path_of(&msg);
        assert_eq!(as_path.segments.len(), 1);
        // Only SEQ[131073] survives the confed filter, so one AS is kept.
        assert_eq!(as_path.segments[0].asn_list, vec![AS_TRANS as u32, 131073]);
    }

    #[test]
    fn test_reconcile_without_as4_path_widens_only() {
        let mut msg = update_with_as_path(vec![seq(vec![65001, 300])], false);
        reconcile_4byte(&mut msg);
        let as_path = as_path_of(&msg);
        assert!(as_path.four_byte);
        assert_eq!(as_path.segments[0].asn_list, vec![65001, 300]);
    }

    #[test]
    fn test_reconcile_preserves_confed_prefix_in_as_path() {
        // Confed part of AS_PATH counts toward the kept prefix.
        let mut msg = update_with_as_path(
            vec![confed_seq(vec![65100, 65101]), seq(vec![AS_TRANS as u32, 300])],
            false,
        );
        msg.path_attributes
            .push(PathAttribute::new(PathAttrValue::As4Path(vec![seq(vec![
                131073, 300,
            ])])));

        reconcile_4byte(&mut msg);

        let as_path = as_path_of(&msg);
        assert_eq!(as_path.segments.len(), 2);
        assert_eq!(
            as_path.segments[0].segment_type,
            AsSegmentType::AsConfedSequence
        );
        // Confederation ASes count toward the kept total but consume none of
        // it, so the whole SEQUENCE survives before the graft.
        assert_eq!(
            as_path.segments[1].asn_list,
            vec![AS_TRANS as u32, 300, 131073, 300]
        );
    }

    #[test]
    fn test_downgrade_after_reconcile_is_identity() {
        // 2-byte-representable ASes survive the round trip byte-for-byte.
        let original = update_with_as_path(vec![seq(vec![65001, 300, 400])], false);
        let mut msg = original.clone();
        reconcile_4byte(&mut msg);
        downgrade_to_2byte(&mut msg);
        assert_eq!(msg.serialize(), original.serialize());
    }

    fn test_peer_info() -> Arc<PeerInfo> {
        Arc::new(PeerInfo {
            local_as: 65001,
            peer_as: 65002,
            local_id: Ipv4Addr::new(1, 1, 1, 1),
            id: Ipv4Addr::new(2, 2, 2, 2),
            address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            local_address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
        })
    }

    #[test]
    fn test_process_message() {
        let mut msg = update_with_as_path(vec![seq(vec![65002])], true);
        msg.nlri.push(IpNetwork::v4(Ipv4Addr::new(198, 51, 100, 0), 24));
        msg.withdrawn_routes
            .push(IpNetwork::v4(Ipv4Addr::new(203, 0, 113, 0), 24));

        let paths = process_message(&msg, &test_peer_info(), SystemTime::now());
        assert_eq!(paths.len(), 3);

        let withdraws: Vec<_> = paths.iter().filter(|p| p.is_withdraw).collect();
        assert_eq!(withdraws.len(), 1);
        assert_eq!(withdraws[0].key(), "203.0.113.0/24");

        let announces: Vec<_> = paths.iter().filter(|p| !p.is_withdraw).collect();
        assert_eq!(announces.len(), 2);
        for path in announces {
            assert_eq!(path.source().peer_as, 65002);
            assert!(path.get_as_path().is_some());
        }
    }

    #[test]
    fn test_process_message_mp_families() {
        let family = AfiSafi::IPV6_UNICAST;
        let msg = UpdateMessage::new(
            vec![],
            vec![
                PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
                PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
                    vec![seq(vec![65002])],
                    true,
                ))),
                PathAttribute::new(PathAttrValue::MpReachNlri {
                    family,
                    next_hop: "2001:db8::1".parse().unwrap(),
                    nlris: vec![IpNetwork::v6("2001:db8:1::".parse().unwrap(), 48)],
                }),
                PathAttribute::new(PathAttrValue::MpUnreachNlri {
                    family,
                    nlris: vec![IpNetwork::v6("2001:db8:2::".parse().unwrap(), 48)],
                }),
            ],
            vec![],
        );

        let paths = process_message(&msg, &test_peer_info(), SystemTime::now());
        assert_eq!(paths.len(), 2);
        assert_eq!(paths.iter().filter(|p| p.is_withdraw).count(), 1);
        assert!(paths.iter().all(|p| p.route_family() == family));
    }

    fn batch_path(nlri: IpNetwork, attrs: Vec<PathAttribute>) -> Arc<Path> {
        Arc::new(
            Path::new(
                test_peer_info(),
                nlri,
                false,
                Some(attrs),
                SystemTime::now(),
                false,
            )
            .unwrap(),
        )
    }

    /// Attributes serializing to exactly 80 octets:
    /// ORIGIN (4) + AS_PATH with 16 four-byte ASes (3+2+64) + NEXT_HOP (7).
    fn eighty_octet_attrs() -> Vec<PathAttribute> {
        let attrs = vec![
            PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
            PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
                vec![seq((1..=16).collect())],
                true,
            ))),
            PathAttribute::new(PathAttrValue::NextHop(Ipv4Addr::new(10, 0, 0, 1))),
        ];
        let total: usize = attrs.iter().map(|a| a.wire_len()).sum();
        assert_eq!(total, 80);
        attrs
    }

    #[test]
    fn test_batcher_packs_1200_prefixes_into_two_updates() {
        let attrs = eighty_octet_attrs();
        let paths: Vec<Arc<Path>> = (0..1200u32)
            .map(|i| {
                let octets = (0x0a00_0000u32 + i).to_be_bytes();
                batch_path(
                    IpNetwork::v4(Ipv4Addr::from(octets), 32),
                    attrs.clone(),
                )
            })
            .collect();

        let msgs = create_update_msgs_from_paths(&paths);
        assert_eq!(msgs.len(), 2);

        let total_nlri: usize = msgs.iter().map(|m| m.nlri.len()).sum();
        assert_eq!(total_nlri, 1200);
        for msg in &msgs {
            assert!(
                msg.serialize().len() <= MAX_MESSAGE_SIZE as usize,
                "UPDATE exceeds 4096 octets"
            );
        }
    }

    #[test]
    fn test_batcher_separates_differing_attrs() {
        let mut other_attrs = eighty_octet_attrs();
        other_attrs.push(PathAttribute::new(PathAttrValue::MultiExitDisc(7)));

        let paths = vec![
            batch_path(IpNetwork::v4(Ipv4Addr::new(10, 0, 0, 0), 24), eighty_octet_attrs()),
            batch_path(IpNetwork::v4(Ipv4Addr::new(10, 0, 1, 0), 24), other_attrs),
            batch_path(IpNetwork::v4(Ipv4Addr::new(10, 0, 2, 0), 24), eighty_octet_attrs()),
        ];

        let msgs = create_update_msgs_from_paths(&paths);
        assert_eq!(msgs.len(), 2);
        let mut sizes: Vec<usize> = msgs.iter().map(|m| m.nlri.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn test_batcher_withdraw_is_standalone() {
        let announce = batch_path(
            IpNetwork::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
            eighty_octet_attrs(),
        );
        let withdraw = Arc::new(
            Path::new(
                test_peer_info(),
                IpNetwork::v4(Ipv4Addr::new(10, 0, 1, 0), 24),
                true,
                None,
                SystemTime::now(),
                false,
            )
            .unwrap(),
        );

        let msgs = create_update_msgs_from_paths(&[announce, withdraw]);
        assert_eq!(msgs.len(), 2);

        let withdraw_msg = msgs
            .iter()
            .find(|m| !m.withdrawn_routes.is_empty())
            .unwrap();
        assert!(withdraw_msg.path_attributes.is_empty());
        assert!(withdraw_msg.nlri.is_empty());
    }

    #[test]
    fn test_batcher_mp_withdraw_uses_mp_unreach() {
        let family = AfiSafi::IPV6_UNICAST;
        let nlri = IpNetwork::v6("2001:db8:1::".parse().unwrap(), 48);
        let attrs = vec![
            PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
            PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
                vec![seq(vec![65002])],
                true,
            ))),
            PathAttribute::new(PathAttrValue::MpReachNlri {
                family,
                next_hop: "2001:db8::1".parse().unwrap(),
                nlris: vec![nlri],
            }),
        ];
        let withdraw = Arc::new(
            Path::new(test_peer_info(), nlri, true, Some(attrs), SystemTime::now(), false)
                .unwrap(),
        );

        let msgs = create_update_msgs_from_paths(&[withdraw]);
        assert_eq!(msgs.len(), 1);
        match msgs[0]
            .get_attr(attr_type_code::MP_UNREACH_NLRI)
            .map(|a| &a.value)
        {
            Some(PathAttrValue::MpUnreachNlri { nlris, .. }) => {
                assert_eq!(nlris, &vec![nlri])
            }
            other => panic!("expected MP_UNREACH, got {:?}", other),
        }
        assert!(msgs[0].get_attr(attr_type_code::MP_REACH_NLRI).is_none());
    }

    #[test]
    fn test_fnv1a_32_reference_values() {
        // Standard FNV-1a test vectors.
        assert_eq!(fnv1a_32(b""), 0x811c9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9cf968);
    }
}
