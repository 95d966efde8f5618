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

//! Policy surface the session core invokes. The evaluation engine itself
//! lives outside this crate; the FSM only needs the table handle, the
//! direction tag, and the `apply` verdict.

use crate::table::Path;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyDirection {
    In,
    Import,
    Export,
}

type ApplyFn = dyn Fn(&str, PolicyDirection, &Path) -> Option<Path> + Send + Sync;

/// Shared routing-policy table. Readers (per-path evaluation in the receive
/// path) take the read lock; configuration swaps take the write lock.
#[derive(Default)]
pub struct RoutingPolicy {
    apply_fn: Option<Box<ApplyFn>>,
}

impl RoutingPolicy {
    pub fn new() -> Self {
        RoutingPolicy { apply_fn: None }
    }

    /// Install the evaluation hook. Called by the configuration layer under
    /// the write lock.
    pub fn set_apply_fn<F>(&mut self, f: F)
    where
        F: Fn(&str, PolicyDirection, &Path) -> Option<Path> + Send + Sync + 'static,
    {
        self.apply_fn = Some(Box::new(f));
    }

    /// Evaluate one path. `None` means the engine produced no explicit
    /// accept for this path; the caller decides what that implies.
    pub fn apply(&self, peer_id: &str, direction: PolicyDirection, path: &Path) -> Option<Path> {
        match &self.apply_fn {
            Some(f) => f(peer_id, direction, path),
            None => None,
        }
    }
}

pub type SharedPolicy = Arc<RwLock<RoutingPolicy>>;

pub fn new_shared_policy() -> SharedPolicy {
    Arc::new(RwLock::new(RoutingPolicy::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{PeerInfo, Path};
    use crate::bgp::msg_update::{AsPath, AsSegment, Origin, PathAttrValue, PathAttribute};
    use crate::bgp::utils::IpNetwork;
    use std::net::Ipv4Addr;
    use std::time::SystemTime;

    fn test_path() -> Path {
        let source = Arc::new(PeerInfo::local(65001, Ipv4Addr::new(1, 1, 1, 1)));
        Path::new(
            source,
            IpNetwork::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
            false,
            Some(vec![
                PathAttribute::new(PathAttrValue::Origin(Origin::Igp)),
                PathAttribute::new(PathAttrValue::AsPath(AsPath::new(
                    vec![AsSegment::sequence(vec![65001])],
                    true,
                ))),
                PathAttribute::new(PathAttrValue::NextHop(Ipv4Addr::new(10, 0, 0, 1))),
            ]),
            SystemTime::now(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_default_policy_returns_none() {
        let policy = RoutingPolicy::new();
        let path = test_path();
        assert!(policy.apply("10.0.0.2", PolicyDirection::In, &path).is_none());
    }

    #[test]
    fn test_installed_hook_runs() {
        let shared = new_shared_policy();
        shared.write().unwrap().set_apply_fn(|peer_id, dir, _path| {
            assert_eq!(peer_id, "10.0.0.2");
            assert_eq!(dir, PolicyDirection::In);
            Some(test_path())
        });

        let path = test_path();
        let verdict = shared
            .read()
            .unwrap()
            .apply("10.0.0.2", PolicyDirection::In, &path);
        assert!(verdict.is_some());
    }
}
