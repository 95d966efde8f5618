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

//! Route-facing value model: the `Path` record exchanged with the route
//! processor, plus UPDATE construction and AS_PATH reconciliation.

pub mod message;
pub mod path;

pub use message::{
    create_update_msgs_from_paths, downgrade_to_2byte, process_message, reconcile_4byte,
};
pub use path::{OriginInfo, Path, PeerInfo, RpkiValidation};
