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

use bgpcore::config::ConfigSet;
use bgpcore::peer::{self, FsmMsgData, PeerHandle};
use bgpcore::policy::new_shared_policy;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bgpcored")]
#[command(about = "BGP peering daemon", version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ConfigSet::from_file(&args.config)?;
    let global = Arc::new(config.global.clone());

    info!(
        asn = global.asn,
        router_id = %global.router_id,
        neighbors = config.neighbors.len(),
        "starting bgpcored"
    );

    let policy = new_shared_policy();
    let (incoming_tx, mut incoming_rx) = mpsc::channel(256);
    let (state_tx, mut state_rx) = mpsc::channel(256);

    let mut peers: Vec<PeerHandle> = Vec::new();
    for neighbor in config.neighbors {
        info!(peer = %neighbor.neighbor_address, peer_as = neighbor.peer_as, "adding neighbor");
        peers.push(peer::spawn(
            Arc::clone(&global),
            neighbor,
            Arc::clone(&policy),
            incoming_tx.clone(),
            state_tx.clone(),
        ));
    }

    loop {
        tokio::select! {
            Some(msg) = state_rx.recv() => {
                if let FsmMsgData::StateChange(state) = msg.data {
                    info!(peer = %msg.src, state = %state, "peer state change");
                }
            }

            Some(msg) = incoming_rx.recv() => {
                match msg.data {
                    FsmMsgData::Message(Ok(_)) => {
                        // A route processor would ingest the path list here.
                        for path in &msg.path_list {
                            info!(peer = %msg.src, path = %path, "received path");
                        }
                    }
                    FsmMsgData::Message(Err(e)) => {
                        warn!(peer = %msg.src, error = %e, "malformed message from peer");
                    }
                    FsmMsgData::StateChange(_) => {}
                }
            }

            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    info!("shutting down");
    for handle in peers {
        handle.stop().await;
    }
    Ok(())
}
