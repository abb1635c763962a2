// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! `rendezvous-client` — one-shot `broadcast` / `discover` / `status`
//! operations that reuse the discovery core directly, without running the
//! slot engine's persistent loop.

use std::collections::HashMap;
use std::net::{SocketAddr, SocketAddrV6};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use infrasim_rendezvous::core::config::Config;
use infrasim_rendezvous::rendezvous::binder::{Binder, IpToolBinder};
use infrasim_rendezvous::rendezvous::clock::SlotOracle;
use infrasim_rendezvous::rendezvous::codec;
use infrasim_rendezvous::rendezvous::deriver;
use infrasim_rendezvous::rendezvous::engine::{self, interface_scope_id};
use infrasim_rendezvous::rendezvous::store;
use serde_json::json;

/// One-shot rendezvous discovery operations.
#[derive(Parser, Debug)]
#[command(name = "rendezvous-client", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = infrasim_rendezvous::core::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the current endpoint, bind, send our descriptor once, unbind.
    Broadcast,
    /// Derive the current endpoint, bind, receive for `--timeout` seconds, unbind.
    Discover {
        /// How long to listen, in seconds.
        #[arg(short, long, default_value_t = 5.0)]
        timeout: f64,
    },
    /// Print the current epoch/slot, endpoint, and upcoming endpoints.
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Command::Broadcast => run_broadcast(&cfg).await,
        Command::Discover { timeout } => run_discover(&cfg, *timeout, cli.json).await,
        Command::Status => run_status(&cfg, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run_broadcast(cfg: &Config) -> anyhow::Result<()> {
    let local = store::load_local_descriptor(&cfg.descriptor_path)
        .ok_or_else(|| anyhow::anyhow!("no local descriptor at {}", cfg.descriptor_path.display()))?;

    let oracle = SlotOracle::new(cfg.epoch_seconds, cfg.slots_per_epoch);
    let (key, _) = oracle.current();
    let endpoint = deriver::derive(&cfg.mesh_secret, key);
    let scope_id = interface_scope_id(&cfg.interface);

    let binder = IpToolBinder;
    binder.add(&cfg.interface, endpoint.address).await?;

    let socket = engine::bind_reuse_udp(SocketAddrV6::new(endpoint.address, endpoint.port, 0, scope_id))?;
    let dest = SocketAddr::V6(SocketAddrV6::new(endpoint.address, endpoint.port, 0, scope_id));
    let frame = codec::encode(&local.bytes, local.signature.as_ref().map(|s| s.0.as_slice()));
    socket.send_to(&frame, dest).await?;

    binder.remove(&cfg.interface, endpoint.address).await?;
    println!("broadcast sent to [{}]:{}", endpoint.address, endpoint.port);
    Ok(())
}

async fn run_discover(cfg: &Config, timeout_secs: f64, as_json: bool) -> anyhow::Result<()> {
    let oracle = SlotOracle::new(cfg.epoch_seconds, cfg.slots_per_epoch);
    let (key, _) = oracle.current();
    let endpoint = deriver::derive(&cfg.mesh_secret, key);
    let scope_id = interface_scope_id(&cfg.interface);

    let binder = IpToolBinder;
    binder.add(&cfg.interface, endpoint.address).await?;

    let socket = engine::bind_reuse_udp(SocketAddrV6::new(endpoint.address, endpoint.port, 0, scope_id))?;

    let mut seen: HashMap<String, serde_json::Value> = HashMap::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(timeout_secs.max(0.0));
    let mut buf = vec![0u8; codec::MAX_FRAME_LEN];

    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        match tokio::time::timeout(deadline - now, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _from))) => {
                if let Ok(decoded) = codec::decode(&buf[..len]) {
                    if let Some(node_id) = decoded.descriptor.node_id() {
                        seen.insert(node_id.to_string(), decoded.descriptor.as_value().clone());
                    }
                }
            }
            Ok(Err(_)) | Err(_) => {}
        }
    }

    binder.remove(&cfg.interface, endpoint.address).await?;

    let descriptors: Vec<_> = seen.into_values().collect();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
    } else {
        for d in &descriptors {
            println!("{}", d);
        }
        println!("{} peer(s) discovered", descriptors.len());
    }
    Ok(())
}

fn run_status(cfg: &Config, as_json: bool) -> anyhow::Result<()> {
    let oracle = SlotOracle::new(cfg.epoch_seconds, cfg.slots_per_epoch);
    let (key, remaining) = oracle.current();
    let endpoint = deriver::derive(&cfg.mesh_secret, key);
    let upcoming: Vec<_> = oracle
        .upcoming(3)
        .into_iter()
        .map(|k| deriver::derive(&cfg.mesh_secret, k))
        .collect();

    let now = chrono::Utc::now();

    if as_json {
        let out = json!({
            "generated_at": now.to_rfc3339(),
            "epoch": key.epoch,
            "slot": key.slot,
            "slots_per_epoch": cfg.slots_per_epoch,
            "seconds_remaining_in_slot": remaining,
            "address": endpoint.address.to_string(),
            "port": endpoint.port,
            "interface": cfg.interface,
            "upcoming": upcoming.iter().map(|e| json!({
                "epoch": e.slot_key.epoch,
                "slot": e.slot_key.slot,
                "address": e.address.to_string(),
                "port": e.port,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("current time: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("epoch={} slot={}/{}", key.epoch, key.slot, cfg.slots_per_epoch);
        println!("seconds remaining in slot: {remaining:.1}");
        println!("current endpoint: [{}]:{} on {}", endpoint.address, endpoint.port, cfg.interface);
        println!("upcoming:");
        for e in &upcoming {
            println!("  epoch={} slot={} [{}]:{}", e.slot_key.epoch, e.slot_key.slot, e.address, e.port);
        }
    }
    Ok(())
}
