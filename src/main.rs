#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! `rendezvousd` — the IPv6 epoch/slot rendezvous discovery daemon.
//!
//! Loads configuration, optionally loads this node's own signed descriptor,
//! and runs the slot engine until `SIGINT`/`SIGTERM`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use infrasim_rendezvous::core::config::Config;
use infrasim_rendezvous::core::security::verifier::{Ed25519Verifier, Verifier};
use infrasim_rendezvous::monitoring::metrics::Metrics;
use infrasim_rendezvous::rendezvous::binder::IpToolBinder;
use infrasim_rendezvous::rendezvous::engine::SlotEngine;
use infrasim_rendezvous::rendezvous::learner::PeerLearner;
use infrasim_rendezvous::rendezvous::store;
use tokio::sync::watch;
use tracing::{info, warn, Level};

/// Rendezvous discovery daemon.
#[derive(Parser, Debug)]
#[command(name = "rendezvousd", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = infrasim_rendezvous::core::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug-level logging.
    #[arg(short, long)]
    debug: bool,

    /// Stay attached to the controlling terminal (no-op under systemd; kept
    /// for parity with operators used to invoking the daemon directly).
    #[arg(short, long)]
    foreground: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .compact()
        .try_init();

    let cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };

    if cli.foreground {
        info!("running in foreground");
    }

    let metrics = match Metrics::new() {
        Ok(m) => Some(Arc::new(m)),
        Err(e) => {
            warn!(?e, "metrics init failed; continuing without metrics");
            None
        }
    };

    let local = store::load_local_descriptor(&cfg.descriptor_path);
    if local.is_none() {
        warn!(path = %cfg.descriptor_path.display(), "no local descriptor found; this node will listen but never broadcast");
    }
    let self_node_id = local
        .as_ref()
        .and_then(|l| l.descriptor.node_id())
        .map(str::to_string)
        .unwrap_or_default();

    let verifier: Option<Arc<dyn Verifier>> = if cfg.verify_signatures {
        Some(match &cfg.verifier_pubkey_hex {
            Some(hex) => Arc::new(Ed25519Verifier::pinned(hex.clone())),
            None => Arc::new(Ed25519Verifier::trust_on_first_use()),
        })
    } else {
        None
    };

    std::fs::create_dir_all(&cfg.peers_dir).ok();

    let learner = PeerLearner::new(
        self_node_id,
        cfg.peers_dir.clone(),
        cfg.max_peers,
        cfg.peer_callback.clone(),
        verifier,
        metrics.clone(),
    );

    let mut engine = SlotEngine::new(cfg, IpToolBinder, local, learner, metrics);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        let _ = stop_tx.send(true);
    });

    info!("rendezvousd starting");
    engine.run(stop_rx).await;
    info!("rendezvousd stopped");
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
