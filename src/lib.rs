//! voldeck: mirror your audio mixer to remote clients over TCP.
//!
//! Architecture:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        voldeck server                        │
//! │                                                              │
//! │  [WASAPI] ← audio engine thread ← commands ←─ TCP clients    │
//! │                    │                              ▲          │
//! │                snapshots                          │          │
//! │                    ▼                              │          │
//! │       broadcast loop (50 ms, on change) ── JSON lines        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every platform call is serialized through one engine thread. The
//! broadcast loop polls it for snapshots and pushes the serialized state to
//! all connected clients whenever it changes; client commands flow back
//! through the same engine queue.

pub mod audio;
pub mod broadcast;
pub mod command;
pub mod directory;
pub mod engine;
pub mod server;
pub mod snapshot;
pub mod target;

use tracing::{info, warn};

/// Bind address when `VOLDECK_BIND` is not set.
const DEFAULT_BIND: &str = "0.0.0.0:8081";

/// Fan-out buffer per client; a client further behind than this skips ahead.
const UPDATE_BUFFER: usize = 16;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voldeck=info".into()),
        )
        .init();

    let engine = engine::spawn(audio::create_system, directory::SessionDirectory::new()).await?;

    match engine.devices().await {
        Ok(devices) => {
            let names: Vec<String> = devices
                .iter()
                .filter_map(|device| device.friendly_name())
                .collect();
            info!("{} audio device(s): {}", devices.len(), names.join(", "));
        }
        Err(err) => warn!("device enumeration failed: {err}"),
    }

    let (updates, _) = tokio::sync::broadcast::channel(UPDATE_BUFFER);
    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel();
    let loop_task = tokio::spawn(broadcast::run(engine.clone(), updates.clone(), shutdown_rx));

    let bind = std::env::var("VOLDECK_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("listening on {bind}");

    tokio::select! {
        result = server::serve(listener, engine, updates) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    let _ = shutdown.send(());
    let _ = loop_task.await;
    Ok(())
}
