//! Monitor relay binary
//!
//! Opens the camera, wires the capture loops to the broadcast hub, and serves
//! viewers until interrupted. Device handles are released unconditionally on
//! the way out.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use monitor_relay::{
    capture::video::{frame_cell, spawn_video_loop, VideoSettings},
    config::RelayConfig,
    device::{CpalMicrophoneOpener, NokhwaCamera},
    hub::BroadcastHub,
    lifecycle::Shutdown,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "relay.toml".to_string());
    let config = RelayConfig::load(Path::new(&config_path))?;
    let addr = config.bind_addr()?;

    tracing::info!("starting monitor relay");

    let shutdown = Shutdown::new();
    let (frame_tx, frame_rx) = frame_cell();

    // The camera is opened once at startup and owned by the video loop for
    // the process lifetime. Camera absence disables video but not the relay.
    let video_handle = match NokhwaCamera::open(config.video.camera_index) {
        Ok(camera) => Some(spawn_video_loop(
            Box::new(camera),
            VideoSettings::from(&config.video),
            frame_tx,
            shutdown.flag(),
        )?),
        Err(e) => {
            tracing::warn!("camera unavailable, video disabled: {}", e);
            None
        }
    };

    let opener = Arc::new(CpalMicrophoneOpener::new(config.audio.clone()));
    let hub = Arc::new(BroadcastHub::new(opener));

    let state = Arc::new(AppState {
        hub: hub.clone(),
        frames: frame_rx,
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_shutdown.trigger();
        }
    });

    server::serve(state, addr, shutdown.subscribe()).await?;

    // Release the microphone and camera before exiting
    shutdown.trigger();
    hub.shutdown();
    if let Some(handle) = video_handle {
        let _ = tokio::task::spawn_blocking(move || handle.join()).await;
    }

    tracing::info!("monitor relay stopped");
    Ok(())
}
