//! Web server for viewers
//!
//! Three endpoints: the viewer page, the multipart video feed, and the
//! WebSocket event channel carrying audio and control traffic.

pub mod video;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{response::Html, routing::get, Router};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::capture::video::FrameReceiver;
use crate::hub::BroadcastHub;
use crate::Result;

/// Shared state handed to every handler
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub frames: FrameReceiver,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/video_feed", get(video::video_feed))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Viewer page, embedded so the binary is self-contained
async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}

/// Serve until the shutdown channel fires.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("viewer server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    Ok(())
}
