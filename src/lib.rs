//! # Monitor Relay
//!
//! Relays live video and audio from local hardware to browser viewers.
//!
//! ```text
//!  Camera ──► Video Capture Loop ──► latest-frame cell ──► GET /video_feed
//!                                    (overwrite on publish)  multipart stream, one
//!                                                            pull task per viewer
//!
//!  Microphone ──► Audio Capture Loop ──► Broadcast Hub ──► WebSocket sessions
//!                 (start/stop lifecycle)       ▲             (audio_data events)
//!                                              │
//!  WebSocket session ──── start_audio / stop_audio commands
//! ```
//!
//! Video runs for the process lifetime and never queues frames: a slow viewer
//! sees the most recent frame only. Audio runs as at most one worker at a
//! time, started and stopped globally by viewer commands; the microphone is
//! held only while streaming is active.

pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Audio sample rate in Hz
    pub const SAMPLE_RATE: u32 = 44_100;

    /// Samples per audio chunk (~23 ms at 44.1 kHz, bounds stop latency)
    pub const CHUNK_SAMPLES: usize = 1024;

    /// Canonical frame width after resize
    pub const FRAME_WIDTH: u32 = 640;

    /// Canonical frame height after resize
    pub const FRAME_HEIGHT: u32 = 480;

    /// JPEG quality for encoded frames (0-100)
    pub const JPEG_QUALITY: u8 = 85;

    /// Default HTTP port for the viewer server
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// Boundary marker for the multipart video stream
    pub const MULTIPART_BOUNDARY: &str = "frame";

    /// How long a chunk read waits for samples before reporting a stall
    pub const CHUNK_READ_TIMEOUT: Duration = Duration::from_millis(500);
}
