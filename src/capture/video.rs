//! Video capture loop
//!
//! A single long-lived thread reads frames from the camera, resizes them to
//! the canonical resolution, JPEG-encodes them and publishes into a
//! single-slot latest-frame cell. Publishing overwrites: capture never blocks
//! on slow consumers, and a slow consumer sees the most recent frame only.
//!
//! A read failure terminates the loop. That is fatal for video capture but
//! not for the process; a missing camera is a startup-time concern, not a
//! transient fault, so there is no retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tokio::sync::watch;

use crate::config::VideoConfig;
use crate::device::{FrameSource, RawFrame};
use crate::error::VideoError;

/// One encoded frame in the latest-frame cell
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Strictly increasing capture order
    pub seq: u64,
    pub jpeg: Bytes,
}

/// Latest-frame cell handle given to video pull connections
pub type FrameReceiver = watch::Receiver<Option<Arc<VideoFrame>>>;

/// Publisher side of the latest-frame cell
pub type FrameSender = watch::Sender<Option<Arc<VideoFrame>>>;

/// Canonical resolution and quality for encoded frames
#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl From<&VideoConfig> for VideoSettings {
    fn from(config: &VideoConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Create the latest-frame cell.
pub fn frame_cell() -> (FrameSender, FrameReceiver) {
    watch::channel(None)
}

/// Spawn the video capture loop.
///
/// Runs until the source fails or the shutdown flag is raised; the camera
/// handle is dropped on every exit path.
pub fn spawn_video_loop(
    mut source: Box<dyn FrameSource>,
    settings: VideoSettings,
    publisher: FrameSender,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, VideoError> {
    thread::Builder::new()
        .name("video-capture".to_string())
        .spawn(move || {
            let mut seq: u64 = 0;
            while !shutdown.load(Ordering::SeqCst) {
                let raw = match source.read_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!("video capture ended: {}", e);
                        break;
                    }
                };

                match encode_frame(raw, &settings) {
                    Ok(jpeg) => {
                        seq += 1;
                        let _ = publisher.send(Some(Arc::new(VideoFrame { seq, jpeg })));
                    }
                    // A single bad frame is skipped, not fatal
                    Err(e) => tracing::warn!("frame encode failed: {}", e),
                }
            }
            tracing::info!("video capture loop terminated after {} frames", seq);
        })
        .map_err(|e| VideoError::CaptureFailed(e.to_string()))
}

/// Resize a raw frame to the canonical resolution and JPEG-encode it.
pub fn encode_frame(raw: RawFrame, settings: &VideoSettings) -> Result<Bytes, VideoError> {
    let image = RgbImage::from_raw(raw.width, raw.height, raw.data)
        .ok_or_else(|| VideoError::EncodeFailed("frame buffer size mismatch".to_string()))?;

    let image = if (image.width(), image.height()) != (settings.width, settings.height) {
        imageops::resize(&image, settings.width, settings.height, FilterType::Triangle)
    } else {
        image
    };

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, settings.jpeg_quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| VideoError::EncodeFailed(e.to_string()))?;

    Ok(Bytes::from(jpeg))
}
