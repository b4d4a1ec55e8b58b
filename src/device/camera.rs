//! Camera handle backed by nokhwa
//!
//! Opened once at startup and owned by the video capture loop for the process
//! lifetime; the stream is stopped when the handle drops.

use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};

use crate::device::{FrameSource, RawFrame};
use crate::error::VideoError;

pub struct NokhwaCamera {
    camera: Camera,
}

impl NokhwaCamera {
    /// Open the camera at the given index and start its stream.
    pub fn open(index: u32) -> Result<Self, VideoError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| VideoError::DeviceUnavailable(format!("camera {index}: {e}")))?;

        camera
            .open_stream()
            .map_err(|e| VideoError::DeviceUnavailable(format!("camera {index}: {e}")))?;

        tracing::info!("camera {} opened: {}", index, camera.info().human_name());

        Ok(Self { camera })
    }
}

impl FrameSource for NokhwaCamera {
    fn read_frame(&mut self) -> Result<RawFrame, VideoError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| VideoError::CaptureFailed(e.to_string()))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| VideoError::CaptureFailed(e.to_string()))?;

        Ok(RawFrame {
            width: decoded.width(),
            height: decoded.height(),
            data: decoded.into_raw(),
        })
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}

// Exclusively owned by the video capture thread after startup; never shared.
unsafe impl Send for NokhwaCamera {}
