//! Hardware-free devices for tests and CI
//!
//! These generate synthetic frames and audio so the full relay pipeline can
//! be exercised without a camera or microphone attached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::device::{ChunkSource, FrameSource, MicrophoneOpener, PcmChunk, RawFrame};
use crate::error::{AudioError, VideoError};

/// A camera that yields a fixed number of frames, then fails like a
/// disconnected device.
pub struct MockCamera {
    remaining: usize,
    emitted: u64,
    width: u32,
    height: u32,
    frame_delay: Duration,
}

impl MockCamera {
    pub fn with_frames(count: usize, width: u32, height: u32) -> Self {
        Self {
            remaining: count,
            emitted: 0,
            width,
            height,
            frame_delay: Duration::ZERO,
        }
    }

    /// Pace frame delivery to simulate a real sensor.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }
}

impl FrameSource for MockCamera {
    fn read_frame(&mut self) -> Result<RawFrame, VideoError> {
        if self.remaining == 0 {
            return Err(VideoError::CaptureFailed("end of stream".to_string()));
        }
        if !self.frame_delay.is_zero() {
            std::thread::sleep(self.frame_delay);
        }
        self.remaining -= 1;
        self.emitted += 1;

        // Solid shade varying per frame so consumers can tell frames apart
        let shade = (self.emitted % 256) as u8;
        Ok(RawFrame {
            data: vec![shade; (self.width * self.height * 3) as usize],
            width: self.width,
            height: self.height,
        })
    }
}

/// A microphone producing a continuous 440 Hz tone, with scriptable read
/// failures.
pub struct MockMicrophone {
    sample_rate: u32,
    chunk_samples: usize,
    read_delay: Duration,
    chunks_read: usize,
    fail_after: Option<usize>,
    phase: u64,
    live: Arc<AtomicUsize>,
}

impl ChunkSource for MockMicrophone {
    fn read_chunk(&mut self) -> Result<PcmChunk, AudioError> {
        if let Some(limit) = self.fail_after {
            if self.chunks_read >= limit {
                return Err(AudioError::StreamError("device read failed".to_string()));
            }
        }
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        self.chunks_read += 1;

        let mut samples = Vec::with_capacity(self.chunk_samples);
        for _ in 0..self.chunk_samples {
            let t = self.phase as f64 / f64::from(self.sample_rate);
            let value = (2.0 * std::f64::consts::PI * 440.0 * t).sin();
            samples.push((value * 16384.0) as i16);
            self.phase += 1;
        }
        Ok(PcmChunk::new(samples))
    }
}

impl Drop for MockMicrophone {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Opener producing `MockMicrophone` handles, with scriptable open failures
/// and counters for asserting handle ownership.
pub struct MockMicrophoneOpener {
    sample_rate: u32,
    chunk_samples: usize,
    read_delay: Duration,
    fail_opens: usize,
    fail_reads_after: Option<usize>,
    opens: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl MockMicrophoneOpener {
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100,
            chunk_samples: 1024,
            read_delay: Duration::from_millis(5),
            fail_opens: 0,
            fail_reads_after: None,
            opens: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Fail the first `count` open attempts as if the device were busy.
    pub fn failing_opens(mut self, count: usize) -> Self {
        self.fail_opens = count;
        self
    }

    /// Make every opened handle fail after reading `count` chunks.
    pub fn failing_reads_after(mut self, count: usize) -> Self {
        self.fail_reads_after = Some(count);
        self
    }

    /// Total open attempts, successful or not
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Handles currently alive (holding the simulated device)
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Default for MockMicrophoneOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl MicrophoneOpener for MockMicrophoneOpener {
    fn open(&self) -> Result<Box<dyn ChunkSource>, AudioError> {
        let attempt = self.opens.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_opens {
            return Err(AudioError::OpenFailed("device busy".to_string()));
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockMicrophone {
            sample_rate: self.sample_rate,
            chunk_samples: self.chunk_samples,
            read_delay: self.read_delay,
            chunks_read: 0,
            fail_after: self.fail_reads_after,
            phase: 0,
            live: self.live.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_camera_yields_then_fails() {
        let mut camera = MockCamera::with_frames(2, 4, 4);
        assert!(camera.read_frame().is_ok());
        assert!(camera.read_frame().is_ok());
        assert!(camera.read_frame().is_err());
    }

    #[test]
    fn mock_microphone_generates_tone() {
        let opener = MockMicrophoneOpener::new().with_read_delay(Duration::ZERO);
        let mut source = opener.open().unwrap();
        let chunk = source.read_chunk().unwrap();
        assert_eq!(chunk.samples.len(), 1024);
        assert!(chunk.samples.iter().any(|&s| s > 0));
        assert!(chunk.samples.iter().any(|&s| s < 0));
    }

    #[test]
    fn opener_tracks_live_handles() {
        let opener = MockMicrophoneOpener::new();
        assert_eq!(opener.live_count(), 0);
        let source = opener.open().unwrap();
        assert_eq!(opener.live_count(), 1);
        drop(source);
        assert_eq!(opener.live_count(), 0);
        assert_eq!(opener.open_count(), 1);
    }

    #[test]
    fn opener_fails_while_busy_then_recovers() {
        let opener = MockMicrophoneOpener::new().failing_opens(1);
        assert!(opener.open().is_err());
        assert!(opener.open().is_ok());
    }
}
