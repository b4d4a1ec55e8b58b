//! Device handles
//!
//! Thin synchronous wrappers around one hardware source each, exposing a
//! blocking "read next unit" primitive. A handle is owned exclusively by the
//! capture loop that reads it and released when that loop exits.

pub mod camera;
pub mod microphone;
pub mod mock;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{AudioError, VideoError};

pub use camera::NokhwaCamera;
pub use microphone::{select_input_device, CpalMicrophone, CpalMicrophoneOpener};

/// One decoded camera frame, RGB8 interleaved
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One fixed-size block of mono 16-bit samples
#[derive(Debug, Clone, PartialEq)]
pub struct PcmChunk {
    pub samples: Vec<i16>,
}

impl PcmChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Raw little-endian sample bytes, the layout the viewer decodes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// Transport-safe text encoding of the sample bytes
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_le_bytes())
    }
}

/// Blocking frame producer, owned by the video capture loop
pub trait FrameSource: Send {
    /// Read the next frame, blocking until one is available or the device
    /// fails. A failure is terminal for the caller's read loop.
    fn read_frame(&mut self) -> Result<RawFrame, VideoError>;
}

/// Blocking chunk producer, owned by one audio capture worker
pub trait ChunkSource {
    /// Read the next chunk of samples, blocking up to the read timeout.
    fn read_chunk(&mut self) -> Result<PcmChunk, AudioError>;
}

/// Opens a microphone handle for one streaming period.
///
/// Opening happens on every `start_audio` command and can fail (device busy);
/// the handle is dropped when the worker exits, so the microphone is never
/// held while streaming is inactive.
pub trait MicrophoneOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn ChunkSource>, AudioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_bytes_are_little_endian() {
        let chunk = PcmChunk::new(vec![0, 1, -1, 256]);
        assert_eq!(
            chunk.to_le_bytes(),
            vec![0x00, 0x00, 0x01, 0x00, 0xff, 0xff, 0x00, 0x01]
        );
    }

    #[test]
    fn chunk_base64_round_trips() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let chunk = PcmChunk::new(vec![12345, -32768, 32767]);
        let encoded = chunk.to_base64();
        let decoded = STANDARD.decode(&encoded).unwrap();
        assert_eq!(decoded, chunk.to_le_bytes());
    }
}
