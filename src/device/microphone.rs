//! Microphone handle backed by cpal
//!
//! cpal delivers samples through a callback, so the handle bridges the
//! callback into the blocking `read_chunk` primitive the audio capture loop
//! expects: the input stream pushes sample batches into a bounded channel and
//! `read_chunk` accumulates exactly one chunk per call.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

use crate::config::AudioConfig;
use crate::constants::CHUNK_READ_TIMEOUT;
use crate::device::{ChunkSource, MicrophoneOpener, PcmChunk};
use crate::error::AudioError;

/// Batches of samples buffered between the cpal callback and `read_chunk`
const CALLBACK_CHANNEL_CAPACITY: usize = 32;

/// Select the input device the relay should capture from.
///
/// Order of preference: explicit index from config, then the first input
/// device whose name matches a configured keyword, then the default input
/// device.
pub fn select_input_device(config: &AudioConfig) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    if let Some(index) = config.device_index {
        return host
            .input_devices()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
            .nth(index)
            .ok_or_else(|| AudioError::DeviceNotFound(format!("no input device at index {index}")));
    }

    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(name) = device.name() {
                let lower = name.to_lowercase();
                if config.keywords.iter().any(|k| lower.contains(&k.to_lowercase())) {
                    tracing::info!("using audio device by keyword match: {}", name);
                    return Ok(device);
                }
            }
        }
    }

    host.default_input_device()
        .ok_or_else(|| AudioError::DeviceNotFound("no input device available".to_string()))
}

/// An open microphone stream chunked into fixed-size reads
pub struct CpalMicrophone {
    // Held so the input stream keeps running; dropped with the handle.
    _stream: cpal::Stream,
    rx: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    chunk_samples: usize,
}

impl CpalMicrophone {
    /// Open a mono 16-bit input stream on the given device.
    pub fn open(
        device: &cpal::Device,
        sample_rate: u32,
        chunk_samples: usize,
    ) -> Result<Self, AudioError> {
        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let (tx, rx) = bounded::<Vec<i16>>(CALLBACK_CHANNEL_CAPACITY);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // A full channel means the reader has stopped; drop samples
                    // rather than block the audio callback.
                    let _ = tx.try_send(data.to_vec());
                },
                |err| tracing::warn!("input stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::OpenFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::OpenFailed(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            rx,
            pending: Vec::with_capacity(chunk_samples * 2),
            chunk_samples,
        })
    }
}

impl ChunkSource for CpalMicrophone {
    fn read_chunk(&mut self) -> Result<PcmChunk, AudioError> {
        while self.pending.len() < self.chunk_samples {
            match self.rx.recv_timeout(CHUNK_READ_TIMEOUT) {
                Ok(batch) => self.pending.extend(batch),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(AudioError::StreamError("audio input stalled".to_string()))
                }
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::Disconnected),
            }
        }

        let samples: Vec<i16> = self.pending.drain(..self.chunk_samples).collect();
        Ok(PcmChunk::new(samples))
    }
}

/// Opens `CpalMicrophone` handles for the broadcast hub.
///
/// Device selection runs on every open so a device freed up or plugged in
/// since the last attempt is picked up by a retry.
pub struct CpalMicrophoneOpener {
    config: AudioConfig,
}

impl CpalMicrophoneOpener {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl MicrophoneOpener for CpalMicrophoneOpener {
    fn open(&self) -> Result<Box<dyn ChunkSource>, AudioError> {
        let device = select_input_device(&self.config)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("opening microphone: {}", name);

        let microphone =
            CpalMicrophone::open(&device, self.config.sample_rate, self.config.chunk_samples)?;
        Ok(Box::new(microphone))
    }
}
