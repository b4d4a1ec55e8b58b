//! Audio capture worker
//!
//! One worker exists per streaming period: spawned by the broadcast hub on a
//! start command, it opens the microphone, reads fixed-size chunks and pushes
//! each one to every connected session as a base64 `audio_data` event.
//!
//! Stopping is a signal, not a forced interrupt. The worker re-checks its
//! running flag after every chunk read (~23 ms), so stop latency is bounded
//! by one read period. The microphone handle is dropped on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::device::MicrophoneOpener;
use crate::error::AudioError;
use crate::hub::registry::SessionRegistry;
use crate::protocol::ServerEvent;

/// Handle to a running audio capture worker, held by the broadcast hub
pub struct AudioWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl AudioWorker {
    /// Spawn a worker that opens the microphone and streams chunks until
    /// stopped or the device fails.
    ///
    /// Device open failure is not a spawn failure: the worker reports it as a
    /// single `audio_error` event and exits, leaving the hub free to retry on
    /// a later start command.
    pub fn spawn(
        opener: Arc<dyn MicrophoneOpener>,
        registry: Arc<SessionRegistry>,
    ) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let mut source = match opener.open() {
                    Ok(source) => source,
                    Err(e) => {
                        tracing::warn!("failed to open microphone: {}", e);
                        registry.broadcast(ServerEvent::audio_error(e.to_string()));
                        running_for_loop.store(false, Ordering::SeqCst);
                        return;
                    }
                };

                tracing::info!("audio streaming started");

                while running_for_loop.load(Ordering::SeqCst) {
                    match source.read_chunk() {
                        Ok(chunk) => {
                            registry.broadcast(ServerEvent::AudioData(chunk.to_base64()));
                        }
                        Err(e) => {
                            tracing::warn!("audio read failed: {}", e);
                            registry.broadcast(ServerEvent::audio_error(e.to_string()));
                            running_for_loop.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }

                // Dropping the source releases the device handle
                tracing::info!("audio streaming stopped");
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self { running, handle })
    }

    /// Ask the worker to stop; it observes the flag at its next read boundary.
    pub fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the worker thread has exited (voluntarily or after an error)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker thread to exit.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}
