//! Broadcast hub
//!
//! Owns the session registry and the audio streaming state machine. Media
//! units flow capture loop → hub → sessions; control commands flow session →
//! hub → audio worker.
//!
//! The streaming state is `Idle` or `Active(worker)` and is only mutated
//! through the command methods below, under one mutex, so concurrent start
//! and stop commands from different sessions cannot race. Commands apply
//! globally: any session's stop halts audio for every session.

pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::capture::audio::AudioWorker;
use crate::device::MicrophoneOpener;
use crate::protocol::{AudioStatus, ServerEvent};

pub use registry::{SessionId, SessionRegistry};

/// How long a start command waits for a previously stopped worker to finish
/// draining before rejecting the start. The worker exits within one chunk
/// read (~23 ms), so this is generous.
const DRAIN_GRACE_STEP: Duration = Duration::from_millis(25);
const DRAIN_GRACE_STEPS: u32 = 10;

enum StreamingState {
    Idle,
    Active(AudioWorker),
}

/// Routes media to sessions and control commands to the audio worker
pub struct BroadcastHub {
    registry: Arc<SessionRegistry>,
    state: Mutex<StreamingState>,
    /// A stopped worker drains here until its thread exits
    draining: Mutex<Option<AudioWorker>>,
    opener: Arc<dyn MicrophoneOpener>,
}

impl BroadcastHub {
    pub fn new(opener: Arc<dyn MicrophoneOpener>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            state: Mutex::new(StreamingState::Idle),
            draining: Mutex::new(None),
            opener,
        }
    }

    pub fn register_session(&self, id: SessionId, tx: UnboundedSender<ServerEvent>) {
        self.registry.register(id, tx);
    }

    pub fn unregister_session(&self, id: SessionId) {
        self.registry.unregister(id);
    }

    pub fn send_to(&self, id: SessionId, event: ServerEvent) {
        self.registry.send_to(id, event);
    }

    pub fn broadcast(&self, event: ServerEvent) {
        self.registry.broadcast(event);
    }

    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Start audio streaming. Idempotent: a second start while a worker is
    /// running acknowledges `already_started` instead of spawning a duplicate.
    pub fn start_audio(&self, requester: SessionId) {
        self.reap_finished();
        let mut state = self.state.lock();

        if matches!(&*state, StreamingState::Active(_)) {
            tracing::debug!("start_audio while already active");
            self.registry
                .send_to(requester, ServerEvent::audio_status(AudioStatus::AlreadyStarted));
            return;
        }

        // A previously stopped worker may still hold the microphone for one
        // more read; wait it out so the new open does not collide with it.
        if !self.wait_for_drain() {
            tracing::warn!("previous audio worker still draining, rejecting start");
            self.registry
                .send_to(requester, ServerEvent::audio_status(AudioStatus::AlreadyStarted));
            return;
        }

        match AudioWorker::spawn(self.opener.clone(), self.registry.clone()) {
            Ok(worker) => {
                *state = StreamingState::Active(worker);
                self.registry
                    .send_to(requester, ServerEvent::audio_status(AudioStatus::Started));
            }
            Err(e) => {
                tracing::error!("failed to spawn audio worker: {}", e);
                self.registry
                    .send_to(requester, ServerEvent::audio_error(e.to_string()));
            }
        }
    }

    /// Stop audio streaming. A signal, not a synchronous join: the worker
    /// observes it within one chunk read. Idempotent while idle.
    pub fn stop_audio(&self, requester: SessionId) {
        self.reap_finished();
        let mut state = self.state.lock();

        if let StreamingState::Active(worker) =
            std::mem::replace(&mut *state, StreamingState::Idle)
        {
            worker.signal_stop();
            *self.draining.lock() = Some(worker);
        }

        self.registry
            .send_to(requester, ServerEvent::audio_status(AudioStatus::Stopped));
    }

    /// Whether an audio worker is currently running
    pub fn is_audio_active(&self) -> bool {
        self.reap_finished();
        matches!(&*self.state.lock(), StreamingState::Active(_))
    }

    /// Stop and join all audio workers. Called on process shutdown so the
    /// microphone is released before exit.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), StreamingState::Idle);
        if let StreamingState::Active(worker) = previous {
            worker.signal_stop();
            worker.join();
        }
        if let Some(worker) = self.draining.lock().take() {
            worker.signal_stop();
            worker.join();
        }
    }

    /// A worker that hit a fatal capture error exits on its own; fold that
    /// back into the state machine so a later start can retry cleanly.
    fn reap_finished(&self) {
        let mut state = self.state.lock();
        if matches!(&*state, StreamingState::Active(w) if w.is_finished()) {
            if let StreamingState::Active(worker) =
                std::mem::replace(&mut *state, StreamingState::Idle)
            {
                worker.join();
            }
        }
    }

    /// Returns false if a stopped worker is still draining after the grace
    /// period.
    fn wait_for_drain(&self) -> bool {
        let mut slot = self.draining.lock();
        let Some(worker) = slot.take() else {
            return true;
        };
        for _ in 0..DRAIN_GRACE_STEPS {
            if worker.is_finished() {
                worker.join();
                return true;
            }
            std::thread::sleep(DRAIN_GRACE_STEP);
        }
        *slot = Some(worker);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockMicrophoneOpener;
    use crate::protocol::AudioStatus;
    use proptest::prelude::*;
    use std::thread::sleep;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn hub_with(opener: MockMicrophoneOpener) -> (Arc<MockMicrophoneOpener>, BroadcastHub) {
        let opener = Arc::new(opener);
        let hub = BroadcastHub::new(opener.clone());
        (opener, hub)
    }

    fn connect(hub: &BroadcastHub) -> (SessionId, UnboundedReceiver<ServerEvent>) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register_session(id, tx);
        (id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn statuses(events: &[ServerEvent]) -> Vec<AudioStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                ServerEvent::AudioStatus { status } => Some(*status),
                _ => None,
            })
            .collect()
    }

    fn count_data(events: &[ServerEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ServerEvent::AudioData(_)))
            .count()
    }

    fn count_errors(events: &[ServerEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ServerEvent::AudioError { .. }))
            .count()
    }

    #[test]
    fn start_is_idempotent() {
        let (opener, hub) = hub_with(MockMicrophoneOpener::new());
        let (id, mut rx) = connect(&hub);

        hub.start_audio(id);
        hub.start_audio(id);
        sleep(Duration::from_millis(50));

        assert_eq!(opener.open_count(), 1);
        assert!(opener.live_count() <= 1);
        assert!(hub.is_audio_active());

        let events = drain(&mut rx);
        assert_eq!(
            statuses(&events),
            vec![AudioStatus::Started, AudioStatus::AlreadyStarted]
        );

        hub.shutdown();
    }

    #[test]
    fn stop_while_idle_is_a_noop() {
        let (opener, hub) = hub_with(MockMicrophoneOpener::new());
        let (id, mut rx) = connect(&hub);

        hub.stop_audio(id);

        assert!(!hub.is_audio_active());
        assert_eq!(opener.open_count(), 0);
        assert_eq!(statuses(&drain(&mut rx)), vec![AudioStatus::Stopped]);
    }

    #[test]
    fn stop_halts_data_and_releases_microphone() {
        let (opener, hub) = hub_with(MockMicrophoneOpener::new());
        let (id, mut rx) = connect(&hub);

        hub.start_audio(id);
        sleep(Duration::from_millis(40));
        assert!(hub.is_audio_active());

        hub.stop_audio(id);
        // The transition to Idle is immediate; only the worker's exit lags
        assert!(!hub.is_audio_active());

        // Worker observes the flag within one read period
        sleep(Duration::from_millis(100));
        assert_eq!(opener.live_count(), 0);

        drain(&mut rx);
        sleep(Duration::from_millis(60));
        let late = drain(&mut rx);
        assert_eq!(count_data(&late), 0, "audio_data after stop: {late:?}");
    }

    #[test]
    fn open_failure_reports_one_error_and_allows_retry() {
        let (opener, hub) = hub_with(MockMicrophoneOpener::new().failing_opens(1));
        let (id, mut rx) = connect(&hub);

        hub.start_audio(id);
        sleep(Duration::from_millis(50));

        assert!(!hub.is_audio_active());
        let events = drain(&mut rx);
        assert_eq!(count_errors(&events), 1);
        assert_eq!(count_data(&events), 0);

        // Device freed up: a retry succeeds
        hub.start_audio(id);
        sleep(Duration::from_millis(50));
        assert!(hub.is_audio_active());
        assert_eq!(opener.open_count(), 2);

        hub.shutdown();
    }

    #[test]
    fn read_failure_resets_to_idle_and_allows_retry() {
        let (opener, hub) = hub_with(
            MockMicrophoneOpener::new()
                .with_read_delay(Duration::from_millis(2))
                .failing_reads_after(2),
        );
        let (id, mut rx) = connect(&hub);

        hub.start_audio(id);
        sleep(Duration::from_millis(100));

        assert!(!hub.is_audio_active());
        assert_eq!(opener.live_count(), 0);

        let events = drain(&mut rx);
        assert_eq!(count_data(&events), 2);
        assert_eq!(count_errors(&events), 1);

        hub.start_audio(id);
        sleep(Duration::from_millis(20));
        assert!(hub.is_audio_active());

        hub.shutdown();
    }

    #[test]
    fn stop_scope_is_global() {
        let (_opener, hub) = hub_with(MockMicrophoneOpener::new());
        let (a, mut rx_a) = connect(&hub);
        let (b, mut rx_b) = connect(&hub);

        hub.start_audio(a);
        sleep(Duration::from_millis(40));

        // Both sessions receive chunks while active
        assert!(count_data(&drain(&mut rx_a)) > 0);
        assert!(count_data(&drain(&mut rx_b)) > 0);

        // A stop from the other session halts audio for everyone
        hub.stop_audio(b);
        sleep(Duration::from_millis(100));
        drain(&mut rx_a);
        drain(&mut rx_b);

        sleep(Duration::from_millis(60));
        assert_eq!(count_data(&drain(&mut rx_a)), 0);
        assert_eq!(count_data(&drain(&mut rx_b)), 0);
    }

    #[test]
    fn at_most_one_worker_holds_the_microphone() {
        let (opener, hub) = hub_with(MockMicrophoneOpener::new());
        let (a, _rx_a) = connect(&hub);
        let (b, _rx_b) = connect(&hub);

        hub.start_audio(a);
        hub.start_audio(b);
        for _ in 0..20 {
            assert!(opener.live_count() <= 1);
            sleep(Duration::from_millis(5));
        }
        assert_eq!(opener.open_count(), 1);

        hub.shutdown();
        assert_eq!(opener.live_count(), 0);
    }

    #[test]
    fn shutdown_joins_draining_worker() {
        let (opener, hub) = hub_with(MockMicrophoneOpener::new());
        let (id, _rx) = connect(&hub);

        hub.start_audio(id);
        sleep(Duration::from_millis(20));
        hub.stop_audio(id);
        hub.shutdown();

        assert_eq!(opener.live_count(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Active after a command sequence iff the last state-changing
        /// command was a start (and no read failure intervened).
        #[test]
        fn state_follows_last_command(commands in proptest::collection::vec(any::<bool>(), 0..8)) {
            let opener = Arc::new(
                MockMicrophoneOpener::new().with_read_delay(Duration::from_millis(2)),
            );
            let hub = BroadcastHub::new(opener);
            let (id, _rx) = connect(&hub);

            for &start in &commands {
                if start {
                    hub.start_audio(id);
                } else {
                    hub.stop_audio(id);
                }
            }

            let expected = commands.last().copied().unwrap_or(false);
            prop_assert_eq!(hub.is_audio_active(), expected);
            hub.shutdown();
        }
    }
}
