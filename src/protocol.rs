//! Wire protocol for the viewer event channel
//!
//! Events are JSON objects with an `event` tag and a `data` payload; commands
//! arrive as JSON objects with a `type` tag. The shapes are fixed by the
//! browser viewer page.

use serde::{Deserialize, Serialize};

/// Acknowledgment status carried by an `audio_status` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    Started,
    AlreadyStarted,
    Stopped,
}

/// Event pushed from the relay to a viewer session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionResponse { status: String },
    AudioStatus { status: AudioStatus },
    /// One base64-encoded PCM chunk
    AudioData(String),
    AudioError { error: String },
}

impl ServerEvent {
    pub fn connection_ack() -> Self {
        Self::ConnectionResponse {
            status: "connected".to_string(),
        }
    }

    pub fn audio_status(status: AudioStatus) -> Self {
        Self::AudioStatus { status }
    }

    pub fn audio_error(error: impl Into<String>) -> Self {
        Self::AudioError {
            error: error.into(),
        }
    }
}

/// Command sent by a viewer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    StartAudio,
    StopAudio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ack_shape() {
        let json = serde_json::to_string(&ServerEvent::connection_ack()).unwrap();
        assert_eq!(
            json,
            r#"{"event":"connection_response","data":{"status":"connected"}}"#
        );
    }

    #[test]
    fn audio_status_shape() {
        let json =
            serde_json::to_string(&ServerEvent::audio_status(AudioStatus::AlreadyStarted)).unwrap();
        assert_eq!(
            json,
            r#"{"event":"audio_status","data":{"status":"already_started"}}"#
        );
    }

    #[test]
    fn audio_data_carries_bare_payload() {
        let json = serde_json::to_string(&ServerEvent::AudioData("QUJD".to_string())).unwrap();
        assert_eq!(json, r#"{"event":"audio_data","data":"QUJD"}"#);
    }

    #[test]
    fn audio_error_shape() {
        let json = serde_json::to_string(&ServerEvent::audio_error("device busy")).unwrap();
        assert_eq!(
            json,
            r#"{"event":"audio_error","data":{"error":"device busy"}}"#
        );
    }

    #[test]
    fn commands_parse() {
        let start: ClientCommand = serde_json::from_str(r#"{"type":"start_audio"}"#).unwrap();
        assert_eq!(start, ClientCommand::StartAudio);

        let stop: ClientCommand = serde_json::from_str(r#"{"type":"stop_audio"}"#).unwrap();
        assert_eq!(stop, ClientCommand::StopAudio);

        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"mute"}"#).is_err());
    }
}
