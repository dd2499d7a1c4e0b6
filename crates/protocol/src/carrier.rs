//! Carrier media-stream wire types (C3, §4.3). JSON frames over the
//! inbound WebSocket the carrier opens once the webhook (C8) hands it a
//! `<Stream>` URL.

use serde::{Deserialize, Serialize};

/// Parameters the carrier echoes back verbatim from the webhook's XML
/// `<Parameter>` elements on the `start` event. `customer_context` is the
/// base64(JSON) `IdentificationContext` (§3); decoding it is the caller's
/// job, not this wire type's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomParameters {
    #[serde(rename = "customerContext")]
    pub customer_context: String,
    #[serde(rename = "callerPhone")]
    pub caller_phone: String,
    #[serde(rename = "callSid")]
    pub call_sid: String,
}

/// Inbound frames from the carrier. Unknown kinds become [`CarrierEvent::Unknown`]
/// rather than closing the socket — a single malformed/unrecognized frame is
/// never fatal to the call (§7, CarrierMalformed).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierEvent {
    Connected,
    Start {
        #[serde(rename = "streamSid")]
        stream_id: String,
        start: StartPayload,
    },
    Media {
        media: MediaPayload,
    },
    Stop {
        #[serde(default)]
        #[serde(rename = "streamSid")]
        stream_id: Option<String>,
    },
    Mark {
        mark: MarkPayload,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartPayload {
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "customParameters")]
    pub custom_parameters: CustomParameters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// The mark name the mediator uses to learn true end-of-playback (§4.6
/// rule 4/5), as opposed to end-of-generation.
pub const AUDIO_COMPLETE_MARK: &str = "audio-complete";

/// Outbound frames to the carrier.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierCommand {
    Media {
        #[serde(rename = "streamSid")]
        stream_id: String,
        media: OutboundMedia,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_id: String,
        mark: OutboundMark,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_id: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMark {
    pub name: String,
}

impl CarrierCommand {
    pub fn media(stream_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Media {
            stream_id: stream_id.into(),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }

    pub fn audio_complete_mark(stream_id: impl Into<String>) -> Self {
        Self::Mark {
            stream_id: stream_id.into(),
            mark: OutboundMark {
                name: AUDIO_COMPLETE_MARK.to_string(),
            },
        }
    }

    pub fn clear(stream_id: impl Into<String>) -> Self {
        Self::Clear {
            stream_id: stream_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_event_carries_custom_parameters() {
        let raw = r#"{
            "event": "start",
            "streamSid": "MZ123",
            "start": {
                "callSid": "CA1",
                "customParameters": {
                    "customerContext": "eyJmb3VuZCI6ZmFsc2V9",
                    "callerPhone": "+815012345678",
                    "callSid": "CA1"
                }
            }
        }"#;
        let event: CarrierEvent = serde_json::from_str(raw).unwrap();
        match event {
            CarrierEvent::Start { stream_id, start } => {
                assert_eq!(stream_id, "MZ123");
                assert_eq!(start.custom_parameters.caller_phone, "+815012345678");
            }
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn mark_event_parses_name() {
        let raw = r#"{"event":"mark","mark":{"name":"audio-complete"}}"#;
        let event: CarrierEvent = serde_json::from_str(raw).unwrap();
        match event {
            CarrierEvent::Mark { mark } => assert_eq!(mark.name, AUDIO_COMPLETE_MARK),
            _ => panic!("expected Mark"),
        }
    }

    #[test]
    fn unrecognized_event_kind_is_unknown_not_a_parse_error() {
        let raw = r#"{"event":"something-new-the-carrier-added"}"#;
        let event: CarrierEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, CarrierEvent::Unknown));
    }

    #[test]
    fn outbound_media_serializes_expected_shape() {
        let cmd = CarrierCommand::media("MZ1", "base64audio");
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["media"]["payload"], "base64audio");
    }
}
