//! Structured call-lifecycle events. Each variant is emitted through
//! `tracing` as a single structured `info!` record rather than a free-form
//! message, so a log pipeline can filter/aggregate by `event`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent<'a> {
    CallStarted {
        call_id: &'a str,
        caller_number: &'a str,
    },
    IdentificationResolved {
        call_id: &'a str,
        found: bool,
        error: bool,
    },
    LlmSessionUpdated {
        call_id: &'a str,
    },
    BargeIn {
        call_id: &'a str,
        response_id: &'a str,
    },
    CooldownArmed {
        call_id: &'a str,
        duration_ms: u64,
    },
    CooldownExpired {
        call_id: &'a str,
    },
    ToolDispatched {
        call_id: &'a str,
        tool_name: &'a str,
        call_ref: &'a str,
    },
    ToolFailed {
        call_id: &'a str,
        tool_name: &'a str,
        error: &'a str,
    },
    HandoffRequested {
        call_id: &'a str,
        reason: &'a str,
    },
    TranscriptAppended {
        call_id: &'a str,
        speaker: &'a str,
    },
    CallEnded {
        call_id: &'a str,
        duration_ms: u64,
    },
}

impl<'a> TraceEvent<'a> {
    /// Emits this event as a single structured `tracing::info!` record.
    pub fn emit(&self) {
        match serde_json::to_value(self) {
            Ok(value) => tracing::info!(target: "voicebridge::trace", event = %value, "trace"),
            Err(e) => tracing::warn!("failed to serialize trace event: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_tagged_event_field() {
        let event = TraceEvent::BargeIn {
            call_id: "CA1",
            response_id: "resp_1",
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "barge_in");
        assert_eq!(value["call_id"], "CA1");
    }
}
