//! Append-only JSONL transcript store. One file per call under a configured
//! directory, keyed by [`TranscriptRef`]; `calls`/`messages`/`tool_calls`
//! rows are interleaved as tagged JSON lines in arrival order rather than
//! split into separate tables, since the sink has no query surface beyond
//! "read this call back".

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use vb_domain::error::Result;
use vb_domain::tool::ToolResult;
use vb_domain::trace::TraceEvent;
use vb_domain::transcript::Speaker;

/// Opaque handle returned by `StartCall`, threaded through the rest of a
/// call's sink operations. Currently just the call id; kept as a newtype so
/// callers can't accidentally pass a raw phone number or order id instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranscriptRef(String);

impl TranscriptRef {
    fn file_name(&self) -> String {
        format!("{}.jsonl", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TranscriptRecord {
    CallStarted {
        timestamp: String,
        caller_phone: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        customer_name: Option<String>,
        identified: bool,
    },
    Message {
        timestamp: String,
        speaker: Speaker,
        content: String,
    },
    ToolCall {
        timestamp: String,
        name: String,
        args: serde_json::Value,
        result: ToolResult,
    },
    CallEnded {
        timestamp: String,
        duration_seconds: u64,
    },
}

/// Process-wide, thread-safe append-only transcript sink (§5: "the
/// transcript sink is process-wide and thread-safe"). Holds a registry
/// mapping each open call to its file path so callers never have to pass
/// the base directory around after `StartCall`.
pub struct TranscriptSink {
    base_dir: PathBuf,
    open_calls: Mutex<HashMap<String, PathBuf>>,
}

impl TranscriptSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            open_calls: Mutex::new(HashMap::new()),
        }
    }

    /// `StartCall({callId, callerPhone, customerName?, identified}) →
    /// transcriptRef?`. Best-effort: a failure to create the file logs and
    /// returns `None`, which the caller treats as "no transcript this call".
    pub fn start_call(
        &self,
        call_id: &str,
        caller_phone: &str,
        customer_name: Option<&str>,
        identified: bool,
    ) -> Option<TranscriptRef> {
        let path = self.base_dir.join(format!("{call_id}.jsonl"));
        let record = TranscriptRecord::CallStarted {
            timestamp: Utc::now().to_rfc3339(),
            caller_phone: caller_phone.to_string(),
            customer_name: customer_name.map(str::to_string),
            identified,
        };
        if let Err(e) = self.write(&path, &record) {
            tracing::warn!(call_id, error = %e, "failed to start transcript");
            return None;
        }
        let reference = TranscriptRef(call_id.to_string());
        self.open_calls
            .lock()
            .insert(call_id.to_string(), path);
        TraceEvent::CallStarted { call_id, caller_number: caller_phone }.emit();
        Some(reference)
    }

    /// `AppendMessage({ref, speaker, content})`. Logs and returns on failure.
    pub fn append_message(&self, reference: &TranscriptRef, speaker: Speaker, content: &str) {
        let record = TranscriptRecord::Message {
            timestamp: Utc::now().to_rfc3339(),
            speaker,
            content: content.to_string(),
        };
        let label = match speaker {
            Speaker::Caller => "caller",
            Speaker::Assistant => "assistant",
            Speaker::System => "system",
            Speaker::Tool => "tool",
        };
        self.append(reference, &record, label);
    }

    /// `AppendToolCall({ref, name, args, result})`.
    pub fn append_tool_call(
        &self,
        reference: &TranscriptRef,
        name: &str,
        args: serde_json::Value,
        result: &ToolResult,
    ) {
        let record = TranscriptRecord::ToolCall {
            timestamp: Utc::now().to_rfc3339(),
            name: name.to_string(),
            args,
            result: result.clone(),
        };
        self.append(reference, &record, "tool");
    }

    /// `EndCall({ref, durationSeconds})`. Removes the call from the open
    /// registry regardless of whether the final write succeeds.
    pub fn end_call(&self, reference: TranscriptRef, duration_seconds: u64) {
        let record = TranscriptRecord::CallEnded {
            timestamp: Utc::now().to_rfc3339(),
            duration_seconds,
        };
        self.append(&reference, &record, "system");
        self.open_calls.lock().remove(&reference.0);
        TraceEvent::CallEnded {
            call_id: &reference.0,
            duration_ms: duration_seconds.saturating_mul(1000),
        }
        .emit();
    }

    /// Read a call's transcript back (debugging / support tooling). Not on
    /// the call's critical path.
    pub fn read(&self, reference: &TranscriptRef) -> Result<Vec<serde_json::Value>> {
        let path = self.base_dir.join(reference.file_name());
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(vb_domain::error::Error::Io)?;
        let mut lines = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(v) => lines.push(v),
                Err(e) => tracing::warn!(call_id = %reference.0, error = %e, "skipping malformed transcript line"),
            }
        }
        Ok(lines)
    }

    fn append(&self, reference: &TranscriptRef, record: &TranscriptRecord, speaker_label: &str) {
        let path = self
            .open_calls
            .lock()
            .get(&reference.0)
            .cloned()
            .unwrap_or_else(|| self.base_dir.join(reference.file_name()));
        if let Err(e) = self.write(&path, record) {
            tracing::warn!(call_id = %reference.0, error = %e, "failed to append transcript line");
            return;
        }
        TraceEvent::TranscriptAppended { call_id: &reference.0, speaker: speaker_label }.emit();
    }

    fn write(&self, path: &std::path::Path, record: &TranscriptRecord) -> Result<()> {
        use std::io::Write;
        let json = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(vb_domain::error::Error::Io)?;
        file.write_all(json.as_bytes()).map_err(vb_domain::error::Error::Io)?;
        file.write_all(b"\n").map_err(vb_domain::error::Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_append_end_round_trips_through_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TranscriptSink::new(dir.path());

        let reference = sink
            .start_call("call-1", "08011112222", Some("山田花子"), true)
            .expect("start_call should succeed against a writable dir");

        sink.append_message(&reference, Speaker::Caller, "注文番号を教えてください");
        sink.append_message(&reference, Speaker::Assistant, "かしこまりました");
        sink.append_tool_call(
            &reference,
            "check_order_status",
            serde_json::json!({"order_id": "R-1"}),
            &ToolResult::Text("発送済みです".to_string()),
        );

        let lines = sink.read(&reference).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["kind"], "call_started");
        assert_eq!(lines[1]["kind"], "message");
        assert_eq!(lines[2]["kind"], "tool_call");

        sink.end_call(reference.clone(), 42);
        let lines = sink.read(&reference).unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3]["kind"], "call_ended");
        assert_eq!(lines[3]["duration_seconds"], 42);
    }

    #[test]
    fn start_call_against_unwritable_dir_returns_none_not_err() {
        let sink = TranscriptSink::new("/nonexistent/definitely/missing/dir");
        let reference = sink.start_call("call-2", "08033334444", None, false);
        assert!(reference.is_none());
    }

    #[test]
    fn read_missing_transcript_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TranscriptSink::new(dir.path());
        let reference = TranscriptRef("never-started".to_string());
        assert_eq!(sink.read(&reference).unwrap(), Vec::new());
    }
}
