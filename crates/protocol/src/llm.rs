//! Wire types for the outbound LLM realtime session (C2). Modeled on the
//! OpenAI realtime API event shapes; only the subset the bridge actually
//! sends/receives is represented.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `session.update` payload — turn-detection tuning, voice, instructions,
/// and the tool definitions the model may call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: InputAudioTranscription,
    pub turn_detection: TurnDetectionConfig,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetectionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u64,
    pub silence_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Messages the bridge sends to the LLM session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmCommand {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel { response_id: String },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ToolResultItem },
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResultItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub call_id: String,
    pub output: String,
}

impl ToolResultItem {
    pub fn for_tool_call(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            kind: "function_call_output".to_string(),
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// Messages the LLM session emits inbound. Unknown variants are preserved
/// so the dispatcher can log-and-ignore without dropping the connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmEvent {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,
    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseRef },
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { response_id: String, delta: String },
    /// True end-of-generation for the audio channel (§4.2, §4.6 rule 4) —
    /// distinct from `response.done`, which also covers text/tool-call-only
    /// responses with no audio at all.
    #[serde(rename = "response.audio.done")]
    ResponseAudioDone { response_id: String },
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta { response_id: String, delta: String },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone { response_id: String, transcript: String },
    #[serde(rename = "response.function_call_arguments.done")]
    ResponseFunctionCallArgumentsDone {
        response_id: String,
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseRef },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted { transcript: String },
    #[serde(rename = "error")]
    Error { error: LlmErrorBody },
    /// Any event type not modeled above. Carries the raw JSON for logging.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmErrorBody {
    pub code: String,
    pub message: String,
}

/// The one error code the caller treats as benign: racing a `response.cancel`
/// against a response that already finished.
pub const BENIGN_ERROR_CODE: &str = "response_cancel_not_active";
