//! Wire protocol types for the two WebSocket peers the bridge mediates
//! between: the streaming LLM (§4.2) and the telephony carrier's media
//! stream (§4.3). Both are treated as tagged unions so unknown event kinds
//! degrade to a diagnostic variant rather than breaking the connection
//! (§9 — "any/loose JSON in LLM event payloads").

pub mod carrier;
pub mod llm;

pub use carrier::{CarrierCommand, CarrierEvent, CustomParameters};
pub use llm::{
    InputAudioTranscription, LlmCommand, LlmEvent, SessionConfig, ToolDefinition, ToolResultItem,
    TurnDetectionConfig, BENIGN_ERROR_CODE,
};
