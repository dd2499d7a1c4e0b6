//! LLM realtime session client (C2, §4.2): the bridge's only outbound
//! WebSocket connection per call. Owns the connect/session-update/audio/
//! tool-result operations and a typed pub/sub bus for inbound events.

pub mod events;
pub mod session;

pub use events::{EventBus, SubscriptionId};
pub use session::LlmSession;
