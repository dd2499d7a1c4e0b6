//! Process-wide services every call shares. Scaled down from the teacher's
//! `AppState` (~25 fields covering sessions, skills, workspace, nodes,
//! schedules, runs, ...) to the handful this bridge actually needs: one
//! order backend client, one tool dispatcher, one transcript sink, and the
//! config/tool-schema values every call reads but never mutates.

use std::sync::Arc;

use vb_domain::config::Config;
use vb_order_backend::OrderBackendClient;
use vb_protocol::ToolDefinition;
use vb_sessions::TranscriptSink;
use vb_tools::ToolDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// C8 needs this directly for the webhook's synchronous phone lookup;
    /// C4's dispatcher holds its own `Arc` to the same client.
    pub order_backend: Arc<OrderBackendClient>,
    pub tool_dispatcher: Arc<ToolDispatcher>,
    pub tool_defs: Arc<Vec<ToolDefinition>>,
    pub transcript_sink: Arc<TranscriptSink>,
}
