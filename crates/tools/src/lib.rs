//! Tool registry & dispatcher (C4, §4.4): declares the tool schemas handed
//! to the LLM session and routes tool calls to the order backend and the
//! email adapter, returning the `ToolResult` shapes C7 feeds back to the
//! model (or branches on, for handoff).

pub mod dispatcher;
pub mod email;
pub mod schema;

pub use dispatcher::{DispatchContext, ToolDispatcher};
pub use email::{EmailAdapter, EmailTemplate, HttpEmailAdapter};
pub use schema::tool_definitions;
