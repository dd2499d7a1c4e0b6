//! Transcript sink (C9, §4.9): an append-only, best-effort record of each
//! call. `StartCall`/`AppendMessage`/`AppendToolCall`/`EndCall` are all
//! fire-and-forget from the mediator's perspective — a write failure is
//! logged and swallowed, never propagated back into the call's turn loop.

pub mod transcript;

pub use transcript::{TranscriptRef, TranscriptSink};
