//! Per-call session state shared between the carrier socket task, the LLM
//! session task, and the turn arbiter. See §3 and §4.7 invariants (a)-(d).

use serde::{Deserialize, Serialize};

use crate::call::{CallIdentity, IdentificationContext};

/// Call lifecycle phase. Transitions are driven by the mediator (§4.7); the
/// turn arbiter only reads `Listening`/`Responding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Connecting,
    Greeting,
    Listening,
    Responding,
    InTool,
    Closing,
}

/// Mutable per-call state.
///
/// Invariants (§4.7):
/// (a) `state == Responding` implies an active LLM response id is set.
/// (b) `state == InTool` implies at least one tool call is in flight.
/// (c) a cooldown armed for caller audio always has a corresponding
///     `CooldownArmed` trace event preceding it.
/// (d) `identification` is set exactly once, before the first `Listening`
///     transition.
/// (e) `initialized` is false for the entire `connecting` phase; caller
///     audio is forwarded only once it is true (§3, §4.7).
#[derive(Debug, Clone)]
pub struct SessionState {
    pub identity: CallIdentity,
    pub identification: Option<IdentificationContext>,
    pub state: CallState,
    pub active_response_id: Option<String>,
    pub tool_calls_in_flight: u32,
    /// True once the LLM session config has been acknowledged (or the
    /// non-fatal `session.updated` wait has timed out and the mediator is
    /// proceeding anyway). Caller audio is forwarded iff
    /// `!gate_caller_audio() && initialized` — see §4.7.
    pub initialized: bool,
}

impl SessionState {
    pub fn new(identity: CallIdentity) -> Self {
        Self {
            identity,
            identification: None,
            state: CallState::Connecting,
            active_response_id: None,
            tool_calls_in_flight: 0,
            initialized: false,
        }
    }

    pub fn set_identification(&mut self, ctx: IdentificationContext) {
        self.identification = Some(ctx);
    }

    /// Invariant (e): flips once, after the `connecting` phase's session
    /// config push resolves (acknowledged or non-fatally timed out).
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn enter_responding(&mut self, response_id: String) {
        self.state = CallState::Responding;
        self.active_response_id = Some(response_id);
    }

    pub fn leave_responding(&mut self) {
        self.active_response_id = None;
        if self.tool_calls_in_flight == 0 {
            self.state = CallState::Listening;
        }
    }

    pub fn enter_tool(&mut self) {
        self.tool_calls_in_flight += 1;
        self.state = CallState::InTool;
    }

    pub fn leave_tool(&mut self) {
        self.tool_calls_in_flight = self.tool_calls_in_flight.saturating_sub(1);
        if self.tool_calls_in_flight == 0 && self.active_response_id.is_none() {
            self.state = CallState::Listening;
        }
    }

    /// Invariant (a): checked by callers before trusting `active_response_id`.
    pub fn is_responding(&self) -> bool {
        self.state == CallState::Responding && self.active_response_id.is_some()
    }

    /// Invariant (b).
    pub fn is_in_tool(&self) -> bool {
        self.state == CallState::InTool && self.tool_calls_in_flight > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity() -> CallIdentity {
        CallIdentity {
            call_id: "CA123".into(),
            caller_number: "+818012345678".into(),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn initialized_starts_false_and_is_set_once() {
        let mut s = SessionState::new(identity());
        assert!(!s.initialized);
        s.mark_initialized();
        assert!(s.initialized);
    }

    #[test]
    fn responding_invariant_holds_across_transitions() {
        let mut s = SessionState::new(identity());
        assert!(!s.is_responding());
        s.enter_responding("resp_1".into());
        assert!(s.is_responding());
        s.leave_responding();
        assert!(!s.is_responding());
        assert_eq!(s.state, CallState::Listening);
    }

    #[test]
    fn tool_invariant_tracks_concurrent_calls() {
        let mut s = SessionState::new(identity());
        s.enter_tool();
        s.enter_tool();
        assert!(s.is_in_tool());
        assert_eq!(s.tool_calls_in_flight, 2);
        s.leave_tool();
        assert!(s.is_in_tool());
        s.leave_tool();
        assert!(!s.is_in_tool());
        assert_eq!(s.state, CallState::Listening);
    }

    #[test]
    fn tool_call_during_response_keeps_listening_deferred() {
        let mut s = SessionState::new(identity());
        s.enter_responding("resp_1".into());
        s.enter_tool();
        s.leave_responding();
        // tool still in flight: must not fall back to Listening yet.
        assert_eq!(s.state, CallState::InTool);
        s.leave_tool();
        assert_eq!(s.state, CallState::Listening);
    }
}
