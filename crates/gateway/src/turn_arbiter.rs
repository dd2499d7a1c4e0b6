//! Turn arbiter (C6, §4.6): the heart of the design. A pure
//! `(TurnState, ArbiterEvent) -> Vec<ArbiterAction>` function, generalized
//! from `runtime::cancel::CancelToken`'s single-bool-flag style into the
//! richer `response_active`/`echo_cooldown` pair the spec's rules 1-7
//! require, plus the explicit "arming a new timer disarms the prior"
//! discipline that token carries over unchanged.
//!
//! The mediator owns the actual cooldown timer (a `tokio::time::Sleep`)
//! and feeds its expiry back in as `ArbiterEvent::CooldownExpired` — this
//! module never touches a clock itself, so every rule is directly
//! unit-testable without `tokio::time::pause`.

use vb_domain::config::TurnConfig;

/// Everything the arbiter needs to decide the next action. Owned by the
/// mediator, mutated only through [`TurnState::apply`].
#[derive(Debug, Clone, Default)]
pub struct TurnState {
    /// Rule 1: true between `response.created` and `response.done`.
    pub response_active: bool,
    /// Rule 5/6/7: true during the post-playback quiet window.
    pub echo_cooldown: bool,
    /// The response id currently active, if any — carried so `cancel_response`
    /// has something to cancel (invariant §3(a)).
    pub active_response_id: Option<String>,
    /// Monotonically increasing, bumped every time a cooldown timer is
    /// (re)armed. The mediator tags its `tokio::time::sleep` task with the
    /// generation it was armed at; a `CooldownExpired` event carrying a
    /// stale generation is a no-op (rule 5: "arming a new one disarms the
    /// prior").
    pub cooldown_generation: u64,
}

/// Inputs observed from C2 (LLM session) and C3 (carrier session).
#[derive(Debug, Clone)]
pub enum ArbiterEvent {
    ResponseCreated { response_id: String },
    ResponseDone,
    SpeechStarted,
    /// An assistant audio frame was about to be forwarded to the carrier.
    AudioDelta,
    /// True end-of-generation for the audio channel.
    AudioDone,
    /// The carrier's asynchronous ack that the `audio-complete` mark was
    /// actually played out.
    CarrierMarkAcked,
    /// The cooldown timer armed at `generation` has elapsed.
    CooldownExpired { generation: u64 },
}

/// Outputs the mediator must carry out against C2/C3.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterAction {
    CancelAssistant { response_id: String },
    ClearCarrierBuffer,
    EmitAudioCompleteMark,
    /// Arm a single cooldown timer of `duration_ms`, tagged with
    /// `generation` so a late, superseded expiry can be ignored.
    ArmCooldown { duration_ms: u64, generation: u64 },
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule 7: caller audio is gated iff in the echo cooldown window.
    /// Barge-in is intentionally NOT gated here — the LLM's server-side VAD
    /// needs a continuous caller-audio signal to detect the interruption.
    pub fn gate_caller_audio(&self) -> bool {
        self.echo_cooldown
    }

    /// Applies one event and returns the actions the mediator must take.
    /// Pure: no I/O, no clock reads.
    pub fn apply(&mut self, event: ArbiterEvent, config: &TurnConfig) -> Vec<ArbiterAction> {
        match event {
            ArbiterEvent::ResponseCreated { response_id } => {
                // Rule 1.
                self.response_active = true;
                self.active_response_id = Some(response_id);
                Vec::new()
            }
            ArbiterEvent::ResponseDone => {
                // Rule 1. Receiving this with response_active already false
                // is a benign no-op (§3(c)).
                self.response_active = false;
                self.active_response_id = None;
                Vec::new()
            }
            ArbiterEvent::SpeechStarted => {
                // Rule 2: barge-in only matters mid-response.
                if self.response_active {
                    let response_id = self
                        .active_response_id
                        .clone()
                        .unwrap_or_default();
                    vec![
                        ArbiterAction::CancelAssistant { response_id },
                        ArbiterAction::ClearCarrierBuffer,
                    ]
                } else {
                    Vec::new()
                }
            }
            ArbiterEvent::AudioDelta => {
                // Rule 3: any outbound frame cancels a pending cooldown and
                // proves we're not in the tail.
                self.echo_cooldown = false;
                self.cooldown_generation = self.cooldown_generation.wrapping_add(1);
                Vec::new()
            }
            ArbiterEvent::AudioDone => {
                // Rule 4: mark end-of-generation, but don't start the
                // cooldown yet — that waits for the carrier's playback ack.
                vec![ArbiterAction::EmitAudioCompleteMark]
            }
            ArbiterEvent::CarrierMarkAcked => {
                // Rule 5: arm exactly one cooldown timer; replacing the
                // generation invalidates any timer already in flight.
                self.echo_cooldown = true;
                self.cooldown_generation = self.cooldown_generation.wrapping_add(1);
                vec![ArbiterAction::ArmCooldown {
                    duration_ms: config.echo_cooldown_ms,
                    generation: self.cooldown_generation,
                }]
            }
            ArbiterEvent::CooldownExpired { generation } => {
                // Rule 6, guarded against a superseded timer (rule 5's
                // "arming a new one disarms the prior").
                if generation == self.cooldown_generation {
                    self.echo_cooldown = false;
                }
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TurnConfig {
        TurnConfig::default()
    }

    /// P1: response_active tracks created/done transitions exactly.
    #[test]
    fn p1_response_active_tracks_created_and_done() {
        let mut s = TurnState::new();
        assert!(!s.response_active);
        s.apply(ArbiterEvent::ResponseCreated { response_id: "r1".into() }, &config());
        assert!(s.response_active);
        s.apply(ArbiterEvent::ResponseDone, &config());
        assert!(!s.response_active);
    }

    /// P2: barge-in only fires while a response is active; ignored otherwise.
    #[test]
    fn p2_barge_in_only_while_responding() {
        let mut s = TurnState::new();
        let actions = s.apply(ArbiterEvent::SpeechStarted, &config());
        assert!(actions.is_empty());

        s.apply(ArbiterEvent::ResponseCreated { response_id: "r1".into() }, &config());
        let actions = s.apply(ArbiterEvent::SpeechStarted, &config());
        assert_eq!(
            actions,
            vec![
                ArbiterAction::CancelAssistant { response_id: "r1".into() },
                ArbiterAction::ClearCarrierBuffer,
            ]
        );
    }

    /// P3: response.done with response_active already false is a no-op,
    /// not a panic or spurious action.
    #[test]
    fn p3_response_done_when_already_inactive_is_benign() {
        let mut s = TurnState::new();
        let actions = s.apply(ArbiterEvent::ResponseDone, &config());
        assert!(actions.is_empty());
        assert!(!s.response_active);
    }

    /// P4: audio-done emits exactly the mark, never starts the cooldown
    /// itself (that only happens on the carrier's ack).
    #[test]
    fn p4_audio_done_emits_mark_without_arming_cooldown() {
        let mut s = TurnState::new();
        let actions = s.apply(ArbiterEvent::AudioDone, &config());
        assert_eq!(actions, vec![ArbiterAction::EmitAudioCompleteMark]);
        assert!(!s.echo_cooldown);
    }

    /// P5: arming a new cooldown timer invalidates any prior one — a late
    /// expiry carrying a stale generation is ignored.
    #[test]
    fn p5_arming_a_new_cooldown_disarms_the_prior() {
        let mut s = TurnState::new();
        let first = s.apply(ArbiterEvent::CarrierMarkAcked, &config());
        let ArbiterAction::ArmCooldown { generation: gen1, .. } = first[0].clone() else {
            panic!("expected ArmCooldown");
        };
        assert!(s.echo_cooldown);

        // A fresh audio delta (e.g. an immediate follow-up response) bumps
        // the generation and clears cooldown before the first timer fires.
        s.apply(ArbiterEvent::AudioDelta, &config());
        assert!(!s.echo_cooldown);

        // The stale expiry must not resurrect cooldown.
        s.apply(ArbiterEvent::CooldownExpired { generation: gen1 }, &config());
        assert!(!s.echo_cooldown);

        let second = s.apply(ArbiterEvent::CarrierMarkAcked, &config());
        let ArbiterAction::ArmCooldown { generation: gen2, .. } = second[0].clone() else {
            panic!("expected ArmCooldown");
        };
        assert_ne!(gen1, gen2);
        s.apply(ArbiterEvent::CooldownExpired { generation: gen2 }, &config());
        assert!(!s.echo_cooldown);
    }

    #[test]
    fn gating_follows_echo_cooldown_only() {
        let mut s = TurnState::new();
        assert!(!s.gate_caller_audio());
        s.apply(ArbiterEvent::CarrierMarkAcked, &config());
        assert!(s.gate_caller_audio());
        // Barge-in (speech_started) must not be gated even mid-cooldown.
        s.apply(ArbiterEvent::ResponseCreated { response_id: "r2".into() }, &config());
        let actions = s.apply(ArbiterEvent::SpeechStarted, &config());
        assert!(!actions.is_empty());
    }

    #[test]
    fn cooldown_duration_uses_configured_value() {
        let mut s = TurnState::new();
        let mut cfg = config();
        cfg.echo_cooldown_ms = 777;
        let actions = s.apply(ArbiterEvent::CarrierMarkAcked, &cfg);
        assert_eq!(
            actions,
            vec![ArbiterAction::ArmCooldown { duration_ms: 777, generation: 1 }]
        );
    }
}
