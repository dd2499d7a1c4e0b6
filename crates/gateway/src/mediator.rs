//! Session mediator (C7, §4.7): the per-call orchestrator. One instance
//! owns exactly one call's [`LlmSession`], [`TurnState`], and transcript
//! handle, and drives the `connecting → greeting/listening/responding →
//! in-tool → closing` lifecycle described there.
//!
//! Shaped after the teacher's `runtime::turn::run_turn`/`run_turn_inner`
//! split: a small setup function followed by a `tokio::select!` loop, with
//! per-branch handling broken into helper methods instead of one giant
//! match arm. The teacher's SSE `TurnEvent` channel has no counterpart here
//! — the mediator's only observable output is carrier/LLM traffic and
//! transcript/trace side effects, so nothing is returned to a caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use vb_domain::call::{CallIdentity, IdentificationContext};
use vb_domain::config::Config;
use vb_domain::session::{CallState, SessionState};
use vb_domain::tool::ToolResult;
use vb_domain::trace::TraceEvent;
use vb_domain::transcript::Speaker;
use vb_llm_session::LlmSession;
use vb_protocol::carrier::AUDIO_COMPLETE_MARK;
use vb_protocol::{
    CarrierCommand, CarrierEvent, InputAudioTranscription, LlmEvent, SessionConfig,
    ToolDefinition, TurnDetectionConfig,
};
use vb_sessions::{TranscriptRef, TranscriptSink};
use vb_tools::{DispatchContext, ToolDispatcher};

use crate::prompt::compose_system_prompt;
use crate::turn_arbiter::{ArbiterAction, ArbiterEvent, TurnState};

/// Safety cap on consecutive tool-call round-trips with no audio response
/// in between, mirroring the teacher's tool-loop guard — a model stuck
/// calling tools back-to-back must not pin a call open forever.
const MAX_TOOL_LOOPS: usize = 25;

/// A completed dispatcher call, threaded back from its detached task (see
/// [`Mediator::spawn_tool_call`]) to the duplex loop via `tool_tasks`.
struct ToolOutcome {
    call_id: String,
    name: String,
    args: serde_json::Value,
    result: ToolResult,
}

/// Everything one call needs for its whole lifetime. Built once in
/// [`run_call`] and then driven by the `tokio::select!` loop below.
pub struct Mediator {
    identity: CallIdentity,
    stream_id: String,
    llm: LlmSession,
    turn: TurnState,
    /// Lifecycle phase tracking (§4.7 invariants a-d), kept alongside `turn`
    /// rather than folded into it — `turn` gates audio at the frame level,
    /// `session` answers "is a response/tool call in flight right now".
    session: SessionState,
    config: Arc<Config>,
    tool_dispatcher: Arc<ToolDispatcher>,
    transcript_sink: Arc<TranscriptSink>,
    transcript_ref: Option<TranscriptRef>,
    identification: IdentificationContext,
    carrier_tx: mpsc::Sender<CarrierCommand>,
    started_at: Instant,
    tool_loop_count: usize,
    /// In-flight dispatcher calls, detached from the duplex loop (§5: "may
    /// spawn short-lived tool-execution tasks"). Dropping the `JoinSet`
    /// (on call shutdown) aborts anything still running — the "pending
    /// tool executions are detached, their eventual result is dropped"
    /// cancellation rule falls out of that for free.
    tool_tasks: JoinSet<ToolOutcome>,
}

/// Entry point from [`crate::carrier_ws`]: the media socket has already
/// received the carrier's `start` event and decoded its custom parameters.
/// Runs the call to completion (carrier `stop`, either socket closing, or
/// an unrecoverable connect failure) and returns only once it's over.
pub async fn run_call(
    identity: CallIdentity,
    stream_id: String,
    identification: IdentificationContext,
    config: Arc<Config>,
    tool_dispatcher: Arc<ToolDispatcher>,
    tool_defs: Arc<Vec<ToolDefinition>>,
    transcript_sink: Arc<TranscriptSink>,
    carrier_tx: mpsc::Sender<CarrierCommand>,
    mut carrier_rx: mpsc::Receiver<CarrierEvent>,
) {
    let span = tracing::info_span!("call", call_id = %identity.call_id);
    let _enter = span.enter();

    let transcript_ref = transcript_sink.start_call(
        &identity.call_id,
        &identity.caller_number,
        identification.customer_name.as_deref(),
        identification.found,
    );

    let api_key = match std::env::var(&config.llm.api_key_env) {
        Ok(v) => v,
        Err(_) => {
            tracing::error!("LLM api key env var {} is not set, dropping call", config.llm.api_key_env);
            return;
        }
    };

    let llm = match LlmSession::connect(&config.llm.ws_url, &api_key, &config.llm.beta_header).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "LLM connect failed during setup, dropping call");
            return;
        }
    };

    let mut session = SessionState::new(identity.clone());
    session.set_identification(identification.clone());

    let mut mediator = Mediator {
        identity,
        stream_id,
        llm,
        turn: TurnState::new(),
        session,
        config,
        tool_dispatcher,
        transcript_sink,
        transcript_ref,
        identification,
        carrier_tx,
        started_at: Instant::now(),
        tool_loop_count: 0,
        tool_tasks: JoinSet::new(),
    };

    if !mediator.bring_up_session(tool_defs).await {
        mediator.finalize().await;
        return;
    }
    mediator.session.state = CallState::Greeting;

    mediator.run_duplex_loop(&mut carrier_rx).await;
    mediator.finalize().await;
}

impl Mediator {
    /// `connecting`: compose the system prompt, push session config, wait
    /// (non-fatally) for the ack, let the carrier's media path stabilize,
    /// then request the greeting. Returns `false` on an unrecoverable
    /// failure — the caller should tear the call down immediately.
    async fn bring_up_session(&mut self, tool_defs: Arc<Vec<ToolDefinition>>) -> bool {
        let instructions = compose_system_prompt(&self.identification);

        let session_config = SessionConfig {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions,
            voice: self.config.llm.voice.clone(),
            input_audio_format: "g711_ulaw".to_string(),
            output_audio_format: "g711_ulaw".to_string(),
            input_audio_transcription: InputAudioTranscription {
                model: "whisper-1".to_string(),
            },
            turn_detection: TurnDetectionConfig {
                kind: "server_vad".to_string(),
                threshold: self.config.turn.vad_threshold,
                prefix_padding_ms: self.config.turn.vad_prefix_padding_ms,
                silence_duration_ms: self.config.turn.vad_silence_duration_ms,
            },
            tools: (*tool_defs).clone(),
            tool_choice: "auto".to_string(),
        };

        if let Err(e) = self.llm.update_session(session_config).await {
            tracing::error!(error = %e, "failed to push session config, dropping call");
            return false;
        }

        let updated = tokio::time::timeout(
            Duration::from_millis(self.config.llm.session_updated_timeout_ms),
            self.llm.wait_for_session_updated(),
        )
        .await
        .unwrap_or(false);
        if !updated {
            tracing::warn!("session.updated wait timed out, proceeding anyway");
        } else {
            TraceEvent::LlmSessionUpdated { call_id: &self.identity.call_id }.emit();
        }
        // Invariant (e): flips regardless of whether the ack actually
        // arrived — the non-fatal timeout still proceeds to `greeting`, and
        // a call that never sets this would gate every caller frame forever.
        self.session.mark_initialized();

        tokio::time::sleep(Duration::from_millis(self.config.turn.stabilization_ms)).await;

        if let Err(e) = self.llm.create_response().await {
            tracing::error!(error = %e, "failed to request greeting response, dropping call");
            return false;
        }
        true
    }

    /// `greeting`/`listening`/`responding`/`in-tool`: the main duplex loop.
    /// Runs until the carrier sends `stop`, either socket closes, or a
    /// cooldown timer (if armed) fires in between.
    async fn run_duplex_loop(&mut self, carrier_rx: &mut mpsc::Receiver<CarrierEvent>) {
        let (_sub_id, mut llm_rx) = self.llm.subscribe_all();
        let mut cooldown_deadline: Option<(Instant, u64)> = None;

        loop {
            let cooldown_sleep = async {
                match cooldown_deadline {
                    Some((deadline, _)) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                carrier_event = carrier_rx.recv() => {
                    match carrier_event {
                        Some(event) => {
                            if !self.handle_carrier_event(event, &mut cooldown_deadline).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                llm_event = llm_rx.recv() => {
                    match llm_event {
                        Some(event) => self.handle_llm_event(event, &mut cooldown_deadline).await,
                        None => {
                            tracing::info!("LLM session closed mid-call");
                            break;
                        }
                    }
                }
                _ = cooldown_sleep => {
                    if let Some((_, generation)) = cooldown_deadline.take() {
                        self.turn.apply(ArbiterEvent::CooldownExpired { generation }, &self.config.turn);
                        TraceEvent::CooldownExpired { call_id: &self.identity.call_id }.emit();
                    }
                }
                // §5: tool execution (up to the backend's 10s HTTP timeout)
                // must never block carrier/LLM traffic — polled here instead
                // of awaited inline from `handle_llm_event`. Guarded on
                // `is_empty()` so the branch doesn't spin when no tool is
                // in flight (`join_next()` on an empty set resolves `None`
                // immediately).
                outcome = self.tool_tasks.join_next(), if !self.tool_tasks.is_empty() => {
                    match outcome {
                        Some(Ok(outcome)) => self.finish_tool_call(outcome).await,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "tool task panicked");
                            self.session.leave_tool();
                        }
                        None => {}
                    }
                }
            }
        }
    }

    /// Returns `false` when the call should end (carrier `stop` or close).
    async fn handle_carrier_event(
        &mut self,
        event: CarrierEvent,
        cooldown_deadline: &mut Option<(Instant, u64)>,
    ) -> bool {
        match event {
            CarrierEvent::Media { media } => {
                // §4.7: forwarded iff not gated AND the session is past
                // `connecting` — frames that arrive while still waiting on
                // `session.updated` must not leak through once the loop
                // starts draining the channel.
                if !self.turn.gate_caller_audio() && self.session.initialized {
                    if let Err(e) = self.llm.send_audio(media.payload).await {
                        tracing::warn!(error = %e, "failed to forward caller audio, ending call");
                        return false;
                    }
                }
                true
            }
            CarrierEvent::Mark { mark } if mark.name == AUDIO_COMPLETE_MARK => {
                let actions = self
                    .turn
                    .apply(ArbiterEvent::CarrierMarkAcked, &self.config.turn);
                self.apply_actions(actions, cooldown_deadline).await;
                true
            }
            CarrierEvent::Mark { .. } => true,
            CarrierEvent::Stop { .. } => {
                tracing::info!("carrier sent stop, closing call");
                false
            }
            CarrierEvent::Connected | CarrierEvent::Start { .. } | CarrierEvent::Unknown => true,
        }
    }

    async fn handle_llm_event(&mut self, event: LlmEvent, cooldown_deadline: &mut Option<(Instant, u64)>) {
        match event {
            LlmEvent::SpeechStarted => {
                let actions = self.turn.apply(ArbiterEvent::SpeechStarted, &self.config.turn);
                if !actions.is_empty() {
                    TraceEvent::BargeIn {
                        call_id: &self.identity.call_id,
                        response_id: self.turn.active_response_id.as_deref().unwrap_or(""),
                    }
                    .emit();
                }
                self.apply_actions(actions, cooldown_deadline).await;
            }
            LlmEvent::ResponseCreated { response } => {
                self.session.enter_responding(response.id.clone());
                self.turn.apply(
                    ArbiterEvent::ResponseCreated { response_id: response.id },
                    &self.config.turn,
                );
            }
            LlmEvent::ResponseDone { .. } => {
                self.session.leave_responding();
                self.turn.apply(ArbiterEvent::ResponseDone, &self.config.turn);
            }
            LlmEvent::ResponseAudioDelta { delta, .. } => {
                self.turn.apply(ArbiterEvent::AudioDelta, &self.config.turn);
                let cmd = CarrierCommand::media(self.stream_id.clone(), delta);
                let _ = self.carrier_tx.send(cmd).await;
            }
            LlmEvent::ResponseAudioDone { .. } => {
                let actions = self.turn.apply(ArbiterEvent::AudioDone, &self.config.turn);
                self.apply_actions(actions, cooldown_deadline).await;
            }
            LlmEvent::ResponseAudioTranscriptDone { transcript, .. } => {
                self.append_transcript(Speaker::Assistant, &transcript);
            }
            LlmEvent::InputAudioTranscriptionCompleted { transcript } => {
                self.append_transcript(Speaker::Caller, &transcript);
            }
            LlmEvent::ResponseFunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
                ..
            } => {
                self.spawn_tool_call(call_id, name, arguments).await;
            }
            LlmEvent::SessionCreated
            | LlmEvent::SessionUpdated
            | LlmEvent::SpeechStopped
            | LlmEvent::Error { .. }
            | LlmEvent::Unknown => {}
        }
    }

    /// `in-tool`: fires off one function call as a detached task on
    /// `tool_tasks` instead of awaiting the dispatcher inline. §5 requires
    /// the duplex loop keep draining carrier/LLM traffic while a tool's
    /// backend call (up to the order-backend's 10s HTTP timeout) is in
    /// flight — awaiting it here would stall caller audio forwarding, LLM
    /// audio-delta playback, and a carrier `stop` sitting in the channel.
    /// The matching completion — transcript append, `SendToolResult`,
    /// leaving the `in-tool` state — happens in [`Self::finish_tool_call`]
    /// once `tool_tasks.join_next()` yields this call's [`ToolOutcome`].
    async fn spawn_tool_call(&mut self, call_id: String, name: String, arguments: String) {
        self.tool_loop_count += 1;
        if self.tool_loop_count > MAX_TOOL_LOOPS {
            tracing::warn!(call_id = %self.identity.call_id, "tool loop cap exceeded, ending call");
            let _ = self
                .llm
                .send_tool_result(call_id, "只今システムが混み合っております。担当者にお繋ぎします。".to_string())
                .await;
            return;
        }

        self.session.enter_tool();

        let args: serde_json::Value = serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null);

        TraceEvent::ToolDispatched {
            call_id: &self.identity.call_id,
            tool_name: &name,
            call_ref: &call_id,
        }
        .emit();

        let dispatcher = self.tool_dispatcher.clone();
        let caller_number = self.identity.caller_number.clone();
        let identification = self.identification.clone();

        self.tool_tasks.spawn(async move {
            let ctx = DispatchContext {
                caller_number: &caller_number,
                identification: &identification,
            };
            let result = dispatcher.dispatch(&name, &args, &ctx).await;
            ToolOutcome { call_id, name, args, result }
        });
    }

    /// A `Handoff` result is not treated specially here — per the spoken-
    /// only handoff decision (see DESIGN.md), its summary is fed back like
    /// any other tool text and the assistant voices it as the next
    /// response.
    async fn finish_tool_call(&mut self, outcome: ToolOutcome) {
        let ToolOutcome { call_id, name, args, result } = outcome;

        if result.requires_handoff() {
            TraceEvent::HandoffRequested {
                call_id: &self.identity.call_id,
                reason: &name,
            }
            .emit();
        }

        if let Some(reference) = &self.transcript_ref {
            self.transcript_sink
                .append_tool_call(reference, &name, args, &result);
        }

        let text = result.as_model_text();
        if let Err(e) = self.llm.send_tool_result(call_id, text).await {
            tracing::warn!(error = %e, call_id = %self.identity.call_id, "failed to send tool result to LLM");
        }

        self.session.leave_tool();
    }

    async fn apply_actions(
        &mut self,
        actions: Vec<ArbiterAction>,
        cooldown_deadline: &mut Option<(Instant, u64)>,
    ) {
        for action in actions {
            match action {
                ArbiterAction::CancelAssistant { response_id } => {
                    let _ = self.llm.cancel_response(response_id).await;
                }
                ArbiterAction::ClearCarrierBuffer => {
                    let cmd = CarrierCommand::clear(self.stream_id.clone());
                    let _ = self.carrier_tx.send(cmd).await;
                }
                ArbiterAction::EmitAudioCompleteMark => {
                    let cmd = CarrierCommand::audio_complete_mark(self.stream_id.clone());
                    let _ = self.carrier_tx.send(cmd).await;
                }
                ArbiterAction::ArmCooldown { duration_ms, generation } => {
                    TraceEvent::CooldownArmed {
                        call_id: &self.identity.call_id,
                        duration_ms,
                    }
                    .emit();
                    *cooldown_deadline = Some((
                        Instant::now() + Duration::from_millis(duration_ms),
                        generation,
                    ));
                }
            }
        }
    }

    fn append_transcript(&self, speaker: Speaker, content: &str) {
        if let Some(reference) = &self.transcript_ref {
            self.transcript_sink.append_message(reference, speaker, content);
        }
    }

    /// `closing`: tear down the LLM socket and finalize the transcript.
    async fn finalize(mut self) {
        self.session.state = CallState::Closing;
        let duration_seconds = self.started_at.elapsed().as_secs();
        self.llm.disconnect().await;
        if let Some(reference) = self.transcript_ref {
            self.transcript_sink.end_call(reference, duration_seconds);
        }
    }
}
