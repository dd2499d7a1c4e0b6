use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Turn-taking timing constants consumed by the turn arbiter (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// How long caller audio is ignored after the assistant starts speaking,
    /// to absorb echo/sidetone.
    #[serde(default = "d_echo_cooldown_ms")]
    pub echo_cooldown_ms: u64,
    /// How long a detected speech-start must persist before it is treated as
    /// a genuine barge-in rather than a transient.
    #[serde(default = "d_stabilization_ms")]
    pub stabilization_ms: u64,
    #[serde(default = "d_session_updated_timeout_ms")]
    pub session_updated_timeout_ms: u64,
    #[serde(default = "d_vad_threshold")]
    pub vad_threshold: f32,
    #[serde(default = "d_vad_prefix_padding_ms")]
    pub vad_prefix_padding_ms: u64,
    #[serde(default = "d_vad_silence_duration_ms")]
    pub vad_silence_duration_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            echo_cooldown_ms: d_echo_cooldown_ms(),
            stabilization_ms: d_stabilization_ms(),
            session_updated_timeout_ms: d_session_updated_timeout_ms(),
            vad_threshold: d_vad_threshold(),
            vad_prefix_padding_ms: d_vad_prefix_padding_ms(),
            vad_silence_duration_ms: d_vad_silence_duration_ms(),
        }
    }
}

fn d_echo_cooldown_ms() -> u64 {
    400
}

fn d_stabilization_ms() -> u64 {
    1200
}

fn d_session_updated_timeout_ms() -> u64 {
    3000
}

fn d_vad_threshold() -> f32 {
    0.8
}

fn d_vad_prefix_padding_ms() -> u64 {
    600
}

fn d_vad_silence_duration_ms() -> u64 {
    1000
}

impl TurnConfig {
    pub(super) fn validate(&self, out: &mut Vec<ConfigError>) {
        if !(0.0..=1.0).contains(&self.vad_threshold) {
            out.push(ConfigError {
                severity: super::ConfigSeverity::Error,
                field: "turn.vad_threshold".into(),
                message: "must be between 0.0 and 1.0".into(),
            });
        }
    }
}
