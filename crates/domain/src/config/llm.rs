use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigSeverity};

/// Connection parameters for the outbound LLM realtime session (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_ws_url")]
    pub ws_url: String,
    /// Name of the environment variable holding the API key, never the key
    /// itself.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_beta_header")]
    pub beta_header: String,
    #[serde(default = "d_voice")]
    pub voice: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_session_updated_timeout_ms")]
    pub session_updated_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ws_url: d_ws_url(),
            api_key_env: d_api_key_env(),
            beta_header: d_beta_header(),
            voice: d_voice(),
            model: d_model(),
            session_updated_timeout_ms: d_session_updated_timeout_ms(),
        }
    }
}

fn d_ws_url() -> String {
    "wss://api.openai.com/v1/realtime".to_string()
}

fn d_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn d_beta_header() -> String {
    "realtime=v1".to_string()
}

fn d_voice() -> String {
    "alloy".to_string()
}

fn d_model() -> String {
    "gpt-4o-realtime-preview".to_string()
}

fn d_session_updated_timeout_ms() -> u64 {
    3000
}

impl LlmConfig {
    pub(super) fn validate(&self, out: &mut Vec<ConfigError>) {
        if !self.ws_url.starts_with("wss://") && !self.ws_url.starts_with("ws://") {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.ws_url".into(),
                message: "must be a ws:// or wss:// url".into(),
            });
        }
        if std::env::var(&self.api_key_env).is_err() {
            out.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.api_key_env".into(),
                message: format!("environment variable {} is not set", self.api_key_env),
            });
        }
    }
}
