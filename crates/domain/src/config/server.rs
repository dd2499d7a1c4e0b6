use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigSeverity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Directory the transcript sink appends call JSONL files to.
    /// Optional — when unset, calls simply run without a transcript.
    #[serde(default)]
    pub transcript_dir: Option<std::path::PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            transcript_dir: None,
        }
    }
}

fn d_port() -> u16 {
    8080
}

fn d_host() -> String {
    "0.0.0.0".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub(super) fn validate(&self, out: &mut Vec<ConfigError>) {
        if self.port == 0 {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be non-zero".into(),
            });
        }
        if self.host.trim().is_empty() {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
    }
}
