//! Configuration loading and validation. TOML on disk, individual fields
//! overridable by environment variables at the call sites that need a
//! secret (never the struct itself — secrets are named by env var, not
//! embedded in the file).

mod carrier;
mod email;
mod llm;
mod order_backend;
mod server;
mod turn;

pub use carrier::CarrierConfig;
pub use email::EmailConfig;
pub use llm::LlmConfig;
pub use order_backend::OrderBackendConfig;
pub use server::{CorsConfig, ServerConfig};
pub use turn::TurnConfig;

use serde::{Deserialize, Serialize};

/// Gates whether a `Warning`-severity config issue also bails at startup.
/// `Production` treats warnings as errors; `Development` logs and continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentProfile {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            ConfigSeverity::Error => "error",
            ConfigSeverity::Warning => "warning",
        };
        write!(f, "[{label}] {}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub deployment_profile: DeploymentProfile,
    #[serde(default)]
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub order_backend: OrderBackendConfig,
    pub carrier: CarrierConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl Config {
    pub fn load_from_str(raw: &str) -> crate::error::Result<Self> {
        toml::from_str(raw).map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    pub fn load_from_path(path: &std::path::Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::load_from_str(&raw)
    }

    /// Collects every `ConfigError` across all sections. Does not itself
    /// decide bail-vs-continue — that policy lives with the caller (`main`),
    /// which bails on any `Error` severity and on `Warning` severity only
    /// under `DeploymentProfile::Production`.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut out = Vec::new();
        self.server.validate(&mut out);
        self.llm.validate(&mut out);
        self.order_backend.validate(&mut out);
        self.carrier.validate(&mut out);
        self.turn.validate(&mut out);
        self.email.validate(&mut out);
        out
    }

    /// `true` if `validate()` contains anything that should stop startup
    /// under this config's deployment profile.
    pub fn has_fatal_issues(&self, issues: &[ConfigError]) -> bool {
        issues.iter().any(|e| {
            e.severity == ConfigSeverity::Error
                || (e.severity == ConfigSeverity::Warning
                    && self.deployment_profile == DeploymentProfile::Production)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            [llm]
            ws_url = "wss://api.openai.com/v1/realtime"

            [order_backend]
            base_url = "https://backend.example.com"

            [carrier]
            account_sid = "AC123"
            from_number = "+15005550006"
            public_host = "bridge.example.com"
        "#
    }

    #[test]
    fn minimal_config_parses_and_validates_clean() {
        let cfg = Config::load_from_str(minimal_toml()).unwrap();
        let issues = cfg.validate();
        assert!(issues.iter().all(|e| e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn zero_port_is_a_fatal_error() {
        let mut cfg = Config::load_from_str(minimal_toml()).unwrap();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(cfg.has_fatal_issues(&issues));
    }

    #[test]
    fn production_profile_escalates_warnings_to_fatal() {
        let mut cfg = Config::load_from_str(minimal_toml()).unwrap();
        cfg.deployment_profile = DeploymentProfile::Production;
        let issues = cfg.validate();
        // missing env vars in a test process are warnings; under Production
        // those must become fatal.
        assert!(cfg.has_fatal_issues(&issues));
    }

    #[test]
    fn bad_base_url_scheme_is_fatal() {
        let mut cfg = Config::load_from_str(minimal_toml()).unwrap();
        cfg.order_backend.base_url = "backend.example.com".into();
        let issues = cfg.validate();
        assert!(cfg.has_fatal_issues(&issues));
    }
}
