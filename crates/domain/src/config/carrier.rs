use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigSeverity};

/// Telephony carrier webhook credentials and the externally-reachable host
/// the carrier is told to stream media back to (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    pub account_sid: String,
    #[serde(default = "d_auth_token_env")]
    pub auth_token_env: String,
    pub from_number: String,
    pub public_host: String,
    #[serde(default)]
    pub require_signature: bool,
}

fn d_auth_token_env() -> String {
    "CARRIER_AUTH_TOKEN".to_string()
}

impl CarrierConfig {
    pub(super) fn validate(&self, out: &mut Vec<ConfigError>) {
        if self.account_sid.trim().is_empty() {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "carrier.account_sid".into(),
                message: "account_sid must not be empty".into(),
            });
        }
        if self.from_number.trim().is_empty() {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "carrier.from_number".into(),
                message: "from_number must not be empty".into(),
            });
        }
        if self.public_host.trim().is_empty() {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "carrier.public_host".into(),
                message: "public_host must not be empty".into(),
            });
        }
        if self.require_signature && std::env::var(&self.auth_token_env).is_err() {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "carrier.auth_token_env".into(),
                message: format!(
                    "require_signature is set but {} is not in the environment",
                    self.auth_token_env
                ),
            });
        }
    }
}
