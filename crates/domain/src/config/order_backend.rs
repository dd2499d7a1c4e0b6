use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigSeverity};

/// Credentials and endpoint for the e-commerce order backend (C1). Secrets
/// are named by environment variable, never embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBackendConfig {
    pub base_url: String,
    #[serde(default = "d_client_id_env")]
    pub client_id_env: String,
    #[serde(default = "d_client_secret_env")]
    pub client_secret_env: String,
    #[serde(default = "d_refresh_token_env")]
    pub refresh_token_env: String,
    #[serde(default = "d_access_token_margin_secs")]
    pub access_token_margin_secs: i64,
    #[serde(default = "d_refresh_token_margin_secs")]
    pub refresh_token_margin_secs: i64,
}

fn d_client_id_env() -> String {
    "ORDER_BACKEND_CLIENT_ID".to_string()
}

fn d_client_secret_env() -> String {
    "ORDER_BACKEND_CLIENT_SECRET".to_string()
}

fn d_refresh_token_env() -> String {
    "ORDER_BACKEND_REFRESH_TOKEN".to_string()
}

fn d_access_token_margin_secs() -> i64 {
    3600
}

fn d_refresh_token_margin_secs() -> i64 {
    24 * 3600
}

impl OrderBackendConfig {
    pub(super) fn validate(&self, out: &mut Vec<ConfigError>) {
        if self.base_url.trim().is_empty() {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "order_backend.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "order_backend.base_url".into(),
                message: "base_url must start with http:// or https://".into(),
            });
        }
        for (field, env) in [
            ("client_id_env", &self.client_id_env),
            ("client_secret_env", &self.client_secret_env),
            ("refresh_token_env", &self.refresh_token_env),
        ] {
            if std::env::var(env).is_err() {
                out.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("order_backend.{field}"),
                    message: format!("environment variable {env} is not set"),
                });
            }
        }
    }
}
