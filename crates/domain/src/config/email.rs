use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigSeverity};

/// Outbound transactional email used by the return/confirmation tools (C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_from_address")]
    pub from_address: String,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// REST endpoint `HttpEmailAdapter` posts to. Only consulted when
    /// `enabled` is true.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Shop name interpolated into the outbound templates (C4).
    #[serde(default = "d_shop_name")]
    pub shop_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from_address: d_from_address(),
            api_key_env: d_api_key_env(),
            base_url: d_base_url(),
            shop_name: d_shop_name(),
        }
    }
}

fn d_from_address() -> String {
    "support@example.com".to_string()
}

fn d_api_key_env() -> String {
    "EMAIL_API_KEY".to_string()
}

fn d_base_url() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

fn d_shop_name() -> String {
    "Example Shop".to_string()
}

impl EmailConfig {
    pub(super) fn validate(&self, out: &mut Vec<ConfigError>) {
        if !self.enabled {
            return;
        }
        if !self.from_address.contains('@') {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "email.from_address".into(),
                message: "from_address must be a valid-looking email address".into(),
            });
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            out.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "email.base_url".into(),
                message: "base_url must start with http:// or https://".into(),
            });
        }
        if std::env::var(&self.api_key_env).is_err() {
            out.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "email.api_key_env".into(),
                message: format!("environment variable {} is not set", self.api_key_env),
            });
        }
    }
}
