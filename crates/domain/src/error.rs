/// Shared error type used across all voice-bridge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Network/5xx failure from the order backend. Retriable.
    #[error("order backend transient failure: {0}")]
    TransientBackend(String),

    /// Backend rejected the current access token (HTTP 401). Raised by
    /// `order-backend`'s `read_body`; `OrderBackendClient::authed_get`/
    /// `authed_post` catch it, force a fresh token past the cache via
    /// `TokenManager::force_refresh`, and retry exactly once before giving
    /// up. A second `AuthExpired` on that retry is downgraded to
    /// `TransientBackend` rather than ever reaching a caller as this variant.
    #[error("order backend auth expired: {0}")]
    AuthExpired(String),

    /// Non-benign LLM protocol error. The benign `response_cancel_not_active`
    /// race is discarded by the caller before it ever becomes an `Error`.
    #[error("LLM protocol error {code}: {message}")]
    LlmProtocol { code: String, message: String },

    #[error("carrier frame malformed: {0}")]
    CarrierMalformed(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
