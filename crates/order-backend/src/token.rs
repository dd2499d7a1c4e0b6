//! Lazy, margin-refreshed access token for the order backend (§4.1, §5).
//!
//! Adapted from the teacher's OAuth device-code token lifecycle: a single
//! shared token, refreshed ahead of expiry rather than on failure, guarded
//! by a mutex so concurrent calls don't race the refresh endpoint. The
//! device-code grant and on-disk token store don't apply here — the bridge
//! holds one long-lived refresh token from config and only ever does
//! `grant_type=refresh_token`, in memory, for the life of the process.

use tokio::sync::Mutex;
use vb_domain::error::{Error, Result};

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Single-flight, margin-refreshed holder for the backend's access token.
///
/// `margin_secs` mirrors the teacher's `REFRESH_WINDOW_SECS`, generalized
/// to the backend's config (default 1h margin against a 24h token, per
/// `OrderBackendConfig`).
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    margin_secs: i64,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        client_id: String,
        client_secret: String,
        refresh_token: String,
        margin_secs: i64,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            client_id,
            client_secret,
            refresh_token,
            margin_secs,
            cached: Mutex::new(None),
        }
    }

    /// Return a valid access token, refreshing first if absent or within
    /// `margin_secs` of expiry. Concurrent callers share one in-flight
    /// refresh via the mutex rather than each firing their own request.
    pub async fn get(&self) -> Result<String> {
        self.get_internal(false).await
    }

    /// Bypasses the cached token even if it looks unexpired and fetches a
    /// fresh one. Used by `OrderBackendClient`'s retry-once-on-401 policy
    /// (§7 AuthExpired) — a token can be revoked server-side before our
    /// local expiry margin says it should be, and `get()` alone would just
    /// keep handing back the same now-rejected token.
    pub async fn force_refresh(&self) -> Result<String> {
        self.get_internal(true).await
    }

    async fn get_internal(&self, force: bool) -> Result<String> {
        let mut guard = self.cached.lock().await;

        let now = chrono::Utc::now().timestamp();
        if !force {
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at - now > self.margin_secs {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        tracing::info!(
            margin_secs = self.margin_secs,
            forced = force,
            "order backend access token absent, near expiry, or forced, refreshing"
        );

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::AuthExpired(format!("token refresh request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::AuthExpired(format!("reading token refresh response: {e}")))?;

        if !status.is_success() {
            return Err(Error::AuthExpired(format!(
                "token refresh returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::AuthExpired(format!("parsing token refresh response: {e}")))?;

        let expires_in = parsed.expires_in.unwrap_or(24 * 3600);
        let fresh = CachedToken {
            access_token: parsed.access_token,
            expires_at: now + expires_in,
        };
        let token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new(
            reqwest::Client::new(),
            "https://backend.example.test",
            "id".into(),
            "secret".into(),
            "rt".into(),
            3600,
        )
    }

    #[test]
    fn token_url_is_joined_without_double_slash() {
        let m = manager();
        assert_eq!(m.token_url, "https://backend.example.test/oauth/token");
    }

    #[tokio::test]
    async fn cache_is_empty_before_first_refresh() {
        let m = manager();
        let guard = m.cached.lock().await;
        assert!(guard.is_none());
    }

    #[test]
    fn cached_token_within_margin_is_stale() {
        let now = chrono::Utc::now().timestamp();
        let cached = CachedToken {
            access_token: "tok".into(),
            expires_at: now + 120,
        };
        assert!(cached.expires_at - now <= 3600);
    }

    #[test]
    fn cached_token_outside_margin_is_fresh() {
        let now = chrono::Utc::now().timestamp();
        let cached = CachedToken {
            access_token: "tok".into(),
            expires_at: now + 24 * 3600,
        };
        assert!(cached.expires_at - now > 3600);
    }
}
