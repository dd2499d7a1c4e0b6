//! Inbound webhook handler (C8, §4.8): the carrier's call-start HTTP
//! request. Runs the phone lookup synchronously within the webhook deadline
//! and returns XML instructing the carrier to open the media WebSocket with
//! the identification context smuggled through `<Parameter>` elements.
//!
//! Grounded on the teacher's `api/webhooks.rs` — the `api_error()` JSON-error
//! convention and its HMAC-SHA256 signature check are carried over wholesale,
//! just re-pointed at a form-encoded request and an XML response instead of
//! a JSON trigger.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
pub struct CallStartForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From")]
    pub from: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}

/// `POST /voice/incoming`. The carrier's call-start webhook.
pub async fn incoming_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    if let Some(response) = verify_signature(&state, &headers, &body) {
        return response;
    }

    let form: CallStartForm = match serde_urlencoded::from_bytes(&body) {
        Ok(f) => f,
        Err(e) => {
            return api_error(
                StatusCode::BAD_REQUEST,
                format!("malformed call-start webhook: {e}"),
            )
        }
    };

    let identification = state.order_backend.search_by_phone(&form.from).await;
    vb_domain::trace::TraceEvent::IdentificationResolved {
        call_id: &form.call_sid,
        found: identification.found,
        error: identification.error,
    }
    .emit();

    let context_b64 = match identification.to_base64() {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode identification context");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };

    let xml = connect_stream_xml(
        &state.config.carrier.public_host,
        &context_b64,
        &form.from,
        &form.call_sid,
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/xml")],
        xml,
    )
        .into_response()
}

fn verify_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Option<Response> {
    if !state.config.carrier.require_signature {
        return None;
    }
    let expected = match std::env::var(&state.config.carrier.auth_token_env) {
        Ok(v) => v,
        Err(_) => {
            tracing::error!("carrier signature required but auth token env var is unset");
            return Some(api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error"));
        }
    };

    let provided = headers
        .get("x-carrier-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let mut mac = match HmacSha256::new_from_slice(expected.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Some(api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")),
    };
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() != 1 {
        return Some(api_error(StatusCode::UNAUTHORIZED, "invalid signature"));
    }
    None
}

/// `ws://` for local hosts (development against a tunnel-less bridge),
/// `wss://` otherwise.
fn stream_scheme(host: &str) -> &'static str {
    let bare = host.split(':').next().unwrap_or(host);
    if bare == "localhost" || bare == "127.0.0.1" || bare.starts_with("192.168.") {
        "ws"
    } else {
        "wss"
    }
}

fn connect_stream_xml(public_host: &str, context_b64: &str, caller_phone: &str, call_sid: &str) -> String {
    let scheme = stream_scheme(public_host);
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
         \u{20}<Connect>\n\
         \u{20}\u{20}<Stream url=\"{scheme}://{host}/media-stream\">\n\
         \u{20}\u{20}\u{20}<Parameter name=\"customerContext\" value=\"{ctx}\"/>\n\
         \u{20}\u{20}\u{20}<Parameter name=\"callerPhone\" value=\"{phone}\"/>\n\
         \u{20}\u{20}\u{20}<Parameter name=\"callSid\" value=\"{sid}\"/>\n\
         \u{20}\u{20}</Stream>\n\
         \u{20}</Connect>\n\
         </Response>",
        host = escape_xml(public_host),
        ctx = escape_xml(context_b64),
        phone = escape_xml(caller_phone),
        sid = escape_xml(call_sid),
    )
}

/// Blind-transfer XML builder (Open Question 2): present as a tested library
/// function for a future out-of-band admin action; the mediator never calls
/// this today — `transfer_to_human` stays spoken-only.
pub fn blind_transfer_xml(to_number: &str, status_callback_url: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
         \u{20}<Dial>\n\
         \u{20}\u{20}<Number statusCallback=\"{callback}\">{number}</Number>\n\
         \u{20}</Dial>\n\
         </Response>",
        callback = escape_xml(status_callback_url),
        number = escape_xml(to_number),
    )
}

/// Hold-music XML builder, same status as [`blind_transfer_xml`]: unused by
/// the mediator, kept as a tested building block.
pub fn hold_music_xml(audio_url: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
         \u{20}<Play loop=\"0\">{url}</Play>\n\
         </Response>",
        url = escape_xml(audio_url),
    )
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_xml_covers_the_five_entities() {
        let escaped = escape_xml("<a href=\"x\">Tom & Jerry's 'show'</a>");
        assert_eq!(
            escaped,
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&apos;s &apos;show&apos;&lt;/a&gt;"
        );
    }

    #[test]
    fn stream_scheme_is_plain_ws_for_localhost() {
        assert_eq!(stream_scheme("localhost:3000"), "ws");
        assert_eq!(stream_scheme("127.0.0.1"), "ws");
        assert_eq!(stream_scheme("192.168.1.20:3000"), "ws");
    }

    #[test]
    fn stream_scheme_is_wss_for_public_hosts() {
        assert_eq!(stream_scheme("bridge.example.com"), "wss");
    }

    #[test]
    fn connect_stream_xml_embeds_all_three_parameters() {
        let xml = connect_stream_xml("bridge.example.com", "eyJmb3VuZCI6dHJ1ZX0=", "+815012345678", "CA1");
        assert!(xml.contains("wss://bridge.example.com/media-stream"));
        assert!(xml.contains("name=\"customerContext\" value=\"eyJmb3VuZCI6dHJ1ZX0=\""));
        assert!(xml.contains("name=\"callerPhone\" value=\"+815012345678\""));
        assert!(xml.contains("name=\"callSid\" value=\"CA1\""));
    }

    #[test]
    fn blind_transfer_xml_escapes_injected_text() {
        let xml = blind_transfer_xml("+1555<script>", "https://example.com/cb?a=1&b=2");
        assert!(!xml.contains("<script>"));
        assert!(xml.contains("&amp;b=2"));
    }

    #[test]
    fn hold_music_xml_plays_the_given_url() {
        let xml = hold_music_xml("https://example.com/hold.mp3");
        assert!(xml.contains("<Play loop=\"0\">https://example.com/hold.mp3</Play>"));
    }
}
