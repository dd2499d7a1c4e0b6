//! Router assembly. Grounded on the teacher's `api::router` split between a
//! handful of routes and a CORS layer wired at build time — scaled down to
//! the three endpoints this bridge exposes, with no public/protected split
//! since none of them carry a bearer-token auth scheme.

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use vb_domain::config::CorsConfig;

use crate::state::AppState;
use crate::{carrier_ws, health, webhook};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/voice/incoming", post(webhook::incoming_call))
        .route("/media-stream", get(carrier_ws::media_stream))
        .layer(build_cors_layer(&state.config.server.cors))
        .with_state(state)
}

/// Build a [`CorsLayer`] from the configured allowed origins. A literal
/// `"*"` entry allows all origins; otherwise only the listed origins (which
/// must parse as header values) are allowed.
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.allowed_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_cors_is_detected_as_permissive() {
        let cors = CorsConfig {
            allowed_origins: vec!["*".to_string()],
        };
        // build_cors_layer doesn't expose its internals for inspection;
        // this just exercises the wildcard branch without panicking.
        let _layer = build_cors_layer(&cors);
    }

    #[test]
    fn invalid_origin_is_skipped_without_panicking() {
        let cors = CorsConfig {
            allowed_origins: vec!["not a valid origin \n".to_string()],
        };
        let _layer = build_cors_layer(&cors);
    }
}
