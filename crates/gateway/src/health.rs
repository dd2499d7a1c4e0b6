//! Health endpoint (ambient stack §A5, spec §6): `GET /health`. Grounded on
//! the teacher's minimal `admin::health` JSON-response shape, widened to
//! carry the deployment profile and the feature toggles the spec names
//! (`{status, timestamp, version, environment, features}`).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use vb_domain::config::DeploymentProfile;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let environment = match state.config.deployment_profile {
        DeploymentProfile::Development => "development",
        DeploymentProfile::Production => "production",
    };

    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": environment,
        "features": {
            "email": state.config.email.enabled,
            "carrier_signature_required": state.config.carrier.require_signature,
        },
    }))
}
