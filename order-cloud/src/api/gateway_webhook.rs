//! Payment gateway webhook
//!
//! POST /gateway/notify: form-encoded notice from the gateway. The answer is
//! always `200 OK` in plain text, even for notices that are ignored.

use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::routing::post;

use crate::gateway::webhook::WebhookForm;
use crate::services::payments::WebhookDisposition;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway/notify", post(handle_notify))
}

pub async fn handle_notify(
    State(state): State<AppState>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> &'static str {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable webhook body");
            return "OK";
        }
    };

    match state.payments.handle_webhook(form).await {
        WebhookDisposition::Applied { status, changed } => {
            tracing::info!(%status, changed, "Webhook processed");
        }
        WebhookDisposition::Ignored(reason) => {
            tracing::info!(reason = %reason, "Webhook ignored");
        }
    }
    "OK"
}
