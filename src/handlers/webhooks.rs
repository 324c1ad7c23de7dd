use axum::{extract::State, http::HeaderMap, response::IntoResponse};
use bytes::Bytes;
use tracing::warn;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::services::webhooks::StripeEvent;
use crate::AppState;

/// Header carrying the payment processor's signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[utoipa::path(
    post,
    path = "/api/v1/checkout/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Event processed", body = crate::services::webhooks::WebhookOutcome),
        (status = 400, description = "Malformed payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order reconstruction failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("Missing signature header".to_string()))?;

    if let Err(e) = state.services.webhooks.verify_signature(signature, &body) {
        warn!(error = %e, "webhook signature verification failed");
        return Err(e);
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let outcome = state.services.webhooks.handle_event(event).await?;
    Ok(success_response(outcome))
}
