use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, session_id, success_response, validate_input};
use crate::services::checkout::CheckoutForm;
use crate::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartCheckoutRequest {
    pub username: Option<String>,
    #[serde(default)]
    pub save_info: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Checkout opened; pay against client_secret"),
        (status = 400, description = "Bag is empty", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = session_id(&headers)?;

    let checkout = state
        .services
        .checkout
        .start_checkout(&session, request.username.as_deref(), request.save_info)
        .await?;
    Ok(success_response(checkout))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/complete",
    request_body = CheckoutForm,
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Invalid form or empty bag", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn complete_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<CheckoutForm>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = session_id(&headers)?;
    validate_input(&form)?;

    let order = state
        .services
        .checkout
        .complete_checkout(&session, form)
        .await?;
    Ok(created_response(order))
}
