use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_number}",
    params(("order_number" = String, Path, description = "Public order number")),
    responses(
        (status = 200, description = "Order with line items"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_by_order_number(&order_number)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;

    Ok(success_response(order))
}
