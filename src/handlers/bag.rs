use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::{session_id, success_response, validate_input};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToBagRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[validate(length(min = 1, max = 8))]
    pub size: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustBagRequest {
    /// The exact quantity to hold; zero removes the line.
    pub quantity: u32,
    #[validate(length(min = 1, max = 8))]
    pub size: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RemoveBagParams {
    pub size: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/bag",
    responses(
        (status = 200, description = "Bag snapshot with pricing summary"),
        (status = 400, description = "Missing session header", body = crate::errors::ErrorResponse)
    ),
    tag = "Bag"
)]
pub async fn get_bag(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let session = session_id(&headers)?;
    let snapshot = state.services.bag.get_snapshot(&session).await?;
    Ok(success_response(snapshot))
}

#[utoipa::path(
    post,
    path = "/api/v1/bag/items",
    request_body = AddToBagRequest,
    responses(
        (status = 200, description = "Updated bag snapshot"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "Bag"
)]
pub async fn add_to_bag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddToBagRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = session_id(&headers)?;
    validate_input(&request)?;

    let snapshot = state
        .services
        .bag
        .add_to_bag(
            &session,
            request.product_id,
            request.quantity,
            request.size.as_deref(),
        )
        .await?;
    Ok(success_response(snapshot))
}

#[utoipa::path(
    put,
    path = "/api/v1/bag/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    request_body = AdjustBagRequest,
    responses(
        (status = 200, description = "Updated bag snapshot"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bag"
)]
pub async fn adjust_bag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
    Json(request): Json<AdjustBagRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = session_id(&headers)?;
    validate_input(&request)?;

    let snapshot = state
        .services
        .bag
        .adjust_bag(
            &session,
            product_id,
            request.quantity,
            request.size.as_deref(),
        )
        .await?;
    Ok(success_response(snapshot))
}

#[utoipa::path(
    delete,
    path = "/api/v1/bag/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product id"),
        RemoveBagParams
    ),
    responses(
        (status = 200, description = "Updated bag snapshot")
    ),
    tag = "Bag"
)]
pub async fn remove_from_bag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
    Query(params): Query<RemoveBagParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = session_id(&headers)?;

    let snapshot = state
        .services
        .bag
        .remove_from_bag(&session, product_id, params.size.as_deref())
        .await?;
    Ok(success_response(snapshot))
}
