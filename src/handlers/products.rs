use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::product::{Column as ProductColumn, Entity as ProductEntity, Model};
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::services::pricing;
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub has_sizes: bool,
    pub image_url: Option<String>,
    pub rating: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<Model> for ProductResponse {
    fn from(p: Model) -> Self {
        Self {
            id: p.id,
            sku: p.sku,
            name: p.name,
            description: p.description,
            price: pricing::to_money(p.price),
            has_sizes: p.has_sizes,
            image_url: p.image_url,
            rating: p.rating,
            created_at: p.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses(
        (status = 200, description = "Product list", body = [ProductResponse])
    ),
    tag = "Products"
)]
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let products = ProductEntity::find()
        .order_by_asc(ProductColumn::Name)
        .all(&*state.db)
        .await?;

    let response: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(success_response(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = ProductEntity::find_by_id(id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

    Ok(success_response(ProductResponse::from(product)))
}
