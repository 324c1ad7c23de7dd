use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::user_profile::Model as ProfileModel;
use crate::errors::ServiceError;
use crate::handlers::common::{success_response, validate_input};
use crate::services::orders::OrderResponse;
use crate::services::profiles::ProfileDefaultsUpdate;
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub username: String,
    pub default_phone_number: Option<String>,
    pub default_street_address1: Option<String>,
    pub default_street_address2: Option<String>,
    pub default_town_or_city: Option<String>,
    pub default_county: Option<String>,
    pub default_postcode: Option<String>,
    pub default_country: Option<String>,
    pub orders: Vec<OrderResponse>,
}

impl ProfileResponse {
    fn new(profile: ProfileModel, orders: Vec<OrderResponse>) -> Self {
        Self {
            username: profile.username,
            default_phone_number: profile.default_phone_number,
            default_street_address1: profile.default_street_address1,
            default_street_address2: profile.default_street_address2,
            default_town_or_city: profile.default_town_or_city,
            default_county: profile.default_county,
            default_postcode: profile.default_postcode,
            default_country: profile.default_country,
            orders,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/{username}",
    params(("username" = String, Path, description = "Profile username")),
    responses(
        (status = 200, description = "Profile defaults with order history", body = ProfileResponse)
    ),
    tag = "Profiles"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    // Profiles materialise on first reference.
    let profile = state.services.profiles.get_or_create(&username).await?;
    let orders = state.services.orders.list_for_profile(profile.id).await?;

    Ok(success_response(ProfileResponse::new(profile, orders)))
}

#[utoipa::path(
    put,
    path = "/api/v1/profiles/{username}",
    params(("username" = String, Path, description = "Profile username")),
    request_body = ProfileDefaultsUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid update", body = crate::errors::ErrorResponse)
    ),
    tag = "Profiles"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(update): Json<ProfileDefaultsUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&update)?;

    state.services.profiles.get_or_create(&username).await?;
    let profile = state
        .services
        .profiles
        .update_defaults(&username, update)
        .await?;
    let orders = state.services.orders.list_for_profile(profile.id).await?;

    Ok(success_response(ProfileResponse::new(profile, orders)))
}
