use crate::{
    db::DbPool,
    entities::user_profile::{
        ActiveModel as ProfileActiveModel, Column as ProfileColumn, Entity as ProfileEntity,
        Model as ProfileModel,
    },
    errors::ServiceError,
    services::orders::DeliveryDetails,
};
use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Partial update of a profile's default delivery information. Absent fields
/// are left untouched.
#[derive(Clone, Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ProfileDefaultsUpdate {
    #[validate(length(max = 20))]
    pub default_phone_number: Option<String>,
    #[validate(length(max = 80))]
    pub default_street_address1: Option<String>,
    #[validate(length(max = 80))]
    pub default_street_address2: Option<String>,
    #[validate(length(max = 40))]
    pub default_town_or_city: Option<String>,
    #[validate(length(max = 80))]
    pub default_county: Option<String>,
    #[validate(length(max = 20))]
    pub default_postcode: Option<String>,
    #[validate(length(min = 2, max = 2, message = "Country must be a 2-letter code"))]
    pub default_country: Option<String>,
}

/// Service for customer profiles and their saved delivery defaults.
#[derive(Clone)]
pub struct ProfileService {
    db_pool: Arc<DbPool>,
}

impl ProfileService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, username: &str) -> Result<Option<ProfileModel>, ServiceError> {
        ProfileEntity::find()
            .filter(ProfileColumn::Username.eq(username))
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, username, "Failed to fetch profile");
                ServiceError::DatabaseError(e)
            })
    }

    /// Fetches the profile for a username, creating an empty one on first
    /// sight.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, username: &str) -> Result<ProfileModel, ServiceError> {
        if username.is_empty() {
            return Err(ServiceError::ValidationError(
                "Username must not be empty".to_string(),
            ));
        }

        if let Some(profile) = self.get(username).await? {
            return Ok(profile);
        }

        let profile = ProfileActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            default_phone_number: Set(None),
            default_street_address1: Set(None),
            default_street_address2: Set(None),
            default_town_or_city: Set(None),
            default_county: Set(None),
            default_postcode: Set(None),
            default_country: Set(None),
            created_at: ActiveValue::NotSet,
            updated_at: Set(None),
        };

        profile.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, username, "Failed to create profile");
            ServiceError::DatabaseError(e)
        })
    }

    /// Applies a partial update to a profile's default delivery information.
    #[instrument(skip(self, update))]
    pub async fn update_defaults(
        &self,
        username: &str,
        update: ProfileDefaultsUpdate,
    ) -> Result<ProfileModel, ServiceError> {
        update.validate()?;

        let profile = self
            .get(username)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile {} not found", username)))?;

        let mut active: ProfileActiveModel = profile.into();
        if let Some(v) = update.default_phone_number {
            active.default_phone_number = Set(Some(v));
        }
        if let Some(v) = update.default_street_address1 {
            active.default_street_address1 = Set(Some(v));
        }
        if let Some(v) = update.default_street_address2 {
            active.default_street_address2 = Set(Some(v));
        }
        if let Some(v) = update.default_town_or_city {
            active.default_town_or_city = Set(Some(v));
        }
        if let Some(v) = update.default_county {
            active.default_county = Set(Some(v));
        }
        if let Some(v) = update.default_postcode {
            active.default_postcode = Set(Some(v));
        }
        if let Some(v) = update.default_country {
            active.default_country = Set(Some(v));
        }

        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, username, "Failed to update profile defaults");
            ServiceError::DatabaseError(e)
        })
    }

    /// Overwrites a profile's defaults with the delivery details of a just
    /// completed order. Called when the customer ticked "save info".
    #[instrument(skip(self, details))]
    pub async fn save_defaults_from_order(
        &self,
        username: &str,
        details: &DeliveryDetails,
    ) -> Result<ProfileModel, ServiceError> {
        let profile = self.get_or_create(username).await?;

        let mut active: ProfileActiveModel = profile.into();
        active.default_phone_number = Set(Some(details.phone_number.clone()));
        active.default_street_address1 = Set(Some(details.street_address1.clone()));
        active.default_street_address2 = Set(details.street_address2.clone());
        active.default_town_or_city = Set(Some(details.town_or_city.clone()));
        active.default_county = Set(details.county.clone());
        active.default_postcode = Set(details.postcode.clone());
        active.default_country = Set(Some(details.country.clone()));

        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, username, "Failed to save profile defaults from order");
            ServiceError::DatabaseError(e)
        })
    }
}
