use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted checkout order.
///
/// The monetary fields (`delivery_cost`, `order_total`, `grand_total`) are
/// derived from the order's line items and never set directly by callers.
/// `original_bag` keeps the exact bag JSON present at creation; together with
/// `stripe_pid` and the address fields it forms the de-duplication key the
/// webhook reconciler matches against.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    #[sea_orm(nullable)]
    pub postcode: Option<String>,
    pub town_or_city: String,
    pub street_address1: String,
    #[sea_orm(nullable)]
    pub street_address2: Option<String>,
    #[sea_orm(nullable)]
    pub county: Option<String>,
    pub date: DateTime<Utc>,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub delivery_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub order_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub grand_total: Decimal,
    #[sea_orm(column_type = "Text")]
    pub original_bag: String,
    pub stripe_pid: String,
    #[sea_orm(nullable)]
    pub user_profile_id: Option<Uuid>,
}

impl Model {
    /// Generates a random, unique 32-character order number.
    pub fn generate_order_number() -> String {
        Uuid::new_v4().simple().to_string().to_uppercase()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line_item::Entity")]
    OrderLineItems,
    #[sea_orm(
        belongs_to = "super::user_profile::Entity",
        from = "Column::UserProfileId",
        to = "super::user_profile::Column::Id"
    )]
    UserProfile,
}

impl Related<super::order_line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLineItems.def()
    }
}

impl Related<super::user_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserProfile.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            // Assign the order number if the caller has not set one.
            let missing = match &active_model.order_number {
                ActiveValue::Set(n) => n.is_empty(),
                _ => true,
            };
            if missing {
                active_model.order_number = Set(Model::generate_order_number());
            }

            if let ActiveValue::NotSet = active_model.date {
                active_model.date = Set(Utc::now());
            }
        }

        Ok(active_model)
    }
}
