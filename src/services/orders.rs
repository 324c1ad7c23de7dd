use crate::{
    bag::Bag,
    db::DbPool,
    entities::order::{
        ActiveModel as OrderActiveModel, Column as OrderColumn, Entity as OrderEntity,
        Model as OrderModel,
    },
    entities::order_line_item::{
        ActiveModel as LineItemActiveModel, Column as LineItemColumn, Entity as LineItemEntity,
        Model as LineItemModel,
    },
    entities::product::{Column as ProductColumn, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Delivery details captured from the checkout form.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeliveryDetails {
    #[validate(length(min = 1, max = 50, message = "Full name is required"))]
    pub full_name: String,
    #[validate(
        email(message = "A valid email address is required"),
        length(max = 254)
    )]
    pub email: String,
    #[validate(length(min = 1, max = 20, message = "Phone number is required"))]
    pub phone_number: String,
    #[validate(length(min = 2, max = 2, message = "Country must be a 2-letter code"))]
    pub country: String,
    #[validate(length(max = 20))]
    pub postcode: Option<String>,
    #[validate(length(min = 1, max = 40, message = "Town or city is required"))]
    pub town_or_city: String,
    #[validate(length(min = 1, max = 80, message = "Street address is required"))]
    pub street_address1: String,
    #[validate(length(max = 80))]
    pub street_address2: Option<String>,
    #[validate(length(max = 80))]
    pub county: Option<String>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct OrderLineItemView {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_size: Option<String>,
    pub quantity: i32,
    pub lineitem_total: Decimal,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub order_number: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    pub postcode: Option<String>,
    pub town_or_city: String,
    pub street_address1: String,
    pub street_address2: Option<String>,
    pub county: Option<String>,
    pub date: DateTime<Utc>,
    pub delivery_cost: Decimal,
    pub order_total: Decimal,
    pub grand_total: Decimal,
    pub items: Vec<OrderLineItemView>,
}

/// Service owning the order aggregate: creation from a bag, derived totals,
/// lookups, and the webhook de-duplication match.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    free_delivery_threshold: Decimal,
    standard_delivery_rate: Decimal,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        free_delivery_threshold: Decimal,
        standard_delivery_rate: Decimal,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            free_delivery_threshold,
            standard_delivery_rate,
        }
    }

    /// Creates an order from a bag, expanding every bag line into a line
    /// item priced at the product's current price, then recomputing the
    /// order's totals. The whole operation is one transaction; a missing
    /// product rolls everything back.
    #[instrument(skip(self, details, bag), fields(stripe_pid = %stripe_pid))]
    pub async fn create_order(
        &self,
        details: &DeliveryDetails,
        bag: &Bag,
        original_bag: &str,
        stripe_pid: &str,
        user_profile_id: Option<Uuid>,
    ) -> Result<OrderModel, ServiceError> {
        details.validate()?;

        if bag.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot create an order from an empty bag".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(OrderModel::generate_order_number()),
            full_name: Set(details.full_name.clone()),
            email: Set(details.email.clone()),
            phone_number: Set(details.phone_number.clone()),
            country: Set(details.country.clone()),
            postcode: Set(details.postcode.clone()),
            town_or_city: Set(details.town_or_city.clone()),
            street_address1: Set(details.street_address1.clone()),
            street_address2: Set(details.street_address2.clone()),
            county: Set(details.county.clone()),
            date: Set(Utc::now()),
            delivery_cost: Set(Decimal::ZERO),
            order_total: Set(Decimal::ZERO),
            grand_total: Set(Decimal::ZERO),
            original_bag: Set(original_bag.to_string()),
            stripe_pid: Set(stripe_pid.to_string()),
            user_profile_id: Set(user_profile_id),
        };

        order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        for line in bag.lines() {
            let product_id = Uuid::parse_str(&line.product_id).map_err(|_| {
                ServiceError::ValidationError(format!(
                    "Invalid product id in bag: {}",
                    line.product_id
                ))
            })?;

            let product = ProductEntity::find_by_id(product_id)
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            let product = match product {
                Some(p) => p,
                None => {
                    // Rolls back the order and any line items inserted so far.
                    txn.rollback().await.map_err(ServiceError::DatabaseError)?;
                    return Err(ServiceError::NotFound(format!(
                        "One of the products in your bag wasn't found ({})",
                        product_id
                    )));
                }
            };

            let lineitem_total = pricing::to_money(product.price * Decimal::from(line.quantity));
            let line_item = LineItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_size: Set(line.size.clone()),
                quantity: Set(line.quantity as i32),
                lineitem_total: Set(lineitem_total),
            };
            line_item.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to insert line item");
                ServiceError::DatabaseError(e)
            })?;
        }

        let order = self.recompute_totals(&txn, order_id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order.order_number, "Order created");

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderCreated(order_id)).await;
        }

        Ok(order)
    }

    /// Recomputes an order's derived monetary fields from its line items.
    ///
    /// Must be called inside the same transaction as any line item mutation
    /// so the persisted totals can never drift from the line items.
    pub async fn recompute_totals<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let line_items = LineItemEntity::find()
            .filter(LineItemColumn::OrderId.eq(order_id))
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let order_total: Decimal = line_items.iter().map(|li| li.lineitem_total).sum();
        let quote = pricing::quote(
            order_total,
            self.free_delivery_threshold,
            self.standard_delivery_rate,
        );

        let mut active: OrderActiveModel = order.into();
        active.order_total = Set(quote.order_total);
        active.delivery_cost = Set(quote.delivery_cost);
        active.grand_total = Set(quote.grand_total);

        active.update(conn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order totals");
            ServiceError::DatabaseError(e)
        })
    }

    /// Looks for an existing order matching a payment intent's details.
    ///
    /// Candidates are narrowed in SQL by the exact de-duplication anchors
    /// (`stripe_pid` and the bag JSON), then the delivery fields are compared
    /// case-insensitively, the way the checkout form would have stored them.
    #[instrument(skip(self, details), fields(stripe_pid = %stripe_pid))]
    pub async fn find_matching_order(
        &self,
        details: &DeliveryDetails,
        original_bag: &str,
        grand_total: Decimal,
        stripe_pid: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let candidates = OrderEntity::find()
            .filter(OrderColumn::StripePid.eq(stripe_pid))
            .filter(OrderColumn::OriginalBag.eq(original_bag))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(candidates
            .into_iter()
            .find(|order| order_matches_details(order, details, grand_total)))
    }

    /// Fetches an order by its public order number, with resolved line items.
    #[instrument(skip(self))]
    pub async fn get_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find()
            .filter(OrderColumn::OrderNumber.eq(order_number))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match order {
            Some(order) => Ok(Some(self.to_response(order).await?)),
            None => Ok(None),
        }
    }

    /// Lists a profile's orders, most recent first.
    #[instrument(skip(self))]
    pub async fn list_for_profile(
        &self,
        user_profile_id: Uuid,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(OrderColumn::UserProfileId.eq(user_profile_id))
            .order_by_desc(OrderColumn::Date)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            responses.push(self.to_response(order).await?);
        }
        Ok(responses)
    }

    /// Attaches an order to a user profile after the fact. The webhook
    /// reconciler uses this when the intent metadata names a known user.
    pub async fn attach_profile(
        &self,
        order_id: Uuid,
        user_profile_id: Uuid,
    ) -> Result<(), ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: OrderActiveModel = order.into();
        active.user_profile_id = Set(Some(user_profile_id));
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    pub async fn to_response(&self, order: OrderModel) -> Result<OrderResponse, ServiceError> {
        let line_items: Vec<LineItemModel> = LineItemEntity::find()
            .filter(LineItemColumn::OrderId.eq(order.id))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let product_ids: Vec<Uuid> = line_items.iter().map(|li| li.product_id).collect();
        let products: HashMap<Uuid, ProductModel> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            ProductEntity::find()
                .filter(ProductColumn::Id.is_in(product_ids))
                .all(&*self.db_pool)
                .await
                .map_err(ServiceError::DatabaseError)?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let items = line_items
            .into_iter()
            .map(|li| OrderLineItemView {
                product_id: li.product_id,
                product_name: products
                    .get(&li.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                product_size: li.product_size,
                quantity: li.quantity,
                lineitem_total: pricing::to_money(li.lineitem_total),
            })
            .collect();

        Ok(OrderResponse {
            order_number: order.order_number,
            full_name: order.full_name,
            email: order.email,
            phone_number: order.phone_number,
            country: order.country,
            postcode: order.postcode,
            town_or_city: order.town_or_city,
            street_address1: order.street_address1,
            street_address2: order.street_address2,
            county: order.county,
            date: order.date,
            delivery_cost: pricing::to_money(order.delivery_cost),
            order_total: pricing::to_money(order.order_total),
            grand_total: pricing::to_money(order.grand_total),
            items,
        })
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn opt_eq_ignore_case(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

fn order_matches_details(
    order: &OrderModel,
    details: &DeliveryDetails,
    grand_total: Decimal,
) -> bool {
    eq_ignore_case(&order.full_name, &details.full_name)
        && eq_ignore_case(&order.email, &details.email)
        && eq_ignore_case(&order.phone_number, &details.phone_number)
        && eq_ignore_case(&order.country, &details.country)
        && eq_ignore_case(&order.town_or_city, &details.town_or_city)
        && eq_ignore_case(&order.street_address1, &details.street_address1)
        && opt_eq_ignore_case(&order.postcode, &details.postcode)
        && opt_eq_ignore_case(&order.street_address2, &details.street_address2)
        && opt_eq_ignore_case(&order.county, &details.county)
        && order.grand_total == grand_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_details() -> DeliveryDetails {
        DeliveryDetails {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone_number: "+15550100".to_string(),
            country: "US".to_string(),
            postcode: Some("02139".to_string()),
            town_or_city: "Cambridge".to_string(),
            street_address1: "1 Main St".to_string(),
            street_address2: None,
            county: None,
        }
    }

    fn sample_order(details: &DeliveryDetails, grand_total: Decimal) -> OrderModel {
        OrderModel {
            id: Uuid::new_v4(),
            order_number: OrderModel::generate_order_number(),
            full_name: details.full_name.clone(),
            email: details.email.clone(),
            phone_number: details.phone_number.clone(),
            country: details.country.clone(),
            postcode: details.postcode.clone(),
            town_or_city: details.town_or_city.clone(),
            street_address1: details.street_address1.clone(),
            street_address2: details.street_address2.clone(),
            county: details.county.clone(),
            date: Utc::now(),
            delivery_cost: dec!(2.00),
            order_total: dec!(20.00),
            grand_total,
            original_bag: r#"{"12":2}"#.to_string(),
            stripe_pid: "pi_123".to_string(),
            user_profile_id: None,
        }
    }

    #[test]
    fn details_match_is_case_insensitive() {
        let details = sample_details();
        let mut order = sample_order(&details, dec!(22.00));
        order.full_name = "ADA LOVELACE".to_string();
        order.email = "Ada@Example.com".to_string();

        assert!(order_matches_details(&order, &details, dec!(22.00)));
    }

    #[test]
    fn grand_total_must_match_exactly() {
        let details = sample_details();
        let order = sample_order(&details, dec!(22.00));

        assert!(!order_matches_details(&order, &details, dec!(22.01)));
    }

    #[test]
    fn optional_fields_must_agree_on_presence() {
        let details = sample_details();
        let mut order = sample_order(&details, dec!(22.00));
        order.county = Some("Middlesex".to_string());

        assert!(!order_matches_details(&order, &details, dec!(22.00)));
    }

    #[test]
    fn order_number_is_32_uppercase_hex_chars() {
        let n = OrderModel::generate_order_number();
        assert_eq!(n.len(), 32);
        assert!(n.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn delivery_details_validation_rejects_bad_email() {
        let mut details = sample_details();
        details.email = "not-an-email".to_string();
        assert!(details.validate().is_err());
    }
}
