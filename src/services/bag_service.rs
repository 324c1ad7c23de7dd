use crate::{
    bag::Bag,
    db::DbPool,
    entities::product::{Column as ProductColumn, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::{self, DeliveryQuote},
    sessions::SessionStore,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// One resolved bag line with catalog data attached.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct BagItemView {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub size: Option<String>,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// The bag resolved against current catalog prices, plus delivery pricing.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct BagSnapshot {
    pub items: Vec<BagItemView>,
    pub product_count: u32,
    #[serde(flatten)]
    pub quote: DeliveryQuote,
}

/// Service for session bag mutations and pricing snapshots.
#[derive(Clone)]
pub struct BagService {
    db_pool: Arc<DbPool>,
    sessions: Arc<dyn SessionStore>,
    event_sender: Option<Arc<EventSender>>,
    free_delivery_threshold: Decimal,
    standard_delivery_rate: Decimal,
}

impl BagService {
    pub fn new(
        db_pool: Arc<DbPool>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Option<Arc<EventSender>>,
        free_delivery_threshold: Decimal,
        standard_delivery_rate: Decimal,
    ) -> Self {
        Self {
            db_pool,
            sessions,
            event_sender,
            free_delivery_threshold,
            standard_delivery_rate,
        }
    }

    /// Adds a quantity of a product to the session bag.
    #[instrument(skip(self), fields(session_id = %session_id, product_id = %product_id))]
    pub async fn add_to_bag(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<BagSnapshot, ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let product = self.load_product(product_id).await?;
        self.check_size(&product, size)?;

        let mut data = self.sessions.load(session_id).await?;
        data.bag.add(&product_id.to_string(), quantity, size);
        self.sessions.save(session_id, data).await?;

        self.emit_bag_updated(session_id).await;
        self.get_snapshot(session_id).await
    }

    /// Sets the exact quantity of a bag line. Zero removes it.
    #[instrument(skip(self), fields(session_id = %session_id, product_id = %product_id))]
    pub async fn adjust_bag(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<BagSnapshot, ServiceError> {
        let product = self.load_product(product_id).await?;
        self.check_size(&product, size)?;

        let mut data = self.sessions.load(session_id).await?;
        data.bag.adjust(&product_id.to_string(), quantity, size);
        self.sessions.save(session_id, data).await?;

        self.emit_bag_updated(session_id).await;
        self.get_snapshot(session_id).await
    }

    /// Removes a product (or one of its sizes) from the bag. Removing an
    /// absent line succeeds, so clients may retry safely.
    #[instrument(skip(self), fields(session_id = %session_id, product_id = %product_id))]
    pub async fn remove_from_bag(
        &self,
        session_id: &str,
        product_id: Uuid,
        size: Option<&str>,
    ) -> Result<BagSnapshot, ServiceError> {
        let mut data = self.sessions.load(session_id).await?;
        data.bag.remove(&product_id.to_string(), size);
        self.sessions.save(session_id, data).await?;

        self.emit_bag_updated(session_id).await;
        self.get_snapshot(session_id).await
    }

    /// Resolves the session bag against current catalog prices and computes
    /// the delivery quote.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn get_snapshot(&self, session_id: &str) -> Result<BagSnapshot, ServiceError> {
        let data = self.sessions.load(session_id).await?;
        self.snapshot_of(&data.bag).await
    }

    /// Resolves an arbitrary bag (not necessarily the session's current one)
    /// against the catalog. The webhook reconciler prices the bag recorded
    /// in payment intent metadata this way.
    pub async fn snapshot_of(&self, bag: &Bag) -> Result<BagSnapshot, ServiceError> {
        let lines = bag.lines();

        let mut ids = Vec::with_capacity(lines.len());
        for line in &lines {
            let id = Uuid::parse_str(&line.product_id).map_err(|_| {
                ServiceError::ValidationError(format!(
                    "Invalid product id in bag: {}",
                    line.product_id
                ))
            })?;
            ids.push(id);
        }

        let products: HashMap<Uuid, ProductModel> = if ids.is_empty() {
            HashMap::new()
        } else {
            ProductEntity::find()
                .filter(ProductColumn::Id.is_in(ids.clone()))
                .all(&*self.db_pool)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to resolve bag products");
                    ServiceError::DatabaseError(e)
                })?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let mut items = Vec::with_capacity(lines.len());
        let mut order_total = Decimal::ZERO;
        for (line, id) in lines.iter().zip(ids) {
            let product = products.get(&id).ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} no longer exists", id))
            })?;
            let subtotal = pricing::to_money(product.price * Decimal::from(line.quantity));
            order_total += subtotal;
            items.push(BagItemView {
                product_id: id,
                name: product.name.clone(),
                price: pricing::to_money(product.price),
                size: line.size.clone(),
                quantity: line.quantity,
                subtotal,
            });
        }

        let quote = pricing::quote(
            order_total,
            self.free_delivery_threshold,
            self.standard_delivery_rate,
        );

        Ok(BagSnapshot {
            product_count: items.iter().map(|i| i.quantity).sum(),
            items,
            quote,
        })
    }

    async fn load_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    fn check_size(&self, product: &ProductModel, size: Option<&str>) -> Result<(), ServiceError> {
        match (product.has_sizes, size) {
            (true, None) => Err(ServiceError::ValidationError(format!(
                "Product {} requires a size",
                product.id
            ))),
            (false, Some(_)) => Err(ServiceError::ValidationError(format!(
                "Product {} does not come in sizes",
                product.id
            ))),
            _ => Ok(()),
        }
    }

    async fn emit_bag_updated(&self, session_id: &str) {
        if let Some(sender) = &self.event_sender {
            let product_count = match self.sessions.load(session_id).await {
                Ok(data) => data.bag.product_count(),
                Err(_) => 0,
            };
            sender
                .send_or_log(Event::BagUpdated {
                    session_id: session_id.to_string(),
                    product_count,
                })
                .await;
        }
    }
}
