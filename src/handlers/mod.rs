use std::sync::Arc;

use crate::services::{
    bag_service::BagService, checkout::CheckoutService, orders::OrderService,
    profiles::ProfileService, webhooks::WebhookService,
};

pub mod bag;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod webhooks;

/// Service registry shared through application state.
#[derive(Clone)]
pub struct AppServices {
    pub bag: Arc<BagService>,
    pub orders: Arc<OrderService>,
    pub profiles: Arc<ProfileService>,
    pub checkout: Arc<CheckoutService>,
    pub webhooks: Arc<WebhookService>,
}
