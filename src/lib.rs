pub mod bag;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod payments;
pub mod services;
pub mod sessions;

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::json;

use errors::ServiceError;

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Wires the service graph into an [`AppState`].
///
/// `webhook_lookup_policy` overrides the reconciler's bounded-poll attempts
/// and delay; tests pass a zero delay.
pub fn build_state(
    db: Arc<DatabaseConnection>,
    config: config::AppConfig,
    sessions: Arc<dyn sessions::SessionStore>,
    gateway: Arc<dyn payments::PaymentGateway>,
    confirmations: Arc<dyn notifications::ConfirmationSender>,
    event_sender: events::EventSender,
    webhook_lookup_policy: Option<(u32, std::time::Duration)>,
) -> AppState {
    use services::{
        bag_service::BagService, checkout::CheckoutService, orders::OrderService,
        profiles::ProfileService, webhooks::WebhookService,
    };

    let sender = Some(Arc::new(event_sender.clone()));

    let bag = Arc::new(BagService::new(
        db.clone(),
        sessions.clone(),
        sender.clone(),
        config.free_delivery_threshold,
        config.standard_delivery_rate,
    ));
    let orders = Arc::new(OrderService::new(
        db.clone(),
        sender.clone(),
        config.free_delivery_threshold,
        config.standard_delivery_rate,
    ));
    let profiles = Arc::new(ProfileService::new(db.clone()));
    let checkout = Arc::new(CheckoutService::new(
        sessions.clone(),
        bag.clone(),
        orders.clone(),
        profiles.clone(),
        gateway,
        confirmations.clone(),
        sender.clone(),
        config.currency.clone(),
    ));

    let mut webhooks = WebhookService::new(
        orders.clone(),
        profiles.clone(),
        confirmations,
        sender,
        config.stripe_webhook_secret.clone().unwrap_or_default(),
        config.stripe_webhook_tolerance_secs as i64,
    );
    if let Some((attempts, delay)) = webhook_lookup_policy {
        webhooks = webhooks.with_lookup_policy(attempts, delay);
    }

    AppState {
        db,
        config,
        event_sender,
        services: handlers::AppServices {
            bag,
            orders,
            profiles,
            checkout,
            webhooks: Arc::new(webhooks),
        },
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    state.db.ping().await.map_err(ServiceError::DatabaseError)?;
    Ok(Json(json!({ "status": "ok" })))
}

/// All v1 API routes, to be nested under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/products", get(handlers::products::list_products))
        .route("/products/:id", get(handlers::products::get_product))
        .route("/bag", get(handlers::bag::get_bag))
        .route("/bag/items", post(handlers::bag::add_to_bag))
        .route(
            "/bag/items/:product_id",
            put(handlers::bag::adjust_bag).delete(handlers::bag::remove_from_bag),
        )
        .route("/checkout", post(handlers::checkout::start_checkout))
        .route(
            "/checkout/complete",
            post(handlers::checkout::complete_checkout),
        )
        .route(
            "/checkout/webhook",
            post(handlers::webhooks::payment_webhook),
        )
        .route("/orders/:order_number", get(handlers::orders::get_order))
        .route(
            "/profiles/:username",
            get(handlers::profiles::get_profile).put(handlers::profiles::update_profile),
        )
}

/// Full application router: banner, versioned API, and the Swagger UI.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .with_state(state)
}
