use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{errors, handlers, services};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = env!("CARGO_PKG_VERSION"),
        description = r#"
# Storefront API

Backend for an online store: product catalog, session shopping bag,
delivery pricing, card checkout, and webhook-driven order reconciliation.

## Sessions

Bag and checkout endpoints identify the visitor through the `X-Session-Id`
header. Unknown session ids start with an empty bag.

## Payments

Checkout opens a payment intent with the card processor and returns its
`client_secret`; the processor's webhooks land on `/api/v1/checkout/webhook`
and recreate any order the synchronous flow failed to record.
        "#
    ),
    paths(
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::bag::get_bag,
        handlers::bag::add_to_bag,
        handlers::bag::adjust_bag,
        handlers::bag::remove_from_bag,
        handlers::checkout::start_checkout,
        handlers::checkout::complete_checkout,
        handlers::webhooks::payment_webhook,
        handlers::orders::get_order,
        handlers::profiles::get_profile,
        handlers::profiles::update_profile,
    ),
    components(schemas(
        errors::ErrorResponse,
        handlers::products::ProductResponse,
        handlers::bag::AddToBagRequest,
        handlers::bag::AdjustBagRequest,
        handlers::checkout::StartCheckoutRequest,
        handlers::profiles::ProfileResponse,
        services::bag_service::BagItemView,
        services::bag_service::BagSnapshot,
        services::pricing::DeliveryQuote,
        services::orders::DeliveryDetails,
        services::orders::OrderLineItemView,
        services::orders::OrderResponse,
        services::checkout::CheckoutForm,
        services::checkout::CheckoutSession,
        services::profiles::ProfileDefaultsUpdate,
        services::webhooks::WebhookOutcome,
    )),
    tags(
        (name = "Products", description = "Product catalog"),
        (name = "Bag", description = "Session shopping bag"),
        (name = "Checkout", description = "Checkout and payment webhooks"),
        (name = "Orders", description = "Order lookup"),
        (name = "Profiles", description = "Customer delivery defaults")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
