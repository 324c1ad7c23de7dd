use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::ConfirmationSender,
    payments::{pid_from_client_secret, IntentMetadata, PaymentGateway},
    services::bag_service::{BagService, BagSnapshot},
    services::orders::{DeliveryDetails, OrderResponse, OrderService},
    services::pricing,
    services::profiles::ProfileService,
    sessions::SessionStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Username recorded in payment intent metadata for guest checkouts.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Response to starting a checkout: the client confirms the card payment
/// against `client_secret` while the order form is submitted separately.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct CheckoutSession {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub snapshot: BagSnapshot,
}

/// The submitted checkout form.
#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutForm {
    #[serde(flatten)]
    #[validate]
    pub details: DeliveryDetails,
    #[validate(length(min = 1, message = "Client secret is required"))]
    pub client_secret: String,
    #[serde(default)]
    pub save_info: bool,
    pub username: Option<String>,
}

/// Orchestrates the checkout flow: sizing and creating the payment intent,
/// then turning the confirmed form into an order.
#[derive(Clone)]
pub struct CheckoutService {
    sessions: Arc<dyn SessionStore>,
    bag_service: Arc<BagService>,
    orders: Arc<OrderService>,
    profiles: Arc<ProfileService>,
    gateway: Arc<dyn PaymentGateway>,
    confirmations: Arc<dyn ConfirmationSender>,
    event_sender: Option<Arc<EventSender>>,
    currency: String,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        bag_service: Arc<BagService>,
        orders: Arc<OrderService>,
        profiles: Arc<ProfileService>,
        gateway: Arc<dyn PaymentGateway>,
        confirmations: Arc<dyn ConfirmationSender>,
        event_sender: Option<Arc<EventSender>>,
        currency: String,
    ) -> Self {
        Self {
            sessions,
            bag_service,
            orders,
            profiles,
            gateway,
            confirmations,
            event_sender,
            currency,
        }
    }

    /// Opens a checkout: prices the bag, creates a payment intent for the
    /// grand total, and stamps the intent with the metadata the webhook
    /// reconciler needs to rebuild the order on its own.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn start_checkout(
        &self,
        session_id: &str,
        username: Option<&str>,
        save_info: bool,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut data = self.sessions.load(session_id).await?;
        if data.bag.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "There's nothing in your bag at the moment".to_string(),
            ));
        }

        let snapshot = self.bag_service.snapshot_of(&data.bag).await?;
        let amount_minor = pricing::to_minor_units(snapshot.quote.grand_total)?;

        let intent = self
            .gateway
            .create_intent(amount_minor, &self.currency)
            .await?;

        data.save_info = save_info;
        let bag_json = data.bag.to_json()?;
        self.sessions.save(session_id, data).await?;

        let metadata = IntentMetadata {
            bag: bag_json,
            save_info,
            username: username.unwrap_or(ANONYMOUS_USER).to_string(),
        };
        self.gateway
            .update_intent_metadata(&intent.id, &metadata)
            .await?;

        info!(payment_intent_id = %intent.id, "checkout started");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CheckoutStarted {
                    session_id: session_id.to_string(),
                    payment_intent_id: intent.id.clone(),
                })
                .await;
        }

        Ok(CheckoutSession {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            snapshot,
        })
    }

    /// Completes a checkout: creates the order from the session bag, unless
    /// the webhook reconciler already recorded a matching one, then saves
    /// delivery defaults back to the profile when asked, clears the bag, and
    /// sends the confirmation.
    #[instrument(skip(self, form), fields(session_id = %session_id))]
    pub async fn complete_checkout(
        &self,
        session_id: &str,
        form: CheckoutForm,
    ) -> Result<OrderResponse, ServiceError> {
        form.validate()?;

        let stripe_pid = pid_from_client_secret(&form.client_secret)
            .ok_or_else(|| {
                ServiceError::ValidationError("Malformed client secret".to_string())
            })?
            .to_string();

        let data = self.sessions.load(session_id).await?;
        if data.bag.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "There's nothing in your bag at the moment".to_string(),
            ));
        }

        let username = form
            .username
            .as_deref()
            .filter(|u| !u.is_empty() && *u != ANONYMOUS_USER);

        let profile = match username {
            Some(username) => Some(self.profiles.get_or_create(username).await?),
            None => None,
        };

        let original_bag = data.bag.to_json()?;
        let snapshot = self.bag_service.snapshot_of(&data.bag).await?;

        // The webhook reconciler may have recorded this payment before the
        // form arrived; a matching order means nothing more to create.
        let existing = self
            .orders
            .find_matching_order(
                &form.details,
                &original_bag,
                snapshot.quote.grand_total,
                &stripe_pid,
            )
            .await?;

        let order = match existing {
            Some(order) => {
                info!(
                    order_number = %order.order_number,
                    "payment already has a matching order"
                );
                if order.user_profile_id.is_none() {
                    if let Some(profile) = &profile {
                        self.orders.attach_profile(order.id, profile.id).await?;
                    }
                }
                order
            }
            None => {
                self.orders
                    .create_order(
                        &form.details,
                        &data.bag,
                        &original_bag,
                        &stripe_pid,
                        profile.as_ref().map(|p| p.id),
                    )
                    .await?
            }
        };

        if form.save_info {
            if let Some(username) = username {
                if let Err(e) = self
                    .profiles
                    .save_defaults_from_order(username, &form.details)
                    .await
                {
                    // The order is already placed; losing the saved defaults
                    // is not worth failing the checkout over.
                    warn!(error = %e, username, "failed to save delivery defaults");
                }
            }
        }

        self.sessions.clear_bag(session_id).await?;

        if let Err(e) = self.confirmations.send_confirmation(&order).await {
            error!(error = %e, order_number = %order.order_number, "confirmation send failed");
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CheckoutCompleted {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                })
                .await;
        }

        self.orders.to_response(order).await
    }
}
