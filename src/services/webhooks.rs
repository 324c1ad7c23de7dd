use crate::{
    bag::Bag,
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::ConfirmationSender,
    services::orders::{DeliveryDetails, OrderService},
    services::pricing,
    services::profiles::ProfileService,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

/// Payment processor event types the reconciler understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    PaymentSucceeded,
    PaymentFailed,
    Other,
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => EventKind::PaymentSucceeded,
            "payment_intent.payment_failed" => EventKind::PaymentFailed,
            _ => EventKind::Other,
        }
    }
}

/// Incoming webhook event envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StripeEventData {
    pub object: PaymentIntentObject,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    /// Amount in minor units (cents).
    pub amount: i64,
    #[serde(default)]
    pub metadata: IntentMetadataFields,
    #[serde(default)]
    pub shipping: Option<ShippingInfo>,
    #[serde(default)]
    pub charges: Charges,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IntentMetadataFields {
    pub bag: Option<String>,
    pub save_info: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Charges {
    #[serde(default)]
    pub data: Vec<Charge>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Charge {
    #[serde(default)]
    pub billing_details: BillingDetails,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BillingDetails {
    pub email: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ShippingInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: ShippingAddress,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ShippingAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Result of handling a webhook event, returned in the 200 body.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The synchronous checkout already created the order.
    OrderExists { order_number: String },
    /// The reconciler created the order from the intent data.
    OrderCreated { order_number: String },
    /// Event acknowledged with no side effects.
    Acknowledged { event_type: String },
}

/// Verifies and processes payment processor webhooks.
///
/// The succeeded handler is the safety net behind checkout: if the customer
/// paid but the form submission never landed, the order is rebuilt from the
/// intent metadata so payment and order can never diverge.
#[derive(Clone)]
pub struct WebhookService {
    orders: Arc<OrderService>,
    profiles: Arc<ProfileService>,
    confirmations: Arc<dyn ConfirmationSender>,
    event_sender: Option<Arc<EventSender>>,
    webhook_secret: String,
    tolerance_secs: i64,
    lookup_attempts: u32,
    lookup_delay: Duration,
}

impl WebhookService {
    pub fn new(
        orders: Arc<OrderService>,
        profiles: Arc<ProfileService>,
        confirmations: Arc<dyn ConfirmationSender>,
        event_sender: Option<Arc<EventSender>>,
        webhook_secret: String,
        tolerance_secs: i64,
    ) -> Self {
        Self {
            orders,
            profiles,
            confirmations,
            event_sender,
            webhook_secret,
            tolerance_secs,
            lookup_attempts: 5,
            lookup_delay: Duration::from_secs(1),
        }
    }

    /// Overrides the bounded-poll policy for the order lookup. Tests use a
    /// zero delay.
    pub fn with_lookup_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.lookup_attempts = attempts.max(1);
        self.lookup_delay = delay;
        self
    }

    /// Verifies a `t=...,v1=...` signature header against the raw body.
    pub fn verify_signature(&self, header: &str, body: &[u8]) -> Result<(), ServiceError> {
        verify_signature(&self.webhook_secret, self.tolerance_secs, header, body)
    }

    /// Dispatches a verified event by type.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle_event(&self, event: StripeEvent) -> Result<WebhookOutcome, ServiceError> {
        match EventKind::from_type(&event.event_type) {
            EventKind::PaymentSucceeded => self.handle_payment_succeeded(event.data.object).await,
            EventKind::PaymentFailed => {
                warn!(intent_id = %event.data.object.id, "payment failed event received");
                if let Some(sender) = &self.event_sender {
                    sender
                        .send_or_log(Event::PaymentFailed {
                            stripe_pid: event.data.object.id.clone(),
                        })
                        .await;
                }
                Ok(WebhookOutcome::Acknowledged {
                    event_type: event.event_type,
                })
            }
            EventKind::Other => {
                info!("unhandled event type acknowledged");
                Ok(WebhookOutcome::Acknowledged {
                    event_type: event.event_type,
                })
            }
        }
    }

    async fn handle_payment_succeeded(
        &self,
        intent: PaymentIntentObject,
    ) -> Result<WebhookOutcome, ServiceError> {
        let bag_json = intent
            .metadata
            .bag
            .clone()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                ServiceError::BadRequest("Payment intent carries no bag metadata".to_string())
            })?;
        let bag = Bag::from_json(&bag_json).map_err(|e| {
            ServiceError::BadRequest(format!("Unreadable bag metadata: {}", e))
        })?;
        if bag.is_empty() {
            return Err(ServiceError::BadRequest(
                "Payment intent bag metadata is empty".to_string(),
            ));
        }

        let details = details_from_intent(&intent)?;
        let grand_total = pricing::from_minor_units(intent.amount);
        let stripe_pid = intent.id.clone();

        let username = intent
            .metadata
            .username
            .as_deref()
            .filter(|u| !u.is_empty() && *u != crate::services::checkout::ANONYMOUS_USER);

        // Bounded poll: the synchronous checkout request may still be in
        // flight, so give it a few seconds to win the race before falling
        // back to creating the order ourselves.
        for attempt in 1..=self.lookup_attempts {
            if let Some(order) = self
                .orders
                .find_matching_order(&details, &bag_json, grand_total, &stripe_pid)
                .await?
            {
                info!(
                    order_number = %order.order_number,
                    attempt,
                    "order already exists for payment intent"
                );
                // A username the checkout didn't know about can still be
                // attached after the fact.
                if order.user_profile_id.is_none() {
                    if let Some(username) = username {
                        let profile = self.profiles.get_or_create(username).await?;
                        self.orders.attach_profile(order.id, profile.id).await?;
                    }
                }
                if let Err(e) = self.confirmations.send_confirmation(&order).await {
                    error!(error = %e, order_number = %order.order_number, "confirmation send failed");
                }
                return Ok(WebhookOutcome::OrderExists {
                    order_number: order.order_number,
                });
            }
            if attempt < self.lookup_attempts {
                tokio::time::sleep(self.lookup_delay).await;
            }
        }

        let profile = match username {
            Some(username) => Some(self.profiles.get_or_create(username).await?),
            None => None,
        };

        // Creation is transactional; a midway failure leaves no partial
        // order behind. A non-200 makes the processor redeliver.
        let order = self
            .orders
            .create_order(
                &details,
                &bag,
                &bag_json,
                &stripe_pid,
                profile.as_ref().map(|p| p.id),
            )
            .await
            .map_err(|e| {
                error!(error = %e, stripe_pid = %stripe_pid, "webhook fallback order creation failed");
                ServiceError::InternalError(format!("Webhook order creation failed: {}", e))
            })?;

        let save_info = intent.metadata.save_info.as_deref() == Some("true");
        if save_info {
            if let Some(username) = username {
                if let Err(e) = self
                    .profiles
                    .save_defaults_from_order(username, &details)
                    .await
                {
                    warn!(error = %e, username, "failed to save delivery defaults from webhook");
                }
            }
        }

        info!(order_number = %order.order_number, "order created by webhook");
        if let Err(e) = self.confirmations.send_confirmation(&order).await {
            error!(error = %e, order_number = %order.order_number, "confirmation send failed");
        }
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::WebhookOrderCreated {
                    order_id: order.id,
                    stripe_pid: stripe_pid.clone(),
                })
                .await;
        }

        Ok(WebhookOutcome::OrderCreated {
            order_number: order.order_number,
        })
    }
}

/// Verifies a processor signature header of the form `t=...,v1=...`.
///
/// The signed payload is `"{t}.{body}"`, HMAC-SHA256 under the shared
/// webhook secret; the timestamp must be within `tolerance_secs` of now.
pub fn verify_signature(
    secret: &str,
    tolerance_secs: i64,
    header: &str,
    body: &[u8],
) -> Result<(), ServiceError> {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signature = Some(v),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ServiceError::Unauthorized("Missing signature timestamp".to_string()))?;
    let signature = signature
        .ok_or_else(|| ServiceError::Unauthorized("Missing signature".to_string()))?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| ServiceError::Unauthorized("Invalid signature timestamp".to_string()))?;
    if (Utc::now().timestamp() - ts).abs() > tolerance_secs {
        return Err(ServiceError::Unauthorized(
            "Signature timestamp outside tolerance".to_string(),
        ));
    }

    let expected = hex::decode(signature)
        .map_err(|_| ServiceError::Unauthorized("Invalid signature encoding".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("Invalid webhook secret".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    // verify_slice is a constant-time comparison.
    mac.verify_slice(&expected)
        .map_err(|_| ServiceError::Unauthorized("Signature mismatch".to_string()))
}

fn clean(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}

fn required(value: Option<String>, field: &str) -> Result<String, ServiceError> {
    value.ok_or_else(|| {
        ServiceError::BadRequest(format!("Payment intent is missing {}", field))
    })
}

/// Builds checkout delivery details from the intent's shipping and billing
/// data, normalising empty strings to `None`.
fn details_from_intent(intent: &PaymentIntentObject) -> Result<DeliveryDetails, ServiceError> {
    let shipping = intent.shipping.as_ref().ok_or_else(|| {
        ServiceError::BadRequest("Payment intent carries no shipping details".to_string())
    })?;

    let email = intent
        .charges
        .data
        .first()
        .and_then(|c| clean(&c.billing_details.email))
        .ok_or_else(|| {
            ServiceError::BadRequest("Payment intent carries no billing email".to_string())
        })?;

    Ok(DeliveryDetails {
        full_name: required(clean(&shipping.name), "shipping name")?,
        email,
        phone_number: required(clean(&shipping.phone), "shipping phone")?,
        country: required(clean(&shipping.address.country), "shipping country")?,
        postcode: clean(&shipping.address.postal_code),
        town_or_city: required(clean(&shipping.address.city), "shipping city")?,
        street_address1: required(clean(&shipping.address.line1), "shipping address")?,
        street_address2: clean(&shipping.address.line2),
        county: clean(&shipping.address.state),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(body);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn event_kind_dispatch() {
        assert_eq!(
            EventKind::from_type("payment_intent.succeeded"),
            EventKind::PaymentSucceeded
        );
        assert_eq!(
            EventKind::from_type("payment_intent.payment_failed"),
            EventKind::PaymentFailed
        );
        assert_eq!(EventKind::from_type("charge.refunded"), EventKind::Other);
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_test", Utc::now().timestamp(), body);
        assert!(verify_signature("whsec_test", 300, &header, body).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign("whsec_test", Utc::now().timestamp(), br#"{"id":"evt_1"}"#);
        assert!(verify_signature("whsec_test", 300, &header, br#"{"id":"evt_2"}"#).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_other", Utc::now().timestamp(), body);
        assert!(verify_signature("whsec_test", 300, &header, body).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_test", Utc::now().timestamp() - 3600, body);
        assert!(verify_signature("whsec_test", 300, &header, body).is_err());
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(verify_signature("whsec_test", 300, "nonsense", b"{}").is_err());
        assert!(verify_signature("whsec_test", 300, "t=abc,v1=00", b"{}").is_err());
    }

    #[test]
    fn empty_shipping_strings_become_none() {
        let intent: PaymentIntentObject = serde_json::from_value(serde_json::json!({
            "id": "pi_123",
            "amount": 2200,
            "metadata": {"bag": "{\"12\":2}", "save_info": "false", "username": "anonymous"},
            "shipping": {
                "name": "Ada Lovelace",
                "phone": "+15550100",
                "address": {
                    "line1": "1 Main St",
                    "line2": "",
                    "city": "Cambridge",
                    "state": "",
                    "postal_code": "02139",
                    "country": "US"
                }
            },
            "charges": {"data": [{"billing_details": {"email": "ada@example.com"}}]}
        }))
        .unwrap();

        let details = details_from_intent(&intent).unwrap();
        assert_eq!(details.street_address2, None);
        assert_eq!(details.county, None);
        assert_eq!(details.postcode.as_deref(), Some("02139"));
        assert_eq!(details.email, "ada@example.com");
    }

    #[test]
    fn missing_shipping_is_a_bad_request() {
        let intent: PaymentIntentObject = serde_json::from_value(serde_json::json!({
            "id": "pi_123",
            "amount": 2200,
            "charges": {"data": [{"billing_details": {"email": "ada@example.com"}}]}
        }))
        .unwrap();

        assert!(matches!(
            details_from_intent(&intent),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn event_envelope_parses() {
        let event: StripeEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_123", "amount": 2200}}
        }))
        .unwrap();

        assert_eq!(event.data.object.id, "pi_123");
        assert_eq!(
            EventKind::from_type(&event.event_type),
            EventKind::PaymentSucceeded
        );
    }
}
