use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::errors::ServiceError;

/// A created payment intent, as returned by the payment provider.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Metadata attached to a payment intent so the webhook reconciler can
/// rebuild the order if the synchronous checkout path never completes.
#[derive(Clone, Debug, Default)]
pub struct IntentMetadata {
    pub bag: String,
    pub save_info: bool,
    pub username: String,
}

/// Payment provider abstraction.
///
/// Amounts are in minor units (cents) because that is what card processors
/// accept on the wire.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, ServiceError>;

    async fn update_intent_metadata(
        &self,
        intent_id: &str,
        metadata: &IntentMetadata,
    ) -> Result<(), ServiceError>;
}

/// Extracts the payment intent id from a client secret of the form
/// `pi_xxx_secret_yyy`.
pub fn pid_from_client_secret(client_secret: &str) -> Option<&str> {
    let (pid, _) = client_secret.split_once("_secret")?;
    if pid.is_empty() {
        None
    } else {
        Some(pid)
    }
}

/// Stripe-backed gateway using the form-encoded REST API.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, "https://api.stripe.com/v1".to_string())
    }

    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("stripe request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "payment intent creation failed");
            return Err(ServiceError::PaymentError(format!(
                "payment provider returned {}",
                status
            )));
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("stripe response: {}", e)))
    }

    #[instrument(skip(self, metadata))]
    async fn update_intent_metadata(
        &self,
        intent_id: &str,
        metadata: &IntentMetadata,
    ) -> Result<(), ServiceError> {
        let params = [
            ("metadata[bag]", metadata.bag.clone()),
            ("metadata[save_info]", metadata.save_info.to_string()),
            ("metadata[username]", metadata.username.clone()),
        ];

        let response = self
            .client
            .post(format!("{}/payment_intents/{}", self.base_url, intent_id))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("stripe request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, intent_id, "payment intent metadata update failed");
            return Err(ServiceError::PaymentError(format!(
                "payment provider returned {}",
                status
            )));
        }

        Ok(())
    }
}

/// Gateway used when no payment provider credentials are configured.
/// Checkout fails cleanly instead of sending unauthenticated requests.
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_intent(
        &self,
        _amount_minor: i64,
        _currency: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        Err(ServiceError::PaymentError(
            "Payment gateway is not configured".to_string(),
        ))
    }

    async fn update_intent_metadata(
        &self,
        _intent_id: &str,
        _metadata: &IntentMetadata,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::PaymentError(
            "Payment gateway is not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_is_extracted_from_client_secret() {
        assert_eq!(
            pid_from_client_secret("pi_3ABC123_secret_xyz789"),
            Some("pi_3ABC123")
        );
    }

    #[test]
    fn malformed_client_secret_yields_none() {
        assert_eq!(pid_from_client_secret("pi_3ABC123"), None);
        assert_eq!(pid_from_client_secret("_secret_xyz"), None);
        assert_eq!(pid_from_client_secret(""), None);
    }
}
