use async_trait::async_trait;
use tracing::info;

use crate::entities::OrderModel;
use crate::errors::ServiceError;

/// Sends the post-payment order confirmation to the customer.
#[async_trait]
pub trait ConfirmationSender: Send + Sync {
    async fn send_confirmation(&self, order: &OrderModel) -> Result<(), ServiceError>;
}

/// Confirmation sender that records the confirmation in the structured log.
///
/// Stands in for a real mail delivery integration; the checkout and webhook
/// paths treat confirmation delivery as best-effort either way.
pub struct LogConfirmationSender;

#[async_trait]
impl ConfirmationSender for LogConfirmationSender {
    async fn send_confirmation(&self, order: &OrderModel) -> Result<(), ServiceError> {
        info!(
            order_number = %order.order_number,
            email = %order.email,
            grand_total = %order.grand_total,
            "order confirmation sent"
        );
        Ok(())
    }
}
