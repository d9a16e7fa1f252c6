use async_trait::async_trait;

use super::errors::DomainError;
use super::order::{
    Customer, ListResult, NewOrder, OrderView, PaymentIntent, PaymentIntentRequest,
    PaymentOutcome,
};
use super::status::FulfillmentStatus;

/// Order persistence. Implementations are synchronous; callers run them on
/// the blocking pool.
pub trait OrderRepository: Send + Sync + 'static {
    /// Inserts the order header and every item atomically, returning the new id.
    fn create(&self, order: &NewOrder) -> Result<i64, DomainError>;
    fn find_by_id(&self, id: i64) -> Result<Option<OrderView>, DomainError>;
    fn find_by_user(&self, user_id: i64) -> Result<Vec<OrderView>, DomainError>;
    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError>;
    /// Records the provider intent id against an existing order.
    fn attach_payment_intent(&self, order_id: i64, intent_id: &str) -> Result<(), DomainError>;
    /// Locks the order owning `provider_order_id` and marks it paid, unless
    /// the same capture was already recorded.
    fn mark_paid(
        &self,
        provider_order_id: &str,
        payment_id: &str,
    ) -> Result<PaymentOutcome, DomainError>;
    fn update_fulfillment(
        &self,
        order_id: i64,
        status: FulfillmentStatus,
    ) -> Result<OrderView, DomainError>;
    fn find_customer(&self, user_id: i64) -> Result<Option<Customer>, DomainError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, DomainError>;

    /// Checks the provider's callback signature over `order_id|payment_id`.
    fn verify_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str)
        -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError>;
}
