use std::sync::Arc;

use bigdecimal::BigDecimal;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    to_minor_units, Customer, ListResult, NewOrder, OrderItemInput, OrderView, PaymentCallback,
    PaymentIntent, PaymentIntentRequest, PaymentOutcome,
};
use crate::domain::ports::{EmailMessage, OrderRepository, PaymentGateway};
use crate::domain::status::{FulfillmentStatus, InvalidStatus, PaymentStatus};

use super::notifications::{payment_confirmed_email, status_changed_email, Notifier};

/// Client request for a provider payment intent, before unit conversion.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub receipt: String,
    pub order_id: i64,
}

/// Who is asking to see an order.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub user_id: i64,
    pub is_admin: bool,
}

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentGateway>,
    notifier: Notifier,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Notifier,
    ) -> Self {
        Self {
            repo,
            payments,
            notifier,
        }
    }

    /// Runs a repository call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&dyn OrderRepository) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || f(repo.as_ref()))
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?
    }

    pub async fn create_order(
        &self,
        user_id: i64,
        items: Vec<OrderItemInput>,
        total: BigDecimal,
    ) -> Result<i64, DomainError> {
        let order = NewOrder::new(user_id, items, total)?;
        let to_insert = order.clone();
        let order_id = self.blocking(move |repo| repo.create(&to_insert)).await?;

        log::info!(
            "Created order {} for user {} ({} items, total {})",
            order_id,
            user_id,
            order.items.len(),
            order.total
        );
        self.notifier.order_created(order_id, &order);
        Ok(order_id)
    }

    /// Creates a provider payment intent for one of the caller's orders and
    /// records its id. Nothing is written unless the provider call succeeds.
    ///
    /// The amount must equal the stored order total, and an order gets at
    /// most one intent.
    pub async fn create_payment_intent(
        &self,
        user_id: i64,
        request: IntentRequest,
    ) -> Result<PaymentIntent, DomainError> {
        if request.amount <= BigDecimal::from(0) {
            return Err(DomainError::InvalidInput("amount must be positive".to_string()));
        }
        let amount = to_minor_units(&request.amount)?;

        let order_id = request.order_id;
        let order = self
            .blocking(move |repo| repo.find_by_id(order_id))
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(DomainError::NotFound)?;
        if order.state.payment != PaymentStatus::Pending {
            return Err(DomainError::Conflict(format!(
                "Order {} payment is already {}",
                order.id, order.state.payment
            )));
        }
        if order.razorpay_order_id.is_some() {
            return Err(DomainError::Conflict(
                "Payment already initiated for this order".to_string(),
            ));
        }
        if request.amount != order.total {
            return Err(DomainError::InvalidInput(
                "Amount does not match order total".to_string(),
            ));
        }

        let intent = self
            .payments
            .create_intent(&PaymentIntentRequest {
                amount,
                currency: request.currency,
                receipt: request.receipt,
                order_id,
            })
            .await?;

        let intent_id = intent.id.clone();
        self.blocking(move |repo| repo.attach_payment_intent(order_id, &intent_id))
            .await?;
        log::info!("Attached payment intent {} to order {}", intent.id, order_id);
        Ok(intent)
    }

    /// Verifies a provider callback and marks the matching order paid.
    pub async fn verify_payment(
        &self,
        callback: PaymentCallback,
    ) -> Result<PaymentOutcome, DomainError> {
        if !self.payments.verify_signature(
            &callback.provider_order_id,
            &callback.provider_payment_id,
            &callback.signature,
        ) {
            log::warn!(
                "Rejected payment callback with invalid signature for provider order {}",
                callback.provider_order_id
            );
            return Err(DomainError::InvalidSignature);
        }

        let PaymentCallback {
            provider_order_id,
            provider_payment_id,
            ..
        } = callback;
        let outcome = self
            .blocking(move |repo| repo.mark_paid(&provider_order_id, &provider_payment_id))
            .await?;

        match &outcome {
            PaymentOutcome::Paid(order) => {
                log::info!("Order {} marked paid", order.id);
                self.notify_customer(order.clone(), payment_confirmed_email);
            }
            PaymentOutcome::AlreadyPaid(order) => {
                log::info!("Ignoring replayed payment callback for order {}", order.id);
            }
        }
        Ok(outcome)
    }

    pub async fn update_status(&self, order_id: i64, status: &str) -> Result<OrderView, DomainError> {
        let status: FulfillmentStatus = status
            .parse()
            .map_err(|e: InvalidStatus| DomainError::InvalidInput(e.to_string()))?;
        let order = self
            .blocking(move |repo| repo.update_fulfillment(order_id, status))
            .await?;

        log::info!("Order {} fulfillment set to {}", order.id, status);
        self.notify_customer(order.clone(), status_changed_email);
        Ok(order)
    }

    pub async fn my_orders(&self, user_id: i64) -> Result<Vec<OrderView>, DomainError> {
        self.blocking(move |repo| repo.find_by_user(user_id)).await
    }

    pub async fn list_orders(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        self.blocking(move |repo| repo.list(page, limit)).await
    }

    pub async fn get_order(&self, order_id: i64, viewer: Viewer) -> Result<OrderView, DomainError> {
        self.blocking(move |repo| repo.find_by_id(order_id))
            .await?
            .filter(|o| viewer.is_admin || o.user_id == viewer.user_id)
            .ok_or(DomainError::NotFound)
    }

    fn notify_customer(&self, order: OrderView, render: fn(&Customer, &OrderView) -> EmailMessage) {
        let repo = Arc::clone(&self.repo);
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let user_id = order.user_id;
            let customer = tokio::task::spawn_blocking(move || repo.find_customer(user_id)).await;
            match customer {
                Ok(Ok(Some(customer))) => notifier.send(render(&customer, &order)).await,
                Ok(Ok(None)) => {
                    log::warn!("No customer record for user {user_id}; skipping email")
                }
                Ok(Err(e)) => log::error!("Failed to load customer {user_id}: {e}"),
                Err(e) => log::error!("Customer lookup task failed: {e}"),
            }
        });
    }
}
