//! In-memory collaborators shared by the service and handler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;

use crate::application::notifications::Notifier;
use crate::application::order_service::OrderService;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    page_offset, Customer, ListResult, NewOrder, OrderItemView, OrderSummary, OrderView,
    PaymentDecision, PaymentIntent, PaymentIntentRequest, PaymentOutcome,
};
use crate::domain::ports::{EmailMessage, Mailer, OrderRepository, PaymentGateway};
use crate::domain::status::{FulfillmentStatus, OrderState, PaymentStatus};
use crate::infrastructure::razorpay;

pub const TEST_KEY_SECRET: &str = "test_key_secret";

pub fn sign(provider_order_id: &str, payment_id: &str) -> String {
    razorpay::expected_signature(TEST_KEY_SECRET, provider_order_id, payment_id).unwrap()
}

#[derive(Default)]
struct RepoState {
    orders: Vec<OrderView>,
    customers: HashMap<i64, Customer>,
    products: HashMap<i64, String>,
    next_order_id: i64,
    next_item_id: i64,
    fail_writes: bool,
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    state: Mutex<RepoState>,
}

impl InMemoryOrderRepository {
    pub fn add_customer(&self, user_id: i64, name: &str, email: &str) {
        self.state.lock().unwrap().customers.insert(
            user_id,
            Customer {
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    pub fn add_product(&self, product_id: i64, name: &str) {
        self.state
            .lock()
            .unwrap()
            .products
            .insert(product_id, name.to_string());
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    pub fn order(&self, id: i64) -> Option<OrderView> {
        self.state
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    pub fn set_intent(&self, id: i64, intent_id: &str) {
        self.attach_payment_intent(id, intent_id)
            .expect("order exists");
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn create(&self, order: &NewOrder) -> Result<i64, DomainError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(DomainError::Internal("connection refused".to_string()));
        }
        state.next_order_id += 1;
        let id = state.next_order_id;
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            state.next_item_id += 1;
            items.push(OrderItemView {
                id: state.next_item_id,
                product_id: item.product_id,
                product_name: state.products.get(&item.product_id).cloned(),
                quantity: item.quantity,
                price: item.price.clone(),
            });
        }
        state.orders.push(OrderView {
            id,
            user_id: order.user_id,
            total: order.total.clone(),
            state: OrderState::initial(),
            razorpay_order_id: None,
            razorpay_payment_id: None,
            created_at: Utc::now(),
            items,
        });
        Ok(id)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<OrderView>, DomainError> {
        Ok(self.order(id))
    }

    fn find_by_user(&self, user_id: i64) -> Result<Vec<OrderView>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let state = self.state.lock().unwrap();
        let offset = usize::try_from(page_offset(page, limit)?).unwrap_or_default();
        let items = state
            .orders
            .iter()
            .rev()
            .skip(offset)
            .take(usize::try_from(limit).unwrap_or_default())
            .map(|o| {
                let customer = state.customers.get(&o.user_id);
                OrderSummary {
                    id: o.id,
                    user_id: o.user_id,
                    user_name: customer.map(|c| c.name.clone()),
                    user_email: customer.map(|c| c.email.clone()),
                    total: o.total.clone(),
                    state: o.state,
                    razorpay_order_id: o.razorpay_order_id.clone(),
                    razorpay_payment_id: o.razorpay_payment_id.clone(),
                    created_at: o.created_at,
                }
            })
            .collect();
        Ok(ListResult {
            items,
            total: state.orders.len() as i64,
        })
    }

    fn attach_payment_intent(&self, order_id: i64, intent_id: &str) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(DomainError::NotFound)?;
        if order.razorpay_order_id.is_some() || order.state.payment != PaymentStatus::Pending {
            return Err(DomainError::Conflict(
                "Payment already initiated for this order".to_string(),
            ));
        }
        order.razorpay_order_id = Some(intent_id.to_string());
        Ok(())
    }

    fn mark_paid(
        &self,
        provider_order_id: &str,
        payment_id: &str,
    ) -> Result<PaymentOutcome, DomainError> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.razorpay_order_id.as_deref() == Some(provider_order_id))
            .ok_or(DomainError::NotFound)?;
        match order.settle_payment(payment_id)? {
            PaymentDecision::Replay => Ok(PaymentOutcome::AlreadyPaid(order.clone())),
            PaymentDecision::Apply(next) => {
                order.state = next;
                order.razorpay_payment_id = Some(payment_id.to_string());
                Ok(PaymentOutcome::Paid(order.clone()))
            }
        }
    }

    fn update_fulfillment(
        &self,
        order_id: i64,
        status: FulfillmentStatus,
    ) -> Result<OrderView, DomainError> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(DomainError::NotFound)?;
        order.state = order.state.with_fulfillment(status)?;
        Ok(order.clone())
    }

    fn find_customer(&self, user_id: i64) -> Result<Option<Customer>, DomainError> {
        Ok(self.state.lock().unwrap().customers.get(&user_id).cloned())
    }
}

/// Gateway double: records intent requests and verifies signatures with
/// [`TEST_KEY_SECRET`].
#[derive(Default)]
pub struct StubGateway {
    requests: Mutex<Vec<PaymentIntentRequest>>,
    fail: Mutex<bool>,
}

impl StubGateway {
    pub fn requests(&self) -> Vec<PaymentIntentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fail_requests(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, DomainError> {
        if *self.fail.lock().unwrap() {
            return Err(DomainError::Payment("provider unavailable".to_string()));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("order_test{}", requests.len());
        Ok(PaymentIntent {
            id: id.clone(),
            body: json!({
                "id": id,
                "entity": "order",
                "amount": request.amount,
                "currency": request.currency,
                "receipt": request.receipt,
                "status": "created",
            }),
        })
    }

    fn verify_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
        razorpay::verify_signature(TEST_KEY_SECRET, provider_order_id, payment_id, signature)
    }
}

pub struct ChannelMailer {
    tx: mpsc::UnboundedSender<EmailMessage>,
    fail: Mutex<bool>,
}

impl ChannelMailer {
    pub fn fail_sends(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl Mailer for ChannelMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError> {
        if *self.fail.lock().unwrap() {
            return Err(DomainError::Internal("smtp unavailable".to_string()));
        }
        let _ = self.tx.send(message);
        Ok(())
    }
}

pub struct Fixture {
    pub repo: Arc<InMemoryOrderRepository>,
    pub gateway: Arc<StubGateway>,
    pub mailer: Arc<ChannelMailer>,
    pub service: Arc<OrderService>,
    emails: mpsc::UnboundedReceiver<EmailMessage>,
}

impl Fixture {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryOrderRepository::default());
        repo.add_customer(1, "Customer One", "customer1@example.com");
        repo.add_customer(2, "Customer Two", "customer2@example.com");
        repo.add_product(1, "Green Tea");
        let gateway = Arc::new(StubGateway::default());
        let (tx, emails) = mpsc::unbounded_channel();
        let mailer = Arc::new(ChannelMailer {
            tx,
            fail: Mutex::new(false),
        });
        let service = Arc::new(OrderService::new(
            repo.clone(),
            gateway.clone(),
            Notifier::new(mailer.clone(), Some("ops@example.com".to_string())),
        ));
        Self {
            repo,
            gateway,
            mailer,
            service,
            emails,
        }
    }

    /// Inserts a one-item order (2 x 9.99) for `user_id`.
    pub fn seed_order(&self, user_id: i64) -> i64 {
        let order = NewOrder::new(
            user_id,
            vec![crate::domain::order::OrderItemInput {
                product_id: 1,
                quantity: 2,
                price: "9.99".parse::<BigDecimal>().unwrap(),
            }],
            "19.98".parse::<BigDecimal>().unwrap(),
        )
        .unwrap();
        self.repo.create(&order).unwrap()
    }

    /// Next email sent by a background notification, if one arrives soon.
    pub async fn next_email(&mut self) -> Option<EmailMessage> {
        tokio::time::timeout(Duration::from_millis(500), self.emails.recv())
            .await
            .ok()
            .flatten()
    }
}
