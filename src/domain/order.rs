use std::str::FromStr;

use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use chrono::{DateTime, Utc};

use super::errors::DomainError;
use super::status::{OrderState, PaymentStatus, Transition};

/// Converts a client-supplied amount into a two-decimal money value.
///
/// Inputs are expected to carry at most two decimals (catalog prices). Finer
/// values are rounded through their `f64` representation, so a half-cent
/// such as `1.005` may land on either side. Rejects non-finite and
/// non-positive values after rounding.
pub fn money(value: f64, field: &str) -> Result<BigDecimal, DomainError> {
    if !value.is_finite() {
        return Err(DomainError::InvalidInput(format!("{field} must be a number")));
    }
    let amount = BigDecimal::from_str(&format!("{value:.2}"))
        .map_err(|e| DomainError::InvalidInput(format!("{field} is not a valid amount: {e}")))?;
    if amount <= BigDecimal::zero() {
        return Err(DomainError::InvalidInput(format!("{field} must be positive")));
    }
    Ok(amount)
}

/// Row offset for a 1-based `page`. Pages too large to address are invalid
/// input rather than an arithmetic overflow.
pub fn page_offset(page: i64, limit: i64) -> Result<i64, DomainError> {
    page.checked_sub(1)
        .and_then(|p| p.checked_mul(limit))
        .filter(|offset| *offset >= 0)
        .ok_or_else(|| DomainError::InvalidInput("page is out of range".to_string()))
}

/// Converts a major-unit amount into the provider's minor units (x100).
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, DomainError> {
    (amount.clone() * BigDecimal::from(100))
        .round(0)
        .to_i64()
        .ok_or_else(|| DomainError::InvalidInput("amount is out of range".to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemInput {
    pub product_id: i64,
    pub quantity: i32,
    pub price: BigDecimal,
}

impl OrderItemInput {
    pub fn line_total(&self) -> BigDecimal {
        self.price.clone() * BigDecimal::from(self.quantity)
    }
}

/// A validated order ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: i64,
    pub total: BigDecimal,
    pub items: Vec<OrderItemInput>,
}

impl NewOrder {
    /// Validates the cart and checks the declared total against the sum of
    /// the snapshot prices.
    pub fn new(
        user_id: i64,
        items: Vec<OrderItemInput>,
        total: BigDecimal,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::InvalidInput(
                "Order must contain at least one item".to_string(),
            ));
        }
        if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
            return Err(DomainError::InvalidInput(format!(
                "Quantity for product {} must be positive",
                item.product_id
            )));
        }
        if let Some(item) = items.iter().find(|i| i.price <= BigDecimal::zero()) {
            return Err(DomainError::InvalidInput(format!(
                "Price for product {} must be positive",
                item.product_id
            )));
        }
        let computed = items
            .iter()
            .fold(BigDecimal::zero(), |acc, item| acc + item.line_total());
        if computed != total {
            return Err(DomainError::InvalidInput(
                "Order total does not match items".to_string(),
            ));
        }
        Ok(Self {
            user_id,
            total,
            items,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemView {
    pub id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub id: i64,
    pub user_id: i64,
    pub total: BigDecimal,
    pub state: OrderState,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

/// What a verified payment callback should do to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    Apply(OrderState),
    Replay,
}

impl OrderView {
    /// Decides how a verified capture with `payment_id` applies to this order.
    /// A replay of the capture already recorded is a no-op; any other
    /// capture on a settled order is a conflict.
    pub fn settle_payment(&self, payment_id: &str) -> Result<PaymentDecision, DomainError> {
        match self.state.transition_payment(PaymentStatus::Paid)? {
            Transition::Changed(next) => Ok(PaymentDecision::Apply(next)),
            Transition::Unchanged if self.razorpay_payment_id.as_deref() == Some(payment_id) => {
                Ok(PaymentDecision::Replay)
            }
            Transition::Unchanged => Err(DomainError::Conflict(
                "Order payment state conflict".to_string(),
            )),
        }
    }
}

/// Order row as seen by the admin listing.
#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub id: i64,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub total: BigDecimal,
    pub state: OrderState,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<OrderSummary>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

#[derive(Debug)]
pub enum PaymentOutcome {
    Paid(OrderView),
    AlreadyPaid(OrderView),
}

impl PaymentOutcome {
    pub fn order(&self) -> &OrderView {
        match self {
            PaymentOutcome::Paid(order) | PaymentOutcome::AlreadyPaid(order) => order,
        }
    }
}

/// Request for a provider-side payment intent. `amount` is already in minor
/// units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub order_id: i64,
}

/// Provider payment intent; `body` is the provider's object, passed back to
/// the client untouched.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub body: serde_json::Value,
}

/// The three values the provider's checkout hands back to the client.
#[derive(Debug, Clone)]
pub struct PaymentCallback {
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::FulfillmentStatus;

    fn item(product_id: i64, quantity: i32, price: &str) -> OrderItemInput {
        OrderItemInput {
            product_id,
            quantity,
            price: BigDecimal::from_str(price).expect("valid decimal"),
        }
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(money(9.99, "price").unwrap(), dec("9.99"));
        assert_eq!(money(19.98, "total").unwrap(), dec("19.98"));
        assert_eq!(money(0.1 + 0.2, "total").unwrap(), dec("0.30"));
    }

    #[test]
    fn money_keeps_two_decimals() {
        assert_eq!(money(12.5, "price").unwrap().to_string(), "12.50");
        assert_eq!(money(9.994, "price").unwrap(), dec("9.99"));
        assert_eq!(money(9.996, "price").unwrap(), dec("10.00"));
    }

    #[test]
    fn money_rejects_non_positive_and_nan() {
        assert!(money(0.0, "price").is_err());
        assert!(money(-5.0, "price").is_err());
        assert!(money(0.001, "price").is_err());
        assert!(money(f64::NAN, "price").is_err());
        assert!(money(f64::INFINITY, "price").is_err());
    }

    #[test]
    fn page_offset_rejects_unaddressable_pages() {
        assert_eq!(page_offset(1, 20).unwrap(), 0);
        assert_eq!(page_offset(3, 20).unwrap(), 40);
        assert!(matches!(
            page_offset(i64::MAX, 100),
            Err(DomainError::InvalidInput(ref m)) if m == "page is out of range"
        ));
    }

    #[test]
    fn minor_units_multiply_by_one_hundred() {
        assert_eq!(to_minor_units(&dec("19.98")).unwrap(), 1998);
        assert_eq!(to_minor_units(&dec("500")).unwrap(), 50000);
        assert_eq!(to_minor_units(&dec("0.01")).unwrap(), 1);
    }

    #[test]
    fn new_order_accepts_matching_total() {
        let order = NewOrder::new(7, vec![item(1, 2, "9.99")], dec("19.98")).expect("valid order");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.user_id, 7);
    }

    #[test]
    fn new_order_sums_several_lines() {
        let items = vec![item(1, 2, "9.99"), item(2, 1, "0.02"), item(3, 3, "10.00")];
        assert!(NewOrder::new(1, items, dec("50.00")).is_ok());
    }

    #[test]
    fn new_order_rejects_empty_cart() {
        assert!(matches!(
            NewOrder::new(1, vec![], dec("1.00")),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn new_order_rejects_total_mismatch() {
        let err = NewOrder::new(1, vec![item(1, 2, "9.99")], dec("9.99")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: Order total does not match items"
        );
    }

    #[test]
    fn new_order_rejects_non_positive_quantity() {
        assert!(NewOrder::new(1, vec![item(1, 0, "9.99")], dec("0.01")).is_err());
    }

    fn view(state: OrderState, payment_id: Option<&str>) -> OrderView {
        OrderView {
            id: 1,
            user_id: 1,
            total: dec("1.00"),
            state,
            razorpay_order_id: Some("order_X".to_string()),
            razorpay_payment_id: payment_id.map(str::to_string),
            created_at: Utc::now(),
            items: vec![],
        }
    }

    #[test]
    fn settle_pending_order_applies_paid() {
        let order = view(OrderState::initial(), None);
        assert_eq!(
            order.settle_payment("pay_1").unwrap(),
            PaymentDecision::Apply(OrderState::new(
                FulfillmentStatus::Pending,
                PaymentStatus::Paid
            ))
        );
    }

    #[test]
    fn settle_replay_is_no_op() {
        let paid = OrderState::new(FulfillmentStatus::Shipped, PaymentStatus::Paid);
        let order = view(paid, Some("pay_1"));
        assert_eq!(order.settle_payment("pay_1").unwrap(), PaymentDecision::Replay);
    }

    #[test]
    fn settle_with_different_payment_conflicts() {
        let paid = OrderState::new(FulfillmentStatus::Pending, PaymentStatus::Paid);
        let order = view(paid, Some("pay_1"));
        assert!(matches!(
            order.settle_payment("pay_2"),
            Err(DomainError::Conflict(_))
        ));
    }
}
