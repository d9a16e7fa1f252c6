//! Order status vocabularies and the table that combines them.
//!
//! Fulfillment and payment progress are tracked in separate columns. An
//! [`OrderState`] pairs them, and every transition is checked against
//! [`OrderState::is_valid`] so that neither concern can silently overwrite
//! the other.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::errors::DomainError;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid status")]
pub struct InvalidStatus(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FulfillmentStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
}

impl FulfillmentStatus {
    pub const ALL: [FulfillmentStatus; 4] = [
        FulfillmentStatus::Pending,
        FulfillmentStatus::Processing,
        FulfillmentStatus::Shipped,
        FulfillmentStatus::Delivered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::Processing => "processing",
            FulfillmentStatus::Shipped => "shipped",
            FulfillmentStatus::Delivered => "delivered",
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FulfillmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of asking an [`OrderState`] to move somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed(OrderState),
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderState {
    pub fulfillment: FulfillmentStatus,
    pub payment: PaymentStatus,
}

impl OrderState {
    pub const fn new(fulfillment: FulfillmentStatus, payment: PaymentStatus) -> Self {
        Self {
            fulfillment,
            payment,
        }
    }

    /// State of every freshly created order.
    pub const fn initial() -> Self {
        Self::new(FulfillmentStatus::Pending, PaymentStatus::Pending)
    }

    /// The cross-product table: an order whose payment failed cannot make
    /// fulfillment progress. Every other combination is allowed.
    pub fn is_valid(self) -> bool {
        !matches!(
            (self.payment, self.fulfillment),
            (
                PaymentStatus::Failed,
                FulfillmentStatus::Processing | FulfillmentStatus::Shipped | FulfillmentStatus::Delivered
            )
        )
    }

    /// Admin-driven fulfillment moves may go in any direction; only the
    /// payment column constrains them.
    pub fn with_fulfillment(self, target: FulfillmentStatus) -> Result<OrderState, DomainError> {
        let next = OrderState {
            fulfillment: target,
            ..self
        };
        if next.is_valid() {
            Ok(next)
        } else {
            Err(DomainError::Conflict(format!(
                "Cannot mark order {} while its payment is {}",
                target, self.payment
            )))
        }
    }

    /// Payment only ever leaves `pending`. Re-applying the current status is
    /// reported as [`Transition::Unchanged`]; anything else is a conflict.
    pub fn transition_payment(self, target: PaymentStatus) -> Result<Transition, DomainError> {
        if self.payment == target {
            return Ok(Transition::Unchanged);
        }
        let next = OrderState {
            payment: target,
            ..self
        };
        if self.payment == PaymentStatus::Pending && next.is_valid() {
            Ok(Transition::Changed(next))
        } else {
            Err(DomainError::Conflict("Order payment state conflict".to_string()))
        }
    }
}

impl Default for OrderState {
    fn default() -> Self {
        Self::initial()
    }
}
