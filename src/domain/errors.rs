use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Order not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment provider error: {0}")]
    Payment(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
