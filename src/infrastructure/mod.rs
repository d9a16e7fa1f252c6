pub mod mailer;
pub mod models;
pub mod order_repo;
pub mod razorpay;
