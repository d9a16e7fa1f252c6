//! Best-effort order emails.
//!
//! Every send happens on a detached task; failures are logged and never
//! reach the request that triggered them.

use std::fmt::Write as _;
use std::sync::Arc;

use bigdecimal::BigDecimal;

use crate::domain::order::{Customer, NewOrder, OrderView};
use crate::domain::ports::{EmailMessage, Mailer};

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    operator_email: Option<String>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, operator_email: Option<String>) -> Self {
        Self {
            mailer,
            operator_email,
        }
    }

    pub async fn send(&self, message: EmailMessage) {
        let to = message.to.clone();
        let subject = message.subject.clone();
        match self.mailer.send(message).await {
            Ok(()) => log::info!("Sent '{}' email to {}", subject, to),
            Err(e) => log::error!("Failed to send '{}' email to {}: {}", subject, to, e),
        }
    }

    pub fn dispatch(&self, message: EmailMessage) {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.send(message).await });
    }

    pub fn order_created(&self, order_id: i64, order: &NewOrder) {
        match &self.operator_email {
            Some(to) => self.dispatch(order_created_email(to, order_id, order)),
            None => log::debug!("ADMIN_EMAIL not set; skipping notification for order {order_id}"),
        }
    }
}

struct Line {
    label: String,
    quantity: i32,
    price: BigDecimal,
}

fn render_lines(lines: &[Line]) -> (String, String) {
    let mut text = String::new();
    let mut html = String::from("<ul>");
    for line in lines {
        let _ = writeln!(text, "- {} x {} @ {}", line.label, line.quantity, line.price);
        let _ = write!(
            html,
            "<li>{} &times; {} @ {}</li>",
            escape_html(&line.label),
            line.quantity,
            line.price
        );
    }
    html.push_str("</ul>");
    (text, html)
}

fn view_lines(order: &OrderView) -> Vec<Line> {
    order
        .items
        .iter()
        .map(|item| Line {
            label: item
                .product_name
                .clone()
                .unwrap_or_else(|| format!("Product #{}", item.product_id)),
            quantity: item.quantity,
            price: item.price.clone(),
        })
        .collect()
}

pub fn order_created_email(to: &str, order_id: i64, order: &NewOrder) -> EmailMessage {
    let lines: Vec<Line> = order
        .items
        .iter()
        .map(|item| Line {
            label: format!("Product #{}", item.product_id),
            quantity: item.quantity,
            price: item.price.clone(),
        })
        .collect();
    let (text_lines, html_lines) = render_lines(&lines);
    EmailMessage {
        to: to.to_string(),
        subject: format!("New order #{order_id}"),
        text: format!(
            "Order #{order_id} was placed by user {}.\n\n{text_lines}\nTotal: {}\n",
            order.user_id, order.total
        ),
        html: format!(
            "<h2>New order #{order_id}</h2><p>Placed by user {}.</p>{html_lines}<p><strong>Total: {}</strong></p>",
            order.user_id, order.total
        ),
    }
}

pub fn payment_confirmed_email(customer: &Customer, order: &OrderView) -> EmailMessage {
    let (text_lines, html_lines) = render_lines(&view_lines(order));
    EmailMessage {
        to: customer.email.clone(),
        subject: format!("Payment received for order #{}", order.id),
        text: format!(
            "Hi {},\n\nWe received your payment for order #{}.\n\n{text_lines}\nTotal paid: {}\n",
            customer.name, order.id, order.total
        ),
        html: format!(
            "<p>Hi {},</p><p>We received your payment for order #{}.</p>{html_lines}<p><strong>Total paid: {}</strong></p>",
            escape_html(&customer.name),
            order.id,
            order.total
        ),
    }
}

pub fn status_changed_email(customer: &Customer, order: &OrderView) -> EmailMessage {
    let status = order.state.fulfillment;
    let (text_lines, html_lines) = render_lines(&view_lines(order));
    EmailMessage {
        to: customer.email.clone(),
        subject: format!("Order #{} is now {}", order.id, status),
        text: format!(
            "Hi {},\n\nYour order #{} is now {}.\n\n{text_lines}",
            customer.name, order.id, status
        ),
        html: format!(
            "<p>Hi {},</p><p>Your order #{} is now <strong>{}</strong>.</p>{html_lines}",
            escape_html(&customer.name),
            order.id,
            status
        ),
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
