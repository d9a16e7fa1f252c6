use std::collections::HashMap;

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    page_offset, Customer, ListResult, NewOrder, OrderItemView, OrderSummary, OrderView,
    PaymentDecision, PaymentOutcome,
};
use crate::domain::ports::OrderRepository;
use crate::domain::status::{FulfillmentStatus, InvalidStatus, OrderState, PaymentStatus};
use crate::schema::{order_items, orders, products, users};

use super::models::{NewOrderItemRow, NewOrderRow, OrderItemRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Row mapping ──────────────────────────────────────────────────────────────

fn parse_state(row: &OrderRow) -> Result<OrderState, DomainError> {
    let corrupt = |e: InvalidStatus| {
        DomainError::Internal(format!("order {} has unknown status '{}'", row.id, e.0))
    };
    let fulfillment: FulfillmentStatus = row.fulfillment_status.parse().map_err(corrupt)?;
    let payment: PaymentStatus = row.payment_status.parse().map_err(corrupt)?;
    Ok(OrderState::new(fulfillment, payment))
}

fn to_view(row: OrderRow, items: Vec<OrderItemView>) -> Result<OrderView, DomainError> {
    let state = parse_state(&row)?;
    Ok(OrderView {
        id: row.id,
        user_id: row.user_id,
        total: row.total,
        state,
        razorpay_order_id: row.razorpay_order_id,
        razorpay_payment_id: row.razorpay_payment_id,
        created_at: row.created_at,
        items,
    })
}

/// Loads the items of every order in `order_ids`, grouped by order.
fn load_items(
    conn: &mut PgConnection,
    order_ids: Vec<i64>,
) -> Result<HashMap<i64, Vec<OrderItemView>>, DomainError> {
    let rows: Vec<(OrderItemRow, Option<String>)> = order_items::table
        .left_join(products::table)
        .filter(order_items::order_id.eq_any(order_ids))
        .select((OrderItemRow::as_select(), products::name.nullable()))
        .order(order_items::id.asc())
        .load(conn)?;

    let mut grouped: HashMap<i64, Vec<OrderItemView>> = HashMap::new();
    for (item, product_name) in rows {
        grouped.entry(item.order_id).or_default().push(OrderItemView {
            id: item.id,
            product_id: item.product_id,
            product_name,
            quantity: item.quantity,
            price: item.price,
        });
    }
    Ok(grouped)
}

fn with_items(conn: &mut PgConnection, row: OrderRow) -> Result<OrderView, DomainError> {
    let items = load_items(conn, vec![row.id])?
        .remove(&row.id)
        .unwrap_or_default();
    to_view(row, items)
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderRepository for DieselOrderRepository {
    fn create(&self, order: &NewOrder) -> Result<i64, DomainError> {
        let mut conn = self.pool.get()?;
        let initial = OrderState::initial();

        conn.transaction::<_, DomainError, _>(|conn| {
            let order_id: i64 = diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    user_id: order.user_id,
                    total: order.total.clone(),
                    fulfillment_status: initial.fulfillment.to_string(),
                    payment_status: initial.payment.to_string(),
                })
                .returning(orders::id)
                .get_result(conn)?;

            let new_items: Vec<NewOrderItemRow> = order
                .items
                .iter()
                .map(|i| NewOrderItemRow {
                    order_id,
                    product_id: i.product_id,
                    quantity: i.quantity,
                    price: i.price.clone(),
                })
                .collect();
            diesel::insert_into(order_items::table)
                .values(&new_items)
                .execute(conn)?;

            Ok(order_id)
        })
    }

    fn find_by_id(&self, id: i64) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };
        with_items(&mut conn, order).map(Some)
    }

    fn find_by_user(&self, user_id: i64) -> Result<Vec<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = orders::table
            .filter(orders::user_id.eq(user_id))
            .select(OrderRow::as_select())
            .order((orders::created_at.desc(), orders::id.desc()))
            .load(&mut conn)?;

        let mut items = load_items(&mut conn, rows.iter().map(|r| r.id).collect())?;
        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                to_view(row, lines)
            })
            .collect()
    }

    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        let offset = page_offset(page, limit)?;
        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = orders::table.count().get_result(conn)?;

            let rows: Vec<(OrderRow, Option<String>, Option<String>)> = orders::table
                .left_join(users::table)
                .select((
                    OrderRow::as_select(),
                    users::name.nullable(),
                    users::email.nullable(),
                ))
                .order((orders::created_at.desc(), orders::id.desc()))
                .limit(limit)
                .offset(offset)
                .load(conn)?;

            let items = rows
                .into_iter()
                .map(|(o, user_name, user_email)| {
                    let state = parse_state(&o)?;
                    Ok(OrderSummary {
                        id: o.id,
                        user_id: o.user_id,
                        user_name,
                        user_email,
                        total: o.total,
                        state,
                        razorpay_order_id: o.razorpay_order_id,
                        razorpay_payment_id: o.razorpay_payment_id,
                        created_at: o.created_at,
                    })
                })
                .collect::<Result<Vec<_>, DomainError>>()?;

            Ok(ListResult { items, total })
        })
    }

    fn attach_payment_intent(&self, order_id: i64, intent_id: &str) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let updated = diesel::update(
                orders::table
                    .find(order_id)
                    .filter(orders::razorpay_order_id.is_null())
                    .filter(orders::payment_status.eq(PaymentStatus::Pending.as_str())),
            )
            .set((
                orders::razorpay_order_id.eq(intent_id),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;

            if updated == 0 {
                let exists: i64 = orders::table.find(order_id).count().get_result(conn)?;
                return Err(if exists == 0 {
                    DomainError::NotFound
                } else {
                    DomainError::Conflict("Payment already initiated for this order".to_string())
                });
            }
            Ok(())
        })
    }

    fn mark_paid(
        &self,
        provider_order_id: &str,
        payment_id: &str,
    ) -> Result<PaymentOutcome, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let row = orders::table
                .filter(orders::razorpay_order_id.eq(provider_order_id))
                .select(OrderRow::as_select())
                .for_update()
                .first(conn)
                .optional()?
                .ok_or(DomainError::NotFound)?;
            let mut order = with_items(conn, row)?;

            let next = match order.settle_payment(payment_id)? {
                PaymentDecision::Replay => return Ok(PaymentOutcome::AlreadyPaid(order)),
                PaymentDecision::Apply(next) => next,
            };

            // Only a still-pending payment may be settled.
            let updated = diesel::update(
                orders::table
                    .filter(orders::id.eq(order.id))
                    .filter(orders::payment_status.eq(PaymentStatus::Pending.as_str())),
            )
            .set((
                orders::payment_status.eq(next.payment.as_str()),
                orders::razorpay_payment_id.eq(payment_id),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
            if updated != 1 {
                return Err(DomainError::Conflict(
                    "Order payment state conflict".to_string(),
                ));
            }

            order.state = next;
            order.razorpay_payment_id = Some(payment_id.to_string());
            Ok(PaymentOutcome::Paid(order))
        })
    }

    fn update_fulfillment(
        &self,
        order_id: i64,
        status: FulfillmentStatus,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let row = orders::table
                .find(order_id)
                .select(OrderRow::as_select())
                .for_update()
                .first(conn)
                .optional()?
                .ok_or(DomainError::NotFound)?;
            let mut order = with_items(conn, row)?;
            let next = order.state.with_fulfillment(status)?;

            diesel::update(orders::table.find(order_id))
                .set((
                    orders::fulfillment_status.eq(next.fulfillment.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            order.state = next;
            Ok(order)
        })
    }

    fn find_customer(&self, user_id: i64) -> Result<Option<Customer>, DomainError> {
        let mut conn = self.pool.get()?;

        let customer = users::table
            .find(user_id)
            .select((users::name, users::email))
            .first::<(String, String)>(&mut conn)
            .optional()?;
        Ok(customer.map(|(name, email)| Customer { name, email }))
    }
}
