use actix_web::{web, HttpResponse};
use bigdecimal::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::order_service::{IntentRequest, OrderService, Viewer};
use crate::auth::{AdminUser, AuthUser};
use crate::domain::errors::DomainError;
use crate::domain::order::{money, OrderItemInput, OrderSummary, OrderView, PaymentCallback};
use crate::errors::{AppError, ErrorResponse};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItemRequest {
    pub product_id: i64,
    pub quantity: i32,
    /// Unit price at checkout time.
    pub price: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<CreateOrderItemRequest>,
    /// Must equal the sum of `price * quantity` over `items`.
    pub total: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub message: String,
    pub order_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentIntentRequest {
    /// Amount in major units; converted to paise before reaching Razorpay.
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub receipt: Option<String>,
    pub order_id_from_db: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub message: String,
    pub order_id: i64,
    pub payment_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// One of `pending`, `processing`, `shipped`, `delivered`.
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub total: f64,
    /// Fulfillment status.
    pub status: String,
    pub payment_status: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(o: OrderView) -> Self {
        Self {
            id: o.id,
            user_id: o.user_id,
            total: o.total.to_f64().unwrap_or_default(),
            status: o.state.fulfillment.to_string(),
            payment_status: o.state.payment.to_string(),
            razorpay_order_id: o.razorpay_order_id,
            razorpay_payment_id: o.razorpay_payment_id,
            created_at: o.created_at.to_rfc3339(),
            items: o
                .items
                .into_iter()
                .map(|i| OrderItemResponse {
                    id: i.id,
                    product_id: i.product_id,
                    product_name: i.product_name,
                    quantity: i.quantity,
                    price: i.price.to_f64().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryResponse {
    pub id: i64,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub total: f64,
    pub status: String,
    pub payment_status: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: String,
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(o: OrderSummary) -> Self {
        Self {
            id: o.id,
            user_id: o.user_id,
            user_name: o.user_name,
            user_email: o.user_email,
            total: o.total.to_f64().unwrap_or_default(),
            status: o.state.fulfillment.to_string(),
            payment_status: o.state.payment.to_string(),
            razorpay_order_id: o.razorpay_order_id,
            razorpay_payment_id: o.razorpay_payment_id,
            created_at: o.created_at.to_rfc3339(),
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderSummaryResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Routing ──────────────────────────────────────────────────────────────────

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid request body: {err}")).into()
    })
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/api/orders")
            .route("", web::post().to(create_order))
            .route("", web::get().to(list_orders))
            .route("/my-orders", web::get().to(my_orders))
            .route("/create-order", web::post().to(create_payment_intent))
            .route("/verify-payment", web::post().to(verify_payment))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/status", web::put().to(update_status)),
    );
}

fn missing_fields() -> AppError {
    AppError::BadRequest("Missing required fields".to_string())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /api/orders
///
/// Creates an order and its line items in one transaction. The declared
/// total must match the items.
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = CreateOrderResponse),
        (status = 400, description = "Invalid cart", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<OrderService>,
    user: AuthUser,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let items = body
        .items
        .into_iter()
        .map(|i| {
            Ok(OrderItemInput {
                product_id: i.product_id,
                quantity: i.quantity,
                price: money(i.price, "price")?,
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;
    let total = money(body.total, "total")?;

    let order_id = service.create_order(user.id, items, total).await?;

    Ok(HttpResponse::Created().json(CreateOrderResponse {
        message: "Order created successfully".to_string(),
        order_id,
    }))
}

/// POST /api/orders/create-order
///
/// Creates a Razorpay order for a local order and returns it so the client
/// can open the checkout widget.
#[utoipa::path(
    post,
    path = "/api/orders/create-order",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Razorpay order object", body = serde_json::Value),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order is no longer awaiting payment", body = ErrorResponse),
        (status = 500, description = "Payment provider or storage failure", body = ErrorResponse),
    ),
    tag = "payments"
)]
pub async fn create_payment_intent(
    service: web::Data<OrderService>,
    user: AuthUser,
    body: web::Json<CreatePaymentIntentRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let (Some(amount), Some(currency), Some(receipt), Some(order_id)) =
        (body.amount, body.currency, body.receipt, body.order_id_from_db)
    else {
        return Err(missing_fields());
    };
    if currency.trim().is_empty() || receipt.trim().is_empty() {
        return Err(missing_fields());
    }

    let intent = service
        .create_payment_intent(
            user.id,
            IntentRequest {
                amount: money(amount, "amount")?,
                currency,
                receipt,
                order_id,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(intent.body))
}

/// POST /api/orders/verify-payment
///
/// Checks the Razorpay checkout signature and marks the order paid.
#[utoipa::path(
    post,
    path = "/api/orders/verify-payment",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified", body = VerifyPaymentResponse),
        (status = 400, description = "Invalid signature or missing fields", body = ErrorResponse),
        (status = 404, description = "No order for this Razorpay order id", body = ErrorResponse),
        (status = 409, description = "Order payment already settled differently", body = ErrorResponse),
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    service: web::Data<OrderService>,
    body: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let (Some(provider_order_id), Some(provider_payment_id), Some(signature)) = (
        non_empty(body.razorpay_order_id),
        non_empty(body.razorpay_payment_id),
        non_empty(body.razorpay_signature),
    ) else {
        return Err(missing_fields());
    };

    let outcome = service
        .verify_payment(PaymentCallback {
            provider_order_id,
            provider_payment_id: provider_payment_id.clone(),
            signature,
        })
        .await?;

    Ok(HttpResponse::Ok().json(VerifyPaymentResponse {
        message: "Payment verified successfully".to_string(),
        order_id: outcome.order().id,
        payment_id: provider_payment_id,
    }))
}

/// PUT /api/orders/{id}/status
///
/// Admin-only fulfillment update. Leaves the payment status untouched.
#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(
        ("id" = i64, Path, description = "Order id"),
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = MessageResponse),
        (status = 400, description = "Invalid status", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Not allowed in the order's payment state", body = ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_status(
    service: web::Data<OrderService>,
    _admin: AdminUser,
    path: web::Path<i64>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    service.update_status(order_id, &body.status).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Order status updated successfully".to_string(),
    }))
}

/// GET /api/orders/my-orders
///
/// The caller's orders, newest first, with their items.
#[utoipa::path(
    get,
    path = "/api/orders/my-orders",
    responses(
        (status = 200, description = "Caller's orders", body = [OrderResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn my_orders(
    service: web::Data<OrderService>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let orders: Vec<OrderResponse> = service
        .my_orders(user.id)
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(orders))
}

/// GET /api/orders
///
/// Admin-only paginated list of orders (without their items).
#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<OrderService>,
    _admin: AdminUser,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let result = service.list_orders(page, limit).await?;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(Into::into).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// GET /api/orders/{id}
///
/// One order with its items. Visible to its owner and to admins.
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = i64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<OrderService>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let order = service
        .get_order(
            path.into_inner(),
            Viewer {
                user_id: user.id,
                is_admin: user.is_admin,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
