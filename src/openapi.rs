use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::handlers::orders;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(crate::auth::TOKEN_COOKIE))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::list_orders,
        orders::my_orders,
        orders::create_payment_intent,
        orders::verify_payment,
        orders::get_order,
        orders::update_status,
    ),
    components(schemas(
        orders::CreateOrderItemRequest,
        orders::CreateOrderRequest,
        orders::CreateOrderResponse,
        orders::CreatePaymentIntentRequest,
        orders::VerifyPaymentRequest,
        orders::VerifyPaymentResponse,
        orders::UpdateStatusRequest,
        orders::MessageResponse,
        orders::OrderItemResponse,
        orders::OrderResponse,
        orders::OrderSummaryResponse,
        orders::ListOrdersResponse,
        ErrorResponse,
    )),
    modifiers(&SecurityAddon),
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    tags(
        (name = "orders", description = "Order placement and fulfillment"),
        (name = "payments", description = "Razorpay checkout"),
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/orders",
            "/api/orders/my-orders",
            "/api/orders/create-order",
            "/api/orders/verify-payment",
            "/api/orders/{id}",
            "/api/orders/{id}/status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
