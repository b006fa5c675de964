use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookstore API",
        version = "1.0.0",
        description = r#"
# Bookstore API

Catalog browsing, customer accounts, cash-on-delivery orders and Razorpay online payments.

## Authentication

Protected endpoints take a JWT issued by `/api/auth/register` or `/api/auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

A missing token is answered with 401. An invalid or expired token, or a role that is
not allowed on the route, is answered with 403.

## Online payments

1. `POST /api/payments/create-order` opens a gateway order and stages the cart.
2. The client completes payment in the Razorpay checkout.
3. `POST /api/payments/verify` checks the signature and capture and creates the paid order.
   Retrying a successful verification returns the same order.

## Error Handling

```json
{
  "error": "Bad Request",
  "message": "Cart is empty",
  "request_id": "3f0c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development")
    ),
    tags(
        (name = "books", description = "Book catalog"),
        (name = "orders", description = "Order placement and tracking"),
        (name = "payments", description = "Online payment initiation and verification"),
        (name = "auth", description = "Accounts and tokens"),
        (name = "admin", description = "Store statistics"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::books::list_books,
        crate::handlers::books::get_book,
        crate::handlers::books::create_book,
        crate::handlers::books::update_book,
        crate::handlers::books::delete_book,

        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders_by_email,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::update_order_status,

        crate::handlers::payments::create_payment_order,
        crate::handlers::payments::verify_payment,

        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::profile,

        crate::handlers::admin::admin_stats,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::entities::book::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentMethod,
            crate::entities::order::PaymentStatus,
            crate::entities::user::UserRole,
            crate::services::catalog::CartItem,
            crate::services::orders::Address,
            crate::services::orders::CheckoutDetails,
            crate::services::orders::OrderView,
            crate::services::orders::OrderLineView,
            crate::handlers::orders::OrderEnvelope,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::services::payments::CreatePaymentOrderRequest,
            crate::services::payments::CreatePaymentOrderResponse,
            crate::services::payments::VerifyPaymentRequest,
            crate::services::payments::VerifyPaymentResponse,
            crate::services::users::UserView,
            crate::services::catalog::CreateBookRequest,
            crate::services::catalog::UpdateBookRequest,
            crate::services::stats::AdminStats,
            crate::services::stats::MonthlySales,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
