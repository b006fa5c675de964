use axum::{extract::State, response::IntoResponse, routing::post, Router};

use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    errors::ServiceError,
    handlers::common::{success_response, ApiJson},
    services::payments::{
        CreatePaymentOrderRequest, CreatePaymentOrderResponse, VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    AppState,
};

pub fn payments_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_payment_order))
        .route("/verify", post(verify_payment))
        .with_role(Role::User)
}

#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    summary = "Start online payment",
    description = "Opens a gateway order for the cart and stages the checkout until payment is verified",
    request_body = CreatePaymentOrderRequest,
    responses(
        (status = 200, description = "Gateway order opened", body = CreatePaymentOrderResponse),
        (status = 400, description = "Invalid amount or order data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown book in cart", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn create_payment_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<CreatePaymentOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .payments
        .create_payment_order(user.user_id, payload)
        .await?;
    Ok(success_response(response))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    summary = "Verify payment",
    description = "Checks the gateway signature and capture, then creates the paid order. Safe to retry.",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified and order created", body = VerifyPaymentResponse),
        (status = 400, description = "Missing parameters, bad signature or uncaptured payment", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Verification could not complete", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .payments
        .verify_payment(user.user_id, payload)
        .await?;
    Ok(success_response(response))
}
