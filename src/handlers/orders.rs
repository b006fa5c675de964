use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::order::OrderStatus,
    errors::ServiceError,
    handlers::common::{success_response, ApiJson},
    services::orders::{CheckoutDetails, OrderView},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderEnvelope {
    pub message: String,
    pub order: OrderView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    /// One of pending, processing, shipped, delivered, cancelled
    pub order_status: String,
}

pub fn orders_routes() -> Router<AppState> {
    let customer = Router::new()
        .route("/", post(create_order))
        .route("/email/{email}", get(list_orders_by_email))
        .with_role(Role::User);

    let admin = Router::new()
        .route("/", get(list_orders))
        .route("/{id}/status", patch(update_order_status))
        .with_role(Role::Admin);

    customer.merge(admin)
}

#[utoipa::path(
    post,
    path = "/api/orders",
    summary = "Place order",
    description = "Places a cash-on-delivery order priced from the catalog",
    request_body = CheckoutDetails,
    responses(
        (status = 200, description = "Order created", body = OrderEnvelope),
        (status = 400, description = "Invalid order or empty cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown book in cart", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<CheckoutDetails>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .create_order(Some(user.user_id), payload)
        .await?;
    Ok(success_response(OrderEnvelope {
        message: "Order created successfully".to_string(),
        order,
    }))
}

#[utoipa::path(
    get,
    path = "/api/orders/email/{email}",
    summary = "Orders by email",
    params(("email" = String, Path, description = "Customer email")),
    responses(
        (status = 200, description = "Orders for the email, newest first", body = [OrderView]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Another customer's email", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders_by_email(
    State(state): State<AppState>,
    user: AuthUser,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    if !user.is_admin() && !email.trim().eq_ignore_ascii_case(user.email.trim()) {
        return Err(ServiceError::Forbidden(
            "Access denied to another customer's orders".to_string(),
        ));
    }
    let orders = state.services.orders.list_by_email(&email).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    summary = "List all orders",
    responses(
        (status = 200, description = "Every order, newest first", body = [OrderView]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_all().await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    summary = "Update order status",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderEnvelope),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let new_status = OrderStatus::from_str(payload.order_status.trim())
        .map_err(|_| ServiceError::InvalidStatus(payload.order_status.clone()))?;
    let order_id =
        Uuid::parse_str(&id).map_err(|_| ServiceError::NotFound("Order not found".to_string()))?;

    let order = state
        .services
        .orders
        .update_status(order_id, new_status)
        .await?;
    Ok(success_response(OrderEnvelope {
        message: "Order status updated".to_string(),
        order,
    }))
}
