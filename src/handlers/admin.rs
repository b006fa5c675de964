use axum::{extract::State, response::IntoResponse, routing::get, Router};

use crate::{
    auth::{AuthRouterExt, Role},
    errors::ServiceError,
    handlers::common::success_response,
    services::stats::AdminStats,
    AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_stats))
        .with_role(Role::Admin)
}

#[utoipa::path(
    get,
    path = "/api/admin",
    summary = "Store statistics",
    responses(
        (status = 200, description = "Order, sales and catalog figures", body = AdminStats),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn admin_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.services.stats.admin_stats().await?;
    Ok(success_response(stats))
}
