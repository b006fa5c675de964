use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};

use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::book,
    errors::ServiceError,
    handlers::common::{created_response, success_response, ApiJson},
    services::catalog::{CreateBookRequest, UpdateBookRequest},
    AppState,
};

pub fn books_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_books))
        .route("/{id}", get(get_book));

    let admin = Router::new()
        .route("/", post(create_book))
        .route("/{id}", put(update_book).delete(delete_book))
        .with_role(Role::Admin);

    public.merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/books",
    summary = "List books",
    responses(
        (status = 200, description = "All books, newest first", body = [book::Model])
    ),
    tag = "books"
)]
pub async fn list_books(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let books = state.services.catalog.list_books().await?;
    Ok(success_response(books))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    summary = "Get book",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book found", body = book::Model),
        (status = 404, description = "Book not found", body = crate::errors::ErrorResponse)
    ),
    tag = "books"
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let book = state.services.catalog.get_book(&id).await?;
    Ok(success_response(book))
}

#[utoipa::path(
    post,
    path = "/api/books",
    summary = "Add book",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created", body = book::Model),
        (status = 400, description = "Invalid book", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate id", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "books"
)]
pub async fn create_book(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<CreateBookRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let book = state.services.catalog.create_book(payload).await?;
    tracing::info!(book_id = %book.id, admin = %user.user_id, "book added");
    Ok(created_response(book))
}

#[utoipa::path(
    put,
    path = "/api/books/{id}",
    summary = "Edit book",
    params(("id" = String, Path, description = "Book id")),
    request_body = UpdateBookRequest,
    responses(
        (status = 200, description = "Book updated", body = book::Model),
        (status = 400, description = "Invalid book", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "books"
)]
pub async fn update_book(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateBookRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let book = state.services.catalog.update_book(&id, payload).await?;
    tracing::info!(book_id = %book.id, admin = %user.user_id, "book edited");
    Ok(success_response(book))
}

#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    summary = "Delete book",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "The deleted book", body = book::Model),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "books"
)]
pub async fn delete_book(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let book = state.services.catalog.delete_book(&id).await?;
    tracing::info!(book_id = %book.id, admin = %user.user_id, "book deleted");
    Ok(success_response(book))
}
