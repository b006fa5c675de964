use crate::{
    db::DbPool,
    entities::book::{self, Entity as BookEntity},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A cart line as sent by the client. Only `book_id` and `quantity` are trusted;
/// the title is advisory and the price is always re-read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(alias = "_id")]
    pub book_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CartItem {
    /// Missing or zero means one copy
    pub fn resolved_quantity(&self) -> Result<i32, ServiceError> {
        match self.quantity {
            None | Some(0) => Ok(1),
            Some(q) if q < 0 => Err(ServiceError::BadRequest(format!(
                "Invalid quantity for book {}",
                self.label()
            ))),
            Some(q) => i32::try_from(q).map_err(|_| {
                ServiceError::BadRequest(format!("Invalid quantity for book {}", self.label()))
            }),
        }
    }

    fn label(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.book_id)
    }
}

/// Line item priced against the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub book_id: String,
    pub title: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

/// Prices `items` in cart order using the catalog snapshot in `books`.
/// Fails on the first item whose book is absent.
pub fn resolve_lines(
    items: &[CartItem],
    books: &HashMap<String, book::Model>,
) -> Result<PricedCart, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::BadRequest("Cart is empty".to_string()));
    }

    let mut lines = Vec::with_capacity(items.len());
    let mut total_price = Decimal::ZERO;

    for item in items {
        let quantity = item.resolved_quantity()?;
        let book = books
            .get(&item.book_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Book not found: {}", item.label())))?;

        let line = PricedLine {
            book_id: book.id.clone(),
            title: book.title.clone(),
            quantity,
            price: book.new_price,
        };
        total_price += line.line_total();
        lines.push(line);
    }

    Ok(PricedCart { lines, total_price })
}

/// Loads every referenced book in one query and prices the cart.
pub async fn price_cart<C: ConnectionTrait>(
    db: &C,
    items: &[CartItem],
) -> Result<PricedCart, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::BadRequest("Cart is empty".to_string()));
    }

    let mut ids: Vec<&str> = items.iter().map(|i| i.book_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();

    let books: HashMap<String, book::Model> = BookEntity::find()
        .filter(book::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|b| (b.id.clone(), b))
        .collect();

    resolve_lines(items, &books)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    /// Optional caller-chosen id; a UUID string is generated otherwise
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 300, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub trending: bool,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub old_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub new_price: Decimal,
}

/// Partial edit of a book. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    #[validate(length(min = 1, max = 300, message = "Title is required"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    pub trending: Option<bool>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub old_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub new_price: Option<Decimal>,
}

fn check_prices(new_price: Option<Decimal>, old_price: Option<Decimal>) -> Result<(), ServiceError> {
    if new_price.is_some_and(|p| p.is_sign_negative()) {
        return Err(ServiceError::ValidationError(
            "newPrice must not be negative".to_string(),
        ));
    }
    if old_price.is_some_and(|p| p.is_sign_negative()) {
        return Err(ServiceError::ValidationError(
            "oldPrice must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Catalog reads plus admin maintenance
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_books(&self) -> Result<Vec<book::Model>, ServiceError> {
        let books = BookEntity::find()
            .order_by_desc(book::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(books)
    }

    #[instrument(skip(self))]
    pub async fn get_book(&self, id: &str) -> Result<book::Model, ServiceError> {
        BookEntity::find_by_id(id.to_string())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Book not found: {}", id)))
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_book(&self, request: CreateBookRequest) -> Result<book::Model, ServiceError> {
        request.validate()?;
        if request.title.trim().is_empty() {
            return Err(ServiceError::ValidationError("Title is required".to_string()));
        }
        check_prices(Some(request.new_price), request.old_price)?;

        let id = request
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if BookEntity::find_by_id(id.clone())
            .one(&*self.db_pool)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!("Book {} already exists", id)));
        }

        let now = Utc::now();
        let model = book::ActiveModel {
            id: Set(id.clone()),
            title: Set(request.title.trim().to_string()),
            description: Set(request.description),
            category: Set(request.category),
            cover_image: Set(request.cover_image),
            trending: Set(request.trending),
            old_price: Set(request.old_price),
            new_price: Set(request.new_price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, book_id = %id, "Failed to insert book");
            ServiceError::DatabaseError(e)
        })?;

        info!(book_id = %model.id, "Book created");
        Ok(model)
    }

    /// Existing order lines keep the price they were sold at.
    #[instrument(skip(self, request))]
    pub async fn update_book(
        &self,
        id: &str,
        request: UpdateBookRequest,
    ) -> Result<book::Model, ServiceError> {
        request.validate()?;
        if request.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::ValidationError("Title is required".to_string()));
        }
        check_prices(request.new_price, request.old_price)?;

        let existing = self.get_book(id).await?;
        let mut active: book::ActiveModel = existing.into();
        if let Some(title) = request.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = request.category {
            active.category = Set(Some(category));
        }
        if let Some(cover_image) = request.cover_image {
            active.cover_image = Set(Some(cover_image));
        }
        if let Some(trending) = request.trending {
            active.trending = Set(trending);
        }
        if let Some(old_price) = request.old_price {
            active.old_price = Set(Some(old_price));
        }
        if let Some(new_price) = request.new_price {
            active.new_price = Set(new_price);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, book_id = %id, "Failed to update book");
            ServiceError::DatabaseError(e)
        })?;

        info!(book_id = %updated.id, "Book updated");
        Ok(updated)
    }

    /// Removes the book and returns it. Past orders keep their frozen lines.
    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: &str) -> Result<book::Model, ServiceError> {
        let existing = self.get_book(id).await?;
        BookEntity::delete_by_id(existing.id.clone())
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, book_id = %id, "Failed to delete book");
                ServiceError::DatabaseError(e)
            })?;

        info!(book_id = %existing.id, "Book deleted");
        Ok(existing)
    }
}
