use crate::{
    db::DbPool,
    entities::{
        book::{self, Entity as BookEntity},
        order::{self, Entity as OrderEntity, OrderStatus, PaymentMethod, PaymentStatus},
        order_item::{self, Entity as OrderItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::{price_cart, CartItem, PricedCart},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
}

/// Contact, address and cart of a checkout. Used for cash-on-delivery orders
/// and as the `orderData` of an online payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate]
    pub address: Address,
    #[serde(default, deserialize_with = "phone_as_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

/// Phones arrive either as JSON numbers or strings
fn phone_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Phone {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Phone>::deserialize(deserializer)?.map(|phone| match phone {
        Phone::Text(text) => text,
        Phone::Number(number) => number.to_string(),
    }))
}

/// Denormalised order line: the frozen values plus the current catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub book_id: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub title: String,
    /// `null` once the book has left the catalog
    pub book: Option<book::Model>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub address: Address,
    pub phone: Option<String>,
    pub products: Vec<OrderLineView>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to persist an order and its lines
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<Uuid>,
    pub details: CheckoutDetails,
    pub priced: PricedCart,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

/// Writes the order row and its lines on `db`, which is normally a transaction.
pub async fn insert_order<C: ConnectionTrait>(db: &C, new_order: NewOrder) -> Result<order::Model, DbErr> {
    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let NewOrder {
        user_id,
        details,
        priced,
        total_price,
        payment_method,
        payment_status,
        razorpay_order_id,
        razorpay_payment_id,
        razorpay_signature,
    } = new_order;

    let order_model = order::ActiveModel {
        id: Set(order_id),
        user_id: Set(user_id),
        name: Set(details.name.trim().to_string()),
        email: Set(details.email.trim().to_lowercase()),
        city: Set(details.address.city),
        country: Set(details.address.country),
        state: Set(details.address.state),
        zipcode: Set(details.address.zipcode),
        phone: Set(details.phone),
        total_price: Set(total_price),
        payment_method: Set(payment_method),
        payment_status: Set(payment_status),
        razorpay_order_id: Set(razorpay_order_id),
        razorpay_payment_id: Set(razorpay_payment_id),
        razorpay_signature: Set(razorpay_signature),
        order_status: Set(OrderStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    for (index, line) in priced.lines.into_iter().enumerate() {
        order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            line_number: Set(index as i32 + 1),
            book_id: Set(line.book_id),
            title: Set(line.title),
            quantity: Set(line.quantity),
            price: Set(line.price),
        }
        .insert(db)
        .await?;
    }

    Ok(order_model)
}

pub async fn find_by_razorpay_order_id<C: ConnectionTrait>(
    db: &C,
    razorpay_order_id: &str,
) -> Result<Option<order::Model>, DbErr> {
    OrderEntity::find()
        .filter(order::Column::RazorpayOrderId.eq(razorpay_order_id))
        .one(db)
        .await
}

/// Service for placing, listing and updating orders
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Places a cash-on-delivery order priced from the catalog
    #[instrument(skip(self, details), fields(email = %details.email, items = details.cart_items.len()))]
    pub async fn create_order(
        &self,
        user_id: Option<Uuid>,
        details: CheckoutDetails,
    ) -> Result<OrderView, ServiceError> {
        if details.cart_items.is_empty() {
            return Err(ServiceError::BadRequest("Cart is empty".to_string()));
        }
        details.validate()?;

        let payment_method = match details.payment_method.as_deref() {
            None => PaymentMethod::Cod,
            Some(raw) => PaymentMethod::from_str(raw.trim()).map_err(|_| {
                ServiceError::BadRequest(format!("Invalid payment method: {}", raw))
            })?,
        };
        if payment_method == PaymentMethod::Online {
            return Err(ServiceError::BadRequest(
                "Online orders are created by payment verification".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let priced = price_cart(db, &details.cart_items).await?;
        let total_price = priced.total_price;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_model = insert_order(
            &txn,
            NewOrder {
                user_id,
                details,
                priced,
                total_price,
                payment_method,
                payment_status: PaymentStatus::Pending,
                razorpay_order_id: None,
                razorpay_payment_id: None,
                razorpay_signature: None,
            },
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_model.id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_model.id, total = %order_model.total_price, "Order created");
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order_model.id,
                payment_method,
            })
            .await;

        self.view(order_model).await
    }

    /// Orders placed under `email`, newest first
    #[instrument(skip(self))]
    pub async fn list_by_email(&self, email: &str) -> Result<Vec<OrderView>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(order::Column::Email.eq(email.trim().to_lowercase()))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        self.views(orders).await
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<OrderView>, ServiceError> {
        let orders = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        self.views(orders).await
    }

    /// Sets a new fulfilment status. No transition rules apply.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderView, ServiceError> {
        let db = &*self.db_pool;
        let existing = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let old_status = existing.order_status;
        let mut active: order::ActiveModel = existing.into();
        active.order_status = Set(new_status);
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, %old_status, %new_status, "Order status updated");
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        self.view(updated).await
    }

    pub async fn view(&self, order_model: order::Model) -> Result<OrderView, ServiceError> {
        self.views(vec![order_model])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("order view missing".to_string()))
    }

    /// Expands line items and their books with two queries regardless of order count
    pub async fn views(&self, orders: Vec<order::Model>) -> Result<Vec<OrderView>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let db = &*self.db_pool;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::LineNumber)
            .all(db)
            .await?;

        let mut book_ids: Vec<&str> = items.iter().map(|i| i.book_id.as_str()).collect();
        book_ids.sort_unstable();
        book_ids.dedup();
        let books: HashMap<String, book::Model> = if book_ids.is_empty() {
            HashMap::new()
        } else {
            BookEntity::find()
                .filter(book::Column::Id.is_in(book_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|b| (b.id.clone(), b))
                .collect()
        };

        let mut lines_by_order: HashMap<Uuid, Vec<OrderLineView>> = HashMap::new();
        for item in items {
            lines_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderLineView {
                    book: books.get(&item.book_id).cloned(),
                    book_id: item.book_id,
                    quantity: item.quantity,
                    price: item.price,
                    title: item.title,
                });
        }

        Ok(orders
            .into_iter()
            .map(|o| {
                let products = lines_by_order.remove(&o.id).unwrap_or_default();
                OrderView {
                    id: o.id,
                    user_id: o.user_id,
                    name: o.name,
                    email: o.email,
                    address: Address {
                        city: o.city,
                        country: o.country,
                        state: o.state,
                        zipcode: o.zipcode,
                    },
                    phone: o.phone,
                    products,
                    total_price: o.total_price,
                    payment_method: o.payment_method,
                    payment_status: o.payment_status,
                    razorpay_order_id: o.razorpay_order_id,
                    razorpay_payment_id: o.razorpay_payment_id,
                    order_status: o.order_status,
                    created_at: o.created_at,
                    updated_at: o.updated_at,
                }
            })
            .collect())
    }
}
