//! Online checkout: open a gateway order, stage the cart, and turn a verified,
//! captured payment into a paid order exactly once.

use crate::{
    db::{is_unique_violation, DbPool},
    entities::order::{PaymentMethod, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{
        from_minor_units, signature::verify_payment_signature, CreateOrderRequest, PaymentGateway,
        MIN_AMOUNT_MINOR,
    },
    services::{
        catalog::price_cart,
        orders::{find_by_razorpay_order_id, insert_order, CheckoutDetails, NewOrder},
        temp_orders::{delete_staged, StagedCheckout, TempOrderService},
    },
};
use chrono::Utc;
use sea_orm::{DbErr, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const VERIFIED_MESSAGE: &str = "Payment verified and order created successfully";

/// Lifecycle of one online checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutStage {
    /// Gateway order open, cart staged
    Initiated,
    /// Signature checked and funds captured
    Verified,
    /// Paid order persisted, staging removed
    Finalized,
    /// Payment failed or never completed
    Abandoned,
}

impl CheckoutStage {
    pub fn can_advance_to(self, next: CheckoutStage) -> bool {
        use CheckoutStage::*;
        matches!(
            (self, next),
            (Initiated, Verified) | (Initiated, Abandoned) | (Verified, Finalized)
        )
    }

    pub fn advance(self, next: CheckoutStage) -> Result<CheckoutStage, ServiceError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(ServiceError::InternalError(format!(
                "illegal checkout transition {self} -> {next}"
            )))
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// Public key id handed to the client checkout widget
    pub key_id: String,
    pub key_secret: String,
    pub default_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentOrderRequest {
    /// Minor units, at least 100
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[schema(value_type = Option<CheckoutDetails>)]
    pub order_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentOrderResponse {
    pub success: bool,
    /// Gateway order id
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub razorpay_signature: Option<String>,
    #[serde(default, rename = "orderData")]
    #[schema(value_type = Option<CheckoutDetails>)]
    pub order_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub message: String,
}

impl VerifyPaymentResponse {
    fn verified(order_id: Uuid) -> Self {
        Self {
            success: true,
            order_id,
            message: VERIFIED_MESSAGE.to_string(),
        }
    }
}

enum Finalized {
    Created(Uuid),
    AlreadyExisted(Uuid),
}

#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    temp_orders: Arc<TempOrderService>,
    event_sender: Arc<EventSender>,
    settings: PaymentSettings,
}

fn parse_order_data(raw: Option<serde_json::Value>) -> Result<CheckoutDetails, ServiceError> {
    let raw = raw.ok_or_else(|| ServiceError::BadRequest("Order data is required".to_string()))?;
    serde_json::from_value(raw)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid order data: {}", e)))
}

/// Parsed and validated checkout data with a non-empty cart
fn checkout_details(raw: Option<serde_json::Value>) -> Result<CheckoutDetails, ServiceError> {
    let details = parse_order_data(raw)?;
    if details.cart_items.is_empty() {
        return Err(ServiceError::BadRequest("Cart is empty".to_string()));
    }
    details.validate()?;
    Ok(details)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl PaymentService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        temp_orders: Arc<TempOrderService>,
        event_sender: Arc<EventSender>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            temp_orders,
            event_sender,
            settings,
        }
    }

    /// Opens a gateway order for the cart and stages the checkout. No order is written yet.
    #[instrument(skip(self, request), fields(user_id = %user_id, amount = ?request.amount))]
    pub async fn create_payment_order(
        &self,
        user_id: Uuid,
        request: CreatePaymentOrderRequest,
    ) -> Result<CreatePaymentOrderResponse, ServiceError> {
        let amount = request
            .amount
            .filter(|a| *a >= MIN_AMOUNT_MINOR)
            .ok_or_else(|| ServiceError::BadRequest("Invalid amount".to_string()))?;

        let details = checkout_details(request.order_data)?;

        let currency = non_empty(request.currency)
            .unwrap_or_else(|| self.settings.default_currency.clone())
            .to_uppercase();

        let priced = price_cart(&*self.db_pool, &details.cart_items).await?;
        if from_minor_units(amount, &currency) < priced.total_price {
            warn!(
                amount,
                %currency,
                subtotal = %priced.total_price,
                "requested amount is below the catalog subtotal"
            );
        }
        let receipt = format!("rcpt_{}", Uuid::new_v4().simple());

        let mut notes = BTreeMap::new();
        notes.insert("user_email".to_string(), details.email.clone());
        notes.insert("user_name".to_string(), details.name.clone());

        let gateway_order = self
            .gateway
            .create_order(CreateOrderRequest {
                amount,
                currency: currency.clone(),
                receipt: receipt.clone(),
                notes,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "Gateway order creation failed");
                ServiceError::from(e)
            })?;

        let snapshot = StagedCheckout {
            details,
            subtotal: priced.total_price,
            amount: gateway_order.amount,
            currency: gateway_order.currency.clone(),
            receipt,
        };
        self.temp_orders
            .stage(&gateway_order.id, user_id, &snapshot)
            .await?;

        info!(gateway_order_id = %gateway_order.id, stage = %CheckoutStage::Initiated, "Online checkout initiated");

        Ok(CreatePaymentOrderResponse {
            success: true,
            order_id: gateway_order.id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
            key: self.settings.key_id.clone(),
        })
    }

    /// Checks the signature and capture, then persists the paid order.
    /// Replays for an already finalised gateway order return the existing order.
    #[instrument(skip(self, request), fields(user_id = %user_id, razorpay_order_id = ?request.razorpay_order_id))]
    pub async fn verify_payment(
        &self,
        user_id: Uuid,
        request: VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ServiceError> {
        let (Some(razorpay_order_id), Some(razorpay_payment_id), Some(razorpay_signature)) = (
            non_empty(request.razorpay_order_id),
            non_empty(request.razorpay_payment_id),
            non_empty(request.razorpay_signature),
        ) else {
            return Err(ServiceError::BadRequest(
                "Missing payment parameters".to_string(),
            ));
        };

        let mut stage = CheckoutStage::Initiated;

        if !verify_payment_signature(
            &self.settings.key_secret,
            &razorpay_order_id,
            &razorpay_payment_id,
            &razorpay_signature,
        ) {
            warn!(%razorpay_order_id, %razorpay_payment_id, "payment signature mismatch");
            return Err(ServiceError::PaymentVerification(
                "Payment verification failed".to_string(),
            ));
        }

        let db = &*self.db_pool;
        if let Some(existing) = find_by_razorpay_order_id(db, &razorpay_order_id).await? {
            info!(order_id = %existing.id, %razorpay_order_id, "Payment already finalised");
            delete_staged(db, &razorpay_order_id).await?;
            return Ok(VerifyPaymentResponse::verified(existing.id));
        }

        let payment = self
            .gateway
            .fetch_payment(&razorpay_payment_id)
            .await
            .map_err(|e| {
                error!(error = %e, %razorpay_payment_id, "Failed to fetch payment from gateway");
                ServiceError::InternalError(format!("payment fetch failed: {e}"))
            })?;

        if payment
            .order_id
            .as_deref()
            .is_some_and(|id| id != razorpay_order_id)
        {
            warn!(%razorpay_payment_id, "payment belongs to a different gateway order");
            return Err(ServiceError::PaymentVerification(
                "Payment verification failed".to_string(),
            ));
        }

        if !payment.is_captured() {
            warn!(%razorpay_payment_id, status = %payment.status, "payment not captured");
            if payment.is_failed() {
                stage = stage.advance(CheckoutStage::Abandoned)?;
                self.temp_orders.mark_failed(&razorpay_order_id).await?;
                info!(%razorpay_order_id, %stage, "Checkout abandoned");
            }
            return Err(ServiceError::PaymentVerification(
                "Payment not captured".to_string(),
            ));
        }
        stage = stage.advance(CheckoutStage::Verified)?;

        let staged = self
            .temp_orders
            .find_live(&razorpay_order_id, Utc::now())
            .await?;
        let (details, owner_id) = match staged {
            Some(staged) => {
                let snapshot: StagedCheckout = serde_json::from_value(staged.order_data)?;
                (snapshot.details, staged.user_id)
            }
            None => (checkout_details(request.order_data)?, user_id),
        };

        let priced = price_cart(db, &details.cart_items).await?;
        let captured_total = from_minor_units(payment.amount, &payment.currency);
        if captured_total < priced.total_price {
            warn!(
                captured = %captured_total,
                subtotal = %priced.total_price,
                %razorpay_order_id,
                "captured amount is below the catalog subtotal"
            );
        }

        let new_order = NewOrder {
            user_id: Some(owner_id),
            details,
            priced,
            total_price: captured_total,
            payment_method: PaymentMethod::Online,
            payment_status: PaymentStatus::Paid,
            razorpay_order_id: Some(razorpay_order_id.clone()),
            razorpay_payment_id: Some(razorpay_payment_id.clone()),
            razorpay_signature: Some(razorpay_signature),
        };

        let outcome = match self.finalize(new_order).await {
            Ok(outcome) => outcome,
            Err(e) if is_unique_violation(&e) => {
                // a concurrent verification won the race
                let existing = find_by_razorpay_order_id(db, &razorpay_order_id)
                    .await?
                    .ok_or(ServiceError::DatabaseError(e))?;
                Finalized::AlreadyExisted(existing.id)
            }
            Err(e) => {
                error!(error = %e, %razorpay_order_id, "Failed to finalise paid order");
                return Err(ServiceError::DatabaseError(e));
            }
        };

        let order_id = match outcome {
            Finalized::AlreadyExisted(order_id) => {
                info!(%order_id, %razorpay_order_id, "Payment already finalised");
                order_id
            }
            Finalized::Created(order_id) => {
                stage = stage.advance(CheckoutStage::Finalized)?;
                info!(%order_id, %razorpay_order_id, %stage, "Payment verified and order created");
                self.event_sender
                    .send_or_log(Event::OrderCreated {
                        order_id,
                        payment_method: PaymentMethod::Online,
                    })
                    .await;
                self.event_sender
                    .send_or_log(Event::PaymentVerified {
                        order_id,
                        razorpay_order_id,
                        razorpay_payment_id,
                    })
                    .await;
                order_id
            }
        };

        Ok(VerifyPaymentResponse::verified(order_id))
    }

    /// Order insert and staging cleanup commit together or not at all
    async fn finalize(&self, new_order: NewOrder) -> Result<Finalized, DbErr> {
        let razorpay_order_id = new_order.razorpay_order_id.clone().unwrap_or_default();
        let txn = self.db_pool.begin().await?;

        if let Some(existing) = find_by_razorpay_order_id(&txn, &razorpay_order_id).await? {
            delete_staged(&txn, &razorpay_order_id).await?;
            txn.commit().await?;
            return Ok(Finalized::AlreadyExisted(existing.id));
        }

        let order_model = insert_order(&txn, new_order).await?;
        delete_staged(&txn, &razorpay_order_id).await?;
        txn.commit().await?;

        Ok(Finalized::Created(order_model.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::book;
    use crate::gateway::{signature::payment_signature, GatewayOrder, GatewayPayment, MockPaymentGateway};
    use crate::services::orders::Address;
    use crate::services::catalog::CartItem;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    use std::time::Duration;

    const SECRET: &str = "rzp_unit_secret";

    async fn db() -> Arc<DbPool> {
        let db = crate::db::establish_connection_with_config(&crate::db::DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        crate::db::run_migrations(&db).await.unwrap();

        let now = Utc::now();
        book::ActiveModel {
            id: Set("b1".into()),
            title: Set("Dune".into()),
            description: Set(None),
            category: Set(None),
            cover_image: Set(None),
            trending: Set(false),
            old_price: Set(None),
            new_price: Set(dec!(150)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&db)
        .await
        .unwrap();
        Arc::new(db)
    }

    fn service(db: Arc<DbPool>, gateway: MockPaymentGateway) -> PaymentService {
        let (sender, _rx) = crate::events::channel();
        let sender = Arc::new(sender);
        let temp_orders = Arc::new(TempOrderService::new(
            db.clone(),
            sender.clone(),
            Duration::from_secs(900),
        ));
        PaymentService::new(
            db,
            Arc::new(gateway),
            temp_orders,
            sender,
            PaymentSettings {
                key_id: "rzp_key".into(),
                key_secret: SECRET.into(),
                default_currency: "INR".into(),
            },
        )
    }

    fn order_data() -> serde_json::Value {
        serde_json::to_value(CheckoutDetails {
            name: "Asha".into(),
            email: "asha@books.io".into(),
            address: Address {
                city: "Pune".into(),
                ..Default::default()
            },
            phone: None,
            cart_items: vec![CartItem {
                book_id: "b1".into(),
                quantity: Some(2),
                title: None,
            }],
            payment_method: None,
        })
        .unwrap()
    }

    #[test]
    fn checkout_stage_transitions() {
        use CheckoutStage::*;
        assert!(Initiated.can_advance_to(Verified));
        assert!(Initiated.can_advance_to(Abandoned));
        assert!(Verified.can_advance_to(Finalized));
        assert!(!Initiated.can_advance_to(Finalized));
        assert!(!Finalized.can_advance_to(Verified));
        assert!(Abandoned.advance(Finalized).is_err());
    }

    #[tokio::test]
    async fn initiation_sends_amount_receipt_and_notes() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .withf(|req| {
                req.amount == 30000
                    && req.currency == "INR"
                    && req.receipt.starts_with("rcpt_")
                    && req.notes.get("user_email").map(String::as_str) == Some("asha@books.io")
                    && req.notes.get("user_name").map(String::as_str) == Some("Asha")
            })
            .times(1)
            .returning(|req| {
                Ok(GatewayOrder {
                    id: "order_U1".into(),
                    amount: req.amount,
                    currency: req.currency,
                    receipt: Some(req.receipt),
                    status: Some("created".into()),
                })
            });

        let svc = service(db().await, gateway);
        let response = svc
            .create_payment_order(
                Uuid::new_v4(),
                CreatePaymentOrderRequest {
                    amount: Some(30000),
                    currency: None,
                    order_data: Some(order_data()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.order_id, "order_U1");
        assert_eq!(response.key, "rzp_key");
        assert!(svc
            .temp_orders
            .find_live("order_U1", Utc::now())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn small_amount_never_reaches_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().times(0);

        let svc = service(db().await, gateway);
        let err = svc
            .create_payment_order(
                Uuid::new_v4(),
                CreatePaymentOrderRequest {
                    amount: Some(99),
                    currency: None,
                    order_data: Some(order_data()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.response_message(), "Invalid amount");
    }

    #[tokio::test]
    async fn forged_signature_never_reaches_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_payment().times(0);

        let svc = service(db().await, gateway);
        let err = svc
            .verify_payment(
                Uuid::new_v4(),
                VerifyPaymentRequest {
                    razorpay_order_id: Some("order_X".into()),
                    razorpay_payment_id: Some("pay_X".into()),
                    razorpay_signature: Some("deadbeef".into()),
                    order_data: Some(order_data()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.response_message(), "Payment verification failed");
    }

    #[tokio::test]
    async fn verified_payment_is_finalised_once() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_payment().times(1).returning(|id| {
            Ok(GatewayPayment {
                id: id.to_string(),
                order_id: Some("order_V".into()),
                amount: 30000,
                currency: "INR".into(),
                status: "captured".into(),
            })
        });

        let db = db().await;
        let svc = service(db.clone(), gateway);
        let request = VerifyPaymentRequest {
            razorpay_order_id: Some("order_V".into()),
            razorpay_payment_id: Some("pay_V".into()),
            razorpay_signature: payment_signature(SECRET, "order_V", "pay_V"),
            order_data: Some(order_data()),
        };

        let first = svc
            .verify_payment(Uuid::new_v4(), request.clone())
            .await
            .unwrap();
        let second = svc.verify_payment(Uuid::new_v4(), request).await.unwrap();

        assert_eq!(first.order_id, second.order_id);
        assert_eq!(first.message, VERIFIED_MESSAGE);

        let orders = crate::entities::order::Entity::find().all(&*db).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].payment_status, PaymentStatus::Paid);
        assert_eq!(orders[0].total_price, dec!(300));
    }
}
