use crate::{
    db::DbPool,
    entities::temp_order::{self, Entity as TempOrderEntity, TempOrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::CheckoutDetails,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// What is stored in `temp_orders.order_data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedCheckout {
    pub details: CheckoutDetails,
    /// Catalog subtotal at initiation time
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    /// Amount requested from the gateway, minor units
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Short-lived staging of checkouts awaiting payment
#[derive(Clone)]
pub struct TempOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    ttl: Duration,
}

impl TempOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, ttl: Duration) -> Self {
        Self {
            db_pool,
            event_sender,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[instrument(skip(self, snapshot))]
    pub async fn stage(
        &self,
        razorpay_order_id: &str,
        user_id: Uuid,
        snapshot: &StagedCheckout,
    ) -> Result<temp_order::Model, ServiceError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| ServiceError::InternalError(format!("invalid staging ttl: {e}")))?;

        let model = temp_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            razorpay_order_id: Set(razorpay_order_id.to_string()),
            order_data: Set(serde_json::to_value(snapshot)?),
            user_id: Set(user_id),
            status: Set(TempOrderStatus::Created),
            created_at: Set(now),
            expires_at: Set(now + ttl),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, razorpay_order_id, "Failed to stage checkout");
            ServiceError::DatabaseError(e)
        })?;

        info!(razorpay_order_id, %user_id, expires_at = %model.expires_at, "Checkout staged");
        self.event_sender
            .send_or_log(Event::CheckoutStaged {
                razorpay_order_id: razorpay_order_id.to_string(),
                user_id,
            })
            .await;
        Ok(model)
    }

    /// The staged record, unless it has expired
    pub async fn find_live(
        &self,
        razorpay_order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<temp_order::Model>, ServiceError> {
        let found = TempOrderEntity::find()
            .filter(temp_order::Column::RazorpayOrderId.eq(razorpay_order_id))
            .one(&*self.db_pool)
            .await?;
        Ok(found.filter(|t| !t.is_expired(now)))
    }

    #[instrument(skip(self))]
    pub async fn mark_failed(&self, razorpay_order_id: &str) -> Result<(), ServiceError> {
        let result = TempOrderEntity::update_many()
            .col_expr(
                temp_order::Column::Status,
                sea_orm::sea_query::Expr::value(TempOrderStatus::Failed),
            )
            .filter(temp_order::Column::RazorpayOrderId.eq(razorpay_order_id))
            .exec(&*self.db_pool)
            .await?;
        debug!(rows = result.rows_affected, "staged checkout marked failed");
        Ok(())
    }

    /// Deletes rows whose expiry has passed
    #[instrument(skip(self))]
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = TempOrderEntity::delete_many()
            .filter(temp_order::Column::ExpiresAt.lte(now))
            .exec(&*self.db_pool)
            .await?;

        if result.rows_affected > 0 {
            info!(count = result.rows_affected, "Purged expired checkouts");
            self.event_sender
                .send_or_log(Event::TempOrdersPurged {
                    count: result.rows_affected,
                })
                .await;
        }
        Ok(result.rows_affected)
    }
}

/// Removes the staged record for a gateway order; used inside the finalisation transaction.
pub async fn delete_staged<C: ConnectionTrait>(db: &C, razorpay_order_id: &str) -> Result<u64, DbErr> {
    let result = TempOrderEntity::delete_many()
        .filter(temp_order::Column::RazorpayOrderId.eq(razorpay_order_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Background worker that purges expired checkouts every `interval`.
pub fn start_sweeper(service: Arc<TempOrderService>, interval: Duration) -> JoinHandle<()> {
    info!(?interval, "Starting expired checkout sweeper");
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            if let Err(e) = service.purge_expired(Utc::now()).await {
                warn!("checkout sweeper error: {}", e);
            }
        }
    })
}
