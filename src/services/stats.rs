use crate::{
    db::DbPool,
    entities::{
        book::{self, Entity as BookEntity},
        order::Entity as OrderEntity,
    },
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Sales and order count for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySales {
    /// `YYYY-MM`
    pub month: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_sales: Decimal,
    pub total_orders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_orders: u64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_sales: Decimal,
    pub trending_books: u64,
    pub total_books: u64,
    /// Oldest month first
    pub monthly_sales: Vec<MonthlySales>,
}

/// Dashboard figures for admins
#[derive(Clone)]
pub struct StatsService {
    db_pool: Arc<DbPool>,
}

impl StatsService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn admin_stats(&self) -> Result<AdminStats, ServiceError> {
        let db = &*self.db_pool;

        let orders = OrderEntity::find().all(db).await?;
        let total_books = BookEntity::find().count(db).await?;
        let trending_books = BookEntity::find()
            .filter(book::Column::Trending.eq(true))
            .count(db)
            .await?;

        let mut total_sales = Decimal::ZERO;
        let mut months: BTreeMap<String, MonthlySales> = BTreeMap::new();
        for order in &orders {
            total_sales += order.total_price;
            let month = order.created_at.format("%Y-%m").to_string();
            let entry = months.entry(month.clone()).or_insert_with(|| MonthlySales {
                month,
                total_sales: Decimal::ZERO,
                total_orders: 0,
            });
            entry.total_sales += order.total_price;
            entry.total_orders += 1;
        }

        let stats = AdminStats {
            total_orders: orders.len() as u64,
            total_sales,
            trending_books,
            total_books,
            monthly_sales: months.into_values().collect(),
        };
        info!(
            total_orders = stats.total_orders,
            total_books = stats.total_books,
            "Admin stats generated"
        );
        Ok(stats)
    }
}
