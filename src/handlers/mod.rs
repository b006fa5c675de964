pub mod admin;
pub mod auth;
pub mod books;
pub mod common;
pub mod health;
pub mod orders;
pub mod payments;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    gateway::PaymentGateway,
    services::{
        catalog::CatalogService,
        orders::OrderService,
        payments::{PaymentService, PaymentSettings},
        stats::StatsService,
        temp_orders::TempOrderService,
        users::UserService,
    },
};
use std::sync::Arc;

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub stats: Arc<StatsService>,
    pub temp_orders: Arc<TempOrderService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(db_pool.clone()));
        let orders = Arc::new(OrderService::new(db_pool.clone(), event_sender.clone()));
        let stats = Arc::new(StatsService::new(db_pool.clone()));
        let temp_orders = Arc::new(TempOrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.temp_order_ttl(),
        ));
        let payments = Arc::new(PaymentService::new(
            db_pool.clone(),
            gateway,
            temp_orders.clone(),
            event_sender,
            PaymentSettings {
                key_id: config.razorpay_key_id.clone(),
                key_secret: config.razorpay_key_secret.clone(),
                default_currency: config.default_currency.clone(),
            },
        ));
        let users = Arc::new(UserService::new(
            db_pool,
            auth_service,
            config.admin_email_list(),
        ));

        Self {
            catalog,
            orders,
            payments,
            stats,
            temp_orders,
            users,
        }
    }
}
