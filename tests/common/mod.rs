#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use bookstore_api::{
    auth::Role,
    config::AppConfig,
    db,
    events,
    gateway::{
        signature::payment_signature, CreateOrderRequest, GatewayError, GatewayOrder,
        GatewayPayment, PaymentGateway,
    },
    services::catalog::CreateBookRequest,
    AppState,
};

pub const KEY_ID: &str = "rzp_test_key";
pub const KEY_SECRET: &str = "rzp_test_secret";
pub const ADMIN_EMAIL: &str = "admin@books.io";

/// In-process stand-in for the payment gateway
#[derive(Default)]
pub struct StubGateway {
    counter: Mutex<u32>,
    pub created: Mutex<Vec<CreateOrderRequest>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
    pub fail_create: Mutex<bool>,
    pub fetch_calls: Mutex<u32>,
}

impl StubGateway {
    /// Registers what `fetch_payment` returns for `payment_id`
    pub fn set_payment(&self, payment_id: &str, order_id: &str, amount: i64, status: &str) {
        self.set_payment_in(payment_id, order_id, amount, "INR", status);
    }

    pub fn set_payment_in(
        &self,
        payment_id: &str,
        order_id: &str,
        amount: i64,
        currency: &str,
        status: &str,
    ) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            GatewayPayment {
                id: payment_id.to_string(),
                order_id: Some(order_id.to_string()),
                amount,
                currency: currency.to_string(),
                status: status.to_string(),
            },
        );
    }

    pub fn created_orders(&self) -> Vec<CreateOrderRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        if *self.fail_create.lock().unwrap() {
            return Err(GatewayError::Api {
                status: 503,
                message: "gateway down".into(),
            });
        }
        let id = {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            format!("order_stub{}", *counter)
        };
        self.created.lock().unwrap().push(request.clone());
        Ok(GatewayOrder {
            id,
            amount: request.amount,
            currency: request.currency,
            receipt: Some(request.receipt),
            status: Some("created".into()),
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        *self.fetch_calls.lock().unwrap() += 1;
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Api {
                status: 400,
                message: "The id provided does not exist".into(),
            })
    }
}

/// Helper harness for spinning up the full router backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
    _event_task: tokio::task::JoinHandle<u64>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            5000,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.admin_emails = Some(ADMIN_EMAIL.to_string());
        cfg.razorpay_key_id = KEY_ID.to_string();
        cfg.razorpay_key_secret = KEY_SECRET.to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel();
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(StubGateway::default());
        let state = AppState::new(Arc::new(pool), cfg, gateway.clone(), event_sender);
        let router = bookstore_api::build_router(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Like [`request`](Self::request) but returns the status and parsed JSON body
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Registers an account over HTTP and returns its token and id
    pub async fn register(&self, username: &str, email: &str) -> (String, Uuid) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/register",
                Some(json!({ "username": username, "email": email, "password": "secret123" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let token = body["token"].as_str().expect("token").to_string();
        let id = body["user"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("user id");
        (token, id)
    }

    pub async fn customer_token(&self) -> String {
        self.register("reader", "reader@books.io").await.0
    }

    pub async fn admin_token(&self) -> String {
        self.register("admin", ADMIN_EMAIL).await.0
    }

    /// Token for an account that does not exist in the database
    pub fn token_for(&self, email: &str, role: Role) -> String {
        self.state
            .auth_service
            .generate_token(Uuid::new_v4(), "ghost", email, role)
            .expect("token")
    }

    pub async fn seed_book(&self, id: &str, title: &str, price: Decimal) {
        self.state
            .services
            .catalog
            .create_book(CreateBookRequest {
                id: Some(id.to_string()),
                title: title.to_string(),
                description: None,
                category: Some("fiction".to_string()),
                cover_image: None,
                trending: false,
                old_price: None,
                new_price: price,
            })
            .await
            .expect("seed book");
    }

    pub fn signature(order_id: &str, payment_id: &str) -> String {
        payment_signature(KEY_SECRET, order_id, payment_id).expect("hmac key")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Checkout body shared by the order and payment tests
pub fn order_data(email: &str, cart: Value) -> Value {
    json!({
        "name": "Asha Rao",
        "email": email,
        "address": { "city": "Pune", "country": "India", "state": "MH", "zipcode": "411001" },
        "phone": 9876543210u64,
        "cartItems": cart
    })
}
