use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{CreateOrderRequest, GatewayError, GatewayOrder, GatewayPayment, PaymentGateway};
use crate::config::AppConfig;
use crate::middleware_helpers::retry::{with_retry, RetryConfig};

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub api_base: String,
    pub key_id: String,
    pub key_secret: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl From<&AppConfig> for RazorpayConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            api_base: cfg.razorpay_api_base.clone(),
            key_id: cfg.razorpay_key_id.clone(),
            key_secret: cfg.razorpay_key_secret.clone(),
            timeout: cfg.gateway_timeout(),
            retry: RetryConfig::default().with_max_attempts(cfg.gateway_max_retries),
        }
    }
}

/// REST client for the Razorpay orders and payments APIs
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    config: RazorpayConfig,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }
}

fn api_error(status: StatusCode, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| {
            envelope
                .error
                .description
                .or(envelope.error.code)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    GatewayError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, request), fields(receipt = %request.receipt, amount = request.amount))]
    async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let url = self.url("orders");
        let order: GatewayOrder = with_retry(&self.config.retry, GatewayError::is_transient, || {
            self.execute(self.client.post(&url).json(&request))
        })
        .await?;

        debug!(gateway_order_id = %order.id, "gateway order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let url = self.url(&format!("payments/{payment_id}"));
        with_retry(&self.config.retry, GatewayError::is_transient, || {
            self.execute(self.client.get(&url))
        })
        .await
    }
}
