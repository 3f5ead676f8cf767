//! payment.rs
//!
//! Service layer for the external payment gateway.
//!
//! Key pieces:
//! 1.  **CircuitBreaker**: guards every network call to the gateway so a
//!     dead upstream does not get hammered with requests.
//! 2.  **PaymentGateway**: the capability trait the orchestrator depends
//!     on: order creation and signature verification, nothing else.
//! 3.  **RazorpayClient**: the HTTP implementation. Order creation goes
//!     through the circuit breaker; signature verification is a local
//!     SHA-256 token check and never touches the network.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};
use crate::error::BookingError;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests allowed.
    Closed,
    /// Blocking requests after repeated failures.
    Open,
    /// One probe request allowed after the open timeout elapsed.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerState>,
    failure_threshold: u32,
    timeout_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
            failure_threshold,
            timeout_duration: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed() >= self.timeout_duration)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::HalfOpen {
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        inner.failure_count, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            CircuitState::Open => {}
        }
    }

    pub fn get_state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }
}

// --- Gateway API models ---

#[derive(Debug, Serialize)]
struct OrderCreateRequest {
    amount: i64,
    currency: String,
    receipt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OrderCreateResponse {
    id: String,
    #[allow(dead_code)]
    amount: i64,
    #[allow(dead_code)]
    status: String,
}

/// The two gateway operations the booking core depends on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment order for `amount` minor units; returns the
    /// gateway-assigned order id. Transport failures and an open breaker
    /// surface as `GatewayUnavailable` (retryable).
    async fn create_order(
        &self,
        amount: i64,
        receipt: &str,
        description: &str,
    ) -> Result<String, BookingError>;

    /// Check the payment signature for an order. A mismatch is `Ok(false)`,
    /// never an error; errors are reserved for infrastructure failures.
    async fn verify_signature(
        &self,
        payment_id: &str,
        order_id: &str,
        signature: &str,
    ) -> Result<bool, BookingError>;
}

/// HTTP client for the Razorpay-style gateway API.
#[derive(Clone)]
pub struct RazorpayClient {
    key_id: String,
    key_secret: String,
    base_url: String,
    currency: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl RazorpayClient {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            key_id: payment.key_id.clone(),
            key_secret: payment.key_secret.clone(),
            base_url: payment.gateway_url.clone(),
            currency: payment.currency.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
        }
    }

    async fn execute_with_circuit_breaker<F, T>(&self, operation: F) -> Result<T, BookingError>
    where
        F: Future<Output = Result<T, reqwest::Error>>,
    {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment gateway request");
            return Err(BookingError::GatewayUnavailable(
                "circuit breaker is open".to_string(),
            ));
        }

        match operation.await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                error!("Payment gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(BookingError::GatewayUnavailable(e.to_string()))
            }
        }
    }

    /// Signature token over the order/payment pair, keyed by the merchant
    /// secret: `sha256(order_id|payment_id|key_secret)` hex-encoded.
    fn expected_signature(&self, order_id: &str, payment_id: &str) -> String {
        let token_string = format!("{}|{}|{}", order_id, payment_id, self.key_secret);
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn circuit_breaker_state(&self) -> CircuitState {
        self.circuit_breaker.get_state()
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount: i64,
        receipt: &str,
        description: &str,
    ) -> Result<String, BookingError> {
        let request = OrderCreateRequest {
            amount,
            currency: self.currency.clone(),
            receipt: receipt.to_string(),
            notes: Some(serde_json::json!({ "description": description })),
        };

        info!(amount, receipt, "Creating payment order");

        let operation = async {
            self.http_client
                .post(format!("{}/v1/orders", self.base_url))
                .basic_auth(&self.key_id, Some(&self.key_secret))
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<OrderCreateResponse>()
                .await
        };

        let response = self.execute_with_circuit_breaker(operation).await?;
        Ok(response.id)
    }

    async fn verify_signature(
        &self,
        payment_id: &str,
        order_id: &str,
        signature: &str,
    ) -> Result<bool, BookingError> {
        Ok(self.expected_signature(order_id, payment_id) == signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(url: &str, threshold: u32) -> RazorpayClient {
        RazorpayClient::from_config(
            &PaymentConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: "secret".to_string(),
                gateway_url: url.to_string(),
                currency: "INR".to_string(),
                stale_order_minutes: 30,
            },
            &CircuitBreakerConfig {
                failure_threshold: threshold,
                timeout_seconds: 60,
            },
        )
    }

    #[test]
    fn breaker_opens_at_the_threshold_and_half_opens_after_timeout() {
        let breaker = CircuitBreaker::new(2, 0);
        assert!(breaker.can_execute());

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);

        // Zero timeout: the next check probes immediately.
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[test]
    fn failed_probe_reopens_the_breaker() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert!(breaker.can_execute()); // HalfOpen probe
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn create_order_returns_the_gateway_order_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_N1pZ7qK",
                "amount": 50_000,
                "currency": "INR",
                "status": "created",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), 5);
        let order_id = client
            .create_order(50_000, "txn_abc", "Movie: Inception - PVR Phoenix - 1")
            .await
            .unwrap();
        assert_eq!(order_id, "order_N1pZ7qK");
        assert_eq!(client.circuit_breaker_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn gateway_errors_are_retryable_and_trip_the_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), 1);
        let err = client.create_order(100, "txn_x", "d").await.unwrap_err();
        assert!(matches!(err, BookingError::GatewayUnavailable(_)));
        assert_eq!(client.circuit_breaker_state(), CircuitState::Open);

        // Open breaker short-circuits without a network round trip. The
        // mock would answer 500 anyway, so only the error kind matters.
        let err = client.create_order(100, "txn_y", "d").await.unwrap_err();
        assert!(matches!(err, BookingError::GatewayUnavailable(_)));
    }

    #[tokio::test]
    async fn signature_check_accepts_the_expected_token_only() {
        let client = client_for("http://unused", 5);
        let good = client.expected_signature("order_1", "pay_1");

        assert!(client.verify_signature("pay_1", "order_1", &good).await.unwrap());
        assert!(!client.verify_signature("pay_1", "order_1", "forged").await.unwrap());
        // Swapped ids must not verify.
        assert!(!client.verify_signature("order_1", "pay_1", &good).await.unwrap());
    }
}
