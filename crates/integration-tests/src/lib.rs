//! End-to-end tests for the Helix checkout pipeline.
//!
//! Every test builds a [`TestContext`]: the real axum router and
//! [`PaymentPipeline`] wired to an in-memory ledger, a mockito server standing
//! in for `PayPal`, a notifier that records instead of sending, and a
//! temporary directory for invoices. No database or network is needed.
//!
//! ```bash
//! cargo test -p helix-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use mockito::{Mock, ServerGuard};
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use helix_checkout::db::MemoryLedger;
use helix_checkout::gateway::PayPalClient;
use helix_checkout::services::{
    InvoiceGenerator, Notification, Notifier, NotifyError, PaymentPipeline, PipelineSettings,
};
use helix_checkout::state::AppState;
use helix_core::{CurrencyCode, Email};

pub const API_URL: &str = "https://api.helix.test";
pub const APP_URL: &str = "https://shop.helix.test";
pub const INTENT_ID: &str = "5O190127TN364715T";

/// Notifier that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier lock").clone()
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::InvalidAddress("relay unavailable".to_string()));
        }
        self.sent
            .lock()
            .expect("notifier lock")
            .push(notification.clone());
        Ok(())
    }
}

/// A fully wired checkout service with fake collaborators.
pub struct TestContext {
    pub ledger: MemoryLedger,
    pub paypal: ServerGuard,
    pub notifier: Arc<RecordingNotifier>,
    pub public_dir: TempDir,
    pub pipeline: PaymentPipeline,
    pub app: Router,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Context whose settlements also notify `operator`.
    pub async fn with_operator(operator: &str) -> Self {
        Self::build(Some(Email::parse(operator).expect("valid operator email"))).await
    }

    async fn build(operator_email: Option<Email>) -> Self {
        let ledger = MemoryLedger::new();
        let paypal = mockito::Server::new_async().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let public_dir = tempfile::tempdir().expect("temp dir");

        let gateway = PayPalClient::new(
            Url::parse(&paypal.url()).expect("mock server url"),
            "client-id",
            SecretString::from("client-secret"),
        )
        .expect("gateway client");

        let settings = PipelineSettings {
            api_url: Url::parse(API_URL).expect("api url"),
            app_url: Url::parse(APP_URL).expect("app url"),
            operator_email,
            currency: CurrencyCode::USD,
            brand_name: "Helix Genomics".to_string(),
        };

        let pipeline = PaymentPipeline::new(
            Arc::new(ledger.clone()),
            Arc::new(gateway),
            notifier.clone(),
            InvoiceGenerator::new(public_dir.path()),
            settings,
        );
        let app = helix_checkout::app(AppState::new(pipeline.clone()), &[APP_URL.to_string()]);

        Self {
            ledger,
            paypal,
            notifier,
            public_dir,
            pipeline,
            app,
        }
    }

    /// `PayPal` OAuth token endpoint; answers any number of calls.
    pub async fn mock_token(&mut self) -> Mock {
        self.paypal
            .mock("POST", "/v1/oauth2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": "A21AAF-test-token",
                    "token_type": "Bearer",
                    "expires_in": 32400,
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    /// Intent creation returning [`INTENT_ID`] with an approval link.
    pub async fn mock_open_intent(&mut self) -> Mock {
        self.paypal
            .mock("POST", "/v2/checkout/orders")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": INTENT_ID,
                    "status": "CREATED",
                    "links": [
                        {"href": format!("https://api.paypal.test/v2/checkout/orders/{INTENT_ID}"), "rel": "self", "method": "GET"},
                        {"href": format!("https://www.paypal.test/checkoutnow?token={INTENT_ID}"), "rel": "approve", "method": "GET"},
                    ],
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    /// Intent creation failing with `status`.
    pub async fn mock_open_intent_error(&mut self, status: usize) -> Mock {
        self.paypal
            .mock("POST", "/v2/checkout/orders")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"INTERNAL_SERVER_ERROR","debug_id":"90957fca61718"}"#)
            .create_async()
            .await
    }

    /// Capture of [`INTENT_ID`] reporting `status`, expected `hits` times.
    pub async fn mock_capture(&mut self, status: &str, hits: usize) -> Mock {
        self.paypal
            .mock("POST", format!("/v2/checkout/orders/{INTENT_ID}/capture").as_str())
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(json!({"id": INTENT_ID, "status": status}).to_string())
            .expect(hits)
            .create_async()
            .await
    }

    /// Read-only intent lookup reporting `status`.
    pub async fn mock_intent_status(&mut self, status: &str) -> Mock {
        self.paypal
            .mock("GET", format!("/v2/checkout/orders/{INTENT_ID}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"id": INTENT_ID, "status": status, "links": []}).to_string())
            .create_async()
            .await
    }

    /// POST a JSON order and return the status and decoded envelope.
    pub async fn post_order(&self, body: &Value) -> (StatusCode, Value) {
        self.send(
            Request::post("/order-payment")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    /// POST a url-encoded order form.
    pub async fn post_order_form(&self, form: &str) -> (StatusCode, Value) {
        self.send(
            Request::post("/order-payment")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .expect("request"),
        )
        .await
    }

    /// Hit the gateway return callback.
    pub async fn callback(&self, query: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(format!("/payment/status?{query}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    /// Place the standard order and return `(order_id, payment_id)`.
    pub async fn place_widget_order(&mut self, email: &str) -> (i64, i64) {
        let (status, body) = self.post_order(&widget_order(email)).await;
        assert_eq!(status, StatusCode::OK, "order failed: {body}");
        (
            body["data"]["order_id"].as_i64().expect("order id"),
            body["data"]["payment_id"].as_i64().expect("payment id"),
        )
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(request).await;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        (status, bytes.to_vec())
    }
}

/// Order for three units of "Widget" at 10.00.
pub fn widget_order(email: &str) -> Value {
    json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": email,
        "phone_number": "5551234567",
        "country": "England",
        "street_address": "12 St James Square",
        "town_city": "London",
        "region": "Greater London",
        "postcode": "SW1Y 4LE",
        "product_name": "Widget",
        "product_description": "Saliva collection kit",
        "product_price": "10.00",
        "quantity": 3
    })
}
