//! Payment gateway integration.
//!
//! The pipeline only sees [`PaymentGateway`]; [`PayPalClient`] implements it
//! against the `PayPal` Orders v2 REST API. Calls are never retried here:
//! a repeated capture must come from the caller replaying the callback.

pub mod paypal;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use helix_core::{CurrencyCode, Email, OrderId, PaymentId};

pub use paypal::PayPalClient;

/// Provider status of an intent whose funds have been collected.
pub const STATUS_COMPLETED: &str = "COMPLETED";

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("gateway base URL cannot hold a path: {0}")]
    InvalidBaseUrl(String),

    #[error("token response carried no access token")]
    MissingAccessToken,

    #[error("intent {0} has no approval link")]
    MissingApprovalLink(String),

    /// Capture succeeded at the HTTP level but funds were not collected.
    #[error("capture status is {0}")]
    NotCompleted(String),
}

impl GatewayError {
    /// Description safe to return to API clients.
    ///
    /// Response bodies and transport details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Http(e) if e.is_timeout() => "payment gateway timed out".to_string(),
            Self::Http(_) => "payment gateway unreachable".to_string(),
            Self::Api { status, .. } => format!("payment gateway returned HTTP {status}"),
            Self::Parse(_) => "unexpected payment gateway response".to_string(),
            Self::InvalidBaseUrl(_) => "payment gateway misconfigured".to_string(),
            Self::MissingAccessToken => "payment gateway authentication failed".to_string(),
            Self::MissingApprovalLink(_) => "payment gateway returned no approval link".to_string(),
            Self::NotCompleted(status) => format!("capture status is {status}"),
        }
    }
}

/// Short-lived bearer credential from the client-credentials exchange.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    #[must_use]
    pub const fn new(token: SecretString) -> Self {
        Self(token)
    }

    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Everything the gateway needs to open an intent for one order.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub currency: CurrencyCode,
    /// Total to collect; equals `item.unit_amount * item.quantity`.
    pub amount: Decimal,
    pub item: IntentItem,
    pub payer: Payer,
    pub return_url: String,
    pub cancel_url: String,
    pub brand_name: String,
}

#[derive(Debug, Clone)]
pub struct IntentItem {
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct Payer {
    pub email: Email,
    pub given_name: String,
    pub surname: Option<String>,
}

/// HATEOAS link returned with an intent.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentLink {
    pub href: String,
    pub rel: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// A remote intent as created by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub links: Vec<IntentLink>,
}

impl PaymentIntent {
    /// The link the customer must visit to authorize the payment.
    #[must_use]
    pub fn approval_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href.as_str())
    }
}

/// Outcome of a completed capture.
#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Exchange client credentials for an access token.
    async fn access_token(&self) -> Result<AccessToken, GatewayError>;

    /// Open a remote intent sized to the order total.
    async fn open_intent(
        &self,
        token: &AccessToken,
        request: &IntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Capture a customer-approved intent.
    ///
    /// Only returns `Ok` when the provider reports [`STATUS_COMPLETED`].
    async fn capture_intent(
        &self,
        token: &AccessToken,
        intent_id: &str,
    ) -> Result<Capture, GatewayError>;

    /// Read the provider's current status for an intent without changing it.
    async fn intent_status(
        &self,
        token: &AccessToken,
        intent_id: &str,
    ) -> Result<String, GatewayError>;
}
