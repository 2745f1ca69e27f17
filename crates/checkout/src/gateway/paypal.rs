//! `PayPal` Orders v2 REST client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use helix_core::format_amount;

use super::{
    AccessToken, Capture, GatewayError, IntentRequest, PaymentGateway, PaymentIntent,
    STATUS_COMPLETED,
};
use crate::config::GatewayConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error bodies longer than this are cut before they reach logs.
const MAX_ERROR_BODY: usize = 2048;

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// `PayPal` REST client.
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct PayPalClient {
    client: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
}

impl std::fmt::Debug for PayPalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalClient")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl PayPalClient {
    /// Create a client for the given REST base URL.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn new(
        base_url: Url,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            client_id: client_id.into(),
            client_secret,
        })
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.api_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Read a response body, mapping non-2xx statuses to `GatewayError::Api`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    let mut body = response.text().await?;

    if !status.is_success() {
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        warn!(status = status.as_u16(), body = %body, "Gateway request rejected");
        return Err(GatewayError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Build the Orders v2 create payload for an intent.
fn intent_payload(request: &IntentRequest) -> Value {
    let currency = request.currency.code();
    let item = &request.item;

    let mut payer = json!({
        "email_address": request.payer.email.as_str(),
        "name": { "given_name": request.payer.given_name },
    });
    if let Some(surname) = request.payer.surname.as_deref().filter(|s| !s.is_empty()) {
        payer["name"]["surname"] = json!(surname);
    }

    json!({
        "intent": "CAPTURE",
        "application_context": {
            "return_url": request.return_url,
            "cancel_url": request.cancel_url,
            "brand_name": request.brand_name,
            "shipping_preference": "NO_SHIPPING",
            "user_action": "PAY_NOW",
        },
        "payer": payer,
        "purchase_units": [{
            "reference_id": request.payment_id.to_string(),
            "description": format!("Order #{}", request.order_id),
            "custom_id": format!("ORDER_{}", request.order_id),
            "amount": {
                "currency_code": currency,
                "value": format_amount(request.amount),
                "breakdown": {
                    "item_total": {
                        "currency_code": currency,
                        "value": format_amount(request.amount),
                    },
                },
            },
            "items": [{
                "name": item.name,
                "description": item.description.clone().unwrap_or_default(),
                "quantity": item.quantity.to_string(),
                "unit_amount": {
                    "currency_code": currency,
                    "value": format_amount(item.unit_amount),
                },
            }],
        }],
    })
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    async fn access_token(&self) -> Result<AccessToken, GatewayError> {
        let response = self
            .client
            .post(self.endpoint(&["v1", "oauth2", "token"])?)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let token: TokenResponse = read_json(response).await?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(|t| AccessToken::new(SecretString::from(t)))
            .ok_or(GatewayError::MissingAccessToken)
    }

    #[instrument(
        skip(self, token, request),
        fields(payment_id = %request.payment_id, order_id = %request.order_id)
    )]
    async fn open_intent(
        &self,
        token: &AccessToken,
        request: &IntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let response = self
            .client
            .post(self.endpoint(&["v2", "checkout", "orders"])?)
            .bearer_auth(token.secret().expose_secret())
            .json(&intent_payload(request))
            .send()
            .await?;

        let intent: PaymentIntent = read_json(response).await?;
        debug!(intent_id = %intent.id, status = %intent.status, "Opened payment intent");
        Ok(intent)
    }

    #[instrument(skip(self, token))]
    async fn capture_intent(
        &self,
        token: &AccessToken,
        intent_id: &str,
    ) -> Result<Capture, GatewayError> {
        let response = self
            .client
            .post(self.endpoint(&["v2", "checkout", "orders", intent_id, "capture"])?)
            .bearer_auth(token.secret().expose_secret())
            .header("Prefer", "return=representation")
            .json(&json!({}))
            .send()
            .await?;

        let capture: Capture = read_json(response).await?;
        if capture.status != STATUS_COMPLETED {
            warn!(status = %capture.status, "Capture did not complete");
            return Err(GatewayError::NotCompleted(capture.status));
        }

        debug!(capture_id = %capture.id, "Captured payment intent");
        Ok(capture)
    }

    #[instrument(skip(self, token))]
    async fn intent_status(
        &self,
        token: &AccessToken,
        intent_id: &str,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(self.endpoint(&["v2", "checkout", "orders", intent_id])?)
            .bearer_auth(token.secret().expose_secret())
            .send()
            .await?;

        let intent: PaymentIntent = read_json(response).await?;
        Ok(intent.status)
    }
}
