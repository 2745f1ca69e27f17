//! Order placement endpoint.

use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
    http::header,
};
use serde_json::{Map, Value};

use crate::error::{AppError, Envelope, Result};
use crate::services::{OrderRequest, PlacedOrder};
use crate::state::AppState;

const INVALID_BODY: &str = "Invalid request body";

/// Raw order fields from a JSON object or a url-encoded form.
///
/// Form values arrive as strings; JSON values keep their type so quantity
/// normalisation can reject floats and booleans.
#[derive(Debug)]
pub struct OrderFields(pub Map<String, Value>);

impl<S: Send + Sync> FromRequest<S> for OrderFields {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| {
                ct.to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            });

        if is_form {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|_| AppError::BadRequest(INVALID_BODY.to_string()))?;
            Ok(Self(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ))
        } else {
            let Json(fields) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|_| AppError::BadRequest(INVALID_BODY.to_string()))?;
            Ok(Self(fields))
        }
    }
}

/// Create an order and open its payment.
///
/// POST /order-payment
///
/// # Errors
///
/// Returns 400 for invalid fields, 502 if the gateway rejects the intent and
/// 500 if the ledger write fails.
pub async fn create(
    State(state): State<AppState>,
    OrderFields(fields): OrderFields,
) -> Result<Envelope<PlacedOrder>> {
    let request = OrderRequest::from_fields(&fields)
        .map_err(|e| AppError::Checkout(e.into()))?;
    let placed = state.pipeline().place_order(request).await?;

    Ok(Envelope::new("Order created successfully", placed))
}
