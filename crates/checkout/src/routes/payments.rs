//! Gateway return callback.

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Envelope, Result};
use crate::services::SettlementOutcome;
use crate::state::AppState;

/// Query parameters the gateway appends to the return URL.
///
/// `PayerID` and other provider extras are ignored.
#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    pub payment_id: Option<String>,
    pub token: Option<String>,
}

/// Capture and settle an approved payment.
///
/// GET /payment/status?payment_id=&token=
///
/// Replays of an already settled payment answer with the same success
/// envelope.
///
/// # Errors
///
/// Returns 400 for missing or mismatched parameters, 404 for an unknown
/// payment, 502 if the capture did not complete and 500 for local failures.
pub async fn status(
    State(state): State<AppState>,
    Query(callback): Query<PaymentCallback>,
) -> Result<Envelope<Value>> {
    let outcome = state
        .pipeline()
        .settle(callback.payment_id.as_deref(), callback.token.as_deref())
        .await?;

    if let SettlementOutcome::Settled { invoice } = &outcome {
        tracing::debug!(invoice_link = %invoice.invoice_link, "Invoice available");
    }

    Ok(Envelope::new("Payment completed successfully", json!({})))
}
