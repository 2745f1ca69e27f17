//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors are rendered in the
//! same `{"message", "data"}` envelope as successful responses. Server-side
//! failures are captured to Sentry and answered with a generic message so
//! storage details never reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::services::{CheckoutError, SettlementError};

/// JSON envelope shared by every API response.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Application-level error type for the checkout service.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
                CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Settlement(err) => match err {
                SettlementError::MissingPaymentInfo
                | SettlementError::InvalidPaymentId(_)
                | SettlementError::TokenMismatch(_) => StatusCode::BAD_REQUEST,
                SettlementError::PaymentNotFound(_) | SettlementError::OrderNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                SettlementError::PaymentClosed(_) => StatusCode::CONFLICT,
                SettlementError::Gateway(_) => StatusCode::BAD_GATEWAY,
                SettlementError::CustomerNotFound(_)
                | SettlementError::Repository(_)
                | SettlementError::Invoice(_)
                | SettlementError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    // Don't expose internal error details to clients
    fn public_message(&self) -> String {
        match self {
            Self::Checkout(CheckoutError::Gateway(e)) => {
                format!("Failed to initialize payment: {}", e.public_message())
            }
            Self::Settlement(SettlementError::Gateway(e)) => {
                format!("Payment verification failed: {}", e.public_message())
            }
            Self::Settlement(SettlementError::Notification(_)) => {
                "Payment completed but confirmation could not be sent".to_string()
            }
            Self::Checkout(CheckoutError::Validation(e)) => e.to_string(),
            Self::Settlement(
                e @ (SettlementError::MissingPaymentInfo
                | SettlementError::InvalidPaymentId(_)
                | SettlementError::PaymentNotFound(_)
                | SettlementError::OrderNotFound(_)
                | SettlementError::TokenMismatch(_)
                | SettlementError::PaymentClosed(_)),
            ) => e.to_string(),
            Self::BadRequest(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::info!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body: Envelope<Value> = Envelope::new(self.public_message(), json!({}));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RepositoryError;
    use crate::gateway::GatewayError;
    use crate::services::ValidationError;
    use helix_core::PaymentId;

    #[test]
    fn test_validation_is_bad_request_with_reason() {
        let err = AppError::from(CheckoutError::Validation(ValidationError::Quantity));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.public_message(),
            "Invalid quantity: must be a positive integer"
        );
    }

    #[test]
    fn test_storage_errors_are_generic() {
        let err = AppError::from(CheckoutError::Repository(RepositoryError::Conflict(
            "payments_order_active_key".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_gateway_errors_are_bad_gateway() {
        let err = AppError::from(CheckoutError::Gateway(GatewayError::Api {
            status: 500,
            body: "{\"debug_id\":\"f00\"}".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            err.public_message(),
            "Failed to initialize payment: payment gateway returned HTTP 500"
        );

        let err = AppError::from(SettlementError::Gateway(GatewayError::NotCompleted(
            "DECLINED".to_string(),
        )));
        assert_eq!(
            err.public_message(),
            "Payment verification failed: capture status is DECLINED"
        );
    }

    #[test]
    fn test_settlement_status_mapping() {
        let id = PaymentId::new(4);
        assert_eq!(
            AppError::from(SettlementError::MissingPaymentInfo).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(SettlementError::PaymentNotFound(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(SettlementError::PaymentClosed(id)).status(),
            StatusCode::CONFLICT
        );
    }
}
