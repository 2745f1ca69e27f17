//! Settlement of an approved payment.
//!
//! The gateway capture is the irrevocable step and runs first, outside any
//! ledger transaction. Only once the provider reports the capture completed
//! does a second transaction mark the payment and order complete and record
//! the invoice. Notifications go out after that transaction commits.
//!
//! A callback may be replayed. A payment that is already `Completed` is
//! answered without touching the gateway, and a capture that races another
//! callback for the same payment loses at the row lock and rolls back.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use helix_core::{InvoiceNumber, OrderStatus, PaymentId, PaymentStatus};

use super::PaymentPipeline;
use super::email::{self, NotifyError, SettledOrder};
use super::invoice::{InvoiceArtifact, InvoiceDocument, InvoiceError};
use crate::db::{LedgerTx, RepositoryError};
use crate::gateway::GatewayError;
use crate::models::{Customer, Invoice, NewInvoice, Order};

/// Errors that can occur while settling a payment.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Missing payment information")]
    MissingPaymentInfo,

    #[error("Invalid payment id: {0}")]
    InvalidPaymentId(String),

    #[error("payment not found")]
    PaymentNotFound(PaymentId),

    #[error("order not found for payment {0}")]
    OrderNotFound(PaymentId),

    #[error("customer not found for payment {0}")]
    CustomerNotFound(PaymentId),

    /// The callback token is not the intent recorded for this payment.
    #[error("token does not match payment {0}")]
    TokenMismatch(PaymentId),

    #[error("payment {0} is closed")]
    PaymentClosed(PaymentId),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invoice error: {0}")]
    Invoice(#[from] InvoiceError),

    /// The settlement committed but a notification could not be sent.
    #[error("Notification error: {0}")]
    Notification(#[from] NotifyError),
}

/// Result of a successful settlement callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call captured the payment and wrote its invoice.
    Settled { invoice: Invoice },
    /// The payment had already been settled by an earlier call.
    AlreadySettled,
}

/// Everything a committed settlement produced.
#[derive(Debug, Clone)]
pub(crate) struct Settled {
    pub customer: Customer,
    pub order: Order,
    pub invoice: Invoice,
    pub artifact: InvoiceArtifact,
}

impl PaymentPipeline {
    /// Settle a payment the customer approved at the gateway.
    ///
    /// # Errors
    ///
    /// Parameter and lookup failures return before the gateway is called.
    /// A capture the provider does not report `COMPLETED` returns
    /// `SettlementError::Gateway` and leaves the payment `Pending`. A
    /// `SettlementError::Notification` means the settlement itself
    /// committed.
    #[instrument(skip(self, token), fields(payment_id = payment_id.unwrap_or_default()))]
    pub async fn settle(
        &self,
        payment_id: Option<&str>,
        token: Option<&str>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let (raw_id, token) = match (non_blank(payment_id), non_blank(token)) {
            (Some(id), Some(token)) => (id, token),
            _ => return Err(SettlementError::MissingPaymentInfo),
        };
        let payment_id: PaymentId = raw_id
            .parse()
            .map_err(|_| SettlementError::InvalidPaymentId(raw_id.to_string()))?;

        let payment = self
            .store()
            .get_payment(payment_id)
            .await?
            .ok_or(SettlementError::PaymentNotFound(payment_id))?;

        match payment.payment_status {
            PaymentStatus::Completed => {
                if self
                    .store()
                    .get_invoice_for_payment(payment_id)
                    .await?
                    .is_none()
                {
                    return Err(RepositoryError::DataCorruption(format!(
                        "payment {payment_id} is completed without an invoice"
                    ))
                    .into());
                }
                info!("Payment already settled; skipping capture");
                return Ok(SettlementOutcome::AlreadySettled);
            }
            PaymentStatus::Failed => return Err(SettlementError::PaymentClosed(payment_id)),
            PaymentStatus::Pending => {}
        }

        if payment.transaction_id != token {
            warn!("Callback token does not match recorded intent");
            return Err(SettlementError::TokenMismatch(payment_id));
        }

        let access = self.gateway().access_token().await?;
        let capture = self
            .gateway()
            .capture_intent(&access, &payment.transaction_id)
            .await?;
        info!(capture_id = %capture.id, "Payment captured");

        let Some(settled) = self.finalize(payment_id).await? else {
            info!("Payment settled by a concurrent callback");
            return Ok(SettlementOutcome::AlreadySettled);
        };

        self.notify(&settled).await?;

        Ok(SettlementOutcome::Settled {
            invoice: settled.invoice,
        })
    }

    /// Mark a captured payment complete and record its invoice.
    ///
    /// Returns `None` if the payment was already completed when the row lock
    /// was taken.
    pub(crate) async fn finalize(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Settled>, SettlementError> {
        let mut tx = self.store().begin().await?;
        let result = self.finalize_in(tx.as_mut(), payment_id).await;

        match result {
            Ok(Some(settled)) => {
                if let Err(e) = tx.commit().await {
                    self.invoices().discard(&settled.artifact).await;
                    return Err(e.into());
                }
                info!(
                    payment_id = %payment_id,
                    invoice_number = %settled.invoice.invoice_number,
                    "Payment settled"
                );
                Ok(Some(settled))
            }
            Ok(None) => {
                tx.rollback().await?;
                Ok(None)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back settlement");
                }
                Err(e)
            }
        }
    }

    async fn finalize_in(
        &self,
        tx: &mut dyn LedgerTx,
        payment_id: PaymentId,
    ) -> Result<Option<Settled>, SettlementError> {
        let payment = tx
            .get_payment(payment_id)
            .await?
            .ok_or(SettlementError::PaymentNotFound(payment_id))?;
        match payment.payment_status {
            PaymentStatus::Completed => return Ok(None),
            PaymentStatus::Failed => return Err(SettlementError::PaymentClosed(payment_id)),
            PaymentStatus::Pending => {}
        }

        tx.set_payment_status(payment_id, PaymentStatus::Completed)
            .await?;

        let order = tx
            .get_order(payment.order_id)
            .await?
            .ok_or(SettlementError::OrderNotFound(payment_id))?;
        tx.set_order_status(order.id, PaymentStatus::Completed, OrderStatus::Processing)
            .await?;

        let customer = tx
            .get_customer(order.customer_id)
            .await?
            .ok_or(SettlementError::CustomerNotFound(payment_id))?;

        let settings = self.settings();
        let invoice_number = InvoiceNumber::for_payment(payment_id);
        let document = InvoiceDocument {
            number: invoice_number.clone(),
            customer_name: customer.full_name(),
            amount: payment.amount,
            currency: settings.currency,
            issued_on: Utc::now().date_naive(),
            issuer: settings.brand_name.clone(),
        };
        let artifact = self.invoices().generate(payment_id, &document).await?;

        let new_invoice = NewInvoice {
            payment_id,
            invoice_number,
            price: payment.amount,
            invoice_link: artifact.link.clone(),
        };
        let invoice = match tx.insert_invoice(&new_invoice).await {
            Ok(invoice) => invoice,
            Err(e) => {
                self.invoices().discard(&artifact).await;
                return Err(e.into());
            }
        };

        Ok(Some(Settled {
            customer,
            order: Order {
                payment_status: PaymentStatus::Completed,
                order_status: OrderStatus::Processing,
                ..order
            },
            invoice,
            artifact,
        }))
    }

    /// Send the customer confirmation and, when configured, the operator
    /// copy. Both are attempted; the first failure is returned.
    pub(crate) async fn notify(&self, settled: &Settled) -> Result<(), NotifyError> {
        let settings = self.settings();
        let invoice_url = settings.invoice_url(&settled.invoice.invoice_link);
        let view = SettledOrder {
            customer: &settled.customer,
            order: &settled.order,
            invoice_number: &settled.invoice.invoice_number,
            invoice_url: &invoice_url,
            currency: settings.currency,
        };

        let mut outgoing = vec![email::order_confirmation(&view, &settings.brand_name)?];
        if let Some(operator) = &settings.operator_email {
            outgoing.push(email::operator_order(&view, operator)?);
        }

        let mut first_error = None;
        for notification in &outgoing {
            if let Err(e) = self.notifier().send(notification).await {
                warn!(
                    error = %e,
                    subject = %notification.subject,
                    "Failed to send notification"
                );
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
