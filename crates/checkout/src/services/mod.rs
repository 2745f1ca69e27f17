//! The order-to-payment settlement pipeline.
//!
//! [`PaymentPipeline`] is constructed once with its collaborators and shared
//! by every request handler. It has three entry points:
//!
//! - [`PaymentPipeline::place_order`] validates an order, records the
//!   customer, order and payment, and opens a gateway intent, all in one
//!   ledger transaction.
//! - [`PaymentPipeline::settle`] handles the gateway's return callback:
//!   capture first, then complete the payment and write the invoice in a
//!   second transaction, then notify.
//! - [`PaymentPipeline::reconcile_pending`] repairs payments whose intent was
//!   completed at the gateway but never settled locally.

pub mod checkout;
pub mod email;
pub mod invoice;
pub mod reconcile;
pub mod settlement;
pub mod validation;

use std::sync::Arc;

use url::Url;

use helix_core::{CurrencyCode, Email, PaymentId};

use crate::config::CheckoutConfig;
use crate::db::LedgerStore;
use crate::gateway::PaymentGateway;

pub use checkout::{CheckoutError, PlacedOrder};
pub use email::{Notification, Notifier, NotifyError, SmtpNotifier};
pub use invoice::{InvoiceError, InvoiceGenerator};
pub use reconcile::ReconcileReport;
pub use settlement::{SettlementError, SettlementOutcome};
pub use validation::{OrderRequest, ValidationError};

/// Addresses and branding the pipeline needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Public base URL of this service; gateway return URLs and invoice
    /// links are built from it.
    pub api_url: Url,
    /// Base URL of the storefront the customer returns to on cancel.
    pub app_url: Url,
    /// Receives a copy of every settled order when set.
    pub operator_email: Option<Email>,
    pub currency: CurrencyCode,
    pub brand_name: String,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &CheckoutConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            app_url: config.app_url.clone(),
            operator_email: config.operator_email.clone(),
            currency: config.gateway.currency,
            brand_name: config.gateway.brand_name.clone(),
        }
    }

    /// Where the gateway sends the customer after approving a payment.
    #[must_use]
    pub fn return_url(&self, payment_id: PaymentId) -> String {
        format!(
            "{}/payment/status?payment_id={payment_id}",
            base(&self.api_url)
        )
    }

    /// Where the gateway sends the customer after abandoning a payment.
    #[must_use]
    pub fn cancel_url(&self, payment_id: PaymentId) -> String {
        format!(
            "{}/payment/cancel?payment_id={payment_id}",
            base(&self.app_url)
        )
    }

    /// Absolute URL for a relative invoice link.
    #[must_use]
    pub fn invoice_url(&self, link: &str) -> String {
        format!("{}/{}", base(&self.api_url), link.trim_start_matches('/'))
    }
}

fn base(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}

/// Shared handle to the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct PaymentPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    invoices: InvoiceGenerator,
    settings: PipelineSettings,
}

impl PaymentPipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        invoices: InvoiceGenerator,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                store,
                gateway,
                notifier,
                invoices,
                settings,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn LedgerStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    #[must_use]
    pub fn notifier(&self) -> &dyn Notifier {
        self.inner.notifier.as_ref()
    }

    #[must_use]
    pub fn invoices(&self) -> &InvoiceGenerator {
        &self.inner.invoices
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            api_url: Url::parse("https://api.helix.example/").expect("valid url"),
            app_url: Url::parse("https://shop.helix.example").expect("valid url"),
            operator_email: None,
            currency: CurrencyCode::USD,
            brand_name: "Helix Genomics".to_string(),
        }
    }

    #[test]
    fn test_callback_urls() {
        let settings = settings();
        assert_eq!(
            settings.return_url(PaymentId::new(12)),
            "https://api.helix.example/payment/status?payment_id=12"
        );
        assert_eq!(
            settings.cancel_url(PaymentId::new(12)),
            "https://shop.helix.example/payment/cancel?payment_id=12"
        );
    }

    #[test]
    fn test_invoice_url_joins_relative_link() {
        assert_eq!(
            settings().invoice_url("invoices/invoice_12.pdf"),
            "https://api.helix.example/invoices/invoice_12.pdf"
        );
    }
}
