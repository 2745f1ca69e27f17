//! Repair of payments captured at the gateway but never settled locally.
//!
//! If the settlement callback never arrives, or its ledger write fails after
//! the capture succeeded, the payment stays `Pending` while the provider
//! holds the funds. Reconciliation asks the provider for the intent status of
//! old pending payments and settles the ones it reports `COMPLETED`. It never
//! captures and never marks anything `Failed`.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::PaymentPipeline;
use super::settlement::SettlementError;
use crate::gateway::STATUS_COMPLETED;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pending payments older than the cut-off.
    pub examined: usize,
    /// Settled locally by this pass.
    pub settled: usize,
    /// Settled by a concurrent callback while this pass ran.
    pub already_settled: usize,
    /// The provider has not completed the intent yet.
    pub still_pending: usize,
    /// Status lookup or local settlement failed; retried on the next pass.
    pub errors: usize,
}

impl PaymentPipeline {
    /// Settle pending payments whose gateway intent has completed.
    ///
    /// Only payments created more than `older_than` ago are examined, which
    /// keeps the pass away from checkouts the customer is still approving.
    ///
    /// # Errors
    ///
    /// Returns an error if pending payments cannot be listed or no access
    /// token can be obtained. Per-payment failures are logged and counted.
    #[instrument(skip(self), fields(older_than_minutes = older_than.num_minutes()))]
    pub async fn reconcile_pending(
        &self,
        older_than: Duration,
    ) -> Result<ReconcileReport, SettlementError> {
        let pending = self
            .store()
            .pending_payments(Utc::now() - older_than)
            .await?;

        let mut report = ReconcileReport {
            examined: pending.len(),
            ..ReconcileReport::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let token = self.gateway().access_token().await?;

        for payment in pending {
            let status = match self
                .gateway()
                .intent_status(&token, &payment.transaction_id)
                .await
            {
                Ok(status) => status,
                Err(e) => {
                    warn!(payment_id = %payment.id, error = %e, "Failed to read intent status");
                    report.errors += 1;
                    continue;
                }
            };

            if status != STATUS_COMPLETED {
                debug!(payment_id = %payment.id, status = %status, "Intent not completed");
                report.still_pending += 1;
                continue;
            }

            match self.finalize(payment.id).await {
                Ok(Some(settled)) => {
                    report.settled += 1;
                    if let Err(e) = self.notify(&settled).await {
                        warn!(payment_id = %payment.id, error = %e, "Settled without notification");
                    }
                }
                Ok(None) => report.already_settled += 1,
                Err(e) => {
                    error!(payment_id = %payment.id, error = %e, "Failed to settle completed intent");
                    report.errors += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            settled = report.settled,
            still_pending = report.still_pending,
            errors = report.errors,
            "Reconciliation finished"
        );
        Ok(report)
    }
}
