//! Application state shared across handlers.

use std::path::{Path, PathBuf};

use crate::db::LedgerStore;
use crate::services::PaymentPipeline;
use crate::services::invoice::INVOICE_DIR;

/// Application state shared across all handlers.
///
/// Cloning is cheap: [`PaymentPipeline`] is itself a shared handle.
#[derive(Clone)]
pub struct AppState {
    pipeline: PaymentPipeline,
}

impl AppState {
    #[must_use]
    pub const fn new(pipeline: PaymentPipeline) -> Self {
        Self { pipeline }
    }

    #[must_use]
    pub const fn pipeline(&self) -> &PaymentPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn store(&self) -> &dyn LedgerStore {
        self.pipeline.store()
    }

    /// Directory served under `/invoices`.
    #[must_use]
    pub fn invoice_dir(&self) -> PathBuf {
        self.public_dir().join(INVOICE_DIR)
    }

    #[must_use]
    pub fn public_dir(&self) -> &Path {
        self.pipeline.invoices().public_dir()
    }
}
