//! Invoice document generation.
//!
//! Invoices are single-page A4 PDFs rendered with `printpdf`, written to
//! `{public_dir}/invoices/invoice_{payment_id}.pdf` and served statically
//! under `/invoices`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use helix_core::{CurrencyCode, InvoiceNumber, PaymentId};

/// Subdirectory of the public directory holding invoices.
pub const INVOICE_DIR: &str = "invoices";

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_LEFT: Mm = Mm(20.0);
const LINE_SPACING: f32 = 8.0;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("failed to render invoice: {0}")]
    Render(String),

    #[error("failed to write invoice {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Data printed on an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub number: InvoiceNumber,
    pub customer_name: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub issued_on: NaiveDate,
    pub issuer: String,
}

/// A document that has been written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceArtifact {
    /// Absolute or working-directory-relative path of the file.
    pub path: PathBuf,
    /// Path relative to the public directory, e.g. `invoices/invoice_7.pdf`.
    pub link: String,
}

/// Writes invoice documents below a public directory.
#[derive(Debug, Clone)]
pub struct InvoiceGenerator {
    public_dir: PathBuf,
}

impl InvoiceGenerator {
    #[must_use]
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    #[must_use]
    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Relative link for a payment's invoice. Stable for a given payment.
    #[must_use]
    pub fn link_for(payment_id: PaymentId) -> String {
        format!("{INVOICE_DIR}/invoice_{payment_id}.pdf")
    }

    /// Render and store the invoice for `payment_id`.
    ///
    /// Missing directories are created. The file is written under a
    /// temporary name and renamed into place so readers never see a partial
    /// document.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::Render` if the PDF cannot be produced and
    /// `InvoiceError::Io` if the directory or file cannot be written.
    #[instrument(skip(self, document), fields(invoice_number = %document.number))]
    pub async fn generate(
        &self,
        payment_id: PaymentId,
        document: &InvoiceDocument,
    ) -> Result<InvoiceArtifact, InvoiceError> {
        let pdf = render_pdf(document)?;
        let link = Self::link_for(payment_id);
        let path = self.public_dir.join(&link);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| InvoiceError::Io { path, source }
        };

        let dir = self.public_dir.join(INVOICE_DIR);
        tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let staging = path.with_extension("pdf.part");
        tokio::fs::write(&staging, pdf)
            .await
            .map_err(io_err(&staging))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(io_err(&path))?;

        debug!(path = %path.display(), "Wrote invoice");
        Ok(InvoiceArtifact { path, link })
    }

    /// Remove an artifact whose invoice row was never committed.
    pub async fn discard(&self, artifact: &InvoiceArtifact) {
        if let Err(e) = tokio::fs::remove_file(&artifact.path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %artifact.path.display(), error = %e, "Failed to remove orphaned invoice");
        }
    }
}

/// Body lines printed below the heading.
fn invoice_lines(document: &InvoiceDocument) -> [String; 4] {
    [
        format!("Invoice ID: {}", document.number),
        format!("Customer: {}", document.customer_name),
        format!("Amount: {}", document.currency.display(document.amount)),
        format!("Date: {}", document.issued_on.format("%Y-%m-%d")),
    ]
}

/// Render the invoice as a single-page PDF.
///
/// # Errors
///
/// Returns `InvoiceError::Render` if `printpdf` fails to embed a font or
/// serialize the document.
pub fn render_pdf(document: &InvoiceDocument) -> Result<Vec<u8>, InvoiceError> {
    let title = format!("Invoice {}", document.number);
    let (pdf, page, layer) = PdfDocument::new(&title, PAGE_WIDTH, PAGE_HEIGHT, "Invoice");
    let regular = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(render_err)?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(render_err)?;

    let canvas = pdf.get_page(page).get_layer(layer);
    canvas.use_text("Invoice", 16.0, MARGIN_LEFT, Mm(PAGE_HEIGHT.0 - 25.0), &bold);
    canvas.use_text(
        document.issuer.as_str(),
        10.0,
        MARGIN_LEFT,
        Mm(PAGE_HEIGHT.0 - 32.0),
        &regular,
    );

    let mut y = PAGE_HEIGHT.0 - 48.0;
    for line in invoice_lines(document) {
        canvas.use_text(line, 12.0, MARGIN_LEFT, Mm(y), &regular);
        y -= LINE_SPACING;
    }

    pdf.save_to_bytes().map_err(render_err)
}

fn render_err(e: impl std::fmt::Display) -> InvoiceError {
    InvoiceError::Render(e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use helix_core::PaymentId;
    use rust_decimal_macros::dec;

    use super::*;

    fn document() -> InvoiceDocument {
        InvoiceDocument {
            number: InvoiceNumber::for_payment(PaymentId::new(7)),
            customer_name: "Ada Lovelace".to_string(),
            amount: dec!(30),
            currency: CurrencyCode::USD,
            issued_on: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            issuer: "Helix Genomics".to_string(),
        }
    }

    #[test]
    fn test_invoice_lines() {
        assert_eq!(
            invoice_lines(&document()),
            [
                "Invoice ID: INV-00000007",
                "Customer: Ada Lovelace",
                "Amount: $30.00",
                "Date: 2026-10-15",
            ]
        );
    }

    #[test]
    fn test_render_pdf_produces_document() {
        let pdf = render_pdf(&document()).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert!(pdf.windows(5).any(|w| w == b"%%EOF"));
    }

    #[tokio::test]
    async fn test_generate_writes_file_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let generator = InvoiceGenerator::new(dir.path().join("public"));

        let artifact = generator
            .generate(PaymentId::new(7), &document())
            .await
            .unwrap();

        assert_eq!(artifact.link, "invoices/invoice_7.pdf");
        assert_eq!(artifact.path, dir.path().join("public/invoices/invoice_7.pdf"));
        let bytes = tokio::fs::read(&artifact.path).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(!dir.path().join("public/invoices/invoice_7.pdf.part").exists());

        generator.discard(&artifact).await;
        assert!(!artifact.path.exists());
        // Discarding twice is harmless
        generator.discard(&artifact).await;
    }

    #[tokio::test]
    async fn test_generate_fails_when_directory_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir_all(&public).unwrap();
        std::fs::write(public.join(INVOICE_DIR), b"not a directory").unwrap();

        let err = InvoiceGenerator::new(&public)
            .generate(PaymentId::new(1), &document())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::Io { .. }));
    }
}
