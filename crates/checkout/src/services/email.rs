//! Settlement notifications.
//!
//! Messages are rendered with Askama HTML templates and handed to a
//! [`Notifier`]. Production delivery goes over SMTP via lettre.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;
use thiserror::Error;

use helix_core::{CurrencyCode, Email, InvoiceNumber};

pub use lettre::transport::smtp::Error as SmtpError;

use crate::config::EmailConfig;
use crate::models::{Customer, Order};

pub const ORDER_CONFIRMATION_SUBJECT: &str = "Order Confirmation";
pub const OPERATOR_ORDER_SUBJECT: &str = "New Order Received";

/// HTML template for the customer's order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    customer_name: &'a str,
    order_id: i32,
    product_name: &'a str,
    quantity: i32,
    total: &'a str,
    invoice_number: &'a str,
    invoice_url: &'a str,
    brand_name: &'a str,
}

/// HTML template for the operator's new-order notice.
#[derive(Template)]
#[template(path = "email/operator_order.html")]
struct OperatorOrderHtml<'a> {
    customer_name: &'a str,
    customer_email: &'a str,
    order_id: i32,
    product_name: &'a str,
    quantity: i32,
    total: &'a str,
    invoice_number: &'a str,
    invoice_url: &'a str,
}

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<Email>,
    pub subject: String,
    pub html_body: String,
}

/// Delivers notifications. There is no delivery-status callback.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// What a settled order looks like to the notification templates.
#[derive(Debug, Clone, Copy)]
pub struct SettledOrder<'a> {
    pub customer: &'a Customer,
    pub order: &'a Order,
    pub invoice_number: &'a InvoiceNumber,
    /// Absolute URL of the invoice artifact.
    pub invoice_url: &'a str,
    pub currency: CurrencyCode,
}

impl SettledOrder<'_> {
    fn total(&self) -> String {
        self.currency.display(self.order.total_price)
    }
}

/// Render the confirmation sent to the paying customer.
///
/// # Errors
///
/// Returns error if the template fails to render.
pub fn order_confirmation(
    settled: &SettledOrder<'_>,
    brand_name: &str,
) -> Result<Notification, NotifyError> {
    let customer_name = settled.customer.full_name();
    let total = settled.total();
    let html_body = OrderConfirmationHtml {
        customer_name: &customer_name,
        order_id: settled.order.id.as_i32(),
        product_name: &settled.order.product_name,
        quantity: settled.order.quantity,
        total: &total,
        invoice_number: settled.invoice_number.as_str(),
        invoice_url: settled.invoice_url,
        brand_name,
    }
    .render()?;

    Ok(Notification {
        recipients: vec![settled.customer.email.clone()],
        subject: ORDER_CONFIRMATION_SUBJECT.to_string(),
        html_body,
    })
}

/// Render the notice sent to the shop operator.
///
/// # Errors
///
/// Returns error if the template fails to render.
pub fn operator_order(
    settled: &SettledOrder<'_>,
    operator: &Email,
) -> Result<Notification, NotifyError> {
    let customer_name = settled.customer.full_name();
    let total = settled.total();
    let html_body = OperatorOrderHtml {
        customer_name: &customer_name,
        customer_email: settled.customer.email.as_str(),
        order_id: settled.order.id.as_i32(),
        product_name: &settled.order.product_name,
        quantity: settled.order.quantity,
        total: &total,
        invoice_number: settled.invoice_number.as_str(),
        invoice_url: settled.invoice_url,
    }
    .render()?;

    Ok(Notification {
        recipients: vec![operator.clone()],
        subject: OPERATOR_ORDER_SUBJECT.to_string(),
        html_body,
    })
}

/// SMTP delivery over a STARTTLS relay.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotifier {
    /// Create a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(
                self.from_address
                    .parse::<Mailbox>()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .subject(&notification.subject)
            .header(ContentType::TEXT_HTML);

        for recipient in &notification.recipients {
            let mailbox = recipient
                .as_str()
                .parse::<Mailbox>()
                .map_err(|_| NotifyError::InvalidAddress(recipient.to_string()))?;
            builder = builder.to(mailbox);
        }

        Ok(builder.body(notification.html_body.clone())?)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(notification)?;
        self.mailer.send(message).await?;

        tracing::info!(
            recipients = notification.recipients.len(),
            subject = %notification.subject,
            "Email sent successfully"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use helix_core::{CustomerId, OrderId, OrderStatus, PaymentId, PaymentStatus};
    use rust_decimal_macros::dec;
    use secrecy::SecretString;

    fn customer() -> Customer {
        Customer {
            id: CustomerId::new(7),
            first_name: "Ada".to_string(),
            last_name: Some("Lovelace".to_string()),
            email: Email::parse("ada@example.com").expect("valid email"),
            phone_number: "5551234567".to_string(),
            country: "England".to_string(),
            street_address: "12 St James's Square".to_string(),
            town_city: "London".to_string(),
            region: None,
            postcode: None,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    fn order() -> Order {
        Order {
            id: OrderId::new(3),
            customer_id: CustomerId::new(7),
            product_name: "Widget <Deluxe>".to_string(),
            product_description: None,
            product_image: None,
            unit_price: dec!(10.00),
            quantity: 3,
            total_price: dec!(30.00),
            payment_status: PaymentStatus::Completed,
            order_status: OrderStatus::Processing,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_confirmation_renders_details() {
        let customer = customer();
        let order = order();
        let number = InvoiceNumber::for_payment(PaymentId::new(5));
        let settled = SettledOrder {
            customer: &customer,
            order: &order,
            invoice_number: &number,
            invoice_url: "https://api.example.com/invoices/invoice_5.pdf",
            currency: CurrencyCode::USD,
        };

        let notification = order_confirmation(&settled, "Helix Genomics").expect("renders");
        assert_eq!(notification.subject, ORDER_CONFIRMATION_SUBJECT);
        assert_eq!(notification.recipients, vec![customer.email.clone()]);
        assert!(notification.html_body.contains("Ada Lovelace"));
        assert!(notification.html_body.contains("$30.00"));
        assert!(notification.html_body.contains("INV-00000005"));
        assert!(
            notification
                .html_body
                .contains("https://api.example.com/invoices/invoice_5.pdf")
        );
        assert!(!notification.html_body.contains("<Deluxe>"));
    }

    #[test]
    fn test_operator_order_includes_customer_email() {
        let customer = customer();
        let order = order();
        let number = InvoiceNumber::for_payment(PaymentId::new(5));
        let settled = SettledOrder {
            customer: &customer,
            order: &order,
            invoice_number: &number,
            invoice_url: "https://api.example.com/invoices/invoice_5.pdf",
            currency: CurrencyCode::USD,
        };
        let operator = Email::parse("orders@helix.example").expect("valid email");

        let notification = operator_order(&settled, &operator).expect("renders");
        assert_eq!(notification.subject, OPERATOR_ORDER_SUBJECT);
        assert_eq!(notification.recipients, vec![operator]);
        assert!(notification.html_body.contains("ada@example.com"));
        assert!(notification.html_body.contains("New order #3 has been paid"));
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_sender() {
        let notifier = SmtpNotifier::new(&EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("x"),
            from_address: "not an address".to_string(),
        })
        .expect("relay config");

        let notification = Notification {
            recipients: vec![Email::parse("ada@example.com").expect("valid email")],
            subject: "Hello".to_string(),
            html_body: "<p>Hi</p>".to_string(),
        };
        assert!(matches!(
            notifier.build_message(&notification),
            Err(NotifyError::InvalidAddress(_))
        ));
    }
}
