//! Order placement: assemble the order and open its payment intent.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use helix_core::{OrderId, PaymentId};

use super::PaymentPipeline;
use super::validation::{OrderRequest, ValidatedOrder, ValidationError};
use crate::db::{LedgerTx, RepositoryError};
use crate::gateway::{GatewayError, IntentItem, IntentRequest, Payer};
use crate::models::{Customer, Order, Payment};

/// Errors that can occur while placing an order.
///
/// Every variant leaves the ledger untouched.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// A committed order awaiting customer approval at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    /// Gateway approval link the customer must visit.
    pub payment_url: String,
}

impl PaymentPipeline {
    /// Validate an order and open its payment intent.
    ///
    /// Customer, order and payment rows are written in one transaction that
    /// only commits once the gateway has returned an intent with an approval
    /// link. A gateway failure rolls all three back.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for a rejected field,
    /// `CheckoutError::Gateway` if the intent could not be opened, and
    /// `CheckoutError::Repository` if the ledger write failed.
    #[instrument(skip(self, request))]
    pub async fn place_order(&self, request: OrderRequest) -> Result<PlacedOrder, CheckoutError> {
        let order = request.validate()?;

        let mut tx = self.store().begin().await?;
        let result = self.assemble_and_initiate(tx.as_mut(), &order).await;
        match result {
            Ok(placed) => {
                tx.commit().await?;
                info!(
                    order_id = %placed.order_id,
                    payment_id = %placed.payment_id,
                    "Order placed"
                );
                Ok(placed)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back order placement");
                }
                Err(e)
            }
        }
    }

    async fn assemble_and_initiate(
        &self,
        tx: &mut dyn LedgerTx,
        request: &ValidatedOrder,
    ) -> Result<PlacedOrder, CheckoutError> {
        let customer = match tx.find_customer_by_email(&request.customer.email).await? {
            Some(existing) => existing,
            None => tx.insert_customer(&request.customer).await?,
        };

        let order = tx
            .insert_order(&request.product.for_customer(customer.id))
            .await?;
        let payment = tx.insert_payment(order.id, order.total_price).await?;

        let intent_request = self.intent_request(&customer, &order, &payment);
        let token = self.gateway().access_token().await?;
        let intent = self.gateway().open_intent(&token, &intent_request).await?;
        let payment_url = intent
            .approval_url()
            .ok_or_else(|| GatewayError::MissingApprovalLink(intent.id.clone()))?
            .to_string();

        tx.set_transaction_id(payment.id, &intent.id).await?;

        Ok(PlacedOrder {
            order_id: order.id,
            payment_id: payment.id,
            payment_url,
        })
    }

    fn intent_request(
        &self,
        customer: &Customer,
        order: &Order,
        payment: &Payment,
    ) -> IntentRequest {
        let settings = self.settings();
        IntentRequest {
            payment_id: payment.id,
            order_id: order.id,
            currency: settings.currency,
            amount: payment.amount,
            item: IntentItem {
                name: order.product_name.clone(),
                description: order.product_description.clone(),
                quantity: order.quantity,
                unit_amount: order.unit_price,
            },
            payer: Payer {
                email: customer.email.clone(),
                given_name: customer.first_name.clone(),
                surname: customer.last_name.clone(),
            },
            return_url: settings.return_url(payment.id),
            cancel_url: settings.cancel_url(payment.id),
            brand_name: settings.brand_name.clone(),
        }
    }
}
