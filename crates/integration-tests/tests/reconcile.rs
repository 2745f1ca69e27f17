//! Sweeping stale pending payments whose intent completed at the gateway.

use chrono::{Duration, Utc};

use helix_core::{OrderStatus, PaymentId, PaymentStatus};
use helix_integration_tests::TestContext;

async fn stale_payment(ctx: &mut TestContext) -> PaymentId {
    let (_, payment_id) = ctx.place_widget_order("ada@example.com").await;
    let id = PaymentId::new(i32::try_from(payment_id).expect("payment id fits"));
    ctx.ledger
        .backdate_payment(id, Utc::now() - Duration::hours(2))
        .await;
    id
}

#[tokio::test]
async fn test_completed_intent_is_settled_without_capture() {
    let mut ctx = TestContext::new().await;
    let _token = ctx.mock_token().await;
    let _intent = ctx.mock_open_intent().await;
    let _status = ctx.mock_intent_status("COMPLETED").await;
    let capture = ctx.mock_capture("COMPLETED", 0).await;

    stale_payment(&mut ctx).await;

    let report = ctx
        .pipeline
        .reconcile_pending(Duration::minutes(30))
        .await
        .expect("reconcile");

    assert_eq!(report.examined, 1);
    assert_eq!(report.settled, 1);
    assert_eq!(report.errors, 0);
    capture.assert_async().await;

    assert_eq!(
        ctx.ledger.payments().await[0].payment_status,
        PaymentStatus::Completed
    );
    assert_eq!(
        ctx.ledger.orders().await[0].order_status,
        OrderStatus::Processing
    );
    assert_eq!(ctx.ledger.invoices().await.len(), 1);
    assert_eq!(ctx.notifier.sent().len(), 1);

    // A second sweep finds nothing left to do.
    let report = ctx
        .pipeline
        .reconcile_pending(Duration::minutes(30))
        .await
        .expect("reconcile");
    assert_eq!(report.examined, 0);
}

#[tokio::test]
async fn test_unfinished_intent_stays_pending() {
    let mut ctx = TestContext::new().await;
    let _token = ctx.mock_token().await;
    let _intent = ctx.mock_open_intent().await;
    let _status = ctx.mock_intent_status("APPROVED").await;

    stale_payment(&mut ctx).await;

    let report = ctx
        .pipeline
        .reconcile_pending(Duration::minutes(30))
        .await
        .expect("reconcile");

    assert_eq!(report.examined, 1);
    assert_eq!(report.still_pending, 1);
    assert_eq!(report.settled, 0);
    assert_eq!(
        ctx.ledger.payments().await[0].payment_status,
        PaymentStatus::Pending
    );
    assert!(ctx.ledger.invoices().await.is_empty());
}

#[tokio::test]
async fn test_recent_payments_are_left_alone() {
    let mut ctx = TestContext::new().await;
    let _token = ctx.mock_token().await;
    let _intent = ctx.mock_open_intent().await;

    ctx.place_widget_order("ada@example.com").await;

    let report = ctx
        .pipeline
        .reconcile_pending(Duration::minutes(30))
        .await
        .expect("reconcile");

    assert_eq!(report.examined, 0);
    assert_eq!(
        ctx.ledger.payments().await[0].payment_status,
        PaymentStatus::Pending
    );
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_sweep() {
    let mut ctx = TestContext::new().await;
    let _token = ctx.mock_token().await;
    let _intent = ctx.mock_open_intent().await;
    let _status = ctx.mock_intent_status("COMPLETED").await;

    stale_payment(&mut ctx).await;
    ctx.notifier.set_failing(true);

    let report = ctx
        .pipeline
        .reconcile_pending(Duration::minutes(30))
        .await
        .expect("reconcile");

    assert_eq!(report.settled, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(
        ctx.ledger.payments().await[0].payment_status,
        PaymentStatus::Completed
    );
}
