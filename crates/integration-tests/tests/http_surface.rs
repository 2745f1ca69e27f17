//! Health probes, request ids and CORS.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};

use helix_integration_tests::{APP_URL, TestContext};

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .send_raw(Request::get("/health").body(Body::empty()).expect("request"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");

    let (status, _) = ctx
        .send_raw(
            Request::get("/health/ready")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let ctx = TestContext::new().await;

    let response = tower::ServiceExt::oneshot(
        ctx.app.clone(),
        Request::get("/health")
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("router is infallible");

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
}

#[tokio::test]
async fn test_cors_allows_storefront_origin() {
    let ctx = TestContext::new().await;

    let response = tower::ServiceExt::oneshot(
        ctx.app.clone(),
        Request::builder()
            .method("OPTIONS")
            .uri("/order-payment")
            .header(header::ORIGIN, APP_URL)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("router is infallible");

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some(APP_URL)
    );
}

#[tokio::test]
async fn test_unknown_invoice_is_not_found() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx
        .send_raw(
            Request::get("/invoices/invoice_404.pdf")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
