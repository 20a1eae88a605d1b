//! HTTP adapter tests: routing, envelopes and error bodies.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rstest::rstest;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{harness, Harness};
use toolshed_backend::app::{create_app, AppState};
use toolshed_backend::config::{BookingPolicy, Environment, LogFormat, Settings};

fn test_settings() -> Settings {
    Settings {
        env: Environment::Dev,
        server_addr: "127.0.0.1:0".to_string(),
        log_format: LogFormat::Compact,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        cors_allow_origins: vec!["http://localhost:5173".to_string()],
        stripe_api_base: "https://api.stripe.com".to_string(),
        stripe_secret_key: None,
        stripe_webhook_secret: common::WEBHOOK_SECRET.to_string(),
        stripe_payout_destination: None,
        payment_timeout_seconds: 1,
        booking_policy: BookingPolicy::default(),
    }
}

fn app(h: &Harness) -> Router {
    create_app(AppState::new(h.ctx.clone(), test_settings()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[rstest]
#[tokio::test]
async fn test_health_reports_components(harness: Harness) {
    let (status, body) = send(app(&harness), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["store"], "ok");
    assert_eq!(body["services"]["payment_gateway"], "ok");
}

#[rstest]
#[tokio::test]
async fn test_booking_round_trip_over_http(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;

    let (status, body) = send(
        app(&h),
        post_json(
            "/bookings",
            json!({
                "tool_id": listing.tool.id,
                "renter_id": listing.renter.id,
                "start_date": "2024-06-10",
                "end_date": "2024-06-12",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "PENDING");
    let booking_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app(&h),
        post_json(
            &format!("/bookings/{}/approve", booking_id),
            json!({"owner_id": listing.owner.id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "APPROVED");

    let (status, body) = send(
        app(&h),
        get(&format!("/owners/{}/bookings?per_page=5", listing.owner.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_items"], 1);
    assert_eq!(body["data"][0]["id"], booking_id.as_str());
}

#[rstest]
#[tokio::test]
async fn test_errors_carry_codes(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, common::date(2024, 6, 10), common::date(2024, 6, 12))
        .await
        .unwrap();

    let (status, body) = send(
        app(&h),
        get(&format!("/bookings/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "BOOKING_NOT_FOUND");

    let (status, body) = send(
        app(&h),
        post_json(
            "/bookings",
            json!({
                "tool_id": listing.tool.id,
                "renter_id": listing.renter.id,
                "start_date": "2024-06-12",
                "end_date": "2024-06-13",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "OVERLAP_CONFLICT");

    let (status, _) = send(
        app(&h),
        post_json(
            &format!("/payments/bookings/{}/mark-paid", booking.id),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        app(&h),
        post_json(
            &format!("/payments/bookings/{}/mark-paid", booking.id),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PAYMENT_ALREADY_COMPLETED");
}

#[rstest]
#[tokio::test]
async fn test_webhook_requires_signature_header(harness: Harness) {
    let h = harness;
    let request = Request::post("/payments/webhook")
        .body(Body::from(r#"{"type":"checkout.session.completed"}"#))
        .unwrap();

    let (status, body) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SIGNATURE");
}

#[rstest]
#[tokio::test]
async fn test_signed_webhook_settles_payment(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, common::date(2024, 6, 10), common::date(2024, 6, 12))
        .await
        .unwrap();
    let (payload, signature) = h.signed_event(
        "evt_http",
        json!({"bookingId": booking.id.to_string(), "type": "rental"}),
    );

    let request = Request::post("/payments/webhook")
        .header("stripe-signature", signature)
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(body["outcome"], "applied");

    let (_, body) = send(
        app(&h),
        get(&format!("/payments/bookings/{}/status", booking.id)),
    )
    .await;
    assert_eq!(body["data"]["payment_status"], "COMPLETED");
}

#[rstest]
#[tokio::test]
async fn test_report_moderation_routes(harness: Harness) {
    let h = harness;
    let reporter = h.user("reporter").await;

    let (status, body) = send(
        app(&h),
        post_json(
            "/reports",
            json!({
                "reporter_id": reporter.id,
                "title": "Listing shows the wrong tool",
                "description": "Photo is a hammer, title says drill",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "OPEN");
    let report_id = body["data"]["id"].as_str().unwrap().to_string();

    let request = Request::patch(format!("/reports/{}", report_id))
        .header("content-type", "application/json")
        .body(Body::from(json!({"status": "RESOLVED"}).to_string()))
        .unwrap();
    let (status, body) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "RESOLVED");

    let (_, body) = send(app(&h), get("/reports?status=OPEN")).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let request = Request::delete(format!("/reports/{}", report_id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let request = Request::delete(format!("/reports/{}", report_id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
