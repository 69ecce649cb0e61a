use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use delivery_dispatch::api::rest::router;
use delivery_dispatch::config::{Config, DispatchSettings};
use delivery_dispatch::engine::accept::accept_offer;
use delivery_dispatch::models::events::OfferEvent;
use delivery_dispatch::state::AppState;

fn test_config() -> Config {
    Config {
        http_port: 0,
        log_level: "debug".to_string(),
        event_buffer_size: 64,
        zone_buffer_size: 64,
        dispatch: DispatchSettings::default(),
    }
}

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(&test_config()));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn order_item_body() -> Value {
    json!({
        "order_id": Uuid::new_v4(),
        "paid": true,
        "item_name": "suya platter",
        "price": 3500.0,
        "store_name": "Mama K Kitchen",
        "pickup_address": "12 Allen Ave",
        "buyer_name": "Ada",
        "buyer_contact": "+2348000000000",
        "dropoff": { "lat": 6.45, "lng": 3.39 },
        "dropoff_address": "4 Marina Rd"
    })
}

async fn seed_order_item(app: &axum::Router) -> String {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/order-items", order_item_body()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn seed_active_rider(app: &axum::Router) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/riders",
            json!({ "user_id": Uuid::new_v4(), "name": "Tunde" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let id = body_json(res).await["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/riders/{id}/status"),
            json!({ "is_active": true }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    id
}

async fn mark_ready(app: &axum::Router, item_id: &str) -> Value {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/order-items/{item_id}/ready"),
            json!({ "lat": 6.5, "lng": 3.4 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["order_items"], 0);
    assert_eq!(body["offers"], 0);
    assert_eq!(body["riders"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("offers_open"));
    assert!(body.contains("zone_sessions"));
}

#[tokio::test]
async fn new_order_item_projects_pending() {
    let (app, _state) = setup();
    let item_id = seed_order_item(&app).await;

    let res = app
        .oneshot(get_request(&format!("/order-items/{item_id}")))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["delivery_status"], "Pending");
}

#[tokio::test]
async fn order_item_with_bad_dropoff_returns_400() {
    let (app, _state) = setup();
    let mut body = order_item_body();
    body["dropoff"] = json!({ "lat": 95.0, "lng": 3.39 });

    let res = app
        .oneshot(json_request("POST", "/order-items", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mark_ready_opens_pending_offer_with_geohash() {
    let (app, _state) = setup();
    let item_id = seed_order_item(&app).await;

    let offer = mark_ready(&app, &item_id).await;

    assert_eq!(offer["status"], "Pending");
    assert_eq!(offer["seller_geohash"], "s14k");
    assert!(offer["rider_id"].is_null());
    // 500 base + 100 bonus + 10% of 3500
    assert_eq!(offer["rider_earnings"], 950.0);
    // Redacted: no secret material in any response.
    assert!(offer.get("pickup_code_hash").is_none());
    assert!(offer.get("pickup_code_salt").is_none());
    assert!(offer.get("delivery_code_hash").is_none());

    let res = app
        .oneshot(get_request(&format!("/order-items/{item_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["delivery_status"], "ReadyForPickup");
}

#[tokio::test]
async fn mark_ready_is_idempotent() {
    let (app, state) = setup();
    let item_id = seed_order_item(&app).await;

    let first = mark_ready(&app, &item_id).await;
    let second = mark_ready(&app, &item_id).await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(state.offers.len(), 1);
}

#[tokio::test]
async fn mark_ready_with_bad_coordinates_returns_400() {
    let (app, _state) = setup();
    let item_id = seed_order_item(&app).await;

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/order-items/{item_id}/ready"),
            json!({ "lat": 6.5, "lng": 200.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mark_ready_on_unpaid_item_returns_409() {
    let (app, _state) = setup();
    let mut body = order_item_body();
    body["paid"] = json!(false);
    let res = app
        .clone()
        .oneshot(json_request("POST", "/order-items", body))
        .await
        .unwrap();
    let item_id = body_json(res).await["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/order-items/{item_id}/ready"),
            json!({ "lat": 6.5, "lng": 3.4 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"], "ineligible_state");
}

#[tokio::test]
async fn mark_ready_on_missing_item_returns_404() {
    let (app, _state) = setup();
    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/order-items/{}/ready", Uuid::new_v4()),
            json!({ "lat": 6.5, "lng": 3.4 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn one_rider_account_per_user() {
    let (app, _state) = setup();
    let user_id = Uuid::new_v4();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/riders",
            json!({ "user_id": user_id, "name": "Tunde" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rider = body_json(res).await;
    assert_eq!(rider["is_active"], false);

    let res = app
        .oneshot(json_request(
            "POST",
            "/riders",
            json!({ "user_id": user_id, "name": "Tunde again" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn rider_location_update_names_the_zone_cell() {
    let (app, _state) = setup();
    let rider_id = seed_active_rider(&app).await;

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/riders/{rider_id}/location"),
            json!({ "location": { "lat": 6.5, "lng": 3.4 } }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["zone_cell"], "s14kv");
    assert_eq!(body["location"]["lat"], 6.5);
}

#[tokio::test]
async fn accept_race_has_exactly_one_winner() {
    let (app, _state) = setup();
    let item_id = seed_order_item(&app).await;
    let winner = seed_active_rider(&app).await;
    let loser = seed_active_rider(&app).await;
    mark_ready(&app, &item_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/offers/accept",
            json!({ "rider_id": winner, "order_item_id": item_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let offer = body_json(res).await;
    assert_eq!(offer["status"], "ReadyForPickup");
    assert_eq!(offer["rider_id"], winner);
    assert!(offer["accepted_at"].is_string());
    assert!(offer["pickup_deadline"].is_string());

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/offers/accept",
            json!({ "rider_id": loser, "order_item_id": item_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"], "already_accepted");

    let res = app
        .oneshot(get_request(&format!("/order-items/{item_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["delivery_status"], "Assigned");
}

#[tokio::test]
async fn inactive_rider_cannot_accept() {
    let (app, _state) = setup();
    let item_id = seed_order_item(&app).await;
    mark_ready(&app, &item_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/riders",
            json!({ "user_id": Uuid::new_v4(), "name": "Offline Ola" }),
        ))
        .await
        .unwrap();
    let rider_id = body_json(res).await["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "POST",
            "/offers/accept",
            json!({ "rider_id": rider_id, "order_item_id": item_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"], "ineligible_state");
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let (app, _state) = setup();
    let item_id = seed_order_item(&app).await;
    let offer = mark_ready(&app, &item_id).await;
    let offer_id = offer["id"].as_str().unwrap();

    for _ in 0..2 {
        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/offers/{offer_id}/cancel"),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["status"], "Cancelled");
    }

    // The item is free for re-dispatch, with a fresh offer.
    let reopened = mark_ready(&app, &item_id).await;
    assert_ne!(reopened["id"].as_str().unwrap(), offer_id);
}

/// End-to-end scenario: seller marks ready at (6.5, 3.4), two riders race,
/// the winner walks the offer through both code-verified handoffs.
#[tokio::test]
async fn full_dispatch_flow() {
    let (app, state) = setup();
    let item_id = seed_order_item(&app).await;
    let rider_a = seed_active_rider(&app).await;
    let rider_b = seed_active_rider(&app).await;

    // Plaintext codes travel only on the notification channel.
    let mut events = state.events_tx.subscribe();
    let offer = mark_ready(&app, &item_id).await;
    let offer_id = offer["id"].as_str().unwrap().to_string();
    assert_eq!(offer["seller_geohash"], "s14k");

    let mut pickup_code = None;
    let mut delivery_code = None;
    while let Ok(event) = events.try_recv() {
        match event {
            OfferEvent::PickupCodeIssued { code, .. } => pickup_code = Some(code),
            OfferEvent::DeliveryCodeIssued { code, .. } => delivery_code = Some(code),
            _ => {}
        }
    }
    let pickup_code = pickup_code.expect("pickup code issued");
    let delivery_code = delivery_code.expect("delivery code issued");

    // Two concurrent accepts: exactly one winner.
    let item_uuid: Uuid = item_id.parse().unwrap();
    let now = Utc::now();
    let result_a = accept_offer(&state, rider_a.parse().unwrap(), item_uuid, now);
    let result_b = accept_offer(&state, rider_b.parse().unwrap(), item_uuid, now);
    assert_ne!(result_a.is_ok(), result_b.is_ok());
    let winner = if result_a.is_ok() { &rider_a } else { &rider_b };

    // Wrong pickup code: attempt counted, state unchanged.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/offers/{offer_id}/verify-pickup"),
            json!({ "code": "WRONG2" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Correct pickup code advances to OutForDelivery.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/offers/{offer_id}/verify-pickup"),
            json!({ "code": pickup_code }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "OutForDelivery");
    assert_eq!(body["rider_id"].as_str().unwrap(), winner.as_str());

    // The pickup code is single-use: the state has moved on.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/offers/{offer_id}/verify-pickup"),
            json!({ "code": pickup_code }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Delivery code closes the loop.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/offers/{offer_id}/verify-delivery"),
            json!({ "code": delivery_code }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "Delivered");
    assert!(body["delivered_at"].is_string());

    let res = app
        .oneshot(get_request(&format!("/order-items/{item_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["delivery_status"], "Delivered");
}
