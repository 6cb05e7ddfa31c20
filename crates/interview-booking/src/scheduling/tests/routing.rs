use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::scheduling::router::{scheduling_router, CALLER_ID_HEADER, CALLER_ROLE_HEADER};

fn router(harness: &Harness) -> Router {
    scheduling_router(harness.engine.clone())
}

fn employer_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CALLER_ID_HEADER, EMPLOYER)
        .header(CALLER_ROLE_HEADER, "employer");
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

fn anonymous_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

fn slot_payload(start: &str, end: &str) -> Value {
    json!({
        "date": "2025-03-10",
        "start_time": start,
        "end_time": end,
        "timezone": "America/Chicago",
        "meeting": { "type": "video", "link": "https://meet.example.com/acme" },
        "max_bookings": 1
    })
}

#[tokio::test]
async fn create_slot_route_returns_created_view() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(employer_request(
            Method::POST,
            &format!("/api/v1/employers/{EMPLOYER}/slots"),
            Some(slot_payload("09:00", "09:30")),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["start_time"], "09:00");
    assert_eq!(payload["end_time"], "09:30");
    assert_eq!(payload["duration_minutes"], 30);
    assert_eq!(payload["meeting_type"], "video");
    assert_eq!(payload["status"], "available");
}

#[tokio::test]
async fn employer_routes_require_caller_headers() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(anonymous_request(
            Method::POST,
            &format!("/api/v1/employers/{EMPLOYER}/slots"),
            Some(slot_payload("09:00", "09:30")),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn overlapping_slot_maps_to_conflict() {
    let harness = harness();
    harness.publish(time(9, 0), time(10, 0)).await;

    let response = router(&harness)
        .oneshot(employer_request(
            Method::POST,
            &format!("/api/v1/employers/{EMPLOYER}/slots"),
            Some(slot_payload("09:30", "10:30")),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["error"],
        "time range overlaps existing slot 09:00-10:00"
    );
}

#[tokio::test]
async fn invalid_range_maps_to_unprocessable() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(employer_request(
            Method::POST,
            &format!("/api/v1/employers/{EMPLOYER}/slots"),
            Some(slot_payload("10:00", "09:00")),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn foreign_employer_is_forbidden() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(employer_request(
            Method::GET,
            &format!("/api/v1/employers/{OTHER_EMPLOYER}/slots"),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invitation_flow_over_http() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let app = router(&harness);

    let issued = app
        .clone()
        .oneshot(employer_request(
            Method::POST,
            &format!("/api/v1/jobs/{JOB}/invitations"),
            Some(json!({
                "candidate": {
                    "candidate_id": "cand-a",
                    "name": "Ana Lopez",
                    "email": "ana@example.com"
                },
                "interview_type": "technical"
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(issued.status(), StatusCode::CREATED);
    let issued = read_json_body(issued).await;
    let token = issued["token"].as_str().expect("token present").to_string();
    assert!(issued["invite_url"]
        .as_str()
        .unwrap_or_default()
        .ends_with(&token));

    let view = app
        .clone()
        .oneshot(anonymous_request(
            Method::GET,
            &format!("/api/v1/invitations/{token}"),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(view.status(), StatusCode::OK);
    let view = read_json_body(view).await;
    assert_eq!(view["available_slots"].as_array().map(Vec::len), Some(1));

    let redeemed = app
        .clone()
        .oneshot(anonymous_request(
            Method::POST,
            &format!("/api/v1/invitations/{token}/redeem"),
            Some(json!({ "slot_id": slot.id, "notes": "Looking forward" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(redeemed.status(), StatusCode::CREATED);
    let booking = read_json_body(redeemed).await;
    assert_eq!(booking["status"], "scheduled");

    let reused = app
        .clone()
        .oneshot(anonymous_request(
            Method::GET,
            &format!("/api/v1/invitations/{token}"),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(reused.status(), StatusCode::NOT_FOUND);

    let booking_id = booking["id"].as_str().expect("booking id").to_string();
    let cancelled = app
        .oneshot(employer_request(
            Method::POST,
            &format!("/api/v1/bookings/{booking_id}/status"),
            Some(json!({ "status": "cancelled" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(cancelled.status(), StatusCode::OK);
    assert_eq!(harness.slot(&slot.id).await.current_bookings, 0);
}

#[tokio::test]
async fn full_slot_redeem_uses_generic_message() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    harness.book(&slot.id, "other").await;
    let issued = harness
        .engine
        .invitations()
        .issue(
            &employer(),
            crate::scheduling::IssueInvitation {
                job_id: job_id(),
                candidate: candidate("a"),
                interview_type: Default::default(),
                ttl_hours: None,
            },
        )
        .await
        .expect("issued");

    let response = router(&harness)
        .oneshot(anonymous_request(
            Method::POST,
            &format!("/api/v1/invitations/{}/redeem", issued.invitation.token),
            Some(json!({ "slot_id": slot.id })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload, json!({ "error": "slot no longer available" }));
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(anonymous_request(
            Method::GET,
            "/api/v1/invitations/does-not-exist",
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "invitation not found");
}

#[tokio::test]
async fn calendar_route_rejects_inverted_window() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(employer_request(
            Method::GET,
            &format!("/api/v1/employers/{EMPLOYER}/calendar?from=2025-03-12&to=2025-03-10"),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn candidate_bookings_route_honours_history_flag() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;
    let booking = harness.book(&slot.id, "a").await;
    harness
        .engine
        .lifecycle()
        .cancel(&employer(), &booking.id)
        .await
        .expect("cancel succeeds");
    let app = router(&harness);

    let candidate_request = |uri: &str| {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(CALLER_ID_HEADER, "cand-a")
            .header(CALLER_ROLE_HEADER, "candidate")
            .body(Body::empty())
            .expect("request builds")
    };

    let upcoming = app
        .clone()
        .oneshot(candidate_request("/api/v1/candidates/cand-a/bookings"))
        .await
        .expect("route executes");
    assert_eq!(upcoming.status(), StatusCode::OK);
    assert_eq!(read_json_body(upcoming).await, json!([]));

    let history = app
        .oneshot(candidate_request(
            "/api/v1/candidates/cand-a/bookings?history=true",
        ))
        .await
        .expect("route executes");
    let history = read_json_body(history).await;
    assert_eq!(history[0]["status"], "cancelled");
}

#[tokio::test]
async fn delete_slot_route_returns_no_content() {
    let harness = harness();
    let slot = harness.publish(time(9, 0), time(9, 30)).await;

    let response = router(&harness)
        .oneshot(employer_request(
            Method::DELETE,
            &format!("/api/v1/slots/{}", slot.id),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn repository_outage_maps_to_service_unavailable() {
    let response = scheduling_router(offline_engine())
        .oneshot(anonymous_request(
            Method::GET,
            &format!("/api/v1/jobs/{JOB}/available-slots"),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "scheduling temporarily unavailable");
}
