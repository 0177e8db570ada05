use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::leads::notifications::NotificationDispatcher;
use crate::leads::router::lead_router;

fn router(harness: &Harness) -> Router {
    let dispatcher = Arc::new(NotificationDispatcher::new(harness.store.clone()));
    lead_router(harness.service.clone(), dispatcher)
}

fn request(method: &str, uri: &str, role: &str, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "user-manager")
        .header("x-agency-id", agency().0)
        .header("x-role", role);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).expect("serializes"))
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request builds")
}

async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is json")
}

#[tokio::test]
async fn requests_without_identity_headers_are_unauthorized() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(
            Request::get("/api/v1/notifications")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_roles_are_unauthorized() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(request(
            "GET",
            "/api/v1/notifications",
            "superadmin",
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lead_intake_and_patch_round_trip() {
    let harness = harness();
    let app = router(&harness);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/leads",
            "manager",
            Some(json!({ "name": "Ada Buyer", "email": "ada@example.com" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let lead = read_json_body(response).await;
    assert_eq!(lead.get("status"), Some(&json!("new")));
    let lead_id = lead
        .get("id")
        .and_then(Value::as_str)
        .expect("lead id present")
        .to_string();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/leads/{lead_id}"),
            "manager",
            Some(json!({ "status": "contacted", "email": null })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json_body(response).await;
    assert_eq!(updated.get("status"), Some(&json!("contacted")));
    assert_eq!(updated.get("email"), Some(&Value::Null));
    assert!(updated.get("first_contacted_at").is_some());

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/leads/{lead_id}/activities"),
            "manager",
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let activities = read_json_body(response).await;
    assert_eq!(activities.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn scheduling_without_a_date_is_unprocessable() {
    let harness = harness();
    let lead = create_lead(&harness, "Dated");

    let response = router(&harness)
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/leads/{}", lead.id.0),
            "manager",
            Some(json!({ "status": "appointment_scheduled" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("appointment_date"));
}

#[tokio::test]
async fn unknown_leads_are_not_found() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(request(
            "GET",
            "/api/v1/leads/lead-ghost",
            "manager",
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn member_deletes_are_forbidden() {
    let harness = harness();
    let lead = create_lead(&harness, "Protected");

    let response = router(&harness)
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/leads/{}", lead.id.0),
            "member",
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_status_names_conflict_over_http() {
    let harness = harness();
    let app = router(&harness);
    let payload = json!({ "name": "viewing", "translation": "Viewing booked" });

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/statuses",
            "manager",
            Some(payload.clone()),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("POST", "/api/v1/statuses", "manager", Some(payload)))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn bulk_assign_reports_the_affected_count() {
    let harness = harness();
    let a = create_lead(&harness, "Alpha");
    let b = create_lead(&harness, "Bravo");

    let response = router(&harness)
        .oneshot(request(
            "POST",
            "/api/v1/leads/bulk/assign",
            "manager",
            Some(json!({ "ids": [a.id.0, b.id.0, "lead-ghost"], "agent_id": "agent-vega" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.get("affected"), Some(&json!(2)));
}

#[tokio::test]
async fn notification_feed_and_read_all_round_trip() {
    let harness = harness();
    let app = router(&harness);
    let lead = create_lead(&harness, "Handover");

    // Assign to the polling user so a notification lands in their feed.
    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/leads/{}", lead.id.0),
            "manager",
            Some(json!({ "assigned_to": "user-manager" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request("GET", "/api/v1/notifications", "manager", None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let feed = read_json_body(response).await;
    assert_eq!(feed.get("unread_count"), Some(&json!(1)));

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/notifications/read-all",
            "manager",
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request("GET", "/api/v1/notifications", "manager", None))
        .await
        .expect("route executes");
    let feed = read_json_body(response).await;
    assert_eq!(feed.get("unread_count"), Some(&json!(0)));
}
