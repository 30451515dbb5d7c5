use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use legalmate_core::{
    config::Config,
    db::Db,
    engine::ReviewEngine,
    outcome::OutcomeDecider,
    Attorney, DocumentReview, Priority, ReviewOutcome, ReviewStatus,
};
use legalmate_server::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

struct AlwaysApprove;

impl OutcomeDecider for AlwaysApprove {
    fn decide(&self, _review: &DocumentReview) -> ReviewOutcome {
        ReviewOutcome::Approved
    }
}

fn mk_state() -> Arc<AppState> {
    let db = Db::open(":memory:").expect("open in-memory db");
    db.migrate().expect("migrate");
    let db = Arc::new(db);
    let engine = Arc::new(ReviewEngine::new(
        Arc::clone(&db),
        Arc::new(Config::default()),
        Arc::new(AlwaysApprove),
    ));
    Arc::new(AppState {
        db,
        engine,
        start_time: Instant::now(),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(v) => builder.body(Body::from(v.to_string())).expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn submit_body() -> Value {
    json!({
        "document_content": "MUTUAL NON-DISCLOSURE AGREEMENT ...",
        "document_type": "nda",
        "client_id": "client-42",
        "original_request": {"template": "nda", "parties": 2},
        "priority": "high",
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_router(mk_state());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["reviews"]["pending"], 0);
}

#[tokio::test]
async fn submitted_review_starts_pending_and_unassigned() {
    let app = build_router(mk_state());

    let (status, body) = send(&app, "POST", "/attorney/review/submit", Some(submit_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let review_id = body["review_id"].as_str().expect("review_id").to_string();

    let (status, body) = send(
        &app,
        "GET",
        &format!("/attorney/review/status/{review_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_id"], review_id.as_str());
    assert_eq!(body["status"], "pending");
    assert_eq!(body["progress_percentage"], 0);
    assert_eq!(body["assigned_attorney"], Value::Null);
    assert_eq!(body["estimated_completion"], Value::Null);
    assert_eq!(body["priority"], "high");
    assert_eq!(body["comments"], Value::Null);
}

#[tokio::test]
async fn unknown_review_id_is_404() {
    let app = build_router(mk_state());
    let (status, body) = send(
        &app,
        "GET",
        "/attorney/review/status/no-such-review",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "review not found");
}

#[tokio::test]
async fn submission_validation_rejects_bad_payloads() {
    let app = build_router(mk_state());

    let mut body = submit_body();
    body["document_content"] = json!("   ");
    let (status, resp) = send(&app, "POST", "/attorney/review/submit", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["success"], false);

    let mut body = submit_body();
    body["priority"] = json!("urgent");
    let (status, resp) = send(&app, "POST", "/attorney/review/submit", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp["error"].as_str().expect("error").contains("priority"));
}

#[tokio::test]
async fn attorney_creation_and_duplicate_email() {
    let app = build_router(mk_state());
    let body = json!({
        "name": "Dana Reyes",
        "email": "dana.reyes@example.com",
        "password": "correct horse battery",
        "bar_number": "CA-55512",
        "jurisdiction": "CA",
        "specializations": ["contracts", "ip"],
    });

    let (status, resp) = send(&app, "POST", "/attorney/create", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["success"], true);
    assert!(resp["attorney_id"].as_str().is_some());

    let (status, resp) = send(&app, "POST", "/attorney/create", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["error"], "email is already registered");

    let (status, _) = send(
        &app,
        "POST",
        "/attorney/create",
        Some(json!({
            "name": "X",
            "email": "x@example.com",
            "password": "short",
            "bar_number": "",
            "jurisdiction": "",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn deactivated_attorney_email_still_counts_as_taken() {
    let state = mk_state();
    let app = build_router(Arc::clone(&state));

    // Soft-deleted attorney: the row stays, and email is UNIQUE.
    let former = Attorney {
        id: "former-1".to_string(),
        name: "Former Partner".to_string(),
        email: "former@example.com".to_string(),
        password_hash: String::new(),
        bar_number: "NY-100".to_string(),
        jurisdiction: "NY".to_string(),
        role: "reviewing_attorney".to_string(),
        specializations: vec![],
        is_available: false,
        is_active: false,
        current_review_count: 0,
        max_concurrent_reviews: 10,
        average_review_time: 2.0,
        created_at: Utc::now(),
        last_login: None,
    };
    state.db.insert_attorney(&former).expect("insert");

    let (status, body) = send(
        &app,
        "POST",
        "/attorney/create",
        Some(json!({
            "name": "New Hire",
            "email": "former@example.com",
            "password": "a long enough password",
            "bar_number": "NY-200",
            "jurisdiction": "NY",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "email is already registered");
}

#[tokio::test]
async fn sweep_assigns_and_status_shows_progress() {
    let state = mk_state();
    let app = build_router(Arc::clone(&state));

    let (_, body) = send(&app, "POST", "/attorney/review/submit", Some(submit_body())).await;
    let review_id = body["review_id"].as_str().expect("review_id").to_string();

    // One sweeper tick in the past, so elapsed time registers as progress.
    state
        .engine
        .assign_pending(Utc::now() - Duration::minutes(30))
        .expect("sweep");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/attorney/review/status/{review_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_review");
    let pct = body["progress_percentage"].as_u64().expect("percentage");
    assert!((1..=99).contains(&pct));
    assert!(body["assigned_attorney"]["id"].as_str().is_some());
    assert!(body["estimated_completion"].as_str().is_some());
}

#[tokio::test]
async fn queue_lists_an_attorneys_active_reviews() {
    let state = mk_state();
    let app = build_router(Arc::clone(&state));

    let (status, body) = send(&app, "GET", "/attorney/review/queue/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "attorney not found");

    send(&app, "POST", "/attorney/review/submit", Some(submit_body())).await;
    state
        .engine
        .assign_pending(Utc::now() - Duration::minutes(10))
        .expect("sweep");
    let attorney_id = state
        .db
        .list_in_review()
        .expect("query")
        .pop()
        .expect("row")
        .assigned_attorney_id
        .expect("assigned");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/attorney/review/queue/{attorney_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attorney_id"], attorney_id.as_str());
    let reviews = body["reviews"].as_array().expect("reviews");
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["status"], "in_review");
    assert!(reviews[0]["progress_percentage"].as_u64().is_some());
}

#[tokio::test]
async fn explicit_action_enforces_assignment() {
    let state = mk_state();
    let app = build_router(Arc::clone(&state));

    send(&app, "POST", "/attorney/review/submit", Some(submit_body())).await;
    state.engine.assign_pending(Utc::now()).expect("sweep");
    let review = state
        .db
        .list_in_review()
        .expect("query")
        .pop()
        .expect("row");
    let attorney_id = review.assigned_attorney_id.clone().expect("assigned");

    let (status, body) = send(
        &app,
        "POST",
        "/attorney/review/action",
        Some(json!({
            "review_id": review.id,
            "attorney_id": "someone-else",
            "action": "approve",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/attorney/review/action",
        Some(json!({
            "review_id": review.id,
            "attorney_id": attorney_id,
            "action": "approve",
            "comments": "Standard terms, approved.",
            "approved_content": "MUTUAL NON-DISCLOSURE AGREEMENT (final)",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "approved");

    let (_, body) = send(
        &app,
        "GET",
        &format!("/attorney/review/status/{}", review.id),
        None,
    )
    .await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["progress_percentage"], 100);
    assert_eq!(body["comments"], "Standard terms, approved.");

    let (status, _) = send(
        &app,
        "POST",
        "/attorney/review/action",
        Some(json!({
            "review_id": review.id,
            "attorney_id": attorney_id,
            "action": "needs_revision",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn cleanup_endpoint_repairs_corrupted_records() {
    let state = mk_state();
    let app = build_router(Arc::clone(&state));

    // Invariant violation as seen in the wild: in_review, no assignment date.
    let broken = DocumentReview {
        id: "broken-1".to_string(),
        document_content: "SERVICES AGREEMENT ...".to_string(),
        document_type: "contract".to_string(),
        client_id: "client-7".to_string(),
        original_request: "{}".to_string(),
        priority: Priority::Normal,
        status: ReviewStatus::InReview,
        assigned_attorney_id: None,
        assignment_date: None,
        estimated_review_time: None,
        completion_date: None,
        attorney_comments: None,
        approved_content: None,
        created_at: Utc::now() - Duration::hours(3),
    };
    state.db.insert_review(&broken).expect("insert");

    let (status, body) = send(&app, "POST", "/attorney/review/cleanup-stuck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["fixed_count"], 1);
    let details = body["details"].as_array().expect("details");
    assert_eq!(details[0]["review_id"], "broken-1");
    assert_eq!(details[0]["action"], "backfilled_assignment");

    let row = state.db.get_review("broken-1").expect("query").expect("row");
    assert!(row.assignment_date.is_some());
    assert!(row.assigned_attorney_id.is_some());

    // Second run with nothing new finds nothing to fix.
    let (_, body) = send(&app, "POST", "/attorney/review/cleanup-stuck", None).await;
    assert_eq!(body["fixed_count"], 0);
}
