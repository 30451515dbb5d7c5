use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use legalmate_core::{
    engine::ActionResult,
    progress,
    Attorney, AttorneyPublic, DocumentReview, Priority, ReviewOutcome, ReviewStatus,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::AppState;

// ── Error type ────────────────────────────────────────────────────────────

/// API error taxonomy. Store failures are logged server-side and surfaced
/// to clients as an opaque 500; clients never see raw store messages.
pub(crate) enum ApiError {
    NotFound(&'static str),
    Validation(String),
    Internal,
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("internal error: {e:#}");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "temporarily unavailable, please retry".to_string(),
            ),
        };
        (code, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

fn invalid(msg: impl Into<String>) -> ApiError {
    ApiError::Validation(msg.into())
}

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct CreateAttorneyBody {
    pub name: String,
    pub email: String,
    pub password: String,
    pub bar_number: String,
    pub jurisdiction: String,
    pub role: Option<String>,
    pub specializations: Option<Vec<String>>,
    pub max_concurrent_reviews: Option<i64>,
}

#[derive(Deserialize)]
pub(crate) struct SubmitReviewBody {
    pub document_content: String,
    pub document_type: String,
    pub client_id: String,
    pub original_request: Option<Value>,
    pub priority: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ReviewActionBody {
    pub review_id: String,
    pub attorney_id: String,
    pub action: String,
    pub comments: Option<String>,
    pub approved_content: Option<String>,
}

// ── Projection helpers ────────────────────────────────────────────────────

fn review_json(review: &DocumentReview, attorney: Option<&Attorney>) -> Value {
    let progress = progress::for_review(review, Utc::now());
    json!({
        "review_id": review.id,
        "status": review.status,
        "progress_percentage": progress.percentage(),
        "assigned_attorney": attorney.map(AttorneyPublic::from),
        "estimated_completion": progress.completion_label(),
        "priority": review.priority,
        "created_at": review.created_at.to_rfc3339(),
        "comments": review.attorney_comments,
    })
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let (pending, in_review, approved, needs_revision) = state.db.review_stats()?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_s": state.start_time.elapsed().as_secs(),
        "reviews": {
            "pending": pending,
            "in_review": in_review,
            "approved": approved,
            "needs_revision": needs_revision,
        },
    })))
}

pub(crate) async fn create_attorney(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateAttorneyBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(invalid("name is required"));
    }
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(invalid("a valid email is required"));
    }
    if body.password.len() < 8 {
        return Err(invalid("password must be at least 8 characters"));
    }
    if state.db.get_attorney_by_email(body.email.trim())?.is_some() {
        return Err(invalid("email is already registered"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(body.password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("password hashing failed: {e}");
            ApiError::Internal
        })?
        .to_string();

    let attorney = Attorney {
        id: Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        email: body.email.trim().to_string(),
        password_hash,
        bar_number: body.bar_number.trim().to_string(),
        jurisdiction: body.jurisdiction.trim().to_string(),
        role: body
            .role
            .unwrap_or_else(|| "reviewing_attorney".to_string()),
        specializations: body.specializations.unwrap_or_default(),
        is_available: true,
        is_active: true,
        current_review_count: 0,
        max_concurrent_reviews: body.max_concurrent_reviews.unwrap_or(10),
        average_review_time: 2.0,
        created_at: Utc::now(),
        last_login: None,
    };
    state.db.insert_attorney(&attorney)?;
    tracing::info!("attorney {} created", attorney.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "attorney_id": attorney.id })),
    ))
}

pub(crate) async fn submit_review(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitReviewBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.document_content.trim().is_empty() {
        return Err(invalid("document_content is required"));
    }
    if body.document_type.trim().is_empty() {
        return Err(invalid("document_type is required"));
    }
    if body.client_id.trim().is_empty() {
        return Err(invalid("client_id is required"));
    }
    let priority = match body.priority.as_deref() {
        None | Some("") => Priority::Normal,
        Some(s) => Priority::parse(s)
            .ok_or_else(|| invalid(format!("unknown priority {s:?} (low|normal|high)")))?,
    };

    let review = DocumentReview {
        id: Uuid::new_v4().to_string(),
        document_content: body.document_content,
        document_type: body.document_type.trim().to_string(),
        client_id: body.client_id.trim().to_string(),
        original_request: body
            .original_request
            .map(|v| v.to_string())
            .unwrap_or_else(|| "{}".to_string()),
        priority,
        status: ReviewStatus::Pending,
        assigned_attorney_id: None,
        assignment_date: None,
        estimated_review_time: None,
        completion_date: None,
        attorney_comments: None,
        approved_content: None,
        created_at: Utc::now(),
    };
    state.db.insert_review(&review)?;
    tracing::info!("review {} submitted ({})", review.id, review.document_type);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "review_id": review.id })),
    ))
}

pub(crate) async fn review_status(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(review) = state.db.get_review(&review_id)? else {
        return Err(ApiError::NotFound("review"));
    };
    if review.status == ReviewStatus::InReview && review.assignment_date.is_none() {
        tracing::warn!("inconsistent review {review_id}: in_review with no assignment date");
    }
    let attorney = match review.assigned_attorney_id.as_deref() {
        Some(id) => state.db.get_attorney(id)?,
        None => None,
    };
    Ok(Json(review_json(&review, attorney.as_ref())))
}

pub(crate) async fn attorney_queue(
    State(state): State<Arc<AppState>>,
    Path(attorney_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(attorney) = state.db.get_attorney(&attorney_id)? else {
        return Err(ApiError::NotFound("attorney"));
    };
    let now = Utc::now();
    let reviews: Vec<Value> = state
        .db
        .list_attorney_active(&attorney.id)?
        .iter()
        .map(|r| {
            let progress = progress::for_review(r, now);
            json!({
                "review_id": r.id,
                "document_type": r.document_type,
                "client_id": r.client_id,
                "priority": r.priority,
                "status": r.status,
                "progress_percentage": progress.percentage(),
                "estimated_completion": progress.completion_label(),
                "assignment_date": r.assignment_date.map(|d| d.to_rfc3339()),
            })
        })
        .collect();
    Ok(Json(json!({
        "attorney_id": attorney.id,
        "reviews": reviews,
    })))
}

pub(crate) async fn review_action(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReviewActionBody>,
) -> Result<Json<Value>, ApiError> {
    let outcome = match body.action.as_str() {
        "approve" | "approved" => ReviewOutcome::Approved,
        "reject" | "needs_revision" | "request_revision" => ReviewOutcome::NeedsRevision,
        other => {
            return Err(invalid(format!(
                "unknown action {other:?} (approve|needs_revision)"
            )))
        }
    };
    let result = state.engine.apply_action(
        &body.review_id,
        &body.attorney_id,
        outcome,
        body.comments.as_deref().unwrap_or(""),
        body.approved_content.as_deref(),
        Utc::now(),
    )?;
    match result {
        ActionResult::Applied => Ok(Json(json!({
            "success": true,
            "review_id": body.review_id,
            "status": outcome.status(),
        }))),
        ActionResult::NotFound => Err(ApiError::NotFound("review")),
        ActionResult::NotInReview => Err(invalid("review is not currently in review")),
        ActionResult::AttorneyMismatch => {
            Err(invalid("attorney does not match the current assignment"))
        }
    }
}

pub(crate) async fn cleanup_stuck(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let report = state.engine.cleanup_stuck(Utc::now())?;
    Ok(Json(json!({
        "success": true,
        "fixed_count": report.fixed_count,
        "message": format!("{} stuck review(s) repaired", report.fixed_count),
        "details": report.details,
    })))
}
