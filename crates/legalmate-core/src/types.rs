use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Review lifecycle enums ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Submitted, not yet assigned to an attorney.
    Pending,
    /// Assigned and under (simulated) attorney review.
    InReview,
    Approved,
    NeedsRevision,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::NeedsRevision => "needs_revision",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "approved" => Some(Self::Approved),
            "needs_revision" => Some(Self::NeedsRevision),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::NeedsRevision)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Terminal verdict on a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved,
    NeedsRevision,
}

impl ReviewOutcome {
    pub fn status(self) -> ReviewStatus {
        match self {
            Self::Approved => ReviewStatus::Approved,
            Self::NeedsRevision => ReviewStatus::NeedsRevision,
        }
    }
}

// ── Attorney ─────────────────────────────────────────────────────────────

/// An attorney account as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attorney {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string; never serialized to API responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bar_number: String,
    pub jurisdiction: String,
    /// "reviewing_attorney" | "supervising_attorney" (open set).
    pub role: String,
    pub specializations: Vec<String>,
    pub is_available: bool,
    /// Soft delete; deactivated attorneys are never removed.
    pub is_active: bool,
    /// Count of reviews currently assigned and in_review. Never negative.
    pub current_review_count: i64,
    pub max_concurrent_reviews: i64,
    /// Average review duration in hours.
    pub average_review_time: f64,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Public subset of an attorney, joined into review status responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttorneyPublic {
    pub id: String,
    pub name: String,
}

impl From<&Attorney> for AttorneyPublic {
    fn from(a: &Attorney) -> Self {
        Self {
            id: a.id.clone(),
            name: a.name.clone(),
        }
    }
}

// ── Document review ──────────────────────────────────────────────────────

/// A submitted document moving through attorney review.
///
/// Invariant: once settled, `assigned_attorney_id` and `assignment_date`
/// are both present or both absent; `status == InReview` requires both.
/// Records violating this are the "stuck review" class repaired by
/// [`crate::engine::ReviewEngine::cleanup_stuck`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReview {
    pub id: String,
    pub document_content: String,
    pub document_type: String,
    pub client_id: String,
    /// Opaque echo of the generation request (JSON text).
    pub original_request: String,
    pub priority: Priority,
    pub status: ReviewStatus,
    pub assigned_attorney_id: Option<String>,
    pub assignment_date: Option<DateTime<Utc>>,
    /// Expected review duration in hours, drawn at assignment.
    pub estimated_review_time: Option<f64>,
    pub completion_date: Option<DateTime<Utc>>,
    pub attorney_comments: Option<String>,
    pub approved_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Cleanup report ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Stale pending review was assigned to the fallback attorney.
    Assigned,
    /// in_review record missing its assignment date had it backfilled.
    BackfilledAssignment,
}

/// One repaired record, itemized in the cleanup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairDetail {
    pub review_id: String,
    pub action: RepairAction,
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub fixed_count: usize,
    pub details: Vec<RepairDetail>,
}
