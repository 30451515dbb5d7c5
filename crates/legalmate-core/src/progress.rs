//! Review progress estimation.
//!
//! Pure functions of (status, assignment date, estimated duration, now);
//! nothing here touches the store. Progress is derived on every read and
//! never persisted.

use chrono::{DateTime, Duration, Utc};

use crate::types::{DocumentReview, ReviewStatus};

/// Derived progress of a review at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Submitted, not yet assigned: 0%.
    Pending,
    /// Under review with a known assignment date and estimate.
    InFlight {
        /// Clamped to 1..=99; 100 is reserved for actual completion.
        percentage: u8,
        estimated_completion: DateTime<Utc>,
        overdue: bool,
    },
    /// in_review but the assignment date is missing (stuck-review bug
    /// class): progress cannot be computed. Callers must render this as
    /// unknown, not as a fixed constant.
    Unknown,
    /// Terminal: 100%.
    Complete,
}

impl Progress {
    pub fn percentage(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::InFlight { percentage, .. } => Some(*percentage),
            Self::Unknown => None,
            Self::Complete => Some(100),
        }
    }

    /// Human label for the expected completion time, "Overdue" once past it.
    pub fn completion_label(&self) -> Option<String> {
        match self {
            Self::InFlight {
                estimated_completion,
                overdue,
                ..
            } => {
                if *overdue {
                    Some("Overdue".to_string())
                } else {
                    Some(estimated_completion.to_rfc3339())
                }
            }
            _ => None,
        }
    }
}

/// Estimate progress for a review as observed at `now`.
pub fn estimate(
    status: ReviewStatus,
    assignment_date: Option<DateTime<Utc>>,
    estimated_hours: Option<f64>,
    now: DateTime<Utc>,
) -> Progress {
    match status {
        ReviewStatus::Pending => Progress::Pending,
        ReviewStatus::Approved | ReviewStatus::NeedsRevision => Progress::Complete,
        ReviewStatus::InReview => match (assignment_date, estimated_hours) {
            (Some(assigned), Some(est)) if est > 0.0 => {
                let elapsed_hours = (now - assigned).num_seconds() as f64 / 3600.0;
                let raw = (100.0 * elapsed_hours / est).round() as i64;
                let percentage = raw.clamp(1, 99) as u8;
                let estimated_completion = assigned + Duration::seconds((est * 3600.0) as i64);
                Progress::InFlight {
                    percentage,
                    estimated_completion,
                    overdue: now > estimated_completion,
                }
            }
            _ => Progress::Unknown,
        },
    }
}

/// Convenience wrapper over a fetched review row.
pub fn for_review(review: &DocumentReview, now: DateTime<Utc>) -> Progress {
    estimate(
        review.status,
        review.assignment_date,
        review.estimated_review_time,
        now,
    )
}
