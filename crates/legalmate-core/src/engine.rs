use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::{
    config::Config,
    db::Db,
    outcome::OutcomeDecider,
    types::{
        Attorney, CleanupReport, DocumentReview, RepairAction, RepairDetail, ReviewOutcome,
        ReviewStatus,
    },
};

/// A review is due for resolution once elapsed time reaches this multiple
/// of its estimated duration.
pub const COMPLETION_GRACE: f64 = 1.2;

/// Email of the designated fallback attorney, lazily created by the
/// sweeper on first assignment.
pub const FALLBACK_ATTORNEY_EMAIL: &str = "demo.attorney@legalmate.app";

/// Outcome of an explicit attorney action on a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Applied,
    NotFound,
    /// Review exists but is not currently in_review.
    NotInReview,
    /// Acting attorney does not match the current assignment.
    AttorneyMismatch,
}

/// Drives the review lifecycle: assignment sweep, completion sweep, and
/// the on-demand stuck-review cleanup. One instance per process, shared
/// between the background tick loop and the HTTP handlers.
pub struct ReviewEngine {
    pub db: Arc<Db>,
    pub config: Arc<Config>,
    pub decider: Arc<dyn OutcomeDecider>,
    /// Cooperative stop flag, checked once per tick.
    pub stop: Arc<AtomicBool>,
}

impl ReviewEngine {
    pub fn new(db: Arc<Db>, config: Arc<Config>, decider: Arc<dyn OutcomeDecider>) -> Self {
        Self {
            db,
            config,
            decider,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// One sweep tick: assign pending reviews, then resolve due ones.
    /// Each step is internally per-record fault-isolated; a step-level
    /// failure is surfaced so the caller can log and retry next tick.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        self.assign_pending(now).context("assignment sweep")?;
        self.complete_due(now).context("completion sweep")?;
        Ok(())
    }

    // ── Assignment sweep ──────────────────────────────────────────────────

    /// Scan pending, unassigned reviews and assign each to the fallback
    /// attorney. Per-review failures are logged and skipped; they never
    /// abort the batch. Returns the number of reviews assigned.
    pub fn assign_pending(&self, now: DateTime<Utc>) -> Result<usize> {
        let pending = self.db.list_pending_unassigned()?;
        if pending.is_empty() {
            return Ok(0);
        }
        let attorney = self.ensure_fallback_attorney(now)?;

        let mut assigned = 0usize;
        for review in pending {
            match self.assign_one(&review, &attorney, now) {
                Ok(true) => assigned += 1,
                Ok(false) => {} // lost the race to a concurrent writer
                Err(e) => warn!("assign review {}: {e}", review.id),
            }
        }
        if assigned > 0 {
            info!("assignment sweep: {assigned} review(s) assigned to {}", attorney.id);
        }
        Ok(assigned)
    }

    fn assign_one(
        &self,
        review: &DocumentReview,
        attorney: &Attorney,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let estimate = self.draw_estimate();
        let ok = self
            .db
            .assign_review(&review.id, &attorney.id, now, estimate)?;
        if ok {
            info!(
                "review {} assigned to {} (estimate {:.1}h)",
                review.id, attorney.id, estimate
            );
        }
        Ok(ok)
    }

    /// Uniform draw from the configured estimated-review-time range.
    fn draw_estimate(&self) -> f64 {
        let lo = self.config.estimate_min_hours;
        let hi = self.config.estimate_max_hours.max(lo);
        if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        }
    }

    /// Find or lazily create the designated fallback attorney.
    pub fn ensure_fallback_attorney(&self, now: DateTime<Utc>) -> Result<Attorney> {
        if let Some(attorney) = self.db.get_attorney_by_email(FALLBACK_ATTORNEY_EMAIL)? {
            return Ok(attorney);
        }
        let attorney = Attorney {
            id: uuid::Uuid::new_v4().to_string(),
            name: "Demo Attorney".to_string(),
            email: FALLBACK_ATTORNEY_EMAIL.to_string(),
            password_hash: String::new(),
            bar_number: "DEMO-0001".to_string(),
            jurisdiction: "CA".to_string(),
            role: "reviewing_attorney".to_string(),
            specializations: vec!["contracts".to_string()],
            is_available: true,
            is_active: true,
            current_review_count: 0,
            max_concurrent_reviews: 10,
            average_review_time: 2.0,
            created_at: now,
            last_login: None,
        };
        self.db.insert_attorney(&attorney)?;
        info!("created fallback attorney {}", attorney.id);
        Ok(attorney)
    }

    // ── Completion sweep ──────────────────────────────────────────────────

    /// Resolve in_review records whose elapsed time has reached
    /// `COMPLETION_GRACE` times their estimate. The verdict comes from the
    /// pluggable decider; the default weighted-random one is a simulation
    /// stand-in for real attorney review. Returns the number resolved.
    pub fn complete_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let in_review = self.db.list_in_review()?;
        let mut resolved = 0usize;

        for review in in_review {
            let (Some(assigned), Some(est)) = (review.assignment_date, review.estimated_review_time)
            else {
                // Stuck-review bug class; left for cleanup_stuck.
                continue;
            };
            let elapsed_hours = (now - assigned).num_seconds() as f64 / 3600.0;
            if elapsed_hours < COMPLETION_GRACE * est {
                continue;
            }
            let outcome = self.decider.decide(&review);
            let comment = match outcome {
                ReviewOutcome::Approved => format!(
                    "Simulated review complete after {elapsed_hours:.1}h \
                     (estimated {est:.1}h): document approved."
                ),
                ReviewOutcome::NeedsRevision => format!(
                    "Simulated review complete after {elapsed_hours:.1}h \
                     (estimated {est:.1}h): revisions requested."
                ),
            };
            match self
                .db
                .resolve_review(&review.id, outcome.status(), now, &comment, None, None)
            {
                Ok(true) => {
                    resolved += 1;
                    info!("review {} resolved: {}", review.id, outcome.status().as_str());
                }
                Ok(false) => {}
                Err(e) => warn!("resolve review {}: {e}", review.id),
            }
        }
        Ok(resolved)
    }

    // ── Stuck-review cleanup ──────────────────────────────────────────────

    /// On-demand repair pass for reviews violating the lifecycle
    /// invariants. Exists because the sweep guarantee is eventual, not
    /// exactly-once-promptly, and partial writes (status flipped without
    /// an assignment date) are observed in practice. Idempotent: a second
    /// immediate run repairs nothing.
    pub fn cleanup_stuck(&self, now: DateTime<Utc>) -> Result<CleanupReport> {
        let mut details = Vec::new();

        // Pending and unassigned beyond the staleness threshold: the
        // normal sweep missed them, assign exactly as it would have.
        let threshold = Duration::seconds(self.config.stuck_after_s);
        let stale: Vec<DocumentReview> = self
            .db
            .list_pending_unassigned()?
            .into_iter()
            .filter(|r| now - r.created_at > threshold)
            .collect();

        if !stale.is_empty() {
            let attorney = self.ensure_fallback_attorney(now)?;
            for review in stale {
                match self.assign_one(&review, &attorney, now) {
                    Ok(true) => details.push(RepairDetail {
                        review_id: review.id.clone(),
                        action: RepairAction::Assigned,
                        note: format!("stale pending review assigned to {}", attorney.id),
                    }),
                    Ok(false) => {}
                    Err(e) => warn!("cleanup assign {}: {e}", review.id),
                }
            }
        }

        // pending with a dangling attorney reference: invisible to the
        // normal sweep, which only scans unassigned rows. Keep the
        // referenced attorney if it resolves to an active record, otherwise
        // reassign to the fallback, and complete the assignment either way.
        let orphaned: Vec<DocumentReview> = self
            .db
            .list_pending_assigned()?
            .into_iter()
            .filter(|r| now - r.created_at > threshold)
            .collect();

        for review in orphaned {
            let referenced = review.assigned_attorney_id.clone().unwrap_or_default();
            warn!(
                "inconsistent review {}: pending with attorney reference {referenced}",
                review.id
            );
            let attorney = match self.db.get_attorney(&referenced)? {
                Some(a) if a.is_active => a,
                _ => self.ensure_fallback_attorney(now)?,
            };
            let estimate = self.draw_estimate();
            match self
                .db
                .repair_pending_assigned(&review.id, &attorney.id, now, estimate)
            {
                Ok(true) => details.push(RepairDetail {
                    review_id: review.id.clone(),
                    action: RepairAction::Assigned,
                    note: format!(
                        "half-written assignment completed; review assigned to {}",
                        attorney.id
                    ),
                }),
                Ok(false) => {}
                Err(e) => warn!("cleanup reassign {}: {e}", review.id),
            }
        }

        // in_review with no assignment date: backfill a recent-past date so
        // the progress estimator reports a plausible in-flight percentage.
        let broken: Vec<DocumentReview> = self
            .db
            .list_in_review()?
            .into_iter()
            .filter(|r| r.assignment_date.is_none())
            .collect();

        if !broken.is_empty() {
            let attorney = self.ensure_fallback_attorney(now)?;
            for review in broken {
                warn!(
                    "inconsistent review {}: in_review with no assignment date",
                    review.id
                );
                let backdate_secs = rand::thread_rng().gen_range(360..=3600); // 0.1h..1.0h
                let backdated = now - Duration::seconds(backdate_secs);
                let estimate = self.draw_estimate();
                match self
                    .db
                    .repair_in_review(&review.id, &attorney.id, backdated, estimate)
                {
                    Ok(true) => details.push(RepairDetail {
                        review_id: review.id.clone(),
                        action: RepairAction::BackfilledAssignment,
                        note: format!("assignment date backfilled to {}", backdated.to_rfc3339()),
                    }),
                    Ok(false) => {}
                    Err(e) => warn!("cleanup backfill {}: {e}", review.id),
                }
            }
        }

        if !details.is_empty() {
            info!("cleanup repaired {} stuck review(s)", details.len());
        }
        Ok(CleanupReport {
            fixed_count: details.len(),
            details,
        })
    }

    // ── Explicit attorney action ──────────────────────────────────────────

    /// Human-in-the-loop override: the assigned attorney resolves a review
    /// directly, ahead of (or instead of) the completion sweep.
    pub fn apply_action(
        &self,
        review_id: &str,
        attorney_id: &str,
        outcome: ReviewOutcome,
        comments: &str,
        approved_content: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ActionResult> {
        let Some(review) = self.db.get_review(review_id)? else {
            return Ok(ActionResult::NotFound);
        };
        if review.status != ReviewStatus::InReview {
            return Ok(ActionResult::NotInReview);
        }
        if review.assigned_attorney_id.as_deref() != Some(attorney_id) {
            return Ok(ActionResult::AttorneyMismatch);
        }
        let ok = self.db.resolve_review(
            review_id,
            outcome.status(),
            now,
            comments,
            approved_content,
            Some(attorney_id),
        )?;
        if ok {
            info!(
                "review {review_id} resolved by attorney {attorney_id}: {}",
                outcome.status().as_str()
            );
            Ok(ActionResult::Applied)
        } else {
            // Raced with the completion sweep between the read and the write.
            Ok(ActionResult::NotInReview)
        }
    }
}
