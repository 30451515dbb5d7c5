//! Pluggable review-outcome resolution.
//!
//! The default decider is a weighted coin flip: it is a simulation
//! stand-in for real attorney judgment, not a quality-assessment
//! algorithm. A production deployment substitutes a human-action or
//! classifier-backed implementation without touching the sweeper.

use rand::Rng;

use crate::types::{DocumentReview, ReviewOutcome};

pub trait OutcomeDecider: Send + Sync {
    fn decide(&self, review: &DocumentReview) -> ReviewOutcome;
}

/// Weighted random outcome: approve with `approve_probability`, otherwise
/// needs_revision.
pub struct WeightedRandomDecider {
    pub approve_probability: f64,
}

impl WeightedRandomDecider {
    pub fn new(approve_probability: f64) -> Self {
        Self {
            approve_probability: approve_probability.clamp(0.0, 1.0),
        }
    }
}

impl OutcomeDecider for WeightedRandomDecider {
    fn decide(&self, _review: &DocumentReview) -> ReviewOutcome {
        if rand::thread_rng().gen_bool(self.approve_probability) {
            ReviewOutcome::Approved
        } else {
            ReviewOutcome::NeedsRevision
        }
    }
}
