use chrono::{Duration, TimeZone, Utc};

use legalmate_core::progress::{estimate, Progress};
use legalmate_core::ReviewStatus;

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

#[test]
fn pending_is_zero_percent() {
    let p = estimate(ReviewStatus::Pending, None, None, t0());
    assert_eq!(p, Progress::Pending);
    assert_eq!(p.percentage(), Some(0));
    assert_eq!(p.completion_label(), None);
}

#[test]
fn terminal_statuses_are_complete() {
    for status in [ReviewStatus::Approved, ReviewStatus::NeedsRevision] {
        let p = estimate(status, Some(t0()), Some(2.0), t0() + Duration::hours(1));
        assert_eq!(p, Progress::Complete);
        assert_eq!(p.percentage(), Some(100));
    }
}

#[test]
fn halfway_through_estimate_is_fifty_percent() {
    let assigned = t0();
    let p = estimate(
        ReviewStatus::InReview,
        Some(assigned),
        Some(2.0),
        assigned + Duration::hours(1),
    );
    assert_eq!(p.percentage(), Some(50));
    let Progress::InFlight {
        estimated_completion,
        overdue,
        ..
    } = p
    else {
        panic!("expected in-flight progress, got {p:?}");
    };
    assert_eq!(estimated_completion, assigned + Duration::hours(2));
    assert!(!overdue);
}

#[test]
fn fresh_assignment_clamps_up_to_one() {
    let assigned = t0();
    let p = estimate(
        ReviewStatus::InReview,
        Some(assigned),
        Some(3.0),
        assigned + Duration::seconds(5),
    );
    assert_eq!(p.percentage(), Some(1));
}

#[test]
fn long_overdue_clamps_down_to_ninety_nine() {
    let assigned = t0();
    let p = estimate(
        ReviewStatus::InReview,
        Some(assigned),
        Some(1.0),
        assigned + Duration::hours(48),
    );
    assert_eq!(p.percentage(), Some(99));
    assert_eq!(p.completion_label().as_deref(), Some("Overdue"));
}

#[test]
fn completion_label_is_rfc3339_before_due() {
    let assigned = t0();
    let p = estimate(
        ReviewStatus::InReview,
        Some(assigned),
        Some(2.0),
        assigned + Duration::minutes(30),
    );
    let label = p.completion_label().expect("in-flight label");
    assert_eq!(label, (assigned + Duration::hours(2)).to_rfc3339());
}

#[test]
fn missing_assignment_date_is_unknown() {
    let p = estimate(ReviewStatus::InReview, None, Some(2.0), t0());
    assert_eq!(p, Progress::Unknown);
    assert_eq!(p.percentage(), None);
}

#[test]
fn missing_or_zero_estimate_is_unknown() {
    assert_eq!(
        estimate(ReviewStatus::InReview, Some(t0()), None, t0()),
        Progress::Unknown
    );
    assert_eq!(
        estimate(ReviewStatus::InReview, Some(t0()), Some(0.0), t0()),
        Progress::Unknown
    );
}

#[test]
fn percentage_never_decreases_over_time() {
    let assigned = t0();
    let mut last = 0u8;
    for minutes in (0..600).step_by(7) {
        let p = estimate(
            ReviewStatus::InReview,
            Some(assigned),
            Some(2.5),
            assigned + Duration::minutes(minutes),
        );
        let pct = p.percentage().expect("in-flight percentage");
        assert!(pct >= last, "progress went backwards at minute {minutes}");
        assert!((1..=99).contains(&pct));
        last = pct;
    }
}
