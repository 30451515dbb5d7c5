use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

use crate::types::{Attorney, DocumentReview, Priority, ReviewStatus};

const SCHEMA_SQL: &str = include_str!("../../../schema.sql");

pub struct Db {
    conn: Mutex<Connection>,
}

// ── Timestamp helpers ─────────────────────────────────────────────────────

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(|_| {
            tracing::warn!("unparseable stored timestamp {s:?}, substituting current time");
            Utc::now()
        })
}

fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|v| parse_ts(&v))
}

// ── Row mappers ───────────────────────────────────────────────────────────

const ATTORNEY_COLS: &str = "id, name, email, password_hash, bar_number, jurisdiction, role, \
     specializations, is_available, is_active, current_review_count, \
     max_concurrent_reviews, average_review_time, created_at, last_login";

fn row_to_attorney(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attorney> {
    let specializations_raw: String = row.get(7)?;
    let created_at_str: String = row.get(13)?;
    Ok(Attorney {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        bar_number: row.get(4)?,
        jurisdiction: row.get(5)?,
        role: row.get(6)?,
        specializations: serde_json::from_str(&specializations_raw).unwrap_or_default(),
        is_available: row.get::<_, i64>(8)? != 0,
        is_active: row.get::<_, i64>(9)? != 0,
        current_review_count: row.get(10)?,
        max_concurrent_reviews: row.get(11)?,
        average_review_time: row.get(12)?,
        created_at: parse_ts(&created_at_str),
        last_login: parse_opt_ts(row.get(14)?),
    })
}

const REVIEW_COLS: &str = "id, document_content, document_type, client_id, original_request, \
     priority, status, assigned_attorney_id, assignment_date, \
     estimated_review_time, completion_date, attorney_comments, \
     approved_content, created_at";

fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentReview> {
    let priority_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(13)?;
    Ok(DocumentReview {
        id: row.get(0)?,
        document_content: row.get(1)?,
        document_type: row.get(2)?,
        client_id: row.get(3)?,
        original_request: row.get(4)?,
        priority: Priority::parse(&priority_str).unwrap_or_default(),
        status: ReviewStatus::parse(&status_str).unwrap_or(ReviewStatus::Pending),
        assigned_attorney_id: row.get(7)?,
        assignment_date: parse_opt_ts(row.get(8)?),
        estimated_review_time: row.get(9)?,
        completion_date: parse_opt_ts(row.get(10)?),
        attorney_comments: row.get(11)?,
        approved_content: row.get(12)?,
        created_at: parse_ts(&created_at_str),
    })
}

// ── Db impl ───────────────────────────────────────────────────────────────

impl Db {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database at {path:?}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("failed to set PRAGMAs")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute_batch(SCHEMA_SQL)
            .context("failed to apply schema migrations")?;
        Ok(())
    }

    // ── Attorneys ─────────────────────────────────────────────────────────

    pub fn insert_attorney(&self, attorney: &Attorney) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let specializations = serde_json::to_string(&attorney.specializations)
            .context("serialize specializations")?;
        conn.execute(
            "INSERT INTO attorneys \
             (id, name, email, password_hash, bar_number, jurisdiction, role, \
              specializations, is_available, is_active, current_review_count, \
              max_concurrent_reviews, average_review_time, created_at, last_login) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                attorney.id,
                attorney.name,
                attorney.email,
                attorney.password_hash,
                attorney.bar_number,
                attorney.jurisdiction,
                attorney.role,
                specializations,
                i64::from(attorney.is_available),
                i64::from(attorney.is_active),
                attorney.current_review_count,
                attorney.max_concurrent_reviews,
                attorney.average_review_time,
                fmt_ts(attorney.created_at),
                attorney.last_login.map(fmt_ts),
            ],
        )
        .context("insert_attorney")?;
        Ok(())
    }

    pub fn get_attorney(&self, id: &str) -> Result<Option<Attorney>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            &format!("SELECT {ATTORNEY_COLS} FROM attorneys WHERE id = ?1"),
            params![id],
            row_to_attorney,
        )
        .optional()
        .context("get_attorney")
    }

    /// Lookup by email, including soft-deleted rows: `email` is UNIQUE at
    /// the schema level, so a deactivated attorney still occupies it.
    pub fn get_attorney_by_email(&self, email: &str) -> Result<Option<Attorney>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            &format!("SELECT {ATTORNEY_COLS} FROM attorneys WHERE email = ?1"),
            params![email],
            row_to_attorney,
        )
        .optional()
        .context("get_attorney_by_email")
    }

    // ── Document reviews ──────────────────────────────────────────────────

    pub fn insert_review(&self, review: &DocumentReview) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO document_reviews \
             (id, document_content, document_type, client_id, original_request, \
              priority, status, assigned_attorney_id, assignment_date, \
              estimated_review_time, completion_date, attorney_comments, \
              approved_content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                review.id,
                review.document_content,
                review.document_type,
                review.client_id,
                review.original_request,
                review.priority.as_str(),
                review.status.as_str(),
                review.assigned_attorney_id,
                review.assignment_date.map(fmt_ts),
                review.estimated_review_time,
                review.completion_date.map(fmt_ts),
                review.attorney_comments,
                review.approved_content,
                fmt_ts(review.created_at),
            ],
        )
        .context("insert_review")?;
        Ok(())
    }

    pub fn get_review(&self, id: &str) -> Result<Option<DocumentReview>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            &format!("SELECT {REVIEW_COLS} FROM document_reviews WHERE id = ?1"),
            params![id],
            row_to_review,
        )
        .optional()
        .context("get_review")
    }

    pub fn list_pending_unassigned(&self) -> Result<Vec<DocumentReview>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLS} FROM document_reviews \
             WHERE status = 'pending' AND assigned_attorney_id IS NULL \
             ORDER BY created_at ASC"
        ))?;
        let reviews = stmt
            .query_map([], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_pending_unassigned")?;
        Ok(reviews)
    }

    /// Pending rows that already carry an attorney reference. A malformed
    /// state: submission never sets one, and the assignment sweep only
    /// scans unassigned rows, so these are invisible to it.
    pub fn list_pending_assigned(&self) -> Result<Vec<DocumentReview>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLS} FROM document_reviews \
             WHERE status = 'pending' AND assigned_attorney_id IS NOT NULL \
             ORDER BY created_at ASC"
        ))?;
        let reviews = stmt
            .query_map([], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_pending_assigned")?;
        Ok(reviews)
    }

    pub fn list_in_review(&self) -> Result<Vec<DocumentReview>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLS} FROM document_reviews \
             WHERE status = 'in_review' ORDER BY created_at ASC"
        ))?;
        let reviews = stmt
            .query_map([], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_in_review")?;
        Ok(reviews)
    }

    pub fn list_attorney_active(&self, attorney_id: &str) -> Result<Vec<DocumentReview>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLS} FROM document_reviews \
             WHERE status = 'in_review' AND assigned_attorney_id = ?1 \
             ORDER BY assignment_date ASC"
        ))?;
        let reviews = stmt
            .query_map(params![attorney_id], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_attorney_active")?;
        Ok(reviews)
    }

    /// Counts of reviews by status: (pending, in_review, approved, needs_revision).
    pub fn review_stats(&self) -> Result<(i64, i64, i64, i64)> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count = |status: &str| -> Result<i64> {
            conn.query_row(
                "SELECT COUNT(*) FROM document_reviews WHERE status = ?1",
                params![status],
                |r| r.get(0),
            )
            .context("review_stats")
        };
        Ok((
            count("pending")?,
            count("in_review")?,
            count("approved")?,
            count("needs_revision")?,
        ))
    }

    // ── Transitions ───────────────────────────────────────────────────────
    //
    // Each transition is a single SQLite transaction covering both the
    // review row and the attorney workload counter, so the counter can
    // drift only if the process dies between restarts, not between writes.

    /// Assign a pending, unassigned review to an attorney. Returns false if
    /// the review was already assigned or no longer pending (lost race).
    pub fn assign_review(
        &self,
        review_id: &str,
        attorney_id: &str,
        now: DateTime<Utc>,
        estimate_hours: f64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.unchecked_transaction().context("assign_review tx")?;
        let changed = tx
            .execute(
                "UPDATE document_reviews \
                 SET status = 'in_review', assigned_attorney_id = ?1, \
                     assignment_date = ?2, estimated_review_time = ?3 \
                 WHERE id = ?4 AND status = 'pending' AND assigned_attorney_id IS NULL",
                params![attorney_id, fmt_ts(now), estimate_hours, review_id],
            )
            .context("assign_review update")?;
        if changed == 1 {
            tx.execute(
                "UPDATE attorneys SET current_review_count = current_review_count + 1 \
                 WHERE id = ?1",
                params![attorney_id],
            )
            .context("assign_review counter")?;
        }
        tx.commit().context("assign_review commit")?;
        Ok(changed == 1)
    }

    /// Complete a half-written assignment: a pending row already carrying
    /// an attorney reference gets the reference replaced with `attorney_id`,
    /// the assignment stamped, and the counter bumped. Returns false if the
    /// row was no longer in that state.
    pub fn repair_pending_assigned(
        &self,
        review_id: &str,
        attorney_id: &str,
        now: DateTime<Utc>,
        estimate_hours: f64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn
            .unchecked_transaction()
            .context("repair_pending_assigned tx")?;
        let changed = tx
            .execute(
                "UPDATE document_reviews \
                 SET status = 'in_review', assigned_attorney_id = ?1, \
                     assignment_date = ?2, estimated_review_time = ?3 \
                 WHERE id = ?4 AND status = 'pending' AND assigned_attorney_id IS NOT NULL",
                params![attorney_id, fmt_ts(now), estimate_hours, review_id],
            )
            .context("repair_pending_assigned update")?;
        if changed == 1 {
            tx.execute(
                "UPDATE attorneys SET current_review_count = current_review_count + 1 \
                 WHERE id = ?1",
                params![attorney_id],
            )
            .context("repair_pending_assigned counter")?;
        }
        tx.commit().context("repair_pending_assigned commit")?;
        Ok(changed == 1)
    }

    /// Resolve an in_review record to a terminal status, stamping the
    /// completion date and comments and decrementing the assigned
    /// attorney's workload counter. When `expected_attorney` is set, the
    /// update only applies if it matches the current assignment. Returns
    /// false if no row matched (already terminal, or attorney mismatch).
    pub fn resolve_review(
        &self,
        review_id: &str,
        status: ReviewStatus,
        now: DateTime<Utc>,
        comments: &str,
        approved_content: Option<&str>,
        expected_attorney: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.unchecked_transaction().context("resolve_review tx")?;

        let assigned: Option<String> = tx
            .query_row(
                "SELECT assigned_attorney_id FROM document_reviews \
                 WHERE id = ?1 AND status = 'in_review'",
                params![review_id],
                |r| r.get(0),
            )
            .optional()
            .context("resolve_review lookup")?
            .flatten();

        let changed = tx
            .execute(
                "UPDATE document_reviews \
                 SET status = ?1, completion_date = ?2, attorney_comments = ?3, \
                     approved_content = COALESCE(?4, approved_content) \
                 WHERE id = ?5 AND status = 'in_review' \
                 AND (?6 IS NULL OR assigned_attorney_id = ?6)",
                params![
                    status.as_str(),
                    fmt_ts(now),
                    comments,
                    approved_content,
                    review_id,
                    expected_attorney,
                ],
            )
            .context("resolve_review update")?;

        if changed == 1 {
            if let Some(attorney_id) = assigned {
                tx.execute(
                    "UPDATE attorneys \
                     SET current_review_count = MAX(0, current_review_count - 1) \
                     WHERE id = ?1",
                    params![attorney_id],
                )
                .context("resolve_review counter")?;
            }
        }
        tx.commit().context("resolve_review commit")?;
        Ok(changed == 1)
    }

    /// Repair an in_review record missing its assignment date: backfill the
    /// date, fill the estimate if absent, and assign `attorney_id` (bumping
    /// its counter) if the record also lost its attorney. Returns false if
    /// the record was no longer in the broken state.
    pub fn repair_in_review(
        &self,
        review_id: &str,
        attorney_id: &str,
        backdated: DateTime<Utc>,
        estimate_hours: f64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.unchecked_transaction().context("repair_in_review tx")?;

        let assigned: Option<String> = tx
            .query_row(
                "SELECT assigned_attorney_id FROM document_reviews \
                 WHERE id = ?1 AND status = 'in_review' AND assignment_date IS NULL",
                params![review_id],
                |r| r.get(0),
            )
            .optional()
            .context("repair_in_review lookup")?
            .flatten();

        let changed = tx
            .execute(
                "UPDATE document_reviews \
                 SET assignment_date = ?1, \
                     estimated_review_time = COALESCE(estimated_review_time, ?2), \
                     assigned_attorney_id = COALESCE(assigned_attorney_id, ?3) \
                 WHERE id = ?4 AND status = 'in_review' AND assignment_date IS NULL",
                params![fmt_ts(backdated), estimate_hours, attorney_id, review_id],
            )
            .context("repair_in_review update")?;

        // Counter is only owed when the repair also (re)assigned the attorney.
        if changed == 1 && assigned.is_none() {
            tx.execute(
                "UPDATE attorneys SET current_review_count = current_review_count + 1 \
                 WHERE id = ?1",
                params![attorney_id],
            )
            .context("repair_in_review counter")?;
        }
        tx.commit().context("repair_in_review commit")?;
        Ok(changed == 1)
    }

    // ── Config ────────────────────────────────────────────────────────────

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            "SELECT value FROM config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .context("get_config")
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, datetime('now')) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )
        .context("set_config")?;
        Ok(())
    }

    /// Seed a config key only if absent (first-run defaults).
    pub fn seed_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR IGNORE INTO config (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )
        .context("seed_config")?;
        Ok(())
    }
}
