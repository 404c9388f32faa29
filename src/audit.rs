//! Append-only JSONL audit log of user lifecycle actions.

use crate::deactivation::CascadeReport;
use crate::error::{ApiError, CategoryFailures};
use crate::model::{BookingCategory, FutureBookings, UserId};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct AuditLog {
    pub path: Option<PathBuf>,
    session_id: String,
    operator: Option<String>,
    file: Option<File>,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<&'a str>,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl AuditLog {
    /// Open `<dir>/<session_id>.jsonl` for appending
    pub fn open(dir: &Path, session_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", session_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path: Some(path),
            session_id: session_id.to_string(),
            operator: std::env::var("USER").ok(),
            file: Some(file),
        })
    }

    /// A log that records nothing
    pub fn disabled(session_id: &str) -> Self {
        Self {
            path: None,
            session_id: session_id.to_string(),
            operator: None,
            file: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            operator: self.operator.as_deref(),
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    pub fn users_loaded(&mut self, count: usize) -> Result<()> {
        self.log("users_loaded", serde_json::json!({ "count": count }))
    }

    pub fn deactivation_evaluated(
        &mut self,
        user_id: &UserId,
        bookings: &FutureBookings,
    ) -> Result<()> {
        self.log(
            "deactivation_evaluated",
            serde_json::json!({
                "user_id": user_id,
                "facility": bookings.count(BookingCategory::Facility),
                "equipment": bookings.count(BookingCategory::Equipment),
                "session": bookings.count(BookingCategory::Session),
            }),
        )
    }

    pub fn future_bookings_cancelled(
        &mut self,
        user_id: &UserId,
        report: &CascadeReport,
    ) -> Result<()> {
        self.log(
            "future_bookings_cancelled",
            serde_json::json!({ "user_id": user_id, "outcome": report }),
        )
    }

    /// Log one hard failure per category so partial cascades can be traced
    pub fn category_failures(
        &mut self,
        user_id: &UserId,
        step: &str,
        failures: &CategoryFailures,
    ) -> Result<()> {
        for (category, err) in &failures.0 {
            self.category_failed(user_id, step, *category, err)?;
        }
        Ok(())
    }

    pub fn category_failed(
        &mut self,
        user_id: &UserId,
        step: &str,
        category: BookingCategory,
        err: &ApiError,
    ) -> Result<()> {
        self.log(
            "category_failed",
            serde_json::json!({
                "user_id": user_id,
                "step": step,
                "category": category,
                "error": err.to_string(),
            }),
        )
    }

    pub fn status_changed(&mut self, user_id: &UserId, is_active: bool) -> Result<()> {
        self.log(
            "status_changed",
            serde_json::json!({ "user_id": user_id, "is_active": is_active }),
        )
    }

    pub fn workflow_dismissed(&mut self, left_state: &str) -> Result<()> {
        self.log(
            "workflow_dismissed",
            serde_json::json!({ "left_state": left_state }),
        )
    }

    pub fn workflow_error(&mut self, action: &str, error: &str) -> Result<()> {
        self.log(
            "workflow_error",
            serde_json::json!({ "action": action, "error": error }),
        )
    }
}
