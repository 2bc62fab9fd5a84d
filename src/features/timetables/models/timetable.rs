use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for a stored opening interval
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TimetableInterval {
    pub id: Uuid,
    pub place_id: Uuid,
    pub start_min: i32,
    pub end_min: i32,
    pub created_at: DateTime<Utc>,
}

/// Interval supplied by a caller, week-space minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IntervalParams {
    pub start_min: i32,
    pub end_min: i32,
}

/// Query window; `start_min > end_min` wraps past the week boundary
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeWindow {
    pub start_min: i32,
    pub end_min: i32,
}
