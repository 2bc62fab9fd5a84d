use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::tx;
use crate::features::timetables::models::{IntervalParams, TimetableInterval};
use crate::shared::constants::MAX_INTERVALS_PER_PLACE;
use crate::shared::week::{self, WEEK_MINUTES};

const INTERVAL_COLUMNS: &str = "id, place_id, start_min, end_min, created_at";

/// Rejects malformed or mutually overlapping intervals.
///
/// Each interval must satisfy `0 <= start < end < 10080`; the set is
/// capped and must be pairwise disjoint.
pub fn validate_intervals(intervals: &[IntervalParams]) -> Result<()> {
    if intervals.len() > MAX_INTERVALS_PER_PLACE {
        return Err(AppError::Validation(format!(
            "At most {} timetable intervals are allowed per place, got {}",
            MAX_INTERVALS_PER_PLACE,
            intervals.len()
        )));
    }

    for interval in intervals {
        let in_range = (0..WEEK_MINUTES).contains(&interval.start_min)
            && (0..WEEK_MINUTES).contains(&interval.end_min);
        if !in_range || interval.start_min >= interval.end_min {
            return Err(AppError::Validation(format!(
                "Malformed interval [{}, {}): expected 0 <= start < end < {}",
                interval.start_min, interval.end_min, WEEK_MINUTES
            )));
        }
    }

    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|i| i.start_min);
    for pair in sorted.windows(2) {
        if pair[1].start_min < pair[0].end_min {
            return Err(AppError::Conflict(format!(
                "Intervals [{}, {}) and [{}, {}) overlap",
                pair[0].start_min, pair[0].end_min, pair[1].start_min, pair[1].end_min
            )));
        }
    }

    Ok(())
}

/// Service for place timetable operations
pub struct TimetableService {
    pool: PgPool,
}

impl TimetableService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace the whole interval set of a place
    ///
    /// Delete-then-insert inside one transaction; the exclusion
    /// constraint backs up the in-memory overlap check.
    pub async fn set(
        &self,
        place_id: Uuid,
        intervals: &[IntervalParams],
    ) -> Result<Vec<TimetableInterval>> {
        self.ensure_place_exists(place_id).await?;
        validate_intervals(intervals)?;

        let mut sorted = intervals.to_vec();
        sorted.sort_by_key(|i| i.start_min);

        let inserted = tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query("DELETE FROM place_timetables WHERE place_id = $1")
                    .bind(place_id)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to clear timetable: {:?}", e);
                        AppError::Database(e)
                    })?;

                let mut rows = Vec::with_capacity(sorted.len());
                for interval in &sorted {
                    let row: TimetableInterval = sqlx::query_as(
                        r#"
                        INSERT INTO place_timetables (place_id, start_min, end_min)
                        VALUES ($1, $2, $3)
                        RETURNING id, place_id, start_min, end_min, created_at
                        "#,
                    )
                    .bind(place_id)
                    .bind(interval.start_min)
                    .bind(interval.end_min)
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to insert timetable interval: {:?}", e);
                        AppError::Database(e)
                    })?;
                    rows.push(row);
                }

                Ok(rows)
            })
        })
        .await
        .map_err(|e| {
            if e.is_exclusion_violation() {
                AppError::Conflict(format!(
                    "Timetable intervals overlap for place {}",
                    place_id
                ))
            } else {
                e
            }
        })?;

        tracing::info!(
            "Set timetable for place {}: {} intervals",
            place_id,
            inserted.len()
        );
        Ok(inserted)
    }

    /// All intervals of a place, ordered by start
    pub async fn list(&self, place_id: Uuid) -> Result<Vec<TimetableInterval>> {
        self.ensure_place_exists(place_id).await?;
        self.fetch_intervals(place_id).await
    }

    /// Intervals of a place intersecting a (possibly wrapping) window
    ///
    /// Bounds are normalized into week space first; a zero-length
    /// window matches nothing.
    pub async fn window_match(
        &self,
        place_id: Uuid,
        start_min: i32,
        end_min: i32,
    ) -> Result<Vec<TimetableInterval>> {
        self.ensure_place_exists(place_id).await?;
        let intervals = self.fetch_intervals(place_id).await?;
        Ok(intervals
            .into_iter()
            .filter(|i| week::window_intersects((i.start_min, i.end_min), start_min, end_min))
            .collect())
    }

    /// Remove every interval of a place
    pub async fn delete(&self, place_id: Uuid) -> Result<()> {
        self.ensure_place_exists(place_id).await?;

        let result = sqlx::query("DELETE FROM place_timetables WHERE place_id = $1")
            .bind(place_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete timetable: {:?}", e);
                AppError::Database(e)
            })?;

        tracing::info!(
            "Deleted timetable for place {} ({} intervals)",
            place_id,
            result.rows_affected()
        );
        Ok(())
    }

    async fn fetch_intervals(&self, place_id: Uuid) -> Result<Vec<TimetableInterval>> {
        sqlx::query_as::<_, TimetableInterval>(&format!(
            "SELECT {} FROM place_timetables WHERE place_id = $1 ORDER BY start_min",
            INTERVAL_COLUMNS
        ))
        .bind(place_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list timetable: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn ensure_place_exists(&self, place_id: Uuid) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM places WHERE id = $1)")
            .bind(place_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to check place existence: {:?}", e);
                AppError::Database(e)
            })?;
        if !exists {
            return Err(AppError::NotFound(format!("Place {} not found", place_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start_min: i32, end_min: i32) -> IntervalParams {
        IntervalParams { start_min, end_min }
    }

    #[test]
    fn test_validate_accepts_disjoint_set() {
        let intervals = vec![interval(540, 1020), interval(1980, 2460), interval(0, 60)];
        assert!(validate_intervals(&intervals).is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_interval() {
        let err = validate_intervals(&[interval(1020, 540)]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(validate_intervals(&[interval(-10, 60)]).is_err());
        assert!(validate_intervals(&[interval(10_000, 10_080)]).is_err());
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let err = validate_intervals(&[interval(540, 1020), interval(1000, 1100)]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_validate_accepts_touching_intervals() {
        // half-open: [540,600) and [600,660) share no minute
        assert!(validate_intervals(&[interval(540, 600), interval(600, 660)]).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_set() {
        let intervals: Vec<IntervalParams> = (0..=MAX_INTERVALS_PER_PLACE as i32)
            .map(|i| interval(i * 2, i * 2 + 1))
            .collect();
        let err = validate_intervals(&intervals).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
