use chrono::{DateTime, Utc};
use std::sync::Arc;

use exam_core::model::{CertificationId, TestKind, TestResult};
use storage::repository::AttemptRepository;

use crate::Clock;
use super::queries::ExamQueries;
use crate::error::ExamError;

/// Storage identifier for a persisted attempt (the `SQLite` rowid).
pub type AttemptId = i64;

/// One row of the attempt history list.
///
/// Carries raw counts and timestamps only; formatting and localization stay
/// with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: AttemptId,
    pub kind: TestKind,
    pub completed_at: DateTime<Utc>,

    pub total_questions: u32,
    pub correct_count: u32,
    pub score_percent: u8,
    pub passed: bool,
}

/// Latest attempt per certification, preserving certification identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptLatestItem {
    pub certification_id: CertificationId,
    pub id: AttemptId,
    pub kind: TestKind,
    pub completed_at: DateTime<Utc>,

    pub total_questions: u32,
    pub correct_count: u32,
    pub score_percent: u8,
    pub passed: bool,
}

impl AttemptListItem {
    /// Build a list item from a stored attempt row.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Result` if the stored counts are inconsistent.
    pub fn from_row(row: &storage::repository::AttemptRow) -> Result<Self, ExamError> {
        let result = row.record.to_result()?;
        Ok(Self {
            id: row.id,
            kind: row.record.kind,
            completed_at: row.record.completed_at,
            total_questions: result.total_questions(),
            correct_count: result.correct_count(),
            score_percent: result.score_percent(),
            passed: result.passed(),
        })
    }
}

impl AttemptLatestItem {
    /// Build a latest-per-certification item from a stored attempt row.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Result` if the stored counts are inconsistent.
    pub fn from_row(row: &storage::repository::AttemptRow) -> Result<Self, ExamError> {
        let result = row.record.to_result()?;
        Ok(Self {
            certification_id: row.record.certification_id,
            id: row.id,
            kind: row.record.kind,
            completed_at: row.record.completed_at,
            total_questions: result.total_questions(),
            correct_count: result.correct_count(),
            score_percent: result.score_percent(),
            passed: result.passed(),
        })
    }
}

/// Read side of the attempt history.
///
/// Holds the clock and the attempt repository so callers only ever see list
/// items and rebuilt results.
#[derive(Clone)]
pub struct AttemptHistoryService {
    clock: Clock,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptHistoryService {
    #[must_use]
    pub fn new(clock: Clock, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { clock, attempts }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(
            clock,
            Arc::new(storage::repository::InMemoryRepository::new()),
        )
    }

    /// Load recent attempts for a certification, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` on repository failures, or
    /// `ExamError::Result` if a stored attempt is inconsistent.
    pub async fn list_recent_attempts(
        &self,
        certification_id: CertificationId,
        days: i64,
        limit: u32,
    ) -> Result<Vec<AttemptListItem>, ExamError> {
        let now = self.clock.now();
        let rows = ExamQueries::list_recent_attempt_rows(
            certification_id,
            self.attempts.as_ref(),
            now,
            days,
            limit,
        )
        .await?;

        rows.iter().map(AttemptListItem::from_row).collect()
    }

    /// Load the latest attempt per certification.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` on repository failures, or
    /// `ExamError::Result` if a stored attempt is inconsistent.
    pub async fn list_latest_by_certification(
        &self,
        certification_ids: &[CertificationId],
    ) -> Result<Vec<AttemptLatestItem>, ExamError> {
        let rows =
            ExamQueries::list_latest_attempt_rows(certification_ids, self.attempts.as_ref())
                .await?;
        rows.iter().map(AttemptLatestItem::from_row).collect()
    }

    /// Fetch one stored attempt by ID.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` if the attempt is missing or storage
    /// fails.
    pub async fn get_attempt(
        &self,
        id: AttemptId,
    ) -> Result<storage::repository::AttemptRow, ExamError> {
        ExamQueries::get_attempt_row(id, self.attempts.as_ref()).await
    }

    /// Rebuild the full scored result of a stored attempt, domain breakdown
    /// included.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` if the attempt is missing, or
    /// `ExamError::Result` if the stored counts are inconsistent.
    pub async fn get_result(&self, id: AttemptId) -> Result<TestResult, ExamError> {
        let row = self.get_attempt(id).await?;
        let result = row.record.to_result()?;
        Ok(result)
    }
}
