use std::sync::Arc;

use exam_core::model::{CertificationId, DomainTag, SessionError, TestKind, TestResult, TestSession};
use storage::repository::{
    AttemptRecord, AttemptRepository, CertificationRepository, QuestionRepository,
};

use crate::Clock;
use super::queries::ExamQueries;
use crate::error::ExamError;
use super::ticker::{ActiveExam, CountdownTimer, SharedSession};

/// Result of submitting a test session.
///
/// `attempt_id` is `None` when the attempt could not be persisted; the score
/// itself is always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamOutcome {
    pub result: TestResult,
    pub attempt_id: Option<i64>,
}

/// Orchestrates exam start, submission, and attempt persistence.
#[derive(Clone)]
pub struct ExamFlowService {
    clock: Clock,
    certifications: Arc<dyn CertificationRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    shuffle: bool,
}

impl ExamFlowService {
    #[must_use]
    pub fn new(
        clock: Clock,
        certifications: Arc<dyn CertificationRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            certifications,
            questions,
            attempts,
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Start a new session for the given certification and test kind.
    ///
    /// An empty `domains` slice draws questions from every domain.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` for storage or session start failures.
    pub async fn start_session(
        &self,
        certification_id: CertificationId,
        kind: TestKind,
        domains: &[DomainTag],
    ) -> Result<TestSession, ExamError> {
        let now = self.clock.now();
        let (_certification, session) = ExamQueries::start_from_storage(
            certification_id,
            kind,
            domains,
            self.certifications.as_ref(),
            self.questions.as_ref(),
            now,
            self.shuffle,
        )
        .await?;
        Ok(session)
    }

    /// Start a session and put it on the countdown clock.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` for storage or session start failures.
    pub async fn launch_exam(
        &self,
        certification_id: CertificationId,
        kind: TestKind,
        domains: &[DomainTag],
    ) -> Result<ActiveExam, ExamError> {
        let session = self.start_session(certification_id, kind, domains).await?;
        let shared = SharedSession::new(session);
        let timer =
            CountdownTimer::spawn(shared.clone(), self.clock, Arc::clone(&self.attempts));
        Ok(ActiveExam::new(shared, timer))
    }

    /// Submit a session and persist the attempt.
    ///
    /// The score snapshot is computed first; if the store rejects the attempt
    /// the failure is logged and the outcome carries `attempt_id: None`.
    /// Submitting an already-completed session persists nothing new and
    /// returns the original outcome.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Session` if the session never completed.
    pub async fn submit_session(
        &self,
        session: &mut TestSession,
    ) -> Result<ExamOutcome, ExamError> {
        let now = self.clock.now();
        let _ = session.submit(now);
        let result = session
            .result()
            .cloned()
            .ok_or(SessionError::Completed)?;

        if session.attempt_id().is_none() {
            if let Some(record) = AttemptRecord::from_session(session) {
                match self.attempts.append_attempt(&record).await {
                    Ok(id) => session.set_attempt_id(id),
                    Err(e) => tracing::error!("Failed to persist attempt record: {:?}", e),
                }
            }
        }

        Ok(ExamOutcome {
            result,
            attempt_id: session.attempt_id(),
        })
    }

    /// Submit a running exam, stopping its countdown first.
    ///
    /// If the timer already expired, the auto-submitted result is returned
    /// and no second attempt row is written.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Poisoned` on lock poisoning.
    pub async fn submit_exam(&self, exam: &mut ActiveExam) -> Result<ExamOutcome, ExamError> {
        let now = self.clock.now();
        let submitted = exam.session().with(|s| s.submit(now).is_some())?;
        if submitted {
            // We won the submit; the timer can no longer auto-submit and is
            // safe to abort.
            exam.timer_mut().cancel();
        } else {
            // The timer got there first; let it finish its own persistence.
            exam.timer_mut().join().await;
        }

        let record = exam.session().with(|s| {
            if s.attempt_id().is_some() {
                None
            } else {
                AttemptRecord::from_session(s)
            }
        })?;
        if let Some(record) = record {
            match self.attempts.append_attempt(&record).await {
                Ok(id) => exam.session().with(|s| s.set_attempt_id(id))?,
                Err(e) => tracing::error!("Failed to persist attempt record: {:?}", e),
            }
        }

        let (result, attempt_id) =
            exam.session().with(|s| (s.result().cloned(), s.attempt_id()))?;
        let result = result.ok_or(SessionError::Completed)?;
        Ok(ExamOutcome { result, attempt_id })
    }

    /// Retry attempt persistence after a completed session.
    ///
    /// This is useful when the submission-time append failed (e.g. transient
    /// storage error).
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Session` if the session is not completed.
    /// Returns `ExamError::Storage` if persistence fails.
    pub async fn finalize_attempt(&self, session: &mut TestSession) -> Result<i64, ExamError> {
        if let Some(id) = session.attempt_id() {
            return Ok(id);
        }

        let record =
            AttemptRecord::from_session(session).ok_or(SessionError::Completed)?;
        let id = self.attempts.append_attempt(&record).await?;
        session.set_attempt_id(id);
        Ok(id)
    }
}
