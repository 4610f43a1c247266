use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use exam_core::model::{
    OptionKey, Question, QuestionId, SessionProgress, SessionStatus, TestSession,
};
use storage::repository::{AttemptRecord, AttemptRepository};

use crate::Clock;
use crate::error::ExamError;

/// Handle to a session shared between the caller and the countdown task.
///
/// Every operation goes through the one lock, so user actions and timer
/// ticks never interleave.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<TestSession>>,
}

impl SharedSession {
    #[must_use]
    pub fn new(session: TestSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Poisoned` if a previous holder panicked.
    pub fn with<R>(&self, f: impl FnOnce(&mut TestSession) -> R) -> Result<R, ExamError> {
        let mut guard = self.inner.lock().map_err(|_| ExamError::Poisoned)?;
        Ok(f(&mut guard))
    }
}

/// Drives `TestSession::tick` once per second until the session leaves
/// `InProgress`.
///
/// The task stops on its own after an auto-submit or once it observes a
/// session completed elsewhere; `cancel` tears it down early. Either way the
/// schedule is cancelled exactly once.
pub struct CountdownTimer {
    handle: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Spawn the 1 Hz countdown task. Must be called from within a tokio
    /// runtime.
    #[must_use]
    pub fn spawn(
        session: SharedSession,
        clock: Clock,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self::spawn_with_period(session, clock, attempts, Duration::from_secs(1))
    }

    /// Spawn the countdown task with a custom tick period. Tests use short
    /// periods to reach expiry quickly.
    #[must_use]
    pub fn spawn_with_period(
        session: SharedSession,
        clock: Clock,
        attempts: Arc<dyn AttemptRepository>,
        period: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; consume it so the session
            // only loses time once a full period has passed.
            interval.tick().await;
            loop {
                interval.tick().await;
                let now = clock.now();
                let Ok((expired, status)) = session.with(|s| (s.tick(now), s.status())) else {
                    break;
                };
                if expired.is_some() {
                    persist_auto_submit(&session, attempts.as_ref()).await;
                    break;
                }
                if status != SessionStatus::InProgress {
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Stop the countdown. Only the first call tears the task down; repeat
    /// calls are no-ops.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Wait for the countdown task to finish on its own.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Persist the attempt produced by a timer-driven submission.
///
/// Store failures are logged and swallowed; the in-memory result stands
/// regardless.
async fn persist_auto_submit(session: &SharedSession, attempts: &dyn AttemptRepository) {
    let Ok(record) = session.with(|s| {
        if s.attempt_id().is_some() {
            None
        } else {
            AttemptRecord::from_session(s)
        }
    }) else {
        return;
    };
    let Some(record) = record else {
        return;
    };
    match attempts.append_attempt(&record).await {
        Ok(id) => {
            let _ = session.with(|s| s.set_attempt_id(id));
        }
        Err(e) => tracing::error!("Failed to persist auto-submitted attempt: {:?}", e),
    }
}

/// A running exam: the shared session plus its countdown timer.
pub struct ActiveExam {
    session: SharedSession,
    timer: CountdownTimer,
}

impl ActiveExam {
    #[must_use]
    pub(crate) fn new(session: SharedSession, timer: CountdownTimer) -> Self {
        Self { session, timer }
    }

    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub(crate) fn timer_mut(&mut self) -> &mut CountdownTimer {
        &mut self.timer
    }

    /// Walk away from the exam without submitting. The countdown stops.
    pub fn abandon(mut self) {
        self.timer.cancel();
    }

    /// Record an answer for a question.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Session` for rejected mutations and
    /// `ExamError::Poisoned` on lock poisoning.
    pub fn select_answer(&self, question_id: QuestionId, key: OptionKey) -> Result<(), ExamError> {
        self.session.with(|s| s.select_answer(question_id, key))??;
        Ok(())
    }

    /// Move to the next question, staying put at the end.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Session` after completion.
    pub fn go_to_next(&self) -> Result<(), ExamError> {
        self.session.with(|s| s.go_to_next())??;
        Ok(())
    }

    /// Move to the previous question, staying put at the start.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Session` after completion.
    pub fn go_to_previous(&self) -> Result<(), ExamError> {
        self.session.with(|s| s.go_to_previous())??;
        Ok(())
    }

    /// Jump to a question by index; out-of-range indexes leave the position
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Session` after completion.
    pub fn jump_to(&self, index: usize) -> Result<(), ExamError> {
        self.session.with(|s| s.jump_to(index))??;
        Ok(())
    }

    /// Toggle the review flag on a question and return the new state.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Session` for unknown questions or after
    /// completion.
    pub fn toggle_flag(&self, question_id: QuestionId) -> Result<bool, ExamError> {
        let flagged = self.session.with(|s| s.toggle_flag(question_id))??;
        Ok(flagged)
    }

    /// Snapshot of answered/flagged counts.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Poisoned` on lock poisoning.
    pub fn progress(&self) -> Result<SessionProgress, ExamError> {
        self.session.with(|s| s.progress())
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Poisoned` on lock poisoning.
    pub fn status(&self) -> Result<SessionStatus, ExamError> {
        self.session.with(|s| s.status())
    }

    /// Seconds left on the countdown.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Poisoned` on lock poisoning.
    pub fn time_remaining_secs(&self) -> Result<u32, ExamError> {
        self.session.with(|s| s.time_remaining_secs())
    }

    /// Index of the question currently shown.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Poisoned` on lock poisoning.
    pub fn current_index(&self) -> Result<usize, ExamError> {
        self.session.with(|s| s.current_index())
    }

    /// Clone of the question currently shown.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Poisoned` on lock poisoning.
    pub fn current_question(&self) -> Result<Question, ExamError> {
        self.session.with(|s| s.current_question().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use exam_core::model::{AnswerOption, CertificationId, Difficulty, DomainTag, TestKind};
    use exam_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn build_question(id: u64) -> Question {
        let options = vec![
            AnswerOption::new(OptionKey::new('A').unwrap(), "Right", true).unwrap(),
            AnswerOption::new(OptionKey::new('B').unwrap(), "Wrong", false).unwrap(),
        ];
        Question::new(
            QuestionId::new(id),
            format!("Question {id}?"),
            options,
            DomainTag::new("role").unwrap(),
            Difficulty::Medium,
        )
        .unwrap()
    }

    fn build_session() -> TestSession {
        let questions = (1..=4).map(build_question).collect();
        TestSession::new(
            CertificationId::new(1),
            TestKind::Short,
            questions,
            70,
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn countdown_auto_submits_and_persists() {
        let repo = InMemoryRepository::new();
        let shared = SharedSession::new(build_session());
        let now = fixed_now();

        shared
            .with(|s| {
                while s.time_remaining_secs() > 2 {
                    s.tick(now);
                }
            })
            .unwrap();

        let mut timer = CountdownTimer::spawn_with_period(
            shared.clone(),
            Clock::fixed(now),
            Arc::new(repo.clone()),
            Duration::from_millis(2),
        );
        timer.join().await;

        shared
            .with(|s| {
                assert_eq!(s.status(), SessionStatus::Completed);
                assert_eq!(s.time_remaining_secs(), 0);
                assert_eq!(s.attempt_id(), Some(1));
            })
            .unwrap();

        let row = repo.get_attempt(1).await.unwrap();
        assert_eq!(row.record.total_questions, 4);
        assert_eq!(row.record.correct_count, 0);
    }

    #[tokio::test]
    async fn cancel_stops_countdown_without_submitting() {
        let repo = InMemoryRepository::new();
        let shared = SharedSession::new(build_session());

        let mut timer =
            CountdownTimer::spawn(shared.clone(), fixed_clock(), Arc::new(repo.clone()));
        assert!(timer.is_running());
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());

        shared
            .with(|s| assert_eq!(s.status(), SessionStatus::InProgress))
            .unwrap();
        let rows = repo
            .list_attempt_rows(CertificationId::new(1), None, None, 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn poisoned_lock_surfaces_as_error() {
        let shared = SharedSession::new(build_session());

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = shared.with(|_| panic!("boom"));
        }));
        assert!(panicked.is_err());

        assert!(matches!(
            shared.with(|s| s.status()),
            Err(ExamError::Poisoned)
        ));
    }
}
