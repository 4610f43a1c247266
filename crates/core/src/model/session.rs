use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{CertificationId, OptionKey, Question, QuestionId, TestKind, TestResult};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a test needs at least one question")]
    Empty,

    #[error("session is already completed")]
    Completed,

    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),

    #[error("question {question} has no option {key}")]
    UnknownOption { question: QuestionId, key: OptionKey },
}

/// Lifecycle of a test session. `Submitting` only exists inside `submit`;
/// callers observe `InProgress` or `Completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    InProgress,
    Submitting,
    Completed,
}

/// Answered/flagged counts for the session overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    answered: usize,
    flagged: usize,
    total: usize,
}

impl SessionProgress {
    #[must_use]
    pub fn answered(&self) -> usize {
        self.answered
    }

    #[must_use]
    pub fn flagged(&self) -> usize {
        self.flagged
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }
}

/// An in-flight test attempt.
///
/// The question list is fixed at creation and `current_index` always points
/// into it. Mutations are only accepted while the session is in progress;
/// `tick` and `submit` become no-ops once it completes, everything else
/// fails with `SessionError::Completed`.
#[derive(Clone)]
pub struct TestSession {
    certification_id: CertificationId,
    kind: TestKind,
    questions: Vec<Question>,
    current_index: usize,
    selected: HashMap<QuestionId, OptionKey>,
    flagged: HashSet<QuestionId>,
    duration_secs: u32,
    time_remaining_secs: u32,
    passing_grade: u8,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    result: Option<TestResult>,
    attempt_id: Option<i64>,
}

impl TestSession {
    /// Start a session over the given questions.
    ///
    /// Takes at most the kind's question count; a smaller bank is fine. The
    /// passing grade comes from the certification the test was started for.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions remain after applying
    /// the kind's question count.
    pub fn new(
        certification_id: CertificationId,
        kind: TestKind,
        mut questions: Vec<Question>,
        passing_grade: u8,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let settings = kind.settings();
        questions.truncate(usize::try_from(settings.question_count()).unwrap_or(usize::MAX));
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        Ok(Self {
            certification_id,
            kind,
            questions,
            current_index: 0,
            selected: HashMap::new(),
            flagged: HashSet::new(),
            duration_secs: settings.duration_secs(),
            time_remaining_secs: settings.duration_secs(),
            passing_grade,
            status: SessionStatus::InProgress,
            started_at,
            result: None,
            attempt_id: None,
        })
    }

    /// Record an answer for a question. Re-selecting overwrites the previous
    /// choice and the current position does not move.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after submission,
    /// `SessionError::UnknownQuestion` if the question is not in this
    /// session, or `SessionError::UnknownOption` if the question has no such
    /// option.
    pub fn select_answer(
        &mut self,
        question_id: QuestionId,
        key: OptionKey,
    ) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        let question = self
            .questions
            .iter()
            .find(|question| question.id() == question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        if !question.has_option(key) {
            return Err(SessionError::UnknownOption {
                question: question_id,
                key,
            });
        }
        self.selected.insert(question_id, key);
        Ok(())
    }

    /// Move to the next question, staying put on the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after submission.
    pub fn go_to_next(&mut self) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
        Ok(())
    }

    /// Move to the previous question, staying put on the first one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after submission.
    pub fn go_to_previous(&mut self) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.current_index = self.current_index.saturating_sub(1);
        Ok(())
    }

    /// Jump straight to a question by zero-based index. An out-of-range
    /// index leaves the position unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after submission.
    pub fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if index < self.questions.len() {
            self.current_index = index;
        }
        Ok(())
    }

    /// Flag or unflag a question for review. Returns the new flag state.
    /// Flags are a navigation aid and never affect scoring.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after submission or
    /// `SessionError::UnknownQuestion` if the question is not in this
    /// session.
    pub fn toggle_flag(&mut self, question_id: QuestionId) -> Result<bool, SessionError> {
        self.ensure_in_progress()?;
        if !self
            .questions
            .iter()
            .any(|question| question.id() == question_id)
        {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        if self.flagged.remove(&question_id) {
            Ok(false)
        } else {
            self.flagged.insert(question_id);
            Ok(true)
        }
    }

    /// Count down one second. Hitting zero submits the session and returns
    /// the result; a tick after completion changes nothing.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<TestResult> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        self.time_remaining_secs = self.time_remaining_secs.saturating_sub(1);
        if self.time_remaining_secs == 0 {
            return self.submit(now);
        }
        None
    }

    /// Submit the session, scoring whatever is answered so far. Unanswered
    /// questions count as wrong. Returns `None` if the session was already
    /// submitted, so a manual submit racing the timer produces one result.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Option<TestResult> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        self.status = SessionStatus::Submitting;
        let result =
            TestResult::from_answers(&self.questions, &self.selected, self.passing_grade, now);
        self.result = Some(result.clone());
        self.status = SessionStatus::Completed;
        Some(result)
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::InProgress {
            Ok(())
        } else {
            Err(SessionError::Completed)
        }
    }

    #[must_use]
    pub fn certification_id(&self) -> CertificationId {
        self.certification_id
    }

    #[must_use]
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    #[must_use]
    pub fn selected_answer(&self, question_id: QuestionId) -> Option<OptionKey> {
        self.selected.get(&question_id).copied()
    }

    #[must_use]
    pub fn is_flagged(&self, question_id: QuestionId) -> bool {
        self.flagged.contains(&question_id)
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn time_remaining_secs(&self) -> u32 {
        self.time_remaining_secs
    }

    #[must_use]
    pub fn passing_grade(&self) -> u8 {
        self.passing_grade
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Result snapshot, present once the session has completed.
    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    /// Row id of the persisted attempt, set after the result is stored.
    #[must_use]
    pub fn attempt_id(&self) -> Option<i64> {
        self.attempt_id
    }

    pub fn set_attempt_id(&mut self, attempt_id: i64) {
        self.attempt_id = Some(attempt_id);
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            answered: self.selected.len(),
            flagged: self.flagged.len(),
            total: self.questions.len(),
        }
    }

    /// One-based positions of questions without an answer, in test order.
    #[must_use]
    pub fn unanswered_numbers(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, question)| !self.selected.contains_key(&question.id()))
            .map(|(index, _)| index + 1)
            .collect()
    }

    /// One-based positions of flagged questions, in test order.
    #[must_use]
    pub fn flagged_numbers(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, question)| self.flagged.contains(&question.id()))
            .map(|(index, _)| index + 1)
            .collect()
    }
}

impl std::fmt::Debug for TestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession")
            .field("certification_id", &self.certification_id)
            .field("kind", &self.kind)
            .field("questions", &self.questions.len())
            .field("current_index", &self.current_index)
            .field("status", &self.status)
            .field("time_remaining_secs", &self.time_remaining_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, Difficulty, DomainTag};
    use crate::time::fixed_now;

    fn key(c: char) -> OptionKey {
        OptionKey::new(c).unwrap()
    }

    fn build_question(id: u64, domain: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("question {id}"),
            vec![
                AnswerOption::new(key('A'), "right answer", true).unwrap(),
                AnswerOption::new(key('B'), "wrong answer", false).unwrap(),
                AnswerOption::new(key('C'), "also wrong", false).unwrap(),
                AnswerOption::new(key('D'), "still wrong", false).unwrap(),
            ],
            DomainTag::new(domain).unwrap(),
            Difficulty::Medium,
        )
        .unwrap()
    }

    fn build_session(question_count: u64) -> TestSession {
        let questions = (1..=question_count)
            .map(|id| build_question(id, "role"))
            .collect();
        TestSession::new(
            CertificationId::new(1),
            TestKind::Short,
            questions,
            70,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn starts_on_first_question_with_full_clock() {
        let session = build_session(10);

        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.current_question().id(), QuestionId::new(1));
        assert_eq!(session.time_remaining_secs(), 600);
        assert_eq!(session.progress().answered(), 0);
        assert_eq!(session.progress().total(), 10);
    }

    #[test]
    fn rejects_empty_question_set() {
        let err = TestSession::new(
            CertificationId::new(1),
            TestKind::Short,
            Vec::new(),
            70,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }

    #[test]
    fn truncates_to_the_kind_question_count() {
        let session = build_session(14);
        assert_eq!(session.questions().len(), 10);
    }

    #[test]
    fn keeps_a_smaller_bank_as_is() {
        let session = build_session(4);
        assert_eq!(session.questions().len(), 4);
    }

    #[test]
    fn records_and_overwrites_answers_without_moving() {
        let mut session = build_session(10);
        let id = QuestionId::new(3);

        session.select_answer(id, key('B')).unwrap();
        assert_eq!(session.selected_answer(id), Some(key('B')));
        assert_eq!(session.current_index(), 0);

        session.select_answer(id, key('A')).unwrap();
        assert_eq!(session.selected_answer(id), Some(key('A')));

        session.select_answer(id, key('A')).unwrap();
        assert_eq!(session.selected_answer(id), Some(key('A')));
        assert_eq!(session.progress().answered(), 1);
    }

    #[test]
    fn rejects_answers_for_unknown_targets() {
        let mut session = build_session(10);

        let err = session
            .select_answer(QuestionId::new(99), key('A'))
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion(QuestionId::new(99)));

        let err = session
            .select_answer(QuestionId::new(1), key('E'))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::UnknownOption {
                question: QuestionId::new(1),
                key: key('E'),
            }
        );
    }

    #[test]
    fn navigation_clamps_at_both_ends() {
        let mut session = build_session(3);

        session.go_to_previous().unwrap();
        assert_eq!(session.current_index(), 0);

        session.go_to_next().unwrap();
        session.go_to_next().unwrap();
        assert_eq!(session.current_index(), 2);

        session.go_to_next().unwrap();
        assert_eq!(session.current_index(), 2);
    }

    #[test]
    fn jump_ignores_out_of_range_indices() {
        let mut session = build_session(10);

        session.jump_to(7).unwrap();
        assert_eq!(session.current_index(), 7);

        session.jump_to(10).unwrap();
        assert_eq!(session.current_index(), 7);

        session.jump_to(usize::MAX).unwrap();
        assert_eq!(session.current_index(), 7);
    }

    #[test]
    fn flag_toggles_back_and_forth() {
        let mut session = build_session(10);
        let id = QuestionId::new(5);

        assert!(session.toggle_flag(id).unwrap());
        assert!(session.is_flagged(id));
        assert_eq!(session.flagged_numbers(), vec![5]);

        assert!(!session.toggle_flag(id).unwrap());
        assert!(!session.is_flagged(id));
        assert!(session.flagged_numbers().is_empty());

        let err = session.toggle_flag(QuestionId::new(42)).unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion(QuestionId::new(42)));
    }

    #[test]
    fn flags_do_not_affect_scoring() {
        let mut session = build_session(10);
        for question in 1..=7 {
            session
                .select_answer(QuestionId::new(question), key('A'))
                .unwrap();
        }
        session.toggle_flag(QuestionId::new(1)).unwrap();
        session.toggle_flag(QuestionId::new(9)).unwrap();

        let result = session.submit(fixed_now()).unwrap();
        assert_eq!(result.correct_count(), 7);
        assert_eq!(result.score_percent(), 70);
    }

    #[test]
    fn tick_counts_down_one_second() {
        let mut session = build_session(10);

        assert!(session.tick(fixed_now()).is_none());
        assert_eq!(session.time_remaining_secs(), 599);
    }

    #[test]
    fn tick_at_one_second_auto_submits() {
        let mut session = build_session(10);
        while session.time_remaining_secs() > 1 {
            assert!(session.tick(fixed_now()).is_none());
        }

        let result = session.tick(fixed_now()).unwrap();

        assert_eq!(session.time_remaining_secs(), 0);
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(result.total_questions(), 10);
        assert_eq!(result.correct_count(), 0);
        assert!(!result.passed());
    }

    #[test]
    fn tick_after_completion_changes_nothing() {
        let mut session = build_session(10);
        session.submit(fixed_now()).unwrap();
        let remaining = session.time_remaining_secs();

        assert!(session.tick(fixed_now()).is_none());
        assert_eq!(session.time_remaining_secs(), remaining);
    }

    #[test]
    fn submits_exactly_once() {
        let mut session = build_session(10);
        for question in 1..=7 {
            session
                .select_answer(QuestionId::new(question), key('A'))
                .unwrap();
        }

        let first = session.submit(fixed_now());
        let second = session.submit(fixed_now());

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(session.result(), first.as_ref());
        assert_eq!(session.result().unwrap().score_percent(), 70);
        assert!(session.result().unwrap().passed());
    }

    #[test]
    fn completed_sessions_reject_mutation() {
        let mut session = build_session(10);
        session.submit(fixed_now()).unwrap();

        assert_eq!(
            session.select_answer(QuestionId::new(1), key('A')),
            Err(SessionError::Completed)
        );
        assert_eq!(session.go_to_next(), Err(SessionError::Completed));
        assert_eq!(session.go_to_previous(), Err(SessionError::Completed));
        assert_eq!(session.jump_to(0), Err(SessionError::Completed));
        assert_eq!(
            session.toggle_flag(QuestionId::new(1)),
            Err(SessionError::Completed)
        );
    }

    #[test]
    fn submitting_with_blanks_scores_them_as_wrong() {
        let mut session = build_session(10);
        for question in [1_u64, 2, 3] {
            session
                .select_answer(QuestionId::new(question), key('A'))
                .unwrap();
        }
        assert_eq!(session.unanswered_numbers(), vec![4, 5, 6, 7, 8, 9, 10]);

        let result = session.submit(fixed_now()).unwrap();

        assert_eq!(result.correct_count(), 3);
        assert_eq!(result.score_percent(), 30);
    }

    #[test]
    fn attempt_id_is_set_after_persisting() {
        let mut session = build_session(10);
        assert_eq!(session.attempt_id(), None);

        session.set_attempt_id(17);
        assert_eq!(session.attempt_id(), Some(17));
    }
}
