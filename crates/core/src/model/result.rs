use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::domain::DomainTag;
use super::ids::QuestionId;
use super::question::{OptionKey, Question};

/// Integer percentage with half-up rounding, clamped to `0..=100`.
#[allow(clippy::cast_possible_truncation)] // correct <= total keeps the value in 0..=100
fn percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    ((correct * 200 + total) / (total * 2)) as u8
}

/// Correct/total tally for one knowledge domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainScore {
    correct: u32,
    total: u32,
    score_percent: u8,
}

impl DomainScore {
    /// Create a domain score from raw counts.
    ///
    /// # Errors
    ///
    /// Returns `TestResultError::CountMismatch` if `correct` exceeds `total`.
    pub fn new(correct: u32, total: u32) -> Result<Self, TestResultError> {
        if correct > total {
            return Err(TestResultError::CountMismatch { correct, total });
        }
        Ok(Self {
            correct,
            total,
            score_percent: percent(correct, total),
        })
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn score_percent(&self) -> u8 {
        self.score_percent
    }
}

/// Immutable outcome of a submitted test.
///
/// Built exactly once when a session is submitted and never updated
/// afterwards. The domain map is keyed by tag so breakdowns render in a
/// stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    total_questions: u32,
    correct_count: u32,
    score_percent: u8,
    passing_grade: u8,
    passed: bool,
    domain_scores: BTreeMap<DomainTag, DomainScore>,
    completed_at: DateTime<Utc>,
}

impl TestResult {
    /// Score a finished set of answers.
    ///
    /// A question counts as correct only when the selected key equals its
    /// correct key; unanswered questions count as wrong.
    #[must_use]
    pub fn from_answers(
        questions: &[Question],
        selected: &HashMap<QuestionId, OptionKey>,
        passing_grade: u8,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let mut correct_count = 0u32;
        let mut per_domain: BTreeMap<DomainTag, (u32, u32)> = BTreeMap::new();
        for question in questions {
            let is_correct = selected
                .get(&question.id())
                .is_some_and(|key| *key == question.correct_key());
            let counts = per_domain.entry(question.domain().clone()).or_insert((0, 0));
            counts.1 += 1;
            if is_correct {
                counts.0 += 1;
                correct_count += 1;
            }
        }
        let total_questions = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        let domain_scores = per_domain
            .into_iter()
            .map(|(domain, (correct, total))| {
                (
                    domain,
                    DomainScore {
                        correct,
                        total,
                        score_percent: percent(correct, total),
                    },
                )
            })
            .collect();
        let score_percent = percent(correct_count, total_questions);
        Self {
            total_questions,
            correct_count,
            score_percent,
            passing_grade,
            passed: score_percent >= passing_grade,
            domain_scores,
            completed_at,
        }
    }

    /// Rebuild a result from stored counts, recomputing the derived fields.
    ///
    /// # Errors
    ///
    /// Returns a `TestResultError` if the counts are inconsistent or the
    /// passing grade is outside `1..=100`.
    pub fn from_persisted(
        total_questions: u32,
        correct_count: u32,
        passing_grade: u8,
        domain_scores: BTreeMap<DomainTag, DomainScore>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, TestResultError> {
        if correct_count > total_questions {
            return Err(TestResultError::CountMismatch {
                correct: correct_count,
                total: total_questions,
            });
        }
        if passing_grade == 0 || passing_grade > 100 {
            return Err(TestResultError::InvalidPassingGrade {
                grade: passing_grade,
            });
        }
        let domain_correct: u32 = domain_scores.values().map(DomainScore::correct).sum();
        let domain_total: u32 = domain_scores.values().map(DomainScore::total).sum();
        if domain_correct != correct_count || domain_total != total_questions {
            return Err(TestResultError::DomainCountMismatch {
                domain_correct,
                domain_total,
                correct: correct_count,
                total: total_questions,
            });
        }
        let score_percent = percent(correct_count, total_questions);
        Ok(Self {
            total_questions,
            correct_count,
            score_percent,
            passing_grade,
            passed: score_percent >= passing_grade,
            domain_scores,
            completed_at,
        })
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    /// Overall score as a whole percentage, rounded half up.
    #[must_use]
    pub fn score_percent(&self) -> u8 {
        self.score_percent
    }

    #[must_use]
    pub fn passing_grade(&self) -> u8 {
        self.passing_grade
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn domain_scores(&self) -> &BTreeMap<DomainTag, DomainScore> {
        &self.domain_scores
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestResultError {
    #[error("correct count {correct} exceeds question count {total}")]
    CountMismatch { correct: u32, total: u32 },
    #[error(
        "domain scores sum to {domain_correct}/{domain_total} but the result says {correct}/{total}"
    )]
    DomainCountMismatch {
        domain_correct: u32,
        domain_total: u32,
        correct: u32,
        total: u32,
    },
    #[error("passing grade must be in 1..=100, got {grade}")]
    InvalidPassingGrade { grade: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::{AnswerOption, Difficulty};
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
            ],
            DomainTag::new(domain).unwrap(),
            Difficulty::Medium,
        )
        .unwrap()
    }

    fn answer_first_n(questions: &[Question], n: usize) -> HashMap<QuestionId, OptionKey> {
        let mut selected = HashMap::new();
        for question in questions.iter().take(n) {
            selected.insert(question.id(), key('A'));
        }
        selected
    }

    #[test]
    fn scores_seven_of_ten_as_seventy() {
        let questions: Vec<Question> = (1..=10).map(|id| build_question(id, "role")).collect();
        let selected = answer_first_n(&questions, 7);

        let result = TestResult::from_answers(&questions, &selected, 70, fixed_now());

        assert_eq!(result.total_questions(), 10);
        assert_eq!(result.correct_count(), 7);
        assert_eq!(result.score_percent(), 70);
        assert!(result.passed());
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 7), 71);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(10, 10), 100);
    }

    #[test]
    fn wrong_and_missing_answers_both_count_against() {
        let questions: Vec<Question> = (1..=4).map(|id| build_question(id, "role")).collect();
        let mut selected = answer_first_n(&questions, 2);
        selected.insert(questions[2].id(), key('B'));

        let result = TestResult::from_answers(&questions, &selected, 70, fixed_now());

        assert_eq!(result.correct_count(), 2);
        assert_eq!(result.score_percent(), 50);
        assert!(!result.passed());
    }

    #[test]
    fn breaks_score_down_per_domain() {
        let mut questions: Vec<Question> = (1..=3).map(|id| build_question(id, "role")).collect();
        questions.extend((4..=10).map(|id| build_question(id, "artifact")));
        let mut selected = HashMap::new();
        for question in questions.iter().filter(|q| q.domain().as_str() == "role").take(2) {
            selected.insert(question.id(), key('A'));
        }
        for question in questions
            .iter()
            .filter(|q| q.domain().as_str() == "artifact")
            .take(5)
        {
            selected.insert(question.id(), key('A'));
        }

        let result = TestResult::from_answers(&questions, &selected, 70, fixed_now());

        let role = &result.domain_scores()[&DomainTag::new("role").unwrap()];
        assert_eq!((role.correct(), role.total(), role.score_percent()), (2, 3, 67));
        let artifact = &result.domain_scores()[&DomainTag::new("artifact").unwrap()];
        assert_eq!(
            (artifact.correct(), artifact.total(), artifact.score_percent()),
            (5, 7, 71)
        );
        assert_eq!(result.score_percent(), 70);
        assert!(result.passed());
    }

    #[test]
    fn passing_is_inclusive_of_the_grade() {
        let questions: Vec<Question> = (1..=10).map(|id| build_question(id, "role")).collect();

        let at_grade = TestResult::from_answers(&questions, &answer_first_n(&questions, 7), 70, fixed_now());
        assert!(at_grade.passed());

        let below = TestResult::from_answers(&questions, &answer_first_n(&questions, 6), 70, fixed_now());
        assert_eq!(below.score_percent(), 60);
        assert!(!below.passed());
    }

    #[test]
    fn rebuilds_from_persisted_counts() {
        let mut domains = BTreeMap::new();
        domains.insert(DomainTag::new("role").unwrap(), DomainScore::new(2, 3).unwrap());
        domains.insert(
            DomainTag::new("artifact").unwrap(),
            DomainScore::new(5, 7).unwrap(),
        );

        let result = TestResult::from_persisted(10, 7, 70, domains, fixed_now()).unwrap();

        assert_eq!(result.score_percent(), 70);
        assert!(result.passed());
    }

    #[test]
    fn rejects_inconsistent_persisted_counts() {
        let err = TestResult::from_persisted(10, 11, 70, BTreeMap::new(), fixed_now()).unwrap_err();
        assert_eq!(err, TestResultError::CountMismatch { correct: 11, total: 10 });

        let mut domains = BTreeMap::new();
        domains.insert(DomainTag::new("role").unwrap(), DomainScore::new(3, 5).unwrap());
        let err = TestResult::from_persisted(10, 7, 70, domains, fixed_now()).unwrap_err();
        assert_eq!(
            err,
            TestResultError::DomainCountMismatch {
                domain_correct: 3,
                domain_total: 5,
                correct: 7,
                total: 10,
            }
        );

        let err = TestResult::from_persisted(10, 7, 0, BTreeMap::new(), fixed_now()).unwrap_err();
        assert_eq!(err, TestResultError::InvalidPassingGrade { grade: 0 });
    }

    #[test]
    fn domain_score_rejects_more_correct_than_total() {
        let err = DomainScore::new(4, 3).unwrap_err();
        assert_eq!(err, TestResultError::CountMismatch { correct: 4, total: 3 });
    }
}
