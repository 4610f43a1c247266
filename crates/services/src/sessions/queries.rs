use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;

use exam_core::model::{Certification, CertificationId, DomainTag, Question, TestKind, TestSession};
use storage::repository::{
    AttemptRepository, AttemptRow, CertificationRepository, QuestionRepository,
};

use crate::error::ExamError;

/// Storage-backed exam queries and builders.
pub(crate) struct ExamQueries;

// A few helpers only have test callers until the history screens land.
#[allow(dead_code)]
impl ExamQueries {
    /// Load a certification, treating a missing row as a domain error.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::UnknownCertification` if the certification does
    /// not exist, or `ExamError::Storage` on repository failures.
    pub async fn load_certification(
        id: CertificationId,
        certifications: &dyn CertificationRepository,
    ) -> Result<Certification, ExamError> {
        certifications
            .get_certification(id)
            .await?
            .ok_or(ExamError::UnknownCertification(id))
    }

    /// Draw the question set for a test of the given kind.
    ///
    /// An empty `domains` slice draws from the whole bank. The draw keeps the
    /// bank's ID order unless `shuffle` is set, and is cut down to the kind's
    /// question count.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` on repository failures.
    pub async fn draw_questions(
        certification_id: CertificationId,
        kind: TestKind,
        domains: &[DomainTag],
        questions: &dyn QuestionRepository,
        shuffle: bool,
    ) -> Result<Vec<Question>, ExamError> {
        let mut bank = if domains.is_empty() {
            questions.list_questions(certification_id).await?
        } else {
            questions
                .list_questions_by_domains(certification_id, domains)
                .await?
        };

        if shuffle {
            let mut rng = rng();
            bank.as_mut_slice().shuffle(&mut rng);
        }

        let count = usize::try_from(kind.settings().question_count()).unwrap_or(usize::MAX);
        bank.truncate(count);
        Ok(bank)
    }

    /// Load the certification and draw its paper in one step.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::UnknownCertification` for a missing certification,
    /// `ExamError::Session` if no questions are available, or
    /// `ExamError::Storage` on repository failures.
    pub async fn start_from_storage(
        certification_id: CertificationId,
        kind: TestKind,
        domains: &[DomainTag],
        certifications: &dyn CertificationRepository,
        questions: &dyn QuestionRepository,
        now: DateTime<Utc>,
        shuffle: bool,
    ) -> Result<(Certification, TestSession), ExamError> {
        let certification = Self::load_certification(certification_id, certifications).await?;
        let drawn =
            Self::draw_questions(certification_id, kind, domains, questions, shuffle).await?;
        let session = TestSession::new(
            certification_id,
            kind,
            drawn,
            certification.passing_grade(),
            now,
        )?;
        Ok((certification, session))
    }

    /// List persisted attempts for a certification within an optional time range.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` on repository failures.
    pub async fn list_attempt_rows(
        certification_id: CertificationId,
        attempts: &dyn AttemptRepository,
        completed_from: Option<DateTime<Utc>>,
        completed_until: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, ExamError> {
        let rows = attempts
            .list_attempt_rows(certification_id, completed_from, completed_until, limit)
            .await?;
        Ok(rows)
    }

    /// List recent attempts for a certification with a default time window.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` on repository failures.
    pub async fn list_recent_attempt_rows(
        certification_id: CertificationId,
        attempts: &dyn AttemptRepository,
        now: DateTime<Utc>,
        days: i64,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, ExamError> {
        let from = now - chrono::Duration::days(days);
        Self::list_attempt_rows(certification_id, attempts, Some(from), Some(now), limit).await
    }

    /// Fetch a persisted attempt by ID.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` if the attempt is missing or storage fails.
    pub async fn get_attempt_row(
        id: i64,
        attempts: &dyn AttemptRepository,
    ) -> Result<AttemptRow, ExamError> {
        let row = attempts.get_attempt(id).await?;
        Ok(row)
    }

    /// List the latest attempt row for each certification.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Storage` on repository failures.
    pub async fn list_latest_attempt_rows(
        certification_ids: &[CertificationId],
        attempts: &dyn AttemptRepository,
    ) -> Result<Vec<AttemptRow>, ExamError> {
        let rows = attempts.list_latest_attempt_rows(certification_ids).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use exam_core::model::{AnswerOption, Difficulty, OptionKey, QuestionId, SessionStatus};
    use exam_core::time::fixed_now;
    use storage::repository::{AttemptRecord, DomainScoreRecord, InMemoryRepository};

    fn domain(name: &str) -> DomainTag {
        DomainTag::new(name).unwrap()
    }

    fn build_certification() -> Certification {
        Certification::new(
            CertificationId::new(1),
            "Scrum Basics",
            "",
            70,
            vec![domain("role"), domain("artifact")],
            fixed_now(),
        )
        .unwrap()
    }

    fn build_question(id: u64, domain_name: &str) -> Question {
        let options = vec![
            AnswerOption::new(OptionKey::new('A').unwrap(), "Right", true).unwrap(),
            AnswerOption::new(OptionKey::new('B').unwrap(), "Wrong", false).unwrap(),
        ];
        Question::new(
            QuestionId::new(id),
            format!("Question {id}?"),
            options,
            domain(domain_name),
            Difficulty::Medium,
        )
        .unwrap()
    }

    async fn seeded_repo() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_certification(&build_certification())
            .await
            .unwrap();
        for id in 1..=3 {
            repo.upsert_question(CertificationId::new(1), &build_question(id, "role"))
                .await
                .unwrap();
        }
        for id in 4..=12 {
            repo.upsert_question(CertificationId::new(1), &build_question(id, "artifact"))
                .await
                .unwrap();
        }
        repo
    }

    fn completed_record(completed_at: DateTime<Utc>) -> AttemptRecord {
        AttemptRecord {
            certification_id: CertificationId::new(1),
            kind: TestKind::Short,
            started_at: completed_at - chrono::Duration::minutes(8),
            completed_at,
            total_questions: 10,
            correct_count: 7,
            passing_grade: 70,
            domain_scores: vec![
                DomainScoreRecord {
                    domain: domain("role"),
                    correct: 2,
                    total: 3,
                },
                DomainScoreRecord {
                    domain: domain("artifact"),
                    correct: 5,
                    total: 7,
                },
            ],
            answers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn start_from_storage_builds_session() {
        let repo = seeded_repo().await;
        let now = fixed_now();

        let (certification, session) = ExamQueries::start_from_storage(
            CertificationId::new(1),
            TestKind::Short,
            &[],
            &repo,
            &repo,
            now,
            false,
        )
        .await
        .unwrap();

        assert_eq!(certification.id(), CertificationId::new(1));
        assert_eq!(session.questions().len(), 10);
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.passing_grade(), 70);
        assert_eq!(session.time_remaining_secs(), 600);
    }

    #[tokio::test]
    async fn start_from_storage_rejects_unknown_certification() {
        let repo = InMemoryRepository::new();
        let err = ExamQueries::start_from_storage(
            CertificationId::new(9),
            TestKind::Short,
            &[],
            &repo,
            &repo,
            fixed_now(),
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ExamError::UnknownCertification(id) if id == CertificationId::new(9)
        ));
    }

    #[tokio::test]
    async fn draw_questions_filters_by_domain() {
        let repo = seeded_repo().await;

        let drawn = ExamQueries::draw_questions(
            CertificationId::new(1),
            TestKind::Short,
            &[domain("role")],
            &repo,
            false,
        )
        .await
        .unwrap();

        assert_eq!(drawn.len(), 3);
        assert!(
            drawn
                .iter()
                .all(|question| question.domain().as_str() == "role")
        );
    }

    #[tokio::test]
    async fn shuffled_draw_is_a_permutation_of_the_bank() {
        let repo = seeded_repo().await;

        let drawn = ExamQueries::draw_questions(
            CertificationId::new(1),
            TestKind::Short,
            &[],
            &repo,
            true,
        )
        .await
        .unwrap();

        assert_eq!(drawn.len(), 10);
        let ids: HashSet<u64> = drawn.iter().map(|question| question.id().value()).collect();
        assert_eq!(ids.len(), 10);
        assert!(ids.iter().all(|id| (1..=12).contains(id)));
    }

    #[tokio::test]
    async fn list_recent_attempt_rows_uses_window() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();

        let old = completed_record(now - chrono::Duration::days(10));
        let recent = completed_record(now - chrono::Duration::days(1));
        repo.append_attempt(&old).await.unwrap();
        let recent_id = repo.append_attempt(&recent).await.unwrap();

        let rows =
            ExamQueries::list_recent_attempt_rows(CertificationId::new(1), &repo, now, 7, 10)
                .await
                .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, recent_id);
    }

    #[tokio::test]
    async fn get_attempt_row_returns_id_and_record() {
        let repo = InMemoryRepository::new();
        let record = completed_record(fixed_now());
        let id = repo.append_attempt(&record).await.unwrap();

        let row = ExamQueries::get_attempt_row(id, &repo).await.unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.record.correct_count, 7);
    }
}
