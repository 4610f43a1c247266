use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{
    AnswerOption, Certification, CertificationId, Difficulty, DomainTag, OptionKey, Question,
    QuestionError, QuestionId, TestKind, TestResult, TestResultError, TestSession,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors reported by storage backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a question and its options.
///
/// This mirrors the domain `Question` so repositories can store and reload
/// rows without leaking storage concerns into the domain layer. Converting
/// back runs the full question validation, so malformed rows are rejected at
/// load time instead of surfacing mid-test.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub certification_id: CertificationId,
    pub text: String,
    pub options: Vec<OptionRecord>,
    pub domain: DomainTag,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone)]
pub struct OptionRecord {
    pub key: OptionKey,
    pub text: String,
    pub correct: bool,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(certification_id: CertificationId, question: &Question) -> Self {
        Self {
            id: question.id(),
            certification_id,
            text: question.text().to_owned(),
            options: question
                .options()
                .iter()
                .map(|option| OptionRecord {
                    key: option.key(),
                    text: option.text().to_owned(),
                    correct: option.is_correct(),
                })
                .collect(),
            domain: question.domain().clone(),
            difficulty: question.difficulty(),
        }
    }

    /// Convert the record back into a domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the stored options fail validation, for
    /// example when the row no longer has exactly one correct option.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let options = self
            .options
            .into_iter()
            .map(|option| AnswerOption::new(option.key, option.text, option.correct))
            .collect::<Result<Vec<_>, _>>()?;
        Question::new(self.id, self.text, options, self.domain, self.difficulty)
    }
}

/// Persisted shape for one completed test attempt.
///
/// Only completed sessions produce a record; `from_session` returns `None`
/// while a session is still running.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub certification_id: CertificationId,
    pub kind: TestKind,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_questions: u32,
    pub correct_count: u32,
    pub passing_grade: u8,
    pub domain_scores: Vec<DomainScoreRecord>,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Debug, Clone)]
pub struct DomainScoreRecord {
    pub domain: DomainTag,
    pub correct: u32,
    pub total: u32,
}

#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub selected: OptionKey,
}

impl AttemptRecord {
    #[must_use]
    pub fn from_session(session: &TestSession) -> Option<Self> {
        let result = session.result()?;
        Some(Self {
            certification_id: session.certification_id(),
            kind: session.kind(),
            started_at: session.started_at(),
            completed_at: result.completed_at(),
            total_questions: result.total_questions(),
            correct_count: result.correct_count(),
            passing_grade: result.passing_grade(),
            domain_scores: result
                .domain_scores()
                .iter()
                .map(|(domain, score)| DomainScoreRecord {
                    domain: domain.clone(),
                    correct: score.correct(),
                    total: score.total(),
                })
                .collect(),
            answers: session
                .questions()
                .iter()
                .filter_map(|question| {
                    session.selected_answer(question.id()).map(|key| AnswerRecord {
                        question_id: question.id(),
                        selected: key,
                    })
                })
                .collect(),
        })
    }

    /// Rebuild the scored result from the stored counts.
    ///
    /// # Errors
    ///
    /// Returns `TestResultError` if the stored counts are inconsistent.
    pub fn to_result(&self) -> Result<TestResult, TestResultError> {
        let mut domains = BTreeMap::new();
        for score in &self.domain_scores {
            domains.insert(
                score.domain.clone(),
                exam_core::model::DomainScore::new(score.correct, score.total)?,
            );
        }
        TestResult::from_persisted(
            self.total_questions,
            self.correct_count,
            self.passing_grade,
            domains,
            self.completed_at,
        )
    }
}

/// A stored attempt together with its row id.
#[derive(Debug, Clone)]
pub struct AttemptRow {
    pub id: i64,
    pub record: AttemptRecord,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: i64, record: AttemptRecord) -> Self {
        Self { id, record }
    }
}

/// Repository contract for certifications.
#[async_trait]
pub trait CertificationRepository: Send + Sync {
    /// Persist or update a certification.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the certification cannot be stored.
    async fn upsert_certification(&self, certification: &Certification)
    -> Result<(), StorageError>;

    /// Fetch a certification by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; a missing certification is
    /// `Ok(None)`.
    async fn get_certification(
        &self,
        id: CertificationId,
    ) -> Result<Option<Certification>, StorageError>;

    /// List all certifications ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn list_certifications(&self) -> Result<Vec<Certification>, StorageError>;
}

/// Repository contract for the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or update a question under a certification.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(
        &self,
        certification_id: CertificationId,
        question: &Question,
    ) -> Result<(), StorageError>;

    /// Fetch questions by IDs.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any are missing, or other storage
    /// errors.
    async fn get_questions(
        &self,
        certification_id: CertificationId,
        ids: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError>;

    /// List every question of a certification ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn list_questions(
        &self,
        certification_id: CertificationId,
    ) -> Result<Vec<Question>, StorageError>;

    /// List questions restricted to the given domains, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn list_questions_by_domains(
        &self,
        certification_id: CertificationId,
        domains: &[DomainTag],
    ) -> Result<Vec<Question>, StorageError>;
}

/// Repository contract for completed attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append a completed attempt and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<i64, StorageError>;

    /// Fetch one attempt by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown row ids.
    async fn get_attempt(&self, id: i64) -> Result<AttemptRow, StorageError>;

    /// List attempts for a certification, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn list_attempt_rows(
        &self,
        certification_id: CertificationId,
        completed_from: Option<DateTime<Utc>>,
        completed_until: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError>;

    /// Latest attempt per certification, for the given certifications.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn list_latest_attempt_rows(
        &self,
        certification_ids: &[CertificationId],
    ) -> Result<Vec<AttemptRow>, StorageError>;
}

/// In-memory backend shared by tests and demo flows; clones share state.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    certifications: Arc<Mutex<HashMap<CertificationId, Certification>>>,
    questions: Arc<Mutex<HashMap<(CertificationId, QuestionId), Question>>>,
    attempts: Arc<Mutex<Vec<AttemptRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            certifications: Arc::new(Mutex::new(HashMap::new())),
            questions: Arc::new(Mutex::new(HashMap::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CertificationRepository for InMemoryRepository {
    async fn upsert_certification(
        &self,
        certification: &Certification,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .certifications
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(certification.id(), certification.clone());
        Ok(())
    }

    async fn get_certification(
        &self,
        id: CertificationId,
    ) -> Result<Option<Certification>, StorageError> {
        let guard = self
            .certifications
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_certifications(&self) -> Result<Vec<Certification>, StorageError> {
        let guard = self
            .certifications
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut certifications: Vec<Certification> = guard.values().cloned().collect();
        certifications.sort_by_key(Certification::id);
        Ok(certifications)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(
        &self,
        certification_id: CertificationId,
        question: &Question,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((certification_id, question.id()), question.clone());
        Ok(())
    }

    async fn get_questions(
        &self,
        certification_id: CertificationId,
        ids: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match guard.get(&(certification_id, *id)) {
                Some(question) => found.push(question.clone()),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(found)
    }

    async fn list_questions(
        &self,
        certification_id: CertificationId,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut questions: Vec<Question> = guard
            .iter()
            .filter(|((cert, _), _)| *cert == certification_id)
            .map(|(_, question)| question.clone())
            .collect();
        questions.sort_by_key(Question::id);
        Ok(questions)
    }

    async fn list_questions_by_domains(
        &self,
        certification_id: CertificationId,
        domains: &[DomainTag],
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut questions: Vec<Question> = guard
            .iter()
            .filter(|((cert, _), question)| {
                *cert == certification_id && domains.contains(question.domain())
            })
            .map(|(_, question)| question.clone())
            .collect();
        questions.sort_by_key(Question::id);
        Ok(questions)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = guard.last().map_or(1, |row| row.id + 1);
        guard.push(AttemptRow::new(id, record.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: i64) -> Result<AttemptRow, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempt_rows(
        &self,
        certification_id: CertificationId,
        completed_from: Option<DateTime<Utc>>,
        completed_until: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .filter(|row| row.record.certification_id == certification_id)
            .filter(|row| completed_from.is_none_or(|from| row.record.completed_at >= from))
            .filter(|row| completed_until.is_none_or(|until| row.record.completed_at <= until))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .completed_at
                .cmp(&a.record.completed_at)
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn list_latest_attempt_rows(
        &self,
        certification_ids: &[CertificationId],
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut latest: Vec<AttemptRow> = Vec::new();
        for certification_id in certification_ids {
            let newest = guard
                .iter()
                .filter(|row| row.record.certification_id == *certification_id)
                .max_by(|a, b| {
                    a.record
                        .completed_at
                        .cmp(&b.record.completed_at)
                        .then(a.id.cmp(&b.id))
                });
            if let Some(row) = newest {
                latest.push(row.clone());
            }
        }
        Ok(latest)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub certifications: Arc<dyn CertificationRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let certifications: Arc<dyn CertificationRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self {
            certifications,
            questions,
            attempts,
        }
    }
}
