use std::sync::Arc;

use exam_core::model::{Certification, CertificationId, DomainTag, Question};
use storage::repository::{CertificationRepository, QuestionRepository};

use crate::Clock;
use crate::error::CatalogServiceError;

/// Orchestrates certification and question-bank maintenance.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    certifications: Arc<dyn CertificationRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        certifications: Arc<dyn CertificationRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            clock,
            certifications,
            questions,
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        let repo = Arc::new(storage::repository::InMemoryRepository::new());
        Self::new(clock, repo.clone(), repo)
    }

    /// Register a certification (or replace an existing one) and persist it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Catalog` for validation failures.
    /// Returns `CatalogServiceError::Storage` if persistence fails.
    pub async fn register_certification(
        &self,
        id: CertificationId,
        name: String,
        description: String,
        passing_grade: u8,
        domains: Vec<DomainTag>,
    ) -> Result<Certification, CatalogServiceError> {
        let now = self.clock.now();
        let certification = Certification::new(id, name, description, passing_grade, domains, now)?;
        self.certifications
            .upsert_certification(&certification)
            .await?;
        Ok(certification)
    }

    /// Fetch a certification by ID.
    ///
    /// Returns `Ok(None)` when the certification does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn get_certification(
        &self,
        id: CertificationId,
    ) -> Result<Option<Certification>, CatalogServiceError> {
        let certification = self.certifications.get_certification(id).await?;
        Ok(certification)
    }

    /// List all certifications ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_certifications(&self) -> Result<Vec<Certification>, CatalogServiceError> {
        let certifications = self.certifications.list_certifications().await?;
        Ok(certifications)
    }

    /// List the exam domains declared by a certification.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if the certification is missing
    /// or repository access fails.
    pub async fn list_domains(
        &self,
        id: CertificationId,
    ) -> Result<Vec<DomainTag>, CatalogServiceError> {
        let certification = self
            .certifications
            .get_certification(id)
            .await?
            .ok_or(storage::repository::StorageError::NotFound)?;
        Ok(certification.domains().to_vec())
    }

    /// Add a question to a certification's bank, replacing any question with
    /// the same ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if persistence fails.
    pub async fn add_question(
        &self,
        certification_id: CertificationId,
        question: &Question,
    ) -> Result<(), CatalogServiceError> {
        self.questions
            .upsert_question(certification_id, question)
            .await?;
        Ok(())
    }

    /// List every question of a certification ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_questions(
        &self,
        certification_id: CertificationId,
    ) -> Result<Vec<Question>, CatalogServiceError> {
        let questions = self.questions.list_questions(certification_id).await?;
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use exam_core::model::{AnswerOption, OptionKey, QuestionId};
    use exam_core::time::fixed_now;

    fn domain(name: &str) -> DomainTag {
        DomainTag::new(name).unwrap()
    }

    fn build_question(id: u64) -> Question {
        let options = vec![
            AnswerOption::new(OptionKey::new('A').unwrap(), "Right", true).unwrap(),
            AnswerOption::new(OptionKey::new('B').unwrap(), "Wrong", false).unwrap(),
        ];
        Question::new(
            QuestionId::new(id),
            format!("Question {id}?"),
            options,
            domain("role"),
            exam_core::model::Difficulty::Medium,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn register_certification_persists_and_lists() {
        let service = CatalogService::in_memory(Clock::Fixed(fixed_now()));

        let certification = service
            .register_certification(
                CertificationId::new(1),
                "Scrum Basics".to_string(),
                String::new(),
                70,
                vec![domain("role"), domain("event")],
            )
            .await
            .unwrap();
        assert_eq!(certification.passing_grade(), 70);

        let fetched = service
            .get_certification(CertificationId::new(1))
            .await
            .unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().name(), "Scrum Basics");

        let domains = service.list_domains(CertificationId::new(1)).await.unwrap();
        assert_eq!(domains, vec![domain("role"), domain("event")]);

        assert_eq!(service.list_certifications().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_question_fills_the_bank() {
        let service = CatalogService::in_memory(Clock::Fixed(fixed_now()));
        let certification_id = CertificationId::new(1);

        service
            .add_question(certification_id, &build_question(2))
            .await
            .unwrap();
        service
            .add_question(certification_id, &build_question(1))
            .await
            .unwrap();

        let questions = service.list_questions(certification_id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id(), QuestionId::new(1));
    }
}
