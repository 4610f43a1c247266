use chrono::{DateTime, Utc};
use thiserror::Error;

use super::domain::DomainTag;
use super::ids::CertificationId;

/// Passing grade applied when a certification does not override it.
pub const DEFAULT_PASSING_GRADE: u8 = 70;

/// A certification programme that tests are assembled for.
///
/// The passing grade lives here and nowhere else; sessions and results read
/// it from the certification they were started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certification {
    id: CertificationId,
    name: String,
    description: Option<String>,
    passing_grade: u8,
    domains: Vec<DomainTag>,
    created_at: DateTime<Utc>,
}

impl Certification {
    /// Create a validated certification.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyName` if the name is empty after trimming,
    /// or `CatalogError::InvalidPassingGrade` if the grade is outside
    /// `1..=100`.
    pub fn new(
        id: CertificationId,
        name: impl Into<String>,
        description: impl Into<String>,
        passing_grade: u8,
        domains: Vec<DomainTag>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        let name = name.into();
        let trimmed_name = name.trim();
        if trimmed_name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if passing_grade == 0 || passing_grade > 100 {
            return Err(CatalogError::InvalidPassingGrade {
                grade: passing_grade,
            });
        }
        let description = description.into();
        let trimmed_description = description.trim();
        let description = if trimmed_description.is_empty() {
            None
        } else {
            Some(trimmed_description.to_string())
        };
        Ok(Self {
            id,
            name: trimmed_name.to_string(),
            description,
            passing_grade,
            domains,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> CertificationId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Minimum score percent required to pass, in `1..=100`.
    #[must_use]
    pub fn passing_grade(&self) -> u8 {
        self.passing_grade
    }

    #[must_use]
    pub fn domains(&self) -> &[DomainTag] {
        &self.domains
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Preset test lengths a candidate can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    Short,
    Medium,
    Full,
}

impl TestKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            TestKind::Short => "short",
            TestKind::Medium => "medium",
            TestKind::Full => "full",
        }
    }

    /// Question count and time budget for this kind of test.
    #[must_use]
    pub fn settings(&self) -> TestSettings {
        match self {
            TestKind::Short => TestSettings {
                question_count: 10,
                duration_secs: 600,
            },
            TestKind::Medium => TestSettings {
                question_count: 30,
                duration_secs: 1800,
            },
            TestKind::Full => TestSettings {
                question_count: 60,
                duration_secs: 3600,
            },
        }
    }
}

/// How many questions a test draws and how long the countdown runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSettings {
    question_count: u32,
    duration_secs: u32,
}

impl TestSettings {
    /// Create custom settings.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogError` if the question count or duration is zero.
    pub fn new(question_count: u32, duration_secs: u32) -> Result<Self, CatalogError> {
        if question_count == 0 {
            return Err(CatalogError::ZeroQuestionCount);
        }
        if duration_secs == 0 {
            return Err(CatalogError::ZeroDuration);
        }
        Ok(Self {
            question_count,
            duration_secs,
        })
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("certification name cannot be empty")]
    EmptyName,
    #[error("passing grade must be in 1..=100, got {grade}")]
    InvalidPassingGrade { grade: u8 },
    #[error("test needs at least one question")]
    ZeroQuestionCount,
    #[error("test duration must be at least one second")]
    ZeroDuration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build_certification(passing_grade: u8) -> Result<Certification, CatalogError> {
        Certification::new(
            CertificationId::new(1),
            "Scrum Essentials",
            "Entry-level scrum certification",
            passing_grade,
            vec![
                DomainTag::new("role").unwrap(),
                DomainTag::new("artifact").unwrap(),
            ],
            fixed_now(),
        )
    }

    #[test]
    fn builds_valid_certification() {
        let cert = build_certification(DEFAULT_PASSING_GRADE).unwrap();
        assert_eq!(cert.name(), "Scrum Essentials");
        assert_eq!(cert.passing_grade(), 70);
        assert_eq!(cert.domains().len(), 2);
    }

    #[test]
    fn trims_name_and_drops_blank_description() {
        let cert = Certification::new(
            CertificationId::new(2),
            "  PSM I  ",
            "   ",
            70,
            Vec::new(),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(cert.name(), "PSM I");
        assert_eq!(cert.description(), None);
    }

    #[test]
    fn rejects_empty_name() {
        let err = Certification::new(
            CertificationId::new(3),
            " ",
            "",
            70,
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, CatalogError::EmptyName);
    }

    #[test]
    fn rejects_out_of_range_grades() {
        assert_eq!(
            build_certification(0).unwrap_err(),
            CatalogError::InvalidPassingGrade { grade: 0 }
        );
        assert_eq!(
            build_certification(101).unwrap_err(),
            CatalogError::InvalidPassingGrade { grade: 101 }
        );
        assert!(build_certification(100).is_ok());
    }

    #[test]
    fn presets_scale_with_kind() {
        assert_eq!(TestKind::Short.settings().question_count(), 10);
        assert_eq!(TestKind::Short.settings().duration_secs(), 600);
        assert_eq!(TestKind::Medium.settings().question_count(), 30);
        assert_eq!(TestKind::Medium.settings().duration_secs(), 1800);
        assert_eq!(TestKind::Full.settings().question_count(), 60);
        assert_eq!(TestKind::Full.settings().duration_secs(), 3600);
    }

    #[test]
    fn rejects_zero_settings() {
        assert_eq!(
            TestSettings::new(0, 600).unwrap_err(),
            CatalogError::ZeroQuestionCount
        );
        assert_eq!(
            TestSettings::new(10, 0).unwrap_err(),
            CatalogError::ZeroDuration
        );
    }
}
