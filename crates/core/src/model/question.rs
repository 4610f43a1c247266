use thiserror::Error;

use super::domain::DomainTag;
use super::ids::QuestionId;

/// Single-letter label for an answer option (`A`, `B`, `C`, ...).
///
/// Keys are normalised to uppercase so `a` and `A` address the same option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionKey(char);

impl OptionKey {
    /// Create an option key from an ASCII letter.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidOptionKey` if `raw` is not an ASCII
    /// letter.
    pub fn new(raw: char) -> Result<Self, QuestionError> {
        if !raw.is_ascii_alphabetic() {
            return Err(QuestionError::InvalidOptionKey { raw });
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_char(self) -> char {
        self.0
    }
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One answer option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    key: OptionKey,
    text: String,
    correct: bool,
}

impl AnswerOption {
    /// Create a validated answer option.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyOptionText` if the text is empty after
    /// trimming.
    pub fn new(
        key: OptionKey,
        text: impl Into<String>,
        correct: bool,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(QuestionError::EmptyOptionText { key });
        }
        Ok(Self {
            key,
            text: trimmed.to_string(),
            correct,
        })
    }

    #[must_use]
    pub fn key(&self) -> OptionKey {
        self.key
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.correct
    }
}

/// Informational difficulty label. It never affects scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// A multiple-choice question with exactly one correct option.
///
/// Validation runs once in `new`, so every constructed question is
/// well-formed and `correct_key` always names a real option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<AnswerOption>,
    correct_key: OptionKey,
    domain: DomainTag,
    difficulty: Difficulty,
}

impl Question {
    /// Create a validated question.
    ///
    /// # Errors
    ///
    /// Returns a `QuestionError` if the text is empty, there are fewer than
    /// two options, option keys repeat, or the number of correct options is
    /// not exactly one.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<AnswerOption>,
        domain: DomainTag,
        difficulty: Difficulty,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: options.len(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for option in &options {
            if !seen.insert(option.key()) {
                return Err(QuestionError::DuplicateOptionKey { key: option.key() });
            }
        }
        let mut correct = options.iter().filter(|option| option.is_correct());
        let Some(first) = correct.next() else {
            return Err(QuestionError::NoCorrectOption);
        };
        let extra = correct.count();
        if extra > 0 {
            return Err(QuestionError::MultipleCorrectOptions { count: extra + 1 });
        }
        let correct_key = first.key();
        Ok(Self {
            id,
            text: trimmed.to_string(),
            options,
            correct_key,
            domain,
            difficulty,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    /// Key of the single correct option.
    #[must_use]
    pub fn correct_key(&self) -> OptionKey {
        self.correct_key
    }

    #[must_use]
    pub fn has_option(&self, key: OptionKey) -> bool {
        self.options.iter().any(|option| option.key() == key)
    }

    #[must_use]
    pub fn domain(&self) -> &DomainTag {
        &self.domain
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,
    #[error("option {key} has empty text")]
    EmptyOptionText { key: OptionKey },
    #[error("question needs at least two options, got {count}")]
    TooFewOptions { count: usize },
    #[error("duplicate option key {key}")]
    DuplicateOptionKey { key: OptionKey },
    #[error("question has no correct option")]
    NoCorrectOption,
    #[error("question has {count} correct options, expected one")]
    MultipleCorrectOptions { count: usize },
    #[error("option key must be an ASCII letter, got {raw:?}")]
    InvalidOptionKey { raw: char },
}
