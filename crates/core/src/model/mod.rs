mod catalog;
mod domain;
mod ids;
mod question;
mod result;
mod session;

pub use ids::{CertificationId, ParseIdError, QuestionId};

pub use catalog::{CatalogError, Certification, DEFAULT_PASSING_GRADE, TestKind, TestSettings};
pub use domain::{DomainTag, DomainTagError};
pub use question::{AnswerOption, Difficulty, OptionKey, Question, QuestionError};
pub use result::{DomainScore, TestResult, TestResultError};
pub use session::{SessionError, SessionProgress, SessionStatus, TestSession};
