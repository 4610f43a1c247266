#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AnswerRecord, AttemptRecord, AttemptRepository, AttemptRow, CertificationRepository,
    DomainScoreRecord, InMemoryRepository, QuestionRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
