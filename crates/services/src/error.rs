//! Error types shared across the service facades.

use thiserror::Error;

use exam_core::model::{CatalogError, CertificationId, SessionError, TestResultError};
use storage::repository::StorageError;

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by exam session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamError {
    #[error("certification {0} not found")]
    UnknownCertification(CertificationId),
    #[error("exam session lock is poisoned")]
    Poisoned,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Result(#[from] TestResultError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
