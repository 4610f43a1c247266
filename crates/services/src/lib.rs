#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use catalog::CatalogService;
pub use error::{CatalogServiceError, ExamError};

pub use sessions::{
    ActiveExam, AttemptHistoryService, AttemptId, AttemptLatestItem, AttemptListItem,
    CountdownTimer, ExamFlowService, ExamOutcome, SharedSession,
};
