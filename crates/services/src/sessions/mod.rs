mod queries;
mod ticker;
mod view;
mod workflow;

// Public API of the exam session subsystem.
pub use crate::error::ExamError;
pub use ticker::{ActiveExam, CountdownTimer, SharedSession};
pub use view::{AttemptHistoryService, AttemptId, AttemptLatestItem, AttemptListItem};
pub use workflow::{ExamFlowService, ExamOutcome};
