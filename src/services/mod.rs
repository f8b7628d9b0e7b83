pub mod consistency;
pub mod error;
pub mod locks;
pub mod queries;
pub mod validation;
pub mod write_coordinator;

pub use consistency::{ConsistencyChecker, DriftReport};
pub use error::{ServiceError, ServiceResult};
pub use queries::{GradebookQueries, RankedStudent, StudentSummary};
pub use write_coordinator::WriteCoordinator;
