// Pure derivation engines for marks, attendance and student aggregates.
// Nothing in here touches storage; callers pass in the values or snapshots.

pub mod aggregate;
pub mod attendance;
pub mod grade;

pub use aggregate::{AggregationEngine, CreditPolicy};
pub use attendance::percentage_of;
pub use grade::{grade_of, Grade};
