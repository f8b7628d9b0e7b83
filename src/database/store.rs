use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Attendance, AttendanceKey, Mark, MarkKey, Student, Subject,
};

/// Errors surfaced by any store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Student {student_id} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        student_id: Uuid,
        expected: i64,
        found: i64,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // Connection trouble is transient, not a bad query
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filters accepted by the list queries. All present fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    pub student_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub semester: Option<u8>,
}

impl RecordFilter {
    pub fn for_student(student_id: Uuid) -> Self {
        Self {
            student_id: Some(student_id),
            ..Default::default()
        }
    }

    fn matches(&self, student_id: Uuid, subject_id: Uuid, semester: u8) -> bool {
        self.student_id.map_or(true, |id| id == student_id)
            && self.subject_id.map_or(true, |id| id == subject_id)
            && self.semester.map_or(true, |s| s == semester)
    }

    pub fn matches_mark(&self, mark: &Mark) -> bool {
        self.matches(mark.student_id, mark.subject_id, mark.semester)
    }

    pub fn matches_attendance(&self, record: &Attendance) -> bool {
        self.matches(record.student_id, record.subject_id, record.semester)
    }
}

/// Record-table half of a commit
#[derive(Debug, Clone)]
pub enum RecordWrite {
    InsertMark(Mark),
    ReplaceMark(Mark),
    InsertAttendance(Attendance),
    ReplaceAttendance(Attendance),
}

impl RecordWrite {
    pub fn describe(&self) -> String {
        match self {
            RecordWrite::InsertMark(m) => format!("insert mark {}", m.id),
            RecordWrite::ReplaceMark(m) => format!("replace mark {}", m.id),
            RecordWrite::InsertAttendance(a) => format!("insert attendance {}", a.id),
            RecordWrite::ReplaceAttendance(a) => format!("replace attendance {}", a.id),
        }
    }
}

/// A record write and the student document that mirrors it, applied together
/// or not at all.
///
/// `student` is the new revision; the commit only lands if the stored
/// document is still at `expected_version`.
#[derive(Debug, Clone)]
pub struct Commit {
    pub record: Option<RecordWrite>,
    pub student: Student,
    pub expected_version: i64,
}

/// Persistence seam for subjects, students and the mark/attendance tables
#[async_trait]
pub trait GradebookStore: Send + Sync {
    /// Backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> StoreResult<()>;

    async fn subject(&self, id: Uuid) -> StoreResult<Option<Subject>>;

    async fn subjects(&self, ids: &[Uuid]) -> StoreResult<Vec<Subject>>;

    async fn insert_subject(&self, subject: Subject) -> StoreResult<()>;

    async fn student(&self, id: Uuid) -> StoreResult<Option<Student>>;

    async fn student_ids(&self) -> StoreResult<Vec<Uuid>>;

    async fn insert_student(&self, student: Student) -> StoreResult<()>;

    /// Active students by stored cgpa, highest first, ties by roll number
    async fn top_students(&self, limit: usize) -> StoreResult<Vec<Student>>;

    async fn mark(&self, id: Uuid) -> StoreResult<Option<Mark>>;

    async fn mark_by_key(&self, key: &MarkKey) -> StoreResult<Option<Mark>>;

    /// Newest first
    async fn marks(&self, filter: &RecordFilter) -> StoreResult<Vec<Mark>>;

    async fn attendance(&self, id: Uuid) -> StoreResult<Option<Attendance>>;

    async fn attendance_by_key(&self, key: &AttendanceKey) -> StoreResult<Option<Attendance>>;

    /// Newest first
    async fn attendance_records(&self, filter: &RecordFilter) -> StoreResult<Vec<Attendance>>;

    /// Apply a record write and a student revision atomically
    async fn commit(&self, commit: Commit) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Sqlx(sqlx::Error::RowNotFound)
        ));
    }

    #[test]
    fn filter_fields_must_all_match() {
        let student = Uuid::new_v4();
        let filter = RecordFilter {
            semester: Some(3),
            ..RecordFilter::for_student(student)
        };
        assert!(filter.matches(student, Uuid::new_v4(), 3));
        assert!(!filter.matches(student, Uuid::new_v4(), 4));
        assert!(!filter.matches(Uuid::new_v4(), Uuid::new_v4(), 3));
    }
}
