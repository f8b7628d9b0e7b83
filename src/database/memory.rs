use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::database::models::{
    Attendance, AttendanceKey, Mark, MarkKey, Student, Subject,
};
use crate::database::store::{
    Commit, GradebookStore, RecordFilter, RecordWrite, StoreError, StoreResult,
};

#[derive(Default)]
struct Tables {
    subjects: HashMap<Uuid, Subject>,
    students: HashMap<Uuid, Student>,
    marks: HashMap<Uuid, Mark>,
    mark_keys: HashMap<MarkKey, Uuid>,
    attendance: HashMap<Uuid, Attendance>,
    attendance_keys: HashMap<AttendanceKey, Uuid>,
}

impl Tables {
    /// Check a record write against the unique indexes without applying it
    fn check_record(&self, write: &RecordWrite) -> StoreResult<()> {
        match write {
            RecordWrite::InsertMark(mark) => {
                if self.marks.contains_key(&mark.id) || self.mark_keys.contains_key(&mark.key()) {
                    return Err(StoreError::DuplicateKey(format!(
                        "mark already exists for student {} subject {}",
                        mark.student_id, mark.subject_id
                    )));
                }
            }
            RecordWrite::ReplaceMark(mark) => {
                if !self.marks.contains_key(&mark.id) {
                    return Err(StoreError::NotFound(format!("mark {}", mark.id)));
                }
                if let Some(owner) = self.mark_keys.get(&mark.key()) {
                    if *owner != mark.id {
                        return Err(StoreError::DuplicateKey(format!(
                            "mark {} already uses that student/subject/semester/year/exam",
                            owner
                        )));
                    }
                }
            }
            RecordWrite::InsertAttendance(record) => {
                if self.attendance.contains_key(&record.id)
                    || self.attendance_keys.contains_key(&record.key())
                {
                    return Err(StoreError::DuplicateKey(format!(
                        "attendance already exists for student {} subject {}",
                        record.student_id, record.subject_id
                    )));
                }
            }
            RecordWrite::ReplaceAttendance(record) => {
                if !self.attendance.contains_key(&record.id) {
                    return Err(StoreError::NotFound(format!("attendance {}", record.id)));
                }
                if let Some(owner) = self.attendance_keys.get(&record.key()) {
                    if *owner != record.id {
                        return Err(StoreError::DuplicateKey(format!(
                            "attendance {} already uses that student/subject/semester/year",
                            owner
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_record(&mut self, write: RecordWrite) {
        match write {
            RecordWrite::InsertMark(mark) | RecordWrite::ReplaceMark(mark) => {
                if let Some(previous) = self.marks.get(&mark.id) {
                    self.mark_keys.remove(&previous.key());
                }
                self.mark_keys.insert(mark.key(), mark.id);
                self.marks.insert(mark.id, mark);
            }
            RecordWrite::InsertAttendance(record) | RecordWrite::ReplaceAttendance(record) => {
                if let Some(previous) = self.attendance.get(&record.id) {
                    self.attendance_keys.remove(&previous.key());
                }
                self.attendance_keys.insert(record.key(), record.id);
                self.attendance.insert(record.id, record);
            }
        }
    }
}

/// In-process store guarded by a single `RwLock`.
///
/// Commits validate and apply under one write lock, so a record and its
/// student revision are never visible separately.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load subjects and students in one go (fixtures, tests)
    pub async fn with_seed(subjects: Vec<Subject>, students: Vec<Student>) -> StoreResult<Self> {
        let store = Self::new();
        for subject in subjects {
            store.insert_subject(subject).await?;
        }
        for student in students {
            store.insert_student(student).await?;
        }
        Ok(store)
    }

    /// Overwrite a student document without any version check.
    /// Mirrors an out-of-band bulk edit; used to exercise drift detection.
    pub async fn replace_student_unchecked(&self, student: Student) {
        let mut tables = self.tables.write().await;
        tables.students.insert(student.id, student);
    }

    /// Write a mark row without touching the student document
    pub async fn put_mark_unchecked(&self, mark: Mark) {
        let mut tables = self.tables.write().await;
        tables.apply_record(RecordWrite::ReplaceMark(mark));
    }
}

fn newest_first<T>(mut rows: Vec<T>, created: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T> {
    rows.sort_by(|a, b| created(b).cmp(&created(a)));
    rows
}

#[async_trait]
impl GradebookStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn subject(&self, id: Uuid) -> StoreResult<Option<Subject>> {
        Ok(self.tables.read().await.subjects.get(&id).cloned())
    }

    async fn subjects(&self, ids: &[Uuid]) -> StoreResult<Vec<Subject>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.subjects.get(id).cloned())
            .collect())
    }

    async fn insert_subject(&self, subject: Subject) -> StoreResult<()> {
        subject.validate().map_err(StoreError::InvalidData)?;
        let mut tables = self.tables.write().await;
        if tables.subjects.contains_key(&subject.id)
            || tables.subjects.values().any(|s| s.code == subject.code)
        {
            return Err(StoreError::DuplicateKey(format!("subject {}", subject.code)));
        }
        tables.subjects.insert(subject.id, subject);
        Ok(())
    }

    async fn student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(self.tables.read().await.students.get(&id).cloned())
    }

    async fn student_ids(&self) -> StoreResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self.tables.read().await.students.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_student(&self, student: Student) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.students.contains_key(&student.id)
            || tables.students.values().any(|s| s.roll_no == student.roll_no)
        {
            return Err(StoreError::DuplicateKey(format!("student {}", student.roll_no)));
        }
        tables.students.insert(student.id, student);
        Ok(())
    }

    async fn top_students(&self, limit: usize) -> StoreResult<Vec<Student>> {
        let tables = self.tables.read().await;
        let mut ranked: Vec<Student> = tables
            .students
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        ranked.sort_by(|a, b| b.cgpa.total_cmp(&a.cgpa).then_with(|| a.roll_no.cmp(&b.roll_no)));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn mark(&self, id: Uuid) -> StoreResult<Option<Mark>> {
        Ok(self.tables.read().await.marks.get(&id).cloned())
    }

    async fn mark_by_key(&self, key: &MarkKey) -> StoreResult<Option<Mark>> {
        let tables = self.tables.read().await;
        Ok(tables
            .mark_keys
            .get(key)
            .and_then(|id| tables.marks.get(id))
            .cloned())
    }

    async fn marks(&self, filter: &RecordFilter) -> StoreResult<Vec<Mark>> {
        let tables = self.tables.read().await;
        let rows = tables
            .marks
            .values()
            .filter(|m| filter.matches_mark(m))
            .cloned()
            .collect();
        Ok(newest_first(rows, |m: &Mark| m.created_at))
    }

    async fn attendance(&self, id: Uuid) -> StoreResult<Option<Attendance>> {
        Ok(self.tables.read().await.attendance.get(&id).cloned())
    }

    async fn attendance_by_key(&self, key: &AttendanceKey) -> StoreResult<Option<Attendance>> {
        let tables = self.tables.read().await;
        Ok(tables
            .attendance_keys
            .get(key)
            .and_then(|id| tables.attendance.get(id))
            .cloned())
    }

    async fn attendance_records(&self, filter: &RecordFilter) -> StoreResult<Vec<Attendance>> {
        let tables = self.tables.read().await;
        let rows = tables
            .attendance
            .values()
            .filter(|a| filter.matches_attendance(a))
            .cloned()
            .collect();
        Ok(newest_first(rows, |a: &Attendance| a.created_at))
    }

    async fn commit(&self, commit: Commit) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        let stored = tables
            .students
            .get(&commit.student.id)
            .ok_or_else(|| StoreError::NotFound(format!("student {}", commit.student.id)))?;

        if stored.version != commit.expected_version {
            return Err(StoreError::VersionConflict {
                student_id: commit.student.id,
                expected: commit.expected_version,
                found: stored.version,
            });
        }

        if let Some(write) = &commit.record {
            tables.check_record(write)?;
        }

        // Nothing below can fail
        let description = commit.record.as_ref().map(RecordWrite::describe);
        if let Some(write) = commit.record {
            tables.apply_record(write);
        }
        let student_id = commit.student.id;
        let version = commit.student.version;
        tables.students.insert(student_id, commit.student);

        debug!(
            "memory commit: {} student {} -> version {}",
            description.unwrap_or_else(|| "aggregate only".to_string()),
            student_id,
            version
        );
        Ok(())
    }
}
