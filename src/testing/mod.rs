use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

use crate::database::memory::MemoryStore;
use crate::database::models::{
    Attendance, AttendanceKey, AttendanceStatus, Department, ExamType, Mark, MarkKey, Student,
    Subject,
};
use crate::database::store::{Commit, GradebookStore, RecordFilter, StoreResult};
use crate::grading::Grade;

/// Second-year CSE student with an empty aggregate
pub fn student_fixture() -> Student {
    let id = Uuid::new_v4();
    let now = Utc::now();
    Student {
        id,
        name: "Asha Rao".to_string(),
        roll_no: format!("CSE-{}", &id.simple().to_string()[..8]),
        email: format!("{}@college.test", id.simple()),
        department: Department::Cse,
        year: 2,
        section: "A".to_string(),
        subjects: Vec::new(),
        marks: Vec::new(),
        attendance: Vec::new(),
        cgpa: 0.0,
        overall_attendance: 0.0,
        is_active: true,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn subject_fixture(code: &str, semester: u8) -> Subject {
    Subject {
        id: Uuid::new_v4(),
        name: format!("Subject {}", code),
        code: code.to_string(),
        department: Department::Cse,
        semester,
        year: (semester + 1) / 2,
        credits: 3,
        description: None,
        is_active: true,
    }
}

/// Final-exam mark for 2024-25 with derived fields already filled in
pub fn mark_fixture(student_id: Uuid, subject_id: Uuid, internal: f64, external: f64) -> Mark {
    let now = Utc::now();
    let mut mark = Mark {
        id: Uuid::new_v4(),
        student_id,
        subject_id,
        internal_marks: internal,
        external_marks: external,
        total: 0.0,
        grade: Grade::F,
        semester: 1,
        academic_year: "2024-25".to_string(),
        exam_type: ExamType::Final,
        remarks: None,
        updated_by: None,
        created_at: now,
        updated_at: now,
    };
    mark.recompute();
    mark
}

pub fn attendance_fixture(student_id: Uuid, subject_id: Uuid, attended: u32, total: u32) -> Attendance {
    let now = Utc::now();
    let mut record = Attendance {
        id: Uuid::new_v4(),
        student_id,
        subject_id,
        total_classes: total,
        attended_classes: attended,
        percentage: 0.0,
        semester: 1,
        academic_year: "2024-25".to_string(),
        status: AttendanceStatus::Present,
        remarks: None,
        updated_by: None,
        created_at: now,
        updated_at: now,
    };
    record.recompute();
    record
}

/// Store wrapper that stretches the gap between reading a student and
/// committing, so concurrent writers overlap.
pub struct RacyStore {
    inner: MemoryStore,
    delay: Option<Duration>,
    gate: Option<(Barrier, usize)>,
    reads: AtomicUsize,
}

impl RacyStore {
    /// Every student read sleeps for `delay`
    pub fn delayed(inner: MemoryStore, delay: Duration) -> Self {
        Self {
            inner,
            delay: Some(delay),
            gate: None,
            reads: AtomicUsize::new(0),
        }
    }

    /// The first `parties` student reads wait for each other before returning
    pub fn lockstep(inner: MemoryStore, parties: usize) -> Self {
        Self {
            inner,
            delay: None,
            gate: Some((Barrier::new(parties), parties)),
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GradebookStore for RacyStore {
    fn backend(&self) -> &'static str {
        "racy-memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }

    async fn subject(&self, id: Uuid) -> StoreResult<Option<Subject>> {
        self.inner.subject(id).await
    }

    async fn subjects(&self, ids: &[Uuid]) -> StoreResult<Vec<Subject>> {
        self.inner.subjects(ids).await
    }

    async fn insert_subject(&self, subject: Subject) -> StoreResult<()> {
        self.inner.insert_subject(subject).await
    }

    async fn student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        let student = self.inner.student(id).await?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((barrier, parties)) = &self.gate {
            if self.reads.fetch_add(1, Ordering::SeqCst) < *parties {
                barrier.wait().await;
            }
        }
        Ok(student)
    }

    async fn student_ids(&self) -> StoreResult<Vec<Uuid>> {
        self.inner.student_ids().await
    }

    async fn insert_student(&self, student: Student) -> StoreResult<()> {
        self.inner.insert_student(student).await
    }

    async fn top_students(&self, limit: usize) -> StoreResult<Vec<Student>> {
        self.inner.top_students(limit).await
    }

    async fn mark(&self, id: Uuid) -> StoreResult<Option<Mark>> {
        self.inner.mark(id).await
    }

    async fn mark_by_key(&self, key: &MarkKey) -> StoreResult<Option<Mark>> {
        self.inner.mark_by_key(key).await
    }

    async fn marks(&self, filter: &RecordFilter) -> StoreResult<Vec<Mark>> {
        self.inner.marks(filter).await
    }

    async fn attendance(&self, id: Uuid) -> StoreResult<Option<Attendance>> {
        self.inner.attendance(id).await
    }

    async fn attendance_by_key(&self, key: &AttendanceKey) -> StoreResult<Option<Attendance>> {
        self.inner.attendance_by_key(key).await
    }

    async fn attendance_records(&self, filter: &RecordFilter) -> StoreResult<Vec<Attendance>> {
        self.inner.attendance_records(filter).await
    }

    async fn commit(&self, commit: Commit) -> StoreResult<()> {
        self.inner.commit(commit).await
    }
}
