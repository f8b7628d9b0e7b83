use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::consistency::{rebuild_entries, subject_credits};
use super::error::{ServiceError, ServiceResult};
use super::locks::{StudentGuard, StudentLocks};
use super::validation;
use crate::config::AppConfig;
use crate::database::models::{
    Attendance, CreateAttendanceRequest, CreateMarkRequest, Mark, Student, UpdateAttendanceRequest,
    UpdateMarkRequest,
};
use crate::database::store::{Commit, GradebookStore, RecordFilter, RecordWrite};
use crate::grading::AggregationEngine;
use crate::types::{Identity, Operation};

/// Single entry point for every change to marks, attendance and the student
/// aggregate that mirrors them.
///
/// Each write runs authorize, validate, uniqueness, then one atomic store
/// commit carrying both the record row and the recomputed student document.
pub struct WriteCoordinator {
    store: Arc<dyn GradebookStore>,
    engine: AggregationEngine,
    locks: StudentLocks,
    serialize_per_student: bool,
}

impl WriteCoordinator {
    pub fn new(
        store: Arc<dyn GradebookStore>,
        engine: AggregationEngine,
        serialize_per_student: bool,
    ) -> Self {
        Self {
            store,
            engine,
            locks: StudentLocks::new(),
            serialize_per_student,
        }
    }

    pub fn from_config(store: Arc<dyn GradebookStore>, config: &AppConfig) -> Self {
        Self::new(
            store,
            AggregationEngine::from_config(&config.grading),
            config.writes.serialize_per_student,
        )
    }

    fn authorize(who: &Identity, op: Operation) -> ServiceResult<()> {
        if !who.role.can_write_records() {
            warn!("{} rejected: {} {} may not write records", op, who.role, who.id);
            return Err(ServiceError::forbidden(format!(
                "role '{}' may not perform {}",
                who.role, op
            )));
        }
        Ok(())
    }

    async fn serialize(&self, student_id: Uuid) -> Option<StudentGuard> {
        if self.serialize_per_student {
            Some(self.locks.acquire(student_id).await)
        } else {
            None
        }
    }

    async fn require_subject(&self, subject_id: Uuid) -> ServiceResult<()> {
        match self.store.subject(subject_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::field(
                "subjectId",
                format!("unknown subject {}", subject_id),
            )),
        }
    }

    async fn load_student(&self, student_id: Uuid) -> ServiceResult<Student> {
        self.store
            .student(student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("student {}", student_id)))
    }

    /// Recompute the summary fields, bump the version and commit with `record`
    async fn commit_revision(
        &self,
        op: Operation,
        current: &Student,
        mut next: Student,
        record: Option<RecordWrite>,
    ) -> ServiceResult<Student> {
        let credits =
            subject_credits(self.store.as_ref(), &self.engine, &next.aggregate_subject_ids()).await?;
        self.engine.apply(&mut next, &credits);
        next.next_revision();

        debug!(
            "{}: student {} cgpa {:.2} attendance {:.2}% -> version {}",
            op, next.id, next.cgpa, next.overall_attendance, next.version
        );

        self.store
            .commit(Commit {
                record,
                student: next.clone(),
                expected_version: current.version,
            })
            .await
            .map_err(|e| {
                warn!("{} commit failed for student {}: {}", op, current.id, e);
                ServiceError::from(e)
            })?;

        Ok(next)
    }

    pub async fn add_mark(&self, who: &Identity, request: CreateMarkRequest) -> ServiceResult<Mark> {
        let op = Operation::AddMark;
        Self::authorize(who, op)?;

        let now = Utc::now();
        let mut mark = Mark {
            id: Uuid::new_v4(),
            student_id: request.student_id,
            subject_id: request.subject_id,
            internal_marks: request.internal_marks,
            external_marks: request.external_marks,
            total: 0.0,
            grade: Default::default(),
            semester: request.semester,
            academic_year: request.academic_year.trim().to_string(),
            exam_type: request.exam_type,
            remarks: request.remarks,
            updated_by: Some(who.id),
            created_at: now,
            updated_at: now,
        };
        mark.recompute();
        validation::check_mark(&mark)?;
        self.require_subject(mark.subject_id).await?;

        let _guard = self.serialize(mark.student_id).await;

        if self.store.mark_by_key(&mark.key()).await?.is_some() {
            warn!(
                "{} rejected: mark exists for student {} subject {} semester {} {} {}",
                op, mark.student_id, mark.subject_id, mark.semester, mark.academic_year, mark.exam_type
            );
            return Err(ServiceError::conflict(
                "marks already exist for this student, subject, semester, academic year and exam type",
            ));
        }

        let student = self.load_student(mark.student_id).await?;
        let mut next = student.clone();
        let change = next.upsert_mark_entry(mark.entry());
        debug!("{}: aggregate entry {:?} for subject {}", op, change, mark.subject_id);

        self.commit_revision(op, &student, next, Some(RecordWrite::InsertMark(mark.clone())))
            .await?;

        info!("Mark {} created by {} for student {}", mark.id, who.id, mark.student_id);
        Ok(mark)
    }

    pub async fn update_mark(
        &self,
        who: &Identity,
        mark_id: Uuid,
        request: UpdateMarkRequest,
    ) -> ServiceResult<Mark> {
        let op = Operation::UpdateMark;
        Self::authorize(who, op)?;

        let owner = self
            .store
            .mark(mark_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("mark {}", mark_id)))?
            .student_id;

        let _guard = self.serialize(owner).await;

        // Re-read under the lock so the merge starts from the latest row
        let mut mark = self
            .store
            .mark(mark_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("mark {}", mark_id)))?;
        validation::check_same_owner(
            request.student_id,
            request.subject_id,
            mark.student_id,
            mark.subject_id,
        )?;

        let previous_key = mark.key();
        request.apply_to(&mut mark);
        mark.recompute();
        mark.updated_by = Some(who.id);
        mark.updated_at = Utc::now();
        validation::check_mark(&mark)?;

        if mark.key() != previous_key {
            if let Some(other) = self.store.mark_by_key(&mark.key()).await? {
                if other.id != mark.id {
                    return Err(ServiceError::conflict(format!(
                        "mark {} already uses that semester, academic year and exam type",
                        other.id
                    )));
                }
            }
        }

        let student = self.load_student(mark.student_id).await?;
        let mut next = student.clone();
        let change = next.upsert_mark_entry(mark.entry());
        debug!("{}: aggregate entry {:?} for subject {}", op, change, mark.subject_id);

        self.commit_revision(op, &student, next, Some(RecordWrite::ReplaceMark(mark.clone())))
            .await?;

        info!("Mark {} updated by {}", mark.id, who.id);
        Ok(mark)
    }

    pub async fn add_attendance(
        &self,
        who: &Identity,
        request: CreateAttendanceRequest,
    ) -> ServiceResult<Attendance> {
        let op = Operation::AddAttendance;
        Self::authorize(who, op)?;

        let now = Utc::now();
        let mut record = Attendance {
            id: Uuid::new_v4(),
            student_id: request.student_id,
            subject_id: request.subject_id,
            total_classes: request.total_classes,
            attended_classes: request.attended_classes,
            percentage: 0.0,
            semester: request.semester,
            academic_year: request.academic_year.trim().to_string(),
            status: request.status,
            remarks: request.remarks,
            updated_by: Some(who.id),
            created_at: now,
            updated_at: now,
        };
        record.recompute();
        validation::check_attendance(&record)?;
        self.require_subject(record.subject_id).await?;

        let _guard = self.serialize(record.student_id).await;

        if self.store.attendance_by_key(&record.key()).await?.is_some() {
            warn!(
                "{} rejected: attendance exists for student {} subject {} semester {} {}",
                op, record.student_id, record.subject_id, record.semester, record.academic_year
            );
            return Err(ServiceError::conflict(
                "attendance already exists for this student, subject, semester and academic year",
            ));
        }

        let student = self.load_student(record.student_id).await?;
        let mut next = student.clone();
        let change = next.upsert_attendance_entry(record.entry());
        debug!("{}: aggregate entry {:?} for subject {}", op, change, record.subject_id);

        self.commit_revision(
            op,
            &student,
            next,
            Some(RecordWrite::InsertAttendance(record.clone())),
        )
        .await?;

        info!(
            "Attendance {} created by {} for student {}",
            record.id, who.id, record.student_id
        );
        Ok(record)
    }

    pub async fn update_attendance(
        &self,
        who: &Identity,
        attendance_id: Uuid,
        request: UpdateAttendanceRequest,
    ) -> ServiceResult<Attendance> {
        let op = Operation::UpdateAttendance;
        Self::authorize(who, op)?;

        let owner = self
            .store
            .attendance(attendance_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("attendance {}", attendance_id)))?
            .student_id;

        let _guard = self.serialize(owner).await;

        let mut record = self
            .store
            .attendance(attendance_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("attendance {}", attendance_id)))?;
        validation::check_same_owner(
            request.student_id,
            request.subject_id,
            record.student_id,
            record.subject_id,
        )?;

        let previous_key = record.key();
        request.apply_to(&mut record);
        record.recompute();
        record.updated_by = Some(who.id);
        record.updated_at = Utc::now();
        validation::check_attendance(&record)?;

        if record.key() != previous_key {
            if let Some(other) = self.store.attendance_by_key(&record.key()).await? {
                if other.id != record.id {
                    return Err(ServiceError::conflict(format!(
                        "attendance {} already uses that semester and academic year",
                        other.id
                    )));
                }
            }
        }

        let student = self.load_student(record.student_id).await?;
        let mut next = student.clone();
        let change = next.upsert_attendance_entry(record.entry());
        debug!("{}: aggregate entry {:?} for subject {}", op, change, record.subject_id);

        self.commit_revision(
            op,
            &student,
            next,
            Some(RecordWrite::ReplaceAttendance(record.clone())),
        )
        .await?;

        info!("Attendance {} updated by {}", record.id, who.id);
        Ok(record)
    }

    /// Rebuild a student's aggregate arrays from the record tables and
    /// recompute the summary fields. Repairs drift left by out-of-band edits.
    pub async fn rebuild_aggregate(&self, who: &Identity, student_id: Uuid) -> ServiceResult<Student> {
        let op = Operation::RebuildAggregate;
        Self::authorize(who, op)?;

        let _guard = self.serialize(student_id).await;

        let student = self.load_student(student_id).await?;
        let filter = RecordFilter::for_student(student_id);
        let marks = self.store.marks(&filter).await?;
        let attendance = self.store.attendance_records(&filter).await?;

        let mut next = student.clone();
        let (mark_entries, attendance_entries) = rebuild_entries(&marks, &attendance);
        next.marks = mark_entries;
        next.attendance = attendance_entries;

        let rebuilt = self.commit_revision(op, &student, next, None).await?;
        info!(
            "Aggregate for student {} rebuilt by {} from {} mark and {} attendance rows",
            student_id,
            who.id,
            marks.len(),
            attendance.len()
        );
        Ok(rebuilt)
    }
}
