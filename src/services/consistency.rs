use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::{Attendance, AttendanceEntry, Mark, MarkEntry, Student};
use crate::database::store::{GradebookStore, RecordFilter, StoreResult};
use crate::grading::AggregationEngine;

const TOLERANCE: f64 = 1e-6;

/// Credits keyed by subject, empty unless the engine weights by subject
pub async fn subject_credits(
    store: &dyn GradebookStore,
    engine: &AggregationEngine,
    subject_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, f64>> {
    if !engine.needs_subject_credits() || subject_ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(store
        .subjects(subject_ids)
        .await?
        .into_iter()
        .map(|s| (s.id, f64::from(s.credits)))
        .collect())
}

/// Aggregate arrays implied by a student's record rows.
///
/// Each subject contributes its most recently updated row. Subjects appear
/// in the order their first row was created.
pub fn rebuild_entries(
    marks: &[Mark],
    attendance: &[Attendance],
) -> (Vec<MarkEntry>, Vec<AttendanceEntry>) {
    (
        latest_per_subject(marks, |m| (m.subject_id, m.created_at, m.updated_at), Mark::entry),
        latest_per_subject(
            attendance,
            |a| (a.subject_id, a.created_at, a.updated_at),
            Attendance::entry,
        ),
    )
}

fn latest_per_subject<R, E>(
    rows: &[R],
    stamps: impl Fn(&R) -> (Uuid, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>),
    entry: impl Fn(&R) -> E,
) -> Vec<E> {
    let mut ordered: Vec<&R> = rows.iter().collect();
    ordered.sort_by_key(|r| stamps(r).1);

    let mut chosen: Vec<&R> = Vec::new();
    let mut slots: HashMap<Uuid, usize> = HashMap::new();
    for row in ordered {
        let (subject_id, _, updated_at) = stamps(row);
        match slots.get(&subject_id) {
            Some(&index) => {
                if updated_at >= stamps(chosen[index]).2 {
                    chosen[index] = row;
                }
            }
            None => {
                slots.insert(subject_id, chosen.len());
                chosen.push(row);
            }
        }
    }
    chosen.into_iter().map(entry).collect()
}

/// Differences between a stored aggregate and the one its records imply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub student_id: Uuid,
    pub roll_no: String,
    /// Subjects whose mark entry is missing, extra or different
    pub mark_subjects: Vec<Uuid>,
    /// Subjects whose attendance entry is missing, extra or different
    pub attendance_subjects: Vec<Uuid>,
    pub stored_cgpa: f64,
    pub expected_cgpa: f64,
    pub stored_overall_attendance: f64,
    pub expected_overall_attendance: f64,
}

impl DriftReport {
    pub fn is_consistent(&self) -> bool {
        self.mark_subjects.is_empty()
            && self.attendance_subjects.is_empty()
            && (self.stored_cgpa - self.expected_cgpa).abs() < TOLERANCE
            && (self.stored_overall_attendance - self.expected_overall_attendance).abs() < TOLERANCE
    }
}

fn differing_subjects<E: PartialEq>(
    stored: &[E],
    expected: &[E],
    subject: impl Fn(&E) -> Uuid,
) -> Vec<Uuid> {
    let stored_by_subject: HashMap<Uuid, &E> = stored.iter().map(|e| (subject(e), e)).collect();
    let expected_by_subject: HashMap<Uuid, &E> = expected.iter().map(|e| (subject(e), e)).collect();

    let mut subjects: Vec<Uuid> = stored_by_subject
        .keys()
        .chain(expected_by_subject.keys())
        .copied()
        .filter(|id| stored_by_subject.get(id) != expected_by_subject.get(id))
        .collect();
    // Duplicate entries for one subject are drift too
    if stored_by_subject.len() != stored.len() {
        let mut seen = HashMap::new();
        for e in stored {
            *seen.entry(subject(e)).or_insert(0usize) += 1;
        }
        subjects.extend(seen.into_iter().filter(|(_, n)| *n > 1).map(|(id, _)| id));
    }
    subjects.sort();
    subjects.dedup();
    subjects
}

/// Read-only comparison of student aggregates against the record tables
pub struct ConsistencyChecker {
    store: Arc<dyn GradebookStore>,
    engine: AggregationEngine,
}

impl ConsistencyChecker {
    pub fn new(store: Arc<dyn GradebookStore>, engine: AggregationEngine) -> Self {
        Self { store, engine }
    }

    pub async fn verify_aggregate(&self, student_id: Uuid) -> ServiceResult<DriftReport> {
        let student = self
            .store
            .student(student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("student {}", student_id)))?;
        self.report_for(student).await
    }

    /// One report per student, in listing order
    pub async fn verify_all(&self) -> ServiceResult<Vec<DriftReport>> {
        let ids = self.store.student_ids().await?;
        let reports = try_join_all(ids.into_iter().map(|id| self.verify_listed(id))).await?;
        Ok(reports.into_iter().flatten().collect())
    }

    // Student may vanish between listing and reading in a shared database
    async fn verify_listed(&self, student_id: Uuid) -> ServiceResult<Option<DriftReport>> {
        match self.store.student(student_id).await? {
            Some(student) => Ok(Some(self.report_for(student).await?)),
            None => Ok(None),
        }
    }

    async fn report_for(&self, student: Student) -> ServiceResult<DriftReport> {
        let filter = RecordFilter::for_student(student.id);
        let marks = self.store.marks(&filter).await?;
        let attendance = self.store.attendance_records(&filter).await?;
        let (expected_marks, expected_attendance) = rebuild_entries(&marks, &attendance);

        let ids: Vec<Uuid> = expected_marks.iter().map(|m| m.subject_id).collect();
        let credits = subject_credits(self.store.as_ref(), &self.engine, &ids).await?;

        let report = DriftReport {
            student_id: student.id,
            roll_no: student.roll_no.clone(),
            mark_subjects: differing_subjects(&student.marks, &expected_marks, |m| m.subject_id),
            attendance_subjects: differing_subjects(
                &student.attendance,
                &expected_attendance,
                |a| a.subject_id,
            ),
            stored_cgpa: student.cgpa,
            expected_cgpa: self.engine.recompute_cgpa_with(&expected_marks, &credits),
            stored_overall_attendance: student.overall_attendance,
            expected_overall_attendance: self.engine.recompute_overall_attendance(&expected_attendance),
        };

        if !report.is_consistent() {
            tracing::warn!(
                "Aggregate drift for student {} ({}): {} mark subjects, {} attendance subjects",
                report.student_id,
                report.roll_no,
                report.mark_subjects.len(),
                report.attendance_subjects.len()
            );
        }
        Ok(report)
    }
}
