use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::{
    Attendance, AttendanceEntry, Department, Mark, MarkEntry, Subject,
};
use crate::database::store::{GradebookStore, RecordFilter};
use crate::types::{Identity, Role};

/// Average mark total for one semester
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterTrend {
    pub semester: u8,
    pub average_total: f64,
    pub subject_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: String,
    pub roll_no: String,
    pub department: Department,
    pub year: u8,
    pub section: String,
    pub cgpa: f64,
    pub overall_attendance: f64,
}

/// Dashboard view of one student
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student: StudentProfile,
    pub subjects: Vec<Subject>,
    pub current_semester: u8,
    pub current_marks: Vec<MarkEntry>,
    pub current_attendance: Vec<AttendanceEntry>,
    pub performance_trend: Vec<SemesterTrend>,
    pub all_marks: Vec<MarkEntry>,
    pub all_attendance: Vec<AttendanceEntry>,
}

pub const DEFAULT_TOP_STUDENTS: usize = 5;
pub const MAX_TOP_STUDENTS: usize = 100;

/// One row of the cgpa leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub rank: usize,
    pub id: Uuid,
    pub name: String,
    pub roll_no: String,
    pub department: Department,
    pub year: u8,
    pub section: String,
    pub cgpa: f64,
    pub overall_attendance: f64,
}

/// Read side of the gradebook. Students only ever see their own rows.
pub struct GradebookQueries {
    store: Arc<dyn GradebookStore>,
}

impl GradebookQueries {
    pub fn new(store: Arc<dyn GradebookStore>) -> Self {
        Self { store }
    }

    fn scoped(who: &Identity, filter: &RecordFilter) -> RecordFilter {
        let mut filter = filter.clone();
        if who.role == Role::Student {
            filter.student_id = Some(who.id);
        }
        filter
    }

    pub async fn list_marks(&self, who: &Identity, filter: &RecordFilter) -> ServiceResult<Vec<Mark>> {
        Ok(self.store.marks(&Self::scoped(who, filter)).await?)
    }

    pub async fn list_attendance(
        &self,
        who: &Identity,
        filter: &RecordFilter,
    ) -> ServiceResult<Vec<Attendance>> {
        Ok(self.store.attendance_records(&Self::scoped(who, filter)).await?)
    }

    pub async fn student_summary(&self, who: &Identity, student_id: Uuid) -> ServiceResult<StudentSummary> {
        if who.role == Role::Student && who.id != student_id {
            return Err(ServiceError::forbidden("students may only view their own summary"));
        }

        let student = self
            .store
            .student(student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("student {}", student_id)))?;

        let mut subject_ids = student.subjects.clone();
        subject_ids.extend(student.aggregate_subject_ids());
        subject_ids.sort();
        subject_ids.dedup();
        let known: HashMap<Uuid, Subject> = self
            .store
            .subjects(&subject_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let current_semester = student.current_semester();
        let in_current = |subject_id: &Uuid| {
            known
                .get(subject_id)
                .is_some_and(|s| s.semester == current_semester)
        };

        let rows = self.store.marks(&RecordFilter::for_student(student_id)).await?;

        Ok(StudentSummary {
            student: StudentProfile {
                id: student.id,
                name: student.name.clone(),
                roll_no: student.roll_no.clone(),
                department: student.department,
                year: student.year,
                section: student.section.clone(),
                cgpa: student.cgpa,
                overall_attendance: student.overall_attendance,
            },
            subjects: student
                .subjects
                .iter()
                .filter_map(|id| known.get(id).cloned())
                .collect(),
            current_semester,
            current_marks: student
                .marks
                .iter()
                .filter(|m| in_current(&m.subject_id))
                .cloned()
                .collect(),
            current_attendance: student
                .attendance
                .iter()
                .filter(|a| in_current(&a.subject_id))
                .cloned()
                .collect(),
            performance_trend: performance_trend(&rows),
            all_marks: student.marks.clone(),
            all_attendance: student.attendance.clone(),
        })
    }
}

impl GradebookQueries {
    /// Staff-only leaderboard over the stored aggregates
    pub async fn top_students(&self, who: &Identity, limit: Option<usize>) -> ServiceResult<Vec<RankedStudent>> {
        if !who.role.is_staff() {
            return Err(ServiceError::forbidden("only staff may view student rankings"));
        }
        let limit = limit.unwrap_or(DEFAULT_TOP_STUDENTS).clamp(1, MAX_TOP_STUDENTS);

        let ranked = self
            .store
            .top_students(limit)
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, s)| RankedStudent {
                rank: i + 1,
                id: s.id,
                name: s.name,
                roll_no: s.roll_no,
                department: s.department,
                year: s.year,
                section: s.section,
                cgpa: s.cgpa,
                overall_attendance: s.overall_attendance,
            })
            .collect();
        Ok(ranked)
    }
}

/// Per-semester average of mark totals, ascending by semester
pub fn performance_trend(marks: &[Mark]) -> Vec<SemesterTrend> {
    let mut by_semester: BTreeMap<u8, (f64, usize)> = BTreeMap::new();
    for mark in marks {
        let slot = by_semester.entry(mark.semester).or_insert((0.0, 0));
        slot.0 += mark.total;
        slot.1 += 1;
    }
    by_semester
        .into_iter()
        .map(|(semester, (sum, count))| SemesterTrend {
            semester,
            average_total: sum / count as f64,
            subject_count: count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::store::{Commit, RecordWrite};
    use crate::testing::{mark_fixture, student_fixture, subject_fixture};

    #[test]
    fn trend_is_grouped_and_ascending() {
        let id = Uuid::new_v4();
        let mut s3 = mark_fixture(id, Uuid::new_v4(), 40.0, 40.0);
        s3.semester = 3;
        let mut s1a = mark_fixture(id, Uuid::new_v4(), 30.0, 30.0);
        s1a.semester = 1;
        let mut s1b = mark_fixture(id, Uuid::new_v4(), 20.0, 20.0);
        s1b.semester = 1;

        let trend = performance_trend(&[s3, s1a, s1b]);
        assert_eq!(
            trend,
            vec![
                SemesterTrend { semester: 1, average_total: 50.0, subject_count: 2 },
                SemesterTrend { semester: 3, average_total: 80.0, subject_count: 1 },
            ]
        );
    }

    async fn seeded() -> (Arc<MemoryStore>, GradebookQueries, Uuid, Uuid, Uuid) {
        let mut student = student_fixture();
        let current = subject_fixture("CS401", 4);
        let old = subject_fixture("CS101", 1);
        student.subjects = vec![current.id, old.id];
        let store = Arc::new(
            MemoryStore::with_seed(vec![current.clone(), old.clone()], vec![student.clone()])
                .await
                .unwrap(),
        );

        let mut next = student.clone();
        let mut mark = mark_fixture(student.id, current.id, 40.0, 40.0);
        mark.semester = 4;
        next.upsert_mark_entry(mark.entry());
        next.next_revision();
        store
            .commit(Commit {
                record: Some(RecordWrite::InsertMark(mark)),
                student: next.clone(),
                expected_version: student.version,
            })
            .await
            .unwrap();

        let other = mark_fixture(student.id, old.id, 20.0, 20.0);
        let expected_version = next.version;
        next.upsert_mark_entry(other.entry());
        next.next_revision();
        store
            .commit(Commit {
                record: Some(RecordWrite::InsertMark(other)),
                student: next,
                expected_version,
            })
            .await
            .unwrap();

        let queries = GradebookQueries::new(store.clone());
        (store, queries, student.id, current.id, old.id)
    }

    #[tokio::test]
    async fn summary_splits_current_semester() {
        let (_, queries, student_id, current, _) = seeded().await;
        let teacher = Identity::new(Uuid::new_v4(), Role::Teacher);

        let summary = queries.student_summary(&teacher, student_id).await.unwrap();

        assert_eq!(summary.current_semester, 4);
        assert_eq!(summary.subjects.len(), 2);
        assert_eq!(summary.current_marks.len(), 1);
        assert_eq!(summary.current_marks[0].subject_id, current);
        assert_eq!(summary.all_marks.len(), 2);
        assert_eq!(
            summary.performance_trend.iter().map(|t| t.semester).collect::<Vec<_>>(),
            vec![1, 4]
        );
    }

    #[tokio::test]
    async fn students_only_see_themselves() {
        let (_, queries, student_id, _, _) = seeded().await;
        let stranger = Identity::new(Uuid::new_v4(), Role::Student);

        assert!(matches!(
            queries.student_summary(&stranger, student_id).await,
            Err(ServiceError::Forbidden(_))
        ));
        // Filter for someone else is overridden with the caller's own id
        let rows = queries
            .list_marks(&stranger, &RecordFilter::for_student(student_id))
            .await
            .unwrap();
        assert!(rows.is_empty());

        let me = Identity::new(student_id, Role::Student);
        assert_eq!(queries.list_marks(&me, &RecordFilter::default()).await.unwrap().len(), 2);
        assert!(queries.student_summary(&me, student_id).await.is_ok());
    }

    #[tokio::test]
    async fn filters_by_subject_and_semester() {
        let (_, queries, _, current, _) = seeded().await;
        let admin = Identity::new(Uuid::new_v4(), Role::Admin);

        let by_subject = RecordFilter {
            subject_id: Some(current),
            ..Default::default()
        };
        assert_eq!(queries.list_marks(&admin, &by_subject).await.unwrap().len(), 1);

        let by_semester = RecordFilter {
            semester: Some(7),
            ..Default::default()
        };
        assert!(queries.list_marks(&admin, &by_semester).await.unwrap().is_empty());
        assert!(queries.list_attendance(&admin, &RecordFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_student_is_not_found() {
        let (_, queries, _, _, _) = seeded().await;
        let admin = Identity::new(Uuid::new_v4(), Role::Admin);
        assert!(matches!(
            queries.student_summary(&admin, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rankings_are_staff_only_and_clamped() {
        let mut best = student_fixture();
        best.cgpa = 9.0;
        let mut next = student_fixture();
        next.cgpa = 7.5;
        let store = Arc::new(
            MemoryStore::with_seed(vec![], vec![next.clone(), best.clone()])
                .await
                .unwrap(),
        );
        let queries = GradebookQueries::new(store);

        let teacher = Identity::new(Uuid::new_v4(), Role::Teacher);
        let ranked = queries.top_students(&teacher, None).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!((ranked[0].rank, ranked[0].id), (1, best.id));
        assert_eq!((ranked[1].rank, ranked[1].id), (2, next.id));

        // Zero is raised to one row
        assert_eq!(queries.top_students(&teacher, Some(0)).await.unwrap().len(), 1);

        let student = Identity::new(best.id, Role::Student);
        assert!(matches!(
            queries.top_students(&student, None).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
