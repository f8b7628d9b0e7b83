use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::{Attendance, Mark};

pub const MAX_COMPONENT_MARKS: f64 = 50.0;
pub const MAX_SEMESTER: u8 = 8;

fn component(field: &str, value: f64) -> ServiceResult<()> {
    if !value.is_finite() || !(0.0..=MAX_COMPONENT_MARKS).contains(&value) {
        return Err(ServiceError::field(
            field,
            format!("must be between 0 and {}", MAX_COMPONENT_MARKS),
        ));
    }
    Ok(())
}

fn semester(value: u8) -> ServiceResult<()> {
    if !(1..=MAX_SEMESTER).contains(&value) {
        return Err(ServiceError::field(
            "semester",
            format!("must be between 1 and {}", MAX_SEMESTER),
        ));
    }
    Ok(())
}

fn academic_year(value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::field("academicYear", "must not be empty"));
    }
    Ok(())
}

/// Range checks on a mark row after any update has been merged in
pub fn check_mark(mark: &Mark) -> ServiceResult<()> {
    component("internalMarks", mark.internal_marks)?;
    component("externalMarks", mark.external_marks)?;
    semester(mark.semester)?;
    academic_year(&mark.academic_year)
}

pub fn check_attendance(record: &Attendance) -> ServiceResult<()> {
    if record.attended_classes > record.total_classes {
        return Err(ServiceError::field(
            "attendedClasses",
            format!(
                "cannot exceed totalClasses ({} > {})",
                record.attended_classes, record.total_classes
            ),
        ));
    }
    semester(record.semester)?;
    academic_year(&record.academic_year)
}

/// Updates may repeat the owning ids but never change them
pub fn check_same_owner(
    requested_student: Option<Uuid>,
    requested_subject: Option<Uuid>,
    student_id: Uuid,
    subject_id: Uuid,
) -> ServiceResult<()> {
    if requested_student.is_some_and(|id| id != student_id) {
        return Err(ServiceError::field("studentId", "cannot be changed on an existing record"));
    }
    if requested_subject.is_some_and(|id| id != subject_id) {
        return Err(ServiceError::field("subjectId", "cannot be changed on an existing record"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{attendance_fixture, mark_fixture};

    #[test]
    fn accepts_full_range() {
        let id = Uuid::new_v4();
        assert!(check_mark(&mark_fixture(id, id, 0.0, 50.0)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_components() {
        let id = Uuid::new_v4();
        for (internal, external) in [(-1.0, 10.0), (10.0, 50.5), (f64::NAN, 0.0)] {
            let err = check_mark(&mark_fixture(id, id, internal, external)).unwrap_err();
            assert!(matches!(err, ServiceError::Validation { .. }));
        }
    }

    #[test]
    fn rejects_bad_semester_and_year() {
        let id = Uuid::new_v4();
        let mut mark = mark_fixture(id, id, 10.0, 10.0);
        mark.semester = 9;
        assert!(check_mark(&mark).is_err());
        mark.semester = 2;
        mark.academic_year = "   ".into();
        assert!(check_mark(&mark).is_err());
    }

    #[test]
    fn attended_cannot_exceed_total() {
        let id = Uuid::new_v4();
        assert!(check_attendance(&attendance_fixture(id, id, 10, 10)).is_ok());
        assert!(check_attendance(&attendance_fixture(id, id, 0, 0)).is_ok());
        assert!(check_attendance(&attendance_fixture(id, id, 11, 10)).is_err());
    }

    #[test]
    fn reassignment_is_rejected() {
        let (student, subject) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(check_same_owner(Some(student), None, student, subject).is_ok());
        assert!(check_same_owner(None, Some(Uuid::new_v4()), student, subject).is_err());
        assert!(check_same_owner(Some(Uuid::new_v4()), None, student, subject).is_err());
    }
}
