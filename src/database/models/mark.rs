use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::student::MarkEntry;
use crate::grading::{grade_of, Grade};
use crate::types::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExamType {
    Midterm,
    #[default]
    Final,
    Assignment,
    Quiz,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Midterm => "Midterm",
            ExamType::Final => "Final",
            ExamType::Assignment => "Assignment",
            ExamType::Quiz => "Quiz",
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Midterm" => Ok(ExamType::Midterm),
            "Final" => Ok(ExamType::Final),
            "Assignment" => Ok(ExamType::Assignment),
            "Quiz" => Ok(ExamType::Quiz),
            other => Err(format!("unknown exam type '{}'", other)),
        }
    }
}

impl TryFrom<String> for ExamType {
    type Error = UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse().map_err(UnknownVariant)
    }
}

/// Natural key of a mark row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkKey {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub semester: u8,
    pub academic_year: String,
    pub exam_type: ExamType,
}

/// Authoritative mark row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub internal_marks: f64,
    pub external_marks: f64,
    pub total: f64,
    #[sqlx(try_from = "String")]
    pub grade: Grade,
    #[sqlx(try_from = "i16")]
    pub semester: u8,
    pub academic_year: String,
    #[sqlx(try_from = "String")]
    pub exam_type: ExamType,
    pub remarks: Option<String>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mark {
    pub fn key(&self) -> MarkKey {
        MarkKey {
            student_id: self.student_id,
            subject_id: self.subject_id,
            semester: self.semester,
            academic_year: self.academic_year.clone(),
            exam_type: self.exam_type,
        }
    }

    /// Derive total and grade from the current internal/external split
    pub fn recompute(&mut self) {
        let (total, grade) = grade_of(self.internal_marks, self.external_marks);
        self.total = total;
        self.grade = grade;
    }

    /// Projection stored on the student document
    pub fn entry(&self) -> MarkEntry {
        MarkEntry {
            subject_id: self.subject_id,
            internal_marks: self.internal_marks,
            external_marks: self.external_marks,
            total: self.total,
            grade: self.grade,
        }
    }
}

/// Create payload. Total and grade are always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarkRequest {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub internal_marks: f64,
    pub external_marks: f64,
    pub semester: u8,
    pub academic_year: String,
    #[serde(default)]
    pub exam_type: ExamType,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Update payload; absent fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMarkRequest {
    pub student_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub internal_marks: Option<f64>,
    pub external_marks: Option<f64>,
    pub semester: Option<u8>,
    pub academic_year: Option<String>,
    pub exam_type: Option<ExamType>,
    pub remarks: Option<String>,
}

impl UpdateMarkRequest {
    /// Merge onto a stored row. Derived fields are left for `Mark::recompute`.
    pub fn apply_to(&self, mark: &mut Mark) {
        if let Some(v) = self.internal_marks {
            mark.internal_marks = v;
        }
        if let Some(v) = self.external_marks {
            mark.external_marks = v;
        }
        if let Some(v) = self.semester {
            mark.semester = v;
        }
        if let Some(v) = &self.academic_year {
            mark.academic_year = v.trim().to_string();
        }
        if let Some(v) = self.exam_type {
            mark.exam_type = v;
        }
        if let Some(v) = &self.remarks {
            mark.remarks = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_type_defaults_to_final() {
        let req: CreateMarkRequest = serde_json::from_value(serde_json::json!({
            "studentId": Uuid::new_v4(),
            "subjectId": Uuid::new_v4(),
            "internalMarks": 40,
            "externalMarks": 45,
            "semester": 1,
            "academicYear": "2024-25"
        }))
        .unwrap();
        assert_eq!(req.exam_type, ExamType::Final);
    }

    #[test]
    fn caller_supplied_grade_is_ignored_on_the_wire() {
        let req: CreateMarkRequest = serde_json::from_value(serde_json::json!({
            "studentId": Uuid::new_v4(),
            "subjectId": Uuid::new_v4(),
            "internalMarks": 10,
            "externalMarks": 5,
            "semester": 1,
            "academicYear": "2024-25",
            "grade": "A+",
            "total": 100
        }))
        .unwrap();
        assert_eq!(req.internal_marks + req.external_marks, 15.0);
    }

    #[test]
    fn update_merges_only_present_fields() {
        let now = Utc::now();
        let mut mark = Mark {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            internal_marks: 20.0,
            external_marks: 20.0,
            total: 40.0,
            grade: Grade::C,
            semester: 2,
            academic_year: "2024-25".into(),
            exam_type: ExamType::Final,
            remarks: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        let patch = UpdateMarkRequest {
            external_marks: Some(50.0),
            ..Default::default()
        };

        patch.apply_to(&mut mark);
        mark.recompute();

        assert_eq!(mark.internal_marks, 20.0);
        assert_eq!(mark.total, 70.0);
        assert_eq!(mark.grade, Grade::BPlus);
        assert_eq!(mark.semester, 2);
    }
}
