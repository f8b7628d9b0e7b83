use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::student::AttendanceEntry;
use crate::grading::percentage_of;
use crate::types::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Excused => "Excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            "Late" => Ok(AttendanceStatus::Late),
            "Excused" => Ok(AttendanceStatus::Excused),
            other => Err(format!("unknown attendance status '{}'", other)),
        }
    }
}

impl TryFrom<String> for AttendanceStatus {
    type Error = UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse().map_err(UnknownVariant)
    }
}

/// Natural key of an attendance row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceKey {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub semester: u8,
    pub academic_year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    #[sqlx(try_from = "i32")]
    pub total_classes: u32,
    #[sqlx(try_from = "i32")]
    pub attended_classes: u32,
    pub percentage: f64,
    #[sqlx(try_from = "i16")]
    pub semester: u8,
    pub academic_year: String,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attendance {
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey {
            student_id: self.student_id,
            subject_id: self.subject_id,
            semester: self.semester,
            academic_year: self.academic_year.clone(),
        }
    }

    pub fn recompute(&mut self) {
        self.percentage = percentage_of(self.attended_classes, self.total_classes);
    }

    pub fn entry(&self) -> AttendanceEntry {
        AttendanceEntry {
            subject_id: self.subject_id,
            total_classes: self.total_classes,
            attended_classes: self.attended_classes,
            percentage: self.percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttendanceRequest {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub total_classes: u32,
    pub attended_classes: u32,
    pub semester: u8,
    pub academic_year: String,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendanceRequest {
    pub student_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub total_classes: Option<u32>,
    pub attended_classes: Option<u32>,
    pub semester: Option<u8>,
    pub academic_year: Option<String>,
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<String>,
}

impl UpdateAttendanceRequest {
    pub fn apply_to(&self, record: &mut Attendance) {
        if let Some(v) = self.total_classes {
            record.total_classes = v;
        }
        if let Some(v) = self.attended_classes {
            record.attended_classes = v;
        }
        if let Some(v) = self.semester {
            record.semester = v;
        }
        if let Some(v) = &self.academic_year {
            record.academic_year = v.trim().to_string();
        }
        if let Some(v) = self.status {
            record.status = v;
        }
        if let Some(v) = &self.remarks {
            record.remarks = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_derives_percentage() {
        let now = Utc::now();
        let mut record = Attendance {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            total_classes: 40,
            attended_classes: 30,
            percentage: 0.0,
            semester: 1,
            academic_year: "2024-25".into(),
            status: AttendanceStatus::Present,
            remarks: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        record.recompute();
        assert_eq!(record.percentage, 75.0);

        UpdateAttendanceRequest {
            attended_classes: Some(40),
            ..Default::default()
        }
        .apply_to(&mut record);
        record.recompute();
        assert_eq!(record.percentage, 100.0);
        assert_eq!(record.entry().attended_classes, 40);
    }
}
