use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::subject::Department;
use crate::grading::Grade;

/// One subject's marks as mirrored on the student document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub subject_id: Uuid,
    pub internal_marks: f64,
    pub external_marks: f64,
    pub total: f64,
    pub grade: Grade,
}

/// One subject's attendance as mirrored on the student document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub subject_id: Uuid,
    pub total_classes: u32,
    pub attended_classes: u32,
    pub percentage: f64,
}

/// What find-or-append did to an aggregate array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    Replaced(usize),
    Appended,
}

fn default_active() -> bool {
    true
}

/// Student profile plus the denormalized aggregate kept in step with the
/// mark and attendance tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub roll_no: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub department: Department,
    #[sqlx(try_from = "i16")]
    pub year: u8,
    pub section: String,
    #[serde(default)]
    pub subjects: Vec<Uuid>,
    #[serde(default)]
    #[sqlx(json)]
    pub marks: Vec<MarkEntry>,
    #[serde(default)]
    #[sqlx(json)]
    pub attendance: Vec<AttendanceEntry>,
    #[serde(default)]
    pub cgpa: f64,
    #[serde(default)]
    pub overall_attendance: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Bumped on every committed aggregate change
    #[serde(default)]
    pub version: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Replace the entry for the same subject, or append if there is none
    pub fn upsert_mark_entry(&mut self, entry: MarkEntry) -> EntryChange {
        match self.marks.iter().position(|m| m.subject_id == entry.subject_id) {
            Some(index) => {
                self.marks[index] = entry;
                EntryChange::Replaced(index)
            }
            None => {
                self.marks.push(entry);
                EntryChange::Appended
            }
        }
    }

    pub fn upsert_attendance_entry(&mut self, entry: AttendanceEntry) -> EntryChange {
        match self
            .attendance
            .iter()
            .position(|a| a.subject_id == entry.subject_id)
        {
            Some(index) => {
                self.attendance[index] = entry;
                EntryChange::Replaced(index)
            }
            None => {
                self.attendance.push(entry);
                EntryChange::Appended
            }
        }
    }

    /// Two semesters per year of study
    pub fn current_semester(&self) -> u8 {
        self.year.saturating_mul(2)
    }

    /// Every subject referenced by either aggregate array
    pub fn aggregate_subject_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .marks
            .iter()
            .map(|m| m.subject_id)
            .chain(self.attendance.iter().map(|a| a.subject_id))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Prepare the next committed revision of this document
    pub fn next_revision(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
