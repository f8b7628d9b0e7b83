use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::{AttendanceEntry, MarkEntry, Student};

/// How each subject is weighted when averaging grade points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CreditPolicy {
    /// Every subject carries the same weight
    Uniform { weight: f64 },
    /// Use the subject's own credits, `fallback` when the subject is unknown
    PerSubject { fallback: f64 },
}

impl Default for CreditPolicy {
    fn default() -> Self {
        CreditPolicy::Uniform { weight: 3.0 }
    }
}

/// Recomputes CGPA and overall attendance from a student's aggregate arrays.
///
/// Works purely on the snapshot it is handed and never reads the store, so
/// running it twice over the same arrays gives the same numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationEngine {
    policy: CreditPolicy,
}

impl AggregationEngine {
    pub fn new(policy: CreditPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(grading: &crate::config::GradingConfig) -> Self {
        let policy = if grading.use_subject_credits {
            CreditPolicy::PerSubject {
                fallback: grading.credit_weight,
            }
        } else {
            CreditPolicy::Uniform {
                weight: grading.credit_weight,
            }
        };
        Self::new(policy)
    }

    /// Whether callers must look up subject credits before recomputing
    pub fn needs_subject_credits(&self) -> bool {
        matches!(self.policy, CreditPolicy::PerSubject { .. })
    }

    fn weight_for(&self, subject_id: &Uuid, credits: &HashMap<Uuid, f64>) -> f64 {
        match self.policy {
            CreditPolicy::Uniform { weight } => weight,
            CreditPolicy::PerSubject { fallback } => {
                credits.get(subject_id).copied().unwrap_or(fallback)
            }
        }
    }

    /// Credit-weighted grade point average; 0 for an empty array
    pub fn recompute_cgpa(&self, entries: &[MarkEntry]) -> f64 {
        self.recompute_cgpa_with(entries, &HashMap::new())
    }

    pub fn recompute_cgpa_with(&self, entries: &[MarkEntry], credits: &HashMap<Uuid, f64>) -> f64 {
        let mut total_points = 0.0;
        let mut total_credits = 0.0;

        for entry in entries {
            let weight = self.weight_for(&entry.subject_id, credits);
            total_points += entry.grade.points() * weight;
            total_credits += weight;
        }

        if total_credits > 0.0 {
            total_points / total_credits
        } else {
            0.0
        }
    }

    /// Attended over held classes across all subjects, as a percentage
    pub fn recompute_overall_attendance(&self, entries: &[AttendanceEntry]) -> f64 {
        let (attended, total) = entries.iter().fold((0u64, 0u64), |(a, t), entry| {
            (
                a + u64::from(entry.attended_classes),
                t + u64::from(entry.total_classes),
            )
        });

        if total > 0 {
            attended as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Refresh both derived fields on a student document in place
    pub fn apply(&self, student: &mut Student, credits: &HashMap<Uuid, f64>) {
        student.cgpa = self.recompute_cgpa_with(&student.marks, credits);
        student.overall_attendance = self.recompute_overall_attendance(&student.attendance);
    }
}
