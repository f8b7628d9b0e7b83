use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::database::memory::MemoryStore;
use crate::database::models::{Student, Subject};
use crate::database::store::{GradebookStore, StoreError};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON fixture: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML fixture: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rows written and skipped by `Fixture::apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub subjects_inserted: usize,
    pub subjects_skipped: usize,
    pub students_inserted: usize,
    pub students_skipped: usize,
}

/// Subjects and students to seed into either backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub students: Vec<Student>,
}

impl Fixture {
    /// Parse by extension: `.yaml`/`.yml` as YAML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&raw),
            _ => Self::from_json(&raw),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Insert subjects, then students. Ids already present are skipped,
    /// so a fixture can be applied again after it has been edited.
    pub async fn apply(&self, store: &dyn GradebookStore) -> Result<SeedReport, FixtureError> {
        let mut report = SeedReport::default();

        for subject in &self.subjects {
            if store.subject(subject.id).await?.is_some() {
                report.subjects_skipped += 1;
                continue;
            }
            store.insert_subject(subject.clone()).await?;
            report.subjects_inserted += 1;
        }

        for student in &self.students {
            if store.student(student.id).await?.is_some() {
                report.students_skipped += 1;
                continue;
            }
            store.insert_student(student.clone()).await?;
            report.students_inserted += 1;
        }

        info!(
            "Applied fixture: {} subjects, {} students inserted ({} skipped)",
            report.subjects_inserted,
            report.students_inserted,
            report.subjects_skipped + report.students_skipped
        );
        Ok(report)
    }

    pub async fn into_store(self) -> Result<MemoryStore, FixtureError> {
        let store = MemoryStore::new();
        self.apply(&store).await?;
        Ok(store)
    }
}
