use std::collections::HashMap;
use thiserror::Error;

use crate::database::store::StoreError;

/// Failures surfaced by the coordinator and the read services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    /// Validation failure pinned to a single request field
    pub fn field(field: &str, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.clone());
        ServiceError::Validation {
            message: format!("{}: {}", field, problem),
            field_errors: Some(field_errors),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::DuplicateKey(what) => ServiceError::Conflict(what),
            StoreError::VersionConflict { student_id, expected, found } => {
                tracing::warn!(
                    "Stale aggregate for student {}: expected version {}, found {}",
                    student_id,
                    expected,
                    found
                );
                ServiceError::Conflict(format!(
                    "student {} was modified concurrently, retry the request",
                    student_id
                ))
            }
            StoreError::InvalidData(msg) => {
                tracing::error!("Stored data failed to decode: {}", msg);
                ServiceError::Internal("stored data is inconsistent".to_string())
            }
            StoreError::Unavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                ServiceError::Unavailable("store temporarily unavailable".to_string())
            }
            StoreError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ServiceError::Unavailable("store temporarily unavailable".to_string())
            }
            StoreError::Sqlx(e) => {
                // Log the real error but keep it away from callers
                tracing::error!("SQLx error: {}", e);
                ServiceError::Internal("database error occurred".to_string())
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn version_conflict_becomes_conflict() {
        let err: ServiceError = StoreError::VersionConflict {
            student_id: Uuid::new_v4(),
            expected: 1,
            found: 2,
        }
        .into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn duplicate_key_becomes_conflict() {
        let err: ServiceError = StoreError::DuplicateKey("mark".into()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn sqlx_details_do_not_leak() {
        let err: ServiceError = StoreError::Sqlx(sqlx::Error::RowNotFound).into();
        match err {
            ServiceError::Internal(msg) => assert!(!msg.contains("RowNotFound")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn field_errors_name_the_field() {
        match ServiceError::field("internalMarks", "must be between 0 and 50") {
            ServiceError::Validation { field_errors: Some(fields), .. } => {
                assert_eq!(fields["internalMarks"], "must be between 0 and 50");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
