/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// A stored text value that names no known variant
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UnknownVariant(pub String);

/// Caller roles carried in the JWT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Admins and teachers
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Student)
    }

    /// Students are read-only for marks and attendance
    pub fn can_write_records(&self) -> bool {
        self.is_staff()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Authenticated caller: who is asking and in what capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Write operations handled by the coordinator
/// Used for logging and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    AddMark,
    UpdateMark,
    AddAttendance,
    UpdateAttendance,
    RebuildAggregate,
}

impl Operation {
    pub fn is_create(&self) -> bool {
        matches!(self, Operation::AddMark | Operation::AddAttendance)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::AddMark => "add_mark",
            Operation::UpdateMark => "update_mark",
            Operation::AddAttendance => "add_attendance",
            Operation::UpdateAttendance => "update_attendance",
            Operation::RebuildAggregate => "rebuild_aggregate",
        };
        f.write_str(name)
    }
}
