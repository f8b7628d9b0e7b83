use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::types::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Department {
    Cse,
    Ece,
    Mech,
    Civil,
    Eee,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Cse => "CSE",
            Department::Ece => "ECE",
            Department::Mech => "MECH",
            Department::Civil => "CIVIL",
            Department::Eee => "EEE",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CSE" => Ok(Department::Cse),
            "ECE" => Ok(Department::Ece),
            "MECH" => Ok(Department::Mech),
            "CIVIL" => Ok(Department::Civil),
            "EEE" => Ok(Department::Eee),
            other => Err(format!("unknown department '{}'", other)),
        }
    }
}

impl TryFrom<String> for Department {
    type Error = UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse().map_err(UnknownVariant)
    }
}

fn default_credits() -> u8 {
    3
}

fn default_active() -> bool {
    true
}

/// A course offered in one semester of one department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[sqlx(try_from = "String")]
    pub department: Department,
    #[sqlx(try_from = "i16")]
    pub semester: u8,
    #[sqlx(try_from = "i16")]
    pub year: u8,
    #[serde(default = "default_credits")]
    #[sqlx(try_from = "i16")]
    pub credits: u8,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Subject {
    /// Basic range checks used when loading fixtures or inserting subjects
    pub fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("subject code must not be empty".to_string());
        }
        if !(1..=8).contains(&self.semester) {
            return Err(format!("subject {} has semester {} outside 1-8", self.code, self.semester));
        }
        if !(1..=4).contains(&self.year) {
            return Err(format!("subject {} has year {} outside 1-4", self.code, self.year));
        }
        if !(1..=6).contains(&self.credits) {
            return Err(format!("subject {} has credits {} outside 1-6", self.code, self.credits));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_default_to_three() {
        let subject: Subject = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Data Structures",
            "code": "CS201",
            "department": "CSE",
            "semester": 3,
            "year": 2
        }))
        .unwrap();
        assert_eq!(subject.credits, 3);
        assert!(subject.is_active);
        assert!(subject.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_semester() {
        let subject = Subject {
            id: Uuid::new_v4(),
            name: "Thesis".into(),
            code: "CS999".into(),
            department: Department::Cse,
            semester: 9,
            year: 4,
            credits: 3,
            description: None,
            is_active: true,
        };
        assert!(subject.validate().is_err());
    }
}
