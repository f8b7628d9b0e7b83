use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::UnknownVariant;

/// Letter grades, declared lowest first so the derived ordering follows grade points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "F")]
    F,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

/// Inclusive lower bounds on the total, highest first
const THRESHOLDS: [(f64, Grade); 7] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::BPlus),
    (60.0, Grade::B),
    (50.0, Grade::CPlus),
    (40.0, Grade::C),
    (30.0, Grade::D),
];

impl Grade {
    /// Letter grade for a total out of 100
    pub fn from_total(total: f64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(floor, _)| total >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::F)
    }

    /// Grade points on the 10-point scale
    pub fn points(&self) -> f64 {
        match self {
            Grade::APlus => 10.0,
            Grade::A => 9.0,
            Grade::BPlus => 8.0,
            Grade::B => 7.0,
            Grade::CPlus => 6.0,
            Grade::C => 5.0,
            Grade::D => 4.0,
            Grade::F => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl Default for Grade {
    fn default() -> Self {
        Grade::F
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A+" => Ok(Grade::APlus),
            "A" => Ok(Grade::A),
            "B+" => Ok(Grade::BPlus),
            "B" => Ok(Grade::B),
            "C+" => Ok(Grade::CPlus),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            other => Err(format!("unknown grade '{}'", other)),
        }
    }
}

impl TryFrom<String> for Grade {
    type Error = UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse().map_err(UnknownVariant)
    }
}

/// Total and letter grade for an internal/external split.
/// Range checks belong to the caller; the total is not re-clamped here.
pub fn grade_of(internal: f64, external: f64) -> (f64, Grade) {
    let total = internal + external;
    (total, Grade::from_total(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive_lower_bounds() {
        assert_eq!(grade_of(0.0, 0.0), (0.0, Grade::F));
        assert_eq!(grade_of(20.0, 9.0).1, Grade::F);
        assert_eq!(grade_of(15.0, 15.0).1, Grade::D);
        assert_eq!(grade_of(20.0, 19.0).1, Grade::D);
        assert_eq!(grade_of(39.0, 0.0).1, Grade::D);
        assert_eq!(grade_of(20.0, 20.0).1, Grade::C);
        assert_eq!(grade_of(0.0, 40.0).1, Grade::C);
        assert_eq!(grade_of(25.0, 25.0).1, Grade::CPlus);
        assert_eq!(grade_of(30.0, 30.0).1, Grade::B);
        assert_eq!(grade_of(35.0, 35.0).1, Grade::BPlus);
        assert_eq!(grade_of(40.0, 40.0).1, Grade::A);
        assert_eq!(grade_of(45.0, 44.0).1, Grade::A);
        assert_eq!(grade_of(45.0, 45.0).1, Grade::APlus);
        assert_eq!(grade_of(50.0, 50.0), (100.0, Grade::APlus));
    }

    #[test]
    fn fractional_totals_just_below_a_boundary_stay_below() {
        assert_eq!(grade_of(44.5, 45.0).1, Grade::A);
        assert_eq!(grade_of(19.75, 20.0).1, Grade::D);
    }

    #[test]
    fn grade_is_monotonic_in_total() {
        let mut previous = Grade::from_total(0.0);
        for t in 1..=100 {
            let current = Grade::from_total(t as f64);
            assert!(
                current.points() >= previous.points(),
                "grade dropped from {} to {} at total {}",
                previous,
                current,
                t
            );
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn same_inputs_same_outputs() {
        assert_eq!(grade_of(31.0, 42.0), grade_of(31.0, 42.0));
    }

    #[test]
    fn grade_points_table() {
        let expected = [
            (Grade::APlus, 10.0),
            (Grade::A, 9.0),
            (Grade::BPlus, 8.0),
            (Grade::B, 7.0),
            (Grade::CPlus, 6.0),
            (Grade::C, 5.0),
            (Grade::D, 4.0),
            (Grade::F, 0.0),
        ];
        for (grade, points) in expected {
            assert_eq!(grade.points(), points, "{}", grade);
        }
    }

    #[test]
    fn letter_round_trips_through_serde_and_str() {
        assert_eq!(serde_json::to_string(&Grade::BPlus).unwrap(), "\"B+\"");
        assert_eq!(serde_json::from_str::<Grade>("\"A+\"").unwrap(), Grade::APlus);
        assert_eq!("C+".parse::<Grade>().unwrap(), Grade::CPlus);
        assert!("E".parse::<Grade>().is_err());
    }
}
