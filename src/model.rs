use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Curriculum year level. The first four are the levels a GWA summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum YearLevel {
    First,
    Second,
    Third,
    Fourth,
    Onward,
    Graduated,
}

impl YearLevel {
    pub const SUMMARY: [YearLevel; 4] = [
        YearLevel::First,
        YearLevel::Second,
        YearLevel::Third,
        YearLevel::Fourth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            YearLevel::First => "1st Year",
            YearLevel::Second => "2nd Year",
            YearLevel::Third => "3rd Year",
            YearLevel::Fourth => "4th Year",
            YearLevel::Onward => "Onward",
            YearLevel::Graduated => "Graduated",
        }
    }

    pub fn parse(raw: &str) -> Option<YearLevel> {
        let t = raw.trim().to_ascii_lowercase();
        match t.as_str() {
            "1st year" | "1st yr" | "1" => Some(YearLevel::First),
            "2nd year" | "2nd yr" | "2" => Some(YearLevel::Second),
            "3rd year" | "3rd yr" | "3" => Some(YearLevel::Third),
            "4th year" | "4th yr" | "4" => Some(YearLevel::Fourth),
            "onward" => Some(YearLevel::Onward),
            "graduated" => Some(YearLevel::Graduated),
            _ => None,
        }
    }
}

/// Semester term. Input accepts the abbreviated spellings found in older
/// records; output is always the canonical label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    FirstSemester,
    SecondSemester,
    Midyear,
}

impl Term {
    pub const REGULAR: [Term; 2] = [Term::FirstSemester, Term::SecondSemester];

    pub fn label(self) -> &'static str {
        match self {
            Term::FirstSemester => "1st Semester",
            Term::SecondSemester => "2nd Semester",
            Term::Midyear => "Midyear",
        }
    }

    pub fn parse(raw: &str) -> Option<Term> {
        let t = raw.trim().to_ascii_lowercase();
        match t.as_str() {
            "1st semester" | "1st sem" | "first semester" => Some(Term::FirstSemester),
            "2nd semester" | "2nd sem" | "second semester" => Some(Term::SecondSemester),
            "midyear" | "mid-year" | "summer" => Some(Term::Midyear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentStatus {
    Regular,
    Irregular,
    Graduated,
    Dropped,
    NotEnrolled,
}

impl StudentStatus {
    pub fn label(self) -> &'static str {
        match self {
            StudentStatus::Regular => "Regular",
            StudentStatus::Irregular => "Irregular",
            StudentStatus::Graduated => "Graduated",
            StudentStatus::Dropped => "Dropped",
            StudentStatus::NotEnrolled => "Not Enrolled",
        }
    }

    pub fn parse(raw: &str) -> Option<StudentStatus> {
        let t = raw.trim().to_ascii_lowercase();
        match t.as_str() {
            "regular" => Some(StudentStatus::Regular),
            "irregular" => Some(StudentStatus::Irregular),
            "graduated" => Some(StudentStatus::Graduated),
            "dropped" => Some(StudentStatus::Dropped),
            "not enrolled" => Some(StudentStatus::NotEnrolled),
            _ => None,
        }
    }
}

macro_rules! label_serde {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(d)?;
                $ty::parse(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!(concat!("unknown ", $what, ": {}"), raw))
                })
            }
        }

        impl std::str::FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::parse(s).ok_or_else(|| {
                    CoreError::InvalidInput(format!(concat!("unknown ", $what, ": {}"), s))
                })
            }
        }
    };
}

label_serde!(YearLevel, "year level");
label_serde!(Term, "term");
label_serde!(StudentStatus, "student status");

/// Migration/enrollment track. Decides the status strings written on new rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Regular,
    Irregular,
}

impl Track {
    pub fn for_status(status: StudentStatus) -> Track {
        match status {
            StudentStatus::Irregular => Track::Irregular,
            _ => Track::Regular,
        }
    }

    pub fn enrollment_status(self) -> &'static str {
        match self {
            Track::Regular => "Enrolled - Regular",
            Track::Irregular => "Enrolled - Irregular",
        }
    }

    pub fn remarks(self) -> &'static str {
        match self {
            Track::Regular => "Regular",
            Track::Irregular => "Irregular",
        }
    }

    pub fn student_status(self) -> StudentStatus {
        match self {
            Track::Regular => StudentStatus::Regular,
            Track::Irregular => StudentStatus::Irregular,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub program: String,
    pub year_level: YearLevel,
    pub section: Option<String>,
    /// Free-form enrollment state, e.g. "Enrolled" or "Not Enrolled".
    pub enrollment_status: String,
    pub status: StudentStatus,
    pub remarks: Option<String>,
    pub dl_applicable: bool,
    pub laude_applicable: bool,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSubject {
    pub id: String,
    pub program: String,
    pub year_level: YearLevel,
    pub term: Term,
    pub code: String,
    pub name: String,
    pub units: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: String,
    pub school_year: String,
    pub term: Term,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Semester {
    pub fn label(&self) -> String {
        format!("{} {}", self.school_year, self.term)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub curriculum_subject_id: String,
    pub semester_id: String,
    pub enrollment_date: Option<NaiveDate>,
    pub enrollment_status: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub enrollment_id: String,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterOffering {
    pub id: String,
    pub semester_id: String,
    pub curriculum_subject_id: String,
    pub code: String,
    pub name: String,
    pub units: i64,
}

/// One row of `enrollments_view`.
///
/// `year_level` and `term` are the curriculum subject's slot; `semester_term`
/// is the term of the semester the row was recorded in. `units` is `None`
/// when the curriculum subject is gone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRow {
    pub enrollment_id: String,
    pub student_id: String,
    pub student_name: String,
    pub program: String,
    pub student_year_level: String,
    pub curriculum_subject_id: String,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub units: Option<i64>,
    pub year_level: Option<String>,
    pub semester_id: String,
    pub school_year: String,
    pub semester_term: String,
    pub enrollment_status: String,
    pub remarks: Option<String>,
    pub grade: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_accepts_abbreviations_and_writes_canonical_label() {
        assert_eq!(Term::parse("1st Sem"), Some(Term::FirstSemester));
        assert_eq!(Term::parse(" 2nd semester "), Some(Term::SecondSemester));
        assert_eq!(Term::parse("Summer"), Some(Term::Midyear));
        assert_eq!(Term::parse("3rd Semester"), None);
        assert_eq!(Term::SecondSemester.to_string(), "2nd Semester");
    }

    #[test]
    fn year_level_round_trips_through_labels() {
        for y in YearLevel::SUMMARY {
            assert_eq!(YearLevel::parse(y.label()), Some(y));
        }
        assert_eq!(YearLevel::parse("graduated"), Some(YearLevel::Graduated));
        assert!("5th Year".parse::<YearLevel>().is_err());
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert_eq!(
            StudentStatus::parse("not enrolled"),
            Some(StudentStatus::NotEnrolled)
        );
        assert!(serde_json::from_str::<StudentStatus>("\"Suspended\"").is_err());
        assert_eq!(
            serde_json::to_string(&StudentStatus::Irregular).unwrap_or_default(),
            "\"Irregular\""
        );
    }

    #[test]
    fn track_follows_student_status() {
        assert_eq!(Track::for_status(StudentStatus::Irregular), Track::Irregular);
        assert_eq!(Track::for_status(StudentStatus::NotEnrolled), Track::Regular);
        assert_eq!(Track::Regular.enrollment_status(), "Enrolled - Regular");
    }
}
