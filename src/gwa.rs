use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::EngineSettings;
use crate::error::CoreResult;
use crate::model::{Term, YearLevel};
use crate::store::{self, EnrollmentFilter};

pub const MIN_GRADE: f64 = 1.0;
pub const MAX_GRADE: f64 = 5.0;

/// What a stored grade string means for averaging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradeState {
    /// Null, empty or whitespace.
    Missing,
    Incomplete,
    Dropped,
    Failed,
    Numeric(f64),
    /// Anything else; excluded from weighting like FAILED.
    Unrecognized,
}

impl GradeState {
    pub fn parse(raw: Option<&str>) -> GradeState {
        let Some(raw) = raw else {
            return GradeState::Missing;
        };
        let t = raw.trim();
        if t.is_empty() {
            return GradeState::Missing;
        }
        if t.eq_ignore_ascii_case("INC") {
            return GradeState::Incomplete;
        }
        if t.eq_ignore_ascii_case("DROP") || t.eq_ignore_ascii_case("DROPPED") {
            return GradeState::Dropped;
        }
        if t.eq_ignore_ascii_case("FAILED") {
            return GradeState::Failed;
        }
        match t.parse::<f64>() {
            Ok(v) if v.is_finite() => GradeState::Numeric(v),
            _ => GradeState::Unrecognized,
        }
    }

    /// Missing, INC and dropped grades leave a term unresolved.
    pub fn is_unresolved(self) -> bool {
        matches!(
            self,
            GradeState::Missing | GradeState::Incomplete | GradeState::Dropped
        )
    }

    fn blocks_average(self, settings: &EngineSettings) -> bool {
        self.is_unresolved() || (settings.failed_blocks_average && self == GradeState::Failed)
    }

    fn weighable(self) -> Option<f64> {
        match self {
            GradeState::Numeric(v) if (MIN_GRADE..=MAX_GRADE).contains(&v) => Some(v),
            _ => None,
        }
    }
}

/// A computed average, or `--` when the slice cannot be averaged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gwa {
    Average(f64),
    Unavailable,
}

impl Gwa {
    pub const SENTINEL: &'static str = "--";
}

impl fmt::Display for Gwa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gwa::Average(v) => write!(f, "{v:.2}"),
            Gwa::Unavailable => f.write_str(Gwa::SENTINEL),
        }
    }
}

impl Serialize for Gwa {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Gwa::Average(v) => s.serialize_f64(*v),
            Gwa::Unavailable => s.serialize_str(Gwa::SENTINEL),
        }
    }
}

pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One grade with the context needed to place it in a slice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub year_level: Option<YearLevel>,
    pub term: Option<Term>,
    #[serde(default, deserialize_with = "grade_text")]
    pub grade: Option<String>,
    pub units: Option<f64>,
}

/// Reads a grade given as a string, a number or null. Other JSON values are
/// kept as their text so they average as unrecognized grades.
fn grade_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice {
    Term(YearLevel, Term),
    /// Both regular semesters of one year level.
    Year(YearLevel),
    Overall,
}

impl Slice {
    /// Summary order: each year's two semesters then its overall, then the global overall.
    pub fn summary_order() -> Vec<Slice> {
        let mut out = Vec::with_capacity(YearLevel::SUMMARY.len() * 3 + 1);
        for y in YearLevel::SUMMARY {
            for t in Term::REGULAR {
                out.push(Slice::Term(y, t));
            }
            out.push(Slice::Year(y));
        }
        out.push(Slice::Overall);
        out
    }

    pub fn label(self) -> String {
        match self {
            Slice::Term(y, t) => format!("{} {}", y, t),
            Slice::Year(y) => format!("{} Overall", y),
            Slice::Overall => "Overall".to_string(),
        }
    }

    pub fn matches(self, r: &GradeRecord) -> bool {
        match self {
            Slice::Term(y, t) => r.year_level == Some(y) && r.term == Some(t),
            Slice::Year(y) => {
                r.year_level == Some(y) && r.term.map(|t| Term::REGULAR.contains(&t)).unwrap_or(false)
            }
            Slice::Overall => true,
        }
    }
}

/// Units-weighted average of the records the filter keeps.
///
/// Any kept record that is missing, INC or dropped makes the result
/// unavailable. Other non-numeric grades, grades outside 1.0..=5.0 and
/// records without positive units are left out of the sum.
pub fn compute_average<'a, I, F>(records: I, filter: F, settings: &EngineSettings) -> Gwa
where
    I: IntoIterator<Item = &'a GradeRecord>,
    F: Fn(&GradeRecord) -> bool,
{
    let mut weighted_sum = 0.0;
    let mut total_units = 0.0;
    let mut any = false;

    for r in records.into_iter().filter(|r| filter(r)) {
        let state = GradeState::parse(r.grade.as_deref());
        if state.blocks_average(settings) {
            return Gwa::Unavailable;
        }
        let Some(grade) = state.weighable() else {
            continue;
        };
        let Some(units) = r.units.filter(|u| u.is_finite() && *u > 0.0) else {
            continue;
        };
        weighted_sum += grade * units;
        total_units += units;
        any = true;
    }

    if !any || total_units <= 0.0 {
        return Gwa::Unavailable;
    }
    Gwa::Average(round_2_decimals(weighted_sum / total_units))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceGwa {
    pub label: String,
    pub year_level: Option<YearLevel>,
    pub term: Option<Term>,
    pub gwa: Gwa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestEnrollment {
    pub school_year: String,
    pub term: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGwa {
    pub student_id: String,
    pub student_name: String,
    pub slices: Vec<SliceGwa>,
    pub latest_enrollment: Option<LatestEnrollment>,
}

#[cfg(test)]
impl StudentGwa {
    pub fn get(&self, label: &str) -> Gwa {
        self.slices
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.gwa)
            .unwrap_or(Gwa::Unavailable)
    }

    pub fn overall(&self) -> Gwa {
        self.get("Overall")
    }
}

pub fn summarize_records(records: &[GradeRecord], settings: &EngineSettings) -> Vec<SliceGwa> {
    Slice::summary_order()
        .into_iter()
        .map(|slice| {
            let (year_level, term) = match slice {
                Slice::Term(y, t) => (Some(y), Some(t)),
                Slice::Year(y) => (Some(y), None),
                Slice::Overall => (None, None),
            };
            SliceGwa {
                label: slice.label(),
                year_level,
                term,
                gwa: compute_average(records, |r| slice.matches(r), settings),
            }
        })
        .collect()
}

/// Re-derives every slice average for one student from the current rows.
pub fn summarize_student(
    conn: &Connection,
    student_id: &str,
    settings: &EngineSettings,
) -> CoreResult<StudentGwa> {
    let student = store::require_student(conn, student_id)?;
    let rows = store::enrollment_rows(
        conn,
        &EnrollmentFilter {
            student_id: Some(student_id.to_string()),
            ..Default::default()
        },
    )?;

    let records: Vec<GradeRecord> = rows
        .iter()
        .map(|r| GradeRecord {
            year_level: r.year_level.as_deref().and_then(YearLevel::parse),
            term: Term::parse(&r.semester_term),
            grade: r.grade.clone(),
            units: r.units.map(|u| u as f64),
        })
        .collect();

    let latest_enrollment = rows
        .iter()
        .max_by(|a, b| {
            let ta = Term::parse(&a.semester_term);
            let tb = Term::parse(&b.semester_term);
            a.school_year.cmp(&b.school_year).then(ta.cmp(&tb))
        })
        .map(|r| LatestEnrollment {
            school_year: r.school_year.clone(),
            term: r.semester_term.clone(),
        });

    let slices = summarize_records(&records, settings);
    tracing::debug!(
        student_id,
        records = records.len(),
        overall = %slices.last().map(|s| s.gwa).unwrap_or(Gwa::Unavailable),
        "gwa summary computed"
    );

    Ok(StudentGwa {
        student_id: student.id.clone(),
        student_name: student.display_name(),
        slices,
        latest_enrollment,
    })
}
