//! Cohort migration from one semester into another.
//!
//! Each student is handled on its own: eligibility and duplicate checks read
//! the database again for every student, so student N+1 sees student N's
//! writes, and a failure for one student never stops the rest of the cohort.
//!
//! The duplicate check and the inserts that follow are not atomic across
//! processes. Two runs migrating the same student at the same moment can both
//! pass the check; the `UNIQUE(student_id, curriculum_subject_id, semester_id)`
//! constraint on `enrollments` is what stops the second run, and that student
//! is then reported as failed in that run.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{EngineSettings, SubjectSource};
use crate::error::{CoreError, CoreResult};
use crate::gwa::GradeState;
use crate::model::{Semester, Student, Track, YearLevel};
use crate::store::{self, EnrollmentFilter};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    pub student_ids: Vec<String>,
    pub source_semester_id: String,
    pub target_semester_id: String,
    /// Overrides the workspace's `migration.subjectSource` setting.
    pub subject_source: Option<SubjectSource>,
    /// Moves the cohort to this year level; the student's own level otherwise.
    pub target_year_level: Option<YearLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnresolvedGrades,
    AlreadyEnrolled,
    NoSubjects,
    NoSourceEnrollments,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::UnresolvedGrades => "incomplete or dropped grades in source semester",
            SkipReason::AlreadyEnrolled => "already enrolled in target semester",
            SkipReason::NoSubjects => "no subjects found for program/year/term",
            SkipReason::NoSourceEnrollments => "no enrollments in source semester",
        })
    }
}

/// Terminal state of one student in one run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Migrated { subjects: usize },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOutcome {
    pub student_id: String,
    pub student_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedStudent {
    pub student_id: String,
    pub student_name: String,
    pub subjects_enrolled: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub migrated: usize,
    pub migrated_students: Vec<MigratedStudent>,
    pub skipped: Vec<StudentOutcome>,
    pub failed: Vec<StudentOutcome>,
}

impl MigrationReport {
    fn record(&mut self, student_id: &str, student_name: String, outcome: Outcome) {
        match outcome {
            Outcome::Migrated { subjects } => {
                self.migrated += 1;
                self.migrated_students.push(MigratedStudent {
                    student_id: student_id.to_string(),
                    student_name,
                    subjects_enrolled: subjects,
                });
            }
            Outcome::Skipped(reason) => self.skipped.push(StudentOutcome {
                student_id: student_id.to_string(),
                student_name,
                reason: reason.to_string(),
            }),
            Outcome::Failed(reason) => self.failed.push(StudentOutcome {
                student_id: student_id.to_string(),
                student_name,
                reason,
            }),
        }
    }
}

struct Plan<'a> {
    source: &'a Semester,
    target: &'a Semester,
    subject_source: SubjectSource,
    target_year_level: Option<YearLevel>,
}

pub fn migrate_cohort(
    conn: &Connection,
    req: &MigrationRequest,
    settings: &EngineSettings,
) -> CoreResult<MigrationReport> {
    if req.student_ids.is_empty() {
        return Err(CoreError::InvalidInput("select at least one student to migrate".into()));
    }
    if req.source_semester_id == req.target_semester_id {
        return Err(CoreError::InvalidInput(
            "source and target semester cannot be the same".into(),
        ));
    }
    let source = store::require_semester(conn, &req.source_semester_id)?;
    let target = store::require_semester(conn, &req.target_semester_id)?;
    let plan = Plan {
        source: &source,
        target: &target,
        subject_source: req.subject_source.unwrap_or(settings.subject_source),
        target_year_level: req.target_year_level,
    };

    tracing::info!(
        source = %source.label(),
        target = %target.label(),
        cohort = req.student_ids.len(),
        subject_source = ?plan.subject_source,
        "migrating cohort"
    );

    let mut report = MigrationReport::default();
    for student_id in &req.student_ids {
        let student = match store::get_student(conn, student_id) {
            Ok(Some(s)) => s,
            Ok(None) => {
                report.record(student_id, student_id.clone(), Outcome::Failed("student not found".into()));
                continue;
            }
            Err(e) => {
                tracing::warn!(student_id = %student_id, error = %e, "student lookup failed");
                report.record(student_id, student_id.clone(), Outcome::Failed(e.to_string()));
                continue;
            }
        };

        let outcome = match migrate_student(conn, &student, &plan) {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(student_id = %student.id, error = %e, "migration failed");
                Outcome::Failed(e.to_string())
            }
        };
        tracing::debug!(student_id = %student.id, ?outcome, "student processed");
        report.record(&student.id, student.display_name(), outcome);
    }

    tracing::info!(
        migrated = report.migrated,
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "cohort migration finished"
    );
    Ok(report)
}

fn migrate_student(conn: &Connection, student: &Student, plan: &Plan<'_>) -> CoreResult<Outcome> {
    let source_rows = store::enrollment_rows(
        conn,
        &EnrollmentFilter {
            student_id: Some(student.id.clone()),
            semester_id: Some(plan.source.id.clone()),
            ..Default::default()
        },
    )?;
    if source_rows.is_empty() {
        return Ok(Outcome::Skipped(SkipReason::NoSourceEnrollments));
    }
    if source_rows
        .iter()
        .any(|r| GradeState::parse(r.grade.as_deref()).is_unresolved())
    {
        return Ok(Outcome::Skipped(SkipReason::UnresolvedGrades));
    }

    let existing = store::enrollments_for(conn, &student.id, &plan.target.id)?;
    if !existing.is_empty() {
        return Ok(Outcome::Skipped(SkipReason::AlreadyEnrolled));
    }

    let year_level = plan.target_year_level.unwrap_or(student.year_level);
    let subject_ids: Vec<String> = match plan.subject_source {
        SubjectSource::Curriculum => {
            store::curriculum_for_slot(conn, &student.program, year_level, plan.target.term)?
                .into_iter()
                .map(|s| s.id)
                .collect()
        }
        SubjectSource::Offerings => store::list_offerings(conn, &plan.target.id)?
            .into_iter()
            .map(|o| o.curriculum_subject_id)
            .collect(),
    };
    if subject_ids.is_empty() {
        return Ok(Outcome::Skipped(SkipReason::NoSubjects));
    }

    let track = Track::for_status(student.status);
    let tx = conn.unchecked_transaction()?;
    for id in &subject_ids {
        store::insert_enrollment(
            &tx,
            &student.id,
            id,
            &plan.target.id,
            track.enrollment_status(),
            track.remarks(),
        )?;
    }
    store::set_student_placement(
        &tx,
        &student.id,
        &student.program,
        year_level,
        "Enrolled",
        track.student_status(),
    )?;
    tx.commit()?;
    Ok(Outcome::Migrated {
        subjects: subject_ids.len(),
    })
}
