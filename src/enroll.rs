use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{CoreError, CoreResult};
use crate::gwa::GradeState;
use crate::migrate::StudentOutcome;
use crate::model::{StudentStatus, Track, YearLevel};
use crate::store::{self, EnrollmentFilter};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularEnrollment {
    pub student_id: String,
    pub program: String,
    pub year_level: YearLevel,
    pub semester_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrregularEnrollment {
    pub student_id: String,
    pub semester_id: String,
    pub curriculum_subject_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResult {
    pub enrollment_ids: Vec<String>,
    /// Curriculum subjects the student already had in this semester.
    pub skipped_subject_ids: Vec<String>,
}

/// Enrolls a student in every curriculum subject of (program, year, semester term).
pub fn enroll_regular(conn: &Connection, req: &RegularEnrollment) -> CoreResult<EnrollResult> {
    let student = store::require_student(conn, &req.student_id)?;
    let semester = store::require_semester(conn, &req.semester_id)?;
    if !store::enrollments_for(conn, &student.id, &semester.id)?.is_empty() {
        return Err(CoreError::Conflict(format!(
            "{} is already enrolled for {}",
            student.display_name(),
            semester.label()
        )));
    }
    let subjects = store::curriculum_for_slot(conn, &req.program, req.year_level, semester.term)?;
    if subjects.is_empty() {
        return Err(CoreError::InvalidInput(
            "no subjects found for this program/year/term".into(),
        ));
    }

    let track = Track::Regular;
    let tx = conn.unchecked_transaction()?;
    let mut out = EnrollResult::default();
    for s in &subjects {
        out.enrollment_ids.push(store::insert_enrollment(
            &tx,
            &student.id,
            &s.id,
            &semester.id,
            track.enrollment_status(),
            track.remarks(),
        )?);
    }
    store::set_student_placement(
        &tx,
        &student.id,
        &req.program,
        req.year_level,
        "Enrolled",
        track.student_status(),
    )?;
    tx.commit()?;
    tracing::info!(
        student_id = %student.id,
        semester = %semester.label(),
        subjects = out.enrollment_ids.len(),
        "regular enrollment"
    );
    Ok(out)
}

/// Enrolls a student in hand-picked curriculum subjects. Subjects the student
/// already has in the semester are skipped, not duplicated.
pub fn enroll_irregular(conn: &Connection, req: &IrregularEnrollment) -> CoreResult<EnrollResult> {
    if req.curriculum_subject_ids.is_empty() {
        return Err(CoreError::InvalidInput("select at least one subject".into()));
    }
    let student = store::require_student(conn, &req.student_id)?;
    let semester = store::require_semester(conn, &req.semester_id)?;
    for id in &req.curriculum_subject_ids {
        if store::get_curriculum_subject(conn, id)?.is_none() {
            return Err(CoreError::NotFound(format!("curriculum subject not found: {id}")));
        }
    }

    let track = Track::Irregular;
    let tx = conn.unchecked_transaction()?;
    let mut taken: HashSet<String> = store::enrollments_for(&tx, &student.id, &semester.id)?
        .into_iter()
        .map(|e| e.curriculum_subject_id)
        .collect();
    let mut out = EnrollResult::default();
    for id in &req.curriculum_subject_ids {
        if !taken.insert(id.clone()) {
            out.skipped_subject_ids.push(id.clone());
            continue;
        }
        out.enrollment_ids.push(store::insert_enrollment(
            &tx,
            &student.id,
            id,
            &semester.id,
            track.enrollment_status(),
            track.remarks(),
        )?);
    }
    if !out.enrollment_ids.is_empty() {
        store::set_student_placement(
            &tx,
            &student.id,
            &student.program,
            student.year_level,
            "Enrolled",
            track.student_status(),
        )?;
    }
    tx.commit()?;
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentOverview {
    pub total_students: usize,
    pub students_with_complete_grades: usize,
    pub students_with_issues: usize,
}

/// Counts students in the filtered rows, split by whether any grade is
/// missing, INC or dropped.
pub fn overview(conn: &Connection, filter: &EnrollmentFilter) -> CoreResult<EnrollmentOverview> {
    let rows = store::enrollment_rows(conn, filter)?;
    let mut by_student: BTreeMap<&str, bool> = BTreeMap::new();
    for r in &rows {
        let issue = GradeState::parse(r.grade.as_deref()).is_unresolved();
        *by_student.entry(r.student_id.as_str()).or_insert(false) |= issue;
    }
    let with_issues = by_student.values().filter(|v| **v).count();
    Ok(EnrollmentOverview {
        total_students: by_student.len(),
        students_with_complete_grades: by_student.len() - with_issues,
        students_with_issues: with_issues,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraduationRequest {
    pub student_ids: Vec<String>,
    pub semester_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraduationReport {
    pub graduated: usize,
    pub failed: Vec<StudentOutcome>,
}

/// Marks each student Graduated and stamps their enrollments in the semester.
pub fn graduate(conn: &Connection, req: &GraduationRequest) -> CoreResult<GraduationReport> {
    if req.student_ids.is_empty() {
        return Err(CoreError::InvalidInput("select at least one student to graduate".into()));
    }
    let semester = store::require_semester(conn, &req.semester_id)?;
    let mut report = GraduationReport::default();
    for student_id in &req.student_ids {
        match graduate_one(conn, student_id, &semester.id) {
            Ok(()) => report.graduated += 1,
            Err(e) => {
                tracing::warn!(student_id = %student_id, error = %e, "graduation failed");
                let student_name = store::get_student(conn, student_id)
                    .ok()
                    .flatten()
                    .map(|s| s.display_name())
                    .unwrap_or_else(|| student_id.clone());
                report.failed.push(StudentOutcome {
                    student_id: student_id.clone(),
                    student_name,
                    reason: e.to_string(),
                });
            }
        }
    }
    tracing::info!(
        semester = %semester.label(),
        graduated = report.graduated,
        failed = report.failed.len(),
        "batch graduation finished"
    );
    Ok(report)
}

fn graduate_one(conn: &Connection, student_id: &str, semester_id: &str) -> CoreResult<()> {
    let student = store::require_student(conn, student_id)?;
    let tx = conn.unchecked_transaction()?;
    store::set_student_placement(
        &tx,
        &student.id,
        &student.program,
        YearLevel::Graduated,
        "Graduated",
        StudentStatus::Graduated,
    )?;
    store::set_enrollment_remarks(&tx, &student.id, semester_id, "Graduated")?;
    tx.commit()?;
    Ok(())
}
