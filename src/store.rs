//! Typed reads and writes over the workspace database.
//!
//! Every call goes to SQLite; nothing here is cached.

use chrono::{Local, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{
    CurriculumSubject, Enrollment, EnrollmentRow, Grade, Program, Semester, SemesterOffering,
    Student, StudentStatus, Term, YearLevel,
};

macro_rules! label_sql {
    ($ty:ident) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.label()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                $ty::parse(s).ok_or_else(|| FromSqlError::Other(format!("unrecognized value: {s}").into()))
            }
        }
    };
}

label_sql!(YearLevel);
label_sql!(Term);
label_sql!(StudentStatus);

const TERM_ORDER_SQL: &str =
    "CASE term WHEN '1st Semester' THEN 0 WHEN '2nd Semester' THEN 1 ELSE 2 END";

pub fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

fn non_empty(field: &str, v: &str) -> CoreResult<String> {
    let t = v.trim();
    if t.is_empty() {
        return Err(CoreError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(t.to_string())
}

// ---------------------------------------------------------------------------
// Programs

pub fn list_programs(conn: &Connection) -> CoreResult<Vec<Program>> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM programs ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Program {
                id: r.get(0)?,
                name: r.get(1)?,
                description: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_program(conn: &Connection, name: &str, description: &str) -> CoreResult<Program> {
    let name = non_empty("name", name)?;
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM programs WHERE name = ?", [&name], |r| r.get(0))
        .optional()?;
    if exists.is_some() {
        return Err(CoreError::Conflict(format!("program '{name}' already exists")));
    }
    let program = Program {
        id: Uuid::new_v4().to_string(),
        name,
        description: description.trim().to_string(),
    };
    conn.execute(
        "INSERT INTO programs(id, name, description) VALUES(?, ?, ?)",
        (&program.id, &program.name, &program.description),
    )?;
    Ok(program)
}

pub fn delete_program(conn: &Connection, program_id: &str) -> CoreResult<()> {
    let n = conn.execute("DELETE FROM programs WHERE id = ?", [program_id])?;
    if n == 0 {
        return Err(CoreError::NotFound("program not found".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Students

const STUDENT_COLUMNS: &str = "id, first_name, last_name, program, year_level, section,
     enrollment_status, status, remarks, dl_applicable, laude_applicable";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        program: r.get(3)?,
        year_level: r.get(4)?,
        section: r.get(5)?,
        enrollment_status: r.get(6)?,
        status: r.get(7)?,
        remarks: r.get(8)?,
        dl_applicable: r.get::<_, i64>(9)? != 0,
        laude_applicable: r.get::<_, i64>(10)? != 0,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub student_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub program: String,
    pub year_level: YearLevel,
    pub section: Option<String>,
    pub enrollment_status: Option<String>,
    pub status: Option<StudentStatus>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub dl_applicable: bool,
    #[serde(default)]
    pub laude_applicable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub program: Option<String>,
    pub year_level: Option<YearLevel>,
    pub section: Option<String>,
    pub enrollment_status: Option<String>,
    pub status: Option<StudentStatus>,
    pub remarks: Option<String>,
    pub dl_applicable: Option<bool>,
    pub laude_applicable: Option<bool>,
}

pub fn get_student(conn: &Connection, student_id: &str) -> CoreResult<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

pub fn require_student(conn: &Connection, student_id: &str) -> CoreResult<Student> {
    get_student(conn, student_id)?
        .ok_or_else(|| CoreError::NotFound(format!("student not found: {student_id}")))
}

pub fn list_students(conn: &Connection, status: Option<StudentStatus>) -> CoreResult<Vec<Student>> {
    let mut sql = format!("SELECT {STUDENT_COLUMNS} FROM students");
    let mut binds: Vec<Value> = Vec::new();
    if let Some(s) = status {
        sql.push_str(" WHERE status = ?");
        binds.push(Value::Text(s.label().to_string()));
    }
    sql.push_str(" ORDER BY last_name, first_name, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_student(conn: &Connection, new: &NewStudent) -> CoreResult<Student> {
    let id = match new.student_id.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    if get_student(conn, &id)?.is_some() {
        return Err(CoreError::Conflict(format!("student id already exists: {id}")));
    }
    let student = Student {
        id,
        first_name: non_empty("firstName", &new.first_name)?,
        last_name: non_empty("lastName", &new.last_name)?,
        program: new.program.trim().to_string(),
        year_level: new.year_level,
        section: new.section.clone(),
        enrollment_status: new
            .enrollment_status
            .clone()
            .unwrap_or_else(|| "Not Enrolled".to_string()),
        status: new.status.unwrap_or(StudentStatus::Regular),
        remarks: new.remarks.clone(),
        dl_applicable: new.dl_applicable,
        laude_applicable: new.laude_applicable,
    };
    write_student(conn, &student, true)?;
    Ok(student)
}

pub fn update_student(conn: &Connection, student_id: &str, patch: &StudentPatch) -> CoreResult<Student> {
    let mut s = require_student(conn, student_id)?;
    if let Some(v) = &patch.first_name {
        s.first_name = non_empty("firstName", v)?;
    }
    if let Some(v) = &patch.last_name {
        s.last_name = non_empty("lastName", v)?;
    }
    if let Some(v) = &patch.program {
        s.program = v.trim().to_string();
    }
    if let Some(v) = patch.year_level {
        s.year_level = v;
    }
    if let Some(v) = &patch.section {
        s.section = Some(v.clone());
    }
    if let Some(v) = &patch.enrollment_status {
        s.enrollment_status = v.clone();
    }
    if let Some(v) = patch.status {
        s.status = v;
    }
    if let Some(v) = &patch.remarks {
        s.remarks = Some(v.clone());
    }
    if let Some(v) = patch.dl_applicable {
        s.dl_applicable = v;
    }
    if let Some(v) = patch.laude_applicable {
        s.laude_applicable = v;
    }
    write_student(conn, &s, false)?;
    Ok(s)
}

fn write_student(conn: &Connection, s: &Student, insert: bool) -> CoreResult<()> {
    let sql = if insert {
        "INSERT INTO students(first_name, last_name, program, year_level, section,
            enrollment_status, status, remarks, dl_applicable, laude_applicable, updated_at, id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    } else {
        "UPDATE students SET first_name = ?, last_name = ?, program = ?, year_level = ?,
            section = ?, enrollment_status = ?, status = ?, remarks = ?, dl_applicable = ?,
            laude_applicable = ?, updated_at = ?
         WHERE id = ?"
    };
    conn.execute(
        sql,
        rusqlite::params![
            s.first_name,
            s.last_name,
            s.program,
            s.year_level,
            s.section,
            s.enrollment_status,
            s.status,
            s.remarks,
            s.dl_applicable as i64,
            s.laude_applicable as i64,
            today(),
            s.id,
        ],
    )?;
    Ok(())
}

/// Writes the denormalized program/year/status fields after an enrollment.
pub fn set_student_placement(
    conn: &Connection,
    student_id: &str,
    program: &str,
    year_level: YearLevel,
    enrollment_status: &str,
    status: StudentStatus,
) -> CoreResult<()> {
    let n = conn.execute(
        "UPDATE students
         SET program = ?, year_level = ?, enrollment_status = ?, status = ?, updated_at = ?
         WHERE id = ?",
        rusqlite::params![program, year_level, enrollment_status, status, today(), student_id],
    )?;
    if n == 0 {
        return Err(CoreError::NotFound(format!("student not found: {student_id}")));
    }
    Ok(())
}

pub fn delete_student(conn: &Connection, student_id: &str) -> CoreResult<()> {
    require_student(conn, student_id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM grades WHERE enrollment_id IN (
           SELECT id FROM enrollments WHERE student_id = ?
         )",
        [student_id],
    )?;
    tx.execute("DELETE FROM enrollments WHERE student_id = ?", [student_id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    tx.commit()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Curriculum

fn curriculum_from_row(r: &Row<'_>) -> rusqlite::Result<CurriculumSubject> {
    Ok(CurriculumSubject {
        id: r.get(0)?,
        program: r.get(1)?,
        year_level: r.get(2)?,
        term: r.get(3)?,
        code: r.get(4)?,
        name: r.get(5)?,
        units: r.get(6)?,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumFilter {
    pub program: Option<String>,
    pub year_level: Option<YearLevel>,
    pub term: Option<Term>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCurriculumSubject {
    pub program: String,
    pub year_level: YearLevel,
    pub term: Term,
    pub code: String,
    pub name: String,
    pub units: i64,
}

pub fn list_curriculum(conn: &Connection, filter: &CurriculumFilter) -> CoreResult<Vec<CurriculumSubject>> {
    let mut sql = String::from(
        "SELECT id, program, year_level, term, code, name, units
         FROM curriculum_subjects
         WHERE 1 = 1",
    );
    let mut binds: Vec<Value> = Vec::new();
    if let Some(p) = &filter.program {
        sql.push_str(" AND program = ?");
        binds.push(Value::Text(p.clone()));
    }
    if let Some(y) = filter.year_level {
        sql.push_str(" AND year_level = ?");
        binds.push(Value::Text(y.label().to_string()));
    }
    if let Some(t) = filter.term {
        sql.push_str(" AND term = ?");
        binds.push(Value::Text(t.label().to_string()));
    }
    sql.push_str(" ORDER BY program, year_level, ");
    sql.push_str(TERM_ORDER_SQL);
    sql.push_str(", code");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), curriculum_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn curriculum_for_slot(
    conn: &Connection,
    program: &str,
    year_level: YearLevel,
    term: Term,
) -> CoreResult<Vec<CurriculumSubject>> {
    list_curriculum(
        conn,
        &CurriculumFilter {
            program: Some(program.to_string()),
            year_level: Some(year_level),
            term: Some(term),
        },
    )
}

pub fn get_curriculum_subject(conn: &Connection, id: &str) -> CoreResult<Option<CurriculumSubject>> {
    Ok(conn
        .query_row(
            "SELECT id, program, year_level, term, code, name, units
             FROM curriculum_subjects WHERE id = ?",
            [id],
            curriculum_from_row,
        )
        .optional()?)
}

pub fn create_curriculum_subject(
    conn: &Connection,
    new: &NewCurriculumSubject,
) -> CoreResult<CurriculumSubject> {
    if new.units <= 0 {
        return Err(CoreError::InvalidInput("units must be a positive integer".into()));
    }
    let subject = CurriculumSubject {
        id: Uuid::new_v4().to_string(),
        program: non_empty("program", &new.program)?,
        year_level: new.year_level,
        term: new.term,
        code: non_empty("code", &new.code)?,
        name: non_empty("name", &new.name)?,
        units: new.units,
    };
    conn.execute(
        "INSERT INTO curriculum_subjects(id, program, year_level, term, code, name, units)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            subject.id,
            subject.program,
            subject.year_level,
            subject.term,
            subject.code,
            subject.name,
            subject.units,
        ],
    )?;
    Ok(subject)
}

/// Removes the subject and its semester offerings. Enrollments keep their
/// reference; their grades stop counting toward any average.
pub fn delete_curriculum_subject(conn: &Connection, id: &str) -> CoreResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM semester_subjects WHERE curriculum_subject_id = ?", [id])?;
    let n = tx.execute("DELETE FROM curriculum_subjects WHERE id = ?", [id])?;
    if n == 0 {
        return Err(CoreError::NotFound("curriculum subject not found".into()));
    }
    tx.commit()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Semesters

fn semester_from_row(r: &Row<'_>) -> rusqlite::Result<Semester> {
    Ok(Semester {
        id: r.get(0)?,
        school_year: r.get(1)?,
        term: r.get(2)?,
        start_date: parse_date(r.get(3)?),
        end_date: parse_date(r.get(4)?),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSemester {
    pub school_year: String,
    pub term: Term,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterPatch {
    pub school_year: Option<String>,
    pub term: Option<Term>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Semesters in school-year order. The school year is compared as a plain
/// string, so "2024-2025" sorts before "2025-2026" but "AY 9" sorts after "AY 10".
pub fn list_semesters(conn: &Connection) -> CoreResult<Vec<Semester>> {
    let sql = format!(
        "SELECT id, school_year, term, start_date, end_date
         FROM semesters
         ORDER BY school_year, {TERM_ORDER_SQL}, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], semester_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_semester(conn: &Connection, id: &str) -> CoreResult<Option<Semester>> {
    Ok(conn
        .query_row(
            "SELECT id, school_year, term, start_date, end_date FROM semesters WHERE id = ?",
            [id],
            semester_from_row,
        )
        .optional()?)
}

pub fn require_semester(conn: &Connection, id: &str) -> CoreResult<Semester> {
    get_semester(conn, id)?.ok_or_else(|| CoreError::NotFound(format!("semester not found: {id}")))
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> CoreResult<()> {
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(CoreError::InvalidInput("endDate is before startDate".into()));
        }
    }
    Ok(())
}

pub fn create_semester(conn: &Connection, new: &NewSemester) -> CoreResult<Semester> {
    check_dates(new.start_date, new.end_date)?;
    let semester = Semester {
        id: Uuid::new_v4().to_string(),
        school_year: non_empty("schoolYear", &new.school_year)?,
        term: new.term,
        start_date: new.start_date,
        end_date: new.end_date,
    };
    write_semester(conn, &semester, true)?;
    Ok(semester)
}

pub fn update_semester(conn: &Connection, id: &str, patch: &SemesterPatch) -> CoreResult<Semester> {
    let mut s = require_semester(conn, id)?;
    if let Some(v) = &patch.school_year {
        s.school_year = non_empty("schoolYear", v)?;
    }
    if let Some(v) = patch.term {
        s.term = v;
    }
    if patch.start_date.is_some() {
        s.start_date = patch.start_date;
    }
    if patch.end_date.is_some() {
        s.end_date = patch.end_date;
    }
    check_dates(s.start_date, s.end_date)?;
    write_semester(conn, &s, false)?;
    Ok(s)
}

fn write_semester(conn: &Connection, s: &Semester, insert: bool) -> CoreResult<()> {
    let sql = if insert {
        "INSERT INTO semesters(school_year, term, start_date, end_date, id) VALUES(?, ?, ?, ?, ?)"
    } else {
        "UPDATE semesters SET school_year = ?, term = ?, start_date = ?, end_date = ? WHERE id = ?"
    };
    conn.execute(
        sql,
        rusqlite::params![
            s.school_year,
            s.term,
            s.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            s.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            s.id,
        ],
    )?;
    Ok(())
}

pub fn delete_semester(conn: &Connection, id: &str) -> CoreResult<()> {
    require_semester(conn, id)?;
    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM enrollments WHERE semester_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if in_use > 0 {
        return Err(CoreError::InvalidInput(format!(
            "semester has {in_use} enrollments; delete them first"
        )));
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM semester_subjects WHERE semester_id = ?", [id])?;
    tx.execute("DELETE FROM semesters WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Semester subject offerings

pub fn list_offerings(conn: &Connection, semester_id: &str) -> CoreResult<Vec<SemesterOffering>> {
    let mut stmt = conn.prepare(
        "SELECT ss.id, ss.semester_id, ss.curriculum_subject_id, cs.code, cs.name, cs.units
         FROM semester_subjects ss
         JOIN curriculum_subjects cs ON cs.id = ss.curriculum_subject_id
         WHERE ss.semester_id = ?
         ORDER BY cs.code",
    )?;
    let rows = stmt
        .query_map([semester_id], |r| {
            Ok(SemesterOffering {
                id: r.get(0)?,
                semester_id: r.get(1)?,
                curriculum_subject_id: r.get(2)?,
                code: r.get(3)?,
                name: r.get(4)?,
                units: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replaces the semester's offering list.
pub fn set_offerings(
    conn: &Connection,
    semester_id: &str,
    curriculum_subject_ids: &[String],
) -> CoreResult<Vec<SemesterOffering>> {
    require_semester(conn, semester_id)?;
    if curriculum_subject_ids.is_empty() {
        return Err(CoreError::InvalidInput("select at least one subject".into()));
    }
    for id in curriculum_subject_ids {
        if get_curriculum_subject(conn, id)?.is_none() {
            return Err(CoreError::NotFound(format!("curriculum subject not found: {id}")));
        }
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM semester_subjects WHERE semester_id = ?", [semester_id])?;
    for id in curriculum_subject_ids {
        tx.execute(
            "INSERT OR IGNORE INTO semester_subjects(id, semester_id, curriculum_subject_id)
             VALUES(?, ?, ?)",
            (Uuid::new_v4().to_string(), semester_id, id),
        )?;
    }
    tx.commit()?;
    list_offerings(conn, semester_id)
}

// ---------------------------------------------------------------------------
// Enrollments

pub fn enrollments_for(
    conn: &Connection,
    student_id: &str,
    semester_id: &str,
) -> CoreResult<Vec<Enrollment>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, curriculum_subject_id, semester_id, enrollment_date,
                enrollment_status, remarks
         FROM enrollments
         WHERE student_id = ? AND semester_id = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map((student_id, semester_id), |r| {
            Ok(Enrollment {
                id: r.get(0)?,
                student_id: r.get(1)?,
                curriculum_subject_id: r.get(2)?,
                semester_id: r.get(3)?,
                enrollment_date: parse_date(r.get(4)?),
                enrollment_status: r.get(5)?,
                remarks: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn enrollment_exists(conn: &Connection, enrollment_id: &str) -> CoreResult<bool> {
    let v: Option<i64> = conn
        .query_row("SELECT 1 FROM enrollments WHERE id = ?", [enrollment_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v.is_some())
}

pub fn insert_enrollment(
    conn: &Connection,
    student_id: &str,
    curriculum_subject_id: &str,
    semester_id: &str,
    enrollment_status: &str,
    remarks: &str,
) -> CoreResult<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO enrollments(id, student_id, curriculum_subject_id, semester_id,
            enrollment_date, enrollment_status, remarks)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            student_id,
            curriculum_subject_id,
            semester_id,
            today(),
            enrollment_status,
            remarks,
        ),
    )?;
    Ok(id)
}

pub fn delete_enrollment(conn: &Connection, enrollment_id: &str) -> CoreResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM grades WHERE enrollment_id = ?", [enrollment_id])?;
    let n = tx.execute("DELETE FROM enrollments WHERE id = ?", [enrollment_id])?;
    if n == 0 {
        return Err(CoreError::NotFound("enrollment not found".into()));
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_enrollments_for_semester(
    conn: &Connection,
    student_id: &str,
    semester_id: &str,
) -> CoreResult<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM grades WHERE enrollment_id IN (
           SELECT id FROM enrollments WHERE student_id = ? AND semester_id = ?
         )",
        (student_id, semester_id),
    )?;
    let n = tx.execute(
        "DELETE FROM enrollments WHERE student_id = ? AND semester_id = ?",
        (student_id, semester_id),
    )?;
    tx.commit()?;
    Ok(n)
}

pub fn update_enrollment_status(
    conn: &Connection,
    student_id: &str,
    semester_id: &str,
    enrollment_status: &str,
    remarks: &str,
) -> CoreResult<usize> {
    Ok(conn.execute(
        "UPDATE enrollments SET enrollment_status = ?, remarks = ?
         WHERE student_id = ? AND semester_id = ?",
        (enrollment_status, remarks, student_id, semester_id),
    )?)
}

pub fn set_enrollment_remarks(
    conn: &Connection,
    student_id: &str,
    semester_id: &str,
    remarks: &str,
) -> CoreResult<usize> {
    Ok(conn.execute(
        "UPDATE enrollments SET remarks = ? WHERE student_id = ? AND semester_id = ?",
        (remarks, student_id, semester_id),
    )?)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentFilter {
    pub semester_id: Option<String>,
    pub student_id: Option<String>,
    pub school_year: Option<String>,
    pub term: Option<Term>,
    pub program: Option<String>,
    /// Matches the curriculum slot of the subject, not the student's current level.
    pub year_level: Option<YearLevel>,
    pub status_contains: Option<String>,
}

/// Reads `enrollments_view` rows matching every set field of the filter.
pub fn enrollment_rows(conn: &Connection, filter: &EnrollmentFilter) -> CoreResult<Vec<EnrollmentRow>> {
    let mut sql = String::from(
        "SELECT enrollment_id, student_id, student_name, program, student_year_level,
                curriculum_subject_id, subject_code, subject_name, units, year_level,
                semester_id, school_year, semester_term, enrollment_status, remarks, grade
         FROM enrollments_view
         WHERE 1 = 1",
    );
    let mut binds: Vec<Value> = Vec::new();
    let mut eq = |col: &str, v: Option<String>| {
        if let Some(v) = v {
            sql.push_str(&format!(" AND {col} = ?"));
            binds.push(Value::Text(v));
        }
    };
    eq("semester_id", filter.semester_id.clone());
    eq("student_id", filter.student_id.clone());
    eq("school_year", filter.school_year.clone());
    eq("semester_term", filter.term.map(|t| t.label().to_string()));
    eq("program", filter.program.clone());
    eq("year_level", filter.year_level.map(|y| y.label().to_string()));
    if let Some(s) = filter.status_contains.as_ref().filter(|s| !s.is_empty()) {
        sql.push_str(" AND instr(enrollment_status, ?) > 0");
        binds.push(Value::Text(s.clone()));
    }
    sql.push_str(" ORDER BY student_name, school_year, semester_term, subject_code");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok(EnrollmentRow {
                enrollment_id: r.get(0)?,
                student_id: r.get(1)?,
                student_name: r.get(2)?,
                program: r.get(3)?,
                student_year_level: r.get(4)?,
                curriculum_subject_id: r.get(5)?,
                subject_code: r.get(6)?,
                subject_name: r.get(7)?,
                units: r.get(8)?,
                year_level: r.get(9)?,
                semester_id: r.get(10)?,
                school_year: r.get(11)?,
                semester_term: r.get(12)?,
                enrollment_status: r.get(13)?,
                remarks: r.get(14)?,
                grade: r.get(15)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Grades

/// Inserts the enrollment's grade on first write, overwrites it afterwards.
/// The value is stored as given.
pub fn upsert_grade(conn: &Connection, enrollment_id: &str, value: Option<&str>) -> CoreResult<(Grade, bool)> {
    if !enrollment_exists(conn, enrollment_id)? {
        return Err(CoreError::NotFound(format!("enrollment not found: {enrollment_id}")));
    }
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM grades WHERE enrollment_id = ?",
            [enrollment_id],
            |r| r.get(0),
        )
        .optional()?;
    let (id, inserted) = match existing {
        Some(id) => {
            conn.execute(
                "UPDATE grades SET grade = ?, updated_at = ? WHERE id = ?",
                (value, today(), &id),
            )?;
            (id, false)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO grades(id, enrollment_id, grade, updated_at) VALUES(?, ?, ?, ?)",
                (&id, enrollment_id, value, today()),
            )?;
            (id, true)
        }
    };
    Ok((
        Grade {
            id,
            enrollment_id: enrollment_id.to_string(),
            grade: value.map(str::to_string),
        },
        inserted,
    ))
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn upsert_grade_inserts_once_then_updates_in_place() {
        let c = conn();
        student(&c, "s1", "Ana", "BSA", YearLevel::First);
        let sem = semester(&c, "2024-2025", Term::FirstSemester);
        let cs = subject(&c, "BSA", YearLevel::First, Term::FirstSemester, "ACC1", 3);
        let e = graded(&c, "s1", &cs.id, &sem.id, None);

        let (g1, inserted1) = upsert_grade(&c, &e, Some("INC")).expect("first");
        let (g2, inserted2) = upsert_grade(&c, &e, Some("1.75")).expect("second");
        assert!(inserted1);
        assert!(!inserted2);
        assert_eq!(g1.id, g2.id);
        let count: i64 = c
            .query_row("SELECT COUNT(*) FROM grades WHERE enrollment_id = ?", [&e], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn upsert_grade_rejects_unknown_enrollment() {
        let c = conn();
        let err = upsert_grade(&c, "nope", Some("1.0")).expect_err("missing");
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn semesters_sort_by_school_year_string() {
        let c = conn();
        semester(&c, "2025-2026", Term::FirstSemester);
        semester(&c, "2024-2025", Term::SecondSemester);
        semester(&c, "2024-2025", Term::FirstSemester);
        let labels: Vec<String> = list_semesters(&c)
            .expect("list")
            .iter()
            .map(|s| s.label())
            .collect();
        assert_eq!(
            labels,
            vec![
                "2024-2025 1st Semester",
                "2024-2025 2nd Semester",
                "2025-2026 1st Semester"
            ]
        );
    }

    #[test]
    fn deleting_a_student_removes_enrollments_and_grades() {
        let c = conn();
        student(&c, "s1", "Ana", "BSA", YearLevel::First);
        let sem = semester(&c, "2024-2025", Term::FirstSemester);
        let cs = subject(&c, "BSA", YearLevel::First, Term::FirstSemester, "ACC1", 3);
        graded(&c, "s1", &cs.id, &sem.id, Some("2.0"));
        delete_student(&c, "s1").expect("delete");
        let left: i64 = c
            .query_row("SELECT COUNT(*) FROM enrollments", [], |r| r.get(0))
            .expect("count");
        assert_eq!(left, 0);
        assert!(get_student(&c, "s1").expect("get").is_none());
    }

    #[test]
    fn view_rows_filter_by_status_substring() {
        let c = conn();
        student(&c, "s1", "Ana", "BSA", YearLevel::First);
        let sem = semester(&c, "2024-2025", Term::FirstSemester);
        let cs = subject(&c, "BSA", YearLevel::First, Term::FirstSemester, "ACC1", 3);
        graded(&c, "s1", &cs.id, &sem.id, Some("2.0"));
        let regular = enrollment_rows(
            &c,
            &EnrollmentFilter {
                status_contains: Some("Regular".into()),
                ..Default::default()
            },
        )
        .expect("rows");
        assert_eq!(regular.len(), 1);
        assert_eq!(regular[0].units, Some(3));
        assert_eq!(regular[0].grade.as_deref(), Some("2.0"));
        let irregular = enrollment_rows(
            &c,
            &EnrollmentFilter {
                status_contains: Some("Irregular".into()),
                ..Default::default()
            },
        )
        .expect("rows");
        assert!(irregular.is_empty());
    }
}
