use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "registrar.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;
    tracing::info!(path = %db_path.display(), "workspace database opened");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS programs(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            program TEXT NOT NULL DEFAULT '',
            year_level TEXT NOT NULL,
            enrollment_status TEXT NOT NULL DEFAULT 'Not Enrolled',
            status TEXT NOT NULL DEFAULT 'Regular',
            remarks TEXT,
            dl_applicable INTEGER NOT NULL DEFAULT 0,
            laude_applicable INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )",
        [],
    )?;
    // Workspaces created before sections were tracked lack the column.
    ensure_students_section(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculum_subjects(
            id TEXT PRIMARY KEY,
            program TEXT NOT NULL,
            year_level TEXT NOT NULL,
            term TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            units INTEGER NOT NULL CHECK(units > 0)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_curriculum_slot
         ON curriculum_subjects(program, year_level, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS semesters(
            id TEXT PRIMARY KEY,
            school_year TEXT NOT NULL,
            term TEXT NOT NULL,
            start_date TEXT,
            end_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS semester_subjects(
            id TEXT PRIMARY KEY,
            semester_id TEXT NOT NULL,
            curriculum_subject_id TEXT NOT NULL,
            FOREIGN KEY(semester_id) REFERENCES semesters(id),
            FOREIGN KEY(curriculum_subject_id) REFERENCES curriculum_subjects(id),
            UNIQUE(semester_id, curriculum_subject_id)
        )",
        [],
    )?;

    // No FK on curriculum_subject_id: an enrollment may outlive
    // its curriculum entry, and its grade then has no units to weigh.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            curriculum_subject_id TEXT NOT NULL,
            semester_id TEXT NOT NULL,
            enrollment_date TEXT,
            enrollment_status TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(semester_id) REFERENCES semesters(id),
            UNIQUE(student_id, curriculum_subject_id, semester_id)
        )",
        [],
    )?;
    ensure_enrollments_remarks(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student_semester
         ON enrollments(student_id, semester_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL UNIQUE,
            grade TEXT,
            updated_at TEXT,
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE VIEW IF NOT EXISTS enrollments_view AS
         SELECT
           e.id AS enrollment_id,
           e.student_id,
           s.first_name || ' ' || s.last_name AS student_name,
           s.program,
           s.year_level AS student_year_level,
           e.curriculum_subject_id,
           cs.code AS subject_code,
           cs.name AS subject_name,
           cs.units,
           cs.year_level,
           e.semester_id,
           sem.school_year,
           sem.term AS semester_term,
           e.enrollment_status,
           e.remarks,
           g.grade
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         JOIN semesters sem ON sem.id = e.semester_id
         LEFT JOIN curriculum_subjects cs ON cs.id = e.curriculum_subject_id
         LEFT JOIN grades g ON g.enrollment_id = e.id",
        [],
    )?;

    Ok(())
}

fn ensure_students_section(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "section")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN section TEXT", [])?;
    Ok(())
}

fn ensure_enrollments_remarks(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "remarks")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN remarks TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    // A hand-edited value that no longer parses reads as unset.
    Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_and_adds_late_columns() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "students", "section").expect("pragma"));
        assert!(table_has_column(&conn, "enrollments", "remarks").expect("pragma"));
    }

    #[test]
    fn settings_round_trip_and_overwrite() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");
        assert_eq!(settings_get_json(&conn, "k").expect("get"), None);
        settings_set_json(&conn, "k", &serde_json::json!(true)).expect("set");
        settings_set_json(&conn, "k", &serde_json::json!(false)).expect("set again");
        assert_eq!(
            settings_get_json(&conn, "k").expect("get"),
            Some(serde_json::json!(false))
        );
    }

    #[test]
    fn duplicate_enrollment_triple_is_rejected() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");
        conn.execute(
            "INSERT INTO students(id, first_name, last_name, year_level) VALUES('s1','A','B','1st Year')",
            [],
        )
        .expect("student");
        conn.execute(
            "INSERT INTO semesters(id, school_year, term) VALUES('sem1','2024-2025','1st Semester')",
            [],
        )
        .expect("semester");
        let insert = "INSERT INTO enrollments(id, student_id, curriculum_subject_id, semester_id, enrollment_status)
                      VALUES(?, 's1', 'cs1', 'sem1', 'Enrolled - Regular')";
        conn.execute(insert, ["e1"]).expect("first");
        assert!(conn.execute(insert, ["e2"]).is_err());
    }
}
