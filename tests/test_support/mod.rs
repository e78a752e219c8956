#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_registrard");
    let mut child = Command::new(exe)
        .env_remove("REGISTRARD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn registrard");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Sends a request that must fail and returns its error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

pub fn str_at<'a>(value: &'a serde_json::Value, path: &[&str]) -> &'a str {
    let mut cur = value;
    for key in path {
        cur = cur.get(*key).unwrap_or_else(|| panic!("missing {} in {}", key, value));
    }
    cur.as_str().unwrap_or_else(|| panic!("{:?} is not a string in {}", path, value))
}

/// Ids of a seeded BSCS workspace: a first-year curriculum for both regular
/// semesters and the two 2024-2025 semesters.
pub struct Seed {
    pub source_semester_id: String,
    pub target_semester_id: String,
    pub first_sem_subject_ids: Vec<String>,
    pub second_sem_subject_ids: Vec<String>,
}

pub fn seed_workspace(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> Seed {
    request_ok(
        stdin,
        reader,
        "seed-program",
        "programs.create",
        json!({ "name": "BSCS", "description": "Computer Science" }),
    );

    let mut subject = |id: &str, term: &str, code: &str| -> String {
        let created = request_ok(
            stdin,
            reader,
            id,
            "curriculum.create",
            json!({
                "program": "BSCS",
                "yearLevel": "1st Year",
                "term": term,
                "code": code,
                "name": code,
                "units": 3
            }),
        );
        str_at(&created, &["subject", "id"]).to_string()
    };
    let first_sem_subject_ids = vec![
        subject("seed-cs101", "1st Semester", "CS101"),
        subject("seed-math1", "1st Semester", "MATH1"),
    ];
    let second_sem_subject_ids = vec![
        subject("seed-cs102", "2nd Semester", "CS102"),
        subject("seed-math2", "2nd Semester", "MATH2"),
    ];

    let source = request_ok(
        stdin,
        reader,
        "seed-sem-1",
        "semesters.create",
        json!({ "schoolYear": "2024-2025", "term": "1st Semester" }),
    );
    let target = request_ok(
        stdin,
        reader,
        "seed-sem-2",
        "semesters.create",
        json!({ "schoolYear": "2024-2025", "term": "2nd Sem" }),
    );

    Seed {
        source_semester_id: str_at(&source, &["semester", "id"]).to_string(),
        target_semester_id: str_at(&target, &["semester", "id"]).to_string(),
        first_sem_subject_ids,
        second_sem_subject_ids,
    }
}

pub fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    student_id: &str,
    first_name: &str,
) {
    request_ok(
        stdin,
        reader,
        &format!("student-{}", student_id),
        "students.create",
        json!({
            "studentId": student_id,
            "firstName": first_name,
            "lastName": "Reyes",
            "program": "BSCS",
            "yearLevel": "1st Year"
        }),
    );
}

/// Regular enrollment followed by one grade per enrolled subject, in order.
pub fn enroll_with_grades(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    student_id: &str,
    semester_id: &str,
    grades: &[Option<&str>],
) -> Vec<String> {
    let enrolled = request_ok(
        stdin,
        reader,
        &format!("enroll-{}", student_id),
        "enrollments.enrollRegular",
        json!({
            "studentId": student_id,
            "program": "BSCS",
            "yearLevel": "1st Year",
            "semesterId": semester_id
        }),
    );
    let ids: Vec<String> = enrolled
        .get("enrollmentIds")
        .and_then(|v| v.as_array())
        .expect("enrollmentIds")
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    for (i, (enrollment_id, grade)) in ids.iter().zip(grades).enumerate() {
        if let Some(grade) = grade {
            request_ok(
                stdin,
                reader,
                &format!("grade-{}-{}", student_id, i),
                "grades.upsert",
                json!({ "enrollmentId": enrollment_id, "grade": grade }),
            );
        }
    }
    ids
}
