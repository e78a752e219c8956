mod test_support;

use serde_json::json;
use test_support::{
    create_student, enroll_with_grades, request_ok, seed_workspace, spawn_sidecar, str_at,
    temp_dir,
};

#[test]
fn insert_failure_for_one_student_leaves_the_rest_migrated() {
    let workspace = temp_dir("registrar-migration-isolation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = seed_workspace(&mut stdin, &mut reader);
    for (id, name) in [("S-1", "Ana"), ("S-2", "Ben"), ("S-3", "Cara")] {
        create_student(&mut stdin, &mut reader, id, name);
        enroll_with_grades(
            &mut stdin,
            &mut reader,
            id,
            &seed.source_semester_id,
            &[Some("1.5"), Some("2.25")],
        );
    }

    // Make every target-semester insert for S-2 fail inside the sidecar.
    let conn = rusqlite::Connection::open(workspace.join("registrar.sqlite3")).expect("open db");
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_s2 BEFORE INSERT ON enrollments
         WHEN NEW.student_id = 'S-2' AND NEW.semester_id = '{}'
         BEGIN SELECT RAISE(ABORT, 'simulated write failure'); END;",
        seed.target_semester_id
    ))
    .expect("install trigger");
    drop(conn);

    let run = request_ok(
        &mut stdin,
        &mut reader,
        "run",
        "migration.run",
        json!({
            "studentIds": ["S-1", "S-2", "S-3"],
            "sourceSemesterId": seed.source_semester_id,
            "targetSemesterId": seed.target_semester_id
        }),
    );
    let report = run.get("report").expect("report");
    assert_eq!(report.get("migrated"), Some(&json!(2)));
    let failed = report.get("failed").and_then(|v| v.as_array()).expect("failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(str_at(&failed[0], &["studentId"]), "S-2");
    assert!(str_at(&failed[0], &["reason"]).contains("simulated write failure"));

    // S-2's transaction rolled back as a whole.
    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "rows-2",
        "enrollments.list",
        json!({ "studentId": "S-2", "semesterId": seed.target_semester_id }),
    );
    assert_eq!(rows.get("enrollments"), Some(&json!([])));
    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "rows-3",
        "enrollments.list",
        json!({ "studentId": "S-3", "semesterId": seed.target_semester_id }),
    );
    assert_eq!(
        rows.get("enrollments").and_then(|v| v.as_array()).map(|v| v.len()),
        Some(2)
    );

    drop(stdin);
    let _ = child.wait();
}
