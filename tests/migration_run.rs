mod test_support;

use serde_json::json;
use test_support::{
    create_student, enroll_with_grades, request_err, request_ok, seed_workspace, spawn_sidecar,
    str_at, temp_dir,
};

fn reasons_by_student(report: &serde_json::Value, key: &str) -> Vec<(String, String)> {
    report
        .get(key)
        .and_then(|v| v.as_array())
        .expect("outcome list")
        .iter()
        .map(|o| {
            (
                str_at(o, &["studentId"]).to_string(),
                str_at(o, &["reason"]).to_string(),
            )
        })
        .collect()
}

#[test]
fn cohort_migration_sorts_students_into_outcomes_and_is_idempotent() {
    let workspace = temp_dir("registrar-migration-run");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = seed_workspace(&mut stdin, &mut reader);

    create_student(&mut stdin, &mut reader, "S-A", "Ana");
    create_student(&mut stdin, &mut reader, "S-B", "Ben");
    create_student(&mut stdin, &mut reader, "S-C", "Cara");
    create_student(&mut stdin, &mut reader, "S-D", "Dan");

    enroll_with_grades(
        &mut stdin,
        &mut reader,
        "S-A",
        &seed.source_semester_id,
        &[Some("1.5"), Some("2.0")],
    );
    enroll_with_grades(
        &mut stdin,
        &mut reader,
        "S-B",
        &seed.source_semester_id,
        &[Some("1.5"), Some("INC")],
    );
    enroll_with_grades(
        &mut stdin,
        &mut reader,
        "S-D",
        &seed.source_semester_id,
        &[Some("2.5"), Some("FAILED")],
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "pre-d",
        "enrollments.enrollIrregular",
        json!({
            "studentId": "S-D",
            "semesterId": seed.target_semester_id,
            "curriculumSubjectIds": [seed.second_sem_subject_ids[0]]
        }),
    );

    let params = json!({
        "studentIds": ["S-A", "S-B", "S-C", "S-D", "S-GHOST"],
        "sourceSemesterId": seed.source_semester_id,
        "targetSemesterId": seed.target_semester_id
    });
    let first = request_ok(&mut stdin, &mut reader, "run-1", "migration.run", params.clone());
    let report = first.get("report").expect("report");

    assert_eq!(report.get("migrated").and_then(|v| v.as_u64()), Some(1));
    let migrated = report
        .get("migratedStudents")
        .and_then(|v| v.as_array())
        .expect("migratedStudents");
    assert_eq!(str_at(&migrated[0], &["studentId"]), "S-A");
    assert_eq!(str_at(&migrated[0], &["studentName"]), "Ana Reyes");
    assert_eq!(migrated[0].get("subjectsEnrolled").and_then(|v| v.as_u64()), Some(2));

    let skipped = reasons_by_student(report, "skipped");
    assert_eq!(
        skipped,
        vec![
            (
                "S-B".to_string(),
                "incomplete or dropped grades in source semester".to_string()
            ),
            ("S-C".to_string(), "no enrollments in source semester".to_string()),
            ("S-D".to_string(), "already enrolled in target semester".to_string()),
        ]
    );
    let failed = reasons_by_student(report, "failed");
    assert_eq!(
        failed,
        vec![("S-GHOST".to_string(), "student not found".to_string())]
    );

    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "rows-a",
        "enrollments.list",
        json!({ "studentId": "S-A", "semesterId": seed.target_semester_id }),
    );
    let rows = rows.get("enrollments").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 2);
    for r in rows {
        assert_eq!(str_at(r, &["enrollmentStatus"]), "Enrolled - Regular");
        assert!(r.get("grade").map(|v| v.is_null()).unwrap_or(true));
    }

    // Running again adds nothing.
    let second = request_ok(&mut stdin, &mut reader, "run-2", "migration.run", params);
    let report = second.get("report").expect("report");
    assert_eq!(report.get("migrated").and_then(|v| v.as_u64()), Some(0));
    let skipped = reasons_by_student(report, "skipped");
    assert!(skipped.contains(&(
        "S-A".to_string(),
        "already enrolled in target semester".to_string()
    )));
    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "rows-a-2",
        "enrollments.list",
        json!({ "studentId": "S-A", "semesterId": seed.target_semester_id }),
    );
    assert_eq!(
        rows.get("enrollments").and_then(|v| v.as_array()).map(|v| v.len()),
        Some(2)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn migration_rejects_bad_requests_before_touching_students() {
    let workspace = temp_dir("registrar-migration-reject");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = seed_workspace(&mut stdin, &mut reader);

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "empty",
            "migration.run",
            json!({
                "studentIds": [],
                "sourceSemesterId": seed.source_semester_id,
                "targetSemesterId": seed.target_semester_id
            })
        ),
        "bad_params"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "same",
            "migration.run",
            json!({
                "studentIds": ["S-A"],
                "sourceSemesterId": seed.source_semester_id,
                "targetSemesterId": seed.source_semester_id
            })
        ),
        "bad_params"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "missing",
            "migration.run",
            json!({
                "studentIds": ["S-A"],
                "sourceSemesterId": seed.source_semester_id,
                "targetSemesterId": "no-such-semester"
            })
        ),
        "not_found"
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn migration_can_take_subjects_from_semester_offerings() {
    let workspace = temp_dir("registrar-migration-offerings");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = seed_workspace(&mut stdin, &mut reader);
    create_student(&mut stdin, &mut reader, "S-A", "Ana");
    enroll_with_grades(
        &mut stdin,
        &mut reader,
        "S-A",
        &seed.source_semester_id,
        &[Some("1.25"), Some("1.75")],
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "offer",
        "offerings.set",
        json!({
            "semesterId": seed.target_semester_id,
            "curriculumSubjectIds": [seed.second_sem_subject_ids[1]]
        }),
    );
    let settings = request_ok(
        &mut stdin,
        &mut reader,
        "settings",
        "settings.update",
        json!({ "subjectSource": "offerings" }),
    );
    assert_eq!(str_at(&settings, &["settings", "subjectSource"]), "offerings");

    let run = request_ok(
        &mut stdin,
        &mut reader,
        "run",
        "migration.run",
        json!({
            "studentIds": ["S-A"],
            "sourceSemesterId": seed.source_semester_id,
            "targetSemesterId": seed.target_semester_id
        }),
    );
    let migrated = run
        .get("report")
        .and_then(|r| r.get("migratedStudents"))
        .and_then(|v| v.as_array())
        .expect("migratedStudents");
    assert_eq!(migrated.len(), 1);
    assert_eq!(migrated[0].get("subjectsEnrolled").and_then(|v| v.as_u64()), Some(1));

    drop(stdin);
    let _ = child.wait();
}
