use crate::ipc::helpers::{get_required_str, list_or_empty, parse_params, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentStatus;
use crate::store::{self, NewStudent, StudentPatch};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    status: Option<StudentStatus>,
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let p: ListParams = parse_params(params)?;
    let students = store::list_students(conn, p.status)?;
    Ok(json!({ "students": students }))
}

fn students_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = store::require_student(conn, &student_id)?;
    Ok(json!({ "student": student }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let new: NewStudent = parse_params(params)?;
    let student = store::create_student(conn, &new)?;
    Ok(json!({ "student": student }))
}

fn students_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let patch: StudentPatch = match params.get("patch") {
        Some(p) => parse_params(p)?,
        None => return Err(HandlerErr::bad_params("missing patch")),
    };
    let student = store::update_student(conn, &student_id, &patch)?;
    Ok(json!({ "student": student }))
}

fn students_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    store::delete_student(conn, &student_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(list_or_empty(state, req, json!({ "students": [] }), students_list)),
        "students.get" => Some(with_db(state, req, students_get)),
        "students.create" => Some(with_db(state, req, students_create)),
        "students.update" => Some(with_db(state, req, students_update)),
        "students.delete" => Some(with_db(state, req, students_delete)),
        _ => None,
    }
}
