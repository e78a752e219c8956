use crate::ipc::helpers::{get_required_str, list_or_empty, parse_params, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, NewSemester, SemesterPatch};
use rusqlite::Connection;
use serde_json::json;

fn semesters_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "semesters": store::list_semesters(conn)? }))
}

fn semesters_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let new: NewSemester = parse_params(params)?;
    let semester = store::create_semester(conn, &new)?;
    Ok(json!({ "semester": semester }))
}

fn semesters_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let patch: SemesterPatch = match params.get("patch") {
        Some(p) => parse_params(p)?,
        None => return Err(HandlerErr::bad_params("missing patch")),
    };
    let semester = store::update_semester(conn, &semester_id, &patch)?;
    Ok(json!({ "semester": semester }))
}

fn semesters_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    store::delete_semester(conn, &semester_id)?;
    Ok(json!({ "ok": true }))
}

fn offerings_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    store::require_semester(conn, &semester_id)?;
    Ok(json!({ "offerings": store::list_offerings(conn, &semester_id)? }))
}

fn offerings_set(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let ids: Vec<String> = match params.get("curriculumSubjectIds") {
        Some(v) => parse_params(v)?,
        None => return Err(HandlerErr::bad_params("missing curriculumSubjectIds")),
    };
    let offerings = store::set_offerings(conn, &semester_id, &ids)?;
    Ok(json!({ "offerings": offerings }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "semesters.list" => Some(list_or_empty(state, req, json!({ "semesters": [] }), semesters_list)),
        "semesters.create" => Some(with_db(state, req, semesters_create)),
        "semesters.update" => Some(with_db(state, req, semesters_update)),
        "semesters.delete" => Some(with_db(state, req, semesters_delete)),
        "offerings.list" => Some(with_db(state, req, offerings_list)),
        "offerings.set" => Some(with_db(state, req, offerings_set)),
        _ => None,
    }
}
