use crate::ipc::helpers::{get_required_str, list_or_empty, parse_params, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, CurriculumFilter, NewCurriculumSubject};
use rusqlite::Connection;
use serde_json::json;

fn curriculum_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter: CurriculumFilter = parse_params(params)?;
    let subjects = store::list_curriculum(conn, &filter)?;
    Ok(json!({ "subjects": subjects }))
}

fn curriculum_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let new: NewCurriculumSubject = parse_params(params)?;
    let subject = store::create_curriculum_subject(conn, &new)?;
    Ok(json!({ "subject": subject }))
}

fn curriculum_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    store::delete_curriculum_subject(conn, &subject_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "curriculum.list" => Some(list_or_empty(state, req, json!({ "subjects": [] }), curriculum_list)),
        "curriculum.create" => Some(with_db(state, req, curriculum_create)),
        "curriculum.delete" => Some(with_db(state, req, curriculum_delete)),
        _ => None,
    }
}
