use crate::ipc::helpers::{get_required_str, list_or_empty, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

fn programs_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "programs": store::list_programs(conn)? }))
}

fn programs_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let description = params
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let program = store::create_program(conn, &name, description)?;
    Ok(json!({ "program": program }))
}

fn programs_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let program_id = get_required_str(params, "programId")?;
    store::delete_program(conn, &program_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "programs.list" => Some(list_or_empty(state, req, json!({ "programs": [] }), programs_list)),
        "programs.create" => Some(with_db(state, req, programs_create)),
        "programs.delete" => Some(with_db(state, req, programs_delete)),
        _ => None,
    }
}
