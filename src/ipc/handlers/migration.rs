use crate::config::EngineSettings;
use crate::enroll::{self, GraduationRequest};
use crate::ipc::helpers::{parse_params, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::migrate::{self, MigrationRequest};
use rusqlite::Connection;
use serde_json::json;

fn migration_run(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let req: MigrationRequest = parse_params(params)?;
    let settings = EngineSettings::load(conn)?;
    let report = migrate::migrate_cohort(conn, &req, &settings)?;
    Ok(json!({ "report": report }))
}

fn graduation_run(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let req: GraduationRequest = parse_params(params)?;
    let report = enroll::graduate(conn, &req)?;
    Ok(json!({ "report": report }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "migration.run" => Some(with_db(state, req, migration_run)),
        "graduation.run" => Some(with_db(state, req, graduation_run)),
        _ => None,
    }
}
