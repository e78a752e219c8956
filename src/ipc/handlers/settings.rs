use crate::config::{EngineSettings, SettingsPatch};
use crate::ipc::helpers::{parse_params, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn settings_get(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = EngineSettings::load(conn)?;
    Ok(json!({ "settings": settings }))
}

fn settings_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let patch: SettingsPatch = parse_params(params)?;
    let settings = EngineSettings::apply(conn, &patch)?;
    Ok(json!({ "settings": settings }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(with_db(state, req, settings_get)),
        "settings.update" => Some(with_db(state, req, settings_update)),
        _ => None,
    }
}
