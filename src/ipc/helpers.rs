use rusqlite::Connection;
use serde::de::DeserializeOwned;

use crate::error::CoreError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

impl From<serde_json::Error> for HandlerErr {
    fn from(e: serde_json::Error) -> Self {
        HandlerErr::bad_params(e.to_string())
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Deserializes the whole params object; a null params value reads as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    if params.is_null() {
        return Ok(serde_json::from_value(serde_json::json!({}))?);
    }
    Ok(serde_json::from_value(params.clone())?)
}

/// Runs `f` against the open workspace, or answers `no_workspace`.
pub fn with_db<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

/// Like `with_db`, but answers `empty` when no workspace is open.
pub fn list_or_empty<F>(
    state: &AppState,
    req: &Request,
    empty: serde_json::Value,
    f: F,
) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    if state.db.is_none() {
        return ok(&req.id, empty);
    }
    with_db(state, req, f)
}
