use crate::config::EngineSettings;
use crate::gwa::{self, GradeRecord, Slice};
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, parse_params, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Term, YearLevel};
use crate::store;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

fn grades_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let enrollment_id = get_required_str(params, "enrollmentId")?;
    let value = match params.get("grade") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(_) => return Err(HandlerErr::bad_params("grade must be string, number or null")),
    };
    let (grade, inserted) = store::upsert_grade(conn, &enrollment_id, value.as_deref())?;
    Ok(json!({ "grade": grade, "inserted": inserted }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputeParams {
    records: Vec<GradeRecord>,
    year_level: Option<YearLevel>,
    term: Option<Term>,
}

fn gwa_compute(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let p: ComputeParams = parse_params(params)?;
    let settings = match state.db.as_ref() {
        Some(conn) => EngineSettings::load(conn)?,
        None => EngineSettings::default(),
    };
    let (label, result) = match (p.year_level, p.term) {
        (Some(y), Some(t)) => {
            let slice = Slice::Term(y, t);
            (Some(slice.label()), gwa::compute_average(&p.records, |r| slice.matches(r), &settings))
        }
        (Some(y), None) => {
            let slice = Slice::Year(y);
            (Some(slice.label()), gwa::compute_average(&p.records, |r| slice.matches(r), &settings))
        }
        (None, Some(t)) => (
            Some(t.to_string()),
            gwa::compute_average(&p.records, |r| r.term == Some(t), &settings),
        ),
        (None, None) => (None, gwa::compute_average(&p.records, |_| true, &settings)),
    };
    Ok(json!({ "gwa": result, "label": label }))
}

fn handle_gwa_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    match gwa_compute(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn gwa_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let settings = EngineSettings::load(conn)?;
    let summary = gwa::summarize_student(conn, &student_id, &settings)?;
    Ok(json!({ "summary": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.upsert" => Some(with_db(state, req, grades_upsert)),
        "gwa.compute" => Some(handle_gwa_compute(state, req)),
        "gwa.summary" => Some(with_db(state, req, gwa_summary)),
        _ => None,
    }
}
