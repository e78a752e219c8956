use crate::enroll::{self, IrregularEnrollment, RegularEnrollment};
use crate::ipc::helpers::{get_required_str, list_or_empty, parse_params, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, EnrollmentFilter};
use rusqlite::Connection;
use serde_json::json;

fn enrollments_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter: EnrollmentFilter = parse_params(params)?;
    let rows = store::enrollment_rows(conn, &filter)?;
    Ok(json!({ "enrollments": rows }))
}

fn enrollments_enroll_regular(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let req: RegularEnrollment = parse_params(params)?;
    Ok(json!(enroll::enroll_regular(conn, &req)?))
}

fn enrollments_enroll_irregular(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let req: IrregularEnrollment = parse_params(params)?;
    Ok(json!(enroll::enroll_irregular(conn, &req)?))
}

fn enrollments_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let enrollment_id = get_required_str(params, "enrollmentId")?;
    store::delete_enrollment(conn, &enrollment_id)?;
    Ok(json!({ "ok": true }))
}

fn enrollments_delete_for_semester(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let semester_id = get_required_str(params, "semesterId")?;
    let deleted = store::delete_enrollments_for_semester(conn, &student_id, &semester_id)?;
    Ok(json!({ "deleted": deleted }))
}

fn enrollments_update_status(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let semester_id = get_required_str(params, "semesterId")?;
    let status = get_required_str(params, "enrollmentStatus")?;
    if status.trim().is_empty() {
        return Err(HandlerErr::bad_params("enrollmentStatus must not be empty"));
    }
    let remarks = params.get("remarks").and_then(|v| v.as_str()).unwrap_or("");
    let updated = store::update_enrollment_status(conn, &student_id, &semester_id, status.trim(), remarks)?;
    Ok(json!({ "updated": updated }))
}

fn enrollments_overview(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter: EnrollmentFilter = parse_params(params)?;
    Ok(json!({ "overview": enroll::overview(conn, &filter)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.list" => Some(list_or_empty(
            state,
            req,
            json!({ "enrollments": [] }),
            enrollments_list,
        )),
        "enrollments.enrollRegular" => Some(with_db(state, req, enrollments_enroll_regular)),
        "enrollments.enrollIrregular" => Some(with_db(state, req, enrollments_enroll_irregular)),
        "enrollments.delete" => Some(with_db(state, req, enrollments_delete)),
        "enrollments.deleteForSemester" => Some(with_db(state, req, enrollments_delete_for_semester)),
        "enrollments.updateStatus" => Some(with_db(state, req, enrollments_update_status)),
        "enrollments.overview" => Some(with_db(state, req, enrollments_overview)),
        _ => None,
    }
}
