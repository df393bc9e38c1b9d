use crate::api::error::HandlerErr;
use crate::api::helpers::{get_optional_str, get_required_str, now_iso, with_conn};
use crate::api::types::{AppState, Request};
use crate::records;
use rusqlite::Connection;
use serde_json::{json, Value};

fn create_complaint(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = get_optional_str(params, "teacher_id")?;
    let student_id = get_optional_str(params, "student_id")?;
    let remark = get_optional_str(params, "remark")?;
    let (Some(teacher_id), Some(student_id), Some(remark)) = (teacher_id, student_id, remark)
    else {
        return Err(HandlerErr::bad_params("Missing required fields."));
    };

    if records::find_teacher(conn, &teacher_id)?.is_none() {
        return Err(HandlerErr::not_found("Teacher not found."));
    }
    let student = records::find_student(conn, &student_id)?;
    let parent_ids = records::parent_ids_for_student(conn, &student_id)?;
    let (Some(student), Some(parent_id)) = (student, parent_ids.first()) else {
        return Err(HandlerErr::not_found("Student or linked parent not found."));
    };

    // The report is a snapshot of the student's standing when the complaint is sent.
    let report_content = records::student_details(conn, &student)?;
    conn.execute(
        "INSERT INTO complaints(teacher_id, student_id, parent_id, report_content, teacher_remark, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &teacher_id,
            &student_id,
            parent_id,
            report_content.to_string(),
            &remark,
            now_iso(),
        ),
    )
    .map_err(|e| HandlerErr::write_failed("db_insert_failed", "complaints", e))?;
    let complaint_id = conn.last_insert_rowid();
    tracing::info!(
        complaint_id,
        teacher_id = %teacher_id,
        student_id = %student_id,
        parent_id = %parent_id,
        "complaint sent"
    );

    Ok(json!({
        "message": "Complaint sent to parent successfully.",
        "complaint_id": complaint_id
    }))
}

fn parent_complaints(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let parent_id = get_required_str(params, "parent_id")?;
    if records::find_parent(conn, &parent_id)?.is_none() {
        return Err(HandlerErr::not_found("Parent not found."));
    }
    Ok(json!({ "complaints": records::complaints_for_parent(conn, &parent_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "teacher.complaint" => Some(with_conn(state, req, create_complaint)),
        "parent.complaints" => Some(with_conn(state, req, parent_complaints)),
        _ => None,
    }
}
