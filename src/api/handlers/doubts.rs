use crate::api::error::HandlerErr;
use crate::api::helpers::{get_optional_str, get_required_i64, get_required_str, with_conn};
use crate::api::types::{AppState, Request};
use crate::records;
use rusqlite::Connection;
use serde_json::{json, Value};

fn ask_doubt(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_optional_str(params, "student_id")?;
    let question_text = get_optional_str(params, "question_text")?;
    let (Some(student_id), Some(question_text)) = (student_id, question_text) else {
        return Err(HandlerErr::bad_params("Missing student ID or question text."));
    };
    let teacher_id = get_optional_str(params, "teacher_id")?;

    if records::find_student(conn, &student_id)?.is_none() {
        return Err(HandlerErr::not_found("Student not found."));
    }
    if let Some(tid) = teacher_id.as_deref() {
        if records::find_teacher(conn, tid)?.is_none() {
            return Err(HandlerErr::not_found("Teacher not found."));
        }
    }

    conn.execute(
        "INSERT INTO doubts(student_id, teacher_id, question_text, is_resolved) VALUES(?, ?, ?, 0)",
        (&student_id, &teacher_id, &question_text),
    )
    .map_err(|e| HandlerErr::write_failed("db_insert_failed", "doubts", e))?;
    let doubt_id = conn.last_insert_rowid();
    tracing::info!(doubt_id, student_id = %student_id, "doubt submitted");

    Ok(json!({
        "message": "Your doubt has been submitted successfully!",
        "doubt_id": doubt_id
    }))
}

fn teacher_doubts(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacher_id")?;
    if records::find_teacher(conn, &teacher_id)?.is_none() {
        return Err(HandlerErr::not_found("Teacher not found."));
    }
    Ok(json!({ "doubts": records::teacher_inbox(conn, &teacher_id)? }))
}

fn student_doubts(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "student_id")?;
    if records::find_student(conn, &student_id)?.is_none() {
        return Err(HandlerErr::not_found("Student not found."));
    }
    Ok(json!({ "doubts": records::doubts_for_student(conn, &student_id)? }))
}

fn resolve_doubt(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let doubt_id = get_required_i64(params, "doubt_id")?;
    if !records::doubt_exists(conn, doubt_id)? {
        return Err(HandlerErr::not_found("Doubt not found."));
    }
    conn.execute("UPDATE doubts SET is_resolved = 1 WHERE id = ?", [doubt_id])
        .map_err(|e| HandlerErr::write_failed("db_update_failed", "doubts", e))?;
    Ok(json!({ "message": "Doubt marked as resolved." }))
}

fn answer_doubt(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let doubt_id = get_required_i64(params, "doubt_id")?;
    if !records::doubt_exists(conn, doubt_id)? {
        return Err(HandlerErr::not_found("Doubt not found."));
    }
    let Some(answer_text) = get_optional_str(params, "answer_text")? else {
        return Err(HandlerErr::bad_params("Answer text is required."));
    };
    conn.execute(
        "UPDATE doubts SET answer_text = ?, is_resolved = 1 WHERE id = ?",
        (&answer_text, doubt_id),
    )
    .map_err(|e| HandlerErr::write_failed("db_update_failed", "doubts", e))?;
    Ok(json!({ "message": "Doubt answered successfully." }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "student.askDoubt" => Some(with_conn(state, req, ask_doubt)),
        "student.doubts" => Some(with_conn(state, req, student_doubts)),
        "teacher.doubts" => Some(with_conn(state, req, teacher_doubts)),
        "doubts.resolve" => Some(with_conn(state, req, resolve_doubt)),
        "doubts.answer" => Some(with_conn(state, req, answer_doubt)),
        _ => None,
    }
}
