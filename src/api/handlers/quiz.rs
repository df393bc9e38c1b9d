use crate::api::error::HandlerErr;
use crate::api::helpers::{get_optional_str, get_required_str, now_iso, with_conn};
use crate::api::types::{AppState, Request};
use crate::records;
use rusqlite::Connection;
use serde_json::{json, Value};

const REQUIRED_FIELDS: &[&str] = &[
    "subject",
    "score",
    "total_questions",
    "accuracy",
    "time_taken_seconds",
    "details",
];

#[derive(Debug)]
struct NewAttempt {
    subject: String,
    score: i64,
    total_questions: i64,
    accuracy: f64,
    time_taken_seconds: i64,
    details: Value,
}

fn non_negative_int(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|n| *n >= 0)
        .ok_or_else(|| {
            HandlerErr::bad_params(format!("{} must be a non-negative integer", key))
        })
}

fn parse_attempt(params: &Value) -> Result<NewAttempt, HandlerErr> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|k| params.get(*k).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(
            HandlerErr::bad_params("Missing required fields for quiz attempt.")
                .with_details(json!({ "missing": missing })),
        );
    }

    let subject = get_optional_str(params, "subject")?
        .ok_or_else(|| HandlerErr::bad_params("subject must not be empty"))?;
    let score = non_negative_int(params, "score")?;
    let total_questions = non_negative_int(params, "total_questions")?;
    let time_taken_seconds = non_negative_int(params, "time_taken_seconds")?;
    let accuracy = params
        .get("accuracy")
        .and_then(|v| v.as_f64())
        .filter(|f| f.is_finite() && *f >= 0.0)
        .ok_or_else(|| HandlerErr::bad_params("accuracy must be a non-negative number"))?;
    if score > total_questions {
        return Err(HandlerErr::bad_params(
            "score cannot exceed total_questions",
        ));
    }

    Ok(NewAttempt {
        subject,
        score,
        total_questions,
        accuracy,
        time_taken_seconds,
        details: params.get("details").cloned().unwrap_or(Value::Null),
    })
}

fn save_attempt(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_optional_str(params, "student_id")?.unwrap_or_default();
    if records::find_student(conn, &student_id)?.is_none() {
        return Err(HandlerErr::not_found("Student not found."));
    }
    let attempt = parse_attempt(params)?;

    conn.execute(
        "INSERT INTO quiz_attempts(student_id, subject, score, total_questions, accuracy,
                                   time_taken_seconds, details, attempted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &attempt.subject,
            attempt.score,
            attempt.total_questions,
            attempt.accuracy,
            attempt.time_taken_seconds,
            attempt.details.to_string(),
            now_iso(),
        ),
    )
    .map_err(|e| HandlerErr::write_failed("db_insert_failed", "quiz_attempts", e))?;
    let attempt_id = conn.last_insert_rowid();
    tracing::info!(
        attempt_id,
        student_id = %student_id,
        subject = %attempt.subject,
        score = attempt.score,
        "quiz attempt recorded"
    );

    Ok(json!({
        "message": "Quiz attempt saved successfully.",
        "attempt_id": attempt_id
    }))
}

fn quiz_history(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "student_id")?;
    if records::find_student(conn, &student_id)?.is_none() {
        return Err(HandlerErr::not_found("Student not found."));
    }
    Ok(json!({ "history": records::attempts_for_student(conn, &student_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "student.quizAttempt" => Some(with_conn(state, req, save_attempt)),
        "student.quizHistory" => Some(with_conn(state, req, quiz_history)),
        _ => None,
    }
}
