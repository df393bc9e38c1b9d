use rusqlite::Connection;
use serde_json::Value;

use crate::api::error::{respond, HandlerErr};
use crate::api::types::{AppState, Request};

/// Runs `f` against the open database and wraps the outcome in a response envelope.
pub fn with_conn<F>(state: &mut AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
{
    let result = state.conn().and_then(|conn| f(conn, &req.params));
    respond(&req.id, result)
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Like [`get_required_str`] but blank strings count as missing.
pub fn get_required_text(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let s = get_required_str(params, key)?;
    if s.trim().is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(s)
}

pub fn get_optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

/// Integer parameter; numeric strings are accepted since path segments arrive as text.
pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| HandlerErr::bad_params(format!("{} must be an integer", key))),
        None | Some(Value::Null) => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn get_optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_required_i64(params, key).map(Some),
    }
}

pub fn get_string_list(params: &Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| HandlerErr::bad_params(format!("{} must list strings", key)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an array", key))),
    }
}

/// A JSON object given directly or as JSON text (admin forms post text areas).
pub fn get_json_object(params: &Value, key: &str) -> Result<Option<Value>, HandlerErr> {
    let parsed = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => serde_json::from_str::<Value>(s).map_err(|_| {
            HandlerErr::bad_params("Invalid JSON").with_details(serde_json::json!({ "field": key }))
        })?,
        Some(v) => v.clone(),
    };
    if !parsed.is_object() {
        return Err(HandlerErr::bad_params(format!("{} must be a JSON object", key)));
    }
    Ok(Some(parsed))
}

/// Naive UTC timestamp with microseconds, e.g. `2025-01-02T03:04:05.000006`.
pub fn now_iso() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
