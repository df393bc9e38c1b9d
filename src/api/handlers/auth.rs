use crate::api::error::HandlerErr;
use crate::api::helpers::with_conn;
use crate::api::types::{AppState, Request};
use crate::auth::verify_password;
use crate::records;
use rusqlite::Connection;
use serde_json::{json, Value};

fn login(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let username = params.get("username").and_then(|v| v.as_str()).unwrap_or("");
    let password = params.get("password").and_then(|v| v.as_str()).unwrap_or("");
    let role = params.get("role").and_then(|v| v.as_str()).unwrap_or("");

    let user = match role {
        "teacher" => match records::find_teacher_by_username(conn, username)? {
            Some(t) if verify_password(password, &t.password_hash) => {
                Some(records::teacher_dict(conn, &t)?)
            }
            _ => None,
        },
        "student" => match records::find_student_by_username(conn, username)? {
            Some(s) if verify_password(password, &s.password_hash) => {
                Some(records::student_details(conn, &s)?)
            }
            _ => None,
        },
        "parent" => match records::find_parent_by_username(conn, username)? {
            Some(p) if verify_password(password, &p.password_hash) => {
                Some(records::parent_dict(conn, &p)?)
            }
            _ => None,
        },
        _ => return Err(HandlerErr::bad_params("Invalid role specified")),
    };

    match user {
        Some(user) => {
            tracing::info!(role, username, "login succeeded");
            Ok(json!({ "user": user }))
        }
        None => {
            tracing::warn!(role, username, "login rejected");
            Err(HandlerErr::unauthorized("Invalid username or password"))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "auth.login" => Some(with_conn(state, req, login)),
        _ => None,
    }
}
