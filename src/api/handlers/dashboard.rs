use crate::api::error::HandlerErr;
use crate::api::helpers::{get_required_str, with_conn};
use crate::api::types::{AppState, Request};
use crate::records;
use rusqlite::Connection;
use serde_json::{json, Value};

fn teacher_dashboard(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let students = records::list_students(conn)?
        .iter()
        .map(|s| records::student_details(conn, s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(students))
}

fn parent_children(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let parent_id = get_required_str(params, "parent_id")?;
    if records::find_parent(conn, &parent_id)?.is_none() {
        return Err(HandlerErr::not_found("Parent not found"));
    }
    let children = records::children_of_parent(conn, &parent_id)?
        .iter()
        .map(|s| records::student_details(conn, s))
        .collect::<Result<Vec<_>, _>>()?;
    let topper = match records::topper(conn)? {
        Some(s) => records::student_details(conn, &s)?,
        None => Value::Null,
    };
    Ok(json!({ "children": children, "topper": topper }))
}

fn student_teachers(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "student_id")?;
    let Some(student) = records::find_student(conn, &student_id)? else {
        return Err(HandlerErr::not_found("Student or class not found."));
    };
    let teachers = records::teachers_for_class(conn, student.class_id)?
        .iter()
        .map(|t| records::teacher_dict(conn, t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "teachers": teachers }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "teacher.dashboard" => Some(with_conn(state, req, teacher_dashboard)),
        "parent.children" => Some(with_conn(state, req, parent_children)),
        "student.teachers" => Some(with_conn(state, req, student_teachers)),
        _ => None,
    }
}
