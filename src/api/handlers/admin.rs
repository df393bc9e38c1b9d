use crate::api::error::{respond, HandlerErr};
use crate::api::helpers::{
    get_json_object, get_optional_i64, get_optional_str, get_required_i64, get_required_text,
    get_string_list, now_unix,
};
use crate::api::types::{AppState, Request};
use crate::auth::{hash_password, new_session_token, verify_password};
use crate::records;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct AdminSession {
    admin_id: i64,
    username: String,
}

type AdminFn = fn(&Connection, &Value, &AdminSession) -> Result<Value, HandlerErr>;

fn tx_failed(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_tx_failed", e.to_string())
}

fn commit(tx: Transaction<'_>) -> Result<(), HandlerErr> {
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))
}

fn require_session(conn: &Connection, params: &Value, ttl_secs: i64) -> Result<AdminSession, HandlerErr> {
    let Some(token) = get_optional_str(params, "token")? else {
        return Err(HandlerErr::unauthorized("admin login required"));
    };
    let row: Option<(i64, String, i64)> = conn
        .query_row(
            "SELECT a.id, a.username, s.created_at
             FROM admin_sessions s
             JOIN admins a ON a.id = s.admin_id
             WHERE s.token = ?",
            [&token],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((admin_id, username, created_at)) = row else {
        return Err(HandlerErr::unauthorized("admin login required"));
    };
    if now_unix() - created_at > ttl_secs {
        conn.execute("DELETE FROM admin_sessions WHERE token = ?", [&token])
            .map_err(|e| HandlerErr::write_failed("db_delete_failed", "admin_sessions", e))?;
        return Err(HandlerErr::unauthorized("admin session expired"));
    }
    Ok(AdminSession { admin_id, username })
}

fn with_admin(state: &mut AppState, req: &Request, f: AdminFn) -> Value {
    let ttl = state.settings.session_ttl_secs;
    let result = state.conn().and_then(|conn| {
        let session = require_session(conn, &req.params, ttl)?;
        f(conn, &req.params, &session)
    });
    respond(&req.id, result)
}

// --- session ---

fn login(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let username = params.get("username").and_then(|v| v.as_str()).unwrap_or("");
    let password = params.get("password").and_then(|v| v.as_str()).unwrap_or("");

    let admin: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM admins WHERE username = ?",
            [username],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((admin_id, _)) = admin.filter(|(_, hash)| verify_password(password, hash)) else {
        tracing::warn!(username, "admin login rejected");
        return Err(HandlerErr::unauthorized("Invalid username or password"));
    };

    let token = new_session_token();
    conn.execute(
        "INSERT INTO admin_sessions(token, admin_id, created_at) VALUES(?, ?, ?)",
        (&token, admin_id, now_unix()),
    )
    .map_err(|e| HandlerErr::write_failed("db_insert_failed", "admin_sessions", e))?;
    tracing::info!(username, "admin logged in");
    Ok(json!({ "token": token, "username": username }))
}

fn logout(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    if let Some(token) = get_optional_str(params, "token")? {
        conn.execute("DELETE FROM admin_sessions WHERE token = ?", [&token])
            .map_err(|e| HandlerErr::write_failed("db_delete_failed", "admin_sessions", e))?;
    }
    Ok(json!({ "ok": true }))
}

fn me(_conn: &Connection, _params: &Value, session: &AdminSession) -> Result<Value, HandlerErr> {
    Ok(json!({ "id": session.admin_id, "username": session.username }))
}

// --- shared lookups ---

fn required_key(params: &Value) -> Result<String, HandlerErr> {
    get_required_text(params, "id")
}

fn class_ids_by_name(conn: &Connection, names: &[String]) -> Result<Vec<i64>, HandlerErr> {
    names
        .iter()
        .map(|name| {
            conn.query_row("SELECT id FROM classes WHERE name = ?", [name], |r| r.get(0))
                .optional()?
                .ok_or_else(|| HandlerErr::not_found(format!("class not found: {}", name)))
        })
        .collect()
}

fn ensure_all_exist(
    conn: &Connection,
    table: &str,
    what: &str,
    ids: &[String],
) -> Result<(), HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    for id in ids {
        let found = conn
            .query_row(&sql, [id], |r| r.get::<_, i64>(0))
            .optional()?
            .is_some();
        if !found {
            return Err(HandlerErr::not_found(format!("{} not found: {}", what, id)));
        }
    }
    Ok(())
}

fn row_exists(conn: &Connection, table: &str, id: &dyn rusqlite::ToSql) -> Result<bool, HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    Ok(conn
        .query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

fn optional_password_hash(params: &Value) -> Result<Option<String>, HandlerErr> {
    Ok(get_optional_str(params, "password")?.map(|p| hash_password(&p)))
}

/// Rewrites a person row's editable columns, keeping whatever the patch leaves out.
fn update_person(
    tx: &Transaction<'_>,
    table: &str,
    id: &str,
    params: &Value,
) -> Result<(), HandlerErr> {
    if let Some(name) = get_optional_str(params, "name")? {
        tx.execute(&format!("UPDATE {} SET name = ? WHERE id = ?", table), (&name, id))
            .map_err(|e| HandlerErr::write_failed("db_update_failed", table, e))?;
    }
    if let Some(username) = get_optional_str(params, "username")? {
        tx.execute(
            &format!("UPDATE {} SET username = ? WHERE id = ?", table),
            (&username, id),
        )
        .map_err(|e| HandlerErr::write_failed("db_update_failed", table, e))?;
    }
    // A blank password leaves the current one in place.
    if let Some(hash) = optional_password_hash(params)? {
        tx.execute(
            &format!("UPDATE {} SET password_hash = ? WHERE id = ?", table),
            (&hash, id),
        )
        .map_err(|e| HandlerErr::write_failed("db_update_failed", table, e))?;
    }
    Ok(())
}

fn insert_person(tx: &Transaction<'_>, table: &str, params: &Value) -> Result<String, HandlerErr> {
    let id = required_key(params)?;
    let name = get_required_text(params, "name")?;
    let username = get_required_text(params, "username")?;
    let Some(hash) = optional_password_hash(params)? else {
        return Err(HandlerErr::bad_params("password is required"));
    };
    tx.execute(
        &format!(
            "INSERT INTO {}(id, name, username, password_hash) VALUES(?, ?, ?, ?)",
            table
        ),
        (&id, &name, &username, &hash),
    )
    .map_err(|e| HandlerErr::write_failed("db_insert_failed", table, e))?;
    Ok(id)
}

fn set_teacher_classes(tx: &Transaction<'_>, teacher_id: &str, class_ids: &[i64]) -> Result<(), HandlerErr> {
    tx.execute("DELETE FROM teacher_class_link WHERE teacher_id = ?", [teacher_id])
        .map_err(|e| HandlerErr::write_failed("db_delete_failed", "teacher_class_link", e))?;
    for class_id in class_ids {
        tx.execute(
            "INSERT OR IGNORE INTO teacher_class_link(teacher_id, class_id) VALUES(?, ?)",
            (teacher_id, class_id),
        )
        .map_err(|e| HandlerErr::write_failed("db_insert_failed", "teacher_class_link", e))?;
    }
    Ok(())
}

fn set_student_parents(tx: &Transaction<'_>, student_id: &str, parent_ids: &[String]) -> Result<(), HandlerErr> {
    tx.execute("DELETE FROM parent_student_link WHERE student_id = ?", [student_id])
        .map_err(|e| HandlerErr::write_failed("db_delete_failed", "parent_student_link", e))?;
    for parent_id in parent_ids {
        tx.execute(
            "INSERT OR IGNORE INTO parent_student_link(parent_id, student_id) VALUES(?, ?)",
            (parent_id, student_id),
        )
        .map_err(|e| HandlerErr::write_failed("db_insert_failed", "parent_student_link", e))?;
    }
    Ok(())
}

fn set_parent_children(tx: &Transaction<'_>, parent_id: &str, student_ids: &[String]) -> Result<(), HandlerErr> {
    tx.execute("DELETE FROM parent_student_link WHERE parent_id = ?", [parent_id])
        .map_err(|e| HandlerErr::write_failed("db_delete_failed", "parent_student_link", e))?;
    for student_id in student_ids {
        tx.execute(
            "INSERT OR IGNORE INTO parent_student_link(parent_id, student_id) VALUES(?, ?)",
            (parent_id, student_id),
        )
        .map_err(|e| HandlerErr::write_failed("db_insert_failed", "parent_student_link", e))?;
    }
    Ok(())
}

fn delete_where(tx: &Transaction<'_>, table: &str, column: &str, key: &dyn rusqlite::ToSql) -> Result<(), HandlerErr> {
    tx.execute(&format!("DELETE FROM {} WHERE {} = ?", table, column), [key])
        .map_err(|e| HandlerErr::write_failed("db_delete_failed", table, e))?;
    Ok(())
}

// --- teachers ---

fn teachers_list(conn: &Connection, _params: &Value, _s: &AdminSession) -> Result<Value, HandlerErr> {
    let teachers = records::list_teachers(conn)?
        .iter()
        .map(|t| records::teacher_dict(conn, t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "teachers": teachers }))
}

fn teachers_create(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let class_names = get_string_list(params, "classes")?.unwrap_or_default();
    let class_ids = class_ids_by_name(conn, &class_names)?;
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    let id = insert_person(&tx, "teachers", params)?;
    set_teacher_classes(&tx, &id, &class_ids)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, teacher_id = %id, "teacher created");
    teacher_result(conn, &id)
}

fn teachers_update(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = required_key(params)?;
    if records::find_teacher(conn, &id)?.is_none() {
        return Err(HandlerErr::not_found("teacher not found"));
    }
    let class_ids = match get_string_list(params, "classes")? {
        Some(names) => Some(class_ids_by_name(conn, &names)?),
        None => None,
    };
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    update_person(&tx, "teachers", &id, params)?;
    if let Some(class_ids) = class_ids {
        set_teacher_classes(&tx, &id, &class_ids)?;
    }
    commit(tx)?;
    tracing::info!(admin = %s.username, teacher_id = %id, "teacher updated");
    teacher_result(conn, &id)
}

fn teacher_result(conn: &Connection, id: &str) -> Result<Value, HandlerErr> {
    let t = records::find_teacher(conn, id)?
        .ok_or_else(|| HandlerErr::not_found("teacher not found"))?;
    Ok(json!({ "teacher": records::teacher_dict(conn, &t)? }))
}

fn teachers_delete(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = required_key(params)?;
    if records::find_teacher(conn, &id)?.is_none() {
        return Err(HandlerErr::not_found("teacher not found"));
    }
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    // Doubts outlive their teacher and fall back to the shared inbox.
    tx.execute("UPDATE doubts SET teacher_id = NULL WHERE teacher_id = ?", [&id])
        .map_err(|e| HandlerErr::write_failed("db_update_failed", "doubts", e))?;
    delete_where(&tx, "complaints", "teacher_id", &id)?;
    delete_where(&tx, "teacher_class_link", "teacher_id", &id)?;
    delete_where(&tx, "teachers", "id", &id)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, teacher_id = %id, "teacher deleted");
    Ok(json!({ "ok": true }))
}

// --- students ---

fn students_list(conn: &Connection, _params: &Value, _s: &AdminSession) -> Result<Value, HandlerErr> {
    let students = records::list_students(conn)?
        .iter()
        .map(|st| records::student_dict(conn, st))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "students": students }))
}

fn class_id_param(conn: &Connection, params: &Value) -> Result<Option<i64>, HandlerErr> {
    match get_optional_str(params, "class_name")? {
        Some(name) => Ok(class_ids_by_name(conn, &[name])?.first().copied()),
        None => Ok(None),
    }
}

fn students_create(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let Some(class_id) = class_id_param(conn, params)? else {
        return Err(HandlerErr::bad_params("missing class_name"));
    };
    let attendance = get_optional_i64(params, "attendance")?;
    let marks = get_json_object(params, "marks")?;
    let historical = get_json_object(params, "historical_marks")?;
    let parent_ids = get_string_list(params, "parents")?.unwrap_or_default();
    ensure_all_exist(conn, "parents", "parent", &parent_ids)?;

    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    let id = required_key(params)?;
    let name = get_required_text(params, "name")?;
    let username = get_required_text(params, "username")?;
    let Some(hash) = optional_password_hash(params)? else {
        return Err(HandlerErr::bad_params("password is required"));
    };
    tx.execute(
        "INSERT INTO students(id, name, username, password_hash, class_id, attendance, marks, historical_marks)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &name,
            &username,
            &hash,
            class_id,
            attendance,
            marks.map(|m| m.to_string()),
            historical.map(|m| m.to_string()),
        ),
    )
    .map_err(|e| HandlerErr::write_failed("db_insert_failed", "students", e))?;
    set_student_parents(&tx, &id, &parent_ids)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, student_id = %id, "student created");
    student_result(conn, &id)
}

fn students_update(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = required_key(params)?;
    if records::find_student(conn, &id)?.is_none() {
        return Err(HandlerErr::not_found("student not found"));
    }
    let class_id = class_id_param(conn, params)?;
    let attendance = get_optional_i64(params, "attendance")?;
    let marks = get_json_object(params, "marks")?;
    let historical = get_json_object(params, "historical_marks")?;
    let parent_ids = get_string_list(params, "parents")?;
    if let Some(ids) = parent_ids.as_deref() {
        ensure_all_exist(conn, "parents", "parent", ids)?;
    }

    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    update_person(&tx, "students", &id, params)?;
    let fail = |e| HandlerErr::write_failed("db_update_failed", "students", e);
    if let Some(class_id) = class_id {
        tx.execute("UPDATE students SET class_id = ? WHERE id = ?", (class_id, &id))
            .map_err(fail)?;
    }
    if let Some(attendance) = attendance {
        tx.execute("UPDATE students SET attendance = ? WHERE id = ?", (attendance, &id))
            .map_err(fail)?;
    }
    if let Some(marks) = marks {
        tx.execute("UPDATE students SET marks = ? WHERE id = ?", (marks.to_string(), &id))
            .map_err(fail)?;
    }
    if let Some(historical) = historical {
        tx.execute(
            "UPDATE students SET historical_marks = ? WHERE id = ?",
            (historical.to_string(), &id),
        )
        .map_err(fail)?;
    }
    if let Some(parent_ids) = parent_ids {
        set_student_parents(&tx, &id, &parent_ids)?;
    }
    commit(tx)?;
    tracing::info!(admin = %s.username, student_id = %id, "student updated");
    student_result(conn, &id)
}

fn student_result(conn: &Connection, id: &str) -> Result<Value, HandlerErr> {
    let st = records::find_student(conn, id)?
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;
    Ok(json!({ "student": records::student_dict(conn, &st)? }))
}

fn students_delete(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = required_key(params)?;
    if records::find_student(conn, &id)?.is_none() {
        return Err(HandlerErr::not_found("student not found"));
    }
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    delete_where(&tx, "doubts", "student_id", &id)?;
    delete_where(&tx, "quiz_attempts", "student_id", &id)?;
    delete_where(&tx, "complaints", "student_id", &id)?;
    delete_where(&tx, "parent_student_link", "student_id", &id)?;
    delete_where(&tx, "students", "id", &id)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, student_id = %id, "student deleted");
    Ok(json!({ "ok": true }))
}

// --- parents ---

fn parents_list(conn: &Connection, _params: &Value, _s: &AdminSession) -> Result<Value, HandlerErr> {
    let parents = records::list_parents(conn)?
        .iter()
        .map(|p| records::parent_dict(conn, p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "parents": parents }))
}

fn parents_create(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let children = get_string_list(params, "children")?.unwrap_or_default();
    ensure_all_exist(conn, "students", "student", &children)?;
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    let id = insert_person(&tx, "parents", params)?;
    set_parent_children(&tx, &id, &children)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, parent_id = %id, "parent created");
    parent_result(conn, &id)
}

fn parents_update(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = required_key(params)?;
    if records::find_parent(conn, &id)?.is_none() {
        return Err(HandlerErr::not_found("parent not found"));
    }
    let children = get_string_list(params, "children")?;
    if let Some(ids) = children.as_deref() {
        ensure_all_exist(conn, "students", "student", ids)?;
    }
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    update_person(&tx, "parents", &id, params)?;
    if let Some(children) = children {
        set_parent_children(&tx, &id, &children)?;
    }
    commit(tx)?;
    tracing::info!(admin = %s.username, parent_id = %id, "parent updated");
    parent_result(conn, &id)
}

fn parent_result(conn: &Connection, id: &str) -> Result<Value, HandlerErr> {
    let p = records::find_parent(conn, id)?
        .ok_or_else(|| HandlerErr::not_found("parent not found"))?;
    Ok(json!({ "parent": records::parent_dict(conn, &p)? }))
}

fn parents_delete(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = required_key(params)?;
    if records::find_parent(conn, &id)?.is_none() {
        return Err(HandlerErr::not_found("parent not found"));
    }
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    delete_where(&tx, "complaints", "parent_id", &id)?;
    delete_where(&tx, "parent_student_link", "parent_id", &id)?;
    delete_where(&tx, "parents", "id", &id)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, parent_id = %id, "parent deleted");
    Ok(json!({ "ok": true }))
}

// --- admins ---

fn admins_list(conn: &Connection, _params: &Value, _s: &AdminSession) -> Result<Value, HandlerErr> {
    let mut stmt = conn.prepare("SELECT id, username FROM admins ORDER BY id")?;
    let admins = stmt
        .query_map([], |r| {
            Ok(json!({ "id": r.get::<_, i64>(0)?, "username": r.get::<_, String>(1)? }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "admins": admins }))
}

fn admins_create(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let username = get_required_text(params, "username")?;
    let Some(hash) = optional_password_hash(params)? else {
        return Err(HandlerErr::bad_params("password is required"));
    };
    conn.execute(
        "INSERT INTO admins(username, password_hash) VALUES(?, ?)",
        (&username, &hash),
    )
    .map_err(|e| HandlerErr::write_failed("db_insert_failed", "admins", e))?;
    let id = conn.last_insert_rowid();
    tracing::info!(admin = %s.username, new_admin = %username, "admin created");
    Ok(json!({ "admin": { "id": id, "username": username } }))
}

fn admins_update(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = get_required_i64(params, "id")?;
    if !row_exists(conn, "admins", &id)? {
        return Err(HandlerErr::not_found("admin not found"));
    }
    if let Some(username) = get_optional_str(params, "username")? {
        conn.execute("UPDATE admins SET username = ? WHERE id = ?", (&username, id))
            .map_err(|e| HandlerErr::write_failed("db_update_failed", "admins", e))?;
    }
    if let Some(hash) = optional_password_hash(params)? {
        conn.execute("UPDATE admins SET password_hash = ? WHERE id = ?", (&hash, id))
            .map_err(|e| HandlerErr::write_failed("db_update_failed", "admins", e))?;
    }
    let username: String =
        conn.query_row("SELECT username FROM admins WHERE id = ?", [id], |r| r.get(0))?;
    tracing::info!(admin = %s.username, admin_id = id, "admin updated");
    Ok(json!({ "admin": { "id": id, "username": username } }))
}

fn admins_delete(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = get_required_i64(params, "id")?;
    if id == s.admin_id {
        return Err(HandlerErr::conflict("cannot delete the signed-in admin"));
    }
    if !row_exists(conn, "admins", &id)? {
        return Err(HandlerErr::not_found("admin not found"));
    }
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    delete_where(&tx, "admin_sessions", "admin_id", &id)?;
    delete_where(&tx, "admins", "id", &id)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, admin_id = id, "admin deleted");
    Ok(json!({ "ok": true }))
}

// --- classes ---

fn class_dict(conn: &Connection, id: i64, name: &str) -> Result<Value, HandlerErr> {
    let teachers: Vec<String> = records::teachers_for_class(conn, id)?
        .into_iter()
        .map(|t| t.id)
        .collect();
    let mut stmt = conn.prepare("SELECT id FROM students WHERE class_id = ? ORDER BY id")?;
    let students = stmt
        .query_map([id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "id": id, "name": name, "teachers": teachers, "students": students }))
}

fn classes_list(conn: &Connection, _params: &Value, _s: &AdminSession) -> Result<Value, HandlerErr> {
    let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    let classes = rows
        .iter()
        .map(|(id, name)| class_dict(conn, *id, name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "classes": classes }))
}

fn set_class_teachers(tx: &Transaction<'_>, class_id: i64, teacher_ids: &[String]) -> Result<(), HandlerErr> {
    delete_where(tx, "teacher_class_link", "class_id", &class_id)?;
    for teacher_id in teacher_ids {
        tx.execute(
            "INSERT OR IGNORE INTO teacher_class_link(teacher_id, class_id) VALUES(?, ?)",
            (teacher_id, class_id),
        )
        .map_err(|e| HandlerErr::write_failed("db_insert_failed", "teacher_class_link", e))?;
    }
    Ok(())
}

fn classes_create(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let name = get_required_text(params, "name")?.trim().to_string();
    let teacher_ids = get_string_list(params, "teachers")?.unwrap_or_default();
    ensure_all_exist(conn, "teachers", "teacher", &teacher_ids)?;
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    tx.execute("INSERT INTO classes(name) VALUES(?)", [&name])
        .map_err(|e| HandlerErr::write_failed("db_insert_failed", "classes", e))?;
    let id = tx.last_insert_rowid();
    set_class_teachers(&tx, id, &teacher_ids)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, class_id = id, class = %name, "class created");
    Ok(json!({ "class": class_dict(conn, id, &name)? }))
}

fn classes_update(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = get_required_i64(params, "id")?;
    if !row_exists(conn, "classes", &id)? {
        return Err(HandlerErr::not_found("class not found"));
    }
    let teacher_ids = get_string_list(params, "teachers")?;
    if let Some(ids) = teacher_ids.as_deref() {
        ensure_all_exist(conn, "teachers", "teacher", ids)?;
    }
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    if let Some(name) = get_optional_str(params, "name")? {
        tx.execute("UPDATE classes SET name = ? WHERE id = ?", (name.trim(), id))
            .map_err(|e| HandlerErr::write_failed("db_update_failed", "classes", e))?;
    }
    if let Some(ids) = teacher_ids {
        set_class_teachers(&tx, id, &ids)?;
    }
    commit(tx)?;
    let name: String = conn.query_row("SELECT name FROM classes WHERE id = ?", [id], |r| r.get(0))?;
    tracing::info!(admin = %s.username, class_id = id, "class updated");
    Ok(json!({ "class": class_dict(conn, id, &name)? }))
}

fn classes_delete(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = get_required_i64(params, "id")?;
    if !row_exists(conn, "classes", &id)? {
        return Err(HandlerErr::not_found("class not found"));
    }
    let enrolled: i64 =
        conn.query_row("SELECT COUNT(*) FROM students WHERE class_id = ?", [id], |r| r.get(0))?;
    if enrolled > 0 {
        return Err(HandlerErr::conflict("class still has students")
            .with_details(json!({ "students": enrolled })));
    }
    let tx = conn.unchecked_transaction().map_err(tx_failed)?;
    delete_where(&tx, "teacher_class_link", "class_id", &id)?;
    delete_where(&tx, "classes", "id", &id)?;
    commit(tx)?;
    tracing::info!(admin = %s.username, class_id = id, "class deleted");
    Ok(json!({ "ok": true }))
}

// --- complaints & quiz attempts ---

fn complaints_list(conn: &Connection, _params: &Value, _s: &AdminSession) -> Result<Value, HandlerErr> {
    Ok(json!({ "complaints": records::list_complaints(conn)? }))
}

fn complaints_update(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = get_required_i64(params, "id")?;
    let remark = get_required_text(params, "teacher_remark")?;
    let changed = conn
        .execute("UPDATE complaints SET teacher_remark = ? WHERE id = ?", (&remark, id))
        .map_err(|e| HandlerErr::write_failed("db_update_failed", "complaints", e))?;
    if changed == 0 {
        return Err(HandlerErr::not_found("complaint not found"));
    }
    tracing::info!(admin = %s.username, complaint_id = id, "complaint updated");
    let complaint = records::find_complaint(conn, id)?
        .ok_or_else(|| HandlerErr::not_found("complaint not found"))?;
    Ok(json!({ "complaint": complaint }))
}

fn complaints_delete(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = get_required_i64(params, "id")?;
    let changed = conn
        .execute("DELETE FROM complaints WHERE id = ?", [id])
        .map_err(|e| HandlerErr::write_failed("db_delete_failed", "complaints", e))?;
    if changed == 0 {
        return Err(HandlerErr::not_found("complaint not found"));
    }
    tracing::info!(admin = %s.username, complaint_id = id, "complaint deleted");
    Ok(json!({ "ok": true }))
}

fn quiz_attempts_list(conn: &Connection, _params: &Value, _s: &AdminSession) -> Result<Value, HandlerErr> {
    Ok(json!({ "quizAttempts": records::list_attempts(conn)? }))
}

fn quiz_attempts_delete(conn: &Connection, params: &Value, s: &AdminSession) -> Result<Value, HandlerErr> {
    let id = get_required_i64(params, "id")?;
    let changed = conn
        .execute("DELETE FROM quiz_attempts WHERE id = ?", [id])
        .map_err(|e| HandlerErr::write_failed("db_delete_failed", "quiz_attempts", e))?;
    if changed == 0 {
        return Err(HandlerErr::not_found("quiz attempt not found"));
    }
    tracing::info!(admin = %s.username, attempt_id = id, "quiz attempt deleted");
    Ok(json!({ "ok": true }))
}

fn admin_fn(method: &str) -> Option<AdminFn> {
    let f: AdminFn = match method {
        "admin.me" => me,
        "admin.teachers.list" => teachers_list,
        "admin.teachers.create" => teachers_create,
        "admin.teachers.update" => teachers_update,
        "admin.teachers.delete" => teachers_delete,
        "admin.students.list" => students_list,
        "admin.students.create" => students_create,
        "admin.students.update" => students_update,
        "admin.students.delete" => students_delete,
        "admin.parents.list" => parents_list,
        "admin.parents.create" => parents_create,
        "admin.parents.update" => parents_update,
        "admin.parents.delete" => parents_delete,
        "admin.admins.list" => admins_list,
        "admin.admins.create" => admins_create,
        "admin.admins.update" => admins_update,
        "admin.admins.delete" => admins_delete,
        "admin.classes.list" => classes_list,
        "admin.classes.create" => classes_create,
        "admin.classes.update" => classes_update,
        "admin.classes.delete" => classes_delete,
        "admin.complaints.list" => complaints_list,
        "admin.complaints.update" => complaints_update,
        "admin.complaints.delete" => complaints_delete,
        "admin.quizAttempts.list" => quiz_attempts_list,
        "admin.quizAttempts.delete" => quiz_attempts_delete,
        _ => return None,
    };
    Some(f)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "admin.login" => Some(respond(&req.id, login(state, &req.params))),
        "admin.logout" => Some(respond(&req.id, logout(state, &req.params))),
        m => admin_fn(m).map(|f| with_admin(state, req, f)),
    }
}
