//! Row loading and the JSON shapes each record is presented in.

use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::{json, Value};

use crate::calc;

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub class_id: i64,
    pub class_name: Option<String>,
    pub attendance: Option<i64>,
    pub marks: Option<Value>,
    pub historical_marks: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct PersonRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password_hash: String,
}

const STUDENT_SELECT: &str = "SELECT s.id, s.name, s.username, s.password_hash, s.class_id,
        c.name, s.attendance, s.marks, s.historical_marks
     FROM students s
     LEFT JOIN classes c ON c.id = s.class_id";

pub fn parse_json_column(raw: Option<String>) -> Option<Value> {
    raw.and_then(|t| serde_json::from_str(&t).ok())
}

fn student_from_row(r: &Row) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: r.get(0)?,
        name: r.get(1)?,
        username: r.get(2)?,
        password_hash: r.get(3)?,
        class_id: r.get(4)?,
        class_name: r.get(5)?,
        attendance: r.get(6)?,
        marks: parse_json_column(r.get(7)?),
        historical_marks: parse_json_column(r.get(8)?),
    })
}

fn person_from_row(r: &Row) -> rusqlite::Result<PersonRow> {
    Ok(PersonRow {
        id: r.get(0)?,
        name: r.get(1)?,
        username: r.get(2)?,
        password_hash: r.get(3)?,
    })
}

fn strings(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([key], |r| r.get::<_, String>(0))?;
    rows.collect()
}

// --- students ---

pub fn find_student(conn: &Connection, id: &str) -> rusqlite::Result<Option<StudentRow>> {
    conn.query_row(
        &format!("{} WHERE s.id = ?", STUDENT_SELECT),
        [id],
        student_from_row,
    )
    .optional()
}

pub fn find_student_by_username(
    conn: &Connection,
    username: &str,
) -> rusqlite::Result<Option<StudentRow>> {
    conn.query_row(
        &format!("{} WHERE s.username = ?", STUDENT_SELECT),
        [username],
        student_from_row,
    )
    .optional()
}

pub fn list_students(conn: &Connection) -> rusqlite::Result<Vec<StudentRow>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY s.id", STUDENT_SELECT))?;
    let rows = stmt.query_map([], student_from_row)?;
    rows.collect()
}

/// Children in the order they were linked to the parent.
pub fn children_of_parent(conn: &Connection, parent_id: &str) -> rusqlite::Result<Vec<StudentRow>> {
    let mut stmt = conn.prepare(&format!(
        "{} JOIN parent_student_link l ON l.student_id = s.id
         WHERE l.parent_id = ?
         ORDER BY l.rowid",
        STUDENT_SELECT
    ))?;
    let rows = stmt.query_map([parent_id], student_from_row)?;
    rows.collect()
}

/// Parent ids in link order; the first one receives complaints.
pub fn parent_ids_for_student(conn: &Connection, student_id: &str) -> rusqlite::Result<Vec<String>> {
    strings(
        conn,
        "SELECT parent_id FROM parent_student_link WHERE student_id = ? ORDER BY rowid",
        student_id,
    )
}

pub fn quiz_count(conn: &Connection, student_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM quiz_attempts WHERE student_id = ?",
        [student_id],
        |r| r.get(0),
    )
}

pub fn student_dict(conn: &Connection, s: &StudentRow) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": s.id,
        "name": s.name,
        "username": s.username,
        "class_name": s.class_name,
        "attendance": s.attendance,
        "marks": s.marks,
        "historicalMarks": s.historical_marks,
        "parentIds": parent_ids_for_student(conn, &s.id)?,
    }))
}

/// Student record plus the computed dashboard fields.
pub fn student_details(conn: &Connection, s: &StudentRow) -> rusqlite::Result<Value> {
    let mut d = student_dict(conn, s)?;
    let summary = calc::summarize_marks(s.marks.as_ref());
    d["overallAverage"] = json!(summary.overall_average_display());
    d["lowestSubject"] = json!(summary.lowest_or_none());
    d["highestSubject"] = json!(summary.highest_or_none());
    d["quizzesTaken"] = json!(quiz_count(conn, &s.id)?);
    Ok(d)
}

/// Highest overall average across the whole school, or `None` with no students.
pub fn topper(conn: &Connection) -> rusqlite::Result<Option<StudentRow>> {
    let mut students = list_students(conn)?;
    let idx = calc::topper_index(
        students
            .iter()
            .map(|s| calc::summarize_marks(s.marks.as_ref()).ranking_average()),
    );
    Ok(idx.map(|i| students.swap_remove(i)))
}

// --- teachers ---

pub fn find_teacher(conn: &Connection, id: &str) -> rusqlite::Result<Option<PersonRow>> {
    conn.query_row(
        "SELECT id, name, username, password_hash FROM teachers WHERE id = ?",
        [id],
        person_from_row,
    )
    .optional()
}

pub fn find_teacher_by_username(
    conn: &Connection,
    username: &str,
) -> rusqlite::Result<Option<PersonRow>> {
    conn.query_row(
        "SELECT id, name, username, password_hash FROM teachers WHERE username = ?",
        [username],
        person_from_row,
    )
    .optional()
}

pub fn list_teachers(conn: &Connection) -> rusqlite::Result<Vec<PersonRow>> {
    let mut stmt = conn.prepare("SELECT id, name, username, password_hash FROM teachers ORDER BY id")?;
    let rows = stmt.query_map([], person_from_row)?;
    rows.collect()
}

pub fn teachers_for_class(conn: &Connection, class_id: i64) -> rusqlite::Result<Vec<PersonRow>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.username, t.password_hash
         FROM teachers t
         JOIN teacher_class_link l ON l.teacher_id = t.id
         WHERE l.class_id = ?
         ORDER BY l.rowid",
    )?;
    let rows = stmt.query_map([class_id], person_from_row)?;
    rows.collect()
}

pub fn class_names_for_teacher(conn: &Connection, teacher_id: &str) -> rusqlite::Result<Vec<String>> {
    strings(
        conn,
        "SELECT c.name
         FROM classes c
         JOIN teacher_class_link l ON l.class_id = c.id
         WHERE l.teacher_id = ?
         ORDER BY l.rowid",
        teacher_id,
    )
}

pub fn teacher_dict(conn: &Connection, t: &PersonRow) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": t.id,
        "name": t.name,
        "username": t.username,
        "classes": class_names_for_teacher(conn, &t.id)?,
    }))
}

// --- parents ---

pub fn find_parent(conn: &Connection, id: &str) -> rusqlite::Result<Option<PersonRow>> {
    conn.query_row(
        "SELECT id, name, username, password_hash FROM parents WHERE id = ?",
        [id],
        person_from_row,
    )
    .optional()
}

pub fn find_parent_by_username(
    conn: &Connection,
    username: &str,
) -> rusqlite::Result<Option<PersonRow>> {
    conn.query_row(
        "SELECT id, name, username, password_hash FROM parents WHERE username = ?",
        [username],
        person_from_row,
    )
    .optional()
}

pub fn list_parents(conn: &Connection) -> rusqlite::Result<Vec<PersonRow>> {
    let mut stmt = conn.prepare("SELECT id, name, username, password_hash FROM parents ORDER BY id")?;
    let rows = stmt.query_map([], person_from_row)?;
    rows.collect()
}

pub fn child_ids_for_parent(conn: &Connection, parent_id: &str) -> rusqlite::Result<Vec<String>> {
    strings(
        conn,
        "SELECT student_id FROM parent_student_link WHERE parent_id = ? ORDER BY rowid",
        parent_id,
    )
}

pub fn parent_dict(conn: &Connection, p: &PersonRow) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": p.id,
        "name": p.name,
        "username": p.username,
        "children": child_ids_for_parent(conn, &p.id)?,
    }))
}

// --- doubts ---

const DOUBT_SELECT: &str = "SELECT d.id, d.student_id, s.name, d.teacher_id, d.question_text,
        d.answer_text, d.is_resolved
     FROM doubts d
     JOIN students s ON s.id = d.student_id";

fn doubt_from_row(r: &Row) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, i64>(0)?,
        "student_id": r.get::<_, String>(1)?,
        "student_name": r.get::<_, String>(2)?,
        "teacher_id": r.get::<_, Option<String>>(3)?,
        "question_text": r.get::<_, String>(4)?,
        "answer_text": r.get::<_, Option<String>>(5)?,
        "is_resolved": r.get::<_, i64>(6)? != 0,
    }))
}

pub fn doubt_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM doubts WHERE id = ?", [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}

/// Unresolved doubts addressed to the teacher or to nobody in particular.
pub fn teacher_inbox(conn: &Connection, teacher_id: &str) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE (d.teacher_id = ? OR d.teacher_id IS NULL) AND d.is_resolved = 0
         ORDER BY d.id",
        DOUBT_SELECT
    ))?;
    let rows = stmt.query_map([teacher_id], doubt_from_row)?;
    rows.collect()
}

pub fn doubts_for_student(conn: &Connection, student_id: &str) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!("{} WHERE d.student_id = ? ORDER BY d.id", DOUBT_SELECT))?;
    let rows = stmt.query_map([student_id], doubt_from_row)?;
    rows.collect()
}

// --- complaints ---

const COMPLAINT_SELECT: &str = "SELECT c.id, c.teacher_id, t.name, c.student_id, s.name,
        c.parent_id, c.report_content, c.teacher_remark, c.created_at
     FROM complaints c
     JOIN teachers t ON t.id = c.teacher_id
     JOIN students s ON s.id = c.student_id";

fn complaint_from_row(r: &Row) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, i64>(0)?,
        "teacher_id": r.get::<_, String>(1)?,
        "teacher_name": r.get::<_, String>(2)?,
        "student_id": r.get::<_, String>(3)?,
        "student_name": r.get::<_, String>(4)?,
        "parent_id": r.get::<_, String>(5)?,
        "report_content": parse_json_column(r.get(6)?),
        "teacher_remark": r.get::<_, String>(7)?,
        "created_at": r.get::<_, String>(8)?,
    }))
}

/// Newest first.
pub fn complaints_for_parent(conn: &Connection, parent_id: &str) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.parent_id = ? ORDER BY c.created_at DESC, c.id DESC",
        COMPLAINT_SELECT
    ))?;
    let rows = stmt.query_map([parent_id], complaint_from_row)?;
    rows.collect()
}

pub fn list_complaints(conn: &Connection) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY c.id", COMPLAINT_SELECT))?;
    let rows = stmt.query_map([], complaint_from_row)?;
    rows.collect()
}

pub fn find_complaint(conn: &Connection, id: i64) -> rusqlite::Result<Option<Value>> {
    conn.query_row(
        &format!("{} WHERE c.id = ?", COMPLAINT_SELECT),
        [id],
        complaint_from_row,
    )
    .optional()
}

// --- quiz attempts ---

const ATTEMPT_SELECT: &str = "SELECT a.id, a.student_id, a.subject, a.score, a.total_questions,
        a.accuracy, a.time_taken_seconds, a.details, a.attempted_at, s.name
     FROM quiz_attempts a
     JOIN students s ON s.id = a.student_id";

fn attempt_from_row(r: &Row) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, i64>(0)?,
        "student_id": r.get::<_, String>(1)?,
        "subject": r.get::<_, String>(2)?,
        "score": r.get::<_, i64>(3)?,
        "total_questions": r.get::<_, i64>(4)?,
        "accuracy": r.get::<_, f64>(5)?,
        "time_taken_seconds": r.get::<_, i64>(6)?,
        "details": parse_json_column(r.get(7)?),
        "attempted_at": r.get::<_, String>(8)?,
    }))
}

/// Newest first; attempts logged in the same instant fall back to insertion order.
pub fn attempts_for_student(conn: &Connection, student_id: &str) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE a.student_id = ? ORDER BY a.attempted_at DESC, a.id DESC",
        ATTEMPT_SELECT
    ))?;
    let rows = stmt.query_map([student_id], attempt_from_row)?;
    rows.collect()
}

/// Admin listing: every attempt with the student's name alongside.
pub fn list_attempts(conn: &Connection) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY a.id", ATTEMPT_SELECT))?;
    let rows = stmt.query_map([], |r| {
        let mut v = attempt_from_row(r)?;
        v["student_name"] = json!(r.get::<_, String>(9)?);
        Ok(v)
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, seed};

    fn seeded() -> Connection {
        let conn = db::open_in_memory().expect("open");
        seed::reset_and_seed(&conn).expect("seed");
        conn
    }

    #[test]
    fn student_details_carry_dashboard_fields() {
        let conn = seeded();
        let s = find_student(&conn, "S002").unwrap().expect("S002");
        let d = student_details(&conn, &s).unwrap();
        assert_eq!(d["class_name"], json!("10A"));
        assert_eq!(d["overallAverage"], json!("66.0"));
        assert_eq!(d["lowestSubject"], json!({"subject": "Science", "score": 55}));
        assert_eq!(d["highestSubject"], json!({"subject": "Arts", "score": 80}));
        assert_eq!(d["parentIds"], json!(["P002"]));
        assert_eq!(d["quizzesTaken"], json!(0));
        assert!(d.get("password_hash").is_none());
    }

    #[test]
    fn marks_keep_subject_order() {
        let conn = seeded();
        let s = find_student(&conn, "S001").unwrap().expect("S001");
        let keys: Vec<&String> = s.marks.as_ref().unwrap().as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Math", "Science", "English", "History", "Arts"]);
    }

    #[test]
    fn topper_is_charlie() {
        let conn = seeded();
        let t = topper(&conn).unwrap().expect("topper");
        assert_eq!(t.id, "S003");
    }

    #[test]
    fn relationships_follow_link_order() {
        let conn = seeded();
        let ids: Vec<String> = children_of_parent(&conn, "P001")
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["S001", "S004"]);
        assert_eq!(class_names_for_teacher(&conn, "T001").unwrap(), ["10A", "10B"]);
    }
}
