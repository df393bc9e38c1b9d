use anyhow::Context;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::{auth, db};

struct SeedTeacher {
    id: &'static str,
    name: &'static str,
    username: &'static str,
    password: &'static str,
    class_names: &'static [&'static str],
}

struct SeedParent {
    id: &'static str,
    name: &'static str,
    username: &'static str,
    password: &'static str,
}

struct SeedStudent {
    id: &'static str,
    name: &'static str,
    username: &'static str,
    password: &'static str,
    class_name: &'static str,
    attendance: i64,
    parent_ids: &'static [&'static str],
}

const CLASSES: &[&str] = &["10A", "10B", "11A"];

const TEACHERS: &[SeedTeacher] = &[
    SeedTeacher {
        id: "T001",
        name: "Mr. David Lee",
        username: "david.l",
        password: "teacher123",
        class_names: &["10A", "10B"],
    },
    SeedTeacher {
        id: "T002",
        name: "Ms. Sarah Chen",
        username: "sarah.c",
        password: "teacher456",
        class_names: &["11A"],
    },
];

const PARENTS: &[SeedParent] = &[
    SeedParent {
        id: "P001",
        name: "Mrs. Johnson",
        username: "mrs.j",
        password: "parent123",
    },
    SeedParent {
        id: "P002",
        name: "Mr. Smith",
        username: "mr.s",
        password: "parent123",
    },
    SeedParent {
        id: "P003",
        name: "Mrs. Brown",
        username: "mrs.b",
        password: "parent123",
    },
];

const STUDENTS: &[SeedStudent] = &[
    SeedStudent {
        id: "S001",
        name: "Alice Johnson",
        username: "alice.j",
        password: "student123",
        class_name: "10A",
        attendance: 88,
        parent_ids: &["P001"],
    },
    SeedStudent {
        id: "S002",
        name: "Bob Smith",
        username: "bob.s",
        password: "student123",
        class_name: "10A",
        attendance: 70,
        parent_ids: &["P002"],
    },
    SeedStudent {
        id: "S003",
        name: "Charlie Brown",
        username: "charlie.b",
        password: "student123",
        class_name: "10B",
        attendance: 98,
        parent_ids: &["P003"],
    },
    SeedStudent {
        id: "S004",
        name: "Diana Prince",
        username: "diana.p",
        password: "student123",
        class_name: "10B",
        attendance: 80,
        parent_ids: &["P001"],
    },
    SeedStudent {
        id: "S005",
        name: "Ethan Hunt",
        username: "ethan.h",
        password: "student123",
        class_name: "11A",
        attendance: 95,
        parent_ids: &["P002"],
    },
];

const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "admin";

/// Current and per-term marks for a seeded student, keyed by id.
fn marks_for(student_id: &str) -> (Value, Value) {
    match student_id {
        "S001" => (
            json!({"Math": 85, "Science": 72, "English": 90, "History": 78, "Arts": 95}),
            json!({"Math": [75, 80, 85], "Science": [68, 70, 72], "English": [85, 88, 90], "History": [70, 75, 78], "Arts": [90, 92, 95]}),
        ),
        "S002" => (
            json!({"Math": 60, "Science": 55, "English": 70, "History": 65, "Arts": 80}),
            json!({"Math": [80, 70, 60], "Science": [70, 60, 55], "English": [75, 72, 70], "History": [70, 68, 65], "Arts": [85, 82, 80]}),
        ),
        "S003" => (
            json!({"Math": 95, "Science": 92, "English": 98, "History": 90, "Arts": 99}),
            json!({"Math": [90, 93, 95], "Science": [88, 90, 92], "English": [95, 96, 98], "History": [85, 88, 90], "Arts": [95, 97, 99]}),
        ),
        "S004" => (
            json!({"Math": 70, "Science": 88, "English": 75, "History": 60, "Arts": 85}),
            json!({"Math": [85, 78, 70], "Science": [80, 85, 88], "English": [70, 72, 75], "History": [75, 68, 60], "Arts": [80, 82, 85]}),
        ),
        "S005" => (
            json!({"Math": 78, "Science": 82, "English": 85, "History": 88, "Arts": 90}),
            json!({"Math": [70, 75, 78], "Science": [80, 81, 82], "English": [82, 84, 85], "History": [85, 86, 88], "Arts": [88, 89, 90]}),
        ),
        _ => (json!({}), json!({})),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub classes: usize,
    pub teachers: usize,
    pub parents: usize,
    pub students: usize,
}

/// Drops every table, recreates the schema and loads the demo school.
///
/// Everything runs in one transaction, so a failure leaves the previous data in place.
pub fn reset_and_seed(conn: &Connection) -> anyhow::Result<SeedSummary> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start seed transaction")?;

    tracing::info!("dropping all tables");
    db::drop_all(&tx)?;
    tracing::info!("creating all tables");
    db::create_schema(&tx)?;

    tracing::info!("seeding classes");
    let mut class_ids: HashMap<&str, i64> = HashMap::new();
    for name in CLASSES {
        tx.execute("INSERT INTO classes(name) VALUES(?)", [name])
            .with_context(|| format!("failed to insert class {}", name))?;
        class_ids.insert(*name, tx.last_insert_rowid());
    }

    tracing::info!("seeding teachers and linking classes");
    for t in TEACHERS {
        tx.execute(
            "INSERT INTO teachers(id, name, username, password_hash) VALUES(?, ?, ?, ?)",
            (t.id, t.name, t.username, auth::hash_password(t.password)),
        )
        .with_context(|| format!("failed to insert teacher {}", t.id))?;
        for class_name in t.class_names {
            if let Some(class_id) = class_ids.get(class_name) {
                tx.execute(
                    "INSERT INTO teacher_class_link(teacher_id, class_id) VALUES(?, ?)",
                    (t.id, class_id),
                )?;
            }
        }
    }

    tracing::info!("seeding parents");
    for p in PARENTS {
        tx.execute(
            "INSERT INTO parents(id, name, username, password_hash) VALUES(?, ?, ?, ?)",
            (p.id, p.name, p.username, auth::hash_password(p.password)),
        )
        .with_context(|| format!("failed to insert parent {}", p.id))?;
    }

    tracing::info!("seeding students and linking parents");
    for s in STUDENTS {
        let class_id = class_ids
            .get(s.class_name)
            .copied()
            .with_context(|| format!("unknown class {} for {}", s.class_name, s.id))?;
        let (marks, historical) = marks_for(s.id);
        tx.execute(
            "INSERT INTO students(id, name, username, password_hash, class_id, attendance, marks, historical_marks)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                s.id,
                s.name,
                s.username,
                auth::hash_password(s.password),
                class_id,
                s.attendance,
                marks.to_string(),
                historical.to_string(),
            ),
        )
        .with_context(|| format!("failed to insert student {}", s.id))?;
        for parent_id in s.parent_ids {
            if PARENTS.iter().any(|p| p.id == *parent_id) {
                tx.execute(
                    "INSERT INTO parent_student_link(parent_id, student_id) VALUES(?, ?)",
                    (parent_id, s.id),
                )?;
            }
        }
    }

    tx.execute(
        "INSERT INTO admins(username, password_hash) VALUES(?, ?)",
        (ADMIN_USERNAME, auth::hash_password(ADMIN_PASSWORD)),
    )
    .context("failed to insert admin")?;

    tx.commit().context("failed to commit seed")?;
    tracing::info!("database has been seeded");

    Ok(SeedSummary {
        classes: CLASSES.len(),
        teachers: TEACHERS.len(),
        parents: PARENTS.len(),
        students: STUDENTS.len(),
    })
}
