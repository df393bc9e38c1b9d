mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("student360-router-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["databasePath"], json!(null));
    assert!(health["version"].as_str().is_some());

    // Every data method needs a database first.
    for (i, method) in [
        "auth.login",
        "teacher.dashboard",
        "student.doubts",
        "parent.complaints",
        "student.quizHistory",
    ]
    .iter()
    .enumerate()
    {
        let e = request_err(&mut stdin, &mut reader, &format!("nodb-{i}"), method, json!({}));
        assert_eq!(error_code(&e), "no_database", "{}", method);
    }

    let unknown = request_err(&mut stdin, &mut reader, "2", "grades.export", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    let missing_path = request_err(&mut stdin, &mut reader, "3", "database.open", json!({}));
    assert_eq!(error_code(&missing_path), "bad_params");

    let db_path = workspace.join("school.db");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "database.open",
        json!({ "path": db_path.to_string_lossy() }),
    );
    let health = request_ok(&mut stdin, &mut reader, "5", "health", json!({}));
    assert_eq!(health["databasePath"], json!(db_path.to_string_lossy()));
    assert!(db_path.is_file());

    let rows = request_ok(&mut stdin, &mut reader, "6", "teacher.dashboard", json!({}));
    assert_eq!(rows, json!([]));

    // Garbage lines get a bad_json reply and the loop keeps going.
    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let reply: serde_json::Value = serde_json::from_str(line.trim()).expect("json reply");
    assert_eq!(reply["ok"], json!(false));
    assert_eq!(reply["error"]["code"], json!("bad_json"));

    let _ = request_ok(&mut stdin, &mut reader, "7", "health", json!({}));
}
