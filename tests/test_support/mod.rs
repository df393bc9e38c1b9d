#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const SEED_SECRET: &str = "test-seed-secret";

const SCRUBBED_ENV: &[&str] = &[
    "DATABASE_URL",
    "SEEDING_SECRET",
    "GEMINI_API_KEY",
    "GEMINI_API_URL",
    "ADMIN_SESSION_TTL_SECS",
    "STUDENT360_BIND",
    "STUDENT360_STATIC_DIR",
];

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// The daemon binary with a clean configuration environment.
pub fn daemon() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_student360d"));
    for var in SCRUBBED_ENV {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

pub fn seed_db(path: &Path) {
    let status = daemon()
        .arg("seed")
        .arg("--database")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run seed");
    assert!(status.success(), "seed command failed for {}", path.display());
}

pub fn spawn_sidecar_with(args: &[&str]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let mut child = daemon()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn student360d");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with(&[])
}

/// Seeds a fresh database under `prefix` and starts a sidecar on it.
pub fn seeded_sidecar(prefix: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let db = temp_dir(prefix).join("student360.db");
    seed_db(&db);
    spawn_sidecar_with(&["--database", db.to_str().expect("utf-8 path")])
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Expects a failure and returns the `error` object.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or(serde_json::Value::Null)
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

pub const AI_REPLY: &str = "Plants turn light into sugar.";

/// Fake generateContent handler. The prompt `quota` gets a 429 JSON error and `hang`
/// never gets an answer. Anything else echoes the key and body it received.
async fn fake_generate(mut req: tide::Request<()>) -> tide::Result {
    let key = req
        .url()
        .query_pairs()
        .find(|(k, _)| k == "key")
        .map(|(_, v)| v.into_owned());
    let body: serde_json::Value = req.body_json().await?;
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("").to_string();

    match prompt.as_str() {
        "hang" => {
            async_std::future::pending::<()>().await;
            Ok(tide::Response::new(200))
        }
        "quota" => {
            let mut res = tide::Response::new(429);
            res.set_body(tide::Body::from_json(
                &json!({ "error": { "code": 429, "message": "Quota exceeded." } }),
            )?);
            Ok(res)
        }
        _ => {
            let mut res = tide::Response::new(200);
            res.set_body(tide::Body::from_json(&json!({
                "candidates": [{ "content": { "parts": [{ "text": AI_REPLY }] } }],
                "received": { "key": key, "body": body },
            }))?);
            Ok(res)
        }
    }
}

/// Starts the fake AI service on a free port and returns its generate URL.
pub fn spawn_ai_upstream() -> String {
    let port = portpicker::pick_unused_port().expect("free port");
    let mut app = tide::new();
    app.at("/v1/generate").post(fake_generate);
    async_std::task::spawn(app.listen(format!("127.0.0.1:{port}")));

    for _ in 0..100 {
        if std::net::TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return format!("http://127.0.0.1:{port}/v1/generate");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("fake AI service did not start");
}
