mod test_support;

use async_std::task::sleep;
use portpicker::pick_unused_port;
use serde_json::{json, Value};
use std::path::Path;
use std::process::{Child, Stdio};
use std::time::Duration;
use surf::{http::Method, Client, StatusCode};
use test_support::{daemon, seed_db, spawn_ai_upstream, temp_dir, AI_REPLY, SEED_SECRET};

/// A `serve` process that is killed when dropped.
struct Server {
    child: Child,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_server(port: u16, db: &Path, static_dir: &Path) -> Server {
    start_server_with(port, db, static_dir, &[])
}

fn start_server_with(port: u16, db: &Path, static_dir: &Path, extra: &[&str]) -> Server {
    let child = daemon()
        .arg("serve")
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--static-dir")
        .arg(static_dir)
        .arg("--database")
        .arg(db)
        .arg("--seeding-secret")
        .arg(SEED_SECRET)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn student360d serve");
    Server { child }
}

async fn wait_for_server(client: &Client) {
    const MAX_CONNECT_RETRIES: usize = 100;

    for _ in 0..MAX_CONNECT_RETRIES {
        if let Ok(mut res) = client.get("/api/health").await {
            let _ = res.body_bytes().await;
            if res.status() == StatusCode::Ok {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for server");
}

async fn send(req: surf::RequestBuilder) -> (StatusCode, Value) {
    let mut res = req.await.expect("send request");
    let body: Value = res.body_json().await.expect("json body");
    (res.status(), body)
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[async_std::test]
async fn http_routes_map_router_results_onto_statuses() {
    let workspace = temp_dir("student360-http");
    let db = workspace.join("school.db");
    seed_db(&db);
    let static_dir = workspace.join("web");
    std::fs::create_dir_all(&static_dir).expect("static dir");
    std::fs::write(static_dir.join("index.html"), "<html>student360</html>").expect("index");
    std::fs::write(static_dir.join("app.js"), "console.log('hi');").expect("app.js");

    let port = pick_unused_port().expect("free port");
    let _server = start_server(port, &db, &static_dir);
    let client: Client = surf::Config::default()
        .set_base_url(format!("http://127.0.0.1:{port}").parse().expect("url"))
        .try_into()
        .expect("client");
    wait_for_server(&client).await;

    let (status, body) = send(client.get("/api/health")).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["success"], json!(true));
    assert!(body["version"].is_string());

    let (status, body) = send(
        client
            .post("/api/login")
            .body_json(&json!({ "username": "alice.j", "password": "bad", "role": "student" }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::Unauthorized);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("unauthorized"));
    assert_eq!(body["message"], json!("Invalid username or password"));

    let (status, body) = send(
        client
            .post("/api/login")
            .body_json(&json!({ "username": "alice.j", "password": "student123", "role": "student" }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["user"]["id"], json!("S001"));

    let (status, body) = send(client.get("/api/teacher/dashboard")).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body.as_array().expect("array").len(), 5);

    let (status, body) = send(client.get("/api/parent/children/P001")).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["children"].as_array().expect("children").len(), 2);
    assert_eq!(body["topper"]["id"], json!("S003"));

    let (status, body) = send(
        client
            .post("/api/student/quiz/attempt")
            .body_json(&json!({
                "student_id": "S001", "subject": "Math", "score": 3, "total_questions": 5,
                "accuracy": 60.0, "time_taken_seconds": 42, "details": { "questions": [] }
            }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::Created);
    assert_eq!(body["message"], json!("Quiz attempt saved successfully."));

    let (status, body) = send(client.get("/api/student/quiz/history/S001")).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["history"][0]["score"], json!(3));

    let (status, _) = send(client.post("/api/doubts/resolve/abc")).await;
    assert_eq!(status, StatusCode::NotFound);

    let (status, body) = send(
        client
            .post("/api/student/ask-doubt")
            .body_string("{oops".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(body["code"], json!("bad_json"));

    let (status, body) = send(client.get("/api/seed-database/wrong")).await;
    assert_eq!(status, StatusCode::Forbidden);
    assert_eq!(body["message"], json!("Invalid secret key provided."));

    let (status, body) = send(client.post("/api/gemini-proxy").body_json(&json!({ "prompt": "hi" })).expect("body")).await;
    assert_eq!(status, StatusCode::InternalServerError);
    assert_eq!(body["code"], json!("not_configured"));

    let (status, body) = send(client.get("/api/nope")).await;
    assert_eq!(status, StatusCode::NotFound);
    assert_eq!(body["code"], json!("not_found"));
}

#[async_std::test]
async fn cors_admin_and_static_routes() {
    let workspace = temp_dir("student360-http-admin");
    let db = workspace.join("school.db");
    seed_db(&db);
    let static_dir = workspace.join("web");
    std::fs::create_dir_all(static_dir.join("assets")).expect("static dir");
    std::fs::write(static_dir.join("index.html"), "<html>student360</html>").expect("index");
    std::fs::write(static_dir.join("assets").join("app.js"), "console.log('hi');").expect("app.js");

    let port = pick_unused_port().expect("free port");
    let _server = start_server(port, &db, &static_dir);
    let client: Client = surf::Config::default()
        .set_base_url(format!("http://127.0.0.1:{port}").parse().expect("url"))
        .try_into()
        .expect("client");
    wait_for_server(&client).await;

    let preflight = client
        .request(Method::Options, "/api/login")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .await
        .expect("preflight");
    assert!(preflight.status().is_success());
    assert_eq!(
        preflight
            .header("Access-Control-Allow-Origin")
            .map(|v| v.last().as_str().to_string()),
        Some("*".to_string())
    );

    let health = client
        .get("/api/health")
        .header("Origin", "http://localhost:5173")
        .await
        .expect("health");
    assert_eq!(health.status(), StatusCode::Ok);
    assert_eq!(
        health
            .header("Access-Control-Allow-Origin")
            .map(|v| v.last().as_str().to_string()),
        Some("*".to_string())
    );

    let (status, body) = send(client.get("/admin/api/teachers")).await;
    assert_eq!(status, StatusCode::Unauthorized);
    assert_eq!(body["success"], json!(false));

    let (status, body) = send(
        client
            .post("/admin/api/login")
            .body_json(&json!({ "username": "admin", "password": "admin" }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    let token = body["token"].as_str().expect("token").to_string();

    let (status, body) = send(client.get("/admin/api/teachers").header("Authorization", bearer(&token))).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["teachers"].as_array().expect("teachers").len(), 2);

    let (status, body) = send(
        client
            .post("/admin/api/classes")
            .header("Authorization", bearer(&token))
            .body_json(&json!({ "name": "12A" }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    let class_id = body["class"]["id"].as_i64().expect("class id");

    let (status, body) = send(
        client
            .put(format!("/admin/api/classes/{class_id}"))
            .header("Authorization", bearer(&token))
            .body_json(&json!({ "name": "12B" }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["class"]["name"], json!("12B"));

    let (status, _) = send(
        client
            .put("/admin/api/classes/twelve")
            .header("Authorization", bearer(&token))
            .body_json(&json!({ "name": "x" }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::NotFound);

    let (status, _) = send(client.get("/admin/api/widgets").header("Authorization", bearer(&token))).await;
    assert_eq!(status, StatusCode::NotFound);

    let (status, body) = send(
        client
            .delete("/admin/api/students/S001")
            .header("Authorization", bearer(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["success"], json!(true));

    let (status, body) = send(
        client
            .delete(format!("/admin/api/classes/{class_id}"))
            .header("Authorization", bearer(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["success"], json!(true));

    let mut asset = client.get("/assets/app.js").await.expect("asset");
    assert_eq!(asset.status(), StatusCode::Ok);
    assert_eq!(asset.body_string().await.expect("asset body"), "console.log('hi');");

    let mut spa = client.get("/parent/dashboard").await.expect("spa route");
    assert_eq!(spa.status(), StatusCode::Ok);
    assert_eq!(spa.body_string().await.expect("spa body"), "<html>student360</html>");
}

#[async_std::test]
async fn gemini_proxy_forwards_upstream_replies_without_blocking_other_routes() {
    let workspace = temp_dir("student360-http-ai");
    let db = workspace.join("school.db");
    seed_db(&db);
    let static_dir = workspace.join("web");
    std::fs::create_dir_all(&static_dir).expect("static dir");

    let upstream = spawn_ai_upstream();
    let port = pick_unused_port().expect("free port");
    let _server = start_server_with(
        port,
        &db,
        &static_dir,
        &["--gemini-api-key", "test-key", "--gemini-url", &upstream],
    );
    let client: Client = surf::Config::default()
        .set_base_url(format!("http://127.0.0.1:{port}").parse().expect("url"))
        .try_into()
        .expect("client");
    wait_for_server(&client).await;

    let (status, body) = send(
        client
            .post("/api/gemini-proxy")
            .body_json(&json!({ "prompt": "Explain photosynthesis." }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["candidates"][0]["content"]["parts"][0]["text"], json!(AI_REPLY));
    assert_eq!(body["received"]["key"], json!("test-key"));
    assert_eq!(
        body["received"]["body"],
        json!({ "contents": [{ "parts": [{ "text": "Explain photosynthesis." }] }] })
    );

    let (status, body) = send(
        client
            .post("/api/gemini-proxy")
            .body_json(&json!({ "prompt": "quota" }))
            .expect("body"),
    )
    .await;
    assert_eq!(status, StatusCode::BadGateway);
    assert_eq!(body["code"], json!("upstream_failed"));
    assert_eq!(body["details"]["error"]["message"], json!("Quota exceeded."));

    // The upstream never answers this one; it stays in flight for the rest of the test.
    let stalled = client.clone();
    async_std::task::spawn(async move {
        let req = stalled
            .post("/api/gemini-proxy")
            .body_json(&json!({ "prompt": "hang" }))
            .expect("body");
        let _ = req.await;
    });
    sleep(Duration::from_millis(300)).await;

    let login = send(
        client
            .post("/api/login")
            .body_json(&json!({ "username": "alice.j", "password": "student123", "role": "student" }))
            .expect("body"),
    );
    let (status, body) = async_std::future::timeout(Duration::from_secs(3), login)
        .await
        .expect("login answered while an AI call was pending");
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["user"]["id"], json!("S001"));
}
