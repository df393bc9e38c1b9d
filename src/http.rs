use crate::api::error::respond;
use crate::api::{ai_generate, handle_request, AppState, Request as RpcRequest};
use crate::config::Settings;
use async_std::task::spawn_blocking;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tide::{Body, Middleware, Next, Request, Response, StatusCode};

#[derive(Clone)]
pub struct Shared {
    state: Arc<Mutex<AppState>>,
    settings: Arc<Settings>,
    static_dir: Option<PathBuf>,
}

impl Shared {
    pub fn new(state: AppState, static_dir: Option<PathBuf>) -> Self {
        Self {
            settings: Arc::new(state.settings.clone()),
            state: Arc::new(Mutex::new(state)),
            static_dir,
        }
    }
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// Open CORS for `/api/*`: answers preflights and stamps `Access-Control-Allow-Origin: *`.
struct ApiCors;

#[tide::utils::async_trait]
impl Middleware<Shared> for ApiCors {
    async fn handle(&self, req: Request<Shared>, next: Next<'_, Shared>) -> tide::Result {
        if !is_api_path(req.url().path()) {
            return Ok(next.run(req).await);
        }
        let mut res = if req.method() == tide::http::Method::Options {
            let mut res = Response::new(StatusCode::Ok);
            res.insert_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS");
            let allow_headers = req
                .header("Access-Control-Request-Headers")
                .map(|v| v.last().as_str().to_string())
                .unwrap_or_else(|| "Content-Type, Authorization".to_string());
            res.insert_header("Access-Control-Allow-Headers", allow_headers);
            res.insert_header("Access-Control-Max-Age", "86400");
            res
        } else {
            next.run(req).await
        };
        res.insert_header("Access-Control-Allow-Origin", "*");
        Ok(res)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Text,
    Int,
}

/// How one route maps onto a router call.
#[derive(Debug, Clone)]
struct Rpc {
    method: String,
    path_param: Option<(&'static str, &'static str, Key)>,
    read_body: bool,
    created: bool,
}

impl Rpc {
    fn get(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path_param: None,
            read_body: false,
            created: false,
        }
    }

    fn post(method: impl Into<String>) -> Self {
        Self {
            read_body: true,
            ..Self::get(method)
        }
    }

    /// Copies route segment `segment` into params under `name`.
    fn param(mut self, segment: &'static str, name: &'static str, key: Key) -> Self {
        self.path_param = Some((segment, name, key));
        self
    }

    fn created(mut self) -> Self {
        self.created = true;
        self
    }
}

fn status_for(code: &str) -> StatusCode {
    match code {
        "bad_params" | "bad_json" => StatusCode::BadRequest,
        "unauthorized" => StatusCode::Unauthorized,
        "forbidden" => StatusCode::Forbidden,
        "not_found" | "not_implemented" => StatusCode::NotFound,
        "conflict" => StatusCode::Conflict,
        "no_database" => StatusCode::ServiceUnavailable,
        "upstream_failed" => StatusCode::BadGateway,
        _ => StatusCode::InternalServerError,
    }
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    let mut res = Response::new(status);
    res.set_body(Body::from_string(body.to_string()));
    res.set_content_type(tide::http::mime::JSON);
    res
}

fn error_response(code: &str, message: &str, details: Option<Value>) -> Response {
    let mut body = json!({ "success": false, "code": code, "message": message });
    if let Some(d) = details {
        body["details"] = d;
    }
    json_response(status_for(code), &body)
}

/// Turns a router envelope into the HTTP reply.
fn envelope_response(envelope: Value, created: bool) -> Response {
    if envelope.get("ok").and_then(Value::as_bool) == Some(true) {
        let mut result = envelope.get("result").cloned().unwrap_or(Value::Null);
        if let Some(obj) = result.as_object_mut() {
            obj.insert("success".to_string(), Value::Bool(true));
        }
        let status = if created {
            StatusCode::Created
        } else {
            StatusCode::Ok
        };
        return json_response(status, &result);
    }

    let error = envelope.get("error").cloned().unwrap_or_else(|| json!({}));
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("internal_error");
    let message = error.get("message").and_then(Value::as_str).unwrap_or("");
    error_response(code, message, error.get("details").cloned())
}

async fn read_params(req: &mut Request<Shared>) -> Result<Map<String, Value>, Response> {
    let body = req
        .body_string()
        .await
        .map_err(|e| error_response("bad_json", &e.to_string(), None))?;
    if body.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(error_response("bad_json", "request body must be a JSON object", None)),
        Err(e) => Err(error_response("bad_json", &e.to_string(), None)),
    }
}

fn path_value(req: &Request<Shared>, segment: &str, key: Key) -> Option<Value> {
    let raw = req.param(segment).ok()?;
    match key {
        Key::Text => Some(Value::String(raw.to_string())),
        Key::Int => raw.parse::<i64>().ok().map(Value::from),
    }
}

fn bearer_token(req: &Request<Shared>) -> Option<String> {
    let header = req.header("Authorization")?.last().as_str();
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

async fn run(shared: &Shared, method: String, params: Value) -> Value {
    let state = shared.state.clone();
    let request = RpcRequest::new("http", method, params);
    spawn_blocking(move || {
        let mut guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        handle_request(&mut guard, request)
    })
    .await
}

async fn call(mut req: Request<Shared>, rpc: Rpc) -> tide::Result {
    let mut params = if rpc.read_body {
        match read_params(&mut req).await {
            Ok(p) => p,
            Err(res) => return Ok(res),
        }
    } else {
        Map::new()
    };

    if let Some((segment, name, key)) = rpc.path_param {
        let Some(value) = path_value(&req, segment, key) else {
            return Ok(error_response("not_found", "not found", None));
        };
        params.insert(name.to_string(), value);
    }
    if let Some(token) = bearer_token(&req) {
        params.insert("token".to_string(), Value::String(token));
    }

    tracing::debug!(method = %rpc.method, path = %req.url().path(), "dispatching");
    let envelope = run(req.state(), rpc.method, Value::Object(params)).await;
    Ok(envelope_response(envelope, rpc.created))
}

/// Awaits the AI call against the settings snapshot. Never takes the state lock.
async fn gemini_proxy(mut req: Request<Shared>) -> tide::Result {
    let params = match read_params(&mut req).await {
        Ok(p) => p,
        Err(res) => return Ok(res),
    };
    let settings = req.state().settings.clone();
    let result = ai_generate(&settings, &Value::Object(params)).await;
    Ok(envelope_response(respond("http", result), false))
}

async fn api_not_found(_req: Request<Shared>) -> tide::Result {
    Ok(error_response("not_found", "not found", None))
}

/// URL segment, router entity name, and id kind for each admin collection.
const ADMIN_ENTITIES: &[(&str, &str, Key)] = &[
    ("teachers", "teachers", Key::Text),
    ("students", "students", Key::Text),
    ("parents", "parents", Key::Text),
    ("admins", "admins", Key::Int),
    ("classes", "classes", Key::Int),
    ("complaints", "complaints", Key::Int),
    ("quiz-attempts", "quizAttempts", Key::Int),
];

async fn admin_entity(req: Request<Shared>, verb: &'static str, with_id: bool) -> tide::Result {
    let segment = req.param("entity").unwrap_or("");
    let Some((_, entity, key)) = ADMIN_ENTITIES.iter().find(|(s, _, _)| *s == segment) else {
        return Ok(error_response("not_found", "unknown admin collection", None));
    };
    let method = format!("admin.{}.{}", entity, verb);
    let mut rpc = if verb == "list" {
        Rpc::get(method)
    } else {
        Rpc::post(method)
    };
    if with_id {
        rpc = rpc.param("id", "id", *key);
    }
    call(req, rpc).await
}

fn safe_join(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(out)
}

/// Serves files from the static dir, falling back to `index.html` for client-side routes.
async fn serve_static(req: Request<Shared>) -> tide::Result {
    if is_api_path(req.url().path()) {
        return Ok(error_response("not_found", "not found", None));
    }
    let Some(dir) = req.state().static_dir.clone() else {
        return Ok(Response::new(StatusCode::NotFound));
    };
    let rel = req.param("path").unwrap_or("");
    let file = match safe_join(&dir, rel) {
        Some(p) if p.is_file() => p,
        _ => dir.join("index.html"),
    };
    if !file.is_file() {
        return Ok(Response::new(StatusCode::NotFound));
    }
    let mut res = Response::new(StatusCode::Ok);
    res.set_body(Body::from_file(async_std::path::PathBuf::from(file)).await?);
    Ok(res)
}

pub fn build_app(shared: Shared) -> tide::Server<Shared> {
    let mut app = tide::with_state(shared);
    app.with(ApiCors);
    app.at("/api/health")
        .get(|req: Request<Shared>| call(req, Rpc::get("health")));
    app.at("/api/login")
        .post(|req: Request<Shared>| call(req, Rpc::post("auth.login")));
    app.at("/api/teacher/dashboard")
        .get(|req: Request<Shared>| call(req, Rpc::get("teacher.dashboard")));
    app.at("/api/parent/children/:parent_id").get(|req: Request<Shared>| {
        call(
            req,
            Rpc::get("parent.children").param("parent_id", "parent_id", Key::Text),
        )
    });
    app.at("/api/student/ask-doubt")
        .post(|req: Request<Shared>| call(req, Rpc::post("student.askDoubt")));
    app.at("/api/teacher/doubts/:teacher_id").get(|req: Request<Shared>| {
        call(
            req,
            Rpc::get("teacher.doubts").param("teacher_id", "teacher_id", Key::Text),
        )
    });
    app.at("/api/doubts/resolve/:doubt_id").post(|req: Request<Shared>| {
        call(
            req,
            Rpc::post("doubts.resolve").param("doubt_id", "doubt_id", Key::Int),
        )
    });
    app.at("/api/doubts/answer/:doubt_id").post(|req: Request<Shared>| {
        call(
            req,
            Rpc::post("doubts.answer").param("doubt_id", "doubt_id", Key::Int),
        )
    });
    app.at("/api/student/doubts/:student_id").get(|req: Request<Shared>| {
        call(
            req,
            Rpc::get("student.doubts").param("student_id", "student_id", Key::Text),
        )
    });
    app.at("/api/student/teachers/:student_id").get(|req: Request<Shared>| {
        call(
            req,
            Rpc::get("student.teachers").param("student_id", "student_id", Key::Text),
        )
    });
    app.at("/api/gemini-proxy").post(gemini_proxy);
    app.at("/api/parent/complaints/:parent_id").get(|req: Request<Shared>| {
        call(
            req,
            Rpc::get("parent.complaints").param("parent_id", "parent_id", Key::Text),
        )
    });
    app.at("/api/teacher/complaint")
        .post(|req: Request<Shared>| call(req, Rpc::post("teacher.complaint")));
    app.at("/api/student/quiz/attempt").post(|req: Request<Shared>| {
        call(req, Rpc::post("student.quizAttempt").created())
    });
    app.at("/api/student/quiz/history/:student_id").get(|req: Request<Shared>| {
        call(
            req,
            Rpc::get("student.quizHistory").param("student_id", "student_id", Key::Text),
        )
    });
    app.at("/api/seed-database/:secret").get(|req: Request<Shared>| {
        call(
            req,
            Rpc::get("maintenance.seed").param("secret", "secret", Key::Text),
        )
    });
    app.at("/api").all(api_not_found);
    app.at("/api/*rest").all(api_not_found);

    app.at("/admin/api/login")
        .post(|req: Request<Shared>| call(req, Rpc::post("admin.login")));
    app.at("/admin/api/logout")
        .post(|req: Request<Shared>| call(req, Rpc::post("admin.logout")));
    app.at("/admin/api/me")
        .get(|req: Request<Shared>| call(req, Rpc::get("admin.me")));
    app.at("/admin/api/:entity")
        .get(|req: Request<Shared>| admin_entity(req, "list", false))
        .post(|req: Request<Shared>| admin_entity(req, "create", false));
    app.at("/admin/api/:entity/:id")
        .put(|req: Request<Shared>| admin_entity(req, "update", true))
        .delete(|req: Request<Shared>| admin_entity(req, "delete", true));

    app.at("/").get(serve_static);
    app.at("/*path").get(serve_static);
    app
}

pub async fn serve(state: AppState, bind: SocketAddr, static_dir: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(dir) = &static_dir {
        tracing::info!(dir = %dir.display(), "serving static files");
    }
    let app = build_app(Shared::new(state, static_dir));
    tracing::info!(%bind, "listening");
    app.listen(bind.to_string()).await?;
    Ok(())
}
