use crate::api::error::{err, ok};
use crate::api::types::{AppState, Request};
use crate::db;
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "databasePath": state.database_path.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (creating if needed) the database at `path` and makes it current.
pub fn open_database(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    state.database_path = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(path = %path.display(), "database opened");
    Ok(())
}

fn handle_database_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_database(state, &path) {
        Ok(()) => ok(&req.id, json!({ "databasePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "database open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "database.open" => Some(handle_database_open(state, req)),
        _ => None,
    }
}
