use crate::api::error::{respond, HandlerErr};
use crate::api::types::{AppState, Request};
use crate::seed;
use serde_json::{json, Value};

fn seed_database(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let Some(expected) = state.settings.seeding_secret.as_deref() else {
        return Err(HandlerErr::new(
            "not_configured",
            "Seeding key is not configured on the server.",
        ));
    };
    let provided = params.get("secret").and_then(|v| v.as_str()).unwrap_or("");
    if provided != expected {
        tracing::warn!("seed request rejected: bad secret");
        return Err(HandlerErr::new("forbidden", "Invalid secret key provided."));
    }

    let conn = state.conn()?;
    tracing::info!("database seeding initiated by request");
    let summary = seed::reset_and_seed(conn).map_err(|e| {
        tracing::error!(error = %e, "seeding failed");
        HandlerErr::new("seed_failed", format!("An error occurred: {e:#}"))
    })?;

    Ok(json!({
        "message": "Database has been seeded successfully!",
        "classes": summary.classes,
        "teachers": summary.teachers,
        "parents": summary.parents,
        "students": summary.students
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "maintenance.seed" => Some(respond(&req.id, seed_database(state, &req.params))),
        _ => None,
    }
}
