use crate::api::error::{respond, HandlerErr};
use crate::api::types::{AppState, Request};
use crate::config::Settings;
use serde_json::{json, Value};

fn upstream_failed(details: Value) -> HandlerErr {
    HandlerErr::new("upstream_failed", "Failed to communicate with the AI service.")
        .with_details(details)
}

/// Resolves the keyed endpoint and the request payload for a prompt.
fn prepare(settings: &Settings, params: &Value) -> Result<(surf::Url, Value), HandlerErr> {
    let Some(key) = settings.gemini_api_key.as_deref() else {
        return Err(HandlerErr::new(
            "not_configured",
            "API key not configured on the server.",
        ));
    };
    let prompt = params
        .get("prompt")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| HandlerErr::bad_params("No prompt provided."))?;

    let sep = if settings.gemini_url.contains('?') { '&' } else { '?' };
    let url = surf::Url::parse(&format!("{}{}key={}", settings.gemini_url, sep, key))
        .map_err(|e| HandlerErr::new("not_configured", format!("invalid AI endpoint: {e}")))?;
    let payload = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
    Ok((url, payload))
}

/// Forwards a prompt upstream. Needs only the settings, not the database.
pub async fn generate(settings: &Settings, params: &Value) -> Result<Value, HandlerErr> {
    let (url, payload) = prepare(settings, params)?;
    call_upstream(url, payload).await
}

async fn call_upstream(url: surf::Url, payload: Value) -> Result<Value, HandlerErr> {
    let host = url.host_str().unwrap_or("").to_string();
    let mut res = surf::post(url)
        .body_json(&payload)
        .map_err(|e| upstream_failed(json!(e.to_string())))?
        .await
        .map_err(|e| {
            tracing::error!(host = %host, error = %e, "AI request failed");
            upstream_failed(json!(e.to_string()))
        })?;

    let status = res.status();
    let body = res
        .body_string()
        .await
        .map_err(|e| upstream_failed(json!(e.to_string())))?;
    let parsed: Option<Value> = serde_json::from_str(&body).ok();

    if !status.is_success() {
        tracing::error!(host = %host, status = %status, "AI service returned an error");
        return Err(upstream_failed(parsed.unwrap_or_else(|| json!(body))));
    }
    parsed.ok_or_else(|| upstream_failed(json!("AI service returned a non-JSON body")))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "ai.generate" => Some(respond(
            &req.id,
            async_std::task::block_on(generate(&state.settings, &req.params)),
        )),
        _ => None,
    }
}
