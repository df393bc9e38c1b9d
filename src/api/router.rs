use super::handlers;
use super::types::{AppState, Request};
use crate::api::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::dashboard::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::doubts::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::complaints::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::quiz::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::ai::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::admin::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::maintenance::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
