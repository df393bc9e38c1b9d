use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::api::error::HandlerErr;
use crate::config::Settings;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

pub struct AppState {
    pub database_path: Option<PathBuf>,
    pub db: Option<Connection>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            database_path: None,
            db: None,
            settings,
        }
    }

    pub fn conn(&self) -> Result<&Connection, HandlerErr> {
        self.db.as_ref().ok_or_else(|| {
            HandlerErr::new("no_database", "open a database first")
        })
    }
}
