mod api;
mod auth;
mod calc;
mod config;
mod db;
mod http;
mod records;
mod seed;

use anyhow::Context;
use clap::Parser;
use config::{Cli, Command, Settings};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    // stdout carries protocol traffic in stdio mode, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
}

fn run_stdio(settings: Settings) -> anyhow::Result<()> {
    let preopen = settings.database_path.clone();
    let mut state = api::AppState::new(settings);
    if let Some(path) = preopen {
        api::open_database(&mut state, &path)?;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<api::Request>(&line) {
            Ok(req) => api::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                // No id to echo back.
                api::error::err("", "bad_json", e.to_string(), None)
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    Ok(())
}

fn run_serve(settings: Settings, args: config::ServeArgs) -> anyhow::Result<()> {
    let path = settings.database_path_or_default();
    let mut state = api::AppState::new(settings);
    api::open_database(&mut state, &path)?;
    async_std::task::block_on(http::serve(state, args.bind, args.static_dir))
}

fn run_seed(settings: Settings) -> anyhow::Result<()> {
    let path = settings.database_path_or_default();
    let conn = db::open_db(&path)?;
    let summary = seed::reset_and_seed(&conn)
        .with_context(|| format!("failed to seed {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        classes = summary.classes,
        teachers = summary.teachers,
        parents = summary.parents,
        students = summary.students,
        "seed complete"
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();
    let settings = Settings::from_args(&cli.settings);

    match cli.command.unwrap_or(Command::Stdio) {
        Command::Stdio => run_stdio(settings),
        Command::Serve(args) => run_serve(settings, args),
        Command::Seed => run_seed(settings),
    }
}
