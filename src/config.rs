use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// Student360 school backend: JSON-lines sidecar, HTTP API and seeding tool.
#[derive(Debug, Parser)]
#[command(name = "student360d", version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer JSON-lines requests on stdin/stdout (the default).
    Stdio,
    /// Serve the REST API over HTTP.
    Serve(ServeArgs),
    /// Drop every table and load the demo data set.
    Seed,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address the HTTP server listens on.
    #[arg(long, env = "STUDENT360_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Frontend directory served for non-API paths.
    #[arg(long, env = "STUDENT360_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct SettingsArgs {
    /// SQLite database file. Accepts `sqlite://` URLs.
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database: Option<String>,

    /// Shared secret unlocking the remote seed request.
    #[arg(long, env = "SEEDING_SECRET", global = true, hide_env_values = true)]
    pub seeding_secret: Option<String>,

    /// API key for the AI proxy.
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_API_URL", global = true, default_value = DEFAULT_GEMINI_URL)]
    pub gemini_url: String,

    /// Admin session lifetime in seconds.
    #[arg(long, env = "ADMIN_SESSION_TTL_SECS", global = true, default_value_t = 43_200)]
    pub session_ttl_secs: i64,
}

/// Resolved runtime settings shared by every request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: Option<PathBuf>,
    pub seeding_secret: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_url: String,
    pub session_ttl_secs: i64,
}

impl Settings {
    pub fn from_args(args: &SettingsArgs) -> Self {
        Self {
            database_path: args.database.as_deref().map(database_path_from_url),
            seeding_secret: non_empty(args.seeding_secret.as_deref()),
            gemini_api_key: non_empty(args.gemini_api_key.as_deref()),
            gemini_url: args.gemini_url.clone(),
            session_ttl_secs: args.session_ttl_secs.max(1),
        }
    }

    /// Database path for commands that cannot run without one.
    pub fn database_path_or_default(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("database.db"))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            seeding_secret: None,
            gemini_api_key: None,
            gemini_url: DEFAULT_GEMINI_URL.to_string(),
            session_ttl_secs: 43_200,
        }
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// `sqlite:///database.db` and `sqlite://database.db` both name `database.db`.
pub fn database_path_from_url(raw: &str) -> PathBuf {
    let t = raw.trim();
    let stripped = t
        .strip_prefix("sqlite:///")
        .or_else(|| t.strip_prefix("sqlite://"))
        .or_else(|| t.strip_prefix("sqlite:"))
        .unwrap_or(t);
    PathBuf::from(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_are_reduced_to_paths() {
        assert_eq!(
            database_path_from_url("sqlite:///database.db"),
            PathBuf::from("database.db")
        );
        assert_eq!(
            database_path_from_url("sqlite://data/school.db"),
            PathBuf::from("data/school.db")
        );
        assert_eq!(
            database_path_from_url("/var/lib/s360.db"),
            PathBuf::from("/var/lib/s360.db")
        );
    }

    #[test]
    fn blank_secrets_count_as_unset() {
        let cli = Cli::parse_from([
            "student360d",
            "--seeding-secret",
            "  ",
            "--gemini-api-key",
            "k",
            "seed",
        ]);
        let settings = Settings::from_args(&cli.settings);
        assert_eq!(settings.seeding_secret, None);
        assert_eq!(settings.gemini_api_key.as_deref(), Some("k"));
        assert!(matches!(cli.command, Some(Command::Seed)));
    }
}
