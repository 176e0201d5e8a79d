use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing::Level;

use tracker_advisor::{AdvisorConfig, AdvisorGateway, GeminiAdvisor};
use tracker_store::Database;
use tracker_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "tracker", about = "Task tracker API server")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "TRACKER_PORT", default_value_t = 8080)]
    port: u16,

    /// Path to the SQLite database (defaults to ~/.tracker/tracker.db).
    #[arg(long, env = "TRACKER_DB")]
    db_path: Option<PathBuf>,

    /// Gemini API key. Without one, every advisory call degrades to its
    /// deterministic fallback and the server still works.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Ceiling for a single advisor call, in seconds.
    #[arg(long, env = "TRACKER_ADVISOR_TIMEOUT_SECS", default_value_t = 20)]
    advisor_timeout_secs: u64,

    /// Disable the SQLite warn+ log sink.
    #[arg(long, env = "TRACKER_NO_LOG_DB")]
    no_log_db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = home_dir().join(".tracker");
    let _telemetry = init_telemetry(TelemetryConfig {
        log_level: Level::INFO,
        log_to_sqlite: !cli.no_log_db,
        log_db_path: data_dir.join("logs.db"),
    });

    tracing::info!("starting tracker");

    let db_path = cli.db_path.unwrap_or_else(|| data_dir.join("tracker.db"));
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let api_key = cli.gemini_api_key.unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set, advisory operations will use fallbacks");
    }
    let advisor = GeminiAdvisor::new(AdvisorConfig::new(SecretString::from(api_key)));
    let gateway = Arc::new(AdvisorGateway::new(
        Arc::new(advisor),
        Duration::from_secs(cli.advisor_timeout_secs),
    ));

    let config = tracker_server::ServerConfig { port: cli.port };
    let handle = tracker_server::start(config, db, gateway)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "tracker ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    Ok(())
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
