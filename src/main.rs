use anyhow::Result;
use clap::Parser;
use droidmon::{api, config, db};
use tracing::info;

/// droidmon — remote Android device metrics collection service.
#[derive(Parser, Debug)]
#[command(name = "droidmon", version, about)]
struct Cli {
    /// Address and port to listen on.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Path to the SQLite database file.
    #[arg(short, long, default_value = "droidmon.db")]
    db: String,

    /// Path to a TOML configuration file (optional).
    #[arg(short, long)]
    config: Option<String>,
}

const BANNER: &str = r#"
     _           _     _
  __| |_ __ ___ (_) __| |_ __ ___   ___  _ __
 / _` | '__/ _ \| |/ _` | '_ ` _ \ / _ \| '_ \
| (_| | | | (_) | | (_| | | | | | | (_) | | | |
 \__,_|_|  \___/|_|\__,_|_| |_| |_|\___/|_| |_|
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (logs).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "droidmon=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    println!("{BANNER}");
    info!(version = env!("CARGO_PKG_VERSION"), "Starting droidmon");

    // Load optional config file.
    let app_config = if let Some(ref path) = cli.config {
        config::AppConfig::from_file(path)?
    } else {
        config::AppConfig::default()
    };
    info!(
        adb_bin = %app_config.adb_bin,
        interval = app_config.sample_interval_secs,
        package = %app_config.app_package,
        "Configuration loaded"
    );

    // Initialize database and run migrations.
    let pool = db::init(&cli.db).await?;
    info!(path = %cli.db, "Database initialized");

    // Build shared application state (collector hub, gauge board, transport).
    let state = api::AppState::new(pool, app_config);

    // Build the application router.
    let app = api::router(state);

    // Start listening.
    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!(addr = %cli.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
