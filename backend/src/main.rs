use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sqltools_service::{AppState, build_router, config::Config};

#[derive(Parser)]
#[command(name = "sqltools-service")]
#[command(about = "SQL Server execution plan service")]
struct Args {
    /// Configuration file (defaults to conf/config.toml, then config.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let config = Config::load(args.config.as_deref())?;
    // Dropping the guard stops the file writer
    let _guard = init_logging(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("sqltools-service listening on http://{}", addr);
    tracing::info!("API docs at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Console output plus a daily-rolling file when `logging.file` is set
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    // RUST_LOG takes precedence over logging.level
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let mut layers = Vec::new();
    layers.push(fmt::layer().with_target(true).with_filter(env_filter()).boxed());

    let guard = match &config.logging.file {
        Some(file) => {
            let path = std::path::Path::new(file);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("sqltools-service.log");
            std::fs::create_dir_all(dir)?;

            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(env_filter())
                    .boxed(),
            );
            Some(guard)
        },
        None => None,
    };

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}
