use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reschedular_common::config::LogFormat;
use reschedular_common::file_config::load_config;
use reschedular_common::{AppConfig, FileConfig, SystemClock, UuidGenerator};
use reschedular_engine::{
    Broker, Deps, Dispatcher, DispatcherConfig, EventQueue, HttpBroker, LogBroker, Reschedular,
};
use reschedular_server::routes::{self, AppState};
use reschedular_server::shutdown::shutdown_signal;
use reschedular_store::{MemoryRecordStore, PgRecordStore, RecordStore};

#[derive(Parser)]
#[command(name = "reschedular-server", about = "Questionnaire recurrence scheduler")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, env = "CONFIG_PATH", default_value = "config/reschedular.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = AppConfig::from_env().context("Failed to read environment")?;
    init_tracing(config.log_format)?;

    let cli = Cli::parse();
    config.log_redacted();

    let file_config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
        FileConfig::default()
    };

    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => Arc::new(
            PgRecordStore::connect(url)
                .await
                .context("Failed to connect to Postgres")?,
        ),
        None => {
            warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let broker: Arc<dyn Broker> = match &config.broker_url {
        Some(url) => Arc::new(HttpBroker::new(url.clone(), config.broker_token.clone())),
        None => {
            warn!("BROKER_URL not set, outbound events will only be logged");
            Arc::new(LogBroker)
        }
    };

    let queue = EventQueue::with_capacity(file_config.dispatcher.queue_capacity);
    let dispatcher = Dispatcher::new(
        queue.clone(),
        broker,
        DispatcherConfig::from(&file_config.dispatcher),
    )
    .start();

    let engine = Reschedular::new(Deps::new(
        store,
        Arc::new(SystemClock),
        Arc::new(UuidGenerator),
        queue,
    ));

    let (fatal_tx, fatal_rx) = watch::channel(false);
    let app = routes::build_router(AppState::new(
        engine,
        file_config.server.request_timeout(),
        fatal_tx,
    ));

    let addr = format!("{}:{}", file_config.server.host, file_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "reschedular-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fatal_rx.clone()))
        .await
        .context("HTTP server failed")?;

    dispatcher
        .shutdown()
        .await
        .context("Dispatcher task panicked")?;

    if *fatal_rx.borrow() {
        error!("Stopped after an unrecoverable handling error");
        return Ok(ExitCode::FAILURE);
    }

    info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("reschedular=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}
