use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use site_monitor::{
    config::{Config, NotificationConfig, StorageConfig, read_config_file},
    notify::{LogSink, NotificationSink, TelegramSink, WebhookSink},
    probe::HttpProber,
    registry::SchedulerRegistry,
    storage::{MemoryBackend, StorageBackend, spawn_retention},
    util,
};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Periodically probes HTTP sites and reports up/down transitions")]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = std::env::var(util::LOG_FILTER)
        .ok()
        .and_then(|directives| directives.parse::<filter::Targets>().ok())
        .unwrap_or_else(|| {
            filter::Targets::new().with_targets(vec![
                ("site_monitor", LevelFilter::DEBUG),
                ("monitor", LevelFilter::DEBUG),
                ("tower_http", LevelFilter::INFO),
            ])
        });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            warn!("using in-memory storage, nothing survives a restart");
            Ok(Arc::new(MemoryBackend::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path, .. } => {
            let backend = site_monitor::storage::sqlite::SqliteBackend::new(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Arc::new(backend))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("built without the storage-sqlite feature")
        }
    }
}

fn build_sink(config: &NotificationConfig) -> anyhow::Result<Arc<dyn NotificationSink>> {
    Ok(match config {
        NotificationConfig::Log => Arc::new(LogSink),
        NotificationConfig::Telegram {
            bot_token,
            api_base,
        } => Arc::new(TelegramSink::new(bot_token.clone(), api_base.clone())?),
        NotificationConfig::Webhook { url } => Arc::new(WebhookSink::new(url.clone())?),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env file is fine
    let _ = dotenv::dotenv();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate()?;

    let store = open_store(&config.storage).await?;
    let prober = Arc::new(HttpProber::new()?);
    let sink = build_sink(&config.notifications)?;

    let registry = Arc::new(SchedulerRegistry::start(
        &config.scheduler,
        store.clone(),
        prober,
        sink,
    ));

    let scheduled = registry.bootstrap().await?;
    info!(
        "monitoring {scheduled} targets (max {} concurrent checks, timeout {}s)",
        config.scheduler.max_concurrent_checks, config.scheduler.probe_timeout
    );

    let retention = match &config.storage {
        StorageConfig::Sqlite {
            retention_days: Some(days),
            ..
        } => Some(spawn_retention(store.clone(), *days)),
        _ => None,
    };

    #[cfg(feature = "api")]
    {
        use site_monitor::api::{ApiConfig, ApiState, spawn_api_server};

        let bind_addr = config
            .api
            .bind
            .parse()
            .with_context(|| format!("invalid API bind address: {}", config.api.bind))?;
        spawn_api_server(ApiConfig::new(bind_addr), ApiState::new(registry.clone())).await?;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");

    if let Some(retention) = retention {
        retention.abort();
    }
    registry.shutdown().await;

    Ok(())
}
