use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use handoff_tracker::channels::{ChannelManager, StdinSource, WebhookSource};
use handoff_tracker::clock::SystemClock;
use handoff_tracker::config::TrackerConfig;
use handoff_tracker::pipeline::{ClassifierRules, EventProcessor, ProcessorSettings, TrackerDeps};
use handoff_tracker::store::LibSqlBackend;
use handoff_tracker::working_time::BusinessCalendar;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TrackerConfig::from_env().context("Failed to load configuration")?;

    // Console output plus a daily error log
    let error_file = tracing_appender::rolling::daily(&config.log_dir, "handoff-tracker-errors.log");
    let (error_writer, _error_guard) = tracing_appender::non_blocking(error_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(error_writer)
                .with_filter(LevelFilter::ERROR),
        )
        .init();

    eprintln!("📋 Handoff Tracker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Error log: {}", config.log_dir.display());
    eprintln!("   UTC offset: {}", config.utc_offset);
    eprintln!("   Sectors: {}", config.sectors.len());

    // ── Storage ──────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    // ── Processor ────────────────────────────────────────────────────────
    let deps = TrackerDeps {
        sessions: db.clone(),
        log: db,
        working_time: Arc::new(BusinessCalendar::new(
            config.utc_offset,
            config.schedule.clone(),
        )),
        clock: Arc::new(SystemClock),
    };
    let processor = EventProcessor::new(
        deps,
        ClassifierRules::new(config.sectors.clone(), config.phrases.clone()),
        ProcessorSettings::from_config(&config),
    );

    // ── Sources ──────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();

    if config.stdin_enabled {
        channels.add(Box::new(StdinSource::new()));
        eprintln!("   Stdin: enabled (one JSON event per line)");
    }

    if let Some(webhook) = &config.webhook {
        let source = WebhookSource::new(webhook.token.clone());
        let app = source.router();
        let port = webhook.port;

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(port, error = %e, "Failed to bind webhook port");
                    return;
                }
            };
            tracing::info!(port, "Webhook server started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Webhook server stopped");
            }
        });

        channels.add(Box::new(source));
        eprintln!(
            "   Webhook: http://0.0.0.0:{}/events (token {})",
            port,
            if webhook.token.is_some() { "required" } else { "not set" }
        );
    }

    tracing::info!(sources = channels.len(), "Starting message sources");
    let events = channels
        .start_all()
        .await
        .context("No message source could be started")?;

    let handled = processor.run(events).await;
    tracing::info!(handled, "Handoff tracker stopped");
    Ok(())
}
