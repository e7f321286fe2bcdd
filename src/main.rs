//! Quote engine entry point: wires the Instrument Registry, Quote Source
//! Adapter, Quote Cache, and database together, runs the one-shot historical
//! backfill, then spawns the Poller and the Read API as sibling tokio tasks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use quote_engine::api::{self, ApiState};
use quote_engine::backfill::run_backfill;
use quote_engine::config::EngineConfig;
use quote_engine::db::Db;
use quote_engine::poller::Poller;
use quote_engine::quote::{HttpQuoteSource, QuoteCache, QuoteService, QuoteSource};
use quote_engine::registry::Registry;
use quote_engine::watermark;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match EngineConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "fatal configuration error");
            std::process::exit(1);
        }
    };

    info!(port = config.http_port, symbols = config.universe.len(), "starting quote engine");

    let mut registry = Registry::load(config.registry_file.as_deref()).context("loading instrument registry")?;
    registry.ensure_universe(&config.universe);
    let registry = Arc::new(registry);

    let db = Db::open(&config.database_path).context("opening database")?;
    db.init_schema().await.context("initializing schema")?;

    let source: Arc<dyn QuoteSource> = Arc::new(HttpQuoteSource::new(upstream_base_url()));
    let cache = Arc::new(QuoteCache::new());
    let quotes = Arc::new(QuoteService::new(registry.clone(), source.clone(), cache));

    if watermark::needs_backfill_today(&config.watermark_path) {
        let symbols = config.backfill_symbols.clone();
        info!(?symbols, days = config.backfill_days, "running historical backfill");
        match run_backfill(&registry, source, &db, &symbols, config.backfill_days).await {
            Ok(report) => {
                info!(?report, "backfill complete");
                if let Err(e) = watermark::write(&config.watermark_path, chrono::Utc::now().date_naive()) {
                    warn!(error = %e, "failed to persist backfill watermark");
                }
            }
            Err(e) => warn!(error = %e, "backfill failed, continuing to live polling"),
        }
    } else {
        info!("backfill watermark is current, skipping");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let poller = Poller::new(quotes.clone(), db, config.clone());
    let poller_handle = tokio::spawn(async move { poller.run(shutdown_rx).await });

    let api_state = ApiState { quotes, cache_ttl_api: Duration::from_secs(config.cache_ttl_api) };
    let app = api::router(api_state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&addr).await.context("binding HTTP listener")?;
    info!(%addr, "read API listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!(error = %e, "read API server error");
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = poller_handle.await {
        error!(error = %e, "poller task panicked");
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

fn upstream_base_url() -> String {
    std::env::var("QUOTE_PROVIDER_URL").unwrap_or_else(|_| "http://localhost:9000".to_string())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quote_engine=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
