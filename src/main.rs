use std::{process, sync::Arc};

use songstudio::{
    application::error::AppError,
    application::repos::{SessionStoreRepo, StudioGateway},
    cache::{CacheConfig, SessionStore, StudioCache},
    config,
    infra::{
        db::PostgresGateway,
        error::InfraError,
        http::{self, AppState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Warmup(_) => run_warmup(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let gateway = init_gateway(&settings).await?;
    let cache_config = CacheConfig::from(&settings.cache);

    let shared: Arc<dyn StudioGateway> = Arc::new(gateway.clone());
    let store_repo: Arc<dyn SessionStoreRepo> = Arc::new(gateway.clone());
    let cache = Arc::new(StudioCache::new(&cache_config, shared));
    let sessions = Arc::new(SessionStore::new(store_repo, cache_config.session_ttl()));
    sessions.bootstrap().await?;

    if cache_config.warmup_on_start {
        cache.warmup().await;
    }

    let sweeper = sessions.spawn_sweeper(cache_config.session_sweep_interval());

    let state = AppState {
        cache,
        sessions,
        db: gateway,
    };
    let result = serve_http(&settings, state).await;

    sweeper.abort();
    let _ = sweeper.await;

    result
}

/// Warm the cache against the configured database, report, and exit.
/// Useful as a deploy-time smoke test of storage connectivity.
async fn run_warmup(settings: config::Settings) -> Result<(), AppError> {
    let gateway = init_gateway(&settings).await?;
    let cache_config = CacheConfig::from(&settings.cache);
    let shared: Arc<dyn StudioGateway> = Arc::new(gateway);
    let cache = StudioCache::new(&cache_config, shared);

    let started = std::time::Instant::now();
    cache.warmup().await;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "warmup finished"
    );
    Ok(())
}

async fn init_gateway(settings: &config::Settings) -> Result<PostgresGateway, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresGateway::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresGateway::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresGateway::new(pool))
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let addr = settings
        .server
        .addr()
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(%addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown handler");
        // Without a handler, fall back to never resolving; the process
        // is stopped externally.
        std::future::pending::<()>().await;
    }
}
