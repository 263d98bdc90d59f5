use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use course_recommender::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, create_redis_client, Cache, PgCourseStore},
    services::{embedding::create_embedder, RecommenderService, RecommenderSettings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("course_recommender=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to connect to the course database")?;
    let store = Arc::new(PgCourseStore::new(pool));

    let (cache, cache_handle) = match &config.redis_url {
        Some(redis_url) => {
            let client = create_redis_client(redis_url)?;
            let (cache, handle) = Cache::new(client).await;
            (Some(cache), Some(handle))
        }
        None => (None, None),
    };

    let embedder = create_embedder(&config, cache).await?;
    let settings = RecommenderSettings::from_config(&config)?;

    // no snapshot means nothing to serve, so a failed first build aborts startup
    let recommender = Arc::new(
        RecommenderService::initialize(store, embedder, settings)
            .await
            .context("Failed to build the initial recommender snapshot")?,
    );

    let refresh_task = config
        .snapshot_refresh_secs
        .map(|secs| recommender.clone().spawn_refresh(Duration::from_secs(secs)));

    let app = create_router(AppState::new(recommender));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Course recommender listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = refresh_task {
        task.abort();
    }
    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    tracing::info!("Course recommender stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
