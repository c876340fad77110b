use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use movie_recommender::{
    api::{create_router, AppState},
    cache::{create_redis_client, CacheWriterHandle, MemoryStore, RedisStore},
    config::{Config, ModelCacheMode},
    data::{loader, DataSource, FileSource, PreloadedSource},
    services::{ContentIndex, Pipeline},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movie_recommender=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let files = FileSource::new(&config.movies_path, &config.ratings_path);
    let source: Arc<dyn DataSource> = if config.preload_data {
        let preloaded = PreloadedSource::from_files(&files)
            .context("Failed to preload movies and ratings")?;
        tracing::info!(
            movies = %config.movies_path,
            ratings = %config.ratings_path,
            "Data preloaded"
        );
        Arc::new(preloaded)
    } else {
        Arc::new(files)
    };

    let content = match &config.content_data_path {
        Some(path) => {
            let rows = loader::load_metadata(path)
                .with_context(|| format!("Failed to load content data from {}", path))?;
            let index = ContentIndex::build(rows);
            if index.is_empty() {
                tracing::warn!(path = %path, "Content data holds no movies");
            } else {
                tracing::info!(movies = index.len(), "Title queries enabled");
            }
            Some(index)
        }
        None => {
            tracing::info!("CONTENT_DATA_PATH not set, title queries are disabled");
            None
        }
    };

    let mut pipeline = Pipeline::new(source, config.als_params());
    let mut cache_writer: Option<CacheWriterHandle> = None;
    match config.model_cache {
        ModelCacheMode::None => {}
        ModelCacheMode::Memory => {
            pipeline = pipeline.with_store(Arc::new(MemoryStore::new(config.model_cache_capacity)));
        }
        ModelCacheMode::Redis => {
            let client = create_redis_client(&config.redis_url)?;
            let (store, handle) = RedisStore::new(client, config.model_cache_ttl_secs);
            pipeline = pipeline.with_store(Arc::new(store));
            cache_writer = Some(handle);
        }
    }
    tracing::info!(mode = ?config.model_cache, "Model cache configured");

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_router(AppState::new(config, pipeline, content));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
