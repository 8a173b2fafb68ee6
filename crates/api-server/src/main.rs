//! API server binary

use std::sync::Arc;
use tracing::info;
use videoseek_api_server::{start_server, ApiState};
use videoseek_common::PromptLibrary;
use videoseek_hybrid_search::{RankConfig, SearchService};
use videoseek_model_gateway::GatewayConfig;
use videoseek_pipeline::{IndexerConfig, JobQueue, Pipeline};
use videoseek_search_index::SearchIndexConfig;
use videoseek_video_store::{PostgresConfig, PostgresVideoStore, VideoStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Videoseek API server v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn VideoStore> = {
        let store = PostgresVideoStore::connect(&PostgresConfig::default()).await?;
        store.init_schema().await?;
        Arc::new(store)
    };

    let gateway = GatewayConfig::default();
    let search_index = SearchIndexConfig::default();
    let prompts = PromptLibrary::from_env();

    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        gateway.clone(),
        search_index.clone(),
        prompts.clone(),
        IndexerConfig::default(),
    ));

    let workers = std::env::var("VIDEOSEEK_WORKERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let queue = Arc::new(JobQueue::start(pipeline, workers));

    let search = Arc::new(SearchService::new(
        gateway,
        search_index,
        Arc::clone(&store),
        prompts,
        RankConfig::default(),
    ));

    let state = ApiState {
        queue,
        store,
        search,
    };

    let addr =
        std::env::var("VIDEOSEEK_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    start_server(&addr, state).await?;
    Ok(())
}
