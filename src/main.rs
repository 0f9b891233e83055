use clap::Parser;
use sage::{
    AppState, Config, Database, MemoryStore, ResearchOrchestrator,
    agents::{LlmClarifier, LlmPlanner, LlmReflector, LlmSynthesizer},
    llm::OpenAiCompatClient,
    search::{CachedSearchGateway, SearchGateway, WebContentFetcher, WebSearchGateway},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sage-server", version, about = "S.A.G.E research server")]
struct Args {
    /// Override the configured listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let db = Arc::new(Database::open(&config.database.path).await?);
    let llm = Arc::new(OpenAiCompatClient::from_config(&config.llm));

    let memory = Arc::new(
        MemoryStore::open(
            db.clone(),
            llm.clone(),
            config.memory.clone(),
            config.llm.embedding_dimension,
        )
        .await?,
    );

    let gateway = Arc::new(CachedSearchGateway::new(
        WebSearchGateway::new(),
        db.clone(),
        config.search.cache_ttl_secs,
    ));

    let orchestrator = Arc::new(ResearchOrchestrator::new(
        Arc::new(LlmClarifier::new(llm.clone())),
        Arc::new(LlmPlanner::new(llm.clone())),
        Arc::new(LlmSynthesizer::new(llm.clone())),
        Arc::new(LlmReflector::new(
            llm.clone(),
            config.research.reflection.clone(),
            config.research.confidence_threshold,
        )),
        gateway.clone() as Arc<dyn SearchGateway>,
        Arc::new(WebContentFetcher::new()),
        memory.clone(),
        config.search.clone(),
        config.research.clone(),
    ));

    spawn_maintenance(gateway.clone(), memory.clone(), config.memory.retention_days);

    let state = AppState {
        config: Arc::new(config.clone()),
        memory,
        orchestrator,
    };

    let app = axum::Router::new()
        .nest("/api", sage::api::routes::create_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "sage-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Hourly maintenance: expire old search-cache rows and compact memories
/// past the retention horizon.
fn spawn_maintenance(
    gateway: Arc<CachedSearchGateway<WebSearchGateway>>,
    memory: Arc<MemoryStore>,
    retention_days: i64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if let Err(e) = gateway.clear_expired_cache().await {
                tracing::warn!(error = %e, "Search cache maintenance failed");
            }
            if let Err(e) = memory
                .compact_memories(chrono::Duration::days(retention_days))
                .await
            {
                tracing::warn!(error = %e, "Memory compaction failed");
            }
        }
    });
}
