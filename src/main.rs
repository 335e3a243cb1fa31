use std::sync::Arc;

use floor_control::api::{AppState, floor_routes};
use floor_control::config::FloorConfig;
use floor_control::disruption::{DisruptionOrchestrator, OrchestratorConfig};
use floor_control::llm::{LlmConfig, create_provider};
use floor_control::recommend::{EngineConfig, LlmRecommendationEngine, RecommendationEngine};
use floor_control::seed::SeedData;
use floor_control::session::{self, FloorSession};
use floor_control::store::{EntityStore, LibSqlStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Read API key from environment
    let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: ANTHROPIC_API_KEY not set");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    let config = FloorConfig::from_env();

    eprintln!("🏭 Floor Control v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   API: http://0.0.0.0:{}/api/dashboard", config.http_port);
    eprintln!("   Alerts WS: ws://0.0.0.0:{}/ws", config.http_port);

    // ── Store ────────────────────────────────────────────────────────────
    let store: Arc<dyn EntityStore> = match config.db_path {
        Some(ref path) => {
            let store = LibSqlStore::new_local(path).await.unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", path.display(), e);
                std::process::exit(1);
            });
            eprintln!("   Database: {}", path.display());
            Arc::new(store)
        }
        None => {
            eprintln!("   Database: in-memory (set FLOOR_DB_PATH to persist)");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(ref seed_path) = config.seed_path {
        let seed = SeedData::load(seed_path)?;
        if seed.apply(store.as_ref()).await? {
            eprintln!("   Seeded from {}", seed_path.display());
        }
    }

    // ── Recommendation engine ────────────────────────────────────────────
    let llm_config = LlmConfig {
        api_key: secrecy::SecretString::from(api_key),
        model: config.model.clone(),
    };
    let llm = create_provider(&llm_config)?;
    let engine: Arc<dyn RecommendationEngine> =
        Arc::new(LlmRecommendationEngine::new(llm, EngineConfig::default()));

    // ── Session + orchestrator ───────────────────────────────────────────
    let port = config.http_port;
    let reconcile_interval = config.reconcile_interval;
    let orchestrator_config = OrchestratorConfig::from(&config);

    let session = FloorSession::new(store, config);
    if let Err(e) = session.reload().await {
        // The periodic reconcile will pick it up once the store answers
        tracing::warn!(error = %e, "Initial load failed");
    }
    let _reconcile = session::spawn_reconcile_task(session.clone(), reconcile_interval);

    let orchestrator = DisruptionOrchestrator::new(engine, session.clone(), orchestrator_config);

    let app = floor_routes(AppState::new(session, orchestrator));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port = port, "Floor control server started");
    eprintln!("   Ready.\n");

    axum::serve(listener, app).await?;
    Ok(())
}
