//! Receptionist Server Entry Point

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use receptionist_config::Settings;
use receptionist_core::BusinessConfig;
use receptionist_eval::{spawn_workers, OpenAiReplayClient, ShadowEvaluator};
use receptionist_server::{create_router, AppState};
use receptionist_store::{load_golden_sets, BusinessStore, JsonFrameStore};
use receptionist_tools::{create_default_registry, SimulatedCalendar};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first (need observability settings for tracing init)
    let config_path = std::env::var("RECEPTIONIST_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Settings::load(Some(Path::new(&config_path)))?;

    init_tracing(&config);

    tracing::info!("Starting Receptionist Server v{}", env!("CARGO_PKG_VERSION"));

    let business = load_business_config(&config.storage.data_dir);
    let business = Arc::new(BusinessStore::new(business)?);

    let frames = Arc::new(JsonFrameStore::open(&config.storage.data_dir).await?);
    tracing::info!(dir = %config.storage.data_dir, "Opened frame store");

    let eval_tx = if config.evaluation.enabled {
        Some(start_evaluation(&config, frames.clone(), business.clone())?)
    } else {
        tracing::info!("Shadow evaluation disabled");
        None
    };

    let state = AppState::new(config.clone(), business, frames, eval_tx);
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wire up the shadow-evaluation pipeline and return the publisher side
/// of its queue.
fn start_evaluation(
    config: &Settings,
    frames: Arc<JsonFrameStore>,
    business: Arc<BusinessStore>,
) -> Result<mpsc::UnboundedSender<String>, Box<dyn std::error::Error>> {
    let api_key = config
        .realtime
        .api_key
        .clone()
        .ok_or("evaluation.enabled requires realtime.api_key")?;

    let golden_sets = load_golden_sets(Path::new(&config.storage.golden_frames_dir))?;
    tracing::info!(sets = golden_sets.len(), "Loaded golden frame sets");

    let client = Arc::new(OpenAiReplayClient::new(api_key, config.evaluation.replay_model.clone()));
    let calendar = Arc::new(SimulatedCalendar::new());
    let evaluator = Arc::new(ShadowEvaluator::new(
        client,
        Arc::new(create_default_registry(calendar)),
    ));

    let (tx, rx) = mpsc::unbounded_channel();
    let pool = spawn_workers(
        config.evaluation.workers,
        config.evaluation.benchmark_every_calls,
        rx,
        evaluator,
        frames,
        business,
        golden_sets,
    );
    tracing::info!(workers = pool.handles.len(), "Started evaluation workers");

    Ok(tx)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing from the observability settings.
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("receptionist={},tower_http=debug", level).into()
    });

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Load the business configuration from `business.json` under the data
/// directory. Falls back to defaults (receptionist disabled) if the file
/// is missing or unreadable, so a bad deploy fails closed rather than open.
fn load_business_config(data_dir: &str) -> BusinessConfig {
    let path = Path::new(data_dir).join("business.json");

    if path.exists() {
        match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<BusinessConfig>(&raw).map_err(|e| e.to_string()))
        {
            Ok(config) => {
                tracing::info!(business = %config.name, "Business config loaded from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load business config from {}: {}. Using defaults.", path.display(), e);
                BusinessConfig::default()
            }
        }
    } else {
        tracing::info!("Business config not found at {}. Using defaults.", path.display());
        BusinessConfig::default()
    }
}
