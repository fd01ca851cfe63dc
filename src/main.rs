use runboard::{EngineSettings, InMemoryStore, RecalculationEngine, StoreSeed};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting runboard recalculation engine");

    let settings = EngineSettings::from_env();
    info!(?settings, "Loaded engine settings");

    let store = Arc::new(InMemoryStore::with_limits(
        settings.max_batch_ops,
        settings.query_limit,
    ));

    if let Ok(path) = std::env::var("RUNBOARD_SEED_FILE") {
        match StoreSeed::from_path(&path).map(|seed| store.seed(seed)) {
            Ok(Ok(())) => info!(path = %path, run_count = store.runs().len(), "Seeded store"),
            Ok(Err(e)) => error!(path = %path, error = %e, "Seed data rejected by the store"),
            Err(e) => error!(path = %path, error = %e, "Could not read seed file"),
        }
    }

    let engine = RecalculationEngine::new(store, settings);
    if let Err(e) = engine.start().await {
        error!(error = %e, "Failed to start recalculation engine");
        return;
    }

    let report = engine.trigger_full_recalculation(None).await;
    info!(
        partitions_updated = report.partitions_updated,
        runs_updated = report.runs_updated,
        players_updated = report.players_updated,
        errors = report.error_count(),
        "Initial recalculation finished"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
    }

    info!("Shutting down");
    if let Err(e) = engine.stop().await {
        warn!(error = %e, "Engine did not stop cleanly");
    }
}
