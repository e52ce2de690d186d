/// Main entry point for the trading engine
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use smcbot::{
    broker::{BrokerAdapter, BrokerClient},
    config::load_config,
    data::MtfStore,
    engine::TradingEngine,
    events::DecisionLogger,
    risk::RiskManager,
    smc::SmcStrategy,
    store::{LogMirror, StateStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = Arc::new(load_config(&config_path)?);

    tracing_subscriber::fmt()
        .with_env_filter(config.log.level.clone())
        .init();

    info!("🚀 Starting SMC trading engine...");

    // Persistence collaborator: state file + decision log mirror
    let store = Arc::new(StateStore::new(Some(PathBuf::from(&config.store.state_path))));
    store.load().await?;
    let mirror = Arc::new(LogMirror::new(Some(PathBuf::from(&config.store.log_path))));
    let logger = Arc::new(DecisionLogger::new(mirror));

    // Broker session
    let client = Arc::new(BrokerClient::new());
    let credentials = config.broker.credentials();
    client.connect(credentials).await.map_err(|e| {
        error!("❌ Broker connect failed: {}", e);
        anyhow::anyhow!(e)
    })?;

    let adapter = BrokerAdapter::new(Arc::clone(&client));

    // Core services
    let mtf = Arc::new(MtfStore::new());
    let risk = Arc::new(RiskManager::new(config.risk.clone(), Arc::clone(&store)));
    let smc = Arc::new(SmcStrategy::new(config.smc.clone(), Arc::clone(&logger)));

    let engine = TradingEngine::new(
        Arc::clone(&config),
        Arc::clone(&adapter),
        mtf,
        risk,
        smc,
        store,
        logger,
    );

    Arc::clone(&engine).start().await?;
    info!("✅ Engine running - Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    warn!("⚠️  Ctrl+C received - shutting down");

    engine.stop().await;
    client.disconnect().await;

    info!("👋 Goodbye!");
    Ok(())
}
