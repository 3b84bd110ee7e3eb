use anyhow::Result;
use phishguard::{
    app::PhishGuardApp,
    config,
    infrastructure::{directories, logging, shutdown},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config.logging.level, &paths.logs_dir)?;

    let shutdown = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = PhishGuardApp::initialize(config, paths, shutdown).await?;
    app.run().await
}
