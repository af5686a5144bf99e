use clap::Parser;
use std::sync::Arc;

use pass_secure_live::{
    arguments::Arguments,
    config,
    logger::{self, LogTag},
    webserver::{
        self,
        auth::HeaderAuthenticator,
        state::AppState,
        ws::{ChangeFeed, Hub, HubSettings, MemoryFeed, PostgresFeed},
    },
};

/// Main entry point for the live-update server
///
/// - Loads configuration (file, then environment overrides)
/// - Starts the hub and its change-feed listener
/// - Serves `/ws` and `/healthcheck` until Ctrl-C
/// - On Ctrl-C closes the hub first, then stops the HTTP server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();

    let config = config::load_config_from_path(&args.config).map_err(anyhow::Error::msg)?;
    logger::init(args.logger_config(&config.logging.file));

    logger::info(LogTag::System, "🚀 pass-secure live-update server starting up...");
    logger::debug(
        LogTag::Config,
        &format!(
            "Loaded {}: hub timeout {}s, {} write workers, topic '{}'",
            args.config, config.hub.timeout_secs, config.hub.write_workers, config.hub.topic
        ),
    );

    let feed: Arc<dyn ChangeFeed> = if config.database.url.is_empty() {
        logger::warning(
            LogTag::System,
            "⚠️  No database URL configured, using in-memory change feed (no live updates)",
        );
        Arc::new(MemoryFeed::new())
    } else {
        Arc::new(PostgresFeed::new(config.database.url.clone()))
    };

    let hub = Hub::new(HubSettings::from(&config.hub), feed);
    let auth = HeaderAuthenticator::new(&config.server.user_id_header)?;
    let state = Arc::new(AppState::new(config, Arc::clone(&hub), Arc::new(auth)));

    let processor = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.process().await })
    };

    {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                logger::error(LogTag::System, &format!("Failed to listen for Ctrl-C: {}", e));
                return;
            }
            logger::info(LogTag::System, "🛑 Shutdown requested");
            hub.close().await;
            webserver::shutdown();
        });
    }

    let served = webserver::start_server(state).await;

    // Covers a server that failed to start; a no-op after Ctrl-C
    hub.close().await;
    match processor.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => logger::error(LogTag::Hub, &format!("Hub processing failed: {}", e)),
        Err(e) => logger::error(LogTag::Hub, &format!("Hub task panicked: {}", e)),
    }

    logger::info(LogTag::System, "👋 Shutdown complete");
    logger::flush();

    served.map_err(anyhow::Error::msg)
}
