use anyhow::Result;
use tracing::{error, info, warn};

use market_news_feed::config::Config;
use market_news_feed::dashboard::start_dashboard;
use market_news_feed::driver::FeedDriver;
use market_news_feed::feed::LoadOutcome;
use market_news_feed::news_client::ArticleClient;
use market_news_feed::websocket::new_event_channel;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("market_news_feed=info")),
        )
        .init();

    info!("News feed starting against {}", config.news_api_base_url);

    let client = ArticleClient::new(&config)?;
    let driver = FeedDriver::new(client, new_event_channel());

    // First page; the page stays a spinner until this completes
    match driver.load_more().await {
        LoadOutcome::Appended { added, .. } => info!("Initial page loaded with {} articles", added),
        LoadOutcome::Exhausted { .. } => warn!("Article API returned no articles"),
        LoadOutcome::Failed { error, .. } => {
            warn!("Initial page failed ({}); serving empty feed", error)
        }
        other => warn!("Unexpected initial load outcome: {:?}", other),
    }

    let server = tokio::spawn(async move { start_dashboard(&config, driver).await });

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => info!("Dashboard server stopped"),
                Ok(Err(e)) => {
                    error!("Dashboard server failed: {:#}", e);
                    return Err(e);
                }
                Err(e) => error!("Dashboard task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    Ok(())
}
