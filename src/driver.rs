use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::article::Article;
use crate::feed::{LoadOutcome, NewsFeed};
use crate::news_client::{ArticleClient, FeedError};
use crate::websocket::{EventSender, FeedEvent};

/// Drives page loads for a shared feed. The feed lock is held only to claim
/// and to complete a page, never across the HTTP request.
#[derive(Clone)]
pub struct FeedDriver {
    client: Arc<ArticleClient>,
    feed: Arc<Mutex<NewsFeed>>,
    events: EventSender,
}

impl FeedDriver {
    pub fn new(client: ArticleClient, events: EventSender) -> Self {
        FeedDriver {
            client: Arc::new(client),
            feed: Arc::new(Mutex::new(NewsFeed::new())),
            events,
        }
    }

    pub fn feed(&self) -> MutexGuard<'_, NewsFeed> {
        self.feed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Fetch the next page. Fetch failures are absorbed into the feed status;
    /// a call made while another page is in flight is skipped.
    ///
    /// The fetch and its completion run on a spawned task, so dropping this
    /// future (e.g. a disconnected HTTP client) never strands the feed in
    /// `Loading`.
    pub async fn load_more(&self) -> LoadOutcome {
        let claimed = self.feed().begin_load();
        let page = match claimed {
            Ok(page) => page,
            Err(reason) => {
                debug!("Load skipped: {}", reason);
                return LoadOutcome::Skipped { reason };
            }
        };

        let driver = self.clone();
        let task = tokio::spawn(async move {
            let result = driver.client.fetch_page(page).await;
            driver.finish_load(page, result)
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Article fetch task for page {} failed: {}", page, e);
                self.finish_load(page, Err(FeedError::Interrupted(e.to_string())))
            }
        }
    }

    fn finish_load(&self, page: u32, result: Result<Vec<Article>, FeedError>) -> LoadOutcome {
        let (outcome, total) = {
            let mut feed = self.feed();
            let outcome = feed.complete_load(page, result);
            (outcome, feed.articles().len())
        };

        if let Some(event) = FeedEvent::from_outcome(&outcome, total) {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
        outcome
    }

    /// Announce a selection change with the new visible count.
    pub fn notify_filters_changed(&self) {
        let visible = self.feed().visible_indices().len();
        let _ = self.events.send(FeedEvent::FiltersChanged { visible });
    }
}
