//! View state of the news feed: accumulated articles, the page cursor, the
//! ticker registry, filter selections and a single status machine that
//! serializes page loads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::article::Article;
use crate::filter::{FilterState, PriceAction, SearchContext, SentimentOption};
use crate::news_client::FeedError;
use crate::tickers::TickerRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedStatus {
    /// Nothing has been fetched yet.
    Initial,
    Loading {
        page: u32,
    },
    Idle,
    /// Last fetch failed; the same page will be requested again.
    Failed {
        page: u32,
        error: String,
    },
    /// An empty page came back. No further pages are requested.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadRejected {
    #[error("a page is already being fetched")]
    InFlight,
    #[error("no more pages to fetch")]
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Appended {
        page: u32,
        added: usize,
        new_tickers: usize,
    },
    Exhausted {
        page: u32,
    },
    Failed {
        page: u32,
        error: String,
    },
    Skipped {
        reason: LoadRejected,
    },
    /// Completion for a page that was not in flight; dropped.
    Stale {
        page: u32,
    },
}

/// What sits under the card grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Footer {
    /// First page still loading: the whole view is a spinner.
    FullPageLoading,
    Loading,
    LoadMore,
    NoMoreArticles,
    NoArticlesAvailable,
}

/// One rendered card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleCard {
    #[serde(flatten)]
    pub article: Article,
    pub price_action: Option<PriceAction>,
}

impl From<&Article> for ArticleCard {
    fn from(article: &Article) -> Self {
        ArticleCard {
            article: article.clone(),
            price_action: PriceAction::of(article),
        }
    }
}

/// Serializable snapshot of everything the page shows.
#[derive(Debug, Clone, Serialize)]
pub struct FeedView {
    pub status: FeedStatus,
    pub next_page: u32,
    pub total_articles: usize,
    pub tickers: Vec<String>,
    pub filters: FilterState,
    pub cards: Vec<ArticleCard>,
    pub footer: Footer,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct VisibleCache {
    article_count: usize,
    filter_revision: u64,
    indices: Vec<usize>,
}

#[derive(Debug)]
pub struct NewsFeed {
    articles: Vec<Article>,
    page: u32,
    tickers: TickerRegistry,
    filters: FilterState,
    filter_revision: u64,
    status: FeedStatus,
    visible: Option<VisibleCache>,
}

impl Default for NewsFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsFeed {
    pub fn new() -> Self {
        NewsFeed {
            articles: Vec::new(),
            page: 1,
            tickers: TickerRegistry::new(),
            filters: FilterState::default(),
            filter_revision: 0,
            status: FeedStatus::Initial,
            visible: None,
        }
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    /// Next page to request.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn tickers(&self) -> &TickerRegistry {
        &self.tickers
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, FeedStatus::Loading { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        self.status == FeedStatus::Exhausted
    }

    // ─── Page loading ──────────────────────────────────────

    /// Claim the next page for fetching. Only one page may be in flight.
    pub fn begin_load(&mut self) -> Result<u32, LoadRejected> {
        match self.status {
            FeedStatus::Loading { .. } => Err(LoadRejected::InFlight),
            FeedStatus::Exhausted => Err(LoadRejected::Exhausted),
            _ => {
                self.status = FeedStatus::Loading { page: self.page };
                debug!("Loading articles page {}", self.page);
                Ok(self.page)
            }
        }
    }

    /// Apply the result of the fetch started by `begin_load`.
    pub fn complete_load(
        &mut self,
        page: u32,
        result: Result<Vec<Article>, FeedError>,
    ) -> LoadOutcome {
        if self.status != (FeedStatus::Loading { page }) {
            warn!("Ignoring completion for page {} (status {:?})", page, self.status);
            return LoadOutcome::Stale { page };
        }

        match result {
            Ok(batch) if batch.is_empty() => {
                info!("Page {} is empty, no more articles", page);
                self.status = FeedStatus::Exhausted;
                LoadOutcome::Exhausted { page }
            }
            Ok(batch) => {
                let added = batch.len();
                let new_tickers = self.tickers.merge(&batch);
                self.articles.extend(batch);
                self.page += 1;
                self.status = FeedStatus::Idle;
                info!(
                    "Loaded page {}: {} articles ({} total, {} new tickers)",
                    page,
                    added,
                    self.articles.len(),
                    new_tickers
                );
                LoadOutcome::Appended {
                    page,
                    added,
                    new_tickers,
                }
            }
            Err(e) => {
                warn!("Error fetching articles page {}: {}", page, e);
                let error = e.to_string();
                self.status = FeedStatus::Failed {
                    page,
                    error: error.clone(),
                };
                LoadOutcome::Failed { page, error }
            }
        }
    }

    // ─── Filter selections ─────────────────────────────────

    fn update_filters(&mut self, update: impl FnOnce(&mut FilterState)) -> bool {
        let before = self.filters.clone();
        update(&mut self.filters);
        let changed = self.filters != before;
        if changed {
            self.filter_revision += 1;
        }
        changed
    }

    pub fn set_search(&mut self, search: SearchContext) -> bool {
        self.update_filters(|f| f.search = search)
    }

    /// Replace the ticker selection. Symbols never seen in a fetched
    /// article are dropped.
    pub fn set_selected_tickers<I, S>(&mut self, tickers: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected = BTreeSet::new();
        for ticker in tickers {
            let ticker = ticker.into();
            if self.tickers.contains(&ticker) {
                selected.insert(ticker);
            } else {
                debug!("Dropping unknown ticker selection '{}'", ticker);
            }
        }
        self.update_filters(|f| f.tickers = selected)
    }

    pub fn set_sentiment(&mut self, sentiment: Option<SentimentOption>) -> bool {
        self.update_filters(|f| f.sentiment = sentiment)
    }

    pub fn set_price_action(&mut self, price_action: Option<PriceAction>) -> bool {
        self.update_filters(|f| f.price_action = price_action)
    }

    /// Reset the dropdown selections. The search context is left alone.
    pub fn clear_selections(&mut self) -> bool {
        self.update_filters(|f| {
            f.tickers.clear();
            f.sentiment = None;
            f.price_action = None;
        })
    }

    // ─── Derived view ──────────────────────────────────────

    /// Indices of the visible articles, recomputed only when articles were
    /// appended or a selection changed since the last call.
    pub fn visible_indices(&mut self) -> &[usize] {
        let fresh = self.visible.as_ref().is_some_and(|cache| {
            cache.article_count == self.articles.len()
                && cache.filter_revision == self.filter_revision
        });
        if !fresh {
            self.visible = Some(VisibleCache {
                article_count: self.articles.len(),
                filter_revision: self.filter_revision,
                indices: self.filters.apply_indices(&self.articles),
            });
        }
        match &self.visible {
            Some(cache) => &cache.indices,
            None => &[],
        }
    }

    pub fn visible(&mut self) -> Vec<&Article> {
        self.visible_indices();
        match &self.visible {
            Some(cache) => cache.indices.iter().map(|&i| &self.articles[i]).collect(),
            None => Vec::new(),
        }
    }

    pub fn footer(&mut self) -> Footer {
        match self.status {
            FeedStatus::Initial => return Footer::FullPageLoading,
            FeedStatus::Loading { .. } if self.articles.is_empty() => {
                return Footer::FullPageLoading
            }
            FeedStatus::Loading { .. } => return Footer::Loading,
            _ => {}
        }
        if self.visible_indices().is_empty() {
            Footer::NoArticlesAvailable
        } else if self.is_exhausted() {
            Footer::NoMoreArticles
        } else {
            Footer::LoadMore
        }
    }

    pub fn snapshot(&mut self) -> FeedView {
        let footer = self.footer();
        let cards = self.visible().into_iter().map(ArticleCard::from).collect();
        FeedView {
            status: self.status.clone(),
            next_page: self.page,
            total_articles: self.articles.len(),
            tickers: self.tickers.to_vec(),
            filters: self.filters.clone(),
            cards,
            footer,
            generated_at: Utc::now(),
        }
    }

    #[cfg(test)]
    fn cache_revision(&self) -> Option<(usize, u64)> {
        self.visible
            .as_ref()
            .map(|c| (c.article_count, c.filter_revision))
    }
}
