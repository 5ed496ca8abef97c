use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use crate::article::Article;

/// Search only narrows this view when the search bar is on the news category.
pub const NEWS_CATEGORY: &str = "News";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentOption {
    Positive,
    Negative,
    Neutral,
}

impl SentimentOption {
    pub const ALL: [SentimentOption; 3] = [
        SentimentOption::Positive,
        SentimentOption::Negative,
        SentimentOption::Neutral,
    ];
    pub const PLACEHOLDER: &'static str = "Sentiment";

    pub fn label(&self) -> &'static str {
        match self {
            SentimentOption::Positive => "Positive",
            SentimentOption::Negative => "Negative",
            SentimentOption::Neutral => "Neutral",
        }
    }
}

impl FromStr for SentimentOption {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Positive" => Ok(SentimentOption::Positive),
            "Negative" => Ok(SentimentOption::Negative),
            "Neutral" => Ok(SentimentOption::Neutral),
            _ => anyhow::bail!(
                "Invalid sentiment: '{}'. Must be Positive, Negative or Neutral",
                s
            ),
        }
    }
}

impl std::fmt::Display for SentimentOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of the market move on the article's market date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceAction {
    Positive,
    Negative,
    #[serde(rename = "NA")]
    NotApplicable,
}

impl PriceAction {
    pub const ALL: [PriceAction; 3] = [
        PriceAction::Positive,
        PriceAction::Negative,
        PriceAction::NotApplicable,
    ];
    pub const PLACEHOLDER: &'static str = "Price Action";

    pub fn label(&self) -> &'static str {
        match self {
            PriceAction::Positive => "Positive",
            PriceAction::Negative => "Negative",
            PriceAction::NotApplicable => "NA",
        }
    }

    /// Up and down moves need both prices; a missing close is "NA" whatever
    /// the open was.
    pub fn matches(&self, article: &Article) -> bool {
        match (self, article.open_price, article.close_price) {
            (PriceAction::Positive, Some(open), Some(close)) => close > open,
            (PriceAction::Negative, Some(open), Some(close)) => close < open,
            (PriceAction::Positive | PriceAction::Negative, _, _) => false,
            (PriceAction::NotApplicable, _, close) => close.is_none(),
        }
    }

    /// Classify an article, used for the card badge.
    pub fn of(article: &Article) -> Option<PriceAction> {
        Self::ALL.into_iter().find(|action| action.matches(article))
    }
}

impl FromStr for PriceAction {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Positive" => Ok(PriceAction::Positive),
            "Negative" => Ok(PriceAction::Negative),
            "NA" => Ok(PriceAction::NotApplicable),
            _ => anyhow::bail!(
                "Invalid price action: '{}'. Must be Positive, Negative or NA",
                s
            ),
        }
    }
}

impl std::fmt::Display for PriceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Search bar state shared with the rest of the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub category: String,
}

impl SearchContext {
    pub fn new(query: impl Into<String>, category: impl Into<String>) -> Self {
        SearchContext {
            query: query.into(),
            category: category.into(),
        }
    }

    /// Lowercased query words, or `None` when search does not apply.
    pub fn tokens(&self) -> Option<HashSet<String>> {
        if self.category != NEWS_CATEGORY {
            return None;
        }
        let tokens: HashSet<String> = self
            .query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(tokens)
        }
    }

    pub fn is_active(&self) -> bool {
        self.tokens().is_some()
    }
}

/// Title word, ticker or sentiment hit. Any one is enough.
pub fn matches_search(article: &Article, tokens: &HashSet<String>) -> bool {
    let title_match = article
        .title
        .split_whitespace()
        .any(|word| tokens.contains(&word.to_lowercase()));
    title_match
        || tokens.contains(&article.ticker.to_lowercase())
        || tokens.contains(&article.sentiment.to_lowercase())
}

/// Every user-controlled selection that narrows the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search: SearchContext,
    #[serde(default)]
    pub tickers: BTreeSet<String>,
    #[serde(default)]
    pub sentiment: Option<SentimentOption>,
    #[serde(default)]
    pub price_action: Option<PriceAction>,
}

impl FilterState {
    pub fn is_passthrough(&self) -> bool {
        !self.search.is_active()
            && self.tickers.is_empty()
            && self.sentiment.is_none()
            && self.price_action.is_none()
    }

    /// Positions of the articles that survive search, ticker, sentiment and
    /// price action, in that order. Relative order is preserved.
    pub fn apply_indices(&self, articles: &[Article]) -> Vec<usize> {
        let mut kept: Vec<usize> = (0..articles.len()).collect();

        if let Some(tokens) = self.search.tokens() {
            kept.retain(|&i| matches_search(&articles[i], &tokens));
        }
        if !self.tickers.is_empty() {
            kept.retain(|&i| self.tickers.contains(&articles[i].ticker));
        }
        if let Some(sentiment) = self.sentiment {
            kept.retain(|&i| articles[i].sentiment == sentiment.label());
        }
        if let Some(action) = self.price_action {
            kept.retain(|&i| action.matches(&articles[i]));
        }

        kept
    }

    pub fn apply<'a>(&self, articles: &'a [Article]) -> Vec<&'a Article> {
        self.apply_indices(articles)
            .into_iter()
            .map(|i| &articles[i])
            .collect()
    }
}
