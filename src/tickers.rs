use std::collections::BTreeSet;

use crate::article::Article;

/// Ticker symbols seen across every fetched page. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerRegistry {
    symbols: BTreeSet<String>,
}

impl TickerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union the tickers of a freshly fetched batch into the registry.
    /// Returns how many symbols were new.
    pub fn merge(&mut self, batch: &[Article]) -> usize {
        let before = self.symbols.len();
        self.symbols
            .extend(batch.iter().map(|article| article.ticker.clone()));
        self.symbols.len() - before
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.symbols.contains(ticker)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in sorted order, for populating the ticker checklist.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.symbols.iter().cloned().collect()
    }
}
