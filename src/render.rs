use askama::Template;

use crate::feed::{ArticleCard, FeedView, Footer};
use crate::filter::{PriceAction, SentimentOption};

pub struct TickerOption {
    pub symbol: String,
    pub checked: bool,
}

pub struct SelectOption {
    pub value: &'static str,
    pub selected: bool,
}

/// Card fields, pre-formatted for display.
pub struct CardDisplay {
    pub title: String,
    pub publication_datetime: String,
    pub summary: String,
    pub ticker: String,
    pub sentiment: String,
    pub image_url: String,
    pub article_url: String,
    pub market_date: String,
    pub open: String,
    pub close: String,
    pub badge: &'static str,
}

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("{:.2}", p),
        None => "N/A".to_string(),
    }
}

impl From<&ArticleCard> for CardDisplay {
    fn from(card: &ArticleCard) -> Self {
        let a = &card.article;
        CardDisplay {
            title: a.title.clone(),
            publication_datetime: a.publication_datetime.clone(),
            summary: a.summary.clone(),
            ticker: a.ticker.clone(),
            sentiment: a.sentiment.clone(),
            image_url: a.image_url.clone(),
            article_url: a.article_url.clone(),
            market_date: a.market_date.clone(),
            open: format_price(a.open_price),
            close: format_price(a.close_price),
            badge: card.price_action.map(|p| p.label()).unwrap_or("Flat"),
        }
    }
}

/// GET / - the feed page
#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedPage {
    pub full_page_loading: bool,
    pub tickers: Vec<TickerOption>,
    pub sentiment_unset: bool,
    pub sentiment_options: Vec<SelectOption>,
    pub price_action_unset: bool,
    pub price_action_options: Vec<SelectOption>,
    pub cards: Vec<CardDisplay>,
    pub loading: bool,
    pub no_articles: bool,
    pub no_more: bool,
}

impl From<&FeedView> for FeedPage {
    fn from(view: &FeedView) -> Self {
        let filters = &view.filters;
        FeedPage {
            full_page_loading: view.footer == Footer::FullPageLoading,
            tickers: view
                .tickers
                .iter()
                .map(|symbol| TickerOption {
                    symbol: symbol.clone(),
                    checked: filters.tickers.contains(symbol),
                })
                .collect(),
            sentiment_unset: filters.sentiment.is_none(),
            sentiment_options: SentimentOption::ALL
                .iter()
                .map(|o| SelectOption {
                    value: o.label(),
                    selected: filters.sentiment == Some(*o),
                })
                .collect(),
            price_action_unset: filters.price_action.is_none(),
            price_action_options: PriceAction::ALL
                .iter()
                .map(|o| SelectOption {
                    value: o.label(),
                    selected: filters.price_action == Some(*o),
                })
                .collect(),
            cards: view.cards.iter().map(CardDisplay::from).collect(),
            loading: view.footer == Footer::Loading,
            no_articles: view.footer == Footer::NoArticlesAvailable,
            no_more: view.footer == Footer::NoMoreArticles,
        }
    }
}

pub fn render_page(view: &FeedView) -> askama::Result<String> {
    FeedPage::from(view).render()
}
