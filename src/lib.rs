pub mod article;
pub mod config;
pub mod dashboard;
pub mod driver;
pub mod feed;
pub mod filter;
pub mod news_client;
pub mod render;
pub mod tickers;
pub mod websocket;
