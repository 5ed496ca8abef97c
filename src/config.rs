use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    // Article API
    pub news_api_base_url: String,
    pub news_request_timeout_secs: u64,
    // Dashboard
    pub dashboard_host: String,
    pub dashboard_port: u16,
    pub dashboard_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Don't fail if .env missing

        Ok(Config {
            news_api_base_url: env::var("NEWS_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            news_request_timeout_secs: env::var("NEWS_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .context("Failed to parse NEWS_REQUEST_TIMEOUT_SECS")?,
            dashboard_host: env::var("DASHBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            dashboard_port: env::var("DASHBOARD_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Failed to parse DASHBOARD_PORT")?,
            dashboard_password: env::var("DASHBOARD_PASSWORD").unwrap_or_default(),
        })
    }

    pub fn dashboard_addr(&self) -> String {
        format!("{}:{}", self.dashboard_host, self.dashboard_port)
    }
}
