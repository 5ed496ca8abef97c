use serde::{Deserialize, Serialize};

// Prices may arrive as numbers, numeric strings, empty strings or null
fn deserialize_optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        Float(f64),
        String(String),
        Null,
    }

    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::Float(f) => Ok(Some(f)),
        StringOrFloat::String(s) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(de::Error::custom)
            }
        }
        StringOrFloat::Null => Ok(None),
    }
}

/// A single news item as served by `GET /api/articles/{page}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub publication_datetime: String,
    #[serde(default)]
    pub summary: String,
    pub ticker: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub article_url: String,
    #[serde(default)]
    pub market_date: String,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub open_price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub close_price: Option<f64>,
}

/// Body of an article page response.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
}

#[cfg(test)]
pub(crate) fn sample_article(title: &str, ticker: &str, sentiment: &str) -> Article {
    Article {
        title: title.to_string(),
        publication_datetime: "2024-03-01T14:30:00Z".to_string(),
        summary: format!("Summary of {}", title),
        ticker: ticker.to_string(),
        sentiment: sentiment.to_string(),
        image_url: "https://img.example.com/1.png".to_string(),
        article_url: "https://news.example.com/1".to_string(),
        market_date: "2024-03-01".to_string(),
        open_price: Some(100.0),
        close_price: Some(101.0),
    }
}
