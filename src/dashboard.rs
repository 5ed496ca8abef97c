use anyhow::{Context, Result};
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::Form;
use serde::{Deserialize, Serialize};
use tower_http::validate_request::ValidateRequestHeaderLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::driver::FeedDriver;
use crate::feed::LoadOutcome;
use crate::filter::{PriceAction, SearchContext, SentimentOption};
use crate::render::FeedPage;
use crate::websocket::ws_handler;

/// Shared state for the feed server.
#[derive(Clone)]
pub struct AppState {
    pub driver: FeedDriver,
}

// ─── Request / response types ──────────────────────────

#[derive(Debug, Deserialize)]
pub struct FilterUpdate {
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    sentiment: Option<SentimentOption>,
    #[serde(default)]
    price_action: Option<PriceAction>,
}

/// Fields posted by the page's filter form. Repeated `tickers` keys collect
/// into the list; an empty select value means "no selection".
#[derive(Debug, Deserialize)]
pub struct FilterForm {
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    price_action: String,
}

fn parse_selection<T: std::str::FromStr>(value: &str) -> Result<Option<T>, T::Err> {
    if value.is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

#[derive(Serialize)]
struct TickersResponse {
    tickers: Vec<String>,
    selected: Vec<String>,
}

// ─── Handlers ──────────────────────────────────────────

fn render_template<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Template error: {}", e),
            )
                .into_response()
        }
    }
}

async fn serve_feed_page(State(state): State<AppState>) -> Response {
    let view = state.driver.feed().snapshot();
    render_template(&FeedPage::from(&view))
}

async fn api_feed(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.driver.feed().snapshot();
    Json(view)
}

async fn api_tickers(State(state): State<AppState>) -> impl IntoResponse {
    let feed = state.driver.feed();
    Json(TickersResponse {
        tickers: feed.tickers().to_vec(),
        selected: feed.filters().tickers.iter().cloned().collect(),
    })
}

async fn api_load_more(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state.driver.load_more().await;
    let status = match outcome {
        LoadOutcome::Skipped { .. } | LoadOutcome::Stale { .. } => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (status, Json(outcome))
}

async fn form_load_more(State(state): State<AppState>) -> impl IntoResponse {
    state.driver.load_more().await;
    Redirect::to("/")
}

async fn api_set_filters(
    State(state): State<AppState>,
    Json(update): Json<FilterUpdate>,
) -> impl IntoResponse {
    let changed = {
        let mut feed = state.driver.feed();
        let tickers = feed.set_selected_tickers(update.tickers);
        let sentiment = feed.set_sentiment(update.sentiment);
        let price_action = feed.set_price_action(update.price_action);
        tickers || sentiment || price_action
    };
    if changed {
        state.driver.notify_filters_changed();
    }
    let view = state.driver.feed().snapshot();
    Json(view)
}

async fn form_set_filters(
    State(state): State<AppState>,
    Form(form): Form<FilterForm>,
) -> Response {
    let sentiment = parse_selection::<SentimentOption>(&form.sentiment);
    let price_action = parse_selection::<PriceAction>(&form.price_action);
    let (sentiment, price_action) = match (sentiment, price_action) {
        (Ok(s), Ok(p)) => (s, p),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Rejected filter form: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let changed = {
        let mut feed = state.driver.feed();
        let tickers = feed.set_selected_tickers(form.tickers);
        let sentiment = feed.set_sentiment(sentiment);
        let price_action = feed.set_price_action(price_action);
        tickers || sentiment || price_action
    };
    if changed {
        state.driver.notify_filters_changed();
    }
    Redirect::to("/").into_response()
}

async fn api_set_search(
    State(state): State<AppState>,
    Json(search): Json<SearchContext>,
) -> impl IntoResponse {
    let changed = state.driver.feed().set_search(search);
    if changed {
        state.driver.notify_filters_changed();
    }
    let view = state.driver.feed().snapshot();
    Json(view)
}

// ─── Router & server startup ───────────────────────────

pub fn build_router(state: AppState, password: &str) -> Router {
    let events = state.driver.events().clone();

    let api_routes = Router::new()
        .route("/api/feed", get(api_feed))
        .route("/api/tickers", get(api_tickers))
        .route("/api/load-more", post(api_load_more))
        .route("/api/filters", put(api_set_filters))
        .route("/api/search", put(api_set_search))
        .route("/ws", get(ws_handler).with_state(events));

    let app = Router::new()
        .route("/", get(serve_feed_page))
        .route("/load-more", post(form_load_more))
        .route("/filters", post(form_set_filters))
        .merge(api_routes)
        .with_state(state);

    if password.is_empty() {
        app
    } else {
        app.layer(ValidateRequestHeaderLayer::basic("admin", password))
    }
}

/// Serve the feed page and its API until the server fails.
pub async fn start_dashboard(config: &Config, driver: FeedDriver) -> Result<()> {
    let state = AppState { driver };

    let app = build_router(state, &config.dashboard_password);
    let addr = config.dashboard_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard to {}", addr))?;

    info!("News feed listening on http://{}", addr);
    axum::serve(listener, app)
        .await
        .context("Dashboard server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news_client::ArticleClient;
    use crate::websocket::{new_event_channel, FeedEvent};
    use axum::body::Body;
    use axum::http::{header, Request};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_articles(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/articles/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": [
                    {"title": "Fed raises rates", "ticker": "AAPL", "sentiment": "Positive",
                     "open_price": 100.0, "close_price": 90.0},
                    {"title": "Cloud growth", "ticker": "MSFT", "sentiment": "Neutral",
                     "open_price": 300.0, "close_price": 310.0},
                    {"title": "New phone", "ticker": "AAPL", "sentiment": "Negative",
                     "open_price": 101.0, "close_price": null}
                ]
            })))
            .mount(server)
            .await;
    }

    fn test_state(server: &MockServer) -> AppState {
        let client = ArticleClient::with_client(reqwest::Client::new(), &server.uri());
        AppState {
            driver: FeedDriver::new(client, new_event_channel()),
        }
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_feed_before_first_load() {
        let server = MockServer::start().await;
        let app = build_router(test_state(&server), "");

        let resp = app
            .oneshot(Request::get("/api/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"]["state"], "initial");
        assert_eq!(json["footer"], "full_page_loading");
        assert_eq!(json["next_page"], 1);
    }

    #[tokio::test]
    async fn test_load_more_endpoint() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        let app = build_router(state.clone(), "");

        let resp = app
            .oneshot(
                Request::post("/api/load-more")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["outcome"], "appended");
        assert_eq!(json["added"], 3);
        assert_eq!(state.driver.feed().page(), 2);
    }

    #[tokio::test]
    async fn test_set_filters_endpoint() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        state.driver.load_more().await;
        let app = build_router(state, "");

        let resp = app
            .oneshot(json_request(
                "PUT",
                "/api/filters",
                serde_json::json!({ "tickers": ["AAPL"], "price_action": "Negative" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let cards = json["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0]["title"], "Fed raises rates");
        assert_eq!(json["footer"], "load_more");
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        state.driver.load_more().await;
        let app = build_router(state, "");

        let resp = app
            .oneshot(json_request(
                "PUT",
                "/api/search",
                serde_json::json!({ "query": "cloud", "category": "News" }),
            ))
            .await
            .unwrap();

        let json = body_json(resp).await;
        let cards = json["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0]["ticker"], "MSFT");
    }

    #[tokio::test]
    async fn test_tickers_endpoint() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        state.driver.load_more().await;
        let app = build_router(state, "");

        let resp = app
            .oneshot(Request::get("/api/tickers").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["tickers"], serde_json::json!(["AAPL", "MSFT"]));
        assert_eq!(json["selected"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_feed_html_served() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        state.driver.load_more().await;
        let app = build_router(state, "");

        let resp = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("View the latest financial news"));
        assert!(html.contains("Cloud growth"));
        assert!(html.contains("Load More"));
        assert!(html.contains(r#"action="/filters""#));
        assert!(html.contains("new WebSocket"));
    }

    #[tokio::test]
    async fn test_form_load_more_redirects() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let app = build_router(test_state(&server), "");

        let resp = app
            .oneshot(Request::post("/load-more").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/");
    }

    fn form_request(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_filter_form_applies_selection() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        state.driver.load_more().await;
        let mut rx = state.driver.events().subscribe();
        let app = build_router(state.clone(), "");

        let resp = app
            .oneshot(form_request("/filters", "tickers=AAPL&price_action=Negative&sentiment="))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/");

        let mut feed = state.driver.feed();
        assert!(feed.filters().sentiment.is_none());
        let titles: Vec<String> = feed.visible().iter().map(|a| a.title.clone()).collect();
        assert_eq!(titles, vec!["Fed raises rates"]);
        assert!(matches!(rx.try_recv().unwrap(), FeedEvent::FiltersChanged { visible: 1 }));
    }

    #[tokio::test]
    async fn test_filter_form_collects_repeated_tickers() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        state.driver.load_more().await;
        state.driver.feed().set_price_action(Some(PriceAction::Positive));
        let app = build_router(state.clone(), "");

        let resp = app
            .oneshot(form_request("/filters", "tickers=AAPL&tickers=MSFT"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let feed = state.driver.feed();
        assert_eq!(feed.filters().tickers.len(), 2);
        // An omitted select clears the earlier choice
        assert!(feed.filters().price_action.is_none());
    }

    #[tokio::test]
    async fn test_filter_form_rejects_unknown_option() {
        let server = MockServer::start().await;
        let state = test_state(&server);
        let app = build_router(state.clone(), "");

        let resp = app
            .oneshot(form_request("/filters", "sentiment=Bullish"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.driver.feed().filters().is_passthrough());
    }

    #[tokio::test]
    async fn test_socket_receives_page_loaded() {
        let server = MockServer::start().await;
        mock_articles(&server).await;
        let state = test_state(&server);
        let app = build_router(state.clone(), "");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .unwrap();

        // The handler subscribes before reading, so a pong means it is listening
        socket.send(Message::Ping(b"ready".to_vec())).await.unwrap();
        loop {
            match socket.next().await.unwrap().unwrap() {
                Message::Pong(_) => break,
                other => panic!("expected pong, got {:?}", other),
            }
        }

        state.driver.load_more().await;

        let text = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match socket.next().await.unwrap().unwrap() {
                    Message::Text(text) => break text,
                    Message::Pong(_) => continue,
                    other => panic!("expected text frame, got {:?}", other),
                }
            }
        })
        .await
        .unwrap();
        let event: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(event["type"], "page_loaded");
        assert_eq!(event["page"], 1);
        assert_eq!(event["total_articles"], 3);
    }

    #[tokio::test]
    async fn test_password_required_when_set() {
        let server = MockServer::start().await;
        let app = build_router(test_state(&server), "secret");

        let resp = app
            .oneshot(Request::get("/api/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
