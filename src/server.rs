//! HTTP API.
//!
//! Routes:
//!   GET       /api/search
//!   GET       /api/image-search
//!   GET       /api/search-with-images
//!   GET       /api/content
//!   GET       /api/healthcheck
//!   GET|POST  /api/clear-cache

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::browser::BrowserFactory;
use crate::config::ServerConfig;
use crate::content::ContentScraper;
use crate::search::Searcher;
use crate::{
    CombinedSearchResponse, ImageQuery, ImageSearchResponse, PageContentResponse, ScrapeError,
    SearchEngine, SearchQuery, SearchResponse,
};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub searcher: Arc<Searcher>,
    pub content: Arc<ContentScraper>,
}

/// Error returned by handlers, rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub ScrapeError);

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            ScrapeError::InvalidQuery(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScrapeError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ScrapeError::EngineUnavailable(_)
            | ScrapeError::PoolTimeout(_)
            | ScrapeError::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Rejected request: {}", self.0);
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Query string extractor whose rejections use the `{"detail": ...}` body.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(params)) => Ok(Self(params)),
            Err(rejection) => Err(ScrapeError::InvalidQuery(rejection.body_text()).into()),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_web_results() -> usize {
    10
}

fn default_image_results() -> usize {
    20
}

fn parse_engine(name: &str) -> Result<SearchEngine, ApiError> {
    Ok(name.parse::<SearchEngine>()?)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_web_results")]
    pub num_results: usize,
    #[serde(default)]
    pub search_engine: Option<String>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_true")]
    pub include_featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImageSearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_image_results")]
    pub num_results: usize,
    #[serde(default)]
    pub search_engine: Option<String>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

#[derive(Debug, Deserialize)]
pub struct CombinedParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_web_results")]
    pub num_results: usize,
    #[serde(default = "default_web_results")]
    pub num_images: usize,
    #[serde(default)]
    pub search_engine: Option<String>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

#[derive(Debug, Deserialize)]
pub struct ContentParams {
    #[serde(default)]
    pub url: String,
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", get(search_handler))
        .route("/api/image-search", get(image_search_handler))
        .route("/api/search-with-images", get(combined_handler))
        .route("/api/content", get(content_handler))
        .route("/api/healthcheck", get(health_handler))
        .route("/api/clear-cache", get(clear_cache_handler).post(clear_cache_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn search_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<SearchResponse> {
    let engine = parse_engine(params.search_engine.as_deref().unwrap_or("google"))?;
    let query = SearchQuery::new(params.query)
        .with_num_results(params.num_results)
        .with_engine(engine)
        .with_cache(params.use_cache)
        .with_featured(params.include_featured);
    Ok(Json(state.searcher.search(query).await?))
}

async fn image_search_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ImageSearchParams>,
) -> ApiResult<ImageSearchResponse> {
    let engine = parse_engine(params.search_engine.as_deref().unwrap_or("google"))?;
    let query = ImageQuery::new(params.query)
        .with_num_results(params.num_results)
        .with_engine(engine)
        .with_cache(params.use_cache);
    Ok(Json(state.searcher.image_search(query).await?))
}

async fn combined_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CombinedParams>,
) -> ApiResult<CombinedSearchResponse> {
    let engine = parse_engine(params.search_engine.as_deref().unwrap_or("google"))?;
    let response = state
        .searcher
        .search_with_images(
            &params.query,
            params.num_results,
            params.num_images,
            engine,
            params.use_cache,
        )
        .await?;
    Ok(Json(response))
}

async fn content_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ContentParams>,
) -> ApiResult<PageContentResponse> {
    Ok(Json(state.content.scrape(&params.url).await?))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    Json(json!({
        "status": "ok",
        "timestamp": timestamp,
        "pool": state.searcher.pool_stats(),
        "cache_entries": state.searcher.cache_len().await,
    }))
}

async fn clear_cache_handler(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.searcher.clear_cache().await;
    Json(json!({ "status": "ok", "cleared_items": cleared }))
}

/// Runs the HTTP service until Ctrl-C or SIGTERM, then closes all browsers.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let factory = Arc::new(BrowserFactory::new(config.launch_config()));
    let searcher = Arc::new(Searcher::new(
        factory,
        config.pool_config(),
        config.search_settings(),
    ));
    searcher.start_sweepers();
    let content = Arc::new(ContentScraper::from_settings(&config.content_settings())?);

    let app = router(AppState {
        searcher: Arc::clone(&searcher),
        content,
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing browsers");
    searcher.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::driver::fake::{FakeBrowser, FakeFactory};
    use crate::fetcher::fake::StaticFetcher;
    use crate::pool::PoolConfig;
    use crate::search::SearchSettings;

    const GOOGLE_HTML: &str = r#"
        <html><body><div id="search">
            <div class="g"><a href="https://www.rust-lang.org/"><h3>Rust</h3></a><div class="VwiC3b">Home</div></div>
            <div class="g"><a href="https://crates.io/"><h3>Crates</h3></a><div class="VwiC3b">Registry</div></div>
        </div></body></html>
    "#;

    const IMAGES_HTML: &str = r#"
        <html><body><div id="islrg">
            <div data-ri="0"><img src="https://tbn.example.com/1.jpg" alt="One"></div>
        </div></body></html>
    "#;

    const PAGE_HTML: &str =
        "<html><head><title>Example</title></head><body><p>Example paragraph text</p></body></html>";

    fn app_with(browser: &Arc<FakeBrowser>) -> Router {
        let searcher = Searcher::new(
            Arc::new(FakeFactory(Arc::clone(browser))),
            PoolConfig {
                capacity: 1,
                acquire_timeout: Duration::from_millis(200),
            },
            SearchSettings {
                settle: Duration::ZERO,
                element_timeout: Duration::from_millis(50),
                save_snapshots: false,
                ..Default::default()
            },
        );
        let fetcher = StaticFetcher::default().with_page("https://example.com/", PAGE_HTML);
        router(AppState {
            searcher: Arc::new(searcher),
            content: Arc::new(ContentScraper::new(Arc::new(fetcher))),
        })
    }

    fn app() -> Router {
        let browser = FakeBrowser::new();
        browser.serve("https://www.google.com", GOOGLE_HTML);
        browser.serve("https://images.google.com", IMAGES_HTML);
        app_with(&browser)
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        call(app, Method::GET, uri).await
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let app = app();
        let (status, body) = get_json(&app, "/api/search?query=rust&num_results=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "rust");
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
        assert_eq!(body["results"][0]["url"], "https://www.rust-lang.org/");
        assert_eq!(body["total_results"], 1);
        assert!(body["error"].is_null());
        assert!(body["execution_time"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_search_validation_errors() {
        let app = app();

        let (status, body) = get_json(&app, "/api/search?query=").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("empty"));

        let (status, _) = get_json(&app, "/api/search?query=rust&num_results=21").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = get_json(&app, "/api/search?query=rust&search_engine=yahoo").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("yahoo"));
    }

    #[tokio::test]
    async fn test_malformed_parameters_get_json_detail() {
        let app = app();

        for uri in [
            "/api/search?query=rust&num_results=abc",
            "/api/image-search?query=rust&use_cache=maybe",
            "/api/search-with-images?query=rust&num_images=-1",
        ] {
            let (status, body) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
            assert!(body["detail"].is_string(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_engine_unavailable_is_503() {
        let browser = FakeBrowser::new();
        browser.fail_goto.store(true, std::sync::atomic::Ordering::SeqCst);
        let app = app_with(&browser);

        let (status, body) = get_json(&app, "/api/search?query=rust").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to access search engine"));
    }

    #[tokio::test]
    async fn test_image_search_endpoint() {
        let app = app();
        let (status, body) = get_json(&app, "/api/image-search?query=ferris").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images"][0]["title"], "One");

        let (status, _) = get_json(&app, "/api/image-search?query=ferris&num_results=51").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_search_with_images_endpoint() {
        let app = app();
        let (status, body) =
            get_json(&app, "/api/search-with-images?query=rust&num_results=2&num_images=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_results"], 2);
        assert_eq!(body["total_images"], 1);
    }

    #[tokio::test]
    async fn test_content_endpoint() {
        let app = app();

        let (status, body) = get_json(&app, "/api/content?url=https://example.com/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"]["title"], "Example");
        assert_eq!(body["content"]["text_blocks"][0], "Example paragraph text");

        let (status, body) = get_json(&app, "/api/content?url=https://missing.example.com/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["content"].is_null());
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to scrape page"));

        let (status, _) = get_json(&app, "/api/content?url=ftp://example.com").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_healthcheck_and_clear_cache() {
        let app = app();
        get_json(&app, "/api/search?query=rust").await;

        let (status, body) = get_json(&app, "/api/healthcheck").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_f64().unwrap() > 0.0);
        assert_eq!(body["pool"]["capacity"], 1);
        assert_eq!(body["pool"]["idle"], 1);
        assert_eq!(body["cache_entries"], 1);

        let (status, body) = call(&app, Method::POST, "/api/clear-cache").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared_items"], 1);

        let (_, body) = get_json(&app, "/api/clear-cache").await;
        assert_eq!(body["cleared_items"], 0);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ScrapeError::InvalidQuery("q".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ScrapeError::InvalidUrl("u".into()), StatusCode::BAD_REQUEST),
            (ScrapeError::PoolTimeout(60), StatusCode::SERVICE_UNAVAILABLE),
            (ScrapeError::PoolClosed, StatusCode::SERVICE_UNAVAILABLE),
            (ScrapeError::Submit("s".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
