//! Search orchestration.
//!
//! A [`Searcher`] checks a driver out of the pool, walks the engine's UI,
//! hands the rendered page to the engine's parser and caches what came back.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, TtlCache};
use crate::driver::{DriverFactory, DriverPage};
use crate::engines::{BingImages, BingWeb, GoogleImages, GoogleWeb};
use crate::pool::{DriverPool, PoolConfig, PoolStats};
use crate::{
    CombinedSearchResponse, Engine, EngineConfig, ImageQuery, ImageResult, ImageSearchResponse,
    ParseOptions, Result, ScrapeError, SearchEngine, SearchQuery, SearchResponse, SearchResult,
};

/// Timing and persistence settings of the search pipeline.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// How long to wait for the search box and for results to render.
    pub element_timeout: Duration,
    /// Pause after submitting a query, before looking for results.
    pub settle: Duration,
    /// Directory receiving page snapshots.
    pub data_dir: PathBuf,
    /// Whether rendered result pages are written to `data_dir`.
    pub save_snapshots: bool,
    pub cache: CacheConfig,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(10),
            settle: Duration::from_millis(3000),
            data_dir: PathBuf::from("data"),
            save_snapshots: true,
            cache: CacheConfig::default(),
        }
    }
}

/// Items scraped from one result page, plus why extraction fell short.
struct Scraped<T> {
    items: Vec<T>,
    error: Option<String>,
    /// The browser failed mid-extraction and must not be reused.
    broken: bool,
}

impl<T> Scraped<T> {
    fn failed(reason: impl std::fmt::Display, broken: bool) -> Self {
        warn!("Error extracting results: {}", reason);
        Self {
            items: Vec::new(),
            error: Some(format!("Error extracting results: {}", reason)),
            broken,
        }
    }
}

/// Browser-driven search over Google and Bing with result caching.
pub struct Searcher {
    pool: DriverPool,
    web_cache: Arc<TtlCache<String, Vec<SearchResult>>>,
    image_cache: Arc<TtlCache<String, Vec<ImageResult>>>,
    google: GoogleWeb,
    bing: BingWeb,
    google_images: GoogleImages,
    bing_images: BingImages,
    settings: SearchSettings,
    sweepers: Mutex<Vec<JoinHandle<()>>>,
}

impl Searcher {
    /// Creates a searcher whose browsers come from `factory`.
    pub fn new(factory: Arc<dyn DriverFactory>, pool: PoolConfig, settings: SearchSettings) -> Self {
        Self {
            pool: DriverPool::new(factory, pool),
            web_cache: Arc::new(TtlCache::from_config(&settings.cache)),
            image_cache: Arc::new(TtlCache::from_config(&settings.cache)),
            google: GoogleWeb::new(),
            bing: BingWeb::new(),
            google_images: GoogleImages::new(),
            bing_images: BingImages::new(),
            settings,
            sweepers: Mutex::new(Vec::new()),
        }
    }

    /// Returns the pipeline settings.
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Configurations of every engine the searcher can drive.
    pub fn engines(&self) -> Vec<&EngineConfig> {
        vec![
            self.google.config(),
            self.bing.config(),
            self.google_images.config(),
            self.bing_images.config(),
        ]
    }

    /// Starts the background tasks evicting expired cache entries.
    pub fn start_sweepers(&self) {
        let interval = self.settings.cache.sweep_interval;
        let mut sweepers = self.sweepers.lock().unwrap_or_else(|e| e.into_inner());
        if !sweepers.is_empty() {
            return;
        }
        sweepers.push(self.web_cache.spawn_sweeper(interval));
        sweepers.push(self.image_cache.spawn_sweeper(interval));
        debug!("Cache sweepers started (every {}s)", interval.as_secs());
    }

    /// Runs a web search.
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse> {
        query.validate()?;
        let start = Instant::now();
        let key = query.cache_key();

        if query.use_cache {
            if let Some(cached) = self.web_cache.get(&key).await {
                info!("Returning cached results for query: '{}'", query.query);
                let total_results = cached.len();
                let results = select_cached(cached, query.num_results, query.include_featured);
                return Ok(SearchResponse {
                    query: query.query,
                    results,
                    total_results,
                    execution_time: start.elapsed().as_secs_f64(),
                    error: None,
                });
            }
        }

        info!(
            "Searching {} for '{}' ({} results)",
            query.engine, query.query, query.num_results
        );
        let options = ParseOptions::new(query.query.clone(), query.num_results)
            .with_featured(query.include_featured);
        let scraped = match query.engine {
            SearchEngine::Google => self.run_engine(&self.google, &options).await?,
            SearchEngine::Bing => self.run_engine(&self.bing, &options).await?,
        };

        if !scraped.items.is_empty() && scraped.error.is_none() {
            self.web_cache.insert(key, scraped.items.clone()).await;
        }

        Ok(SearchResponse {
            query: query.query,
            total_results: scraped.items.len(),
            results: scraped.items,
            execution_time: start.elapsed().as_secs_f64(),
            error: scraped.error,
        })
    }

    /// Runs an image search.
    pub async fn image_search(&self, query: ImageQuery) -> Result<ImageSearchResponse> {
        query.validate()?;
        let start = Instant::now();
        let key = query.cache_key();

        if query.use_cache {
            if let Some(cached) = self.image_cache.get(&key).await {
                info!("Returning cached images for query: '{}'", query.query);
                let total_results = cached.len();
                return Ok(ImageSearchResponse {
                    query: query.query,
                    images: cached.into_iter().take(query.num_results).collect(),
                    total_results,
                    execution_time: start.elapsed().as_secs_f64(),
                    error: None,
                });
            }
        }

        info!(
            "Searching {} images for '{}' ({} results)",
            query.engine, query.query, query.num_results
        );
        let options = ParseOptions::new(query.query.clone(), query.num_results);
        let scraped = match query.engine {
            SearchEngine::Google => self.run_engine(&self.google_images, &options).await?,
            SearchEngine::Bing => self.run_engine(&self.bing_images, &options).await?,
        };

        if !scraped.items.is_empty() && scraped.error.is_none() {
            self.image_cache.insert(key, scraped.items.clone()).await;
        }

        Ok(ImageSearchResponse {
            query: query.query,
            total_results: scraped.items.len(),
            images: scraped.items,
            execution_time: start.elapsed().as_secs_f64(),
            error: scraped.error,
        })
    }

    /// Runs a web and an image search for the same terms concurrently.
    ///
    /// Fails only when both searches fail; otherwise the failing side is
    /// described in `error` and the other side's results are returned.
    pub async fn search_with_images(
        &self,
        query: &str,
        num_results: usize,
        num_images: usize,
        engine: SearchEngine,
        use_cache: bool,
    ) -> Result<CombinedSearchResponse> {
        let web_query = SearchQuery::new(query)
            .with_num_results(num_results)
            .with_engine(engine)
            .with_cache(use_cache);
        let image_query = ImageQuery::new(query)
            .with_num_results(num_images)
            .with_engine(engine)
            .with_cache(use_cache);
        web_query.validate()?;
        image_query.validate()?;

        let start = Instant::now();
        let (web, images) = tokio::join!(self.search(web_query), self.image_search(image_query));

        let mut errors = Vec::new();
        let (results, total_results) = match web {
            Ok(response) => {
                errors.extend(response.error);
                (response.results, response.total_results)
            }
            Err(web_err) => {
                if let Err(image_err) = &images {
                    warn!("Both searches failed: {} / {}", web_err, image_err);
                    return Err(web_err);
                }
                errors.push(format!("Web search failed: {}", web_err));
                (Vec::new(), 0)
            }
        };
        let (images, total_images) = match images {
            Ok(response) => {
                errors.extend(response.error);
                (response.images, response.total_results)
            }
            Err(e) => {
                errors.push(format!("Image search failed: {}", e));
                (Vec::new(), 0)
            }
        };

        Ok(CombinedSearchResponse {
            query: query.to_string(),
            results,
            images,
            total_results,
            total_images,
            execution_time: start.elapsed().as_secs_f64(),
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        })
    }

    /// Empties both caches and returns how many entries were dropped.
    pub async fn clear_cache(&self) -> usize {
        let cleared = self.web_cache.clear().await + self.image_cache.clear().await;
        info!("Cleared {} cached searches", cleared);
        cleared
    }

    /// Number of live cached searches.
    pub async fn cache_len(&self) -> usize {
        self.web_cache.len().await + self.image_cache.len().await
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Stops the cache sweepers and closes every pooled browser.
    pub async fn shutdown(&self) {
        let sweepers: Vec<_> = self
            .sweepers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for sweeper in sweepers {
            sweeper.abort();
        }
        self.pool.shutdown().await;
    }

    /// Checks out a browser, runs one search on it and returns it to the pool.
    async fn run_engine<E: Engine>(
        &self,
        engine: &E,
        options: &ParseOptions,
    ) -> Result<Scraped<E::Item>> {
        let mut driver = self.pool.acquire().await?;

        let page = match driver.open_page().await {
            Ok(page) => page,
            Err(e) => {
                driver.discard();
                return Err(ScrapeError::EngineUnavailable(e.to_string()));
            }
        };

        let outcome = self.drive(engine, page.as_ref(), options).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close tab: {}", e);
        }
        match &outcome {
            Err(e) if e.poisons_driver() => {
                warn!("Discarding browser after error: {}", e);
                driver.discard();
            }
            Ok(scraped) if scraped.broken => {
                warn!("Discarding browser after a failed extraction");
                driver.discard();
            }
            _ => {}
        }
        outcome
    }

    async fn drive<E: Engine>(
        &self,
        engine: &E,
        page: &dyn DriverPage,
        options: &ParseOptions,
    ) -> Result<Scraped<E::Item>> {
        let config = engine.config();
        let wait = self.settings.element_timeout;

        page.goto(&config.home_url)
            .await
            .map_err(|e| ScrapeError::EngineUnavailable(e.to_string()))?;
        debug!("Loaded {}", config.home_url);

        if let Some(ref consent) = config.consent_button {
            match page.click(consent).await {
                Ok(true) => debug!("Accepted cookie consent on {}", config.name),
                Ok(false) => {}
                Err(e) => debug!("Consent button click failed: {}", e),
            }
        }

        let search_box = page
            .wait_for(&config.search_box, wait)
            .await
            .map_err(|e| ScrapeError::Submit(e.to_string()))?;
        if !search_box {
            return Err(ScrapeError::Submit(format!(
                "search box '{}' not found within {}s",
                config.search_box,
                wait.as_secs()
            )));
        }
        page.submit_query(&config.search_box, &options.query)
            .await
            .map_err(|e| ScrapeError::Submit(e.to_string()))?;

        if !self.settings.settle.is_zero() {
            tokio::time::sleep(self.settings.settle).await;
        }

        let read = async {
            let rendered = page.wait_for(&config.results_marker, wait).await?;
            let html = page.content().await?;
            Ok::<_, ScrapeError>((rendered, html))
        };
        let (rendered, html) = match read.await {
            Ok(read) => read,
            Err(e) => return Ok(Scraped::failed(&e, e.poisons_driver())),
        };
        self.save_snapshot(config.shortcut.clone(), html.clone());

        let extracted = if let Some(reason) = engine.blocked_reason(&html) {
            warn!("{} blocked the search: {}", config.name, reason);
            Err(reason)
        } else if !rendered {
            Err(format!("results did not appear within {}s", wait.as_secs()))
        } else {
            engine.parse(&html, options).map_err(|e| e.to_string())
        };

        Ok(match extracted {
            Ok(items) => {
                info!("Extracted {} results from {}", items.len(), config.name);
                Scraped {
                    items,
                    error: None,
                    broken: false,
                }
            }
            Err(reason) => Scraped::failed(reason, false),
        })
    }

    /// Writes the rendered page to `data_dir` on a background task.
    fn save_snapshot(&self, prefix: String, html: String) {
        if !self.settings.save_snapshots {
            return;
        }
        let dir = self.settings.data_dir.clone();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.html", prefix, timestamp));
        tokio::spawn(async move {
            let written = async {
                tokio::fs::create_dir_all(&dir).await?;
                tokio::fs::write(&path, html).await
            };
            match written.await {
                Ok(()) => debug!("Saved page snapshot to {}", path.display()),
                Err(e) => warn!("Failed to save page snapshot {}: {}", path.display(), e),
            }
        });
    }
}

/// Featured entries (when wanted) followed by the first `limit` organic results.
fn select_cached(cached: Vec<SearchResult>, limit: usize, include_featured: bool) -> Vec<SearchResult> {
    let (featured, organic): (Vec<_>, Vec<_>) =
        cached.into_iter().partition(SearchResult::is_featured);
    let mut results = if include_featured { featured } else { Vec::new() };
    results.extend(organic.into_iter().take(limit));
    results
}
