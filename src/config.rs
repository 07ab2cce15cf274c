//! Service configuration from command-line flags and `A3S_SCRAPE_*` variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::browser::BrowserLaunchConfig;
use crate::cache::CacheConfig;
use crate::content::ContentSettings;
use crate::logging::{LogConfig, LogFormat};
use crate::pool::PoolConfig;
use crate::search::SearchSettings;

/// Runtime configuration of the scraping service.
#[derive(Parser, Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    #[arg(long, env = "A3S_SCRAPE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "A3S_SCRAPE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Maximum number of browsers kept alive
    #[arg(long, env = "A3S_SCRAPE_POOL_SIZE", default_value_t = 2)]
    pub pool_size: usize,

    /// Seconds a request waits for a free browser
    #[arg(long, env = "A3S_SCRAPE_ACQUIRE_TIMEOUT", default_value_t = 60)]
    pub acquire_timeout_secs: u64,

    /// Seconds search results stay cached
    #[arg(long, env = "A3S_SCRAPE_CACHE_TTL", default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    /// Seconds between sweeps of expired cache entries
    #[arg(
        long,
        env = "A3S_SCRAPE_SWEEP_INTERVAL",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_secs: u64,

    /// Directory for page snapshots and scraped content
    #[arg(long, env = "A3S_SCRAPE_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Write rendered result pages and scraped content to the data directory
    #[arg(long, env = "A3S_SCRAPE_SAVE_SNAPSHOTS", default_value_t = true, action = ArgAction::Set)]
    pub save_snapshots: bool,

    /// Chrome/Chromium executable (auto-detected when omitted)
    #[arg(long, env = "A3S_SCRAPE_CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Proxy for the browser (e.g. http://127.0.0.1:8080 or socks5://127.0.0.1:1080)
    #[arg(long, env = "A3S_SCRAPE_PROXY")]
    pub proxy: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long, env = "A3S_SCRAPE_HEADED")]
    pub headed: bool,

    /// Seconds allowed for loading a search engine page
    #[arg(long, env = "A3S_SCRAPE_PAGE_LOAD_TIMEOUT", default_value_t = 30)]
    pub page_load_timeout_secs: u64,

    /// Seconds to wait for the search box and result markers
    #[arg(long, env = "A3S_SCRAPE_ELEMENT_TIMEOUT", default_value_t = 10)]
    pub element_timeout_secs: u64,

    /// Milliseconds to pause after submitting a query
    #[arg(long, env = "A3S_SCRAPE_SETTLE_MS", default_value_t = 3000)]
    pub settle_ms: u64,

    /// Seconds allowed for fetching a page in /api/content
    #[arg(long, env = "A3S_SCRAPE_CONTENT_TIMEOUT", default_value_t = 15)]
    pub content_timeout_secs: u64,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "A3S_SCRAPE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "A3S_SCRAPE_JSON_LOGS")]
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["a3s-scrape"])
    }
}

impl ServerConfig {
    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            capacity: self.pool_size,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            ..Default::default()
        }
    }

    pub fn launch_config(&self) -> BrowserLaunchConfig {
        BrowserLaunchConfig {
            headless: !self.headed,
            chrome_path: self.chrome_path.clone(),
            proxy_url: self.proxy.clone(),
            page_load_timeout: Duration::from_secs(self.page_load_timeout_secs),
            ..Default::default()
        }
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            element_timeout: Duration::from_secs(self.element_timeout_secs),
            settle: Duration::from_millis(self.settle_ms),
            data_dir: self.data_dir.clone(),
            save_snapshots: self.save_snapshots,
            cache: self.cache_config(),
        }
    }

    pub fn content_settings(&self) -> ContentSettings {
        ContentSettings {
            timeout: Duration::from_secs(self.content_timeout_secs),
            save_dir: self.save_snapshots.then(|| self.data_dir.clone()),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.log_dir.clone(),
            format: if self.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["a3s-scrape"]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.pool_size, 2);
        assert!(config.save_snapshots);
        assert!(!config.headed);

        let pool = config.pool_config();
        assert_eq!(pool.capacity, 2);
        assert_eq!(pool.acquire_timeout, Duration::from_secs(60));

        let settings = config.search_settings();
        assert_eq!(settings.settle, Duration::from_millis(3000));
        assert_eq!(settings.element_timeout, Duration::from_secs(10));
        assert_eq!(settings.cache.ttl, Duration::from_secs(3600));
        assert_eq!(settings.cache.sweep_interval, Duration::from_secs(300));
        assert_eq!(settings.data_dir, PathBuf::from("data"));

        let launch = config.launch_config();
        assert!(launch.headless);
        assert_eq!(launch.page_load_timeout, Duration::from_secs(30));

        let content = config.content_settings();
        assert_eq!(content.timeout, Duration::from_secs(15));
        assert_eq!(content.save_dir, Some(PathBuf::from("data")));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "a3s-scrape",
            "--port",
            "9000",
            "--pool-size",
            "4",
            "--save-snapshots",
            "false",
            "--headed",
            "--chrome-path",
            "/usr/bin/chromium",
            "--json-logs",
            "--settle-ms",
            "0",
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.pool_config().capacity, 4);
        assert!(!config.search_settings().save_snapshots);
        assert!(config.content_settings().save_dir.is_none());
        assert!(!config.launch_config().headless);
        assert_eq!(
            config.launch_config().chrome_path,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
        assert_eq!(config.log_config().format, LogFormat::Json);
        assert!(config.search_settings().settle.is_zero());
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        assert!(ServerConfig::try_parse_from(["a3s-scrape", "--sweep-interval-secs", "0"]).is_err());
        let config =
            ServerConfig::try_parse_from(["a3s-scrape", "--sweep-interval-secs", "1"]).unwrap();
        assert_eq!(config.cache_config().sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(ServerConfig::try_parse_from(["a3s-scrape", "--port", "http"]).is_err());
    }
}
