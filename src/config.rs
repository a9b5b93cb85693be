use crate::rate_limiter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub jitter_secs: [f64; 2],
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 0.33,
            jitter_secs: [0.5, 1.5],
        }
    }
}

impl RateLimitConfig {
    pub fn jitter_range(&self) -> Range<f64> {
        self.jitter_secs[0]..self.jitter_secs[1]
    }

    /// Pause inserted between sites in a multi-site run.
    pub fn inter_site_delay(&self) -> Duration {
        rate_limiter::interval_for(self.requests_per_second)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub wait_timeout_secs: u64,
    pub page_load_timeout_secs: u64,
    pub chrome_path: Option<String>,
    pub max_crash_retries: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            wait_timeout_secs: 15,
            page_load_timeout_secs: 30,
            chrome_path: None,
            max_crash_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_properties_per_site: usize,
    pub require_karuizawa: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_properties_per_site: 1,
            require_karuizawa: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_detail_pages: usize,
    pub max_images: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_detail_pages: 10,
            max_images: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteOverride {
    pub base_url: Option<String>,
    pub requests_per_second: Option<f64>,
}

/// Settings for a scraping run. Every section falls back to its defaults
/// when absent from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub rate_limit: RateLimitConfig,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    pub validation: ValidationConfig,
    pub limits: LimitsConfig,
    pub sites: HashMap<String, SiteOverride>,
}

impl ScraperConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn site_base_url(&self, key: &str, default: &str) -> String {
        self.sites
            .get(key)
            .and_then(|site| site.base_url.clone())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn site_requests_per_second(&self, key: &str) -> f64 {
        self.sites
            .get(key)
            .and_then(|site| site.requests_per_second)
            .unwrap_or(self.rate_limit.requests_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScraperConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ScraperConfig::default());
        assert_eq!(config.limits.max_images, 5);
        assert!(config.browser.headless);
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rate_limit": {{"requests_per_second": 1.0}},
                "sites": {{"suumo": {{"base_url": "https://suumo.example/"}}}}}}"#
        )
        .unwrap();

        let config = ScraperConfig::load(file.path()).unwrap();
        assert_eq!(config.rate_limit.requests_per_second, 1.0);
        assert_eq!(config.rate_limit.jitter_secs, [0.5, 1.5]);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(
            config.site_base_url("suumo", "https://suumo.jp/"),
            "https://suumo.example/"
        );
        assert_eq!(config.site_base_url("seibu", "https://seibu.example/"), "https://seibu.example/");
        assert_eq!(config.site_requests_per_second("suumo"), 1.0);
    }

    #[test]
    fn inter_site_delay_is_bounded() {
        let mut rate_limit = RateLimitConfig::default();
        rate_limit.requests_per_second = 2.0;
        assert_eq!(rate_limit.inter_site_delay(), Duration::from_millis(500));
        rate_limit.requests_per_second = 1e-300;
        assert_eq!(rate_limit.inter_site_delay(), rate_limiter::MAX_INTERVAL);
        rate_limit.requests_per_second = 0.0;
        assert_eq!(rate_limit.inter_site_delay(), Duration::ZERO);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(ScraperConfig::load(file.path()).is_err());
    }
}
