use crate::browser::{BrowserError, BrowserFetcher, CrashRecovery};
use crate::config::{LimitsConfig, ScraperConfig};
use crate::extract::{self, PageContext, SelectorCascade};
use crate::fetcher::{FetchError, HttpFetcher};
use crate::models::PropertyRecord;
use crate::price;
use crate::rate_limiter::RateLimiter;
use crate::registry::SiteKey;
use reqwest::Url;
use scraper::Html;
use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("no listing page could be fetched from {url}")]
    Fetch { url: String },
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error(transparent)]
    Http(#[from] FetchError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// A fetched listing or search-result page.
pub struct ListingPage {
    pub url: String,
    pub document: Html,
}

impl ListingPage {
    pub fn new(url: impl Into<String>, document: Html) -> Self {
        Self {
            url: url.into(),
            document,
        }
    }

    pub fn from_html(url: impl Into<String>, html: &str) -> Self {
        Self::new(url, Html::parse_document(html))
    }
}

/// One scraper per target site: fetch pages, extract records, validate them.
pub trait SiteScraper {
    fn key(&self) -> SiteKey;

    fn name(&self) -> &'static str {
        self.key().name()
    }

    /// Obtain the listing pages. Fails only when nothing at all could be loaded.
    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError>;

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord>;

    /// Follow detail pages to fill in missing fields or add listings.
    fn enrich(&mut self, _records: &mut Vec<PropertyRecord>) {}

    fn validate(&self, record: &PropertyRecord) -> bool {
        base_validate(record, true)
    }

    fn dedupe(&self, records: Vec<PropertyRecord>) -> Vec<PropertyRecord> {
        dedupe_by_title_url(records)
    }

    /// Release the fetcher's resources. Called once scraping finishes.
    fn close(&mut self) {}

    fn scrape_listings(&mut self) -> Result<Vec<PropertyRecord>, ScrapeError> {
        info!("Starting {} scraping", self.name());

        let pages = match self.fetch_pages() {
            Ok(pages) => pages,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        let mut records = Vec::new();
        for page in &pages {
            let found = self.extract(page);
            debug!("Extracted {} candidate listings from {}", found.len(), page.url);
            records.extend(found);
        }
        self.enrich(&mut records);
        self.close();

        let total = records.len();
        records.retain(|record| {
            let keep = self.validate(record);
            if !keep {
                debug!("Dropping invalid listing: {:?} ({})", record.title, record.source_url);
            }
            keep
        });
        let records = self.dedupe(records);

        info!(
            "{}: {} valid properties from {} candidates",
            self.name(),
            records.len(),
            total
        );
        Ok(records)
    }
}

/// Required fields present, price plausible and, when required, in Karuizawa.
pub fn base_validate(record: &PropertyRecord, require_karuizawa: bool) -> bool {
    let missing = record.missing_required_fields();
    if !missing.is_empty() {
        debug!("Missing required fields: {}", missing.join(", "));
        return false;
    }
    if require_karuizawa && !record.contains_karuizawa() {
        debug!("Not a Karuizawa property: {}", record.title);
        return false;
    }
    if !price::is_plausible(&record.price) {
        debug!("Implausible price {} for {}", record.price, record.title);
        return false;
    }
    true
}

/// First-seen wins on the lowercase `(title, source_url)` key.
pub fn dedupe_by_title_url(records: Vec<PropertyRecord>) -> Vec<PropertyRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert((record.title.to_lowercase(), record.source_url.clone())))
        .collect()
}

/// First-seen wins on the lowercase `(title, price, location)` key.
pub fn dedupe_by_title_price_location(records: Vec<PropertyRecord>) -> Vec<PropertyRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            seen.insert((
                record.title.to_lowercase(),
                record.price.to_lowercase(),
                record.location.to_lowercase(),
            ))
        })
        .collect()
}

/// HTTP plumbing shared by the sites that need no JavaScript.
pub struct HttpSite {
    pub key: SiteKey,
    pub base_url: Url,
    pub fetcher: HttpFetcher,
    pub limits: LimitsConfig,
    pub require_karuizawa: bool,
}

impl HttpSite {
    pub fn new(key: SiteKey, config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let base_url = site_base_url(key, config)?;
        let limiter = RateLimiter::new(config.site_requests_per_second(key.as_str()))
            .with_jitter(config.rate_limit.jitter_range());
        let fetcher = HttpFetcher::new(&config.http, limiter)?;

        Ok(Self {
            key,
            base_url,
            fetcher,
            limits: config.limits.clone(),
            require_karuizawa: config.validation.require_karuizawa,
        })
    }

    pub fn url(&self, path: &str) -> String {
        self.base_url
            .join(path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, path.trim_start_matches('/')))
    }

    pub fn fetch_page(&mut self, url: &str) -> Option<ListingPage> {
        self.fetcher
            .fetch_document(url)
            .map(|document| ListingPage::new(url, document))
    }

    /// Fetch every path; failures are logged and skipped.
    pub fn fetch_paths(&mut self, paths: &[&str]) -> Vec<ListingPage> {
        let mut pages = Vec::new();
        for path in paths {
            let url = self.url(path);
            match self.fetch_page(&url) {
                Some(page) => pages.push(page),
                None => warn!("Could not load page: {}", url),
            }
        }
        pages
    }

    /// Error out when a site produced no page at all.
    pub fn require_pages(&self, pages: Vec<ListingPage>) -> Result<Vec<ListingPage>, ScrapeError> {
        if pages.is_empty() {
            Err(ScrapeError::Fetch {
                url: self.base_url.to_string(),
            })
        } else {
            Ok(pages)
        }
    }

    pub fn page_context(&self, page_url: &str) -> PageContext {
        PageContext::new(self.base_url.clone(), page_url, self.limits.max_images)
    }

    pub fn extract_listings(&self, page: &ListingPage, selectors: &SelectorCascade) -> Vec<PropertyRecord> {
        listings_from_page(page, selectors, &self.page_context(&page.url))
    }

    /// Pagination links (up to `limit`) found on `page`.
    pub fn pagination_links(&self, page: &ListingPage, limit: usize) -> Vec<String> {
        extract::find_links(
            &page.document,
            &PAGINATION_SELECTORS,
            &self.base_url,
            &page.url,
            |_| true,
            limit,
        )
    }

    /// Fetch each link as a detail page and turn it into a record.
    pub fn scrape_detail_pages(&mut self, links: &[String]) -> Vec<PropertyRecord> {
        let mut records = Vec::new();
        for link in links.iter().take(self.limits.max_detail_pages) {
            if let Some(page) = self.fetch_page(link) {
                let record = extract::extract_detail_page(&page.document, &self.page_context(link));
                records.push(record);
            }
        }
        records
    }
}

/// Chrome plumbing shared by the sites that render listings with JavaScript.
pub struct BrowserSite {
    pub key: SiteKey,
    pub base_url: Url,
    pub browser: BrowserFetcher,
    pub limits: LimitsConfig,
    pub require_karuizawa: bool,
}

impl BrowserSite {
    pub fn new(key: SiteKey, config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let base_url = site_base_url(key, config)?;
        let browser = BrowserFetcher::new(config.browser.clone(), config.http.user_agent.clone())?;

        Ok(Self {
            key,
            base_url,
            browser,
            limits: config.limits.clone(),
            require_karuizawa: config.validation.require_karuizawa,
        })
    }

    pub fn url(&self, path: &str) -> String {
        self.base_url
            .join(path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, path.trim_start_matches('/')))
    }

    pub fn ensure_launched(&mut self) -> Result<(), ScrapeError> {
        if self.browser.is_launched() || self.browser.launch() {
            Ok(())
        } else {
            Err(BrowserError::Launch(format!("could not start Chrome for {}", self.key.name())).into())
        }
    }

    /// Navigate with crash recovery, dismiss popups, wait `settle` seconds and
    /// return the rendered page.
    pub fn load_page(&mut self, url: &str, settle: Range<f64>) -> Result<ListingPage, ScrapeError> {
        self.ensure_launched()?;
        let html = self.browser.execute_with_recovery(|browser| {
            browser.try_goto(url)?;
            browser.handle_popup_if_present();
            browser.page_source_after_js(settle.clone())
        })?;
        if self.browser.check_for_captcha() {
            warn!("Possible CAPTCHA on {}", url);
        }
        Ok(ListingPage::from_html(url, &html))
    }

    pub fn page_context(&self, page_url: &str) -> PageContext {
        PageContext::new(self.base_url.clone(), page_url, self.limits.max_images)
    }

    pub fn extract_listings(&self, page: &ListingPage, selectors: &SelectorCascade) -> Vec<PropertyRecord> {
        listings_from_page(page, selectors, &self.page_context(&page.url))
    }

    pub fn close(&mut self) {
        self.browser.teardown();
    }
}

/// Merge detail-page records into the listing records: a detail record for a
/// known URL fills that record's gaps, an unknown one is appended.
pub fn merge_detail_records(records: &mut Vec<PropertyRecord>, details: Vec<PropertyRecord>) {
    for detail in details {
        match records.iter_mut().find(|r| r.source_url == detail.source_url) {
            Some(existing) => existing.fill_missing_from(&detail),
            None => records.push(detail),
        }
    }
}

pub const PAGINATION_SELECTORS: [&str; 6] = [
    ".pagination a",
    ".pager a",
    "a[class*='next']",
    "a[class*='more']",
    "a[href*='page']",
    "a[rel='next']",
];

pub fn site_base_url(key: SiteKey, config: &ScraperConfig) -> Result<Url, ScrapeError> {
    let raw = config.site_base_url(key.as_str(), key.default_base_url());
    Url::parse(&raw).map_err(|e| ScrapeError::InvalidBaseUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })
}

/// Locate listing elements on a page and extract one record from each.
pub fn listings_from_page(
    page: &ListingPage,
    selectors: &SelectorCascade,
    ctx: &PageContext,
) -> Vec<PropertyRecord> {
    extract::locate_listings(&page.document, selectors)
        .into_iter()
        .map(|element| extract::extract_listing(element, ctx))
        .collect()
}
