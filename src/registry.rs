use crate::common_scraper::{dedupe_by_title_url, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::export::{self, ExportError};
use crate::models::PropertyRecord;
use crate::price;
use crate::sites;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Whether a site can be scraped over plain HTTP or needs a real browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    Http,
    Browser,
}

/// Tag for every supported site. Declaration order is run priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKey {
    RoyalResort,
    BessoNavi,
    Mitsui,
    TokyuResort,
    Seibu,
    ResortInnovation,
    ResortHome,
    Suumo,
}

impl SiteKey {
    pub const ALL: [SiteKey; 8] = [
        SiteKey::RoyalResort,
        SiteKey::BessoNavi,
        SiteKey::Mitsui,
        SiteKey::TokyuResort,
        SiteKey::Seibu,
        SiteKey::ResortInnovation,
        SiteKey::ResortHome,
        SiteKey::Suumo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteKey::RoyalResort => "royal_resort",
            SiteKey::BessoNavi => "besso_navi",
            SiteKey::Mitsui => "mitsui",
            SiteKey::TokyuResort => "tokyu_resort",
            SiteKey::Seibu => "seibu",
            SiteKey::ResortInnovation => "resort_innovation",
            SiteKey::ResortHome => "resort_home",
            SiteKey::Suumo => "suumo",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SiteKey::RoyalResort => "Royal Resort Karuizawa",
            SiteKey::BessoNavi => "Besso Navi",
            SiteKey::Mitsui => "Mitsui no Mori",
            SiteKey::TokyuResort => "Tokyu Resort",
            SiteKey::Seibu => "Seibu Real Estate",
            SiteKey::ResortInnovation => "Resort Innovation",
            SiteKey::ResortHome => "Resort Home",
            SiteKey::Suumo => "SUUMO",
        }
    }

    pub fn fetch_mode(&self) -> FetchMode {
        match self {
            SiteKey::RoyalResort | SiteKey::Suumo => FetchMode::Browser,
            _ => FetchMode::Http,
        }
    }

    /// 1 runs first.
    pub fn priority(&self) -> u8 {
        match self {
            SiteKey::RoyalResort => 1,
            SiteKey::BessoNavi => 2,
            SiteKey::Mitsui => 3,
            SiteKey::TokyuResort => 4,
            SiteKey::Seibu => 5,
            SiteKey::ResortInnovation => 6,
            SiteKey::ResortHome => 7,
            SiteKey::Suumo => 8,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SiteKey::RoyalResort => "JavaScript-heavy luxury resort properties",
            SiteKey::BessoNavi => "Form-based vacation home search",
            SiteKey::Mitsui => "WordPress-based luxury property developer",
            SiteKey::TokyuResort => "Resort villa search results by area",
            SiteKey::Seibu => "Managed resort properties with paginated lists",
            SiteKey::ResortInnovation => "Static for-sale listing pages",
            SiteKey::ResortHome => "Area and price indexed vacation home search",
            SiteKey::Suumo => "National portal, vacation home search form",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            SiteKey::RoyalResort => "https://www.royal-resort.co.jp",
            SiteKey::BessoNavi => "https://www.besso-navi.com",
            SiteKey::Mitsui => "https://www.mitsuinomori.co.jp",
            SiteKey::TokyuResort => "https://www.tokyu-resort.co.jp",
            SiteKey::Seibu => "https://resort.seiburealestate-pm.co.jp",
            SiteKey::ResortInnovation => "https://www.resortinnovation.com",
            SiteKey::ResortHome => "https://www.resort-home.jp",
            SiteKey::Suumo => "https://suumo.jp",
        }
    }

    pub fn metadata(&self) -> SiteMetadata {
        SiteMetadata {
            key: *self,
            name: self.name(),
            fetch_mode: self.fetch_mode(),
            priority: self.priority(),
            description: self.description(),
            base_url: self.default_base_url(),
        }
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSiteKey(pub String);

impl fmt::Display for UnknownSiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown site key: {}", self.0)
    }
}

impl std::error::Error for UnknownSiteKey {}

impl FromStr for SiteKey {
    type Err = UnknownSiteKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        SiteKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| UnknownSiteKey(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteMetadata {
    pub key: SiteKey,
    pub name: &'static str,
    pub fetch_mode: FetchMode,
    pub priority: u8,
    pub description: &'static str,
    pub base_url: &'static str,
}

/// One site's records inside a multi-site run.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteBatch {
    pub site: SiteKey,
    pub records: Vec<PropertyRecord>,
}

/// Records grouped by site, in the order the sites were run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteResults {
    batches: Vec<SiteBatch>,
}

impl SiteResults {
    /// Replaces any earlier batch for the same site in place.
    pub fn insert(&mut self, site: SiteKey, records: Vec<PropertyRecord>) {
        match self.batches.iter_mut().find(|batch| batch.site == site) {
            Some(batch) => batch.records = records,
            None => self.batches.push(SiteBatch { site, records }),
        }
    }

    pub fn get(&self, site: SiteKey) -> Option<&[PropertyRecord]> {
        self.batches
            .iter()
            .find(|batch| batch.site == site)
            .map(|batch| batch.records.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteBatch> {
        self.batches.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &PropertyRecord> {
        self.batches.iter().flat_map(|batch| batch.records.iter())
    }

    pub fn site_count(&self) -> usize {
        self.batches.len()
    }

    pub fn total_records(&self) -> usize {
        self.batches.iter().map(|batch| batch.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStats {
    pub site_name: String,
    pub properties_found: usize,
    pub duration_secs: f64,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteReport {
    pub site_name: String,
    pub total_properties: usize,
    pub valid_properties: usize,
    pub invalid_properties: usize,
    pub success_rate: f64,
    pub meets_minimum: bool,
    pub has_karuizawa_properties: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_sites_scraped: usize,
    pub total_properties_found: usize,
    pub total_valid_properties: usize,
    pub overall_success_rate: f64,
    pub scraping_timestamp: DateTime<Local>,
}

/// Yen values of the prices written in 万円.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceAnalysis {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub summary: RunSummary,
    pub site_breakdown: BTreeMap<SiteKey, SiteReport>,
    pub price_analysis: Option<PriceAnalysis>,
    pub property_types: BTreeMap<String, usize>,
    pub scraping_stats: BTreeMap<SiteKey, SiteStats>,
}

/// Progress notifications emitted by [`ScraperRegistry::run_many_with`].
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    Started { site: SiteKey, index: usize, total: usize },
    Finished { site: SiteKey, stats: &'a SiteStats },
}

type Constructor = Box<dyn Fn(SiteKey, &ScraperConfig) -> Result<Box<dyn SiteScraper>, ScrapeError>>;

/// Builds site scrapers by key and runs them one after another.
pub struct ScraperRegistry {
    config: ScraperConfig,
    constructor: Constructor,
    inter_site_delay: Duration,
    stats: BTreeMap<SiteKey, SiteStats>,
}

impl ScraperRegistry {
    pub fn new(config: ScraperConfig) -> Self {
        Self::with_constructor(config, sites::build)
    }

    /// Use a custom scraper constructor, e.g. fixture scrapers in tests.
    pub fn with_constructor<F>(config: ScraperConfig, constructor: F) -> Self
    where
        F: Fn(SiteKey, &ScraperConfig) -> Result<Box<dyn SiteScraper>, ScrapeError> + 'static,
    {
        let inter_site_delay = config.rate_limit.inter_site_delay();
        Self {
            config,
            constructor: Box::new(constructor),
            inter_site_delay,
            stats: BTreeMap::new(),
        }
    }

    pub fn with_inter_site_delay(mut self, delay: Duration) -> Self {
        self.inter_site_delay = delay;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Metadata of every site, in priority order.
    pub fn available() -> Vec<SiteMetadata> {
        let mut sites: Vec<SiteMetadata> = SiteKey::ALL.iter().map(SiteKey::metadata).collect();
        sites.sort_by_key(|site| site.priority);
        sites
    }

    /// Build the scraper for `key`. Unknown keys and construction failures are
    /// logged and yield `None`.
    pub fn create(&self, key: &str) -> Option<Box<dyn SiteScraper>> {
        let site = match key.parse::<SiteKey>() {
            Ok(site) => site,
            Err(e) => {
                error!("{}. Available: {}", e, available_keys());
                return None;
            }
        };
        match (self.constructor)(site, &self.config) {
            Ok(scraper) => Some(scraper),
            Err(e) => {
                error!("Failed to create {} scraper: {}", site.name(), e);
                None
            }
        }
    }

    /// Scrape one site and record its statistics. Failures yield no records.
    pub fn run_one(&mut self, site: SiteKey) -> Vec<PropertyRecord> {
        info!("Running {} scraper", site.name());
        let started = Instant::now();

        let outcome = (self.constructor)(site, &self.config).and_then(|mut scraper| scraper.scrape_listings());
        let duration_secs = started.elapsed().as_secs_f64();

        let (records, stats) = match outcome {
            Ok(records) => {
                info!(
                    "{} scraper finished: {} properties in {:.1}s",
                    site.name(),
                    records.len(),
                    duration_secs
                );
                let stats = SiteStats {
                    site_name: site.name().to_string(),
                    properties_found: records.len(),
                    duration_secs,
                    success: true,
                    error: None,
                    timestamp: Local::now(),
                };
                (records, stats)
            }
            Err(e) => {
                error!("{} scraper failed: {}", site.name(), e);
                let stats = SiteStats {
                    site_name: site.name().to_string(),
                    properties_found: 0,
                    duration_secs,
                    success: false,
                    error: Some(e.to_string()),
                    timestamp: Local::now(),
                };
                (Vec::new(), stats)
            }
        };

        self.stats.insert(site, stats);
        records
    }

    pub fn run_many(&mut self, keys: &[String], parallel: bool) -> SiteResults {
        self.run_many_with(keys, parallel, |_| {})
    }

    /// Run the given sites (all when empty) sequentially in priority order,
    /// pausing between sites. Unknown keys are skipped with a warning.
    pub fn run_many_with<F>(&mut self, keys: &[String], parallel: bool, mut on_event: F) -> SiteResults
    where
        F: FnMut(RunEvent<'_>),
    {
        if parallel {
            warn!("Parallel scraping is not supported; running sites sequentially");
        }

        let mut sites: Vec<SiteKey> = if keys.is_empty() {
            SiteKey::ALL.to_vec()
        } else {
            keys.iter()
                .filter_map(|key| match key.parse::<SiteKey>() {
                    Ok(site) => Some(site),
                    Err(e) => {
                        warn!("Skipping {}", e);
                        None
                    }
                })
                .collect()
        };
        sites.sort_by_key(SiteKey::priority);
        sites.dedup();

        let mut results = SiteResults::default();
        let total = sites.len();
        for (index, site) in sites.into_iter().enumerate() {
            if index > 0 && !self.inter_site_delay.is_zero() {
                info!("Waiting {:.1}s before the next site", self.inter_site_delay.as_secs_f64());
                thread::sleep(self.inter_site_delay);
            }

            on_event(RunEvent::Started { site, index, total });
            let records = self.run_one(site);
            if let Some(stats) = self.stats.get(&site) {
                on_event(RunEvent::Finished { site, stats });
            }
            results.insert(site, records);
        }
        results
    }

    /// Flatten all sites into one list; first-seen wins on `(title, source_url)`.
    pub fn combine(&self, results: &SiteResults) -> Vec<PropertyRecord> {
        let all: Vec<PropertyRecord> = results.records().cloned().collect();
        let before = all.len();
        let combined = dedupe_by_title_url(all);
        info!("Combined {} properties ({} duplicates removed)", combined.len(), before - combined.len());
        combined
    }

    /// Re-validate each site's records with that site's rules.
    pub fn validate_all(&self, results: &SiteResults) -> BTreeMap<SiteKey, SiteReport> {
        let require_karuizawa = self.config.validation.require_karuizawa;
        let minimum = self.config.validation.min_properties_per_site;

        results
            .iter()
            .map(|batch| {
                let valid: Vec<&PropertyRecord> = batch
                    .records
                    .iter()
                    .filter(|record| sites::validate_for(batch.site, record, require_karuizawa))
                    .collect();
                let total = batch.records.len();
                let report = SiteReport {
                    site_name: batch.site.name().to_string(),
                    total_properties: total,
                    valid_properties: valid.len(),
                    invalid_properties: total - valid.len(),
                    success_rate: rate(valid.len(), total),
                    meets_minimum: valid.len() >= minimum,
                    has_karuizawa_properties: valid.iter().any(|record| record.contains_karuizawa()),
                };
                (batch.site, report)
            })
            .collect()
    }

    pub fn summarize(&self, results: &SiteResults) -> SummaryReport {
        let combined = self.combine(results);
        let site_breakdown = self.validate_all(results);

        let total_valid: usize = site_breakdown.values().map(|report| report.valid_properties).sum();

        let mut property_types = BTreeMap::new();
        for record in combined.iter().filter(|record| !record.property_type.is_empty()) {
            *property_types.entry(record.property_type.clone()).or_insert(0) += 1;
        }

        SummaryReport {
            summary: RunSummary {
                total_sites_scraped: results.site_count(),
                total_properties_found: combined.len(),
                total_valid_properties: total_valid,
                // per-site valid counts over the deduplicated total
                overall_success_rate: rate(total_valid, combined.len()),
                scraping_timestamp: Local::now(),
            },
            site_breakdown,
            price_analysis: price_analysis(&combined),
            property_types,
            scraping_stats: self.stats.clone(),
        }
    }

    pub fn export(&self, results: &SiteResults, format: &str) -> Result<String, ExportError> {
        export::export(results, format)
    }

    pub fn stats(&self) -> BTreeMap<SiteKey, SiteStats> {
        self.stats.clone()
    }
}

fn available_keys() -> String {
    SiteKey::ALL.map(|key| key.as_str()).join(", ")
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn price_analysis(records: &[PropertyRecord]) -> Option<PriceAnalysis> {
    let prices: Vec<u64> = records
        .iter()
        .filter_map(|record| price::man_en_price_in_yen(&record.price))
        .collect();

    let min = *prices.iter().min()?;
    let max = *prices.iter().max()?;
    let sum: u64 = prices.iter().sum();
    Some(PriceAnalysis {
        min,
        max,
        avg: sum as f64 / prices.len() as f64,
        count: prices.len(),
    })
}
