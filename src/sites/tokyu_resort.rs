use crate::common_scraper::{merge_detail_records, HttpSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::{self, PageContext, SelectorCascade};
use crate::models::PropertyRecord;
use crate::registry::SiteKey;
use std::sync::LazyLock;
use tracing::info;

const KARUIZAWA_AREA: (&str, &str) = ("HPSRC_AREA_ID[57]", "1");
const VILLA_TYPE: (&str, &str) = ("SHUBETSU_ID[2]", "1");
const AREA_TOP: (&str, &str) = ("area_top_flg", "1");
const DETAIL_LINKS_PER_PAGE: usize = 5;

const DETAIL_LINK_SELECTORS: [&str; 3] = ["a[href*='/detail/']", "a[href*='property']", "a[href*='bukken']"];
const DETAIL_KEYWORDS: [&str; 3] = ["detail", "property", "bukken"];

static LISTING_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".property-item",
        ".property-card",
        ".property",
        ".listing",
        ".item",
        ".result-item",
        ".search-result",
        ".property-result",
        "[class*='property']",
        "[class*='listing']",
        "[class*='result']",
        "[class*='item']",
    ])
});

/// `/search/result?` with percent-encoded parameters.
pub fn search_path(params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("/search/result?{}", query)
}

/// Villa search first, then the area-wide search.
pub fn search_paths() -> Vec<String> {
    vec![
        search_path(&[KARUIZAWA_AREA, VILLA_TYPE, AREA_TOP, ("link_id", "11villa")]),
        search_path(&[KARUIZAWA_AREA, AREA_TOP]),
        search_path(&[KARUIZAWA_AREA]),
    ]
}

pub fn detail_links(page: &ListingPage, ctx: &PageContext) -> Vec<String> {
    extract::find_links(
        &page.document,
        &DETAIL_LINK_SELECTORS,
        &ctx.base_url,
        &page.url,
        |url| extract::is_property_url(url, &DETAIL_KEYWORDS),
        DETAIL_LINKS_PER_PAGE,
    )
}

/// Tokyu Resort's Karuizawa area search.
pub struct TokyuResortScraper {
    site: HttpSite,
    detail_links: Vec<String>,
}

impl TokyuResortScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            site: HttpSite::new(SiteKey::TokyuResort, config)?,
            detail_links: Vec::new(),
        })
    }
}

impl SiteScraper for TokyuResortScraper {
    fn key(&self) -> SiteKey {
        SiteKey::TokyuResort
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let paths = search_paths();
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        let pages = self.site.fetch_paths(&paths);

        for page in &pages {
            let ctx = self.site.page_context(&page.url);
            for link in detail_links(page, &ctx) {
                if !self.detail_links.contains(&link) {
                    self.detail_links.push(link);
                }
            }
        }
        self.site.require_pages(pages)
    }

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord> {
        self.site.extract_listings(page, &LISTING_SELECTORS)
    }

    fn enrich(&mut self, records: &mut Vec<PropertyRecord>) {
        if self.detail_links.is_empty() {
            return;
        }
        info!("Following {} Tokyu Resort detail pages", self.detail_links.len());
        let details = self.site.scrape_detail_pages(&self.detail_links);
        merge_detail_records(records, details);
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }
}
