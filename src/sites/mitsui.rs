use crate::common_scraper::{merge_detail_records, HttpSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::{self, PageContext, SelectorCascade};
use crate::models::PropertyRecord;
use crate::registry::SiteKey;
use scraper::Selector;
use std::ops::RangeInclusive;
use std::sync::LazyLock;
use tracing::info;

const LISTING_PATHS: [&str; 1] = ["/karuizawa/"];

const DETAIL_LINK_SELECTORS: [&str; 4] = [
    "a[href*='/realestate/']",
    "a[href*='/karuizawa/'][href*='detail']",
    "a[href*='detail']",
    "a[href*='property']",
];
const DETAIL_KEYWORDS: [&str; 4] = ["realestate", "detail", "property", "bukken"];

/// Text length of a block worth treating as one listing.
const BLOCK_CHARS: RangeInclusive<usize> = 20..=2000;

static CONTENT_AREAS: LazyLock<SelectorCascade> =
    LazyLock::new(|| SelectorCascade::new(&["main", ".main", ".content", "#content", "#main"]));
static CONTENT_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section, article").unwrap());

/// Mitsui no Mori: a WordPress site without listing markup, so listings are
/// text blocks inside the main content area plus linked detail pages.
pub struct MitsuiScraper {
    site: HttpSite,
    detail_links: Vec<String>,
}

impl MitsuiScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            site: HttpSite::new(SiteKey::Mitsui, config)?,
            detail_links: Vec::new(),
        })
    }
}

/// Listing blocks of the content area that yield a title or a price.
pub fn extract_blocks(page: &ListingPage, ctx: &PageContext) -> Vec<PropertyRecord> {
    let area = CONTENT_AREAS
        .first_element(&page.document)
        .unwrap_or_else(|| page.document.root_element());

    area.select(&CONTENT_BLOCKS)
        .filter(|block| BLOCK_CHARS.contains(&extract::inline_text(*block).chars().count()))
        .map(|block| extract::extract_listing(block, ctx))
        .filter(|record| !record.title.is_empty() || !record.price.is_empty())
        .collect()
}

pub fn detail_links(page: &ListingPage, ctx: &PageContext, limit: usize) -> Vec<String> {
    extract::find_links(
        &page.document,
        &DETAIL_LINK_SELECTORS,
        &ctx.base_url,
        &page.url,
        |url| extract::is_property_url(url, &DETAIL_KEYWORDS),
        limit,
    )
}

impl SiteScraper for MitsuiScraper {
    fn key(&self) -> SiteKey {
        SiteKey::Mitsui
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let pages = self.site.fetch_paths(&LISTING_PATHS);
        let limit = self.site.limits.max_detail_pages;
        for page in &pages {
            let ctx = self.site.page_context(&page.url);
            for link in detail_links(page, &ctx, limit) {
                if !self.detail_links.contains(&link) {
                    self.detail_links.push(link);
                }
            }
        }
        self.site.require_pages(pages)
    }

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord> {
        extract_blocks(page, &self.site.page_context(&page.url))
    }

    fn enrich(&mut self, records: &mut Vec<PropertyRecord>) {
        if self.detail_links.is_empty() {
            return;
        }
        info!("Following {} Mitsui detail pages", self.detail_links.len());
        let details = self.site.scrape_detail_pages(&self.detail_links);
        merge_detail_records(records, details);
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }
}
