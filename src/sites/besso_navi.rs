use crate::common_scraper::{merge_detail_records, HttpSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::{self, PageContext, SelectorCascade};
use crate::fetcher::FormSubmission;
use crate::models::PropertyRecord;
use crate::registry::SiteKey;
use reqwest::Url;
use scraper::Selector;
use std::sync::LazyLock;
use tracing::{debug, info};

const SEARCH_KEYWORD: &str = "軽井沢";
const SEARCH_PATHS: [&str; 4] = ["/b-search", "/search", "/property-search", "/bukken-search"];
const LISTING_PATHS: [&str; 6] = [
    "/properties",
    "/bukken",
    "/listings",
    "/besso",
    "/karuizawa",
    "/property-list",
];
const DETAIL_LINK_SELECTORS: [&str; 2] = ["a[href*='b_id=']", "a[href*='detail']"];

static LISTING_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".property-item",
        ".bukken-item",
        ".search-result-item",
        ".result-item",
        ".besso-item",
        "[class*='bukken']",
        "[class*='property']",
    ])
});
static SEARCH_FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());

pub fn has_listings(page: &ListingPage) -> bool {
    !extract::locate_listings(&page.document, &LISTING_SELECTORS).is_empty()
}

/// The first form on a search page, filled in for a Karuizawa search.
pub fn search_form(page: &ListingPage) -> Option<FormSubmission> {
    let url = Url::parse(&page.url).ok()?;
    let form = page.document.select(&SEARCH_FORM).next()?;
    Some(FormSubmission::from_element(form, &url, SEARCH_KEYWORD))
}

/// Detail links, one per `b_id`.
pub fn detail_links(page: &ListingPage, ctx: &PageContext, limit: usize) -> Vec<String> {
    let mut seen_ids = Vec::new();
    extract::find_links(&page.document, &DETAIL_LINK_SELECTORS, &ctx.base_url, &page.url, |_| true, usize::MAX)
        .into_iter()
        .filter(|link| match property_id(link) {
            Some(id) if seen_ids.contains(&id) => false,
            Some(id) => {
                seen_ids.push(id);
                true
            }
            None => true,
        })
        .take(limit)
        .collect()
}

fn property_id(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let id = url.query_pairs().find(|(key, _)| key == "b_id")?.1.into_owned();
    Some(id)
}

/// Besso Navi: vacation homes behind a search form, with static listing
/// pages as the fallback.
pub struct BessoNaviScraper {
    site: HttpSite,
    detail_links: Vec<String>,
}

impl BessoNaviScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            site: HttpSite::new(SiteKey::BessoNavi, config)?,
            detail_links: Vec::new(),
        })
    }

    fn search_results(&mut self) -> Option<ListingPage> {
        for path in SEARCH_PATHS {
            let url = self.site.url(path);
            let Some(page) = self.site.fetch_page(&url) else { continue };
            let Some(form) = search_form(&page) else {
                debug!("No search form on {}", url);
                continue;
            };
            if let Some(document) = self.site.fetcher.submit_form(&form) {
                let results = ListingPage::new(form.action.clone(), document);
                if has_listings(&results) {
                    info!("Besso Navi search returned results from {}", form.action);
                    return Some(results);
                }
            }
        }
        None
    }
}

impl SiteScraper for BessoNaviScraper {
    fn key(&self) -> SiteKey {
        SiteKey::BessoNavi
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let pages = match self.search_results() {
            Some(results) => vec![results],
            None => {
                info!("Besso Navi search produced nothing, trying listing pages");
                let fetched = self.site.fetch_paths(&LISTING_PATHS);
                if fetched.iter().any(has_listings) {
                    fetched.into_iter().filter(has_listings).collect()
                } else {
                    fetched
                }
            }
        };

        let limit = self.site.limits.max_detail_pages;
        for page in &pages {
            let ctx = self.site.page_context(&page.url);
            for link in detail_links(page, &ctx, limit) {
                if self.detail_links.len() < limit && !self.detail_links.contains(&link) {
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
        let details = self.site.scrape_detail_pages(&self.detail_links);
        merge_detail_records(records, details);
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }
}
