use crate::common_scraper::{HttpSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::SelectorCascade;
use crate::models::PropertyRecord;
use crate::registry::SiteKey;
use std::sync::LazyLock;

const LISTING_PATHS: [&str; 14] = [
    "/bsearch/area01/",
    "/bsearch/area02/",
    "/bsearch/area03/",
    "/bsearch/area04/",
    "/bsearch/area05/",
    "/bsearch/area06/",
    "/bsearch/price01/",
    "/bsearch/price02/",
    "/bsearch/price03/",
    "/bsearch/price04/",
    "/bsearch/price05/",
    "/bsearch/price06/",
    "/bsearch/own/",
    "/bsearch/map/",
];

/// Site decoration that slips past the shared image filter.
const IMAGE_SKIP: [&str; 15] = [
    "logo", "icon", "btn_", "button", "nav_", "menu_", "header", "footer", "arrow", "bullet", "spacer",
    "line", "bg_", "background", "banner",
];

static LISTING_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".bukken",
        ".bukken-item",
        ".property-item",
        ".list-item",
        ".item",
        "[class*='bukken']",
        "[class*='property']",
        "table tr",
    ])
});

pub fn drop_decoration(urls: &mut Vec<String>) {
    urls.retain(|url| {
        let file = url.rsplit('/').next().unwrap_or(url).to_lowercase();
        !IMAGE_SKIP.iter().any(|keyword| file.contains(keyword))
    });
}

/// Resort Home indexes its stock by area and price band; every index page
/// is a listing page.
pub struct ResortHomeScraper {
    site: HttpSite,
}

impl ResortHomeScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            site: HttpSite::new(SiteKey::ResortHome, config)?,
        })
    }
}

impl SiteScraper for ResortHomeScraper {
    fn key(&self) -> SiteKey {
        SiteKey::ResortHome
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let pages = self.site.fetch_paths(&LISTING_PATHS);
        self.site.require_pages(pages)
    }

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord> {
        let mut records = self.site.extract_listings(page, &LISTING_SELECTORS);
        for record in &mut records {
            drop_decoration(&mut record.image_urls);
        }
        records
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }
}
