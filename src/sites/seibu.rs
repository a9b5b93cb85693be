use crate::common_scraper::{merge_detail_records, HttpSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::{self, PageContext, SelectorCascade};
use crate::models::PropertyRecord;
use crate::registry::SiteKey;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};

const LISTING_PATHS: [&str; 5] = [
    "/karuizawa/property/list/",
    "/karuizawa/",
    "/property/list/",
    "/property/",
    "/",
];
const MAX_PAGINATION_LINKS: usize = 3;
const DETAIL_LINKS_PER_PAGE: usize = 5;

const DETAIL_LINK_SELECTORS: [&str; 6] = [
    "a[href*='property']",
    "a[href*='detail']",
    "a[href*='estate']",
    "a[href*='villa']",
    "a[href*='house']",
    "a[href*='managed']",
];
const DETAIL_KEYWORDS: [&str; 6] = ["property", "detail", "estate", "villa", "house", "managed"];

static LISTING_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".property-item",
        ".property-card",
        ".estate-item",
        ".real-estate-item",
        ".property",
        ".listing",
        ".item",
        ".result-item",
        "[class*='property']",
        "[class*='estate']",
        "[class*='listing']",
        "[class*='item']",
    ])
});

/// Links to single properties; list and pagination pages are excluded.
pub fn detail_links(page: &ListingPage, ctx: &PageContext) -> Vec<String> {
    extract::find_links(
        &page.document,
        &DETAIL_LINK_SELECTORS,
        &ctx.base_url,
        &page.url,
        |url| {
            let lower = url.to_lowercase();
            extract::is_property_url(url, &DETAIL_KEYWORDS) && !lower.contains("/list") && !lower.contains("page=")
        },
        DETAIL_LINKS_PER_PAGE,
    )
}

/// Seibu Real Estate's managed resort properties.
pub struct SeibuScraper {
    site: HttpSite,
    detail_links: Vec<String>,
}

impl SeibuScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            site: HttpSite::new(SiteKey::Seibu, config)?,
            detail_links: Vec::new(),
        })
    }
}

impl SiteScraper for SeibuScraper {
    fn key(&self) -> SiteKey {
        SiteKey::Seibu
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let mut pages = self.site.fetch_paths(&LISTING_PATHS);
        let mut visited: HashSet<String> = pages.iter().map(|page| page.url.clone()).collect();

        let mut follow = Vec::new();
        for page in &pages {
            for link in self.site.pagination_links(page, MAX_PAGINATION_LINKS) {
                if visited.insert(link.clone()) {
                    follow.push(link);
                }
            }
        }
        debug!("Following {} Seibu pagination links", follow.len());
        for link in follow {
            if let Some(page) = self.site.fetch_page(&link) {
                pages.push(page);
            }
        }

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
        info!("Following {} Seibu detail pages", self.detail_links.len());
        let details = self.site.scrape_detail_pages(&self.detail_links);
        merge_detail_records(records, details);
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    const LIST: &str = r#"<html><body>
        <div class="estate-list">
          <div class="estate-item"><a href="/karuizawa/property/detail/5501/"><h3>軽井沢 プリンスランド 別荘</h3></a>
            <span class="price">3,680万円</span><span class="location">長野県北佐久郡軽井沢町発地</span></div>
          <div class="estate-item"><a href="/karuizawa/property/detail/5502/"><h3>軽井沢 南ケ丘 山荘</h3></a>
            <span class="price">5,200万円</span></div>
        </div>
        <div class="pagination"><a href="/karuizawa/property/list/?page=2">2</a><a href="/karuizawa/property/list/?page=3">3</a></div>
      </body></html>"#;

    fn page() -> ListingPage {
        ListingPage::from_html("https://resort.seiburealestate-pm.co.jp/karuizawa/property/list/", LIST)
    }

    fn ctx(page: &ListingPage) -> PageContext {
        PageContext::new(
            Url::parse("https://resort.seiburealestate-pm.co.jp").unwrap(),
            page.url.clone(),
            5,
        )
    }

    #[test]
    fn estate_items_extracted() {
        let page = page();
        let found = extract::locate_listings(&page.document, &LISTING_SELECTORS);
        assert_eq!(found.len(), 2);
        let record = extract::extract_listing(found[0], &ctx(&page));
        assert_eq!(record.title, "軽井沢 プリンスランド 別荘");
        assert_eq!(record.property_type, "別荘");
        assert_eq!(
            record.source_url,
            "https://resort.seiburealestate-pm.co.jp/karuizawa/property/detail/5501/"
        );
    }

    #[test]
    fn detail_links_skip_pagination() {
        let page = page();
        let links = detail_links(&page, &ctx(&page));
        assert_eq!(
            links,
            vec![
                "https://resort.seiburealestate-pm.co.jp/karuizawa/property/detail/5501/".to_string(),
                "https://resort.seiburealestate-pm.co.jp/karuizawa/property/detail/5502/".to_string(),
            ]
        );
    }
}
