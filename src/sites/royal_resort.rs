use crate::common_scraper::{dedupe_by_title_price_location, BrowserSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::{self, PageContext, SelectorCascade};
use crate::models::PropertyRecord;
use crate::price;
use crate::registry::SiteKey;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Royal Resort only lists luxury properties; anything cheaper is noise.
pub const LUXURY_FLOOR_YEN: u64 = 50_000_000;

const LISTING_PATH: &str = "/karuizawa/";
/// Descriptions some detail pages only render client side.
const RENDERED_DESCRIPTION: &str = ".property-description, .description, .comment, .detail-text";
const DETAIL_KEYWORDS: [&str; 7] = ["property", "detail", "bukken", "listing", "villa", "estate", "karuizawa"];

static LISTING_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".property-list .property-item",
        ".p-card",
        ".property-card",
        ".listing-item",
        ".bukken-item",
        ".card",
        ".item",
    ])
});

/// Unparseable prices pass; parseable ones must reach the floor.
pub fn meets_luxury_floor(record: &PropertyRecord) -> bool {
    match price::parse_japanese_price(&record.price) {
        Some(yen) => yen >= LUXURY_FLOOR_YEN,
        None => true,
    }
}

/// Whether `url` leads to a single property rather than back to a list.
pub fn is_detail_url(url: &str, base: &str) -> bool {
    if extract::is_property_url(url, &DETAIL_KEYWORDS) {
        return true;
    }
    url.trim_end_matches('/') != base.trim_end_matches('/') && !url.ends_with('/')
}

pub fn extract_cards(page: &ListingPage, ctx: &PageContext) -> Vec<PropertyRecord> {
    extract::locate_listings(&page.document, &LISTING_SELECTORS)
        .into_iter()
        .map(|card| extract::extract_listing(card, ctx))
        .collect()
}

/// Royal Resort Karuizawa renders its listings client side.
pub struct RoyalResortScraper {
    site: BrowserSite,
    listing_url: String,
}

impl RoyalResortScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let site = BrowserSite::new(SiteKey::RoyalResort, config)?;
        let listing_url = site.url(LISTING_PATH);
        Ok(Self { site, listing_url })
    }

    fn rendered_description(&self) -> String {
        let browser = &self.site.browser;
        match browser.wait_for_element(RENDERED_DESCRIPTION, Some(Duration::from_secs(2))) {
            Some(element) => browser.element_text(&element),
            None => {
                debug!("No rendered description on the current page");
                String::new()
            }
        }
    }

    fn load_detail(&mut self, url: &str) -> Option<PropertyRecord> {
        match self.site.load_page(url, 1.0..2.0) {
            Ok(page) => {
                let ctx = self.site.page_context(url);
                let mut detail = extract::extract_detail_page(&page.document, &ctx);
                if detail.description.is_empty() {
                    detail.description = self.rendered_description();
                }
                Some(detail)
            }
            Err(e) => {
                warn!("Could not load Royal Resort detail page {}: {}", url, e);
                None
            }
        }
    }
}

impl SiteScraper for RoyalResortScraper {
    fn key(&self) -> SiteKey {
        SiteKey::RoyalResort
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let url = self.listing_url.clone();
        let page = self.site.load_page(&url, 3.0..5.0)?;
        Ok(vec![page])
    }

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord> {
        extract_cards(page, &self.site.page_context(&page.url))
    }

    fn enrich(&mut self, records: &mut Vec<PropertyRecord>) {
        let base = self.site.base_url.to_string();
        let targets: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.source_url != self.listing_url && is_detail_url(&record.source_url, &base))
            .map(|(index, _)| index)
            .take(self.site.limits.max_detail_pages)
            .collect();
        if targets.is_empty() {
            return;
        }

        info!("Enriching {} Royal Resort listings from detail pages", targets.len());
        for index in targets {
            let url = records[index].source_url.clone();
            if let Some(detail) = self.load_detail(&url) {
                records[index].fill_missing_from(&detail);
            }
        }
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }

    fn dedupe(&self, records: Vec<PropertyRecord>) -> Vec<PropertyRecord> {
        dedupe_by_title_price_location(records)
    }

    fn close(&mut self) {
        self.site.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn record(price: &str) -> PropertyRecord {
        PropertyRecord {
            price: price.to_string(),
            ..PropertyRecord::default()
        }
    }

    #[test]
    fn luxury_floor_compares_in_yen() {
        assert!(meets_luxury_floor(&record("5,000万円")));
        assert!(meets_luxury_floor(&record("2億円")));
        assert!(!meets_luxury_floor(&record("4,980万円")));
        assert!(meets_luxury_floor(&record("価格応談")));
    }

    #[test]
    fn detail_url_heuristic() {
        let base = "https://www.royal-resort.co.jp/";
        assert!(is_detail_url("https://www.royal-resort.co.jp/karuizawa/villa-12/", base));
        assert!(is_detail_url("https://www.royal-resort.co.jp/r/12345", base));
        assert!(!is_detail_url("https://www.royal-resort.co.jp/", base));
        assert!(!is_detail_url("https://www.royal-resort.co.jp/company/", base));
    }

    #[test]
    fn cards_extracted_in_dom_order() {
        let page = ListingPage::from_html(
            "https://www.royal-resort.co.jp/karuizawa/",
            r#"<div class="property-list">
                 <div class="property-item"><a href="/karuizawa/bukken/901/"><h3>旧軽井沢 重厚な邸宅</h3></a>
                   <span class="price">3億2,000万円</span><span class="location">長野県北佐久郡軽井沢町旧軽井沢</span></div>
                 <div class="property-item"><a href="/karuizawa/bukken/902/"><h3>南が丘 森の別荘</h3></a>
                   <span class="price">9,800万円</span><span class="location">軽井沢町南が丘</span></div>
               </div>"#,
        );
        let ctx = PageContext::new(Url::parse("https://www.royal-resort.co.jp").unwrap(), page.url.clone(), 5);
        let records = extract_cards(&page, &ctx);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "旧軽井沢 重厚な邸宅");
        assert_eq!(records[0].price, "3億2,000万円");
        assert_eq!(records[1].source_url, "https://www.royal-resort.co.jp/karuizawa/bukken/902/");
        assert!(records.iter().all(|r| super::super::validate_for(SiteKey::RoyalResort, r, true)));
    }
}
