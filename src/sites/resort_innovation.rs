use crate::common_scraper::{HttpSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::SelectorCascade;
use crate::models::PropertyRecord;
use crate::registry::SiteKey;
use std::collections::HashSet;
use std::sync::LazyLock;

const LISTING_PATHS: [&str; 3] = ["/for-sale.html", "/properties.html", "/listings.html"];
const MAX_PAGINATION_LINKS: usize = 3;

static LISTING_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".property-item",
        ".property-listing",
        ".listing-item",
        ".property",
        ".for-sale-item",
        ".item",
        "[class*='property']",
        "[class*='listing']",
        "article",
    ])
});

pub struct ResortInnovationScraper {
    site: HttpSite,
}

impl ResortInnovationScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            site: HttpSite::new(SiteKey::ResortInnovation, config)?,
        })
    }
}

impl SiteScraper for ResortInnovationScraper {
    fn key(&self) -> SiteKey {
        SiteKey::ResortInnovation
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let mut pages = self.site.fetch_paths(&LISTING_PATHS);
        let mut visited: HashSet<String> = pages.iter().map(|page| page.url.clone()).collect();

        let follow: Vec<String> = pages
            .iter()
            .flat_map(|page| self.site.pagination_links(page, MAX_PAGINATION_LINKS))
            .filter(|link| visited.insert(link.clone()))
            .collect();
        for link in follow {
            if let Some(page) = self.site.fetch_page(&link) {
                pages.push(page);
            }
        }
        self.site.require_pages(pages)
    }

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord> {
        self.site.extract_listings(page, &LISTING_SELECTORS)
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{self, PageContext};
    use reqwest::Url;

    #[test]
    fn english_and_japanese_listings() {
        let page = ListingPage::from_html(
            "https://www.resortinnovation.com/for-sale.html",
            r#"<div class="for-sale">
                 <article><h2>Karuizawa Forest Retreat</h2><p>Price: ¥128,000,000</p>
                   <p>Location: Naka-Karuizawa, Nagano</p><img src="images/property/ri-7.jpg"></article>
                 <article><h2>旧軽井沢 銀座通り近くの土地</h2><p>価格 8,500万円 土地 890㎡</p></article>
               </div>"#,
        );
        let ctx = PageContext::new(Url::parse("https://www.resortinnovation.com").unwrap(), page.url.clone(), 5);
        let found = extract::locate_listings(&page.document, &LISTING_SELECTORS);
        assert_eq!(found.len(), 2);

        let first = extract::extract_listing(found[0], &ctx);
        assert_eq!(first.title, "Karuizawa Forest Retreat");
        assert_eq!(first.price, "¥128,000,000");
        assert!(first.contains_karuizawa());
        assert_eq!(
            first.image_urls,
            vec!["https://www.resortinnovation.com/images/property/ri-7.jpg".to_string()]
        );

        let second = extract::extract_listing(found[1], &ctx);
        assert_eq!(second.price, "8,500万円");
        assert_eq!(second.property_type, "土地");
        assert!(second.location.contains("軽井沢"));
    }
}
