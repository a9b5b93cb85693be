use karuisearch::common_scraper::{listings_from_page, ListingPage, ScrapeError, SiteScraper};
use karuisearch::extract::{PageContext, SelectorCascade};
use karuisearch::models::PropertyRecord;
use karuisearch::registry::SiteKey;
use reqwest::Url;

const FRAGMENT: &str = r#"<div class="property-item"><h3>軽井沢の美しい別荘</h3><div class="price">5,800万円</div><div class="location">長野県軽井沢町</div></div>"#;

struct FragmentSite {
    html: String,
}

impl SiteScraper for FragmentSite {
    fn key(&self) -> SiteKey {
        SiteKey::ResortInnovation
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        Ok(vec![ListingPage::from_html("https://example.jp/karuizawa/", &self.html)])
    }

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord> {
        let ctx = PageContext::new(Url::parse("https://example.jp/").unwrap(), page.url.clone(), 5);
        listings_from_page(page, &SelectorCascade::new(&[".property-item", ".card"]), &ctx)
    }
}

#[test]
fn literal_fragment_end_to_end() {
    let mut site = FragmentSite {
        html: FRAGMENT.to_string(),
    };
    let records = site.scrape_listings().unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.title, "軽井沢の美しい別荘");
    assert_eq!(record.price, "5,800万円");
    assert!(record.location.contains("軽井沢"));
    assert!(record.is_valid());
    assert!(record.contains_karuizawa());
}

#[test]
fn currency_fallback_when_no_selector_matches() {
    let mut site = FragmentSite {
        html: r#"<body><div class="bukken-box"><p>旧軽井沢の静かな別荘地</p><p>9,600万円</p><p>所在地：長野県北佐久郡軽井沢町旧軽井沢</p></div></body>"#
            .to_string(),
    };
    let records = site.scrape_listings().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].price, "9,600万円");
    assert_eq!(records[0].location, "長野県北佐久郡軽井沢町旧軽井沢");
}

#[test]
fn non_karuizawa_listings_dropped() {
    let mut site = FragmentSite {
        html: r#"<div class="property-item"><h3>白馬の山小屋 眺望良好</h3><div class="price">3,000万円</div><div class="location">長野県白馬村</div></div>"#
            .to_string(),
    };
    assert!(site.scrape_listings().unwrap().is_empty());
}
