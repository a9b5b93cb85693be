use karuisearch::common_scraper::{ListingPage, ScrapeError, SiteScraper};
use karuisearch::config::ScraperConfig;
use karuisearch::export::{self, ExportError};
use karuisearch::models::PropertyRecord;
use karuisearch::registry::{ScraperRegistry, SiteKey, SiteResults};
use std::time::Duration;

fn record(title: &str, price: &str, url: &str) -> PropertyRecord {
    PropertyRecord {
        title: title.to_string(),
        price: price.to_string(),
        location: "長野県北佐久郡軽井沢町".to_string(),
        property_type: "別荘".to_string(),
        source_url: url.to_string(),
        ..PropertyRecord::default()
    }
}

fn sample_results() -> SiteResults {
    let mut results = SiteResults::default();
    results.insert(
        SiteKey::Mitsui,
        vec![
            record("旧軽井沢 森の別荘", "1億4,800万円", "https://www.mitsuinomori.co.jp/realestate/101/"),
            record("中軽井沢 ログハウス", "6,980万円", "https://www.mitsuinomori.co.jp/realestate/102/"),
        ],
    );
    results.insert(
        SiteKey::ResortHome,
        vec![record("中軽井沢 沓掛の中古別荘", "2,380万円", "https://www.resort-home.jp/bukken/1021/")],
    );
    results
}

struct EmptySite(SiteKey);

impl SiteScraper for EmptySite {
    fn key(&self) -> SiteKey {
        self.0
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        Ok(Vec::new())
    }

    fn extract(&self, _page: &ListingPage) -> Vec<PropertyRecord> {
        Vec::new()
    }
}

fn registry() -> ScraperRegistry {
    ScraperRegistry::with_constructor(ScraperConfig::default(), |key, _| {
        let scraper: Box<dyn SiteScraper> = Box::new(EmptySite(key));
        Ok(scraper)
    })
    .with_inter_site_delay(Duration::ZERO)
}

#[test]
fn json_export_round_trips() {
    let results = sample_results();
    let json = registry().export(&results, "json").unwrap();
    assert!(json.contains("旧軽井沢 森の別荘"));

    let parsed = export::from_json(&json).unwrap();
    assert_eq!(parsed.site_count(), 2);
    for batch in results.iter() {
        let restored = parsed.get(batch.site).unwrap();
        assert_eq!(restored.len(), batch.records.len());
        for (before, after) in batch.records.iter().zip(restored) {
            assert_eq!(before.title, after.title);
            assert_eq!(before.price, after.price);
            assert_eq!(before.source_url, after.source_url);
        }
    }
}

#[test]
fn csv_export_has_one_row_per_record() {
    let csv = registry().export(&sample_results(), "CSV").unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "site");
    assert_eq!(&headers[8], "image_count");

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][0], "mitsui");
    assert_eq!(&rows[2][0], "resort_home");
    assert_eq!(&rows[2][2], "2,380万円");
}

#[test]
fn unsupported_format_is_an_error() {
    match registry().export(&sample_results(), "xml") {
        Err(ExportError::UnsupportedFormat(format)) => assert_eq!(format, "xml"),
        other => panic!("expected unsupported format, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn combine_drops_duplicate_title_and_url() {
    let mut first = record("旧軽井沢 森の別荘", "1億4,800万円", "https://x.jp/1");
    first.image_urls = vec!["https://x.jp/photo/a.jpg".to_string()];
    let mut duplicate = first.clone();
    duplicate.image_urls = vec!["https://x.jp/photo/b.jpg".to_string()];
    let other = record("南軽井沢 新築", "5,500万円", "https://x.jp/2");

    let mut results = SiteResults::default();
    results.insert(SiteKey::Mitsui, vec![first, other]);
    results.insert(SiteKey::Seibu, vec![duplicate]);

    let combined = registry().combine(&results);
    assert_eq!(combined.len(), results.total_records() - 1);
    assert_eq!(combined[0].image_urls, vec!["https://x.jp/photo/a.jpg".to_string()]);
}

#[test]
fn empty_sites_still_reported() {
    let mut registry = registry();
    let results = registry.run_many(&["suumo".to_string(), "mitsui".to_string()], false);
    assert_eq!(results.site_count(), 2);
    assert_eq!(results.total_records(), 0);

    let reports = registry.validate_all(&results);
    assert!(!reports[&SiteKey::Mitsui].meets_minimum);
    assert!(!reports[&SiteKey::Suumo].has_karuizawa_properties);
    assert!(registry.stats().values().all(|s| s.success));
}
