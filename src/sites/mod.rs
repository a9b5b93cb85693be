//! One scraper per target site.

mod besso_navi;
mod mitsui;
mod resort_home;
mod resort_innovation;
mod royal_resort;
mod seibu;
mod suumo;
mod tokyu_resort;

pub use besso_navi::BessoNaviScraper;
pub use mitsui::MitsuiScraper;
pub use resort_home::ResortHomeScraper;
pub use resort_innovation::ResortInnovationScraper;
pub use royal_resort::{meets_luxury_floor, RoyalResortScraper, LUXURY_FLOOR_YEN};
pub use seibu::SeibuScraper;
pub use suumo::SuumoScraper;
pub use tokyu_resort::TokyuResortScraper;

use crate::common_scraper::{base_validate, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::models::PropertyRecord;
use crate::registry::SiteKey;

/// Construct the scraper for `key`.
pub fn build(key: SiteKey, config: &ScraperConfig) -> Result<Box<dyn SiteScraper>, ScrapeError> {
    let scraper: Box<dyn SiteScraper> = match key {
        SiteKey::RoyalResort => Box::new(RoyalResortScraper::new(config)?),
        SiteKey::BessoNavi => Box::new(BessoNaviScraper::new(config)?),
        SiteKey::Mitsui => Box::new(MitsuiScraper::new(config)?),
        SiteKey::TokyuResort => Box::new(TokyuResortScraper::new(config)?),
        SiteKey::Seibu => Box::new(SeibuScraper::new(config)?),
        SiteKey::ResortInnovation => Box::new(ResortInnovationScraper::new(config)?),
        SiteKey::ResortHome => Box::new(ResortHomeScraper::new(config)?),
        SiteKey::Suumo => Box::new(SuumoScraper::new(config)?),
    };
    Ok(scraper)
}

/// The acceptance rule each site applies, without building the scraper.
pub fn validate_for(key: SiteKey, record: &PropertyRecord, require_karuizawa: bool) -> bool {
    let base = base_validate(record, require_karuizawa);
    match key {
        SiteKey::RoyalResort => base && meets_luxury_floor(record),
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luxury_floor_only_for_royal_resort() {
        let record = PropertyRecord {
            title: "軽井沢の山荘".to_string(),
            price: "3,000万円".to_string(),
            location: "軽井沢町".to_string(),
            source_url: "https://x.jp/1".to_string(),
            ..PropertyRecord::default()
        };
        assert!(!validate_for(SiteKey::RoyalResort, &record, true));
        for key in SiteKey::ALL.into_iter().filter(|k| *k != SiteKey::RoyalResort) {
            assert!(validate_for(key, &record, true), "{}", key);
        }
    }

    #[test]
    fn every_http_site_builds_offline() {
        let config = ScraperConfig::default();
        for key in SiteKey::ALL {
            if key.fetch_mode() == crate::registry::FetchMode::Http {
                let scraper = build(key, &config).unwrap();
                assert_eq!(scraper.key(), key);
            }
        }
    }
}
