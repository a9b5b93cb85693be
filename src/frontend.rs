//! Listing files consumed by the web front-end.

use crate::models::PropertyRecord;
use crate::price;
use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::info;

/// Listings at or above this price are featured.
pub const FEATURED_MIN_YEN: u64 = 100_000_000;
const MAX_FEATURED: usize = 6;
const DATE_FORMAT: &str = "%Y-%m-%d";

const KARUIZAWA_AREAS: [&str; 4] = ["中軽井沢", "南軽井沢", "旧軽井沢", "北軽井沢"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendListing {
    pub id: String,
    pub title: String,
    pub price: String,
    pub location: String,
    pub property_type: String,
    pub size_info: String,
    pub building_age: String,
    pub description: String,
    pub rooms: String,
    pub image_urls: Vec<String>,
    pub source_url: String,
    pub scraped_date: String,
    pub date_first_seen: String,
    pub is_new: bool,
    pub is_featured: bool,
}

/// First 8 hex characters of the SHA-256 of the source URL.
pub fn listing_id(source_url: &str) -> String {
    let digest = Sha256::digest(source_url.as_bytes());
    hex::encode(digest)[..8].to_string()
}

pub fn is_featured(price_text: &str) -> bool {
    price::parse_japanese_price(price_text).is_some_and(|yen| yen >= FEATURED_MIN_YEN)
}

/// Convert records, marking listings absent from `previous` as new.
pub fn build_listings(
    records: &[PropertyRecord],
    previous: &[FrontendListing],
    today: NaiveDate,
) -> Vec<FrontendListing> {
    let first_seen: HashMap<&str, &str> = previous
        .iter()
        .map(|listing| (listing.id.as_str(), listing.date_first_seen.as_str()))
        .collect();
    let today_text = today.format(DATE_FORMAT).to_string();

    records
        .iter()
        .map(|record| {
            let id = listing_id(&record.source_url);
            let earlier = first_seen.get(id.as_str()).map(|date| date.to_string());
            FrontendListing {
                title: record.title.clone(),
                price: record.price.clone(),
                location: record.location.clone(),
                property_type: record.property_type.clone(),
                size_info: record.size_info.clone(),
                building_age: record.building_age.clone(),
                description: record.description.clone(),
                rooms: record.rooms.clone(),
                image_urls: record.image_urls.clone(),
                source_url: record.source_url.clone(),
                scraped_date: today_text.clone(),
                is_new: earlier.is_none(),
                date_first_seen: earlier.unwrap_or_else(|| today_text.clone()),
                is_featured: is_featured(&record.price),
                id,
            }
        })
        .collect()
}

/// Load a listings file. A missing file is an empty list.
pub fn load_listings(path: impl AsRef<Path>) -> Result<Vec<FrontendListing>> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No previous listings at {}", path.display());
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn save_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved {}", path.display());
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week_start: String,
    pub week_end: String,
    pub total_new: usize,
    pub total_listings: usize,
    pub featured: Vec<FrontendListing>,
    pub by_property_type: BTreeMap<String, usize>,
    pub by_price_range: BTreeMap<String, usize>,
    pub by_area: BTreeMap<String, usize>,
}

pub fn price_bucket(price_text: &str) -> Option<&'static str> {
    let yen = price::parse_japanese_price(price_text)?;
    Some(match yen {
        y if y < 20_000_000 => "under_20M",
        y if y < 50_000_000 => "20M_to_50M",
        y if y < 100_000_000 => "50M_to_100M",
        _ => "over_100M",
    })
}

/// The named Karuizawa district of a location, or plain 軽井沢.
pub fn area_of(location: &str) -> &'static str {
    KARUIZAWA_AREAS
        .iter()
        .find(|area| location.contains(*area))
        .copied()
        .unwrap_or("軽井沢")
}

/// Monday of the week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

pub fn weekly_summary(listings: &[FrontendListing], today: NaiveDate) -> WeeklySummary {
    let start = week_start(today);
    let end = start + Duration::days(6);

    let mut featured: Vec<FrontendListing> = listings
        .iter()
        .filter(|listing| listing.is_featured)
        .take(MAX_FEATURED)
        .cloned()
        .collect();
    if featured.len() < MAX_FEATURED {
        let padding = MAX_FEATURED - featured.len();
        featured.extend(listings.iter().filter(|listing| !listing.is_featured).take(padding).cloned());
    }

    let mut by_property_type = BTreeMap::new();
    let mut by_price_range = BTreeMap::new();
    let mut by_area = BTreeMap::new();
    for listing in listings {
        if !listing.property_type.is_empty() {
            *by_property_type.entry(listing.property_type.clone()).or_insert(0) += 1;
        }
        if let Some(bucket) = price_bucket(&listing.price) {
            *by_price_range.entry(bucket.to_string()).or_insert(0) += 1;
        }
        *by_area.entry(area_of(&listing.location).to_string()).or_insert(0) += 1;
    }

    WeeklySummary {
        week_start: start.format(DATE_FORMAT).to_string(),
        week_end: end.format(DATE_FORMAT).to_string(),
        total_new: listings.iter().filter(|listing| listing.is_new).count(),
        total_listings: listings.len(),
        featured,
        by_property_type,
        by_price_range,
        by_area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, price: &str, location: &str, url: &str) -> PropertyRecord {
        PropertyRecord {
            title: title.to_string(),
            price: price.to_string(),
            location: location.to_string(),
            property_type: "別荘".to_string(),
            source_url: url.to_string(),
            ..PropertyRecord::default()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn id_is_stable_eight_hex_chars() {
        let id = listing_id("https://www.resort-home.jp/bukken/1021/");
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, listing_id("https://www.resort-home.jp/bukken/1021/"));
        assert_ne!(id, listing_id("https://www.resort-home.jp/bukken/1022/"));
    }

    #[test]
    fn featured_threshold_in_yen() {
        assert!(is_featured("1億円"));
        assert!(is_featured("10,000万円"));
        assert!(!is_featured("9,999万円"));
        assert!(!is_featured("価格応談"));
    }

    #[test]
    fn new_only_on_first_sighting() {
        let records = vec![
            record("軽井沢の別荘A", "8,000万円", "旧軽井沢", "https://x.jp/1"),
            record("軽井沢の別荘B", "1億5,000万円", "中軽井沢", "https://x.jp/2"),
        ];
        let first = build_listings(&records, &[], day(2026, 10, 5));
        assert!(first.iter().all(|l| l.is_new));

        let second = build_listings(&records[..1], &first, day(2026, 10, 12));
        assert!(!second[0].is_new);
        assert_eq!(second[0].date_first_seen, "2026-10-05");
        assert_eq!(second[0].scraped_date, "2026-10-12");
        assert!(!second[0].is_featured);
        assert!(first[1].is_featured);
    }

    #[test]
    fn weekly_summary_counts() {
        let records = vec![
            record("軽井沢の別荘A", "8,000万円", "長野県軽井沢町旧軽井沢", "https://x.jp/1"),
            record("軽井沢の別荘B", "1億5,000万円", "中軽井沢", "https://x.jp/2"),
            record("軽井沢の別荘C", "1,500万円", "軽井沢町発地", "https://x.jp/3"),
        ];
        let listings = build_listings(&records, &[], day(2026, 10, 16));
        let summary = weekly_summary(&listings, day(2026, 10, 16));

        assert_eq!(summary.week_start, "2026-10-12");
        assert_eq!(summary.week_end, "2026-10-18");
        assert_eq!(summary.total_new, 3);
        assert_eq!(summary.featured.len(), 3);
        assert_eq!(summary.featured[0].title, "軽井沢の別荘B");
        assert_eq!(summary.by_price_range["under_20M"], 1);
        assert_eq!(summary.by_price_range["50M_to_100M"], 1);
        assert_eq!(summary.by_price_range["over_100M"], 1);
        assert_eq!(summary.by_area["旧軽井沢"], 1);
        assert_eq!(summary.by_area["軽井沢"], 1);
        assert_eq!(summary.by_property_type["別荘"], 3);
    }

    #[test]
    fn listings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.json");
        assert!(load_listings(&path).unwrap().is_empty());

        let listings = build_listings(
            &[record("軽井沢の別荘", "8,000万円", "軽井沢", "https://x.jp/1")],
            &[],
            day(2026, 10, 16),
        );
        save_json(&path, &listings).unwrap();
        assert_eq!(load_listings(&path).unwrap(), listings);
    }
}
