use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

const KARUIZAWA_KEYWORDS: [&str; 2] = ["軽井沢", "karuizawa"];

/// One normalized listing as scraped from a site.
///
/// Every text field starts out empty and is filled in by extraction code as
/// each selector or pattern succeeds. An empty field means extraction found
/// nothing for it; it is never a sentinel for a failed fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub title: String,
    /// Kept as the site formats it, e.g. `9,600万円`.
    pub price: String,
    pub location: String,
    pub property_type: String,
    pub size_info: String,
    pub building_age: String,
    pub description: String,
    pub rooms: String,
    pub source_url: String,
    /// Discovery order, with likely property photos moved to the front.
    pub image_urls: Vec<String>,
    pub scraped_at: DateTime<Local>,
}

impl Default for PropertyRecord {
    fn default() -> Self {
        Self {
            title: String::new(),
            price: String::new(),
            location: String::new(),
            property_type: String::new(),
            size_info: String::new(),
            building_age: String::new(),
            description: String::new(),
            rooms: String::new(),
            source_url: String::new(),
            image_urls: Vec::new(),
            scraped_at: Local::now(),
        }
    }
}

impl PropertyRecord {
    pub fn with_source(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Self::default()
        }
    }

    /// True when title, price, location and source URL are all non-blank.
    pub fn is_valid(&self) -> bool {
        self.missing_required_fields().is_empty()
    }

    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let required = [
            ("title", &self.title),
            ("price", &self.price),
            ("location", &self.location),
            ("source_url", &self.source_url),
        ];
        required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect()
    }

    /// True when title, location or description mentions Karuizawa.
    pub fn contains_karuizawa(&self) -> bool {
        let text = format!("{} {} {}", self.title, self.location, self.description).to_lowercase();
        KARUIZAWA_KEYWORDS.iter().any(|keyword| text.contains(keyword))
    }

    /// Fill empty fields from `other`, leaving populated fields untouched.
    pub fn fill_missing_from(&mut self, other: &PropertyRecord) {
        fn fill(target: &mut String, source: &str) {
            if target.trim().is_empty() && !source.trim().is_empty() {
                *target = source.to_string();
            }
        }

        fill(&mut self.title, &other.title);
        fill(&mut self.price, &other.price);
        fill(&mut self.location, &other.location);
        fill(&mut self.property_type, &other.property_type);
        fill(&mut self.size_info, &other.size_info);
        fill(&mut self.building_age, &other.building_age);
        fill(&mut self.description, &other.description);
        fill(&mut self.rooms, &other.rooms);

        for url in &other.image_urls {
            if !self.image_urls.contains(url) {
                self.image_urls.push(url.clone());
            }
        }
    }
}

/// Property categories the front-end understands, labelled in Japanese.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    House,
    Land,
    Apartment,
    Villa,
}

impl PropertyType {
    pub fn label(&self) -> &'static str {
        match self {
            PropertyType::House => "一戸建て",
            PropertyType::Land => "土地",
            PropertyType::Apartment => "マンション",
            PropertyType::Villa => "別荘",
        }
    }

    /// Classify free text by the first keyword it contains.
    pub fn classify(text: &str) -> Option<PropertyType> {
        let keywords = [
            ("一戸建て", PropertyType::House),
            ("戸建", PropertyType::House),
            ("土地", PropertyType::Land),
            ("land", PropertyType::Land),
            ("house", PropertyType::House),
            ("マンション", PropertyType::Apartment),
            ("別荘", PropertyType::Villa),
            ("villa", PropertyType::Villa),
        ];

        let lower = text.to_lowercase();
        keywords
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, property_type)| *property_type)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
