use crate::browser::{BrowserError, CrashRecovery};
use crate::common_scraper::{BrowserSite, ListingPage, ScrapeError, SiteScraper};
use crate::config::ScraperConfig;
use crate::extract::{self, SelectorCascade};
use crate::models::PropertyRecord;
use crate::registry::SiteKey;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

const VACATION_HOME_PATH: &str = "/edit/kr/nj_ijyuubessou/";
const PREFECTURE: &str = "長野";
const PROPERTY_TYPES: [&str; 4] = ["新築一戸建て", "中古一戸建て", "中古マンション", "土地"];
const MAX_RESULTS_PER_SEARCH: usize = 20;

const TYPE_SELECTS: [&str; 4] = ["select[name*='type']", "#property_type", ".property-type-select", "select"];
const PREFECTURE_SELECTS: [&str; 4] = ["select[name*='pref']", "#prefecture_select", ".prefecture-select", "select"];
const SUBMIT_SELECTORS: [&str; 5] = [
    "input[type='submit']",
    "button[type='submit']",
    ".search-button",
    ".submit-button",
    "input[value*='検索']",
];

const FREE_WORD_INPUTS: [&str; 3] = ["input[name*='fw']", "input[name*='keyword']", "input[type='search']"];
const RESULT_WAIT_SELECTOR: &str = ".cassetteitem, .property-item, .listing-item, .result-item";
const KEYWORD: &str = "軽井沢";

const KARUIZAWA_AREAS: [&str; 6] = ["軽井沢", "karuizawa", "中軽井沢", "南軽井沢", "旧軽井沢", "北軽井沢"];

static RESULT_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".cassetteitem",
        ".property-item",
        ".listing-item",
        ".result-item",
        ".bukken-item",
        "[class*='property']",
        "[class*='listing']",
    ])
});

/// Whether a result mentions a Karuizawa area anywhere a buyer would see it.
pub fn in_karuizawa_area(record: &PropertyRecord) -> bool {
    let text = format!("{} {} {}", record.title, record.location, record.description).to_lowercase();
    KARUIZAWA_AREAS.iter().any(|area| text.contains(area))
}

/// Search results, capped, limited to Karuizawa.
pub fn extract_results(page: &ListingPage, ctx: &extract::PageContext) -> Vec<PropertyRecord> {
    extract::locate_listings(&page.document, &RESULT_SELECTORS)
        .into_iter()
        .take(MAX_RESULTS_PER_SEARCH)
        .map(|element| extract::extract_listing(element, ctx))
        .filter(in_karuizawa_area)
        .collect()
}

/// SUUMO: the national portal's vacation-home search, driven through its form
/// once per property type.
pub struct SuumoScraper {
    site: BrowserSite,
}

impl SuumoScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            site: BrowserSite::new(SiteKey::Suumo, config)?,
        })
    }

    /// Fill the search form for one property type and return the results page.
    /// `Ok(None)` when the form could not be driven.
    fn search(&mut self, property_type: &str) -> Result<Option<ListingPage>, ScrapeError> {
        let start_url = self.site.url(VACATION_HOME_PATH);
        self.site.ensure_launched()?;

        let page = self.site.browser.execute_with_recovery(|browser| {
            browser.try_goto(&start_url)?;
            browser.handle_popup_if_present();

            if !TYPE_SELECTS
                .iter()
                .any(|select| browser.select_option_containing(select, property_type))
            {
                warn!("No SUUMO property type option for {}", property_type);
                return Ok(None);
            }
            browser.simulate_human_delay(0.5..1.5);
            if !PREFECTURE_SELECTS
                .iter()
                .any(|select| browser.select_option_containing(select, PREFECTURE))
            {
                warn!("No SUUMO prefecture option for {}", PREFECTURE);
                return Ok(None);
            }

            // optional; narrows the nationwide results when the form has one
            for selector in FREE_WORD_INPUTS {
                if let Some(input) = browser.wait_for_element(selector, Some(Duration::from_secs(1))) {
                    if browser.safe_send_keys(&input, KEYWORD) {
                        break;
                    }
                }
            }

            let submitted = SUBMIT_SELECTORS.iter().any(|selector| {
                browser
                    .wait_for_element(selector, Some(Duration::from_secs(5)))
                    .is_some_and(|button| browser.safe_click(&button))
            });
            if !submitted {
                warn!("SUUMO search button not found");
                return Ok(None);
            }

            let rendered = browser.wait_for_elements(RESULT_WAIT_SELECTOR, Some(Duration::from_secs(10)));
            info!("SUUMO rendered {} results for {}", rendered.len(), property_type);
            let html = browser.page_source_after_js(1.0..3.0)?;
            let url = browser.current_url().unwrap_or_else(|| start_url.clone());
            Ok::<_, BrowserError>(Some(ListingPage::from_html(url, &html)))
        })?;
        Ok(page)
    }
}

impl SiteScraper for SuumoScraper {
    fn key(&self) -> SiteKey {
        SiteKey::Suumo
    }

    fn fetch_pages(&mut self) -> Result<Vec<ListingPage>, ScrapeError> {
        let mut pages = Vec::new();
        for (index, property_type) in PROPERTY_TYPES.iter().enumerate() {
            if index > 0 {
                self.site.browser.simulate_human_delay(3.0..5.0);
            }
            info!("Searching SUUMO for {}", property_type);
            match self.search(property_type) {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => {}
                Err(e @ ScrapeError::Browser(BrowserError::Launch(_))) => return Err(e),
                Err(e) => warn!("SUUMO search for {} failed: {}", property_type, e),
            }
        }

        if pages.is_empty() {
            return Err(ScrapeError::Fetch {
                url: self.site.url(VACATION_HOME_PATH),
            });
        }
        Ok(pages)
    }

    fn extract(&self, page: &ListingPage) -> Vec<PropertyRecord> {
        extract_results(page, &self.site.page_context(&page.url))
    }

    fn validate(&self, record: &PropertyRecord) -> bool {
        super::validate_for(self.key(), record, self.site.require_karuizawa)
    }

    fn close(&mut self) {
        self.site.close();
    }
}
