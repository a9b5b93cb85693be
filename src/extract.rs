//! Field extraction shared by every site scraper.
//!
//! Each field is described as an ordered cascade of CSS selectors or regex
//! patterns. Cascades are evaluated in order and the first hit wins; a field
//! nobody matches keeps its empty default.

use crate::models::{PropertyRecord, PropertyType};
use crate::price;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

const TITLE_MAX_CHARS: usize = 500;
const DESCRIPTION_MIN_CHARS: usize = 50;
const DESCRIPTION_MAX_CHARS: usize = 2000;
const FALLBACK_CONTAINER_LIMIT: usize = 20;

/// Ordered regex rules. A rule with a named group `v` yields that group,
/// otherwise the whole match.
pub struct PatternCascade {
    patterns: Vec<Regex>,
}

impl PatternCascade {
    pub fn new(patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();
        Self { patterns }
    }

    fn value_of(regex: &Regex, text: &str) -> Option<String> {
        let caps = regex.captures(text)?;
        let matched = caps.name("v").or_else(|| caps.get(0))?;
        let value = matched.as_str().trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    pub fn first_match(&self, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|regex| Self::value_of(regex, text))
    }

    /// Every pattern contributes up to `per_pattern` matches, in rule order.
    pub fn all_matches(&self, text: &str, per_pattern: usize) -> Vec<String> {
        let mut found = Vec::new();
        for regex in &self.patterns {
            for m in regex.find_iter(text).take(per_pattern) {
                let value = m.as_str().trim().to_string();
                if !value.is_empty() && !found.contains(&value) {
                    found.push(value);
                }
            }
        }
        found
    }
}

/// Ordered CSS selector guesses. Unparseable selectors are dropped.
pub struct SelectorCascade {
    entries: Vec<(&'static str, Selector)>,
}

impl SelectorCascade {
    pub fn new(selectors: &[&'static str]) -> Self {
        let entries = selectors
            .iter()
            .filter_map(|raw| Selector::parse(raw).ok().map(|selector| (*raw, selector)))
            .collect();
        Self { entries }
    }

    /// Text of the first element (per selector) that `accept` likes.
    pub fn first_text<F>(&self, scope: ElementRef<'_>, accept: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        for (_, selector) in &self.entries {
            if let Some(element) = scope.select(selector).next() {
                let text = inline_text(element);
                if accept(&text) {
                    return Some(text);
                }
            }
        }
        None
    }

    /// All matches of the first selector that matches anything.
    pub fn first_non_empty<'a>(&self, document: &'a Html) -> Option<(&'static str, Vec<ElementRef<'a>>)> {
        self.entries.iter().find_map(|(raw, selector)| {
            let elements: Vec<ElementRef<'a>> = document.select(selector).collect();
            if elements.is_empty() {
                None
            } else {
                Some((*raw, elements))
            }
        })
    }

    pub fn first_element<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.entries
            .iter()
            .find_map(|(_, selector)| document.select(selector).next())
    }
}

pub static TITLE_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        "h1",
        "h2",
        "h3",
        "h4",
        ".title",
        ".name",
        ".property-name",
        ".property-title",
        "[class*='title']",
        "[class*='name']",
        ".heading",
    ])
});

pub static PRICE_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".price",
        ".amount",
        ".cost",
        ".kakaku",
        "[class*='price']",
        "[class*='amount']",
        "[class*='cost']",
    ])
});

pub static LOCATION_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".location",
        ".area",
        ".address",
        ".basho",
        "[class*='location']",
        "[class*='address']",
        "[class*='area']",
    ])
});

pub static DESCRIPTION_SELECTORS: LazyLock<SelectorCascade> = LazyLock::new(|| {
    SelectorCascade::new(&[
        ".description",
        ".detail",
        ".summary",
        "[class*='desc']",
        ".content",
        "main",
    ])
});

/// More specific formats first: `X億Y万円` must win over `Y万円`.
pub static PRICE_PATTERNS: LazyLock<PatternCascade> = LazyLock::new(|| {
    PatternCascade::new(&[
        r"\d+億[\d,]*万円",
        r"\d+億円",
        r"\d[\d,]*\s*万円",
        r"[¥￥]\s*\d[\d,]*",
        r"\d[\d,]*\s*円",
        r"価格[:：\s]*(?P<v>\d[\d,]*)",
        r"金額[:：\s]*(?P<v>\d[\d,]*)",
        r"(?i)\d{1,3}(?:,\d{3})*\s*yen",
        r"(?i)price[:\s]*(?P<v>\d[\d,]*)",
    ])
});

pub static LOCATION_PATTERNS: LazyLock<PatternCascade> = LazyLock::new(|| {
    PatternCascade::new(&[
        r"(?:所在地|住所)[:：\s]*(?P<v>[^\n。]{2,60})",
        r"(?:長野県)?(?:北佐久郡)?[東西南北中旧新]?軽井沢[町]?[^\n。、\s]{0,30}",
        r"(?i)karuizawa[^\n。]{0,40}",
    ])
});

pub static SIZE_PATTERNS: LazyLock<PatternCascade> = LazyLock::new(|| {
    PatternCascade::new(&[
        r"(?:土地|敷地|建物)[:：\s]*\d[\d,]*\.?\d*\s*(?:㎡|平米|坪)",
        r"\d[\d,]*\.?\d*\s*㎡",
        r"\d[\d,]*\.?\d*\s*平米",
        r"\d[\d,]*\.?\d*\s*坪",
    ])
});

pub static ROOM_PATTERNS: LazyLock<PatternCascade> = LazyLock::new(|| {
    PatternCascade::new(&[
        r"間取り[:：\s]*(?P<v>\d+S?L?D?K)",
        r"\d+S?LDK",
        r"\d+S?DK",
        r"\d+K\b",
    ])
});

pub static AGE_PATTERNS: LazyLock<PatternCascade> = LazyLock::new(|| {
    PatternCascade::new(&[
        r"築\d+年",
        r"建築年[:：\s]*(?P<v>(?:平成|昭和|令和)\d+年)",
        r"(?:平成|昭和|令和)\d+年",
        r"\d{4}年(?:建築|築)",
        r"新築",
    ])
});

static CURRENCY_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*\s*万円|億円|[¥￥]\s*\d[\d,]*").unwrap());

static ANY_IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static ANY_BODY_ELEMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body *").unwrap());

const IMAGE_EXCLUDE: [&str; 9] = [
    "btn_", "nav_", "menu_", "common/", "header", "logo", "icon", "arrow", "bullet",
];
const IMAGE_PROMOTE: [&str; 6] = ["property", "bukken", "photo", "image", "gallery", "main"];

const DETAIL_LINK_SELECTORS: [&str; 4] = [
    "a[href*='detail']",
    "a[href*='property']",
    "a[href*='bukken']",
    "a[href]",
];

/// Text nodes joined by single spaces.
pub fn inline_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text nodes one per line, so line-bounded patterns stay within a field.
pub fn block_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Resolve `href` against `base`, skipping script, mail and fragment links.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }
    base.join(href).ok().map(|url| url.to_string())
}

/// Whether a URL looks like it leads to a single property.
pub fn is_property_url(url: &str, keywords: &[&str]) -> bool {
    let lower = url.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// Drop UI chrome, move likely photos to the front (in discovery order) and cap.
pub fn filter_property_images(urls: &[String], max: usize) -> Vec<String> {
    let mut promoted = Vec::new();
    let mut others = Vec::new();

    for url in urls {
        let lower = url.to_lowercase();
        if IMAGE_EXCLUDE.iter().any(|keyword| lower.contains(keyword)) {
            continue;
        }
        if IMAGE_PROMOTE.iter().any(|keyword| lower.contains(keyword)) {
            promoted.push(url.clone());
        } else {
            others.push(url.clone());
        }
    }

    promoted.extend(others);
    promoted.truncate(max);
    promoted
}

/// Image URLs under `scope`, resolved and deduplicated in document order.
pub fn collect_image_urls(scope: ElementRef<'_>, base: &Url) -> Vec<String> {
    let mut urls = Vec::new();
    for img in scope.select(&ANY_IMAGE) {
        let src = img
            .value()
            .attr("src")
            .filter(|s| !s.trim().is_empty())
            .or_else(|| img.value().attr("data-src"));
        let Some(src) = src else { continue };
        if src.starts_with("data:") {
            continue;
        }
        if let Some(url) = resolve_url(base, src) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// Links matched by the first selector that yields any acceptable link.
pub fn find_links<F>(
    document: &Html,
    selectors: &[&'static str],
    base: &Url,
    current_url: &str,
    accept: F,
    limit: usize,
) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let cascade = SelectorCascade::new(selectors);
    // relative hrefs resolve against the page they appear on
    let page_base = Url::parse(current_url).unwrap_or_else(|_| base.clone());
    for (raw, selector) in &cascade.entries {
        let mut links: Vec<String> = Vec::new();
        for element in document.select(selector) {
            let Some(href) = element.value().attr("href") else { continue };
            let Some(url) = resolve_url(&page_base, href) else { continue };
            if url != current_url && accept(&url) && !links.contains(&url) {
                links.push(url);
            }
        }
        if !links.is_empty() {
            debug!("Found {} links with selector {}", links.len(), raw);
            links.truncate(limit);
            return links;
        }
    }
    Vec::new()
}

/// Locate listing elements: first selector with results wins, otherwise
/// elements holding currency-looking text are promoted to their card container.
pub fn locate_listings<'a>(document: &'a Html, selectors: &SelectorCascade) -> Vec<ElementRef<'a>> {
    if let Some((raw, elements)) = selectors.first_non_empty(document) {
        debug!("Found {} listing elements with selector {}", elements.len(), raw);
        return elements;
    }

    debug!("No listing selector matched, searching for price text");
    let mut seen = HashSet::new();
    let mut containers = Vec::new();

    for element in document.select(&ANY_BODY_ELEMENT) {
        let own_text: String = element
            .children()
            .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
            .collect();
        if !CURRENCY_TEXT.is_match(&own_text) {
            continue;
        }

        let container = card_ancestor(element).unwrap_or(element);
        if seen.insert(container.id()) {
            containers.push(container);
        }
        if containers.len() >= FALLBACK_CONTAINER_LIMIT {
            break;
        }
    }

    containers
}

fn card_ancestor(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut parent_fallback = None;
    for node in element.ancestors() {
        let Some(ancestor) = ElementRef::wrap(node) else { continue };
        if parent_fallback.is_none() {
            parent_fallback = Some(ancestor);
        }
        let class = ancestor.value().attr("class").unwrap_or("").to_lowercase();
        if ["item", "card", "property"].iter().any(|k| class.contains(k)) {
            return Some(ancestor);
        }
    }
    parent_fallback.filter(|p| p.value().name() != "body" && p.value().name() != "html")
}

fn first_title_line(text: &str) -> Option<String> {
    const SKIP: [&str; 7] = ["万円", "¥", "築", "駅", "DK", "㎡", "坪"];
    text.lines().take(5).map(str::trim).find_map(|line| {
        let len = char_len(line);
        if len > 8 && len < 100 && !SKIP.iter().any(|s| line.contains(s)) {
            Some(line.to_string())
        } else {
            None
        }
    })
}

fn extract_price_from(scope: ElementRef<'_>, text: &str) -> Option<String> {
    if let Some(raw) = PRICE_SELECTORS.first_text(scope, price::looks_like_price) {
        return Some(PRICE_PATTERNS.first_match(&raw).unwrap_or(raw));
    }
    PRICE_PATTERNS.first_match(text)
}

fn extract_location_from(scope: ElementRef<'_>, text: &str) -> Option<String> {
    LOCATION_SELECTORS
        .first_text(scope, |t| !t.is_empty() && char_len(t) < 120)
        .or_else(|| LOCATION_PATTERNS.first_match(text))
        .or_else(|| {
            let lower = text.to_lowercase();
            (lower.contains("軽井沢") || lower.contains("karuizawa")).then(|| "軽井沢".to_string())
        })
}

fn detail_link(scope: ElementRef<'_>, base: &Url, page_url: &str) -> Option<String> {
    let cascade = SelectorCascade::new(&DETAIL_LINK_SELECTORS);
    for (_, selector) in &cascade.entries {
        for link in scope.select(selector) {
            let Some(href) = link.value().attr("href") else { continue };
            if let Some(url) = resolve_url(base, href) {
                if url != page_url {
                    return Some(url);
                }
            }
        }
    }
    None
}

/// Where a listing was found and how many images to keep.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub base_url: Url,
    pub page_url: String,
    pub max_images: usize,
}

impl PageContext {
    pub fn new(base_url: Url, page_url: impl Into<String>, max_images: usize) -> Self {
        Self {
            base_url,
            page_url: page_url.into(),
            max_images,
        }
    }
}

/// Build a record from one listing element.
pub fn extract_listing(element: ElementRef<'_>, ctx: &PageContext) -> PropertyRecord {
    let text = block_text(element);
    let mut record = PropertyRecord::with_source(
        detail_link(element, &ctx.base_url, &ctx.page_url).unwrap_or_else(|| ctx.page_url.clone()),
    );

    if let Some(title) = TITLE_SELECTORS
        .first_text(element, |t| char_len(t) > 3)
        .or_else(|| first_title_line(&text))
    {
        record.title = truncate_chars(&title, TITLE_MAX_CHARS);
    }
    if let Some(price) = extract_price_from(element, &text) {
        record.price = price;
    }
    if let Some(location) = extract_location_from(element, &text) {
        record.location = location;
    }
    if let Some(kind) = PropertyType::classify(&text) {
        record.property_type = kind.label().to_string();
    }

    let sizes = SIZE_PATTERNS.all_matches(&text, 2);
    if !sizes.is_empty() {
        record.size_info = sizes.into_iter().take(3).collect::<Vec<_>>().join(" ");
    }
    if let Some(rooms) = ROOM_PATTERNS.first_match(&text) {
        record.rooms = rooms;
    }
    if let Some(age) = AGE_PATTERNS.first_match(&text) {
        record.building_age = age;
    }
    if let Some(description) =
        DESCRIPTION_SELECTORS.first_text(element, |t| char_len(t) > DESCRIPTION_MIN_CHARS)
    {
        record.description = truncate_chars(&description, DESCRIPTION_MAX_CHARS);
    }

    let images = collect_image_urls(element, &ctx.base_url);
    record.image_urls = filter_property_images(&images, ctx.max_images);
    record
}

/// Build a record from a whole detail page.
pub fn extract_detail_page(document: &Html, ctx: &PageContext) -> PropertyRecord {
    let root = document.root_element();
    let text = block_text(root);
    let mut record = PropertyRecord::with_source(ctx.page_url.clone());

    let detail_titles = SelectorCascade::new(&["h1", "h2", ".title", ".property-title", "title"]);
    if let Some(title) = detail_titles.first_text(root, |t| {
        let len = char_len(t);
        len > 5 && len < 200
    }) {
        record.title = title;
    }
    if let Some(price) = extract_price_from(root, &text) {
        record.price = price;
    }
    if let Some(location) = extract_location_from(root, &text) {
        record.location = location;
    }
    if let Some(kind) = PropertyType::classify(&text) {
        record.property_type = kind.label().to_string();
    }

    let sizes = SIZE_PATTERNS.all_matches(&text, 2);
    if !sizes.is_empty() {
        record.size_info = sizes.into_iter().take(4).collect::<Vec<_>>().join(" ");
    }
    if let Some(rooms) = ROOM_PATTERNS.first_match(&text) {
        record.rooms = rooms;
    }
    if let Some(age) = AGE_PATTERNS.first_match(&text) {
        record.building_age = age;
    }
    if let Some(description) =
        DESCRIPTION_SELECTORS.first_text(root, |t| char_len(t) > DESCRIPTION_MIN_CHARS)
    {
        record.description = truncate_chars(&description, DESCRIPTION_MAX_CHARS);
    }

    let images = collect_image_urls(root, &ctx.base_url);
    record.image_urls = filter_property_images(&images, ctx.max_images);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(page_url: &str) -> PageContext {
        PageContext::new(Url::parse("https://example.jp/").unwrap(), page_url, 5)
    }

    #[test]
    fn price_cascade_prefers_specific_forms() {
        assert_eq!(
            PRICE_PATTERNS.first_match("販売価格 3億5,000万円 管理費別"),
            Some("3億5,000万円".to_string())
        );
        assert_eq!(PRICE_PATTERNS.first_match("5,800万円"), Some("5,800万円".to_string()));
        assert_eq!(PRICE_PATTERNS.first_match("価格：4800"), Some("4800".to_string()));
        assert_eq!(PRICE_PATTERNS.first_match("3LDK 築10年"), None);
    }

    #[test]
    fn age_and_rooms() {
        assert_eq!(AGE_PATTERNS.first_match("中古 築15年 3LDK"), Some("築15年".to_string()));
        assert_eq!(AGE_PATTERNS.first_match("建築年：平成10年"), Some("平成10年".to_string()));
        assert_eq!(ROOM_PATTERNS.first_match("間取り：4SLDK"), Some("4SLDK".to_string()));
        assert_eq!(ROOM_PATTERNS.first_match("2DK 和室"), Some("2DK".to_string()));
    }

    #[test]
    fn size_matches_collected() {
        let sizes = SIZE_PATTERNS.all_matches("土地：1,023.5㎡ 建物：120㎡", 2);
        assert!(sizes.contains(&"土地：1,023.5㎡".to_string()));
        assert!(sizes.contains(&"120㎡".to_string()));
    }

    #[test]
    fn extracts_literal_fragment() {
        let html = Html::parse_fragment(
            r#"<div class="property-item"><h3>軽井沢の美しい別荘</h3><div class="price">5,800万円</div><div class="location">長野県軽井沢町</div></div>"#,
        );
        let selector = Selector::parse(".property-item").unwrap();
        let element = html.select(&selector).next().unwrap();
        let record = extract_listing(element, &ctx("https://example.jp/karuizawa/"));

        assert_eq!(record.title, "軽井沢の美しい別荘");
        assert_eq!(record.price, "5,800万円");
        assert!(record.location.contains("軽井沢"));
        assert_eq!(record.property_type, "別荘");
        assert_eq!(record.source_url, "https://example.jp/karuizawa/");
        assert!(record.is_valid());
        assert!(record.contains_karuizawa());
    }

    #[test]
    fn listing_link_and_images_resolved() {
        let html = Html::parse_document(
            r#"<div class="card">
                 <a href="/detail/123"><h2>南軽井沢 森の家</h2></a>
                 <p>価格 1億2,000万円 3LDK 築8年</p>
                 <img src="/common/logo.png"><img src="/img/a.jpg"><img data-src="/photo/b.jpg">
               </div>"#,
        );
        let selector = Selector::parse(".card").unwrap();
        let element = html.select(&selector).next().unwrap();
        let record = extract_listing(element, &ctx("https://example.jp/list"));

        assert_eq!(record.source_url, "https://example.jp/detail/123");
        assert_eq!(record.price, "1億2,000万円");
        assert_eq!(record.rooms, "3LDK");
        assert_eq!(record.building_age, "築8年");
        assert!(record.location.contains("軽井沢"));
        assert_eq!(
            record.image_urls,
            vec![
                "https://example.jp/photo/b.jpg".to_string(),
                "https://example.jp/img/a.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn missing_fields_stay_empty() {
        let html = Html::parse_fragment(r#"<div class="item"><span>お問い合わせ</span></div>"#);
        let selector = Selector::parse(".item").unwrap();
        let element = html.select(&selector).next().unwrap();
        let record = extract_listing(element, &ctx("https://example.jp/"));
        assert!(record.price.is_empty());
        assert!(record.location.is_empty());
        assert!(record.rooms.is_empty());
        assert!(!record.is_valid());
    }

    #[test]
    fn locate_prefers_first_matching_selector() {
        let html = Html::parse_document(
            r#"<ul><li class="bukken-item">A 5,000万円</li><li class="bukken-item">B 6,000万円</li></ul>"#,
        );
        let selectors = SelectorCascade::new(&[".property-card", ".bukken-item", "li"]);
        let found = locate_listings(&html, &selectors);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn locate_falls_back_to_currency_text() {
        let html = Html::parse_document(
            r#"<body><div class="box-item"><span>軽井沢 山荘</span><span>4,800万円</span></div>
               <section><p>2億円</p></section></body>"#,
        );
        let selectors = SelectorCascade::new(&[".property-card"]);
        let found = locate_listings(&html, &selectors);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].value().attr("class"), Some("box-item"));
        assert_eq!(found[1].value().name(), "section");
    }

    #[test]
    fn image_filter_excludes_and_promotes() {
        let urls: Vec<String> = [
            "https://x.jp/a.jpg",
            "https://x.jp/btn_next.png",
            "https://x.jp/gallery/1.jpg",
            "https://x.jp/header_bg.jpg",
            "https://x.jp/b.jpg",
            "https://x.jp/photo/2.jpg",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let filtered = filter_property_images(&urls, 3);
        assert_eq!(
            filtered,
            vec![
                "https://x.jp/gallery/1.jpg".to_string(),
                "https://x.jp/photo/2.jpg".to_string(),
                "https://x.jp/a.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn find_links_uses_first_productive_selector() {
        let html = Html::parse_document(
            r##"<a href="/karuizawa/detail/1">1</a><a href="/karuizawa/detail/1">dup</a>
               <a href="/detail/2">2</a><a href="javascript:void(0)">x</a><a href="#top">top</a>"##,
        );
        let base = Url::parse("https://example.jp/").unwrap();
        let links = find_links(
            &html,
            &["a[href*='/karuizawa/detail/']", "a[href*='/detail/']"],
            &base,
            "https://example.jp/search",
            |_| true,
            10,
        );
        assert_eq!(links, vec!["https://example.jp/karuizawa/detail/1".to_string()]);
    }

    #[test]
    fn detail_page_extraction() {
        let html = Html::parse_document(
            r#"<html><head><title>物件詳細</title></head><body>
               <h1>中軽井沢 リゾート一戸建て</h1>
               <table><tr><th>価格</th><td class="price">7,980万円</td></tr>
               <tr><th>所在地</th><td>長野県北佐久郡軽井沢町長倉</td></tr>
               <tr><th>間取り</th><td>4LDK</td></tr><tr><th>築年</th><td>築12年</td></tr></table>
               </body></html>"#,
        );
        let record = extract_detail_page(&html, &ctx("https://example.jp/detail/9"));
        assert_eq!(record.title, "中軽井沢 リゾート一戸建て");
        assert_eq!(record.price, "7,980万円");
        assert!(record.location.contains("軽井沢町"));
        assert_eq!(record.rooms, "4LDK");
        assert_eq!(record.building_age, "築12年");
        assert_eq!(record.property_type, "一戸建て");
    }
}
