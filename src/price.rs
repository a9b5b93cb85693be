use regex::Regex;
use std::sync::LazyLock;

pub const YEN_PER_MAN: u64 = 10_000;
pub const YEN_PER_OKU: u64 = 100_000_000;

/// Parseable prices outside this range are treated as extraction noise.
pub const MIN_PLAUSIBLE_YEN: u64 = 1_000_000;
pub const MAX_PLAUSIBLE_YEN: u64 = 5_000_000_000;

static OKU_AND_MAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*)億(\d[\d,]*)万円").unwrap());
static OKU_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d[\d,]*)億円").unwrap());
static MAN_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d[\d,]*)\s*万円").unwrap());
static PLAIN_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());

fn parse_digits(text: &str) -> Option<u64> {
    text.replace(',', "").parse::<u64>().ok()
}

/// Parse a Japanese listing price into yen.
///
/// Handles `3億5,000万円`, `1億円`, `5,000万円`, `¥350000000` and
/// `350,000,000円`. Returns `None` for text without any digits, such as
/// `価格応談`, and for figures too large to hold in yen.
pub fn parse_japanese_price(text: &str) -> Option<u64> {
    if text.trim().is_empty() {
        return None;
    }

    if let Some(caps) = OKU_AND_MAN.captures(text) {
        let oku = parse_digits(&caps[1])?;
        let man = parse_digits(&caps[2])?;
        return oku
            .checked_mul(YEN_PER_OKU)?
            .checked_add(man.checked_mul(YEN_PER_MAN)?);
    }

    if let Some(caps) = OKU_ONLY.captures(text) {
        return parse_digits(&caps[1])?.checked_mul(YEN_PER_OKU);
    }

    if let Some(caps) = MAN_ONLY.captures(text) {
        return parse_digits(&caps[1])?.checked_mul(YEN_PER_MAN);
    }

    PLAIN_NUMBER
        .find(text)
        .and_then(|number| parse_digits(number.as_str()))
}

/// Whether the price is inside the plausible range. Prices without digits
/// pass; figures too large to parse do not.
pub fn is_plausible(text: &str) -> bool {
    match parse_japanese_price(text) {
        Some(yen) => (MIN_PLAUSIBLE_YEN..=MAX_PLAUSIBLE_YEN).contains(&yen),
        None => !PLAIN_NUMBER.is_match(text),
    }
}

/// Whether the text carries a currency marker.
pub fn looks_like_price(text: &str) -> bool {
    text.contains("万円")
        || text.contains('円')
        || text.contains('¥')
        || text.contains('￥')
        || text.to_lowercase().contains("yen")
}

/// Yen value of a price expressed in 万円, for reporting.
pub fn man_en_price_in_yen(text: &str) -> Option<u64> {
    if !text.contains("万円") {
        return None;
    }
    parse_japanese_price(text)
}
