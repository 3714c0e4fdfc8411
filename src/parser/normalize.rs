use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::CrawlConfig;
use crate::db::Listing;
use crate::parser::extract::RawListing;

/// Trailing alphanumeric code of a listing URL, e.g. `...-3-camere-X9C110TC`.
static LISTING_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9]{6,})$").unwrap());

/// Fixed transliteration table for Romanian diacritics, covering both the
/// cedilla and comma-below codepoints seen in site markup.
const DIACRITICS: &[(char, char)] = &[
    ('ş', 's'),
    ('Ş', 'S'),
    ('ș', 's'),
    ('Ș', 'S'),
    ('ţ', 't'),
    ('Ţ', 'T'),
    ('ț', 't'),
    ('Ț', 'T'),
    ('ă', 'a'),
    ('Ă', 'A'),
    ('â', 'a'),
    ('Â', 'A'),
    ('î', 'i'),
    ('Î', 'I'),
];

/// Room-count tokens longer than this are parsing faults, not room counts.
const MAX_ROOM_TOKEN_LEN: usize = 5;
/// The site abbreviates studio apartments as the literal token "o".
const STUDIO_TOKEN: &str = "o";

/// Convert one raw record into a typed listing. Each numeric field validates
/// independently; an unparseable field becomes `None` without touching the
/// others. The price-per-sqm metric is filled in by the caller.
pub fn normalize(raw: &RawListing, scraped_at: DateTime<Utc>, cfg: &CrawlConfig) -> Listing {
    let location = fold_diacritics(raw.location_text.trim());
    let currency = raw
        .currency_text
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_string();

    let tokens: Vec<&str> = raw
        .characteristics_text
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .collect();
    let rooms = tokens.first().and_then(|t| parse_rooms(t));
    let area_token = tokens.get(2).copied();
    let area_sqm = area_token.and_then(|t| parse_area(t, cfg.area_ceiling));

    let price = raw.price_text.as_deref().and_then(parse_price);
    let price_final = price.map(|p| {
        if is_plus_tax(&currency) {
            (p as f64 * cfg.tax_multiplier).round() as i64
        } else {
            p
        }
    });

    let identity = derive_identity(raw.url.as_deref(), &location, raw.price_text.as_deref(), area_token);

    Listing {
        identity,
        location,
        price,
        currency,
        rooms,
        area_sqm,
        price_final,
        price_per_sqm: None,
        scraped_at,
    }
}

/// Deterministic ASCII folding of the location text.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| {
            DIACRITICS
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect()
}

/// Prices are quoted in thousands; `"74.5"` means 74 500.
pub fn parse_price(text: &str) -> Option<i64> {
    let value: f64 = text.trim().parse().ok()?;
    Some((value * 1000.0) as i64)
}

pub fn parse_rooms(token: &str) -> Option<i64> {
    if token == STUDIO_TOKEN {
        return Some(1);
    }
    if token.chars().count() > MAX_ROOM_TOKEN_LEN {
        return None;
    }
    token.parse().ok().filter(|n| *n > 0)
}

/// Comma is the site's decimal separator; areas at or past the ceiling are
/// data-entry errors.
pub fn parse_area(token: &str, ceiling: f64) -> Option<f64> {
    let value: f64 = token.replace(',', ".").trim().parse().ok()?;
    (value < ceiling).then_some(value)
}

fn is_plus_tax(currency: &str) -> bool {
    currency.contains("TVA")
}

/// Stable identity: the listing URL's trailing code when an anchor exists,
/// otherwise a composite of the fields that survive re-crawls.
fn derive_identity(
    url: Option<&str>,
    location: &str,
    price_text: Option<&str>,
    area_token: Option<&str>,
) -> String {
    if let Some(url) = url {
        if let Some(caps) = LISTING_ID_RE.captures(url.trim_end_matches('/')) {
            return caps[1].to_string();
        }
    }
    format!(
        "{}|{}|{}",
        location,
        price_text.unwrap_or("-"),
        area_token.unwrap_or("-")
    )
}

// ── Tests ──
