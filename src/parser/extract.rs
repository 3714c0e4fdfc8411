use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static CONTAINER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.box-anunt").unwrap());
static LOCATION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.location_txt").unwrap());
static PRICE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.pret-mare").unwrap());
static CURRENCY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.tva-luna").unwrap());
static CHARACTERISTICS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.caracteristici").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static UNDISCLOSED_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.pret.necomunicat").unwrap());
static TOTAL_COUNT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.total_anunturi_js").unwrap());

/// Per-listing text fragments exactly as they appear in the markup. Missing
/// sub-elements stay `None`; the record is still emitted.
#[derive(Debug, Clone)]
pub struct RawListing {
    pub location_text: String,
    pub price_text: Option<String>,
    pub currency_text: Option<String>,
    pub characteristics_text: Option<String>,
    pub url: Option<String>,
}

/// Total listing counter from the seed page, digits only (the counter may
/// carry a thousands separator).
pub fn total_listing_count(html: &str) -> Option<usize> {
    let doc = Html::parse_document(html);
    let text = text_of(&doc.select(&TOTAL_COUNT_SEL).next()?);
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Collection-level "price not disclosed" marker. Pages carrying it are
/// skipped entirely.
pub fn has_undisclosed_prices(doc: &Html) -> bool {
    doc.select(&UNDISCLOSED_SEL).next().is_some()
}

/// Pull one raw record per listing container. Field extraction never fails
/// past a single listing.
pub fn listing_records(doc: &Html) -> Vec<RawListing> {
    doc.select(&CONTAINER_SEL)
        .map(|container| RawListing {
            location_text: container
                .select(&LOCATION_SEL)
                .next()
                .map(|el| text_of(&el))
                .unwrap_or_default(),
            price_text: container.select(&PRICE_SEL).next().map(|el| text_of(&el)),
            currency_text: container.select(&CURRENCY_SEL).next().map(|el| text_of(&el)),
            characteristics_text: container
                .select(&CHARACTERISTICS_SEL)
                .next()
                .map(|el| text_of(&el)),
            url: container
                .select(&LINK_SEL)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
        })
        .collect()
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ── Tests ──
