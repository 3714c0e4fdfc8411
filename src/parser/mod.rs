pub mod extract;
pub mod metrics;
pub mod normalize;

use chrono::Utc;
use scraper::Html;

use crate::config::CrawlConfig;
use crate::db::Listing;

/// Result of running one fetched page through the extraction pipeline.
pub struct PageListings {
    /// Collection-level "price not disclosed" marker was present; the page
    /// contributes nothing and is not a failure.
    pub skipped: bool,
    pub listings: Vec<Listing>,
}

/// Page pipeline: HTML → raw records → normalized listings → metrics.
pub fn process_page(html: &str, cfg: &CrawlConfig) -> PageListings {
    let doc = Html::parse_document(html);
    if extract::has_undisclosed_prices(&doc) {
        return PageListings { skipped: true, listings: Vec::new() };
    }

    let scraped_at = Utc::now();
    let listings = extract::listing_records(&doc)
        .iter()
        .map(|raw| {
            let mut listing = normalize::normalize(raw, scraped_at, cfg);
            listing.price_per_sqm =
                metrics::price_per_sqm(listing.price_final, listing.area_sqm, cfg);
            listing
        })
        .collect();

    PageListings { skipped: false, listings }
}

// ── Tests ──
