/// Run parameters for one crawl. Defaults match the reference site: 30
/// listings per collection page, prices quoted in thousands of EUR, 19% VAT
/// on "+ TVA" listings.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Collection seed URL; page N is fetched as `{seed_url}&pagina=N`.
    pub seed_url: String,
    /// Listings per collection page, used to derive the page count.
    pub page_size: usize,
    /// Bounded number of in-flight page fetches.
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Optional cap on pages fetched this run (testing / partial crawls).
    pub max_pages: Option<u32>,
    /// Applied to the price when the currency marker carries the tax suffix.
    pub tax_multiplier: f64,
    /// Open plausibility interval for price per square metre.
    pub ratio_min: i64,
    pub ratio_max: i64,
    /// Areas at or above this are treated as data-entry errors.
    pub area_ceiling: f64,
    /// Looser sanity bound applied only when averaging ratios.
    pub aggregate_cap: i64,
    pub db_path: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_url: "https://www.imobiliare.ro/vanzare-apartamente/timis?id=26646339"
                .to_string(),
            page_size: 30,
            concurrency: 4,
            timeout_secs: 30,
            max_pages: None,
            tax_multiplier: 1.19,
            ratio_min: 500,
            ratio_max: 5000,
            area_ceiling: 1000.0,
            aggregate_cap: 10_000,
            db_path: "data/listings.sqlite".to_string(),
        }
    }
}
