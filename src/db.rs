use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

/// Named zones the reporting layer groups by. Locations outside this list
/// are stored but excluded from the default per-zone report.
pub const ZONE_ALLOWLIST: &[&str] = &[
    "Complex Studentesc",
    "Elisabetin",
    "Iosefin",
    "Blascovici",
    "Torontalului",
    "Aradului",
    "Lipovei",
    "Telegrafului",
    "Dorobantilor",
    "Fabric",
    "Cetatii",
];

/// Typed, validated listing. `None` in a numeric field is the explicit
/// invalid sentinel; the record as a whole is still stored.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub identity: String,
    pub location: String,
    /// Raw price in EUR (site quotes thousands, already multiplied out).
    pub price: Option<i64>,
    /// Raw currency marker text, e.g. "EUR" or "EUR + TVA".
    pub currency: String,
    pub rooms: Option<i64>,
    pub area_sqm: Option<f64>,
    /// Tax-adjusted price; equals `price` without the tax suffix.
    pub price_final: Option<i64>,
    pub price_per_sqm: Option<i64>,
    pub scraped_at: DateTime<Utc>,
}

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS listings (
            identity      TEXT PRIMARY KEY,
            location      TEXT NOT NULL,
            price         INTEGER,
            currency      TEXT NOT NULL,
            rooms         INTEGER,
            area_sqm      REAL,
            price_final   INTEGER,
            price_per_sqm INTEGER,
            scraped_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_listings_location ON listings(location);
        CREATE INDEX IF NOT EXISTS idx_listings_rooms ON listings(rooms);
        ",
    )?;
    Ok(())
}

// ── Upserts ──

/// Write one page's batch in a single transaction. Re-crawling replaces the
/// row for an identity in place; no duplicates accumulate.
pub fn upsert_listings(conn: &Connection, listings: &[Listing]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO listings
               (identity, location, price, currency, rooms, area_sqm,
                price_final, price_per_sqm, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(identity) DO UPDATE SET
               location = excluded.location,
               price = excluded.price,
               currency = excluded.currency,
               rooms = excluded.rooms,
               area_sqm = excluded.area_sqm,
               price_final = excluded.price_final,
               price_per_sqm = excluded.price_per_sqm,
               scraped_at = excluded.scraped_at",
        )?;
        for l in listings {
            stmt.execute(rusqlite::params![
                l.identity,
                l.location,
                l.price,
                l.currency,
                l.rooms,
                l.area_sqm,
                l.price_final,
                l.price_per_sqm,
                l.scraped_at,
            ])?;
        }
    }
    tx.commit()?;
    Ok(listings.len())
}

// ── Queries ──

pub fn fetch_all(conn: &Connection) -> Result<Vec<Listing>> {
    let mut stmt = conn.prepare(
        "SELECT identity, location, price, currency, rooms, area_sqm,
                price_final, price_per_sqm, scraped_at
         FROM listings ORDER BY identity",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Listing {
                identity: row.get(0)?,
                location: row.get(1)?,
                price: row.get(2)?,
                currency: row.get(3)?,
                rooms: row.get(4)?,
                area_sqm: row.get(5)?,
                price_final: row.get(6)?,
                price_per_sqm: row.get(7)?,
                scraped_at: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every stored ratio including the invalid ones; the metric engine decides
/// what counts.
pub fn all_ratios(conn: &Connection) -> Result<Vec<Option<i64>>> {
    let mut stmt = conn.prepare("SELECT price_per_sqm FROM listings")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct ZoneSummaryRow {
    pub location: String,
    pub count: i64,
    pub avg_price: f64,
    pub min_price: i64,
    pub max_price: i64,
    pub avg_price_per_sqm: Option<f64>,
}

/// Per-zone price summary for downstream reporting. Restricted to the fixed
/// zone allow-list unless `all_zones` is set; optionally filtered by room
/// count. Only rows with a valid final price participate.
pub fn zone_summary(
    conn: &Connection,
    rooms: Option<i64>,
    all_zones: bool,
) -> Result<Vec<ZoneSummaryRow>> {
    let mut conditions = vec!["price_final IS NOT NULL".to_string()];
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(n) = rooms {
        conditions.push(format!("rooms = ?{}", params.len() + 1));
        params.push(Box::new(n));
    }
    if !all_zones {
        let placeholders: Vec<String> = ZONE_ALLOWLIST
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", params.len() + i + 1))
            .collect();
        conditions.push(format!("location IN ({})", placeholders.join(", ")));
        for zone in ZONE_ALLOWLIST {
            params.push(Box::new(format!("Timisoara, zona {}", zone)));
        }
    }

    let sql = format!(
        "SELECT location, COUNT(*), AVG(price_final), MIN(price_final),
                MAX(price_final), AVG(price_per_sqm)
         FROM listings
         WHERE {}
         GROUP BY location
         ORDER BY location",
        conditions.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(ZoneSummaryRow {
                location: row.get(0)?,
                count: row.get(1)?,
                avg_price: row.get(2)?,
                min_price: row.get(3)?,
                max_price: row.get(4)?,
                avg_price_per_sqm: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Listings per location, most crowded first.
pub fn zone_counts(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT location, COUNT(*) FROM listings
         GROUP BY location ORDER BY COUNT(*) DESC, location",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub with_price: usize,
    pub with_area: usize,
    pub with_ratio: usize,
    pub zones: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM listings", [], |r| r.get(0))?;
    let with_price: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE price IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let with_area: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE area_sqm IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let with_ratio: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE price_per_sqm IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let zones: usize =
        conn.query_row("SELECT COUNT(DISTINCT location) FROM listings", [], |r| r.get(0))?;
    Ok(Stats { total, with_price, with_area, with_ratio, zones })
}

// ── Tests ──
