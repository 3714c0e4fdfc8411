mod config;
mod crawler;
mod db;
mod fetch;
mod parser;

use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::CrawlConfig;
use fetch::HttpFetcher;

#[derive(Parser)]
#[command(name = "imobiliare_scraper", about = "Apartment listing crawler and price normalizer")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the page count and crawl all collection pages
    Crawl {
        /// Max pages to fetch (default: all discovered)
        #[arg(short = 'n', long)]
        pages: Option<u32>,
        /// Concurrent page fetches
        #[arg(long)]
        concurrency: Option<usize>,
        /// Collection seed URL
        #[arg(long)]
        seed: Option<String>,
        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Dataset counts and per-zone listing totals
    Stats,
    /// Per-zone price summary (fixed zone allow-list unless --all-zones)
    Report {
        /// Filter by room count
        #[arg(short, long)]
        rooms: Option<i64>,
        /// Include locations outside the named-zone allow-list
        #[arg(long)]
        all_zones: bool,
    },
    /// Dataset-wide average price per square metre
    Average,
    /// Dump the stored dataset as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut cfg = CrawlConfig::default();
    if let Some(db) = cli.db {
        cfg.db_path = db;
    }

    let result = match cli.command {
        Commands::Crawl { pages, concurrency, seed, timeout } => {
            cfg.max_pages = pages;
            if let Some(c) = concurrency {
                cfg.concurrency = c;
            }
            if let Some(s) = seed {
                cfg.seed_url = s;
            }
            if let Some(t) = timeout {
                cfg.timeout_secs = t;
            }

            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let fetcher = Arc::new(HttpFetcher::new(&cfg)?);
            let summary = crawler::crawl(fetcher, &conn, &cfg).await?;

            println!(
                "Done: {}/{} pages ({} ok, {} skipped, {} failed), {} of {} listings saved.",
                summary.pages_ok + summary.pages_skipped + summary.pages_failed,
                summary.total_pages,
                summary.pages_ok,
                summary.pages_skipped,
                summary.pages_failed,
                summary.listings_saved,
                summary.total_listings
            );
            if summary.interrupted {
                println!("Run interrupted; previously saved pages remain in the database.");
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Listings:        {}", s.total);
            println!("  valid price:   {}", s.with_price);
            println!("  valid area:    {}", s.with_area);
            println!("  valid ratio:   {}", s.with_ratio);
            println!("Distinct zones:  {}", s.zones);

            let counts = db::zone_counts(&conn)?;
            if !counts.is_empty() {
                println!("\nListings per zone:");
                for (location, count) in counts {
                    println!("  {:<40} {:>5}", location, count);
                }
            }
            Ok(())
        }
        Commands::Report { rooms, all_zones } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::zone_summary(&conn, rooms, all_zones)?;
            if rows.is_empty() {
                println!("No priced listings match.");
                return Ok(());
            }

            println!(
                "{:<40} | {:>5} | {:>9} | {:>9} | {:>9} | {:>8}",
                "Zone", "Count", "Avg EUR", "Min EUR", "Max EUR", "EUR/sqm"
            );
            println!("{}", "-".repeat(95));
            for r in &rows {
                let per_sqm = r
                    .avg_price_per_sqm
                    .map(|v| format!("{:.0}", v))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<40} | {:>5} | {:>9.0} | {:>9} | {:>9} | {:>8}",
                    r.location, r.count, r.avg_price, r.min_price, r.max_price, per_sqm
                );
            }
            println!("\n{} zones", rows.len());
            Ok(())
        }
        Commands::Average => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let ratios = db::all_ratios(&conn)?;
            let avg = parser::metrics::average_price_per_sqm(&ratios, cfg.aggregate_cap)?;
            println!("Average price per square metre: {:.2} EUR", avg);
            Ok(())
        }
        Commands::Export { out } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let listings = db::fetch_all(&conn)?;
            let json = serde_json::to_string_pretty(&listings)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported {} listings to {}", listings.len(), path);
                }
                None => println!("{}", json),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
