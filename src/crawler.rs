use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::config::CrawlConfig;
use crate::db;
use crate::fetch::PageFetcher;
use crate::parser;

/// One page's contribution to the run. A failed page carries the error text
/// and zero listings; a skipped page carries the marker flag.
pub struct PageOutcome {
    pub page: u32,
    pub listings: Vec<db::Listing>,
    pub skipped: bool,
    pub error: Option<String>,
}

/// Session state for one crawl invocation; printed at the end, never stored.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub total_listings: usize,
    pub total_pages: u32,
    pub pages_ok: usize,
    pub pages_skipped: usize,
    pub pages_failed: usize,
    pub listings_saved: usize,
    pub interrupted: bool,
}

/// Read the total listing count off the seed page and derive the page count.
/// Seed failure is the one fetch fault that aborts the run.
pub async fn discover(fetcher: &dyn PageFetcher, page_size: usize) -> Result<(usize, u32)> {
    let html = fetcher
        .fetch_seed()
        .await
        .context("Seed page fetch failed, crawl cannot start")?;
    let total = parser::extract::total_listing_count(&html)
        .context("Seed page carries no total listing counter")?;
    let pages = total.div_ceil(page_size) as u32;
    Ok((total, pages))
}

/// Crawl all discovered pages concurrently, streaming each page's batch to
/// the database as it arrives. The loop is page-count-bounded; covering the
/// discovered listing total early only stops it sooner.
pub async fn crawl(
    fetcher: Arc<dyn PageFetcher>,
    conn: &Connection,
    cfg: &CrawlConfig,
) -> Result<CrawlSummary> {
    let (total_listings, total_pages) = discover(fetcher.as_ref(), cfg.page_size).await?;
    let last_page = match cfg.max_pages {
        Some(cap) => total_pages.min(cap),
        None => total_pages,
    };
    info!(
        "Discovered {} listings across {} pages, crawling {}",
        total_listings, total_pages, last_page
    );

    let semaphore = Arc::new(Semaphore::new(cfg.concurrency));
    let (tx, mut rx) = mpsc::channel::<PageOutcome>(cfg.concurrency * 2);

    let mut handles = Vec::with_capacity(last_page as usize);
    for page in 1..=last_page {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let cfg = cfg.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let outcome = match fetcher.fetch_page(page).await {
                Ok(html) => {
                    let parsed = parser::process_page(&html, &cfg);
                    PageOutcome {
                        page,
                        listings: parsed.listings,
                        skipped: parsed.skipped,
                        error: None,
                    }
                }
                Err(e) => PageOutcome {
                    page,
                    listings: Vec::new(),
                    skipped: false,
                    error: Some(e.to_string()),
                },
            };
            let _ = tx.send(outcome).await;
        }));
    }

    // Drop our copy of tx so rx closes when all page tasks finish.
    drop(tx);

    let pb = ProgressBar::new(last_page as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut summary = CrawlSummary {
        total_listings,
        total_pages,
        ..Default::default()
    };

    loop {
        let outcome = tokio::select! {
            outcome = rx.recv() => match outcome {
                Some(o) => o,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping page fetches");
                for handle in &handles {
                    handle.abort();
                }
                summary.interrupted = true;
                break;
            }
        };

        if let Some(error) = &outcome.error {
            warn!("Page {} failed: {}", outcome.page, error);
            summary.pages_failed += 1;
        } else if outcome.skipped {
            info!("Page {} skipped: prices not disclosed", outcome.page);
            summary.pages_skipped += 1;
        } else {
            summary.listings_saved += db::upsert_listings(conn, &outcome.listings)?;
            summary.pages_ok += 1;
        }
        pb.inc(1);

        // Secondary early exit: the discovered total is already covered.
        if total_listings > 0 && summary.listings_saved >= total_listings {
            for handle in &handles {
                handle.abort();
            }
            break;
        }
    }

    pb.finish_and_clear();
    info!(
        "Crawled {} pages ({} ok, {} skipped, {} failed), {} listings saved",
        summary.pages_ok + summary.pages_skipped + summary.pages_failed,
        summary.pages_ok,
        summary.pages_skipped,
        summary.pages_failed,
        summary.listings_saved
    );

    Ok(summary)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Scripted fetcher: a seed counter plus one canned response per page.
    struct FakeFetcher {
        total: usize,
        pages: Vec<Result<String, String>>,
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_seed(&self) -> Result<String> {
            Ok(format!(
                r#"<span class="total_anunturi_js">{}</span>"#,
                self.total
            ))
        }

        async fn fetch_page(&self, page: u32) -> Result<String> {
            match &self.pages[(page - 1) as usize] {
                Ok(html) => Ok(html.clone()),
                Err(e) => anyhow::bail!("{}", e),
            }
        }
    }

    fn listing_html(n: usize) -> String {
        format!(
            r#"<div class="box-anunt">
                 <a href="https://www.imobiliare.ro/vanzare-apartamente/timisoara/apartament-2-camere-AB{:06}">
                   <p class="location_txt">Timişoara, zona Aradului</p>
                   <span class="pret-mare">74.5</span>
                   <span class="tva-luna">EUR</span>
                   <ul class="caracteristici">2 camere 54 mp</ul>
                 </a>
               </div>"#,
            n
        )
    }

    fn page_html(count: usize, offset: usize) -> String {
        (0..count).map(|n| listing_html(offset + n)).collect()
    }

    #[tokio::test]
    async fn discover_rounds_pages_up() {
        let fetcher = FakeFetcher { total: 93, pages: vec![] };
        let (total, pages) = discover(&fetcher, 30).await.unwrap();
        assert_eq!(total, 93);
        assert_eq!(pages, 4); // ceil(93 / 30)

        let exact = FakeFetcher { total: 90, pages: vec![] };
        assert_eq!(discover(&exact, 30).await.unwrap().1, 3);
    }

    #[tokio::test]
    async fn discover_fails_without_counter() {
        let fetcher = FakeFetcher { total: 0, pages: vec![] };
        // A zero counter still parses; a counter-less page must not.
        struct Blank;
        #[async_trait]
        impl PageFetcher for Blank {
            async fn fetch_seed(&self) -> Result<String> {
                Ok("<html></html>".to_string())
            }
            async fn fetch_page(&self, _page: u32) -> Result<String> {
                unreachable!()
            }
        }
        assert!(discover(&Blank, 30).await.is_err());
        assert!(discover(&fetcher, 30).await.is_ok());
    }

    #[tokio::test]
    async fn failed_page_does_not_abort_the_run() {
        // 93-listing seed → 4 pages; page 1 yields 30 valid listings, page 2
        // fails outright, pages 3 and 4 are empty.
        let fetcher = Arc::new(FakeFetcher {
            total: 93,
            pages: vec![
                Ok(page_html(30, 0)),
                Err("connection timed out".to_string()),
                Ok(String::new()),
                Ok(String::new()),
            ],
        });
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        let summary = crawl(fetcher, &conn, &CrawlConfig::default()).await.unwrap();
        assert_eq!(summary.total_pages, 4);
        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.listings_saved, 30);
        assert_eq!(db::get_stats(&conn).unwrap().total, 30);
    }

    #[tokio::test]
    async fn skipped_page_is_not_a_failure() {
        let fetcher = Arc::new(FakeFetcher {
            total: 40,
            pages: vec![
                Ok(page_html(30, 0)),
                Ok(r#"<div class="pret necomunicat"></div>"#.to_string()),
            ],
        });
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        let summary = crawl(fetcher, &conn, &CrawlConfig::default()).await.unwrap();
        assert_eq!(summary.pages_skipped, 1);
        assert_eq!(summary.pages_failed, 0);
        assert_eq!(summary.listings_saved, 30);
    }

    #[tokio::test]
    async fn recrawl_is_idempotent() {
        let fetcher = Arc::new(FakeFetcher {
            total: 30,
            pages: vec![Ok(page_html(30, 0))],
        });
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        crawl(Arc::clone(&fetcher) as Arc<dyn PageFetcher>, &conn, &CrawlConfig::default())
            .await
            .unwrap();
        crawl(fetcher, &conn, &CrawlConfig::default()).await.unwrap();
        assert_eq!(db::get_stats(&conn).unwrap().total, 30);
    }

    #[tokio::test]
    async fn max_pages_caps_the_run() {
        let fetcher = Arc::new(FakeFetcher {
            total: 93,
            pages: vec![
                Ok(page_html(30, 0)),
                Ok(page_html(30, 30)),
                Ok(page_html(30, 60)),
                Ok(page_html(3, 90)),
            ],
        });
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        let cfg = CrawlConfig { max_pages: Some(2), ..CrawlConfig::default() };
        let summary = crawl(fetcher, &conn, &cfg).await.unwrap();
        assert_eq!(summary.pages_ok, 2);
        assert_eq!(summary.listings_saved, 60);
    }
}
