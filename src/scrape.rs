//! Scrape web pages into the raw tier.
//!
//! Each URL is fetched through the [`RetryingFetcher`] and handed to a
//! [`PageExtractor`], which turns the page into a [`PageRecord`]. The record
//! is rendered as plain text and written to
//! `raw/{prefix}_{YYYYMMDDTHHMMSSZ}_{i}.txt`.
//!
//! Failures are isolated per page: a page that cannot be fetched, parsed or
//! uploaded is logged and skipped, and the remaining pages are still
//! processed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;

use medallion_core::models::Tier;
use medallion_core::retry::Clock;
use medallion_core::store::{BlobStore, CONTENT_TYPE_TEXT};
use medallion_core::Result;

use crate::fetch::{Payload, RetryingFetcher};

/// Structured fields extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub title: String,
    pub price: String,
    pub availability: String,
    pub link: String,
    pub description: String,
}

impl PageRecord {
    /// Header lines, a blank line, then the description.
    pub fn render(&self) -> String {
        format!(
            "Title: {}\nPrice: {}\nAvailability: {}\nLink: {}\n\n{}",
            self.title, self.price, self.availability, self.link, self.description
        )
    }
}

/// Site-specific page parsing.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, page: &Payload) -> Result<PageRecord>;
}

/// Extractor that keeps the whole response body as the description.
pub struct BodyExtractor;

impl PageExtractor for BodyExtractor {
    fn extract(&self, page: &Payload) -> Result<PageRecord> {
        let body = page.text()?;
        Ok(PageRecord {
            title: "Unknown Title".to_string(),
            price: "N/A".to_string(),
            availability: "N/A".to_string(),
            link: page.url.clone(),
            description: body.trim().to_string(),
        })
    }
}

/// A page that made it into the raw tier.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedRecord {
    #[serde(flatten)]
    pub record: PageRecord,
    pub object_name: String,
}

pub struct ScrapeOptions {
    pub object_prefix: String,
    /// Pause after each page.
    pub delay: Duration,
    pub headers: HeaderMap,
}

/// Raw blob name for the `index`-th page of a scrape started at `at`.
pub fn raw_object_name(prefix: &str, at: DateTime<Utc>, index: usize) -> String {
    Tier::Raw.blob_name(&format!(
        "{}_{}_{}.txt",
        prefix,
        at.format("%Y%m%dT%H%M%SZ"),
        index
    ))
}

pub async fn scrape_to_raw<C: Clock>(
    urls: &[String],
    fetcher: &RetryingFetcher<C>,
    extractor: &dyn PageExtractor,
    store: &dyn BlobStore,
    options: &ScrapeOptions,
) -> Vec<ScrapedRecord> {
    let started = Utc::now();
    let mut records = Vec::new();

    for (i, url) in urls.iter().enumerate() {
        tracing::info!("[{}/{}] Processing: {}", i + 1, urls.len(), url);

        let record = match fetcher.fetch(url, &options.headers).await {
            Ok(page) => match extractor.extract(&page) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", url, e);
                    continue;
                }
            },
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                continue;
            }
        };

        let object_name = raw_object_name(&options.object_prefix, started, i);
        match store
            .put(&object_name, record.render().into_bytes(), CONTENT_TYPE_TEXT)
            .await
        {
            Ok(()) => {
                tracing::info!("[{}] Uploaded {}", i, object_name);
                records.push(ScrapedRecord {
                    record,
                    object_name,
                });
            }
            Err(e) => tracing::error!("[{}] Failed to upload: {}", i, e),
        }

        if !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
    }

    records
}
