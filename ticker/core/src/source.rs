//! Feed Sources
//!
//! Fetching a feed URL into an ordered list of entries. The viewer only sees
//! the [`FeedSource`] trait, so tests and demos can swap the HTTP client for
//! an in-memory map.
//!
//! # Formats
//!
//! [`HttpFeedSource`] understands RSS 2.0 (`<item>` elements) and Atom
//! (`<entry>` elements). Only the title and publication time are kept.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::feed::FeedEntry;

/// Default request timeout for feed fetches
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while fetching a feed
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Body was not a readable RSS or Atom document
    #[error("Failed to parse feed from {url}: {message}")]
    Parse {
        /// Requested URL
        url: String,
        /// Parser message
        message: String,
    },

    /// No feed is known at this URL
    #[error("No feed available at {0}")]
    NotFound(String),
}

/// Feed fetch collaborator
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the entries published at `url`
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError>;
}

/// Fetches feeds over HTTP(S)
#[derive(Clone)]
pub struct HttpFeedSource {
    http_client: reqwest::Client,
}

impl HttpFeedSource {
    /// Create a source whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (for
    /// example when no TLS backend is available).
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedticker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let entries = parse_feed(&body).map_err(|message| FetchError::Parse {
            url: url.to_string(),
            message,
        })?;

        tracing::debug!(url = %url, entries = entries.len(), "Fetched feed");
        Ok(entries)
    }
}

/// In-memory feed source keyed by URL
#[derive(Default)]
pub struct StaticFeedSource {
    feeds: RwLock<HashMap<String, Vec<FeedEntry>>>,
    fetches: AtomicUsize,
}

impl StaticFeedSource {
    /// Create an empty source; every fetch fails with [`FetchError::NotFound`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish entries with the given titles at `url`
    #[must_use]
    pub fn with_titles<I, S>(self, url: impl Into<String>, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.publish(url, titles.into_iter().map(FeedEntry::new).collect());
        self
    }

    /// Replace whatever is published at `url`
    pub fn publish(&self, url: impl Into<String>, entries: Vec<FeedEntry>) {
        self.feeds.write().insert(url.into(), entries);
    }

    /// Remove the feed at `url` so later fetches fail
    pub fn withdraw(&self, url: &str) {
        self.feeds.write().remove(url);
    }

    /// Number of fetches served (successful or not)
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.feeds
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

/// Which child of an item is being read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Title,
    Published,
}

/// Entry under construction
#[derive(Default)]
struct PendingEntry {
    title: Option<String>,
    published: Option<DateTime<FixedOffset>>,
}

impl PendingEntry {
    fn finish(self) -> FeedEntry {
        let entry = FeedEntry::new(self.title.unwrap_or_default());
        match self.published {
            Some(published) => entry.with_published(published),
            None => entry,
        }
    }
}

/// Parse an RSS 2.0 or Atom document into entries, in document order
///
/// # Errors
///
/// Returns the parser's message when the document is not well-formed XML.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, String> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut pending: Option<PendingEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => match start.local_name().as_ref() {
                b"item" | b"entry" => pending = Some(PendingEntry::default()),
                b"title" if pending.is_some() => {
                    field = Some(Field::Title);
                    text.clear();
                }
                b"pubDate" | b"published" | b"updated" | b"date" if pending.is_some() => {
                    field = Some(Field::Published);
                    text.clear();
                }
                _ => {}
            },
            Event::Text(chunk) if field.is_some() => {
                text.push_str(&chunk.unescape().map_err(|e| e.to_string())?);
            }
            Event::CData(chunk) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&chunk.into_inner()));
            }
            Event::End(end) => match end.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(entry) = pending.take() {
                        entries.push(entry.finish());
                    }
                    field = None;
                }
                _ => {
                    if let (Some(kind), Some(entry)) = (field.take(), pending.as_mut()) {
                        let value = text.trim();
                        match kind {
                            // nested <source><title> must not replace the item title
                            Field::Title if entry.title.is_none() => {
                                entry.title = Some(value.to_string());
                            }
                            Field::Published if entry.published.is_none() => {
                                entry.published = parse_timestamp(value);
                            }
                            _ => {}
                        }
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// RSS uses RFC 2822 dates, Atom uses RFC 3339
fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}
