//! Feed Value Types
//!
//! Plain data describing what the ticker shows: the configured feeds, the
//! ordered feed list the controller cycles through, and the entries fetched
//! for one activation.
//!
//! # Design Philosophy
//!
//! A [`Feed`] is an immutable value. The controller hands each viewer
//! activation its own clone, so nothing an activation does can reach back
//! into the controller's list. Running past the last entry is not an error:
//! [`FeedEntries::lookup`] answers [`EntryLookup::EndOfFeed`] and the caller
//! decides to wrap.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One remote source of entries, identified by its URL
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feed {
    #[serde(rename = "feed_name")]
    name: String,
    url: String,
}

impl Feed {
    /// Create a feed from its display label and fetch URL
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Label shown on the first display row
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch source
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.url)
    }
}

/// Ordered, non-empty list of feeds
///
/// Index arithmetic is modulo the list length, so stepping forward `len`
/// times from any index lands back where it started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedList {
    feeds: Vec<Feed>,
}

impl FeedList {
    /// Build a feed list; returns `None` when `feeds` is empty
    #[must_use]
    pub fn new(feeds: Vec<Feed>) -> Option<Self> {
        if feeds.is_empty() {
            None
        } else {
            Some(Self { feeds })
        }
    }

    /// Number of feeds (always at least one)
    #[must_use]
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Always false; present for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Feed at `index` taken modulo the list length
    #[must_use]
    pub fn at(&self, index: usize) -> &Feed {
        &self.feeds[index % self.feeds.len()]
    }

    /// Index after `index`, wrapping to 0
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.feeds.len()
    }

    /// Index before `index`, wrapping to the last feed
    #[must_use]
    pub fn previous_index(&self, index: usize) -> usize {
        let len = self.feeds.len();
        (index % len + len - 1) % len
    }
}

/// One item within a feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedEntry {
    title: String,
    published: Option<DateTime<FixedOffset>>,
}

impl FeedEntry {
    /// Create an entry with a title and no timestamp
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            published: None,
        }
    }

    /// Attach a publication timestamp
    #[must_use]
    pub fn with_published(mut self, published: DateTime<FixedOffset>) -> Self {
        self.published = Some(published);
        self
    }

    /// Entry headline
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Publication time, when the feed carried one
    #[must_use]
    pub fn published(&self) -> Option<DateTime<FixedOffset>> {
        self.published
    }
}

/// Result of looking up an entry by cursor position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryLookup<'a> {
    /// The cursor points at an entry
    Entry(&'a FeedEntry),
    /// The cursor ran past the last entry
    EndOfFeed,
}

/// Entries fetched for a single viewer activation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedEntries {
    entries: Vec<FeedEntry>,
}

impl FeedEntries {
    /// Wrap a fetched entry list
    #[must_use]
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self { entries }
    }

    /// Look up the entry at `cursor`
    #[must_use]
    pub fn lookup(&self, cursor: usize) -> EntryLookup<'_> {
        match self.entries.get(cursor) {
            Some(entry) => EntryLookup::Entry(entry),
            None => EntryLookup::EndOfFeed,
        }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the fetch returned nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent publication time across all entries
    #[must_use]
    pub fn newest(&self) -> Option<DateTime<FixedOffset>> {
        self.entries.iter().filter_map(FeedEntry::published).max()
    }
}

impl From<Vec<FeedEntry>> for FeedEntries {
    fn from(entries: Vec<FeedEntry>) -> Self {
        Self::new(entries)
    }
}
